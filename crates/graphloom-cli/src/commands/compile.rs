use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use graphloom_config::{ConfigLoader, TranslatorConfig};
use graphloom_query::{AuthContext, OperationRequest, Translation, Translator};
use serde_json::{Map, Value};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Inputs of one compile invocation
#[derive(Debug, Clone)]
pub struct CompileArgs {
    pub schema: PathBuf,
    pub request: PathBuf,
    pub claims: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub format: OutputFormat,
}

/// Execute the compile command
pub fn execute(args: CompileArgs) -> Result<()> {
    print!("{}", run(&args)?);
    Ok(())
}

/// Compile and render without printing
pub fn run(args: &CompileArgs) -> Result<String> {
    let model = super::load_model(&args.schema)?;
    let config = load_config(args.config.as_deref())?;
    let request: OperationRequest = super::load_json(&args.request, "request")?;
    let auth = match &args.claims {
        Some(path) => AuthContext::with_claims(super::load_json::<Map<String, Value>>(path, "claims")?),
        None => AuthContext::anonymous(),
    };
    debug!(
        operation = request.operation.name(),
        target = %request.target,
        "compiling request"
    );

    let translation = Translator::new(&model, &config)
        .translate(&request, &auth)
        .with_context(|| format!("Failed to compile {} on {}", request.operation.name(), request.target))?;
    render(&translation, args.format)
}

fn load_config(path: Option<&Path>) -> Result<TranslatorConfig> {
    let Some(path) = path else {
        return Ok(TranslatorConfig::default());
    };
    let config = ConfigLoader::load_from_file(path)
        .with_context(|| format!("Failed to load config: {}", path.display()))?;
    Ok(config)
}

pub fn render(translation: &Translation, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        let mut json = serde_json::to_string_pretty(translation).context("Failed to serialize output")?;
        json.push('\n');
        return Ok(json);
    }

    let mut out = String::new();
    match translation {
        Translation::Statement(statement) => {
            let _ = writeln!(out, "{}", statement.text);
            let _ = writeln!(out);
            let _ = writeln!(out, "-- params");
            for (name, value) in &statement.params {
                let _ = writeln!(out, "{}: {}", name, value);
            }
            if !statement.events.is_empty() {
                let _ = writeln!(out);
                let _ = writeln!(out, "-- events");
                for event in &statement.events {
                    let _ = writeln!(out, "{}", serde_json::to_string(event).context("Failed to serialize event")?);
                }
            }
        }
        Translation::Subscription(plan) => {
            let _ = writeln!(out, "-- subscription {}", plan.type_name);
            let _ = writeln!(out, "{}", serde_json::to_string_pretty(plan).context("Failed to serialize plan")?);
        }
    }
    Ok(out)
}
