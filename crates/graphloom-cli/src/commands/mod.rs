pub mod check;
pub mod compile;

use anyhow::{Context, Result};
use graphloom_query::{SchemaDeclarations, SchemaModel};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Read schema declarations, TOML when the extension says so, JSON otherwise
pub fn load_declarations(path: &Path) -> Result<SchemaDeclarations> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file: {}", path.display()))?;
    let is_toml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
    if is_toml {
        toml::from_str(&text).with_context(|| format!("Failed to parse TOML schema: {}", path.display()))
    } else {
        serde_json::from_str(&text).with_context(|| format!("Failed to parse JSON schema: {}", path.display()))
    }
}

/// Load and build the model in one step
pub fn load_model(path: &Path) -> Result<SchemaModel> {
    let declarations = load_declarations(path)?;
    debug!(
        nodes = declarations.nodes.len(),
        interfaces = declarations.interfaces.len(),
        "parsed schema declarations"
    );
    let model = SchemaModel::build(&declarations)
        .with_context(|| format!("Invalid schema: {}", path.display()))?;
    info!(path = %path.display(), "schema model built");
    Ok(model)
}

pub fn load_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} file: {}", what, path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {} file: {}", what, path.display()))
}
