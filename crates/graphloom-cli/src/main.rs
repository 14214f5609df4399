use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use graphloom_cli::{
    cli::{Cli, Commands},
    commands,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG still wins when set
    let level = cli.level();
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Check { schema } => commands::check::execute(&schema)?,
        Commands::Compile {
            schema,
            request,
            claims,
            config,
            format,
        } => commands::compile::execute(commands::compile::CompileArgs {
            schema,
            request,
            claims,
            config,
            format,
        })?,
    }

    Ok(())
}
