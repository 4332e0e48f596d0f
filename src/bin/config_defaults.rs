//! config-defaults CLI
//!
//! Reads a compiler configuration, fills every unset option that has a
//! default and prints the result.

use anyhow::{Context, Result};
use clap::Parser;
use config_defaults::logging::{LogFormat, LoggingConfig, init_logging};
use config_defaults::{CommentAnnotator, ConfigDocument, DescriptorTable, ResolvedConfig};
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "config-defaults", version, about = "Fill unset compiler options from a descriptor table")]
struct Cli {
    /// Configuration document to complete (reads stdin when omitted)
    config: Option<PathBuf>,

    /// Descriptor table as JSON (uses the built-in TypeScript table when omitted)
    #[arg(short, long)]
    descriptors: Option<PathBuf>,

    /// Add a comment above each filled option explaining its default
    #[arg(short, long)]
    annotate: bool,

    /// Log filter, overridden by CONFIG_DEFAULTS_LOG
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() {
    let cli = Cli::parse();

    let logging_config = LoggingConfig {
        level: cli.log_level.clone(),
        format: cli.log_format,
    };
    if let Err(e) = init_logging(&logging_config) {
        eprintln!("Failed to initialize logging: {e:#}");
        process::exit(1);
    }

    match run(&cli) {
        Ok(output) => {
            info!("Configuration completed");
            println!("{output}");
        }
        Err(e) => {
            error!("Command failed: {e:#}");
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<String> {
    let table = match &cli.descriptors {
        Some(path) => DescriptorTable::from_path(path)?,
        None => DescriptorTable::builtin()?,
    };

    let json = match &cli.config {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration {}", path.display()))?,
        None => std::io::read_to_string(std::io::stdin()).context("Failed to read configuration from stdin")?,
    };
    let document = ConfigDocument::from_json_str(&json)?;

    let resolved = ResolvedConfig::new(&table, document, CommentAnnotator::new())
        .context("Failed to resolve defaults")?;
    Ok(resolved.to_text(cli.annotate)?)
}
