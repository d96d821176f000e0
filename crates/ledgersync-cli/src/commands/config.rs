//! Config command - View, validate and create the configuration file
//!
//! 1. `show`     - Prints the effective configuration with secrets masked
//! 2. `validate` - Reports every invalid field
//! 3. `init`     - Writes the defaults to the configuration path

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use serde_json::json;
use tracing::info;

use ledgersync_core::config::Config;

use crate::output::{get_formatter, OutputFormat};

const MASK: &str = "********";

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the configuration
    Validate,
    /// Write a configuration file with the defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub async fn execute(&self, config: Config, path: &Path, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(config, path, format),
            ConfigCommand::Validate => execute_validate(&config, path, format),
            ConfigCommand::Init { force } => execute_init(path, *force, format),
        }
    }
}

/// Replaces secrets with a fixed mask
fn redacted(mut config: Config) -> Config {
    let mask = |secret: &mut Option<String>| {
        if secret.is_some() {
            *secret = Some(MASK.to_string());
        }
    };
    mask(&mut config.xero.client_secret);
    mask(&mut config.enrichment.api_key);
    config
}

fn execute_show(config: Config, path: &Path, format: OutputFormat) -> Result<()> {
    let fmt = get_formatter(format);
    let config = redacted(config);
    info!(config_path = %path.display(), "Showing configuration");

    if format.is_json() {
        let value =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        fmt.print_json(&value);
    } else {
        let source = if path.exists() {
            path.display().to_string()
        } else {
            format!("{} (not found, defaults)", path.display())
        };
        fmt.success(&format!("Configuration ({source})"));
        fmt.info("");
        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            fmt.info(line);
        }
    }
    Ok(())
}

fn execute_validate(config: &Config, path: &Path, format: OutputFormat) -> Result<()> {
    let fmt = get_formatter(format);
    let errors = config.validate();

    if format.is_json() {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        fmt.print_json(&json!({
            "valid": errors.is_empty(),
            "config_path": path.display().to_string(),
            "errors": messages,
        }));
    } else if errors.is_empty() {
        fmt.success("Configuration is valid");
        fmt.info(&format!("File: {}", path.display()));
    } else {
        fmt.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        fmt.info(&format!("File: {}", path.display()));
        for error in &errors {
            fmt.info(&format!("  {} - {}", error.field, error.message));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        bail!("Invalid configuration")
    }
}

fn execute_init(path: &Path, force: bool, format: OutputFormat) -> Result<()> {
    let fmt = get_formatter(format);
    write_defaults(path, force)?;

    if format.is_json() {
        fmt.print_json(&json!({"success": true, "config_path": path.display().to_string()}));
    } else {
        fmt.success(&format!("Wrote {}", path.display()));
        fmt.info("Set xero.client_id (or LEDGERSYNC_XERO_CLIENT_ID) before 'ledgersync auth login'");
    }
    Ok(())
}

fn write_defaults(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists; pass --force to overwrite", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
    }
    let yaml =
        serde_yaml::to_string(&Config::default()).context("Failed to serialize configuration")?;
    std::fs::write(path, yaml).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
