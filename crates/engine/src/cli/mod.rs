//! Command-line surface: argument parsing, config loading, and the
//! configuration subcommands.

pub mod chat;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use pl_domain::config::{Config, ConfigSeverity};

#[derive(Parser)]
#[command(name = "paceline", about = "AI endurance coach engine", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Interactive coaching chat (default).
    Chat {
        /// User record to chat as.
        #[arg(long, default_value = "default")]
        user: String,
        /// Resume an existing session instead of starting a new one.
        #[arg(long)]
        session: Option<String>,
    },
    /// Configuration helpers.
    Config(ConfigArgs),
    /// Print the version.
    Version,
}

#[derive(clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Check the config file for problems.
    Validate,
    /// Print the effective configuration.
    Show,
}

/// Load `paceline.toml` (or `$PACELINE_CONFIG`), falling back to defaults
/// when the file does not exist. Out-of-range values are coerced with a
/// warning.
pub fn load_config() -> anyhow::Result<(Config, PathBuf)> {
    let path = std::env::var("PACELINE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("paceline.toml"));

    let mut config = if path.exists() {
        let raw = std::fs::read_to_string(&path)?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {}: {e}", path.display()))?
    } else {
        tracing::warn!(path = %path.display(), "config file not found; using defaults");
        Config::default()
    };

    config.sanitize();
    Ok((config, path))
}

/// `config validate`: print every issue; return false when errors exist.
pub fn validate(config: &Config, path: &std::path::Path) -> bool {
    let issues = config.validate();
    if issues.is_empty() {
        println!("{} OK", path.display());
        return true;
    }
    for issue in &issues {
        println!("{issue}");
    }
    !issues
        .iter()
        .any(|i| i.severity == ConfigSeverity::Error)
}

/// `config show`: print the effective config as TOML.
pub fn show(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(rendered) => println!("{rendered}"),
        Err(e) => eprintln!("failed to render config: {e}"),
    }
}
