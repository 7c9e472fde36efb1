use clap::{Parser, Subcommand};

use as_domain::config::{Config, ConfigSeverity};

/// assistant-stream: streaming state-sync backend.
#[derive(Debug, Parser)]
#[command(name = "assistant-stream", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `AS_CONFIG` (or
/// `config.toml` by default).  A missing file yields the defaults.
/// Returns the parsed [`Config`] and the path that was used.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("AS_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = load_config_from(&config_path)?;
    Ok((config, config_path))
}

pub fn load_config_from(config_path: &str) -> anyhow::Result<Config> {
    if !std::path::Path::new(config_path).exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(config_path)
        .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
    toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))
}

/// Print validation issues.  Returns `false` if any issue is an error.
pub fn validate(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();
    if issues.is_empty() {
        println!("{config_path}: OK");
        return true;
    }
    for issue in &issues {
        println!("{issue}");
    }
    !issues.iter().any(|i| i.severity == ConfigSeverity::Error)
}

/// Print the resolved configuration as TOML.
pub fn show(config: &Config) -> anyhow::Result<()> {
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| anyhow::anyhow!("rendering config: {e}"))?;
    print!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = load_config_from("/nonexistent/assistant-stream.toml").unwrap();
        assert_eq!(cfg.server.port, 8010);
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::parse_from(["assistant-stream", "config", "show"]);
        assert!(matches!(cli.command, Some(Command::Config(ConfigCommand::Show))));
        let cli = Cli::parse_from(["assistant-stream"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(validate(&Config::default(), "config.toml"));
    }
}
