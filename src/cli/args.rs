//! Command-line interface definitions.

use clap::{ColorChoice, Parser};
use std::path::PathBuf;

/// Default configuration file location
pub const DEFAULT_CONFIG_FILE: &str = "/etc/fswatcher";

/// Watch directories and forward file change events
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (JSON, or TOML with a `.toml` extension)
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Enable verbose output for debugging
    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path() {
        let cli = Cli::parse_from(["fswatcher"]);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
        assert!(!cli.verbose);
    }

    #[test]
    fn test_config_flag() {
        let cli = Cli::parse_from(["fswatcher", "-c", "/tmp/watch.json", "--verbose"]);
        assert_eq!(cli.config, PathBuf::from("/tmp/watch.json"));
        assert!(cli.verbose);
    }
}
