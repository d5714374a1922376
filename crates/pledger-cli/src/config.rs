//! # Config Subcommand

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use pledger_engine::EngineConfig;

/// Arguments for the `pledger config` subcommand.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Load a config file with environment overrides and print the
    /// effective settings.
    Check {
        /// YAML config file.
        path: PathBuf,
    },
}

pub fn run_config(args: &ConfigArgs) -> Result<u8> {
    match &args.command {
        ConfigCommand::Check { path } => {
            let config = EngineConfig::load(path)
                .with_context(|| format!("config {} rejected", path.display()))?;
            print!("{}", serde_yaml::to_string(&config)?);
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_rejects_zero_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        std::fs::write(&path, "ready_timeout_secs: 0\n").unwrap();
        let args = ConfigArgs {
            command: ConfigCommand::Check { path },
        };
        let err = run_config(&args).unwrap_err();
        assert!(format!("{err:#}").contains("ready_timeout_secs"));
    }

    #[test]
    fn check_accepts_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        std::fs::write(&path, "channel_prefix: sandbox\n").unwrap();
        let args = ConfigArgs {
            command: ConfigCommand::Check { path },
        };
        assert_eq!(run_config(&args).unwrap(), 0);
    }
}
