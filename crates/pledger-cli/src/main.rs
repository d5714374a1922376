//! # pledger CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pledger_cli::config::{run_config, ConfigArgs};
use pledger_cli::revoke::{run_revoke, RevokeArgs};
use pledger_cli::version::{run_version, VersionArgs};

/// pledger operator CLI
///
/// Offline checks for policy versions, revocation cascades and engine
/// configuration.
#[derive(Parser, Debug)]
#[command(name = "pledger", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    /// Ignored when `RUST_LOG` is set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compare and validate policy versions.
    Version(VersionArgs),

    /// Plan revocation cascades and validate revoke-block options.
    Revoke(RevokeArgs),

    /// Validate engine configuration.
    Config(ConfigArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });
    if cli.json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    let result = match cli.command {
        Commands::Version(args) => run_version(&args),
        Commands::Revoke(args) => run_revoke(&args),
        Commands::Config(args) => run_config(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parse_version_compare() {
        let cli = Cli::try_parse_from(["pledger", "version", "compare", "1.10.0", "1.2.0"]).unwrap();
        assert!(matches!(cli.command, Commands::Version(_)));
    }

    #[test]
    fn cli_parse_revoke_plan() {
        let cli = Cli::try_parse_from([
            "pledger",
            "revoke",
            "plan",
            "--messages",
            "dump.json",
            "--trigger",
            "1700000000.000000001",
        ])
        .unwrap();
        match cli.command {
            Commands::Revoke(RevokeArgs {
                command: pledger_cli::revoke::RevokeCommand::Plan { trigger, .. },
            }) => assert_eq!(trigger, "1700000000.000000001"),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cli_parse_revoke_plan_requires_trigger() {
        assert!(Cli::try_parse_from(["pledger", "revoke", "plan", "--messages", "dump.json"]).is_err());
    }

    #[test]
    fn cli_parse_global_flags() {
        let cli = Cli::try_parse_from(["pledger", "-vv", "config", "check", "engine.yaml", "--json-logs"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.json_logs);
    }

    #[test]
    fn cli_parse_no_subcommand_errors() {
        assert!(Cli::try_parse_from(["pledger"]).is_err());
    }
}
