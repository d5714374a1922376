//! # Version Subcommand
//!
//! Uses the same ordering the publish guard applies.

use std::cmp::Ordering;

use anyhow::Result;
use clap::{Args, Subcommand};

use pledger_core::{check_version_format, version_compare};

/// Arguments for the `pledger version` subcommand.
#[derive(Args, Debug)]
pub struct VersionArgs {
    #[command(subcommand)]
    pub command: VersionCommand,
}

#[derive(Subcommand, Debug)]
pub enum VersionCommand {
    /// Print how two versions order.
    Compare {
        /// Left-hand version.
        a: String,
        /// Right-hand version.
        b: String,
    },
    /// Check that a version is publishable (1 to 3 numeric segments).
    Check {
        /// Version to check.
        version: String,
    },
}

pub fn run_version(args: &VersionArgs) -> Result<u8> {
    match &args.command {
        VersionCommand::Compare { a, b } => {
            println!("{a} {} {b}", symbol(version_compare(a, b)));
            Ok(0)
        }
        VersionCommand::Check { version } => match check_version_format(version) {
            Ok(()) => {
                println!("{version}: OK");
                Ok(0)
            }
            Err(e) => {
                eprintln!("{e}");
                Ok(1)
            }
        },
    }
}

fn symbol(ordering: Ordering) -> &'static str {
    match ordering {
        Ordering::Less => "<",
        Ordering::Equal => "=",
        Ordering::Greater => ">",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_prints_segment_order() {
        assert_eq!(symbol(version_compare("1.10.0", "1.2.0")), ">");
        assert_eq!(symbol(version_compare("1.0", "1.0.0")), "=");
    }

    #[test]
    fn check_exit_codes() {
        let ok = VersionArgs {
            command: VersionCommand::Check {
                version: "1.2.3".into(),
            },
        };
        assert_eq!(run_version(&ok).unwrap(), 0);
        let bad = VersionArgs {
            command: VersionCommand::Check {
                version: "1.2.3.4".into(),
            },
        };
        assert_eq!(run_version(&bad).unwrap(), 1);
    }
}
