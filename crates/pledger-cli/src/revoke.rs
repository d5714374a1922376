//! # Revoke Subcommand
//!
//! `plan` runs the dependency walk over a JSON dump of ledger messages (an
//! array in ledger order, as returned by a topic read) and prints the
//! revocation set without submitting anything. `validate` applies the
//! author-time checks of the revoke block to an options file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde_json::Value;

use pledger_core::{MessageId, ValidationResultsContainer};
use pledger_ledger::LedgerMessage;
use pledger_revoke::{MessageGraph, RevocationPlan, RevokeOptions};

use crate::read_json;

/// Arguments for the `pledger revoke` subcommand.
#[derive(Args, Debug)]
pub struct RevokeArgs {
    #[command(subcommand)]
    pub command: RevokeCommand,
}

#[derive(Subcommand, Debug)]
pub enum RevokeCommand {
    /// Print the messages a revocation of `trigger` would withdraw.
    Plan {
        /// JSON array of ledger messages.
        #[arg(long)]
        messages: PathBuf,
        /// Message id of the triggering document.
        #[arg(long)]
        trigger: String,
    },
    /// Validate revoke-block options.
    Validate {
        /// JSON block options.
        #[arg(long)]
        options: PathBuf,
    },
}

pub fn run_revoke(args: &RevokeArgs) -> Result<u8> {
    match &args.command {
        RevokeCommand::Plan { messages, trigger } => {
            let messages: Vec<LedgerMessage> = read_json(messages)?;
            let plan = plan(messages, trigger)?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
            Ok(0)
        }
        RevokeCommand::Validate { options } => {
            let options: Value = read_json(options)?;
            let mut results = ValidationResultsContainer::new();
            RevokeOptions::validate("revoke", &options, &mut results);
            let report = results.into_report();
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(if report.is_valid() { 0 } else { 1 })
        }
    }
}

fn plan(messages: Vec<LedgerMessage>, trigger: &str) -> Result<RevocationPlan> {
    let graph = MessageGraph::new(messages);
    tracing::debug!(nodes = graph.len(), trigger, "message graph loaded");
    graph
        .plan(&MessageId::from(trigger))
        .with_context(|| format!("cannot plan revocation of {trigger}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dump() -> Vec<LedgerMessage> {
        serde_json::from_value(json!([
            {"id": "1.1", "topicId": "0.0.1", "messageType": "VcDocument", "action": "CreateVc", "payload": {}},
            {"id": "1.2", "topicId": "0.0.1", "messageType": "VcDocument", "action": "CreateVc", "payload": {}, "relationships": ["1.1"]},
            {"id": "1.3", "topicId": "0.0.2", "messageType": "VpDocument", "action": "CreateVp", "payload": {}, "relationships": ["1.2"], "revoked": true},
            {"id": "1.4", "topicId": "0.0.2", "messageType": "VcDocument", "action": "CreateVc", "payload": {}, "relationships": ["1.3"]}
        ]))
        .unwrap()
    }

    #[test]
    fn plan_from_dump() {
        let plan = plan(dump(), "1.1").unwrap();
        let ids: Vec<&str> = plan.entries.iter().map(|e| e.message_id.0.as_str()).collect();
        assert_eq!(ids, vec!["1.1", "1.2", "1.4"]);
        assert_eq!(plan.skipped, vec![MessageId::from("1.3")]);

        let out = serde_json::to_value(&plan).unwrap();
        assert_eq!(out["entries"][2]["parentIds"], json!(["1.3"]));
        assert_eq!(out["entries"][2]["topicId"], "0.0.2");
    }

    #[test]
    fn plan_unknown_trigger_fails() {
        let err = plan(dump(), "9.9").unwrap_err();
        assert!(format!("{err:#}").contains("not on any topic"));
    }

    #[test]
    fn validate_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");

        std::fs::write(&path, r#"{"uiMetaData": {"updatePrevDoc": true}}"#).unwrap();
        let args = RevokeArgs {
            command: RevokeCommand::Validate {
                options: path.clone(),
            },
        };
        assert_eq!(run_revoke(&args).unwrap(), 1);

        std::fs::write(&path, r#"{"uiMetaData": {"updatePrevDoc": true, "prevDocStatus": "Rejected"}}"#)
            .unwrap();
        assert_eq!(run_revoke(&args).unwrap(), 0);
    }
}
