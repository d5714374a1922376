//! # Policy Archive
//!
//! The attachment of a publish message: a gzip-compressed tar stream.
//!
//! | Entry | Content |
//! |-------|---------|
//! | `policy.json` | the policy row, config resolved |
//! | `schemas.json` | schemas of the policy topic |
//! | `tokens.json` | tokens referenced by the config |
//! | `artifacts.json` | artifact rows |
//! | `artifacts/<uuid>` | artifact blobs |
//!
//! Only `policy.json` is required when decoding.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;

use pledger_store::{Artifact, Policy, Schema, Token};

use crate::error::ArchiveError;

const POLICY_ENTRY: &str = "policy.json";
const SCHEMAS_ENTRY: &str = "schemas.json";
const TOKENS_ENTRY: &str = "tokens.json";
const ARTIFACTS_ENTRY: &str = "artifacts.json";
const ARTIFACT_DIR: &str = "artifacts/";

/// An artifact row with its blob.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivedArtifact {
    /// Row.
    pub artifact: Artifact,
    /// Blob.
    pub data: Vec<u8>,
}

/// Everything needed to recreate a policy elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyArchive {
    /// The policy row.
    pub policy: Policy,
    /// Schemas of its topic.
    pub schemas: Vec<Schema>,
    /// Tokens its config references.
    pub tokens: Vec<Token>,
    /// Artifacts with blobs.
    pub artifacts: Vec<ArchivedArtifact>,
}

impl PolicyArchive {
    /// An archive holding only the policy.
    pub fn of_policy(policy: Policy) -> Self {
        Self {
            policy,
            schemas: Vec::new(),
            tokens: Vec::new(),
            artifacts: Vec::new(),
        }
    }

    /// Serialize to a gzip-compressed tar stream at `level` (0–9).
    pub fn encode(&self, level: u32) -> Result<Vec<u8>, ArchiveError> {
        let encoder = GzEncoder::new(Vec::new(), Compression::new(level));
        let mut builder = tar::Builder::new(encoder);

        append(&mut builder, POLICY_ENTRY, &json_entry(POLICY_ENTRY, &self.policy)?)?;
        append(&mut builder, SCHEMAS_ENTRY, &json_entry(SCHEMAS_ENTRY, &self.schemas)?)?;
        append(&mut builder, TOKENS_ENTRY, &json_entry(TOKENS_ENTRY, &self.tokens)?)?;
        let rows: Vec<&Artifact> = self.artifacts.iter().map(|a| &a.artifact).collect();
        append(&mut builder, ARTIFACTS_ENTRY, &json_entry(ARTIFACTS_ENTRY, &rows)?)?;
        for a in &self.artifacts {
            append(
                &mut builder,
                &format!("{ARTIFACT_DIR}{}", a.artifact.uuid),
                &a.data,
            )?;
        }

        let mut encoder = builder.into_inner()?;
        encoder.flush()?;
        Ok(encoder.finish()?)
    }

    /// Parse a stream produced by [`encode`](Self::encode).
    pub fn decode(bytes: &[u8]) -> Result<Self, ArchiveError> {
        let mut archive = tar::Archive::new(GzDecoder::new(bytes));

        let mut policy = None;
        let mut schemas = Vec::new();
        let mut tokens = Vec::new();
        let mut rows: Vec<Artifact> = Vec::new();
        let mut blobs = std::collections::HashMap::new();

        for entry in archive.entries()? {
            let mut entry = entry?;
            let path = entry.path()?.to_string_lossy().into_owned();
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            match path.as_str() {
                POLICY_ENTRY => policy = Some(parse_entry(POLICY_ENTRY, &data)?),
                SCHEMAS_ENTRY => schemas = parse_entry(SCHEMAS_ENTRY, &data)?,
                TOKENS_ENTRY => tokens = parse_entry(TOKENS_ENTRY, &data)?,
                ARTIFACTS_ENTRY => rows = parse_entry(ARTIFACTS_ENTRY, &data)?,
                other => {
                    if let Some(uuid) = other.strip_prefix(ARTIFACT_DIR) {
                        blobs.insert(uuid.to_string(), data);
                    } else {
                        tracing::debug!(entry = other, "ignoring unknown archive entry");
                    }
                }
            }
        }

        let policy = policy.ok_or(ArchiveError::MissingEntry(POLICY_ENTRY))?;
        let artifacts = rows
            .into_iter()
            .map(|artifact| ArchivedArtifact {
                data: blobs.remove(&artifact.uuid).unwrap_or_default(),
                artifact,
            })
            .collect();
        Ok(Self {
            policy,
            schemas,
            tokens,
            artifacts,
        })
    }
}

fn json_entry<T: Serialize + ?Sized>(entry: &str, value: &T) -> Result<Vec<u8>, ArchiveError> {
    serde_json::to_vec(value).map_err(|source| ArchiveError::Malformed {
        entry: entry.to_string(),
        source,
    })
}

fn parse_entry<T: DeserializeOwned>(entry: &str, data: &[u8]) -> Result<T, ArchiveError> {
    serde_json::from_slice(data).map_err(|source| ArchiveError::Malformed {
        entry: entry.to_string(),
        source,
    })
}

fn append<W: Write>(
    builder: &mut tar::Builder<W>,
    path: &str,
    data: &[u8],
) -> Result<(), ArchiveError> {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, path, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pledger_core::Did;
    use serde_json::json;
    use uuid::Uuid;

    fn make_archive() -> PolicyArchive {
        let owner = Did::from("did:test:owner");
        let mut archive = PolicyArchive::of_policy(Policy::draft(
            "Carbon",
            owner.clone(),
            json!({"blockType": "interfaceContainerBlock", "children": []}),
        ));
        archive.schemas.push(Schema::draft("Project", owner.clone(), None));
        archive.artifacts.push(ArchivedArtifact {
            artifact: Artifact {
                id: Uuid::new_v4(),
                uuid: "art-1".into(),
                policy_id: None,
                owner,
                name: "calc".into(),
                extension: "js".into(),
                artifact_type: "executableCode".into(),
            },
            data: b"return 1;".to_vec(),
        });
        archive
    }

    #[test]
    fn test_archive_contents_survive() {
        let archive = make_archive();
        let bytes = archive.encode(3).unwrap();
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
        let decoded = PolicyArchive::decode(&bytes).unwrap();
        assert_eq!(decoded, archive);
    }

    #[test]
    fn test_missing_policy_entry() {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        append(&mut builder, TOKENS_ENTRY, b"[]").unwrap();
        let bytes = builder.into_inner().unwrap().finish().unwrap();
        assert!(matches!(
            PolicyArchive::decode(&bytes),
            Err(ArchiveError::MissingEntry(POLICY_ENTRY))
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(PolicyArchive::decode(b"definitely not gzip").is_err());
    }
}
