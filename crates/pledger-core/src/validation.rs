//! # Block Validation Reports
//!
//! The shape in which workflow workers and author-time block checks report
//! problems. A worker returns a [`ValidationReport`] in its readiness
//! callback; block validators append to a [`ValidationResultsContainer`].

use serde::{Deserialize, Serialize};

/// Validation outcome for one block of a policy config tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockReport {
    /// Block identifier (uuid or tag).
    pub id: String,
    /// Block type name, when known.
    #[serde(default)]
    pub name: Option<String>,
    /// False if the block reported any error.
    pub is_valid: bool,
    /// Human-readable errors.
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Validation outcome for a whole policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// Per-block results.
    #[serde(default)]
    pub blocks: Vec<BlockReport>,
    /// Errors not attributable to a single block.
    #[serde(default)]
    pub common_errors: Vec<String>,
}

impl ValidationReport {
    /// True when no block and no policy-level check reported an error.
    pub fn is_valid(&self) -> bool {
        self.common_errors.is_empty() && self.blocks.iter().all(|b| b.is_valid)
    }

    /// Iterate blocks that reported errors.
    pub fn invalid_blocks(&self) -> impl Iterator<Item = &BlockReport> {
        self.blocks.iter().filter(|b| !b.is_valid)
    }
}

/// Accumulator used by block validators.
#[derive(Debug, Default)]
pub struct ValidationResultsContainer {
    blocks: Vec<BlockReport>,
    common_errors: Vec<String>,
}

impl ValidationResultsContainer {
    /// Empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error against a block, creating its entry if needed.
    pub fn add_block_error(&mut self, block_id: &str, error: impl Into<String>) {
        let error = error.into();
        match self.blocks.iter_mut().find(|b| b.id == block_id) {
            Some(block) => {
                block.is_valid = false;
                block.errors.push(error);
            }
            None => self.blocks.push(BlockReport {
                id: block_id.to_string(),
                name: None,
                is_valid: false,
                errors: vec![error],
            }),
        }
    }

    /// Record an error that belongs to no single block.
    pub fn add_common_error(&mut self, error: impl Into<String>) {
        self.common_errors.push(error.into());
    }

    /// Freeze into a report.
    pub fn into_report(self) -> ValidationReport {
        ValidationReport {
            blocks: self.blocks,
            common_errors: self.common_errors,
        }
    }
}
