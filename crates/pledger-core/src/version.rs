//! # Policy Versions
//!
//! Published policy versions are dotted numeric strings of one to three
//! segments (`1`, `1.2`, `1.2.3`). Ordering is segment-wise: each pair of
//! segments is compared numerically when both are digit strings of any
//! width, lexically otherwise, and a missing segment counts as `0`. Under
//! this ordering `1.10.0` sorts above `1.2.0`, which plain string
//! comparison gets wrong.

use std::cmp::Ordering;

use thiserror::Error;

/// Maximum number of dot-separated segments in a version string.
pub const MAX_VERSION_SEGMENTS: usize = 3;

/// Rejected version string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// Not one to three dot-separated non-negative integers.
    #[error("invalid version format: {0:?}")]
    InvalidFormat(String),
}

/// Validate a version string for publication.
pub fn check_version_format(version: &str) -> Result<(), VersionError> {
    let segments: Vec<&str> = version.split('.').collect();
    let well_formed = !version.is_empty()
        && segments.len() <= MAX_VERSION_SEGMENTS
        && segments
            .iter()
            .all(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()));
    if well_formed {
        Ok(())
    } else {
        Err(VersionError::InvalidFormat(version.to_string()))
    }
}

/// Compare two version strings segment-wise.
///
/// An empty string sorts below every non-empty version, so a policy without
/// a previous version accepts any first version.
pub fn version_compare(a: &str, b: &str) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        (false, false) => {}
    }

    let left: Vec<&str> = a.split('.').collect();
    let right: Vec<&str> = b.split('.').collect();
    let len = left.len().max(right.len());

    for i in 0..len {
        let l = left.get(i).copied().unwrap_or("0");
        let r = right.get(i).copied().unwrap_or("0");
        let ord = compare_segment(l, r);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn compare_segment(l: &str, r: &str) -> Ordering {
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if numeric(l) && numeric(r) {
        // Arbitrary width: strip leading zeros, then longer is larger.
        let l = l.trim_start_matches('0');
        let r = r.trim_start_matches('0');
        l.len().cmp(&r.len()).then_with(|| l.cmp(r))
    } else {
        l.cmp(r)
    }
}
