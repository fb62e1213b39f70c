//! core::snapshot
//!
//! Canonical, serializable copy of a repository's visible state.
//!
//! # Determinism
//!
//! Every collection in a [`RepoSnapshot`] is a `BTreeMap`, so serializing a
//! snapshot always emits keys in sorted order. The repository state hash is
//! the SHA-256 of that serialization; two repositories with the same HEAD,
//! refs, commits and notes produce the same [`Fingerprint`] no matter how
//! their in-memory maps were populated.
//!
//! # Example
//!
//! ```
//! use reviewgraph::core::snapshot::RepoSnapshot;
//!
//! let empty = RepoSnapshot::default();
//! let fp = empty.fingerprint().unwrap();
//! assert_eq!(fp, RepoSnapshot::default().fingerprint().unwrap());
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::error::RepoError;
use super::graph::Commit;
use super::notes::NotesMap;
use super::types::{CommitId, Fingerprint, RefName};

/// Errors from snapshot encoding and loading.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to parse snapshot: {0}")]
    Parse(#[source] serde_json::Error),

    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// The visible state of a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepoSnapshot {
    /// The checked-out ref
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<RefName>,
    /// Ref name to target commit
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub refs: BTreeMap<RefName, CommitId>,
    /// Commit id to commit record
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub commits: BTreeMap<CommitId, Commit>,
    /// Notes ref to revision to payload
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub notes: NotesMap,
}

impl RepoSnapshot {
    /// Canonical JSON encoding.
    pub fn to_canonical_json(&self) -> Result<Vec<u8>, SnapshotError> {
        serde_json::to_vec(self).map_err(SnapshotError::Encode)
    }

    /// Human-readable JSON encoding (same key order as the canonical form).
    pub fn to_json_pretty(&self) -> Result<String, SnapshotError> {
        serde_json::to_string_pretty(self).map_err(SnapshotError::Encode)
    }

    /// Parse a snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(json).map_err(SnapshotError::Parse)
    }

    /// Hash the canonical encoding.
    pub fn fingerprint(&self) -> Result<Fingerprint, SnapshotError> {
        Ok(Fingerprint::digest(&self.to_canonical_json()?))
    }
}
