//! core::refs
//!
//! The ref table: named, mutable pointers into the commit graph.
//!
//! # Resolution
//!
//! Refs and raw commit ids share a resolution path. A name resolves to the
//! target of the ref with that exact name if one exists, otherwise to itself
//! if it is a known commit id.
//!
//! [`RefTable::resolve_remote`] adds a second tier for reviewers whose local
//! clone only has a remote-tracking copy of a branch: `refs/heads/<name>` is
//! retried as `refs/remotes/<remote>/<name>`.
//!
//! # Invariants
//!
//! - A ref never points at a commit missing from the commit graph

use std::collections::HashMap;

use super::error::RepoError;
use super::graph::CommitGraph;
use super::types::{CommitId, RefName, HEADS_PREFIX, REMOTES_PREFIX};

/// Mapping from ref name to the commit it currently points at.
#[derive(Debug, Default, Clone)]
pub struct RefTable {
    refs: HashMap<RefName, CommitId>,
}

impl RefTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a ref name or commit id to a commit id.
    ///
    /// # Errors
    ///
    /// - [`RepoError::UnknownRef`] if `name` is neither a ref nor a known commit
    ///
    /// # Example
    ///
    /// ```
    /// use reviewgraph::core::graph::{Commit, CommitGraph};
    /// use reviewgraph::core::refs::RefTable;
    /// use reviewgraph::core::types::{CommitId, RefName, Timestamp};
    ///
    /// let mut graph = CommitGraph::new();
    /// let a = CommitId::new("A").unwrap();
    /// graph.put_commit(a.clone(), Commit::new("root", Timestamp::from_seconds(0), vec![])).unwrap();
    ///
    /// let mut refs = RefTable::new();
    /// refs.set_ref(RefName::new("refs/heads/master").unwrap(), a.clone(), &graph).unwrap();
    ///
    /// assert_eq!(refs.resolve("refs/heads/master", &graph).unwrap(), a);
    /// assert_eq!(refs.resolve("A", &graph).unwrap(), a);
    /// assert!(refs.resolve("refs/heads/missing", &graph).is_err());
    /// ```
    pub fn resolve(&self, name: &str, commits: &CommitGraph) -> Result<CommitId, RepoError> {
        if let Some(target) = self.refs.get(name) {
            return Ok(target.clone());
        }
        commits
            .id(name)
            .cloned()
            .ok_or_else(|| RepoError::unknown_ref(name))
    }

    /// Resolve with a fallback to the remote-tracking ref.
    ///
    /// Local resolution is attempted first. On failure, the first
    /// `refs/heads/` in `name` is rewritten to `refs/remotes/<remote>/` and
    /// resolution is retried once. When both fail, the error of the second
    /// attempt is returned.
    pub fn resolve_remote(
        &self,
        name: &str,
        remote: &str,
        commits: &CommitGraph,
    ) -> Result<CommitId, RepoError> {
        if let Ok(id) = self.resolve(name, commits) {
            return Ok(id);
        }
        let fallback = name.replacen(HEADS_PREFIX, &format!("{REMOTES_PREFIX}{remote}/"), 1);
        tracing::debug!(%name, %fallback, "local ref missing, trying remote-tracking ref");
        self.resolve(&fallback, commits)
    }

    /// Point a ref at a commit, creating the ref if needed.
    ///
    /// # Errors
    ///
    /// - [`RepoError::UnknownCommit`] if `target` is not in the commit graph
    pub fn set_ref(
        &mut self,
        name: RefName,
        target: CommitId,
        commits: &CommitGraph,
    ) -> Result<(), RepoError> {
        if !commits.contains(target.as_str()) {
            return Err(RepoError::unknown_commit(&target));
        }
        tracing::debug!(refname = %name, target = %target, "set ref");
        self.refs.insert(name, target);
        Ok(())
    }

    /// Exact lookup, without falling back to commit ids.
    pub fn get(&self, name: &str) -> Option<&CommitId> {
        self.refs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.refs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    /// Iterate over all refs (unordered).
    pub fn iter(&self) -> impl Iterator<Item = (&RefName, &CommitId)> {
        self.refs.iter()
    }
}
