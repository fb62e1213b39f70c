//! core::graph
//!
//! The commit graph store.
//!
//! # Architecture
//!
//! The commit graph is a DAG where:
//! - Nodes are commits, keyed by [`CommitId`]
//! - Edges point from child to parent (stored as the commit's parent list)
//! - Roots are commits with no parents
//!
//! Commits refer to each other by id only; the store is the sole owner of
//! commit data.
//!
//! # Invariants
//!
//! - Commits are immutable once inserted; there is no deletion
//! - Re-inserting an id with different content is an integrity violation
//! - [`CommitGraph::put_commit`] only accepts parents that already exist, so
//!   the graph is acyclic by construction
//! - [`CommitGraph::import`] may load a partial view (missing parents), which
//!   traversals must tolerate

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::error::RepoError;
use super::types::{CommitId, Timestamp};

/// An immutable commit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Full commit message
    pub message: String,
    /// Commit time
    pub time: Timestamp,
    /// Parent ids, in recorded order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<CommitId>,
    /// Author name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author_name: String,
    /// Author email
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author_email: String,
}

impl Commit {
    /// Create a commit without author information.
    ///
    /// # Example
    ///
    /// ```
    /// use reviewgraph::core::graph::Commit;
    /// use reviewgraph::core::types::{CommitId, Timestamp};
    ///
    /// let a = CommitId::new("A").unwrap();
    /// let commit = Commit::new("Second commit", Timestamp::from_seconds(1), vec![a]);
    /// assert!(!commit.is_root());
    /// assert!(!commit.is_merge());
    /// ```
    pub fn new(message: impl Into<String>, time: Timestamp, parents: Vec<CommitId>) -> Self {
        Self {
            message: message.into(),
            time,
            parents,
            author_name: String::new(),
            author_email: String::new(),
        }
    }

    /// Attach author information.
    pub fn with_author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.author_name = name.into();
        self.author_email = email.into();
        self
    }

    /// First line of the message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    /// The last parent, as ordered by git.
    pub fn last_parent(&self) -> Option<&CommitId> {
        self.parents.last()
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// Id derived from the commit's content.
    ///
    /// Used for commits a backend synthesizes without writing them anywhere
    /// (the mock's merges and rebases). Equal content always yields the
    /// same id.
    pub fn content_id(&self) -> CommitId {
        let time = self.time.to_string();
        let mut content = Vec::new();
        for field in [
            self.message.as_str(),
            time.as_str(),
            self.author_name.as_str(),
            self.author_email.as_str(),
        ] {
            content.extend_from_slice(field.as_bytes());
            content.push(0);
        }
        for parent in &self.parents {
            content.extend_from_slice(parent.as_str().as_bytes());
            content.push(b'\n');
        }
        CommitId::for_content(&content)
    }
}

/// Commit metadata as reported to higher layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitDetails {
    pub author: String,
    pub author_email: String,
    pub summary: String,
    pub time: Timestamp,
    pub parents: Vec<CommitId>,
}

impl From<&Commit> for CommitDetails {
    fn from(commit: &Commit) -> Self {
        Self {
            author: commit.author_name.clone(),
            author_email: commit.author_email.clone(),
            summary: commit.summary().to_string(),
            time: commit.time,
            parents: commit.parents.clone(),
        }
    }
}

/// Append-only store of commits keyed by id.
#[derive(Debug, Default, Clone)]
pub struct CommitGraph {
    commits: HashMap<CommitId, Commit>,
}

impl CommitGraph {
    /// Create an empty commit graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a commit.
    ///
    /// # Errors
    ///
    /// - [`RepoError::IntegrityViolation`] if `id` exists with different content
    /// - [`RepoError::UnknownCommit`] if a parent is not already stored
    ///
    /// # Example
    ///
    /// ```
    /// use reviewgraph::core::graph::{Commit, CommitGraph};
    /// use reviewgraph::core::types::{CommitId, Timestamp};
    ///
    /// let mut graph = CommitGraph::new();
    /// let a = CommitId::new("A").unwrap();
    /// let b = CommitId::new("B").unwrap();
    ///
    /// graph.put_commit(a.clone(), Commit::new("root", Timestamp::from_seconds(0), vec![])).unwrap();
    /// graph.put_commit(b, Commit::new("child", Timestamp::from_seconds(1), vec![a])).unwrap();
    /// assert_eq!(graph.len(), 2);
    /// ```
    pub fn put_commit(&mut self, id: CommitId, commit: Commit) -> Result<(), RepoError> {
        if self.check_existing(&id, &commit)? {
            return Ok(());
        }
        if let Some(missing) = commit.parents.iter().find(|p| !self.commits.contains_key(*p)) {
            return Err(RepoError::unknown_commit(missing));
        }
        tracing::trace!(commit = %id, parents = commit.parents.len(), "put commit");
        self.commits.insert(id, commit);
        Ok(())
    }

    /// Bulk-load commits that may reference parents outside the view.
    ///
    /// Used for shallow or pruned snapshots. The integrity rule still
    /// applies; parent existence is not checked.
    pub fn import(
        &mut self,
        commits: impl IntoIterator<Item = (CommitId, Commit)>,
    ) -> Result<(), RepoError> {
        for (id, commit) in commits {
            if !self.check_existing(&id, &commit)? {
                self.commits.insert(id, commit);
            }
        }
        Ok(())
    }

    /// Returns `Ok(true)` if an identical commit is already stored.
    fn check_existing(&self, id: &CommitId, commit: &Commit) -> Result<bool, RepoError> {
        match self.commits.get(id) {
            Some(existing) if existing == commit => Ok(true),
            Some(_) => Err(RepoError::IntegrityViolation { id: id.to_string() }),
            None => Ok(false),
        }
    }

    /// Look up a commit.
    ///
    /// # Errors
    ///
    /// - [`RepoError::NotFound`] if `id` is absent
    pub fn get(&self, id: &str) -> Result<&Commit, RepoError> {
        self.commits.get(id).ok_or_else(|| RepoError::not_found(id))
    }

    /// Look up a commit's parents.
    pub fn parents(&self, id: &str) -> Result<&[CommitId], RepoError> {
        self.get(id).map(|c| c.parents.as_slice())
    }

    /// Check whether a commit is stored.
    pub fn contains(&self, id: &str) -> bool {
        self.commits.contains_key(id)
    }

    /// Get the stored id matching `id`.
    pub fn id(&self, id: &str) -> Option<&CommitId> {
        self.commits.get_key_value(id).map(|(k, _)| k)
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Iterate over all commits (unordered).
    pub fn iter(&self) -> impl Iterator<Item = (&CommitId, &Commit)> {
        self.commits.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> CommitId {
        CommitId::new(s).unwrap()
    }

    fn commit(message: &str, time: i64, parents: &[&str]) -> Commit {
        Commit::new(
            message,
            Timestamp::from_seconds(time),
            parents.iter().map(|p| id(p)).collect(),
        )
    }

    #[test]
    fn empty_graph() {
        let graph = CommitGraph::new();
        assert!(graph.is_empty());
        assert!(matches!(graph.get("A"), Err(RepoError::NotFound { .. })));
    }

    #[test]
    fn identical_reinsert_is_noop() {
        let mut graph = CommitGraph::new();
        graph.put_commit(id("A"), commit("root", 0, &[])).unwrap();
        graph.put_commit(id("A"), commit("root", 0, &[])).unwrap();
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn conflicting_reinsert_is_integrity_violation() {
        let mut graph = CommitGraph::new();
        graph.put_commit(id("A"), commit("root", 0, &[])).unwrap();
        let err = graph.put_commit(id("A"), commit("other", 0, &[])).unwrap_err();
        assert_eq!(err, RepoError::IntegrityViolation { id: "A".into() });
        assert_eq!(graph.get("A").unwrap().message, "root");
    }

    #[test]
    fn missing_parent_rejected() {
        let mut graph = CommitGraph::new();
        let err = graph.put_commit(id("B"), commit("child", 1, &["A"])).unwrap_err();
        assert_eq!(err, RepoError::UnknownCommit { id: "A".into() });
        assert!(!graph.contains("B"));
    }

    #[test]
    fn import_allows_partial_views() {
        let mut graph = CommitGraph::new();
        graph
            .import(vec![(id("B"), commit("child", 1, &["A"]))])
            .unwrap();
        assert!(graph.contains("B"));
        assert!(!graph.contains("A"));
    }

    #[test]
    fn import_keeps_integrity_rule() {
        let mut graph = CommitGraph::new();
        graph.put_commit(id("A"), commit("root", 0, &[])).unwrap();
        let err = graph
            .import(vec![(id("A"), commit("rewritten", 0, &[]))])
            .unwrap_err();
        assert!(matches!(err, RepoError::IntegrityViolation { .. }));
    }

    #[test]
    fn commit_accessors() {
        let merge = commit("Merge\n\nbody", 2, &["B", "C"]).with_author("Test Author", "a@b.c");
        assert_eq!(merge.summary(), "Merge");
        assert_eq!(merge.last_parent(), Some(&id("C")));
        assert!(merge.is_merge());

        let details = CommitDetails::from(&merge);
        assert_eq!(details.author, "Test Author");
        assert_eq!(details.summary, "Merge");
        assert_eq!(details.parents, vec![id("B"), id("C")]);
    }

    #[test]
    fn content_id_tracks_content() {
        let a = commit("msg", 1, &["A"]);
        assert_eq!(a.content_id(), commit("msg", 1, &["A"]).content_id());
        assert_ne!(a.content_id(), commit("msg", 2, &["A"]).content_id());
        assert_ne!(a.content_id(), commit("msg", 1, &["B"]).content_id());
        assert_eq!(a.content_id().as_str().len(), 64);
    }
}
