//! backend
//!
//! The contract between the repository facade and the environment it runs
//! in.
//!
//! # Design
//!
//! Everything the commit-graph core cannot answer on its own lives behind
//! [`Backend`]: identity and editor lookup, worktree status, diff and show
//! rendering, checkout mutation, and notes transport. The facade treats the
//! returned strings as opaque.
//!
//! Merges and rebases report the history they produced as a
//! [`HistoryUpdate`]: the new tip of the checked-out ref and every commit
//! created along the way. The facade mirrors exactly that, so its commit ids
//! always agree with the backend's.
//!
//! Two implementations ship with the crate:
//! - [`mock::MockBackend`] - deterministic, in-memory, records every call
//! - [`git::GitBackend`](super::git::GitBackend) - a real repository through `git2`
//!
//! # Example
//!
//! ```
//! use reviewgraph::backend::{Backend, mock::MockBackend};
//!
//! let backend = MockBackend::new();
//! assert_eq!(backend.user_email().unwrap(), "user@example.com");
//! assert_eq!(backend.core_editor().unwrap(), "vi");
//! assert!(!backend.has_uncommitted_changes().unwrap());
//! ```

pub mod mock;

use thiserror::Error;

use crate::core::error::RepoError;
use crate::core::graph::{Commit, CommitGraph};
use crate::core::notes::NotesMap;
use crate::core::types::CommitId;

/// Errors from backend operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The underlying git operation failed.
    #[error("git error: {message}")]
    Git {
        /// Description from git
        message: String,
    },

    /// A merge or rebase stopped on conflicts.
    #[error("conflict while {operation}: {paths:?}")]
    Conflict {
        /// What was being done
        operation: String,
        /// Conflicting paths
        paths: Vec<String>,
    },

    /// The named remote is not configured.
    #[error("remote not found: {0}")]
    RemoteNotFound(String),

    /// The backend does not implement this operation.
    #[error("not supported: {0}")]
    Unsupported(String),

    /// Filesystem error.
    #[error("i/o error: {0}")]
    Io(String),

    /// Unexpected internal state.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        BackendError::Io(e.to_string())
    }
}

impl From<RepoError> for BackendError {
    fn from(e: RepoError) -> Self {
        BackendError::Internal(e.to_string())
    }
}

/// The checked-out state a merge or rebase starts from.
#[derive(Debug, Clone, Copy)]
pub struct Checkout<'a> {
    /// Commit the checked-out ref points at (`None` if unborn)
    pub head: Option<&'a CommitId>,
    /// Commit being merged or rebased onto
    pub target: &'a CommitId,
    /// Every commit the facade knows about
    pub commits: &'a CommitGraph,
}

/// History produced by a merge or rebase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryUpdate {
    /// Where the checked-out ref now points
    pub tip: CommitId,
    /// Commits created, parents before children
    pub commits: Vec<(CommitId, Commit)>,
}

impl HistoryUpdate {
    /// The ref moved to an existing commit.
    pub fn moved_to(tip: CommitId) -> Self {
        Self {
            tip,
            commits: Vec::new(),
        }
    }
}

/// Environment, rendering, checkout and transport operations.
///
/// Methods take `&self`; implementations that track state use interior
/// mutability.
pub trait Backend {
    /// Backend name, for diagnostics.
    fn name(&self) -> &'static str;

    /// Location of the repository.
    fn path(&self) -> String;

    /// The configured user email.
    fn user_email(&self) -> Result<String, BackendError>;

    /// The editor to launch for messages.
    fn core_editor(&self) -> Result<String, BackendError>;

    /// Whether the worktree or index has changes not yet committed.
    fn has_uncommitted_changes(&self) -> Result<bool, BackendError>;

    /// Render the difference between two revisions.
    ///
    /// `args` narrows the diff (pathspecs for the git backend).
    fn diff(&self, left: &str, right: &str, args: &[String]) -> Result<String, BackendError>;

    /// Render a file as of a commit.
    fn show(&self, commit: &str, path: &str) -> Result<String, BackendError>;

    /// Check out `refname`.
    fn switch_to_ref(&self, refname: &str) -> Result<(), BackendError>;

    /// Merge `refname` into the current branch.
    ///
    /// With `fast_forward`, only a fast-forward is acceptable. `messages`
    /// are joined into the merge commit message.
    fn merge_ref(
        &self,
        refname: &str,
        fast_forward: bool,
        messages: &[String],
        checkout: Checkout<'_>,
    ) -> Result<HistoryUpdate, BackendError>;

    /// Rebase the current branch onto `refname`.
    fn rebase_ref(&self, refname: &str, checkout: Checkout<'_>)
        -> Result<HistoryUpdate, BackendError>;

    /// Publish `notes` (already filtered to `pattern`) to `remote`.
    fn push_notes(&self, remote: &str, pattern: &str, notes: &NotesMap)
        -> Result<(), BackendError>;

    /// Retrieve the remote's notes under refs matching `pattern`.
    ///
    /// Returned maps are keyed by the local notes ref name.
    fn fetch_notes(&self, remote: &str, pattern: &str) -> Result<NotesMap, BackendError>;
}
