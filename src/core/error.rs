//! core::error
//!
//! Errors raised by the commit graph, ref table, ancestry engine and notes
//! store.
//!
//! These are surfaced verbatim to callers. The only place errors are
//! recovered locally is the ancestry search, which abandons branches that
//! run into missing commits (see [`crate::core::ancestry`]).

use thiserror::Error;

use super::types::TypeError;

/// Errors from core repository operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepoError {
    /// A referenced commit is absent from the commit store.
    #[error("commit not found: {id}")]
    NotFound {
        /// The missing commit id
        id: String,
    },

    /// A name is neither a known ref nor a known commit.
    #[error("the ref {refname:?} does not exist")]
    UnknownRef {
        /// The name that failed to resolve
        refname: String,
    },

    /// A ref update or insertion targets a commit that does not exist.
    #[error("the given hash {id:?} is not a known commit")]
    UnknownCommit {
        /// The missing target
        id: String,
    },

    /// A commit id was re-inserted with different content.
    #[error("commit {id} already exists with different content")]
    IntegrityViolation {
        /// The conflicting commit id
        id: String,
    },

    /// A traversal visited more commits than the configured bound.
    #[error("traversal from {start} exceeded the limit of {limit} commits")]
    TraversalLimit {
        /// Where the traversal started
        start: String,
        /// The configured limit
        limit: usize,
    },

    /// A fast-forward-only merge was requested but history has diverged.
    #[error("cannot fast-forward {current} to {target}")]
    NotFastForward {
        /// The ref being moved
        current: String,
        /// The commit it would have moved to
        target: String,
    },

    /// A ref name or commit id failed validation.
    #[error(transparent)]
    InvalidName(#[from] TypeError),
}

impl RepoError {
    pub(crate) fn not_found(id: impl std::fmt::Display) -> Self {
        RepoError::NotFound { id: id.to_string() }
    }

    pub(crate) fn unknown_ref(refname: impl std::fmt::Display) -> Self {
        RepoError::UnknownRef {
            refname: refname.to_string(),
        }
    }

    pub(crate) fn unknown_commit(id: impl std::fmt::Display) -> Self {
        RepoError::UnknownCommit { id: id.to_string() }
    }
}
