//! backend::mock
//!
//! Mock backend for deterministic testing.
//!
//! # Design
//!
//! The mock backend answers environment queries with fixed values, renders
//! diffs and files as short descriptive strings, records every call, and
//! serves notes from an in-memory "remote" that tests seed directly. Pushes
//! are written into that remote, so a push followed by a fetch round-trips.
//! Merges and rebases are computed over the commits the caller passes in:
//! merge commits and replayed commits get content-derived ids.
//! A single operation can be configured to fail.
//!
//! # Example
//!
//! ```
//! use reviewgraph::backend::{Backend, BackendError, Checkout};
//! use reviewgraph::backend::mock::{FailOn, MockBackend, MockOperation};
//! use reviewgraph::core::graph::CommitGraph;
//! use reviewgraph::core::types::CommitId;
//!
//! let backend = MockBackend::new()
//!     .fail_on(FailOn::RebaseRef(BackendError::Unsupported("rebase".into())));
//!
//! let commits = CommitGraph::new();
//! let target = CommitId::new("B").unwrap();
//! let checkout = Checkout { head: None, target: &target, commits: &commits };
//!
//! assert!(backend.switch_to_ref("refs/heads/feature").is_ok());
//! assert!(backend.rebase_ref("refs/heads/master", checkout).is_err());
//! assert_eq!(backend.operations().len(), 2);
//! assert!(matches!(backend.operations()[0], MockOperation::SwitchToRef { .. }));
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Backend, BackendError, Checkout, HistoryUpdate};
use crate::core::ancestry::Ancestry;
use crate::core::graph::Commit;
use crate::core::notes::{cat_sort_uniq, NotesMap};
use crate::core::types::{CommitId, RefName};

/// Fixed location reported by the mock.
pub const MOCK_PATH: &str = "~/mockRepo/";

/// Fixed user email reported by the mock.
pub const MOCK_USER_EMAIL: &str = "user@example.com";

/// Fixed editor reported by the mock.
pub const MOCK_EDITOR: &str = "vi";

/// Mock backend for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    inner: Arc<Mutex<MockBackendInner>>,
}

#[derive(Debug, Default)]
struct MockBackendInner {
    /// Notes held by each remote.
    remotes: BTreeMap<String, NotesMap>,
    /// Reported worktree state.
    dirty: bool,
    /// Operation to fail on (for testing error paths).
    fail_on: Option<FailOn>,
    /// Recorded operations for verification.
    operations: Vec<MockOperation>,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    UserEmail(BackendError),
    SwitchToRef(BackendError),
    MergeRef(BackendError),
    RebaseRef(BackendError),
    PushNotes(BackendError),
    FetchNotes(BackendError),
    Diff(BackendError),
    Show(BackendError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    Diff {
        left: String,
        right: String,
        args: Vec<String>,
    },
    Show {
        commit: String,
        path: String,
    },
    SwitchToRef {
        refname: String,
    },
    MergeRef {
        refname: String,
        fast_forward: bool,
        messages: Vec<String>,
    },
    RebaseRef {
        refname: String,
    },
    PushNotes {
        remote: String,
        pattern: String,
        revisions: usize,
    },
    FetchNotes {
        remote: String,
        pattern: String,
    },
}

impl MockBackend {
    /// Create a mock backend with empty remotes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the notes a remote will serve on fetch.
    ///
    /// Entries are merged into whatever the remote already holds.
    pub fn with_remote_notes(self, remote: &str, notes: NotesMap) -> Self {
        {
            let mut inner = self.lock();
            let held = inner.remotes.entry(remote.to_string()).or_default();
            merge_into(held, notes);
        }
        self
    }

    /// Report uncommitted changes from now on.
    pub fn with_uncommitted_changes(self, dirty: bool) -> Self {
        self.lock().dirty = dirty;
        self
    }

    /// Configure the mock to fail on a specific operation.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.lock().fail_on = Some(fail_on);
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        self.lock().fail_on = None;
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.lock().operations.clone()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        self.lock().operations.clear();
    }

    /// Notes currently held by a remote (for test verification).
    pub fn remote_notes(&self, remote: &str) -> NotesMap {
        self.lock().remotes.get(remote).cloned().unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, MockBackendInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, op: MockOperation) {
        self.lock().operations.push(op);
    }

    /// Return the configured error if `expected` is the failing operation.
    fn check_fail(&self, expected: &str) -> Result<(), BackendError> {
        let inner = self.lock();
        let err = match &inner.fail_on {
            Some(FailOn::UserEmail(e)) if expected == "user_email" => e,
            Some(FailOn::SwitchToRef(e)) if expected == "switch_to_ref" => e,
            Some(FailOn::MergeRef(e)) if expected == "merge_ref" => e,
            Some(FailOn::RebaseRef(e)) if expected == "rebase_ref" => e,
            Some(FailOn::PushNotes(e)) if expected == "push_notes" => e,
            Some(FailOn::FetchNotes(e)) if expected == "fetch_notes" => e,
            Some(FailOn::Diff(e)) if expected == "diff" => e,
            Some(FailOn::Show(e)) if expected == "show" => e,
            _ => return Ok(()),
        };
        Err(err.clone())
    }
}

/// Fold `incoming` into `held` the way a notes push with `cat_sort_uniq` would.
fn merge_into(held: &mut NotesMap, incoming: NotesMap) {
    for (notes_ref, entries) in incoming {
        let target: &mut BTreeMap<CommitId, String> = held.entry(notes_ref).or_default();
        for (revision, payload) in entries {
            match target.get_mut(&revision) {
                Some(existing) if *existing != payload => {
                    *existing = cat_sort_uniq(existing, &payload);
                }
                Some(_) => {}
                None => {
                    target.insert(revision, payload);
                }
            }
        }
    }
}

impl Backend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn path(&self) -> String {
        MOCK_PATH.to_string()
    }

    fn user_email(&self) -> Result<String, BackendError> {
        self.check_fail("user_email")?;
        Ok(MOCK_USER_EMAIL.to_string())
    }

    fn core_editor(&self) -> Result<String, BackendError> {
        Ok(MOCK_EDITOR.to_string())
    }

    fn has_uncommitted_changes(&self) -> Result<bool, BackendError> {
        Ok(self.lock().dirty)
    }

    fn diff(&self, left: &str, right: &str, args: &[String]) -> Result<String, BackendError> {
        self.record(MockOperation::Diff {
            left: left.to_string(),
            right: right.to_string(),
            args: args.to_vec(),
        });
        self.check_fail("diff")?;
        Ok(format!("Diff between {:?} and {:?}", left, right))
    }

    fn show(&self, commit: &str, path: &str) -> Result<String, BackendError> {
        self.record(MockOperation::Show {
            commit: commit.to_string(),
            path: path.to_string(),
        });
        self.check_fail("show")?;
        Ok(format!("{}:{}", commit, path))
    }

    fn switch_to_ref(&self, refname: &str) -> Result<(), BackendError> {
        self.record(MockOperation::SwitchToRef {
            refname: refname.to_string(),
        });
        self.check_fail("switch_to_ref")
    }

    fn merge_ref(
        &self,
        refname: &str,
        fast_forward: bool,
        messages: &[String],
        checkout: Checkout<'_>,
    ) -> Result<HistoryUpdate, BackendError> {
        self.record(MockOperation::MergeRef {
            refname: refname.to_string(),
            fast_forward,
            messages: messages.to_vec(),
        });
        self.check_fail("merge_ref")?;

        let target = checkout.target;
        let Some(head) = checkout.head else {
            return Ok(HistoryUpdate::moved_to(target.clone()));
        };
        let ancestry = Ancestry::new(checkout.commits);
        if ancestry.is_ancestor(target.as_str(), head.as_str())? {
            return Ok(HistoryUpdate::moved_to(head.clone()));
        }
        if ancestry.is_ancestor(head.as_str(), target.as_str())? {
            return Ok(HistoryUpdate::moved_to(target.clone()));
        }
        if fast_forward {
            return Err(BackendError::Git {
                message: format!("not possible to fast-forward to {}", refname),
            });
        }

        let message = if messages.is_empty() {
            format!("Merge {}", refname)
        } else {
            messages.join("\n\n")
        };
        let time = checkout
            .commits
            .get(head.as_str())?
            .time
            .max(checkout.commits.get(target.as_str())?.time);
        let email = self.user_email()?;
        let commit =
            Commit::new(message, time, vec![head.clone(), target.clone()]).with_author("", email);
        let id = commit.content_id();
        Ok(HistoryUpdate {
            tip: id.clone(),
            commits: vec![(id, commit)],
        })
    }

    fn rebase_ref(
        &self,
        refname: &str,
        checkout: Checkout<'_>,
    ) -> Result<HistoryUpdate, BackendError> {
        self.record(MockOperation::RebaseRef {
            refname: refname.to_string(),
        });
        self.check_fail("rebase_ref")?;

        let onto = checkout.target;
        let Some(head) = checkout.head else {
            return Ok(HistoryUpdate::moved_to(onto.clone()));
        };
        let ancestry = Ancestry::new(checkout.commits);
        if ancestry.is_ancestor(onto.as_str(), head.as_str())? {
            return Ok(HistoryUpdate::moved_to(head.clone()));
        }

        // Merge commits are dropped, as git does by default.
        let mut tip = onto.clone();
        let mut replayed = Vec::new();
        for old in ancestry.commits_between(onto.as_str(), head.as_str())? {
            let original = checkout.commits.get(old.as_str())?;
            if original.is_merge() {
                continue;
            }
            let commit = Commit {
                parents: vec![tip],
                ..original.clone()
            };
            tip = commit.content_id();
            replayed.push((tip.clone(), commit));
        }
        Ok(HistoryUpdate {
            tip,
            commits: replayed,
        })
    }

    fn push_notes(
        &self,
        remote: &str,
        pattern: &str,
        notes: &NotesMap,
    ) -> Result<(), BackendError> {
        self.record(MockOperation::PushNotes {
            remote: remote.to_string(),
            pattern: pattern.to_string(),
            revisions: notes.values().map(BTreeMap::len).sum(),
        });
        self.check_fail("push_notes")?;

        let mut inner = self.lock();
        let held = inner.remotes.entry(remote.to_string()).or_default();
        merge_into(held, notes.clone());
        Ok(())
    }

    fn fetch_notes(&self, remote: &str, pattern: &str) -> Result<NotesMap, BackendError> {
        self.record(MockOperation::FetchNotes {
            remote: remote.to_string(),
            pattern: pattern.to_string(),
        });
        self.check_fail("fetch_notes")?;

        let inner = self.lock();
        let held = inner
            .remotes
            .get(remote)
            .ok_or_else(|| BackendError::RemoteNotFound(remote.to_string()))?;
        Ok(held
            .iter()
            .filter(|(notes_ref, _)| RefName::matches_pattern(notes_ref, pattern))
            .map(|(notes_ref, entries)| (notes_ref.clone(), entries.clone()))
            .collect())
    }
}
