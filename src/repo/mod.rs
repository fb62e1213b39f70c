//! repo
//!
//! The repository facade.
//!
//! # Architecture
//!
//! [`Repository`] owns the commit graph, the ref table, the notes store and
//! HEAD, and answers the whole query and command surface used by review
//! tooling:
//!
//! - ref and commit verification, with local-then-remote ref resolution
//! - commit metadata (message, time, last parent, details)
//! - ancestry queries and the commits between two revisions
//! - note read, append and listing, plus notes push and pull
//! - pass-through rendering and environment queries
//! - switch, merge and rebase, mirroring the history the backend reports
//!
//! Queries take `&self` and never touch the backend. Mutations take
//! `&mut self`; there is no internal locking.
//!
//! # Example
//!
//! ```
//! use reviewgraph::repo::fixture;
//!
//! let repo = fixture::review_repo();
//! let master = repo.resolve_ref_commit("refs/heads/master").unwrap();
//! let review = repo.resolve_ref_commit("refs/heads/ojarjur/mychange").unwrap();
//!
//! let base = repo.merge_base(master.as_str(), review.as_str()).unwrap();
//! assert_eq!(base.unwrap().as_str(), "F");
//! ```

pub mod fixture;

use std::path::Path;

use thiserror::Error;

use crate::backend::{Backend, BackendError, Checkout, HistoryUpdate};
use crate::core::ancestry::Ancestry;
use crate::core::config::{Config, ConfigError};
use crate::core::error::RepoError;
use crate::core::graph::{Commit, CommitDetails, CommitGraph};
use crate::core::notes::NotesStore;
use crate::core::refs::RefTable;
use crate::core::snapshot::{RepoSnapshot, SnapshotError};
use crate::core::types::{CommitId, Fingerprint, Note, RefName, Timestamp};
use crate::git::GitBackend;

/// Errors from facade operations.
///
/// Every variant is transparent, so the underlying message reaches the
/// caller unchanged.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A repository: commits, refs, notes and HEAD, over a [`Backend`].
#[derive(Debug)]
pub struct Repository<B: Backend> {
    commits: CommitGraph,
    refs: RefTable,
    notes: NotesStore,
    head: Option<RefName>,
    config: Config,
    backend: B,
}

impl Repository<GitBackend> {
    /// Open the repository containing `path` and load its state.
    ///
    /// Configuration is loaded from the standard locations, with the repo
    /// file read from the shared git directory. Branch and
    /// remote-tracking refs, the commits they reach, HEAD, and the review
    /// request and discussion notes are read into memory.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let backend = GitBackend::open(path)?;
        let config = Config::load(Some(backend.git_dir()))?;
        let backend = backend.with_editor_fallback(config.editor().map(String::from));

        let snapshot = backend.load_snapshot(&[config.requests_ref(), config.comments_ref()])?;
        let repo = Self::from_snapshot(snapshot, backend)?.with_config(config);
        tracing::debug!(path = %repo.path(), commits = repo.commits.len(), "opened repository");
        Ok(repo)
    }
}

impl<B: Backend> Repository<B> {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Create an empty repository with no HEAD.
    pub fn new(backend: B) -> Self {
        Self {
            commits: CommitGraph::new(),
            refs: RefTable::new(),
            notes: NotesStore::new(),
            head: None,
            config: Config::default(),
            backend,
        }
    }

    /// Create a repository holding the state in `snapshot`.
    ///
    /// Commits are imported as a possibly partial view, so parents outside
    /// the snapshot are allowed.
    ///
    /// # Errors
    ///
    /// - [`RepoError::UnknownCommit`] if a ref targets a commit outside the snapshot
    pub fn from_snapshot(snapshot: RepoSnapshot, backend: B) -> Result<Self, RepoError> {
        let mut repo = Self::new(backend);
        repo.commits.import(snapshot.commits)?;
        for (name, target) in snapshot.refs {
            repo.refs.set_ref(name, target, &repo.commits)?;
        }
        repo.notes.import(snapshot.notes);
        repo.head = snapshot.head;
        Ok(repo)
    }

    /// Apply configuration (remote, traversal bound).
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    // =========================================================================
    // State access
    // =========================================================================

    pub fn commits(&self) -> &CommitGraph {
        &self.commits
    }

    pub fn refs(&self) -> &RefTable {
        &self.refs
    }

    pub fn notes(&self) -> &NotesStore {
        &self.notes
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The ref that is currently checked out.
    pub fn head_ref(&self) -> Option<&RefName> {
        self.head.as_ref()
    }

    /// Canonical copy of the visible state.
    pub fn snapshot(&self) -> RepoSnapshot {
        RepoSnapshot {
            head: self.head.clone(),
            refs: self
                .refs
                .iter()
                .map(|(name, target)| (name.clone(), target.clone()))
                .collect(),
            commits: self
                .commits
                .iter()
                .map(|(id, commit)| (id.clone(), commit.clone()))
                .collect(),
            notes: self.notes.to_map(),
        }
    }

    /// Fingerprint of the visible state.
    ///
    /// Identical HEAD, refs, commits and notes always produce the same
    /// fingerprint; any change produces a different one.
    pub fn repo_state_hash(&self) -> Result<Fingerprint, Error> {
        Ok(self.snapshot().fingerprint()?)
    }

    fn ancestry(&self) -> Ancestry<'_> {
        Ancestry::new(&self.commits).with_limit(self.config.max_traversal())
    }

    // =========================================================================
    // Environment (delegated)
    // =========================================================================

    pub fn path(&self) -> String {
        self.backend.path()
    }

    pub fn user_email(&self) -> Result<String, Error> {
        Ok(self.backend.user_email()?)
    }

    pub fn core_editor(&self) -> Result<String, Error> {
        Ok(self.backend.core_editor()?)
    }

    pub fn has_uncommitted_changes(&self) -> Result<bool, Error> {
        Ok(self.backend.has_uncommitted_changes()?)
    }

    pub fn diff(&self, left: &str, right: &str, args: &[String]) -> Result<String, Error> {
        Ok(self.backend.diff(left, right, args)?)
    }

    pub fn show(&self, commit: &str, path: &str) -> Result<String, Error> {
        Ok(self.backend.show(commit, path)?)
    }

    // =========================================================================
    // Verification and resolution
    // =========================================================================

    /// Check that `hash` names a known commit.
    pub fn verify_commit(&self, hash: &str) -> Result<(), RepoError> {
        if self.commits.contains(hash) {
            Ok(())
        } else {
            Err(RepoError::unknown_commit(hash))
        }
    }

    /// Check that `refname` resolves locally.
    pub fn verify_ref(&self, refname: &str) -> Result<(), RepoError> {
        self.refs.resolve(refname, &self.commits).map(|_| ())
    }

    /// The commit `refname` points at, resolving locally only.
    ///
    /// Use this for operations only the branch owner performs.
    pub fn commit_hash(&self, refname: &str) -> Result<CommitId, RepoError> {
        self.refs.resolve(refname, &self.commits)
    }

    /// The commit `refname` points at, falling back to the remote-tracking
    /// ref of the configured remote.
    ///
    /// Use this when either the reviewer or the reviewee may run the
    /// operation.
    pub fn resolve_ref_commit(&self, refname: &str) -> Result<CommitId, RepoError> {
        self.refs
            .resolve_remote(refname, self.config.remote(), &self.commits)
    }

    fn commit_for(&self, refname: &str) -> Result<&Commit, RepoError> {
        let id = self.refs.resolve(refname, &self.commits)?;
        self.commits.get(id.as_str())
    }

    // =========================================================================
    // Commit metadata
    // =========================================================================

    pub fn commit_message(&self, refname: &str) -> Result<&str, RepoError> {
        self.commit_for(refname).map(|c| c.message.as_str())
    }

    pub fn commit_time(&self, refname: &str) -> Result<Timestamp, RepoError> {
        self.commit_for(refname).map(|c| c.time)
    }

    /// The last parent of a commit, as ordered by git. `None` for roots.
    pub fn last_parent(&self, refname: &str) -> Result<Option<&CommitId>, RepoError> {
        self.commit_for(refname).map(Commit::last_parent)
    }

    pub fn commit_details(&self, refname: &str) -> Result<CommitDetails, RepoError> {
        self.commit_for(refname).map(CommitDetails::from)
    }

    // =========================================================================
    // Ancestry
    // =========================================================================

    /// Ancestors of the commit `refname` resolves to, nearest first.
    pub fn ancestors(&self, refname: &str) -> Result<Vec<CommitId>, RepoError> {
        let id = self.commit_hash(refname)?;
        self.ancestry().ancestors(id.as_str())
    }

    /// Whether `ancestor` is reachable from `descendant` (reflexive).
    ///
    /// An `ancestor` that names no ref and no known commit is simply not an
    /// ancestor.
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool, RepoError> {
        let ancestor = self.commit_or_raw(ancestor)?;
        let descendant = self.commit_or_raw(descendant)?;
        self.ancestry()
            .is_ancestor(ancestor.as_str(), descendant.as_str())
    }

    /// A common ancestor of `a` and `b`, if one exists.
    ///
    /// A `b` that names no ref and no known commit has no merge base.
    pub fn merge_base(&self, a: &str, b: &str) -> Result<Option<CommitId>, RepoError> {
        let a = self.commit_or_raw(a)?;
        let b = self.commit_or_raw(b)?;
        self.ancestry().merge_base(a.as_str(), b.as_str())
    }

    /// Resolve `name` like [`Self::commit_hash`], but hand unknown names to
    /// the ancestry engine as commit ids so it can apply its own rules.
    fn commit_or_raw(&self, name: &str) -> Result<CommitId, RepoError> {
        match self.commit_hash(name) {
            Ok(id) => Ok(id),
            Err(RepoError::UnknownRef { .. }) => Ok(CommitId::new(name)?),
            Err(e) => Err(e),
        }
    }

    /// Commits after `from` up to and including `to`, oldest first.
    ///
    /// If `from` is not an ancestor of `to`, the listing starts at their
    /// merge base instead.
    pub fn list_commits_between(&self, from: &str, to: &str) -> Result<Vec<CommitId>, RepoError> {
        let from = self.commit_hash(from)?;
        let to = self.commit_hash(to)?;
        self.ancestry()
            .commits_between(from.as_str(), to.as_str())
    }

    // =========================================================================
    // Notes
    // =========================================================================

    /// Notes on `revision` under `notes_ref`, oldest first.
    pub fn get_notes(&self, notes_ref: &str, revision: &str) -> Vec<Note> {
        self.notes.list(notes_ref, revision)
    }

    /// Append a note to `revision` under `notes_ref`.
    ///
    /// # Errors
    ///
    /// - [`RepoError::InvalidName`] if either name is malformed
    pub fn append_note(
        &mut self,
        notes_ref: &str,
        revision: &str,
        note: &Note,
    ) -> Result<(), RepoError> {
        let notes_ref = RefName::new(notes_ref)?;
        let revision = CommitId::new(revision)?;
        self.notes.append(notes_ref, revision, note);
        Ok(())
    }

    /// Known commits carrying notes under `notes_ref`, sorted.
    pub fn list_noted_revisions(&self, notes_ref: &str) -> Vec<CommitId> {
        self.notes.noted_revisions(notes_ref, &self.commits)
    }

    /// Publish local notes under refs matching `pattern` to `remote`.
    pub fn push_notes(&self, remote: &str, pattern: &str) -> Result<(), Error> {
        let notes = self.notes.matching(pattern);
        self.backend.push_notes(remote, pattern, &notes)?;
        tracing::debug!(%remote, %pattern, refs = notes.len(), "pushed notes");
        Ok(())
    }

    /// Fetch `remote`'s notes under refs matching `pattern` and merge them
    /// into the local notes.
    ///
    /// Returns the number of revisions whose notes changed. Pulling the same
    /// remote state again changes nothing.
    pub fn pull_notes(&mut self, remote: &str, pattern: &str) -> Result<usize, Error> {
        let fetched = self.backend.fetch_notes(remote, pattern)?;
        let mut changed = 0;
        for (notes_ref, entries) in fetched {
            if notes_ref.matches_pattern(pattern) {
                changed += self.notes.merge_remote(notes_ref, &entries);
            }
        }
        tracing::debug!(%remote, %pattern, changed, "pulled notes");
        Ok(changed)
    }

    // =========================================================================
    // History mutation
    // =========================================================================

    /// Insert a commit. Parents must already exist.
    pub fn put_commit(&mut self, id: CommitId, commit: Commit) -> Result<(), RepoError> {
        self.commits.put_commit(id, commit)
    }

    /// Point `name` at `target`, creating the ref if needed.
    pub fn set_ref(&mut self, name: &str, target: &str) -> Result<(), RepoError> {
        let name = RefName::new(name)?;
        let target = CommitId::new(target)?;
        self.refs.set_ref(name, target, &self.commits)
    }

    /// Check out `refname`.
    pub fn switch_to_ref(&mut self, refname: &str) -> Result<(), Error> {
        let name = RefName::new(refname).map_err(RepoError::from)?;
        self.verify_ref(refname)?;
        self.backend.switch_to_ref(refname)?;
        tracing::debug!(%refname, "switched HEAD");
        self.head = Some(name);
        Ok(())
    }

    /// Merge `refname` into the checked-out ref.
    ///
    /// When the checked-out commit is an ancestor of the target, the ref is
    /// fast-forwarded. Otherwise the backend records a merge commit with
    /// `messages` joined by blank lines (or a default message), unless
    /// `fast_forward` was requested, in which case the merge fails with
    /// [`RepoError::NotFastForward`] before the backend is called.
    pub fn merge_ref(
        &mut self,
        refname: &str,
        fast_forward: bool,
        messages: &[String],
    ) -> Result<(), Error> {
        let target = self.commit_hash(refname)?;
        let (head, current) = self.checked_out()?;

        if let (true, Some(current)) = (fast_forward, &current) {
            let ancestry = self.ancestry();
            if !ancestry.is_ancestor(target.as_str(), current.as_str())?
                && !ancestry.is_ancestor(current.as_str(), target.as_str())?
            {
                return Err(RepoError::NotFastForward {
                    current: format!("{} ({})", head, current),
                    target: target.to_string(),
                }
                .into());
            }
        }

        let checkout = Checkout {
            head: current.as_ref(),
            target: &target,
            commits: &self.commits,
        };
        let update = self
            .backend
            .merge_ref(refname, fast_forward, messages, checkout)?;
        self.apply(&head, update)?;
        tracing::debug!(%refname, head = %head, "merged");
        Ok(())
    }

    /// Rebase the checked-out ref onto `refname`.
    ///
    /// The commits between the merge base and the checked-out commit are
    /// replayed, oldest first, on top of the target. Merge commits are
    /// dropped, as git does by default.
    pub fn rebase_ref(&mut self, refname: &str) -> Result<(), Error> {
        let onto = self.commit_hash(refname)?;
        let (head, current) = self.checked_out()?;

        let checkout = Checkout {
            head: current.as_ref(),
            target: &onto,
            commits: &self.commits,
        };
        let update = self.backend.rebase_ref(refname, checkout)?;
        self.apply(&head, update)?;
        tracing::debug!(%refname, head = %head, "rebased");
        Ok(())
    }

    /// Record the commits a merge or rebase created and move `head`.
    fn apply(&mut self, head: &RefName, update: HistoryUpdate) -> Result<(), RepoError> {
        for (id, commit) in update.commits {
            self.commits.put_commit(id, commit)?;
        }
        if self.refs.get(head.as_str()) != Some(&update.tip) {
            self.refs.set_ref(head.clone(), update.tip, &self.commits)?;
        }
        Ok(())
    }

    /// HEAD's ref and the commit it points at (`None` if the ref is unborn).
    fn checked_out(&self) -> Result<(RefName, Option<CommitId>), RepoError> {
        let head = self
            .head
            .clone()
            .ok_or_else(|| RepoError::unknown_ref("HEAD"))?;
        let current = self.refs.get(head.as_str()).cloned();
        Ok((head, current))
    }
}
