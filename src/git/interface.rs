//! git::interface
//!
//! [`Backend`] implementation over a real repository, using git2.
//!
//! # Architecture
//!
//! `GitBackend` is the only code in the crate that touches `git2`. It
//! answers the environment and rendering queries of the backend contract,
//! performs checkout mutations (switch, merge, rebase) on the worktree, and
//! moves notes between the local repository and a remote.
//!
//! It also loads a [`RepoSnapshot`] so that the in-memory repository can be
//! seeded from disk: branch and remote-tracking refs, every commit reachable
//! from them, HEAD, and the requested notes refs.
//!
//! # Error Handling
//!
//! `git2` errors become [`BackendError`]s. Merge and rebase conflicts are
//! reported as [`BackendError::Conflict`] with the conflicting paths, after
//! the operation has been aborted. A missing remote is
//! [`BackendError::RemoteNotFound`].
//!
//! # Example
//!
//! ```no_run
//! use reviewgraph::backend::Backend;
//! use reviewgraph::git::GitBackend;
//! use std::path::Path;
//!
//! let git = GitBackend::open(Path::new("."))?;
//! println!("{} edits with {}", git.user_email()?, git.core_editor()?);
//! # Ok::<(), reviewgraph::backend::BackendError>(())
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use git2::build::CheckoutBuilder;

use crate::backend::{Backend, BackendError, Checkout, HistoryUpdate};
use crate::core::graph::Commit;
use crate::core::notes::NotesMap;
use crate::core::snapshot::RepoSnapshot;
use crate::core::types::{CommitId, RefName, Timestamp, TypeError, NOTES_PREFIX};

/// Last-resort editor when nothing else is configured.
const DEFAULT_EDITOR: &str = "vi";

impl BackendError {
    /// Create a BackendError from a git2::Error with context.
    pub(crate) fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::Conflict | git2::ErrorCode::MergeConflict => BackendError::Conflict {
                operation: context.to_string(),
                paths: Vec::new(),
            },
            git2::ErrorCode::Locked => BackendError::Io(format!(
                "repository is locked: {}",
                err.message()
            )),
            _ => BackendError::Git {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }
}

impl From<git2::Error> for BackendError {
    fn from(err: git2::Error) -> Self {
        BackendError::Git {
            message: err.message().to_string(),
        }
    }
}

impl From<TypeError> for BackendError {
    fn from(err: TypeError) -> Self {
        BackendError::Internal(err.to_string())
    }
}

/// A repository on disk.
pub struct GitBackend {
    repo: git2::Repository,
    editor_fallback: Option<String>,
}

impl std::fmt::Debug for GitBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitBackend")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl GitBackend {
    /// Open the repository containing `path`.
    ///
    /// Uses `git2::Repository::discover`, so `path` can be any directory
    /// within the repository.
    ///
    /// # Errors
    ///
    /// - [`BackendError::Git`] if no repository is found
    /// - [`BackendError::Unsupported`] if the repository is bare
    pub fn open(path: &Path) -> Result<Self, BackendError> {
        let repo = git2::Repository::discover(path).map_err(|_| BackendError::Git {
            message: format!("not a git repository: {}", path.display()),
        })?;

        if repo.is_bare() {
            return Err(BackendError::Unsupported("bare repository".to_string()));
        }

        tracing::debug!(path = %repo.path().display(), "opened repository");
        Ok(Self {
            repo,
            editor_fallback: None,
        })
    }

    /// Editor to report when neither git nor the environment names one.
    pub fn with_editor_fallback(mut self, editor: Option<String>) -> Self {
        self.editor_fallback = editor;
        self
    }

    /// The repository's shared git directory.
    ///
    /// For a linked worktree this is the main repository's `.git`, not the
    /// per-worktree directory.
    pub fn git_dir(&self) -> &Path {
        self.repo.commondir()
    }

    // =========================================================================
    // Snapshot Loading
    // =========================================================================

    /// Read the repository's visible state.
    ///
    /// Imports branch and remote-tracking refs, every commit reachable from
    /// them, the ref HEAD points at, and the notes under each of
    /// `notes_refs` that exists. Symbolic refs other than HEAD are skipped.
    pub fn load_snapshot(&self, notes_refs: &[&str]) -> Result<RepoSnapshot, BackendError> {
        let mut snapshot = RepoSnapshot {
            head: self.head_ref()?,
            ..Default::default()
        };

        let mut walk = self.repo.revwalk()?;
        for reference in self.repo.references()? {
            let reference = reference?;
            let Some(name) = reference.name() else {
                continue;
            };
            if !(name.starts_with("refs/heads/") || name.starts_with("refs/remotes/")) {
                continue;
            }
            if reference.symbolic_target().is_some() {
                continue;
            }
            let commit = reference
                .peel_to_commit()
                .map_err(|e| BackendError::from_git2(e, name))?;
            snapshot
                .refs
                .insert(RefName::new(name)?, CommitId::new(commit.id().to_string())?);
            walk.push(commit.id())?;
        }

        for oid in walk {
            let commit = self.repo.find_commit(oid?)?;
            snapshot
                .commits
                .insert(CommitId::new(commit.id().to_string())?, convert_commit(&commit)?);
        }

        for notes_ref in notes_refs {
            let entries = self.read_notes(notes_ref)?;
            if !entries.is_empty() {
                snapshot.notes.insert(RefName::new(*notes_ref)?, entries);
            }
        }

        tracing::debug!(
            refs = snapshot.refs.len(),
            commits = snapshot.commits.len(),
            notes_refs = snapshot.notes.len(),
            "loaded snapshot"
        );
        Ok(snapshot)
    }

    /// The ref HEAD points at, or `None` when detached.
    fn head_ref(&self) -> Result<Option<RefName>, BackendError> {
        let head = self.repo.find_reference("HEAD")?;
        match head.symbolic_target() {
            Some(target) => Ok(Some(RefName::new(target)?)),
            None => Ok(None),
        }
    }

    /// Every note under `notes_ref`, keyed by annotated commit.
    fn read_notes(&self, notes_ref: &str) -> Result<BTreeMap<CommitId, String>, BackendError> {
        let mut entries = BTreeMap::new();
        let notes = match self.repo.notes(Some(notes_ref)) {
            Ok(notes) => notes,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(entries),
            Err(e) => return Err(BackendError::from_git2(e, notes_ref)),
        };

        for item in notes {
            let (_, annotated) = item?;
            let note = self.repo.find_note(Some(notes_ref), annotated)?;
            let payload = note.message().unwrap_or("");
            let payload = payload.strip_suffix('\n').unwrap_or(payload);
            entries.insert(CommitId::new(annotated.to_string())?, payload.to_string());
        }
        Ok(entries)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn find_reference(&self, refname: &str) -> Result<git2::Reference<'_>, BackendError> {
        self.repo
            .resolve_reference_from_short_name(refname)
            .map_err(|e| BackendError::from_git2(e, refname))
    }

    fn find_remote(&self, remote: &str) -> Result<git2::Remote<'_>, BackendError> {
        self.repo.find_remote(remote).map_err(|e| match e.code() {
            git2::ErrorCode::NotFound | git2::ErrorCode::InvalidSpec => {
                BackendError::RemoteNotFound(remote.to_string())
            }
            _ => BackendError::from_git2(e, remote),
        })
    }

    fn tree_of(&self, revision: &str) -> Result<git2::Tree<'_>, BackendError> {
        self.repo
            .revparse_single(revision)
            .and_then(|obj| obj.peel_to_tree())
            .map_err(|e| BackendError::from_git2(e, revision))
    }

    /// Move HEAD (or the branch it names) to `target`, updating the worktree.
    fn fast_forward(&self, target: git2::Oid, refname: &str) -> Result<(), BackendError> {
        let object = self.repo.find_object(target, None)?;
        self.repo
            .checkout_tree(&object, Some(CheckoutBuilder::new().safe()))?;

        let mut head = self.repo.head()?;
        if head.is_branch() {
            head.set_target(target, &format!("merge {}: Fast-forward", refname))?;
        } else {
            self.repo.set_head_detached(target)?;
        }
        Ok(())
    }

    /// Commits reachable from `tip` but from none of `known`, parents first.
    fn recorded_since(
        &self,
        tip: git2::Oid,
        known: &[git2::Oid],
    ) -> Result<HistoryUpdate, BackendError> {
        let mut walk = self.repo.revwalk()?;
        walk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::REVERSE)?;
        walk.push(tip)?;
        for oid in known {
            walk.hide(*oid)?;
        }

        let mut commits = Vec::new();
        for oid in walk {
            let commit = self.repo.find_commit(oid?)?;
            commits.push((CommitId::new(commit.id().to_string())?, convert_commit(&commit)?));
        }
        Ok(HistoryUpdate {
            tip: CommitId::new(tip.to_string())?,
            commits,
        })
    }

    fn head_commit(&self) -> Result<git2::Oid, BackendError> {
        Ok(self.repo.head()?.peel_to_commit()?.id())
    }

    /// Undo a stopped merge and report its conflicts.
    fn abort_merge(&self, operation: String) -> Result<BackendError, BackendError> {
        let paths = conflict_paths(&self.repo.index()?)?;
        self.repo.cleanup_state()?;
        self.repo
            .checkout_head(Some(CheckoutBuilder::new().force()))?;
        tracing::warn!(%operation, conflicts = paths.len(), "aborted on conflicts");
        Ok(BackendError::Conflict { operation, paths })
    }
}

/// Paths with unresolved conflicts in `index`.
fn conflict_paths(index: &git2::Index) -> Result<Vec<String>, BackendError> {
    let mut paths = Vec::new();
    for conflict in index.conflicts()? {
        let conflict = conflict?;
        let entry = conflict.our.or(conflict.their).or(conflict.ancestor);
        if let Some(entry) = entry {
            paths.push(String::from_utf8_lossy(&entry.path).into_owned());
        }
    }
    Ok(paths)
}

fn convert_commit(commit: &git2::Commit<'_>) -> Result<Commit, BackendError> {
    let parents = commit
        .parent_ids()
        .map(|oid| CommitId::new(oid.to_string()))
        .collect::<Result<Vec<_>, _>>()?;
    let author = commit.author();
    Ok(Commit::new(
        commit.message().unwrap_or(""),
        Timestamp::from_seconds(commit.time().seconds()),
        parents,
    )
    .with_author(author.name().unwrap_or(""), author.email().unwrap_or("")))
}

impl Backend for GitBackend {
    fn name(&self) -> &'static str {
        "git"
    }

    fn path(&self) -> String {
        self.repo
            .workdir()
            .unwrap_or_else(|| self.repo.path())
            .display()
            .to_string()
    }

    fn user_email(&self) -> Result<String, BackendError> {
        self.repo
            .config()?
            .get_string("user.email")
            .map_err(|e| BackendError::from_git2(e, "user.email"))
    }

    fn core_editor(&self) -> Result<String, BackendError> {
        if let Ok(editor) = std::env::var("GIT_EDITOR") {
            if !editor.is_empty() {
                return Ok(editor);
            }
        }
        match self.repo.config()?.get_string("core.editor") {
            Ok(editor) if !editor.is_empty() => return Ok(editor),
            Ok(_) => {}
            Err(e) if e.code() == git2::ErrorCode::NotFound => {}
            Err(e) => return Err(BackendError::from_git2(e, "core.editor")),
        }
        if let Ok(editor) = std::env::var("EDITOR") {
            if !editor.is_empty() {
                return Ok(editor);
            }
        }
        Ok(self
            .editor_fallback
            .clone()
            .unwrap_or_else(|| DEFAULT_EDITOR.to_string()))
    }

    fn has_uncommitted_changes(&self) -> Result<bool, BackendError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(false).include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut opts))?;
        Ok(statuses
            .iter()
            .any(|entry| entry.status() != git2::Status::CURRENT))
    }

    fn diff(&self, left: &str, right: &str, args: &[String]) -> Result<String, BackendError> {
        let old_tree = self.tree_of(left)?;
        let new_tree = self.tree_of(right)?;

        let mut opts = git2::DiffOptions::new();
        for pathspec in args {
            opts.pathspec(pathspec);
        }
        let diff = self
            .repo
            .diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut opts))?;

        let mut out = String::new();
        diff.print(git2::DiffFormat::Patch, |_delta, _hunk, line| {
            if matches!(line.origin(), '+' | '-' | ' ') {
                out.push(line.origin());
            }
            out.push_str(&String::from_utf8_lossy(line.content()));
            true
        })?;
        Ok(out)
    }

    fn show(&self, commit: &str, path: &str) -> Result<String, BackendError> {
        let tree = self
            .repo
            .revparse_single(commit)
            .and_then(|obj| obj.peel_to_commit())
            .and_then(|c| c.tree())
            .map_err(|e| BackendError::from_git2(e, commit))?;
        let entry = tree
            .get_path(Path::new(path))
            .map_err(|e| BackendError::from_git2(e, &format!("{}:{}", commit, path)))?;
        let blob = entry.to_object(&self.repo)?.peel_to_blob()?;
        Ok(String::from_utf8_lossy(blob.content()).into_owned())
    }

    fn switch_to_ref(&self, refname: &str) -> Result<(), BackendError> {
        let reference = self.find_reference(refname)?;
        let commit = reference.peel_to_commit()?;
        self.repo
            .checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().safe()))
            .map_err(|e| BackendError::from_git2(e, &format!("switching to {}", refname)))?;

        match reference.name() {
            Some(name) if reference.is_branch() => self.repo.set_head(name)?,
            _ => self.repo.set_head_detached(commit.id())?,
        }
        tracing::debug!(%refname, "switched");
        Ok(())
    }

    fn merge_ref(
        &self,
        refname: &str,
        fast_forward: bool,
        messages: &[String],
        _checkout: Checkout<'_>,
    ) -> Result<HistoryUpdate, BackendError> {
        let reference = self.find_reference(refname)?;
        let theirs = self.repo.reference_to_annotated_commit(&reference)?;
        let (analysis, _) = self.repo.merge_analysis(&[&theirs])?;

        if analysis.is_up_to_date() {
            return Ok(HistoryUpdate::moved_to(CommitId::new(
                self.head_commit()?.to_string(),
            )?));
        }
        if analysis.is_fast_forward() {
            tracing::debug!(%refname, "fast-forward merge");
            self.fast_forward(theirs.id(), refname)?;
            return Ok(HistoryUpdate::moved_to(CommitId::new(theirs.id().to_string())?));
        }
        if fast_forward {
            return Err(BackendError::Git {
                message: format!("not possible to fast-forward to {}", refname),
            });
        }

        self.repo.merge(&[&theirs], None, None)?;
        let mut index = self.repo.index()?;
        if index.has_conflicts() {
            return Err(self.abort_merge(format!("merging {}", refname))?);
        }

        let tree = self.repo.find_tree(index.write_tree()?)?;
        let signature = self.repo.signature()?;
        let ours = self.repo.head()?.peel_to_commit()?;
        let their_commit = self.repo.find_commit(theirs.id())?;
        let message = if messages.is_empty() {
            format!("Merge {}", refname)
        } else {
            messages.join("\n\n")
        };

        let merged = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            &message,
            &tree,
            &[&ours, &their_commit],
        )?;
        self.repo.cleanup_state()?;
        tracing::debug!(%refname, %merged, "created merge commit");
        self.recorded_since(merged, &[ours.id(), their_commit.id()])
    }

    fn rebase_ref(
        &self,
        refname: &str,
        _checkout: Checkout<'_>,
    ) -> Result<HistoryUpdate, BackendError> {
        let reference = self.find_reference(refname)?;
        let upstream = self.repo.reference_to_annotated_commit(&reference)?;
        let old_head = self.head_commit()?;
        if old_head == upstream.id() || self.repo.graph_descendant_of(old_head, upstream.id())? {
            tracing::debug!(%refname, "already based on target");
            return Ok(HistoryUpdate::moved_to(CommitId::new(old_head.to_string())?));
        }

        let signature = self.repo.signature()?;
        let mut rebase = self.repo.rebase(None, Some(&upstream), None, None)?;

        while let Some(operation) = rebase.next() {
            if let Err(e) = operation {
                rebase.abort()?;
                return Err(BackendError::from_git2(e, &format!("rebasing onto {}", refname)));
            }
            let index = self.repo.index()?;
            if index.has_conflicts() {
                let paths = conflict_paths(&index)?;
                rebase.abort()?;
                return Err(BackendError::Conflict {
                    operation: format!("rebasing onto {}", refname),
                    paths,
                });
            }
            match rebase.commit(None, &signature, None) {
                Ok(_) => {}
                // The change is already upstream.
                Err(e) if e.code() == git2::ErrorCode::Applied => {}
                Err(e) => {
                    rebase.abort()?;
                    return Err(BackendError::from_git2(e, &format!("rebasing onto {}", refname)));
                }
            }
        }

        rebase.finish(Some(&signature))?;
        let new_head = self.head_commit()?;
        tracing::debug!(%refname, %new_head, "rebased");
        self.recorded_since(new_head, &[old_head, upstream.id()])
    }

    fn push_notes(
        &self,
        remote: &str,
        pattern: &str,
        notes: &NotesMap,
    ) -> Result<(), BackendError> {
        let signature = self.repo.signature()?;
        for (notes_ref, entries) in notes {
            for (revision, payload) in entries {
                let oid = git2::Oid::from_str(revision.as_str())
                    .map_err(|e| BackendError::from_git2(e, revision.as_str()))?;
                self.repo.note(
                    &signature,
                    &signature,
                    Some(notes_ref.as_str()),
                    oid,
                    payload,
                    true,
                )?;
            }
        }

        let refspecs: Vec<String> = notes
            .keys()
            .map(|notes_ref| format!("{0}:{0}", notes_ref))
            .collect();
        if refspecs.is_empty() {
            return Ok(());
        }

        let mut rejected = Vec::new();
        {
            let mut callbacks = git2::RemoteCallbacks::new();
            callbacks.push_update_reference(|refname, status| {
                if let Some(message) = status {
                    rejected.push(format!("{}: {}", refname, message));
                }
                Ok(())
            });
            let mut opts = git2::PushOptions::new();
            opts.remote_callbacks(callbacks);

            let mut handle = self.find_remote(remote)?;
            handle
                .push(&refspecs, Some(&mut opts))
                .map_err(|e| BackendError::from_git2(e, &format!("pushing {}", pattern)))?;
        }

        if !rejected.is_empty() {
            return Err(BackendError::Git {
                message: format!("push rejected: {}", rejected.join(", ")),
            });
        }
        tracing::debug!(%remote, %pattern, refs = refspecs.len(), "pushed notes");
        Ok(())
    }

    fn fetch_notes(&self, remote: &str, pattern: &str) -> Result<NotesMap, BackendError> {
        let rest = pattern.strip_prefix(NOTES_PREFIX).ok_or_else(|| {
            BackendError::Unsupported(format!("notes pattern outside {}: {}", NOTES_PREFIX, pattern))
        })?;
        let tracking = format!("{}remotes/{}/", NOTES_PREFIX, remote);
        let refspec = format!("+{}:{}{}", pattern, tracking, rest);

        let mut handle = self.find_remote(remote)?;
        handle
            .fetch(&[refspec.as_str()], None, None)
            .map_err(|e| BackendError::from_git2(e, &format!("fetching {}", pattern)))?;

        let mut fetched = NotesMap::new();
        for reference in self.repo.references()? {
            let reference = reference?;
            let Some(name) = reference.name() else {
                continue;
            };
            let Some(tail) = name.strip_prefix(&tracking) else {
                continue;
            };
            let local = RefName::new(format!("{}{}", NOTES_PREFIX, tail))?;
            if local.matches_pattern(pattern) {
                let entries = self.read_notes(name)?;
                fetched.insert(local, entries);
            }
        }

        tracing::debug!(%remote, %pattern, refs = fetched.len(), "fetched notes");
        Ok(fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_codes_map_to_conflict() {
        let err = git2::Error::new(
            git2::ErrorCode::MergeConflict,
            git2::ErrorClass::Merge,
            "conflict",
        );
        assert!(matches!(
            BackendError::from_git2(err, "merging refs/heads/x"),
            BackendError::Conflict { operation, .. } if operation == "merging refs/heads/x"
        ));
    }

    #[test]
    fn other_codes_keep_context() {
        let err = git2::Error::new(
            git2::ErrorCode::NotFound,
            git2::ErrorClass::Reference,
            "no such ref",
        );
        let mapped = BackendError::from_git2(err, "refs/heads/gone");
        assert_eq!(
            mapped.to_string(),
            "git error: refs/heads/gone: no such ref"
        );
    }

    #[test]
    fn open_outside_repository_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(GitBackend::open(dir.path()).is_err());
    }
}
