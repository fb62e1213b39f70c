//! core::notes
//!
//! Append-only notes attached to commits.
//!
//! # Layout
//!
//! Notes live under a notes ref (for example `refs/notes/devtools/reviews`
//! for review requests and `refs/notes/devtools/discuss` for discussion
//! threads) and are keyed by the revision they annotate. Each (ref,
//! revision) pair holds one payload: the notes appended so far, joined by
//! newlines, oldest first.
//!
//! # Merging
//!
//! Notes fetched from a remote are reconciled with [`cat_sort_uniq`], the
//! same strategy as `git notes merge -s cat_sort_uniq`: when both sides hold
//! a different payload for a revision, the result is the sorted, deduplicated
//! union of their non-empty lines. Merging the same remote state again is a
//! no-op.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::graph::CommitGraph;
use super::types::{CommitId, Note, RefName};

/// Separator between notes in a stored payload.
pub const NOTE_SEPARATOR: char = '\n';

/// Notes grouped by notes ref, then revision, in canonical order.
pub type NotesMap = BTreeMap<RefName, BTreeMap<CommitId, String>>;

/// Merge two note payloads with the `cat_sort_uniq` strategy.
///
/// # Example
///
/// ```
/// use reviewgraph::core::notes::cat_sort_uniq;
///
/// assert_eq!(cat_sort_uniq("b\na", "c\nb"), "a\nb\nc");
/// assert_eq!(cat_sort_uniq("x\n\nx", ""), "x");
/// ```
pub fn cat_sort_uniq(local: &str, remote: &str) -> String {
    let lines: BTreeSet<&str> = local
        .split(NOTE_SEPARATOR)
        .chain(remote.split(NOTE_SEPARATOR))
        .filter(|line| !line.is_empty())
        .collect();
    lines.into_iter().collect::<Vec<_>>().join("\n")
}

/// In-memory notes store.
#[derive(Debug, Default, Clone)]
pub struct NotesStore {
    notes: HashMap<RefName, HashMap<CommitId, String>>,
}

impl NotesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every payload in `notes`, replacing existing entries.
    pub fn import(&mut self, notes: NotesMap) {
        for (notes_ref, entries) in notes {
            self.notes.entry(notes_ref).or_default().extend(entries);
        }
    }

    /// Append a note to a revision.
    ///
    /// The note becomes the last entry of the revision's sequence. Identical
    /// notes appended twice appear twice.
    ///
    /// # Example
    ///
    /// ```
    /// use reviewgraph::core::notes::NotesStore;
    /// use reviewgraph::core::types::{CommitId, Note, RefName};
    ///
    /// let mut store = NotesStore::new();
    /// let notes_ref = RefName::new("refs/notes/devtools/discuss").unwrap();
    /// let rev = CommitId::new("B").unwrap();
    ///
    /// store.append(notes_ref.clone(), rev.clone(), &Note::from("first"));
    /// store.append(notes_ref.clone(), rev.clone(), &Note::from("second"));
    ///
    /// let notes = store.list(notes_ref.as_str(), rev.as_str());
    /// assert_eq!(notes, vec![Note::from("first"), Note::from("second")]);
    /// ```
    pub fn append(&mut self, notes_ref: RefName, revision: CommitId, note: &Note) {
        tracing::debug!(notes_ref = %notes_ref, revision = %revision, "append note");
        match self.notes.entry(notes_ref).or_default().entry(revision) {
            Entry::Occupied(mut entry) => {
                let payload = entry.get_mut();
                payload.push(NOTE_SEPARATOR);
                payload.push_str(note.as_str());
            }
            Entry::Vacant(entry) => {
                entry.insert(note.as_str().to_string());
            }
        }
    }

    /// List the notes on a revision, oldest first.
    ///
    /// A revision without notes yields an empty list. A revision holding a
    /// single empty note yields one empty entry.
    pub fn list(&self, notes_ref: &str, revision: &str) -> Vec<Note> {
        match self.payload(notes_ref, revision) {
            Some(payload) => payload.split(NOTE_SEPARATOR).map(Note::from).collect(),
            None => Vec::new(),
        }
    }

    /// The raw payload stored for a revision.
    pub fn payload(&self, notes_ref: &str, revision: &str) -> Option<&str> {
        self.notes
            .get(notes_ref)
            .and_then(|entries| entries.get(revision))
            .map(String::as_str)
    }

    /// Revisions under `notes_ref` that are known commits, sorted.
    ///
    /// Notes on revisions missing from the commit graph are skipped silently.
    pub fn noted_revisions(&self, notes_ref: &str, commits: &CommitGraph) -> Vec<CommitId> {
        let mut revisions: Vec<CommitId> = self
            .notes
            .get(notes_ref)
            .into_iter()
            .flat_map(|entries| entries.keys())
            .filter(|rev| commits.contains(rev.as_str()))
            .cloned()
            .collect();
        revisions.sort();
        revisions
    }

    /// Reconcile notes fetched from a remote into `notes_ref`.
    ///
    /// Remote-only revisions are adopted, local-only revisions are kept, and
    /// revisions present on both sides with different payloads are merged
    /// with [`cat_sort_uniq`]. Returns the number of revisions changed.
    pub fn merge_remote(
        &mut self,
        notes_ref: RefName,
        remote: &BTreeMap<CommitId, String>,
    ) -> usize {
        if remote.is_empty() {
            return 0;
        }
        let local = self.notes.entry(notes_ref.clone()).or_default();
        let mut changed = 0;

        for (revision, theirs) in remote {
            match local.get_mut(revision) {
                Some(ours) if ours == theirs => {}
                Some(ours) => {
                    let merged = cat_sort_uniq(ours, theirs);
                    if *ours != merged {
                        *ours = merged;
                        changed += 1;
                    }
                }
                None => {
                    local.insert(revision.clone(), theirs.clone());
                    changed += 1;
                }
            }
        }

        tracing::debug!(notes_ref = %notes_ref, changed, "merged remote notes");
        changed
    }

    /// Copy every payload under notes refs matching `pattern`.
    pub fn matching(&self, pattern: &str) -> NotesMap {
        self.notes
            .iter()
            .filter(|(notes_ref, entries)| {
                !entries.is_empty() && notes_ref.matches_pattern(pattern)
            })
            .map(|(notes_ref, entries)| {
                let entries = entries
                    .iter()
                    .map(|(rev, payload)| (rev.clone(), payload.clone()))
                    .collect();
                (notes_ref.clone(), entries)
            })
            .collect()
    }

    /// Copy every payload, in canonical order.
    pub fn to_map(&self) -> NotesMap {
        self.matching("*")
    }
}
