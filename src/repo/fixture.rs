//! repo::fixture
//!
//! A small, fully populated review repository for tests and examples.
//!
//! ```text
//!  Master Branch:    A--B--D--E--F--J
//!                     \   /    \  \
//!                       C       \  \
//!                                \  \
//!  Review Branch:                 G--H--I
//! ```
//!
//! Commits B and D carry submitted reviews; G carries a pending review whose
//! request was updated twice. HEAD is the master branch.

use std::collections::BTreeMap;

use crate::backend::mock::MockBackend;
use crate::core::graph::Commit;
use crate::core::snapshot::RepoSnapshot;
use crate::core::types::{CommitId, RefName, Timestamp};

use super::Repository;

pub const TARGET_REF: &str = "refs/heads/master";
pub const REVIEW_REF: &str = "refs/heads/ojarjur/mychange";
pub const REQUESTS_REF: &str = "refs/notes/devtools/reviews";
pub const COMMENTS_REF: &str = "refs/notes/devtools/discuss";

pub const AUTHOR: &str = "Test Author";
pub const AUTHOR_EMAIL: &str = "author@example.com";

pub const REQUEST_B: &str = r#"{"timestamp": "0000000001", "reviewRef": "refs/heads/ojarjur/mychange", "targetRef": "refs/heads/master", "requester": "ojarjur", "reviewers": ["ojarjur"], "description": "B"}"#;
pub const REQUEST_D: &str = r#"{"timestamp": "0000000002", "reviewRef": "refs/heads/ojarjur/mychange", "targetRef": "refs/heads/master", "requester": "ojarjur", "reviewers": ["ojarjur"], "description": "D"}"#;
pub const REQUEST_G: &str = r#"{"timestamp": "0000000004", "reviewRef": "refs/heads/ojarjur/mychange", "targetRef": "refs/heads/master", "requester": "ojarjur", "reviewers": ["ojarjur"], "description": "G"}

{"timestamp": "0000000005", "reviewRef": "refs/heads/ojarjur/mychange", "targetRef": "refs/heads/master", "requester": "ojarjur", "reviewers": ["ojarjur"], "description": "Updated description of G"}

{"timestamp": "0000000005", "reviewRef": "refs/heads/ojarjur/mychange", "targetRef": "refs/heads/master", "requester": "ojarjur", "reviewers": ["ojarjur"], "description": "Final description of G"}"#;

pub const DISCUSS_B: &str = r#"{"timestamp": "0000000001", "author": "ojarjur", "location": {"commit": "B"}, "resolved": true}"#;
pub const DISCUSS_D: &str = r#"{"timestamp": "0000000003", "author": "ojarjur", "location": {"commit": "E"}, "resolved": true}"#;

/// (id, message, time, parents), parents first.
const COMMITS: &[(&str, &str, i64, &[&str])] = &[
    ("A", "First commit", 0, &[]),
    ("B", "Second commit", 1, &["A"]),
    ("C", "No, I'm the second commit", 1, &["A"]),
    ("D", "Fourth commit", 2, &["B", "C"]),
    ("E", "Fifth commit", 3, &["D"]),
    ("F", "Sixth commit", 4, &["E"]),
    ("G", "No, I'm the sixth commit", 4, &["E"]),
    ("H", "Seventh commit", 5, &["G", "F"]),
    ("I", "Eighth commit", 6, &["H"]),
    ("J", "No, I'm the eighth commit", 6, &["F"]),
];

// The fixture is built from the constants above, which are valid names.
fn id(s: &str) -> CommitId {
    CommitId::new(s).expect("fixture commit id")
}

fn refname(s: &str) -> RefName {
    RefName::new(s).expect("fixture ref name")
}

/// The review repository's state.
pub fn review_snapshot() -> RepoSnapshot {
    let commits = COMMITS
        .iter()
        .map(|(name, message, time, parents)| {
            let commit = Commit::new(
                *message,
                Timestamp::from_seconds(*time),
                parents.iter().map(|p| id(p)).collect(),
            )
            .with_author(AUTHOR, AUTHOR_EMAIL);
            (id(name), commit)
        })
        .collect();

    let refs = BTreeMap::from([(refname(TARGET_REF), id("J")), (refname(REVIEW_REF), id("I"))]);

    let requests = BTreeMap::from([
        (id("B"), REQUEST_B.to_string()),
        (id("D"), REQUEST_D.to_string()),
        (id("G"), REQUEST_G.to_string()),
    ]);
    let comments = BTreeMap::from([
        (id("B"), DISCUSS_B.to_string()),
        (id("D"), DISCUSS_D.to_string()),
    ]);

    RepoSnapshot {
        head: Some(refname(TARGET_REF)),
        refs,
        commits,
        notes: BTreeMap::from([
            (refname(REQUESTS_REF), requests),
            (refname(COMMENTS_REF), comments),
        ]),
    }
}

/// The review repository over a fresh [`MockBackend`].
pub fn review_repo() -> Repository<MockBackend> {
    Repository::from_snapshot(review_snapshot(), MockBackend::new())
        .expect("fixture refs target fixture commits")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Note;

    #[test]
    fn layout() {
        let repo = review_repo();
        assert_eq!(repo.commits().len(), 10);
        assert_eq!(repo.refs().len(), 2);
        assert_eq!(repo.head_ref().unwrap().as_str(), TARGET_REF);
        assert_eq!(repo.commit_hash(REVIEW_REF).unwrap().as_str(), "I");
    }

    #[test]
    fn pending_review_has_three_requests() {
        let repo = review_repo();
        let notes: Vec<Note> = repo
            .get_notes(REQUESTS_REF, "G")
            .into_iter()
            .filter(|n| !n.is_empty())
            .collect();
        assert_eq!(notes.len(), 3);
        assert!(notes[2].as_str().contains("Final description of G"));
    }

    #[test]
    fn noted_revisions() {
        let repo = review_repo();
        let revs: Vec<String> = repo
            .list_noted_revisions(REQUESTS_REF)
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(revs, ["B", "D", "G"]);
        assert_eq!(repo.list_noted_revisions(COMMENTS_REF).len(), 2);
    }

    #[test]
    fn environment_matches_mock() {
        let repo = review_repo();
        assert_eq!(repo.path(), "~/mockRepo/");
        assert_eq!(repo.user_email().unwrap(), "user@example.com");
        assert_eq!(repo.core_editor().unwrap(), "vi");
        assert!(!repo.has_uncommitted_changes().unwrap());
    }
}
