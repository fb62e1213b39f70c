//! Integration tests for the git backend.
//!
//! These tests use real git repositories created via tempfile to verify
//! that loading, rendering, checkout mutations and notes transport work
//! against actual git state.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

use reviewgraph::backend::{Backend, BackendError};
use reviewgraph::core::types::{CommitId, Note};
use reviewgraph::git::GitBackend;
use reviewgraph::Repository;

const REQUESTS_REF: &str = "refs/notes/devtools/reviews";
const COMMENTS_REF: &str = "refs/notes/devtools/discuss";
const MAIN: &str = "refs/heads/main";
const FEATURE: &str = "refs/heads/feature";

/// Test fixture that creates a real git repository.
struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    /// Create a new test repository on `main` with an initial commit.
    fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");

        run_git(dir.path(), &["init"]);
        run_git(dir.path(), &["symbolic-ref", "HEAD", MAIN]);
        configure(dir.path());

        std::fs::write(dir.path().join("README.md"), "# Test Repo\n").unwrap();
        run_git(dir.path(), &["add", "README.md"]);
        run_git(dir.path(), &["commit", "-m", "Initial commit"]);

        Self { dir }
    }

    /// Clone `remote` into a fresh directory.
    fn clone_from(remote: &Path) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        run_git(
            dir.path(),
            &["clone", remote.to_str().unwrap(), "."],
        );
        configure(dir.path());
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn open(&self) -> Repository<GitBackend> {
        Repository::open(self.path()).expect("failed to open test repo")
    }

    /// Create a file and commit it, returning the new commit id.
    fn commit_file(&self, path: &str, content: &str, message: &str) -> String {
        std::fs::write(self.path().join(path), content).unwrap();
        run_git(self.path(), &["add", path]);
        run_git(self.path(), &["commit", "-m", message]);
        self.rev_parse("HEAD")
    }

    fn rev_parse(&self, rev: &str) -> String {
        git_output(self.path(), &["rev-parse", rev])
    }

    fn head_ref(&self) -> String {
        git_output(self.path(), &["symbolic-ref", "HEAD"])
    }

    /// `main` with one commit, `feature` branched from it with one more.
    fn with_feature() -> (Self, String, String) {
        let repo = Self::new();
        let base = repo.rev_parse("HEAD");
        run_git(repo.path(), &["checkout", "-b", "feature"]);
        let tip = repo.commit_file("feature.txt", "feature\n", "Add feature");
        run_git(repo.path(), &["checkout", "main"]);
        (repo, base, tip)
    }
}

fn configure(dir: &Path) {
    run_git(dir, &["config", "user.email", "test@example.com"]);
    run_git(dir, &["config", "user.name", "Test User"]);
    run_git(dir, &["config", "commit.gpgsign", "false"]);
}

/// Run a git command in the given directory.
fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed");

    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

fn git_output(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed");
    assert!(output.status.success(), "git {:?} failed", args);
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

// =============================================================================
// Opening and loading
// =============================================================================

#[test]
fn open_from_subdirectory() {
    let repo = TestRepo::new();
    let subdir = repo.path().join("subdir");
    std::fs::create_dir(&subdir).unwrap();

    assert!(GitBackend::open(&subdir).is_ok());
}

#[test]
fn open_non_repository_fails() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        GitBackend::open(dir.path()),
        Err(BackendError::Git { .. })
    ));
}

#[test]
fn open_bare_repository_is_unsupported() {
    let dir = TempDir::new().unwrap();
    run_git(dir.path(), &["init", "--bare"]);
    assert!(matches!(
        GitBackend::open(dir.path()),
        Err(BackendError::Unsupported(_))
    ));
}

#[test]
fn loads_refs_commits_and_head() {
    let (repo, base, tip) = TestRepo::with_feature();
    let loaded = repo.open();

    assert_eq!(loaded.head_ref().unwrap().as_str(), MAIN);
    assert_eq!(loaded.commit_hash(MAIN).unwrap().as_str(), base);
    assert_eq!(loaded.commit_hash(FEATURE).unwrap().as_str(), tip);
    assert_eq!(loaded.commits().len(), 2);

    let details = loaded.commit_details(FEATURE).unwrap();
    assert_eq!(details.author, "Test User");
    assert_eq!(details.author_email, "test@example.com");
    assert_eq!(details.summary, "Add feature");
    assert_eq!(details.parents, vec![CommitId::new(base.clone()).unwrap()]);

    assert!(loaded.is_ancestor(MAIN, FEATURE).unwrap());
    assert_eq!(loaded.list_commits_between(MAIN, FEATURE).unwrap().len(), 1);
}

#[test]
fn loads_review_notes() {
    let repo = TestRepo::new();
    let head = repo.rev_parse("HEAD");
    run_git(
        repo.path(),
        &["notes", "--ref", REQUESTS_REF, "add", "-m", "{\"description\": \"first\"}", "HEAD"],
    );
    run_git(
        repo.path(),
        &["notes", "--ref", REQUESTS_REF, "append", "-m", "{\"description\": \"second\"}", "HEAD"],
    );

    let loaded = repo.open();
    let notes = loaded.get_notes(REQUESTS_REF, &head);
    let notes: Vec<&str> = notes.iter().map(Note::as_str).filter(|n| !n.is_empty()).collect();
    assert_eq!(notes, ["{\"description\": \"first\"}", "{\"description\": \"second\"}"]);
    assert_eq!(loaded.list_noted_revisions(REQUESTS_REF).len(), 1);
    assert!(loaded.list_noted_revisions(COMMENTS_REF).is_empty());
}

#[test]
fn linked_worktree_reads_shared_repo_config() {
    let repo = TestRepo::new();
    let parent = TempDir::new().unwrap();
    let worktree = parent.path().join("wt");
    run_git(
        repo.path(),
        &["worktree", "add", worktree.to_str().unwrap(), "-b", "wt"],
    );

    let config_dir = repo.path().join(".git/reviewgraph");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("config.toml"), "remote = \"upstream\"\n").unwrap();

    let from_worktree = Repository::open(&worktree).unwrap();
    assert_eq!(from_worktree.config().remote(), "upstream");
    assert_eq!(from_worktree.head_ref().unwrap().as_str(), "refs/heads/wt");
    assert_eq!(repo.open().config().remote(), "upstream");
}

#[test]
fn state_hash_is_stable_across_opens() {
    let (repo, _, _) = TestRepo::with_feature();
    let first = repo.open().repo_state_hash().unwrap();
    let second = repo.open().repo_state_hash().unwrap();
    assert_eq!(first, second);

    repo.commit_file("more.txt", "more\n", "More");
    assert_ne!(repo.open().repo_state_hash().unwrap(), first);
}

// =============================================================================
// Environment and rendering
// =============================================================================

#[test]
fn environment_queries() {
    let repo = TestRepo::new();
    let loaded = repo.open();

    assert_eq!(loaded.user_email().unwrap(), "test@example.com");
    assert!(!loaded.core_editor().unwrap().is_empty());
    assert!(!loaded.has_uncommitted_changes().unwrap());

    std::fs::write(repo.path().join("README.md"), "changed\n").unwrap();
    assert!(loaded.has_uncommitted_changes().unwrap());
}

#[test]
fn untracked_files_are_not_uncommitted_changes() {
    let repo = TestRepo::new();
    std::fs::write(repo.path().join("scratch.txt"), "scratch\n").unwrap();
    assert!(!repo.open().has_uncommitted_changes().unwrap());
}

#[test]
fn diff_and_show() {
    let repo = TestRepo::new();
    let first = repo.rev_parse("HEAD");
    let second = repo.commit_file("README.md", "# Test Repo\nnew line\n", "Extend readme");
    let loaded = repo.open();

    let diff = loaded.diff(&first, &second, &[]).unwrap();
    assert!(diff.contains("+new line"));

    let filtered = loaded
        .diff(&first, &second, &["other.txt".to_string()])
        .unwrap();
    assert!(filtered.is_empty());

    assert_eq!(loaded.show(&first, "README.md").unwrap(), "# Test Repo\n");
    assert!(loaded.show(&first, "missing.txt").is_err());
}

// =============================================================================
// Checkout mutations
// =============================================================================

#[test]
fn switch_moves_head_on_disk_and_in_memory() {
    let (repo, _, _) = TestRepo::with_feature();
    let mut loaded = repo.open();

    loaded.switch_to_ref(FEATURE).unwrap();
    assert_eq!(repo.head_ref(), FEATURE);
    assert_eq!(loaded.head_ref().unwrap().as_str(), FEATURE);
    assert!(repo.path().join("feature.txt").exists());
}

#[test]
fn merge_fast_forwards_main() {
    let (repo, _, tip) = TestRepo::with_feature();
    let mut loaded = repo.open();

    loaded.merge_ref(FEATURE, true, &[]).unwrap();
    assert_eq!(repo.rev_parse("main"), tip);
    assert_eq!(loaded.commit_hash(MAIN).unwrap().as_str(), tip);
    assert!(repo.path().join("feature.txt").exists());
}

#[test]
fn merge_diverged_records_merge_commit() {
    let (repo, _, tip) = TestRepo::with_feature();
    let main_tip = repo.commit_file("main.txt", "main\n", "Main work");
    let mut loaded = repo.open();

    loaded
        .merge_ref(FEATURE, false, &["Merge feature".to_string()])
        .unwrap();

    let parents = git_output(repo.path(), &["log", "-1", "--format=%P", "main"]);
    assert_eq!(parents, format!("{} {}", main_tip, tip));

    let merged = loaded.commit_hash(MAIN).unwrap();
    let details = loaded.commit_details(merged.as_str()).unwrap();
    assert_eq!(details.summary, "Merge feature");
    assert_eq!(details.parents.len(), 2);
}

#[test]
fn merge_commit_in_memory_matches_disk() {
    let (repo, _, _) = TestRepo::with_feature();
    repo.commit_file("main.txt", "main\n", "Main work");
    let mut loaded = repo.open();

    loaded.merge_ref(FEATURE, false, &[]).unwrap();

    let merged = loaded.commit_hash(MAIN).unwrap();
    assert_eq!(merged.as_str(), repo.rev_parse("main"));
    assert_eq!(loaded.show(merged.as_str(), "feature.txt").unwrap(), "feature\n");
    assert_eq!(
        loaded.repo_state_hash().unwrap(),
        repo.open().repo_state_hash().unwrap()
    );
}

#[test]
fn fast_forward_only_merge_of_diverged_history_fails() {
    let (repo, _, _) = TestRepo::with_feature();
    let main_tip = repo.commit_file("main.txt", "main\n", "Main work");
    let mut loaded = repo.open();

    assert!(loaded.merge_ref(FEATURE, true, &[]).is_err());
    assert_eq!(repo.rev_parse("main"), main_tip);
    assert_eq!(loaded.commit_hash(MAIN).unwrap().as_str(), main_tip);
}

#[test]
fn rebase_replays_feature_onto_main() {
    let (repo, _, _) = TestRepo::with_feature();
    let main_tip = repo.commit_file("main.txt", "main\n", "Main work");
    let mut loaded = repo.open();

    loaded.switch_to_ref(FEATURE).unwrap();
    loaded.rebase_ref(MAIN).unwrap();

    let on_disk = Command::new("git")
        .args(["merge-base", "--is-ancestor", "main", "feature"])
        .current_dir(repo.path())
        .status()
        .unwrap();
    assert!(on_disk.success());

    assert!(loaded.is_ancestor(&main_tip, FEATURE).unwrap());
    assert_eq!(loaded.commit_message(FEATURE).unwrap().trim_end(), "Add feature");

    let rebased = loaded.commit_hash(FEATURE).unwrap();
    assert_eq!(rebased.as_str(), repo.rev_parse("feature"));
    assert!(loaded.show(rebased.as_str(), "main.txt").is_ok());
}

#[test]
fn rebase_of_up_to_date_branch_keeps_commits() {
    let (repo, _, tip) = TestRepo::with_feature();
    let mut loaded = repo.open();

    loaded.switch_to_ref(FEATURE).unwrap();
    loaded.rebase_ref(MAIN).unwrap();

    assert_eq!(repo.rev_parse("feature"), tip);
    assert_eq!(loaded.commit_hash(FEATURE).unwrap().as_str(), tip);
}

// =============================================================================
// Notes transport
// =============================================================================

#[test]
fn notes_push_and_pull_through_remote() {
    let alice = TestRepo::new();
    let head = alice.rev_parse("HEAD");

    let remote = TempDir::new().unwrap();
    run_git(
        remote.path(),
        &["clone", "--bare", alice.path().to_str().unwrap(), "."],
    );
    run_git(
        alice.path(),
        &["remote", "add", "origin", remote.path().to_str().unwrap()],
    );
    let bob = TestRepo::clone_from(remote.path());

    let mut alice_repo = alice.open();
    alice_repo
        .append_note(COMMENTS_REF, &head, &Note::from("{\"description\": \"lgtm\"}"))
        .unwrap();
    alice_repo
        .push_notes("origin", "refs/notes/devtools/*")
        .unwrap();

    let mut bob_repo = bob.open();
    assert!(bob_repo.get_notes(COMMENTS_REF, &head).is_empty());
    let changed = bob_repo
        .pull_notes("origin", "refs/notes/devtools/*")
        .unwrap();
    assert_eq!(changed, 1);
    assert_eq!(
        bob_repo.get_notes(COMMENTS_REF, &head),
        vec![Note::from("{\"description\": \"lgtm\"}")]
    );
    assert_eq!(
        bob_repo
            .pull_notes("origin", "refs/notes/devtools/*")
            .unwrap(),
        0
    );
}

#[test]
fn pull_from_missing_remote_fails() {
    let repo = TestRepo::new();
    let mut loaded = repo.open();
    assert!(loaded.pull_notes("nowhere", "refs/notes/devtools/*").is_err());
}

#[test]
fn backend_name() {
    let repo = TestRepo::new();
    assert_eq!(GitBackend::open(repo.path()).unwrap().name(), "git");
}
