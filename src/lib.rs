//! Reviewgraph - A repository model for distributed code review
//!
//! Reviewgraph keeps a git repository's commit DAG, refs and review notes in
//! memory and answers the questions a review tool asks of them: which
//! commits a review covers, where two branches diverged, which revisions
//! carry review requests, and what the comments on a commit say.
//!
//! # Architecture
//!
//! The crate is layered:
//!
//! - [`core`] - Domain types, commit graph, refs, ancestry, notes, snapshots and config
//! - [`backend`] - Trait for the operations that need a real worktree, plus a mock
//! - [`git`] - The git2-backed backend; the only module that touches git
//! - [`repo`] - The [`Repository`] facade tying the in-memory model to a backend
//! - [`logging`] - Tracing subscriber setup
//!
//! # Correctness Invariants
//!
//! 1. Every parent of a stored commit is itself stored
//! 2. Every ref targets a stored commit
//! 3. Notes are append-only; remote notes merge with `cat_sort_uniq`
//! 4. Equal repository states hash to equal fingerprints

pub mod backend;
pub mod core;
pub mod git;
pub mod logging;
pub mod repo;

pub use repo::{Error, Repository};
