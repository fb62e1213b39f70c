//! git
//!
//! The git-backed [`Backend`](crate::backend::Backend).
//!
//! # Architecture
//!
//! This module is the **only doorway** to git. No other module imports
//! `git2`. Everything above it works on the in-memory commit graph, ref
//! table and notes store, seeded from [`GitBackend::load_snapshot`].
//!
//! # Responsibilities
//!
//! - Repository discovery and opening
//! - Identity, editor and worktree status lookup
//! - Diff and file rendering
//! - Switch, merge and rebase on the worktree
//! - Notes push and fetch
//! - Loading refs, commits and notes into a snapshot

mod interface;

pub use interface::GitBackend;
