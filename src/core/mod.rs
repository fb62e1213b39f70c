//! core
//!
//! Core domain types and the commit-graph query engine.
//!
//! # Modules
//!
//! - [`types`] - Strong types: CommitId, RefName, Note, Timestamp, Fingerprint
//! - [`error`] - Errors raised by the core
//! - [`graph`] - Append-only commit graph store
//! - [`refs`] - Ref table and ref resolution
//! - [`ancestry`] - Ancestor enumeration, ancestry tests, merge bases
//! - [`notes`] - Append-only notes and their remote merge policy
//! - [`snapshot`] - Canonical serializable repository state
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Commits refer to each other by id; the graph store owns all commit data
//! - Every query is deterministic and free of I/O

pub mod ancestry;
pub mod config;
pub mod error;
pub mod graph;
pub mod notes;
pub mod refs;
pub mod snapshot;
pub mod types;

pub use error::RepoError;
