//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`CommitId`] - Opaque commit identifier
//! - [`RefName`] - Validated reference name (branches, remotes, notes refs)
//! - [`Note`] - Opaque note payload line
//! - [`Timestamp`] - String-encoded integer commit time
//! - [`Fingerprint`] - Repository state hash for change detection
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use reviewgraph::core::types::{CommitId, RefName};
//!
//! let commit = CommitId::new("A").unwrap();
//! let refname = RefName::new("refs/heads/master").unwrap();
//! assert_eq!(refname.remote_tracking("origin").unwrap().as_str(), "refs/remotes/origin/master");
//!
//! assert!(CommitId::new("").is_err());
//! assert!(RefName::new("refs/heads/bad..name").is_err());
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Prefix of local branch refs.
pub const HEADS_PREFIX: &str = "refs/heads/";

/// Prefix of remote-tracking refs.
pub const REMOTES_PREFIX: &str = "refs/remotes/";

/// Prefix of notes refs.
pub const NOTES_PREFIX: &str = "refs/notes/";

/// Errors from type validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid commit id: {0}")]
    InvalidCommitId(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// An opaque commit identifier.
///
/// Identifiers are plain keys into the commit store. Real repositories use
/// hex object ids, test fixtures use single letters; both are accepted as
/// long as the identifier is non-empty and free of whitespace and control
/// characters.
///
/// # Example
///
/// ```
/// use reviewgraph::core::types::CommitId;
///
/// let id = CommitId::new("abc123").unwrap();
/// assert_eq!(id.as_str(), "abc123");
/// assert_eq!(id.short(3), "abc");
///
/// assert!(CommitId::new("has space").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitId(String);

impl CommitId {
    /// Create a new validated commit id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidCommitId` if the id is empty or contains
    /// whitespace or control characters.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Derive an identifier from content.
    ///
    /// Used when a backend has to record a commit it synthesized
    /// itself (merge commits, rebased commits).
    pub fn for_content(content: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(content)))
    }

    fn validate(id: &str) -> Result<(), TypeError> {
        if id.is_empty() {
            return Err(TypeError::InvalidCommitId(
                "commit id cannot be empty".into(),
            ));
        }
        if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(TypeError::InvalidCommitId(format!(
                "commit id cannot contain whitespace or control characters: {id:?}"
            )));
        }
        Ok(())
    }

    /// Get an abbreviated form of the id.
    ///
    /// Returns the first `len` characters, or the full id if shorter.
    pub fn short(&self, len: usize) -> &str {
        match self.0.char_indices().nth(len) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }

    /// Get the commit id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CommitId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<CommitId> for String {
    fn from(id: CommitId) -> Self {
        id.0
    }
}

impl AsRef<str> for CommitId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for CommitId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CommitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated Git reference name.
///
/// Reference names must conform to Git's refname rules (see `git check-ref-format`).
///
/// # Example
///
/// ```
/// use reviewgraph::core::types::RefName;
///
/// let refname = RefName::new("refs/heads/ojarjur/mychange").unwrap();
/// assert!(refname.is_branch_ref());
/// assert_eq!(refname.strip_prefix("refs/heads/"), Some("ojarjur/mychange"));
///
/// let notes = RefName::new("refs/notes/devtools/reviews").unwrap();
/// assert!(notes.is_notes_ref());
/// assert!(notes.matches_pattern("refs/notes/devtools/*"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefName(String);

impl RefName {
    /// Create a new validated ref name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRefName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Create a ref name for a branch (`refs/heads/<branch>`).
    pub fn for_branch(branch: &str) -> Result<Self, TypeError> {
        Self::new(format!("{HEADS_PREFIX}{branch}"))
    }

    /// The remote-tracking counterpart of a branch ref.
    ///
    /// `refs/heads/<name>` becomes `refs/remotes/<remote>/<name>`. Returns
    /// `None` for refs outside `refs/heads/`.
    pub fn remote_tracking(&self, remote: &str) -> Option<Self> {
        let name = self.strip_prefix(HEADS_PREFIX)?;
        Self::new(format!("{REMOTES_PREFIX}{remote}/{name}")).ok()
    }

    /// Strip a prefix from the ref name and return the remainder.
    ///
    /// Returns `None` if the ref doesn't start with the given prefix.
    pub fn strip_prefix(&self, prefix: &str) -> Option<&str> {
        self.0.strip_prefix(prefix)
    }

    /// Check if this ref is a branch ref.
    pub fn is_branch_ref(&self) -> bool {
        self.0.starts_with(HEADS_PREFIX)
    }

    /// Check if this ref is a remote-tracking ref.
    pub fn is_remote_ref(&self) -> bool {
        self.0.starts_with(REMOTES_PREFIX)
    }

    /// Check if this ref is under the notes namespace.
    pub fn is_notes_ref(&self) -> bool {
        self.0.starts_with(NOTES_PREFIX)
    }

    /// Match against a refspec-style pattern.
    ///
    /// A pattern holds at most one `*`, which matches any (possibly empty)
    /// run of characters, including `/`. Without a `*` the pattern must match
    /// exactly.
    ///
    /// ```
    /// use reviewgraph::core::types::RefName;
    ///
    /// let r = RefName::new("refs/notes/devtools/discuss").unwrap();
    /// assert!(r.matches_pattern("refs/notes/*"));
    /// assert!(r.matches_pattern("refs/notes/devtools/discuss"));
    /// assert!(!r.matches_pattern("refs/heads/*"));
    /// ```
    pub fn matches_pattern(&self, pattern: &str) -> bool {
        match pattern.split_once('*') {
            Some((prefix, suffix)) => {
                self.0.len() >= prefix.len() + suffix.len()
                    && self.0.starts_with(prefix)
                    && self.0.ends_with(suffix)
            }
            None => self.0 == pattern,
        }
    }

    /// Validate a ref name against Git's refname rules.
    fn validate(name: &str) -> Result<(), TypeError> {
        if name.is_empty() {
            return Err(TypeError::InvalidRefName("ref name cannot be empty".into()));
        }

        if name.starts_with('/') {
            return Err(TypeError::InvalidRefName(
                "ref name cannot start with '/'".into(),
            ));
        }

        if name.ends_with('/') {
            return Err(TypeError::InvalidRefName(
                "ref name cannot end with '/'".into(),
            ));
        }
        if name.ends_with(".lock") {
            return Err(TypeError::InvalidRefName(
                "ref name cannot end with '.lock'".into(),
            ));
        }

        for forbidden in ["..", "@{", "//"] {
            if name.contains(forbidden) {
                return Err(TypeError::InvalidRefName(format!(
                    "ref name cannot contain '{forbidden}'"
                )));
            }
        }

        const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
        for c in INVALID_CHARS {
            if name.contains(c) {
                return Err(TypeError::InvalidRefName(format!(
                    "ref name cannot contain '{c}'"
                )));
            }
        }

        if name.chars().any(|c| c.is_ascii_control()) {
            return Err(TypeError::InvalidRefName(
                "ref name cannot contain control characters".into(),
            ));
        }

        for component in name.split('/').filter(|c| !c.is_empty()) {
            if component.starts_with('.') {
                return Err(TypeError::InvalidRefName(
                    "path component cannot start with '.'".into(),
                ));
            }
            if component.ends_with(".lock") {
                return Err(TypeError::InvalidRefName(
                    "path component cannot end with '.lock'".into(),
                ));
            }
        }

        Ok(())
    }

    /// Get the ref name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RefName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RefName> for String {
    fn from(name: RefName) -> Self {
        name.0
    }
}

impl AsRef<str> for RefName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for RefName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single note entry.
///
/// Notes are opaque at this layer; higher layers parse them (review
/// requests and discussion threads are JSON documents, one per line).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Note(String);

impl Note {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Note {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Note {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Commit time, in seconds since the epoch.
///
/// Serialized as a decimal string, the encoding commit records use. Leading
/// zeros are accepted on input (`"0000000001"`) and dropped on output.
///
/// # Example
///
/// ```
/// use reviewgraph::core::types::Timestamp;
///
/// let ts: Timestamp = "0000000005".parse().unwrap();
/// assert_eq!(ts.seconds(), 5);
/// assert_eq!(ts.to_string(), "5");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn from_seconds(seconds: i64) -> Self {
        Self(seconds)
    }

    pub fn seconds(&self) -> i64 {
        self.0
    }
}

impl std::str::FromStr for Timestamp {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|e| TypeError::InvalidTimestamp(format!("{s:?}: {e}")))
    }
}

impl TryFrom<String> for Timestamp {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Timestamp> for String {
    fn from(ts: Timestamp) -> Self {
        ts.0.to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stable hash over repository state for change detection.
///
/// The fingerprint is a SHA-256 over a canonical serialization of the
/// visible state, so two repositories with identical content always agree
/// regardless of the order in which that content was inserted.
///
/// # Example
///
/// ```
/// use reviewgraph::core::types::Fingerprint;
///
/// let a = Fingerprint::digest(b"state");
/// let b = Fingerprint::digest(b"state");
/// assert_eq!(a, b);
/// assert_eq!(a.as_str().len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hash canonical bytes into a fingerprint.
    pub fn digest(canonical: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(canonical)))
    }

    /// Get the fingerprint as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
