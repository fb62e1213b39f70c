//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$REVIEWGRAPH_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/reviewgraph/config.toml`
//! 3. `~/.reviewgraph/config.toml`
//!
//! # Repo Config
//!
//! Located at `reviewgraph/config.toml` under the shared git directory.
//!
//! # Validation
//!
//! Config values are validated after parsing: notes refs must live under
//! `refs/notes/`, the remote name must be usable inside a ref name, and a
//! traversal bound must be positive.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::RefName;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// log = "reviewgraph=debug"
/// editor = "nvim"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Default `tracing` filter directive, used when `RUST_LOG` is unset
    pub log: Option<String>,

    /// Editor reported when git has none configured
    pub editor: Option<String>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(editor) = &self.editor {
            if editor.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "editor cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Repository configuration.
///
/// # Example
///
/// ```toml
/// remote = "upstream"
///
/// [notes]
/// requests = "refs/notes/devtools/reviews"
/// comments = "refs/notes/devtools/discuss"
///
/// [traversal]
/// max_nodes = 100000
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    /// Remote used for ref fallback and notes exchange (default: "origin")
    pub remote: Option<String>,

    /// Notes refs holding review data
    pub notes: Option<NotesConfig>,

    /// Ancestry traversal bounds
    pub traversal: Option<TraversalConfig>,
}

impl RepoConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(remote) = &self.remote {
            if remote.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "remote cannot be empty".to_string(),
                ));
            }
            // The remote is spliced into refs/remotes/<remote>/...
            RefName::new(format!("refs/remotes/{remote}/HEAD")).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid remote name '{}': {}", remote, e))
            })?;
        }

        if let Some(notes) = &self.notes {
            notes.validate()?;
        }

        if let Some(traversal) = &self.traversal {
            traversal.validate()?;
        }

        Ok(())
    }
}

/// Notes ref locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct NotesConfig {
    /// Ref holding review requests
    pub requests: Option<String>,

    /// Ref holding discussion threads
    pub comments: Option<String>,
}

impl NotesConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [("requests", &self.requests), ("comments", &self.comments)] {
            let Some(value) = value else { continue };
            let valid = RefName::new(value.as_str())
                .map(|r| r.is_notes_ref())
                .unwrap_or(false);
            if !valid {
                return Err(ConfigError::InvalidValue(format!(
                    "notes.{} must be a ref under refs/notes/, got '{}'",
                    key, value
                )));
            }
        }
        Ok(())
    }
}

/// Traversal limits.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TraversalConfig {
    /// Maximum commits a single traversal may visit
    pub max_nodes: Option<usize>,
}

impl TraversalConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_nodes == Some(0) {
            return Err(ConfigError::InvalidValue(
                "traversal.max_nodes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod global_config {
        use super::*;

        #[test]
        fn defaults() {
            let config = GlobalConfig::default();
            assert!(config.log.is_none());
            assert!(config.editor.is_none());
            assert!(config.validate().is_ok());
        }

        #[test]
        fn blank_editor_rejected() {
            let config = GlobalConfig {
                editor: Some("  ".to_string()),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn roundtrip() {
            let config = GlobalConfig {
                log: Some("reviewgraph=trace".to_string()),
                editor: Some("emacs".to_string()),
            };

            let toml = toml::to_string_pretty(&config).unwrap();
            let parsed: GlobalConfig = toml::from_str(&toml).unwrap();
            assert_eq!(config, parsed);
        }
    }

    mod repo_config {
        use super::*;

        #[test]
        fn defaults() {
            let config = RepoConfig::default();
            assert!(config.remote.is_none());
            assert!(config.validate().is_ok());
        }

        #[test]
        fn empty_remote_rejected() {
            let config = RepoConfig {
                remote: Some(String::new()),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn malformed_remote_rejected() {
            let config = RepoConfig {
                remote: Some("bad..remote".to_string()),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn notes_refs_must_be_notes() {
            let config = RepoConfig {
                notes: Some(NotesConfig {
                    requests: Some("refs/heads/reviews".to_string()),
                    comments: None,
                }),
                ..Default::default()
            };
            assert!(config.validate().is_err());

            let config = RepoConfig {
                notes: Some(NotesConfig {
                    requests: Some("refs/notes/team/reviews".to_string()),
                    comments: Some("refs/notes/team/discuss".to_string()),
                }),
                ..Default::default()
            };
            assert!(config.validate().is_ok());
        }

        #[test]
        fn zero_traversal_bound_rejected() {
            let config = RepoConfig {
                traversal: Some(TraversalConfig { max_nodes: Some(0) }),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn roundtrip() {
            let config = RepoConfig {
                remote: Some("upstream".to_string()),
                notes: Some(NotesConfig {
                    requests: Some("refs/notes/devtools/reviews".to_string()),
                    comments: None,
                }),
                traversal: Some(TraversalConfig {
                    max_nodes: Some(5000),
                }),
            };

            let toml = toml::to_string_pretty(&config).unwrap();
            let parsed: RepoConfig = toml::from_str(&toml).unwrap();
            assert_eq!(config, parsed);
        }
    }
}
