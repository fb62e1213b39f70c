//! logging
//!
//! Diagnostic output through `tracing`.
//!
//! # Design
//!
//! Library code only emits events; installing a subscriber is left to the
//! embedding program, which calls [`init`] (or [`init_with`]) once at
//! startup. `RUST_LOG` always wins over the requested verbosity, and a
//! subscriber that is already installed is left in place.

use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::Config;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Quiet mode - errors only
    Quiet,
    /// Normal mode - warnings and errors
    #[default]
    Normal,
    /// Debug mode - every event from this crate
    Debug,
}

impl Verbosity {
    /// The filter directive for this level.
    pub fn directive(self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Debug => "reviewgraph=trace,warn",
        }
    }
}

/// Install a stderr subscriber filtered at `verbosity`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init(verbosity: Verbosity) -> bool {
    init_with(verbosity.directive())
}

/// The directive to install for `verbosity` under `config`.
///
/// An explicit quiet or debug request overrides the configured `log`
/// directive; normal verbosity defers to it.
pub fn directive_for(config: &Config, verbosity: Verbosity) -> &str {
    match (verbosity, config.log_directive()) {
        (Verbosity::Normal, Some(directive)) => directive,
        _ => verbosity.directive(),
    }
}

/// Install a stderr subscriber using the configured directive.
pub fn init_from_config(config: &Config, verbosity: Verbosity) -> bool {
    init_with(directive_for(config, verbosity))
}

/// Install a stderr subscriber with an explicit filter directive, such as
/// the `log` value from the global config.
///
/// An unparseable directive falls back to `warn`.
pub fn init_with(directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .is_ok()
}
