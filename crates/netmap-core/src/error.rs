//! Error types for the netmap core
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for netmap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the netmap system
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed domain name or IPv4 address input.
    ///
    /// Recovered locally: the offending record or reference is skipped
    /// and logged, never fatal to a refresh.
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    /// Two non-placeholder nodes claimed the same identity with
    /// incompatible attributes. Resolved by first-writer-wins merge and
    /// reported as a warning.
    #[error("duplicate conflict on {identity}: {detail}")]
    DuplicateConflict {
        /// Identity both parties claimed
        identity: String,
        /// What could not be reconciled
        detail: String,
    },

    /// A plugin declared a dependency that is not enabled or will not run.
    /// The plugin is skipped entirely.
    #[error("plugin '{plugin}' requires '{dependency}' which will not run")]
    MissingDependency {
        /// The skipped plugin
        plugin: String,
        /// The unmet dependency
        dependency: String,
    },

    /// A plugin stage handler failed. Isolated per plugin: the remaining
    /// plugins and stages still run.
    #[error("plugin '{plugin}' failed during stage {stage}: {message}")]
    PluginExecution {
        /// The failing plugin
        plugin: String,
        /// The stage it failed in
        stage: String,
        /// The underlying error message
        message: String,
    },

    /// The node-resolution pass violated a model invariant. This is the
    /// one fatal class: the resulting network cannot be trusted and the
    /// refresh is aborted.
    #[error("node resolution failed: {0}")]
    Resolution(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Snapshot read/write errors
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an invalid-identity error
    pub fn invalid_identity(msg: impl Into<String>) -> Self {
        Self::InvalidIdentity(msg.into())
    }

    /// Create a duplicate-conflict error
    pub fn duplicate_conflict(identity: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::DuplicateConflict {
            identity: identity.into(),
            detail: detail.into(),
        }
    }

    /// Create a missing-dependency error
    pub fn missing_dependency(plugin: impl Into<String>, dependency: impl Into<String>) -> Self {
        Self::MissingDependency {
            plugin: plugin.into(),
            dependency: dependency.into(),
        }
    }

    /// Create a plugin-execution error
    pub fn plugin_execution(
        plugin: impl Into<String>,
        stage: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::PluginExecution {
            plugin: plugin.into(),
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Create a resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a snapshot error
    pub fn snapshot(msg: impl Into<String>) -> Self {
        Self::Snapshot(msg.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
