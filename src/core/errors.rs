//! LC-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::engine::interrupt::Interrupted;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, LoadError>;

/// Top-level error type for loadcore.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("[LC-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[LC-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[LC-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[LC-1101] thread index {thread_index} out of range for {thread_count} threads")]
    InvalidThreadIndex {
        thread_index: usize,
        thread_count: usize,
    },

    #[error("[LC-2001] worker pool is already shutting down")]
    PoolShutdown,

    #[error("[LC-2002] scenario execution timed out after {timeout_secs} seconds")]
    ExecutionTimedOut { timeout_secs: u64 },

    #[error("[LC-2003] scenario execution did not stop correctly")]
    ExecutionInterrupted {
        #[source]
        source: Interrupted,
    },

    #[error("[LC-2004] task failed on thread {thread_index}: {details}")]
    TaskFailed { thread_index: usize, details: String },

    #[error("[LC-2005] assertion {assertion} failed: {details}")]
    AssertionFailed {
        assertion: &'static str,
        details: String,
    },

    #[error("[LC-2006] a run is already in progress on this coordinator ({details})")]
    RunInProgress { details: String },

    #[error("[LC-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[LC-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[LC-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl LoadError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "LC-1001",
            Self::MissingConfig { .. } => "LC-1002",
            Self::ConfigParse { .. } => "LC-1003",
            Self::InvalidThreadIndex { .. } => "LC-1101",
            Self::PoolShutdown => "LC-2001",
            Self::ExecutionTimedOut { .. } => "LC-2002",
            Self::ExecutionInterrupted { .. } => "LC-2003",
            Self::TaskFailed { .. } => "LC-2004",
            Self::AssertionFailed { .. } => "LC-2005",
            Self::RunInProgress { .. } => "LC-2006",
            Self::Serialization { .. } => "LC-2101",
            Self::Io { .. } => "LC-3002",
            Self::Runtime { .. } => "LC-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    ///
    /// Timeouts and interruptions are terminal for a run and are never retried
    /// by the engine itself; a caller may choose to start a fresh run.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Runtime { .. })
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for configuration rejections.
    #[must_use]
    pub fn invalid_config(details: impl Into<String>) -> Self {
        Self::InvalidConfig {
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for LoadError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<toml::ser::Error> for LoadError {
    fn from(value: toml::ser::Error) -> Self {
        Self::Serialization {
            context: "toml",
            details: value.to_string(),
        }
    }
}
