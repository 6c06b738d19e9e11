//! Error types for the document store, the builder and request validation.

use std::{path::PathBuf, process::ExitStatus};

use thiserror::Error;

/// Failures while reading or rewriting the configuration document.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The file could not be read.
    #[error("failed to read configuration document {path}")]
    Read {
        /// Document location.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a JSON object.
    #[error("failed to parse configuration document {path}")]
    Parse {
        /// Document location.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The document could not be serialized.
    #[error("failed to encode configuration document")]
    Encode(#[source] serde_json::Error),

    /// The temporary file could not be written or renamed into place.
    #[error("failed to write configuration document {path}")]
    Write {
        /// Document location.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The blocking writer task panicked or was cancelled.
    #[error("configuration document writer task failed: {0}")]
    Task(String),
}

/// Failures while running the external builder.
#[derive(Error, Debug)]
pub enum BuildError {
    /// The builder executable could not be started.
    #[error("failed to launch builder {path}")]
    Spawn {
        /// Builder executable.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the child process failed.
    #[error("failed to wait for builder process")]
    Wait(#[source] std::io::Error),

    /// The builder exited unsuccessfully.
    #[error("builder exited with {status}")]
    Failed {
        /// Exit status reported by the child.
        status: ExitStatus,
    },

    /// The build was killed because the daemon is shutting down.
    #[error("builder was terminated during shutdown")]
    Terminated,
}

/// A registration request lacked a required field.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("missing {field}")]
pub struct MissingField {
    /// Query parameter name, as the caller spelled it.
    pub field: &'static str,
}
