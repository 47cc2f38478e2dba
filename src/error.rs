//! Domain-specific error types for the dotsync engine.
//!
//! Internal modules return typed errors (e.g., [`ConfigError`], [`ExecError`],
//! [`SyncError`]) while task and command handlers convert them to
//! [`anyhow::Error`] via the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! DotsyncError
//! ├── Config(ConfigError): config file lookup, TOML parsing
//! ├── Exec(ExecError)    : child process spawn / stream I/O
//! └── Sync(SyncError)    : copy, mirror, symlink, remove, template
//! ```

use std::path::PathBuf;

use thiserror::Error;

pub use crate::resources::error::SyncError;

/// Top-level error type for the dotsync engine.
#[derive(Error, Debug)]
pub enum DotsyncError {
    /// Configuration-related error (lookup, parsing, I/O).
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// External process could not be run.
    #[error("Execution error: {0}")]
    Exec(#[from] ExecError),

    /// Filesystem synchronization error.
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),
}

/// Errors that arise from configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No configuration file exists at the resolved location.
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file is not valid TOML or does not match the expected schema.
    #[error("invalid config {}: {message}", .path.display())]
    Parse {
        /// Path of the offending file.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// An I/O error occurred while reading a config file.
    #[error("IO error reading config file {}: {source}", .path.display())]
    Io {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Errors raised by the process executor.
///
/// A child that runs and exits non-zero is *not* an error; it is reported
/// through [`CommandResult`](crate::exec::CommandResult).
#[derive(Error, Debug)]
pub enum ExecError {
    /// The child process could not be created (shell or binary missing).
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        /// Command line that was being run.
        command: String,
        /// Error from the process-creation call.
        source: std::io::Error,
    },

    /// Reading a child stream or waiting for the child failed.
    #[error("I/O error while running '{command}': {source}")]
    Io {
        /// Command line that was being run.
        command: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}
