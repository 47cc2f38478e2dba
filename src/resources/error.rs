//! Typed error variants for filesystem synchronization.
//!
//! Every variant is fatal for the configuration run: callers convert to
//! [`anyhow::Error`] via `?` and the apply command stops at the first one.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that arise from sync engine operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A required source path does not resolve to the expected kind.
    #[error("not found: {} (expected {expected})", .path.display())]
    NotFound {
        /// Path that was looked up.
        path: PathBuf,
        /// What the operation needed to find there.
        expected: &'static str,
    },

    /// The destination is occupied by an incompatible entity.
    #[error("conflict at {}: {reason}", .path.display())]
    Conflict {
        /// Path that is in the way.
        path: PathBuf,
        /// Human-readable explanation.
        reason: String,
    },

    /// A copy, remove or create primitive failed at the OS level.
    #[error("{op} {}: {source}", .path.display())]
    Io {
        /// Primitive that failed (e.g. `"copy"`).
        op: &'static str,
        /// Path the primitive was applied to.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A template could not be rendered.
    #[error("render {}: {message}", .path.display())]
    Render {
        /// Template source path.
        path: PathBuf,
        /// Template engine message.
        message: String,
    },

    /// A listing filter is not a valid regular expression.
    #[error("invalid filter pattern '{pattern}': {source}")]
    InvalidFilter {
        /// The pattern as given.
        pattern: String,
        /// Regex compilation error.
        source: regex::Error,
    },
}

impl SyncError {
    /// Shorthand for [`SyncError::Io`].
    pub fn io(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Shorthand for [`SyncError::NotFound`].
    pub fn not_found(path: &Path, expected: &'static str) -> Self {
        Self::NotFound {
            path: path.to_path_buf(),
            expected,
        }
    }

    /// Shorthand for [`SyncError::Conflict`].
    pub fn conflict(path: &Path, reason: impl Into<String>) -> Self {
        Self::Conflict {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn not_found_display() {
        let e = SyncError::not_found(Path::new("/repo/vimrc"), "regular file");
        assert_eq!(
            e.to_string(),
            "not found: /repo/vimrc (expected regular file)"
        );
    }

    #[test]
    fn conflict_display() {
        let e = SyncError::conflict(Path::new("/home/me/.bashrc"), "target is a directory");
        assert!(e.to_string().contains("/home/me/.bashrc"));
        assert!(e.to_string().contains("target is a directory"));
    }

    #[test]
    fn io_display_names_operation() {
        let e = SyncError::io(
            "remove",
            Path::new("/tmp/x"),
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(e.to_string().starts_with("remove /tmp/x"));
    }

    #[test]
    fn sync_error_downcasts_through_anyhow() {
        let err: anyhow::Error = SyncError::conflict(Path::new("/x"), "occupied").into();
        assert!(matches!(
            err.downcast_ref::<SyncError>(),
            Some(SyncError::Conflict { .. })
        ));
    }
}
