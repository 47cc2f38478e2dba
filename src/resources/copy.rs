//! Single-file copy resource.
use std::path::Path;

use anyhow::Result;

use super::error::SyncError;
use super::helpers::fs::{EntryKind, compare_files, ensure_parent_dir, entry_kind, remove_existing};
use super::{Applicable, Resource, ResourceChange, ResourceState};
use crate::paths::PathRef;

/// Copy `source` to `target` unless `target` already holds identical bytes.
///
/// A symlink at `target` is replaced by a regular file rather than written
/// through.  Returns [`ResourceChange::AlreadyCorrect`] without touching the
/// filesystem when contents already match.
///
/// # Errors
///
/// - [`SyncError::NotFound`] if `source` is not a regular file (symlinks to
///   regular files are accepted)
/// - [`SyncError::Conflict`] if `target` is a directory
/// - [`SyncError::Io`] if reading, comparing or copying fails
pub fn copy_file(source: &Path, target: &Path) -> Result<ResourceChange, SyncError> {
    match file_state(source, target)? {
        ResourceState::Correct => return Ok(ResourceChange::AlreadyCorrect),
        ResourceState::Invalid { reason } => return Err(SyncError::conflict(target, reason)),
        ResourceState::Missing | ResourceState::Incorrect { .. } => {}
    }

    ensure_parent_dir(target)?;
    if entry_kind(target) == Some(EntryKind::Symlink) {
        remove_existing(target)?;
    }
    std::fs::copy(source, target).map_err(|e| SyncError::io("copy", source, e))?;
    Ok(ResourceChange::Applied)
}

fn file_state(source: &Path, target: &Path) -> Result<ResourceState, SyncError> {
    if !source.is_file() {
        return Err(SyncError::not_found(source, "regular file"));
    }
    Ok(match entry_kind(target) {
        None => ResourceState::Missing,
        Some(EntryKind::Directory) => ResourceState::Invalid {
            reason: "target is a directory".to_string(),
        },
        Some(EntryKind::Symlink) => ResourceState::Incorrect {
            current: "target is a symlink".to_string(),
        },
        Some(EntryKind::File) => {
            if compare_files(source, target)? {
                ResourceState::Correct
            } else {
                ResourceState::Incorrect {
                    current: "content differs".to_string(),
                }
            }
        }
    })
}

/// A file copy resource that can be checked and applied.
#[derive(Debug, Clone)]
pub struct CopyFileResource {
    /// The file to copy from.
    pub source: PathRef,
    /// Where the copy lives.
    pub target: PathRef,
}

impl CopyFileResource {
    /// Create a new copy resource.
    #[must_use]
    pub const fn new(source: PathRef, target: PathRef) -> Self {
        Self { source, target }
    }
}

impl Applicable for CopyFileResource {
    fn description(&self) -> String {
        format!("{} -> {}", self.source, self.target)
    }

    fn apply(&self) -> Result<ResourceChange> {
        Ok(copy_file(&self.source, &self.target)?)
    }
}

impl Resource for CopyFileResource {
    fn current_state(&self) -> Result<ResourceState> {
        Ok(file_state(&self.source, &self.target)?)
    }
}
