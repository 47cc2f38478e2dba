//! Classified removal of files, directories and symlinks.
use std::path::Path;

use anyhow::Result;

use super::error::SyncError;
use super::helpers::fs::{EntryKind, entry_kind};
use super::{Applicable, Resource, ResourceChange, ResourceState};
use crate::paths::PathRef;

/// Remove whatever is at `path` and report what it was.
///
/// The kind is determined *before* deletion.  A symlink is removed itself,
/// never its target.  A non-empty directory is only removed when
/// `recursive` is set; an empty one always is.  Returns `None` when nothing
/// exists at `path`.
///
/// # Errors
///
/// Returns [`SyncError::Io`] if the removal fails (including a non-empty
/// directory without `recursive`).
pub fn remove_path(path: &Path, recursive: bool) -> Result<Option<EntryKind>, SyncError> {
    let Some(kind) = entry_kind(path) else {
        return Ok(None);
    };
    let outcome = match kind {
        EntryKind::Directory if recursive => std::fs::remove_dir_all(path),
        EntryKind::Directory => std::fs::remove_dir(path),
        EntryKind::File => std::fs::remove_file(path),
        EntryKind::Symlink => remove_symlink(path),
    };
    outcome.map_err(|e| SyncError::io("remove", path, e))?;
    Ok(Some(kind))
}

/// Remove a symlink without touching its target.
///
/// Windows directory symlinks and junctions must be removed with
/// `remove_dir`.
fn remove_symlink(path: &Path) -> std::io::Result<()> {
    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt as _;
        let meta = std::fs::symlink_metadata(path)?;
        if meta.file_attributes() & 0x10 != 0 {
            return std::fs::remove_dir(path);
        }
    }
    std::fs::remove_file(path)
}

/// Ensures nothing exists at a path.
#[derive(Debug, Clone)]
pub struct RemoveResource {
    /// Path to delete.
    pub path: PathRef,
    /// Whether non-empty directories may be deleted.
    pub recursive: bool,
}

impl RemoveResource {
    /// Create a new remove resource.
    #[must_use]
    pub const fn new(path: PathRef, recursive: bool) -> Self {
        Self { path, recursive }
    }
}

impl Applicable for RemoveResource {
    fn description(&self) -> String {
        self.path.to_string()
    }

    fn apply(&self) -> Result<ResourceChange> {
        Ok(match remove_path(&self.path, self.recursive)? {
            Some(_) => ResourceChange::Applied,
            None => ResourceChange::AlreadyCorrect,
        })
    }
}

impl Resource for RemoveResource {
    fn current_state(&self) -> Result<ResourceState> {
        Ok(entry_kind(&self.path).map_or(ResourceState::Correct, |kind| {
            ResourceState::Incorrect {
                current: format!("{} exists", kind.as_str()),
            }
        }))
    }
}
