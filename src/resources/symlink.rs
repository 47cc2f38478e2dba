//! Symlink resource.
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};

use super::error::SyncError;
use super::helpers::fs::{EntryKind, ensure_parent_dir, entry_kind};
use super::remove::remove_path;
use super::{Applicable, Resource, ResourceChange, ResourceState};
use crate::exec::Executor;
use crate::paths::PathRef;

/// A symlink resource that can be checked and applied.
///
/// The link lives at `target` and points to `source`, which does not have to
/// exist.  An existing link is inspected through [`Executor::read_link`]; a
/// regular file or directory at `target` is never replaced.
#[derive(Clone)]
pub struct SymlinkResource {
    /// What the symlink points to.
    pub source: PathRef,
    /// Where the symlink is created.
    pub target: PathRef,
    executor: Arc<dyn Executor>,
}

impl fmt::Debug for SymlinkResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymlinkResource")
            .field("source", &self.source)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl SymlinkResource {
    /// Create a new symlink resource.
    #[must_use]
    pub fn new(source: PathRef, target: PathRef, executor: Arc<dyn Executor>) -> Self {
        Self {
            source,
            target,
            executor,
        }
    }

    /// Resolve what the existing link at `target` points to, relative
    /// contents taken from the link's directory.
    fn existing_destination(&self) -> Result<PathRef> {
        let raw = self.executor.read_link(&self.target)?;
        let base = self.target.parent().unwrap_or_else(|| Path::new("/"));
        PathRef::resolve(raw, base)
    }
}

impl Applicable for SymlinkResource {
    fn description(&self) -> String {
        format!("{} -> {}", self.target, self.source)
    }

    fn apply(&self) -> Result<ResourceChange> {
        match self.current_state()? {
            ResourceState::Correct => return Ok(ResourceChange::AlreadyCorrect),
            ResourceState::Invalid { reason } => {
                return Err(SyncError::conflict(&self.target, reason).into());
            }
            ResourceState::Incorrect { .. } => {
                remove_path(&self.target, false)?;
            }
            ResourceState::Missing => ensure_parent_dir(&self.target)?,
        }
        create_symlink(&self.source, &self.target, self.executor.as_ref())
            .with_context(|| format!("create link: {}", self.target))?;
        Ok(ResourceChange::Applied)
    }
}

impl Resource for SymlinkResource {
    fn current_state(&self) -> Result<ResourceState> {
        match entry_kind(&self.target) {
            None => Ok(ResourceState::Missing),
            Some(EntryKind::File) => Ok(ResourceState::Invalid {
                reason: "target is a regular file".to_string(),
            }),
            Some(EntryKind::Directory) => Ok(ResourceState::Invalid {
                reason: "target is a directory".to_string(),
            }),
            Some(EntryKind::Symlink) => {
                let existing = self.existing_destination()?;
                if existing == self.source {
                    Ok(ResourceState::Correct)
                } else {
                    Ok(ResourceState::Incorrect {
                        current: format!("points to {existing}"),
                    })
                }
            }
        }
    }
}

/// Create a symlink at `link` pointing to `target`.
#[cfg_attr(unix, allow(unused_variables))]
fn create_symlink(target: &Path, link: &Path, executor: &dyn Executor) -> Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link).with_context(|| {
            format!(
                "creating symlink {} -> {}",
                link.display(),
                target.display()
            )
        })?;
    }

    #[cfg(windows)]
    {
        let is_dir = target.is_dir();
        let result = if is_dir {
            std::os::windows::fs::symlink_dir(target, link)
        } else {
            std::os::windows::fs::symlink_file(target, link)
        };

        if result.is_err() {
            // Junctions for directories need no privileges; /H would be a hard link.
            let flag = if is_dir { " /J" } else { "" };
            let command = format!(
                "mklink{flag} \"{}\" \"{}\"",
                link.display(),
                target.display()
            );
            crate::exec::run_checked(executor, &command, false, true)?;
        }
    }

    Ok(())
}
