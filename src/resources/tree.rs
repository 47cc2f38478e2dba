//! Recursive tree copy and mirror-with-deletion.
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::Result;

use super::copy::copy_file;
use super::error::SyncError;
use super::helpers::fs::{EntryKind, ListOptions, SyncEntry, entry_kind, list_entries};
use super::remove::remove_path;
use super::{Applicable, ResourceChange};
use crate::paths::PathRef;

/// What a tree copy or mirror pass changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Files written because they were missing or differed.
    pub copied: Vec<PathBuf>,
    /// Directories created on the target side.
    pub created: Vec<PathBuf>,
    /// Stale target entries deleted, with the kind they had.
    pub removed: Vec<(PathBuf, EntryKind)>,
    /// Source entries left alone (directory symlinks, dangling symlinks).
    pub skipped: Vec<PathBuf>,
}

impl SyncReport {
    /// `true` when the pass mutated nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.copied.is_empty() && self.created.is_empty() && self.removed.is_empty()
    }

    /// Number of mutations performed.
    #[must_use]
    pub fn changes(&self) -> usize {
        self.copied.len() + self.created.len() + self.removed.len()
    }
}

/// Which source entries a copy or mirror pass takes.
///
/// `include` only applies to files; directories are always descended so a
/// pattern like `\.lua$` reaches nested files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeFilter {
    /// Take names starting with `.`.
    pub dotfiles: bool,
    /// Regex a file name must match.
    pub include: Option<String>,
}

impl Default for TreeFilter {
    fn default() -> Self {
        Self {
            dotfiles: true,
            include: None,
        }
    }
}

impl TreeFilter {
    /// Filtered children of `dir`, sorted by name.
    fn list(&self, dir: &Path) -> Result<Vec<SyncEntry>, SyncError> {
        let dirs = ListOptions {
            include_dotfiles: self.dotfiles,
            grep: None,
            include_dirs: true,
            include_files: false,
        };
        let files = ListOptions {
            include_dotfiles: self.dotfiles,
            grep: self.include.clone(),
            include_dirs: false,
            include_files: true,
        };
        let mut entries = list_entries(dir, &files)?;
        entries.extend(list_entries(dir, &dirs)?);
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

/// Copy `from` onto `to` without ever deleting anything.
///
/// A directory is recreated at `to` and every entry copied recursively; a
/// regular file (or a symlink to one) goes through [`copy_file`].  Symlinks
/// to directories inside the tree are not followed and land in
/// [`SyncReport::skipped`].
///
/// # Errors
///
/// Returns [`SyncError::NotFound`] if `from` does not exist,
/// [`SyncError::Conflict`] if a directory must be created where a
/// non-directory already lives, and [`SyncError::Io`] on filesystem failures.
pub fn copy_tree(from: &Path, to: &Path, report: &mut SyncReport) -> Result<(), SyncError> {
    copy_tree_with(from, to, &TreeFilter::default(), report)
}

/// [`copy_tree`] taking only the entries `filter` admits.  A single-file
/// `from` is copied regardless of the filter.
///
/// # Errors
///
/// As [`copy_tree`], plus [`SyncError::InvalidFilter`] for a bad `include`.
pub fn copy_tree_with(
    from: &Path,
    to: &Path,
    filter: &TreeFilter,
    report: &mut SyncReport,
) -> Result<(), SyncError> {
    if from.is_dir() {
        copy_dir(from, to, filter, report)
    } else if from.is_file() {
        copy_one(from, to, report)
    } else {
        Err(SyncError::not_found(from, "file or directory"))
    }
}

fn copy_dir(
    from: &Path,
    to: &Path,
    filter: &TreeFilter,
    report: &mut SyncReport,
) -> Result<(), SyncError> {
    ensure_dir(to, report)?;
    for entry in filter.list(from)? {
        let src = from.join(&entry.name);
        let dst = to.join(&entry.name);
        match entry.kind {
            EntryKind::Directory => copy_dir(&src, &dst, filter, report)?,
            EntryKind::File => copy_one(&src, &dst, report)?,
            EntryKind::Symlink => copy_link(&src, &dst, report)?,
        }
    }
    Ok(())
}

/// Mirror the directory `from` onto `to`, deleting what `from` lacks.
///
/// The pass scans `from`, removes stale target entries (names absent from
/// `from`, or present with an incompatible kind), then copies everything.
/// Subdirectories are mirrored recursively so nested stale entries go too.
///
/// # Errors
///
/// Returns [`SyncError::NotFound`] if `from` is not a directory,
/// [`SyncError::Conflict`] if `to` exists and is not a directory, and
/// [`SyncError::Io`] on filesystem failures.
pub fn mirror(from: &Path, to: &Path, report: &mut SyncReport) -> Result<(), SyncError> {
    mirror_with(from, to, &TreeFilter::default(), report)
}

/// [`mirror`] of the view `filter` admits: target entries the filter hides
/// on the source side are removed like any other stale entry.
///
/// # Errors
///
/// As [`mirror`], plus [`SyncError::InvalidFilter`] for a bad `include`.
pub fn mirror_with(
    from: &Path,
    to: &Path,
    filter: &TreeFilter,
    report: &mut SyncReport,
) -> Result<(), SyncError> {
    if !from.is_dir() {
        return Err(SyncError::not_found(from, "directory"));
    }
    let source: BTreeMap<OsString, EntryKind> = filter
        .list(from)?
        .into_iter()
        .map(|e| (e.name, e.kind))
        .collect();

    if entry_kind(to) == Some(EntryKind::Directory) {
        for stale in list_entries(to, &ListOptions::all())? {
            let keep = source
                .get(&stale.name)
                .is_some_and(|kind| compatible(*kind, stale.kind));
            if keep {
                continue;
            }
            let path = to.join(&stale.name);
            if let Some(kind) = remove_path(&path, true)? {
                report.removed.push((path, kind));
            }
        }
    } else {
        ensure_dir(to, report)?;
    }

    for (name, kind) in &source {
        let src = from.join(name);
        let dst = to.join(name);
        match kind {
            EntryKind::Directory => mirror_with(&src, &dst, filter, report)?,
            EntryKind::File => copy_one(&src, &dst, report)?,
            EntryKind::Symlink => copy_link(&src, &dst, report)?,
        }
    }
    Ok(())
}

/// Directories only pair with directories.
fn compatible(source: EntryKind, target: EntryKind) -> bool {
    (source == EntryKind::Directory) == (target == EntryKind::Directory)
}

fn ensure_dir(path: &Path, report: &mut SyncReport) -> Result<(), SyncError> {
    match entry_kind(path) {
        Some(EntryKind::Directory) => Ok(()),
        Some(kind) => Err(SyncError::conflict(
            path,
            format!("{} exists where a directory is needed", kind.as_str()),
        )),
        None => {
            std::fs::create_dir_all(path).map_err(|e| SyncError::io("create directory", path, e))?;
            report.created.push(path.to_path_buf());
            Ok(())
        }
    }
}

fn copy_one(src: &Path, dst: &Path, report: &mut SyncReport) -> Result<(), SyncError> {
    if copy_file(src, dst)? == ResourceChange::Applied {
        report.copied.push(dst.to_path_buf());
    }
    Ok(())
}

fn copy_link(src: &Path, dst: &Path, report: &mut SyncReport) -> Result<(), SyncError> {
    if src.is_file() {
        copy_one(src, dst, report)
    } else {
        report.skipped.push(src.to_path_buf());
        Ok(())
    }
}

/// Recursive copy of a file or directory that never deletes.
#[derive(Debug, Clone)]
pub struct CopyTreeResource {
    /// File or directory to copy from.
    pub source: PathRef,
    /// Destination path.
    pub target: PathRef,
    /// Entries taken from `source`.
    pub filter: TreeFilter,
}

impl CopyTreeResource {
    /// Create a new tree copy resource taking every entry.
    #[must_use]
    pub fn new(source: PathRef, target: PathRef) -> Self {
        Self {
            source,
            target,
            filter: TreeFilter::default(),
        }
    }

    /// Restrict the copy to what `filter` admits.
    #[must_use]
    pub fn with_filter(mut self, filter: TreeFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Run the copy and return what changed.
    ///
    /// # Errors
    ///
    /// See [`copy_tree`].
    pub fn sync(&self) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();
        copy_tree_with(&self.source, &self.target, &self.filter, &mut report)?;
        Ok(report)
    }
}

impl Applicable for CopyTreeResource {
    fn description(&self) -> String {
        format!("{} -> {}", self.source, self.target)
    }

    fn apply(&self) -> Result<ResourceChange> {
        Ok(change_for(&self.sync()?))
    }
}

/// Exact directory replica, deleting target entries the source lacks.
#[derive(Debug, Clone)]
pub struct MirrorResource {
    /// Directory to mirror from.
    pub source: PathRef,
    /// Directory kept identical to `source`.
    pub target: PathRef,
    /// Entries of `source` that make up the replica.
    pub filter: TreeFilter,
}

impl MirrorResource {
    /// Create a new mirror resource of the whole source.
    #[must_use]
    pub fn new(source: PathRef, target: PathRef) -> Self {
        Self {
            source,
            target,
            filter: TreeFilter::default(),
        }
    }

    /// Mirror only what `filter` admits.
    #[must_use]
    pub fn with_filter(mut self, filter: TreeFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Run the mirror pass and return what changed.
    ///
    /// # Errors
    ///
    /// See [`mirror`].
    pub fn sync(&self) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();
        mirror_with(&self.source, &self.target, &self.filter, &mut report)?;
        Ok(report)
    }
}

impl Applicable for MirrorResource {
    fn description(&self) -> String {
        format!("{} => {}", self.source, self.target)
    }

    fn apply(&self) -> Result<ResourceChange> {
        Ok(change_for(&self.sync()?))
    }
}

fn change_for(report: &SyncReport) -> ResourceChange {
    if report.is_noop() {
        ResourceChange::AlreadyCorrect
    } else {
        ResourceChange::Applied
    }
}
