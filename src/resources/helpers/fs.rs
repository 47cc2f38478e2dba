//! File-system resource helpers.
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use regex::Regex;

use crate::resources::error::SyncError;

/// Kind of a filesystem entry, as seen without following a final symlink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link (to anything, possibly dangling).
    Symlink,
}

impl EntryKind {
    /// Lower-case noun for log messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
            Self::Symlink => "symlink",
        }
    }
}

/// A named child of a directory, produced while scanning for a mirror pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEntry {
    /// File name relative to the scanned directory.
    pub name: OsString,
    /// What the entry is.
    pub kind: EntryKind,
}

/// Options for [`list_entries`].
#[derive(Debug, Clone)]
pub struct ListOptions {
    /// Include names starting with `.`.
    pub include_dotfiles: bool,
    /// Keep only names matching this regular expression.
    pub grep: Option<String>,
    /// Include directories.
    pub include_dirs: bool,
    /// Include files and symlinks.
    pub include_files: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            include_dotfiles: false,
            grep: None,
            include_dirs: true,
            include_files: true,
        }
    }
}

impl ListOptions {
    /// Every entry, dotfiles included. Used for the target side of a mirror.
    #[must_use]
    pub fn all() -> Self {
        Self {
            include_dotfiles: true,
            ..Self::default()
        }
    }
}

/// Classify `path` without following a final symlink; `None` if absent.
#[must_use]
pub fn entry_kind(path: &Path) -> Option<EntryKind> {
    let meta = std::fs::symlink_metadata(path).ok()?;
    let ft = meta.file_type();
    Some(if ft.is_symlink() {
        EntryKind::Symlink
    } else if ft.is_dir() {
        EntryKind::Directory
    } else {
        EntryKind::File
    })
}

/// List the children of `dir` (never `.`/`..`), sorted by name.
///
/// # Errors
///
/// Returns [`SyncError::InvalidFilter`] for a bad `grep` pattern and
/// [`SyncError::Io`] if the directory cannot be read.
pub fn list_entries(dir: &Path, opts: &ListOptions) -> Result<Vec<SyncEntry>, SyncError> {
    let filter = opts
        .grep
        .as_deref()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| SyncError::InvalidFilter {
                pattern: pattern.to_string(),
                source,
            })
        })
        .transpose()?;

    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| SyncError::io("read directory", dir, e))? {
        let entry = entry.map_err(|e| SyncError::io("read directory", dir, e))?;
        let name = entry.file_name();
        let lossy = name.to_string_lossy();
        if !opts.include_dotfiles && lossy.starts_with('.') {
            continue;
        }
        if filter.as_ref().is_some_and(|re| !re.is_match(&lossy)) {
            continue;
        }
        let ft = entry
            .file_type()
            .map_err(|e| SyncError::io("stat", &entry.path(), e))?;
        let kind = if ft.is_symlink() {
            EntryKind::Symlink
        } else if ft.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::File
        };
        let wanted = match kind {
            EntryKind::Directory => opts.include_dirs,
            EntryKind::File | EntryKind::Symlink => opts.include_files,
        };
        if wanted {
            entries.push(SyncEntry { name, kind });
        }
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Compare the contents of two files byte for byte.
///
/// Files of different length are unequal without reading; otherwise both
/// are streamed and compared chunk by chunk.
///
/// # Errors
///
/// Returns [`SyncError::Io`] if either file cannot be opened or read.
pub fn compare_files(a: &Path, b: &Path) -> Result<bool, SyncError> {
    let fa = File::open(a).map_err(|e| SyncError::io("open", a, e))?;
    let fb = File::open(b).map_err(|e| SyncError::io("open", b, e))?;
    let len_a = fa.metadata().map_err(|e| SyncError::io("stat", a, e))?.len();
    let len_b = fb.metadata().map_err(|e| SyncError::io("stat", b, e))?.len();
    if len_a != len_b {
        return Ok(false);
    }

    let mut ra = BufReader::new(fa);
    let mut rb = BufReader::new(fb);
    let mut buf_a = [0u8; 8192];
    let mut buf_b = [0u8; 8192];
    loop {
        let n = read_full(&mut ra, &mut buf_a).map_err(|e| SyncError::io("read", a, e))?;
        let m = read_full(&mut rb, &mut buf_b).map_err(|e| SyncError::io("read", b, e))?;
        if n != m || buf_a.get(..n) != buf_b.get(..m) {
            return Ok(false);
        }
        if n == 0 {
            return Ok(true);
        }
    }
}

/// Fill `buf` as far as the reader allows; returns bytes read (0 at EOF).
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let Some(rest) = buf.get_mut(filled..) else {
            break;
        };
        match reader.read(rest) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Ensure the parent directory of `path` exists, creating it (and any
/// ancestors) if necessary.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> Result<(), SyncError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| SyncError::io("create directory", parent, e))?;
    }
    Ok(())
}

/// Remove `path` if it is a file or symlink (dangling included).
///
/// Does nothing if `path` does not exist.
///
/// # Errors
///
/// Returns an error if the path exists but cannot be removed.
pub fn remove_existing(path: &Path) -> Result<(), SyncError> {
    if path.symlink_metadata().is_ok() {
        std::fs::remove_file(path).map_err(|e| SyncError::io("remove", path, e))?;
    }
    Ok(())
}
