//! Canonical path references used by every filesystem operation.
use std::ffi::OsStr;
use std::fmt;
use std::ops::Deref;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context as _, Result};

/// An absolute filesystem path with `~` expanded and every existing ancestor
/// resolved through symlinks.
///
/// The final component is kept as written so that a symlink can be
/// addressed (and replaced) rather than silently followed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathRef(PathBuf);

impl PathRef {
    /// Resolve `path` against `base` (used when `path` is relative).
    ///
    /// # Errors
    ///
    /// Returns an error if `~` is used and no home directory is set, or if
    /// an existing ancestor cannot be canonicalized.
    pub fn resolve(path: impl AsRef<Path>, base: &Path) -> Result<Self> {
        let expanded = expand_home(path.as_ref())?;
        let absolute = if expanded.is_absolute() {
            expanded
        } else {
            base.join(expanded)
        };
        Ok(Self(canonical_parent(&lexical_normalize(&absolute))?))
    }

    /// Resolve `path` against the current working directory.
    ///
    /// # Errors
    ///
    /// See [`PathRef::resolve`].
    pub fn from_cwd(path: impl AsRef<Path>) -> Result<Self> {
        let cwd = std::env::current_dir().context("reading current directory")?;
        Self::resolve(path, &cwd)
    }

    /// Child entry `name` of this path.
    #[must_use]
    pub fn join(&self, name: impl AsRef<OsStr>) -> Self {
        Self(self.0.join(name.as_ref()))
    }

    /// Borrow as a plain [`Path`].
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Consume into a [`PathBuf`].
    #[must_use]
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl Deref for PathRef {
    type Target = Path;

    fn deref(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for PathRef {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for PathRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// User's home directory from `HOME` (or `USERPROFILE` on Windows).
///
/// # Errors
///
/// Returns an error if neither variable is set.
pub fn home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .context("HOME environment variable is not set")
}

/// Replace a leading `~` component with the home directory.
fn expand_home(path: &Path) -> Result<PathBuf> {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => {
            Ok(home_dir()?.join(components.as_path()))
        }
        _ => Ok(path.to_path_buf()),
    }
}

/// Drop `.` components and fold `..` into its parent without touching the
/// filesystem.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Canonicalize the longest existing ancestor of `path` (excluding the
/// final component) and re-attach the remainder.
fn canonical_parent(path: &Path) -> Result<PathBuf> {
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return Ok(path.to_path_buf());
    };

    let mut existing = parent;
    let mut rest: Vec<&OsStr> = Vec::new();
    while existing.symlink_metadata().is_err() {
        match (existing.parent(), existing.file_name()) {
            (Some(up), Some(component)) => {
                rest.push(component);
                existing = up;
            }
            _ => break,
        }
    }

    let mut resolved = dunce::canonicalize(existing)
        .with_context(|| format!("canonicalizing {}", existing.display()))?;
    for component in rest.iter().rev() {
        resolved.push(component);
    }
    resolved.push(name);
    Ok(resolved)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_resolve_against_base() {
        let dir = tempfile::tempdir().unwrap();
        let base = dunce::canonicalize(dir.path()).unwrap();
        let p = PathRef::resolve("a/b.txt", &base).unwrap();
        assert!(p.is_absolute());
        assert_eq!(p.as_path(), base.join("a").join("b.txt"));
    }

    #[test]
    fn dot_components_are_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let base = dunce::canonicalize(dir.path()).unwrap();
        let p = PathRef::resolve("./x/../y", &base).unwrap();
        assert_eq!(p.as_path(), base.join("y"));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_ancestor_is_expanded_but_leaf_is_not() {
        let dir = tempfile::tempdir().unwrap();
        let base = dunce::canonicalize(dir.path()).unwrap();
        std::fs::create_dir(base.join("real")).unwrap();
        std::os::unix::fs::symlink(base.join("real"), base.join("alias")).unwrap();

        let p = PathRef::resolve("alias/file", &base).unwrap();
        assert_eq!(p.as_path(), base.join("real").join("file"));

        let leaf = PathRef::resolve("alias", &base).unwrap();
        assert_eq!(leaf.as_path(), base.join("alias"));
    }

    #[test]
    fn join_keeps_absolute_form() {
        let dir = tempfile::tempdir().unwrap();
        let p = PathRef::from_cwd(dir.path()).unwrap().join("child");
        assert!(p.is_absolute());
        assert!(p.ends_with("child"));
    }

    #[test]
    fn absolute_path_ignores_base() {
        let dir = tempfile::tempdir().unwrap();
        let base = dunce::canonicalize(dir.path()).unwrap();
        let p = PathRef::resolve(base.join("z"), Path::new("/elsewhere")).unwrap();
        assert_eq!(p.as_path(), base.join("z"));
    }
}
