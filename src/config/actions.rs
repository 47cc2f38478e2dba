//! Action, watch and settings entries of `dotsync.toml`.
use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::monitor::DEFAULT_INTERVAL;

/// `[settings]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// Monitor poll interval in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

impl Settings {
    /// Poll interval as a [`Duration`].
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn default_interval_ms() -> u64 {
    DEFAULT_INTERVAL.as_millis() as u64
}

/// One `[[action]]` entry, applied in file order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActionEntry {
    /// Optional label used by `--skip`/`--only` and the summary.
    #[serde(default)]
    pub name: Option<String>,
    /// What the action does.
    #[serde(flatten)]
    pub kind: ActionKind,
}

impl ActionEntry {
    /// Label shown in logs and matched by `--skip`/`--only`.
    ///
    /// Falls back to `"<type> <target>"` when no `name` is configured.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{} {}", self.kind.type_name(), self.kind.subject()))
    }
}

/// The operation an action performs.  Paths are kept as written and resolved
/// against the configuration directory when the action runs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    /// Link `target` to `source`.
    Symlink {
        /// What the link points to.
        source: String,
        /// Where the link is created.
        target: String,
    },
    /// Copy a file or directory tree without deleting anything.
    Copy {
        /// File or directory to copy.
        source: String,
        /// Destination.
        target: String,
        /// Regex a file name must match to be copied.  Directories are
        /// always descended.
        #[serde(default)]
        include: Option<String>,
        /// Copy names starting with `.`.
        #[serde(default = "default_true")]
        dotfiles: bool,
    },
    /// Make `target` an exact replica of the directory `source`.
    ///
    /// With `include` or `dotfiles = false` the replica is of the filtered
    /// view, so target files the filter hides are removed.
    Mirror {
        /// Directory to mirror.
        source: String,
        /// Directory kept in sync.
        target: String,
        /// Regex a file name must match to be mirrored.
        #[serde(default)]
        include: Option<String>,
        /// Mirror names starting with `.`.
        #[serde(default = "default_true")]
        dotfiles: bool,
    },
    /// Render a Tera template.
    Template {
        /// Template file.
        source: String,
        /// Rendered output.
        target: String,
        /// Re-render whenever `source` changes (with `apply --watch`).
        #[serde(default)]
        watch: bool,
    },
    /// Delete a path.
    Remove {
        /// Path to delete.
        path: String,
        /// Allow deleting non-empty directories.
        #[serde(default)]
        recursive: bool,
    },
    /// Run a shell command line.
    Run {
        /// Command line passed to the shell.
        command: String,
        /// Record a non-zero exit as skipped instead of failing the run.
        #[serde(default)]
        allow_failure: bool,
        /// Capture output without echoing it.
        #[serde(default)]
        silent: bool,
        /// Program that must be on `PATH`; the action is skipped without it.
        #[serde(default)]
        requires: Option<String>,
    },
}

const fn default_true() -> bool {
    true
}

impl ActionKind {
    /// The `type = "..."` tag.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Symlink { .. } => "symlink",
            Self::Copy { .. } => "copy",
            Self::Mirror { .. } => "mirror",
            Self::Template { .. } => "template",
            Self::Remove { .. } => "remove",
            Self::Run { .. } => "run",
        }
    }

    /// Source path as written, for kinds that read one.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        match self {
            Self::Symlink { source, .. }
            | Self::Copy { source, .. }
            | Self::Mirror { source, .. }
            | Self::Template { source, .. } => Some(source),
            Self::Remove { .. } | Self::Run { .. } => None,
        }
    }

    /// The `include` regex of a copy or mirror.
    #[must_use]
    pub fn include(&self) -> Option<&str> {
        match self {
            Self::Copy { include, .. } | Self::Mirror { include, .. } => include.as_deref(),
            _ => None,
        }
    }

    /// Path the action writes to, for kinds that write one.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Symlink { target, .. }
            | Self::Copy { target, .. }
            | Self::Mirror { target, .. }
            | Self::Template { target, .. } => Some(target),
            Self::Remove { path, .. } => Some(path),
            Self::Run { .. } => None,
        }
    }

    fn subject(&self) -> &str {
        match self {
            Self::Run { command, .. } => command,
            _ => self.target().unwrap_or_default(),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source() {
            Some(source) => write!(f, "{} {source} -> {}", self.type_name(), self.subject()),
            None => write!(f, "{} {}", self.type_name(), self.subject()),
        }
    }
}

/// One `[[watch]]` entry: run `command` whenever `path` changes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WatchSpec {
    /// Watched path.
    pub path: String,
    /// Command line run on change.
    pub command: String,
}
