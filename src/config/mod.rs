//! `dotsync.toml` loading and path resolution.
pub mod actions;
pub mod toml_loader;
pub mod validation;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::paths::PathRef;
pub use actions::{ActionEntry, ActionKind, Settings, WatchSpec};
pub use validation::ValidationWarning;

/// File name looked up in the current directory when no path is given.
pub const DEFAULT_FILE_NAME: &str = "dotsync.toml";

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "DOTSYNC_CONFIG";

/// On-disk layout of `dotsync.toml`.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    settings: Settings,
    #[serde(default)]
    vars: BTreeMap<String, String>,
    #[serde(default, rename = "action")]
    actions: Vec<ActionEntry>,
    #[serde(default, rename = "watch")]
    watches: Vec<WatchSpec>,
}

/// Loaded configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// The configuration file itself.
    pub path: PathBuf,
    /// Directory relative action paths resolve against.
    pub root: PathBuf,
    /// `[settings]`.
    pub settings: Settings,
    /// Template variables from `[vars]`.
    pub vars: BTreeMap<String, String>,
    /// `[[action]]` entries in file order.
    pub actions: Vec<ActionEntry>,
    /// `[[watch]]` entries.
    pub watches: Vec<WatchSpec>,
}

impl Config {
    /// Find the configuration file: `explicit`, then `$DOTSYNC_CONFIG`, then
    /// `./dotsync.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the chosen file does not exist.
    pub fn locate(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
        let candidate = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FILE_NAME));
        if candidate.is_file() {
            Ok(candidate)
        } else {
            Err(ConfigError::NotFound(candidate))
        }
    }

    /// Load the configuration at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if its
    /// directory cannot be resolved.
    pub fn load(path: &Path) -> Result<Self> {
        let file: ConfigFile = toml_loader::load_config(path)?;
        let path = PathRef::from_cwd(path)
            .with_context(|| format!("resolving {}", path.display()))?
            .into_path_buf();
        let root = path
            .parent()
            .map_or_else(|| PathBuf::from("/"), Path::to_path_buf);
        Ok(Self {
            path,
            root,
            settings: file.settings,
            vars: file.vars,
            actions: file.actions,
            watches: file.watches,
        })
    }

    /// Resolve a path as written in the file: `~` expands to the home
    /// directory and relative paths are taken from the config directory.
    ///
    /// # Errors
    ///
    /// See [`PathRef::resolve`].
    pub fn resolve(&self, raw: &str) -> Result<PathRef> {
        PathRef::resolve(raw, &self.root)
    }

    /// Non-fatal problems worth reporting before applying.
    #[must_use]
    pub fn validate(&self) -> Vec<ValidationWarning> {
        validation::validate_all(self)
    }
}
