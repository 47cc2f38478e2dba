// Shared helpers for integration tests.
//
// Provides a temporary-directory-backed dotfiles repository and a fluent
// builder so each integration test can set up an isolated environment
// without repeating filesystem boilerplate.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dotsync_cli::cli::{ApplyOpts, GlobalOpts};
use dotsync_cli::commands;
use dotsync_cli::config::{Config, DEFAULT_FILE_NAME};
use dotsync_cli::logging::Logger;

/// An isolated test repository backed by a [`tempfile::TempDir`].
///
/// `dotsync.toml` lives at the root; `home/` is the conventional target area.
pub struct IntegrationTestContext {
    /// Temporary directory containing the repository.
    pub root: tempfile::TempDir,
}

impl IntegrationTestContext {
    /// Create an empty repository with an empty `home/`.
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        std::fs::create_dir_all(root.path().join("home")).expect("create home dir");
        std::fs::write(root.path().join(DEFAULT_FILE_NAME), "").expect("write config");
        Self { root }
    }

    /// Path to the repository root.
    pub fn root_path(&self) -> &Path {
        self.root.path()
    }

    /// Absolute path of `rel` inside the repository.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.path().join(rel)
    }

    /// Path to `dotsync.toml`.
    pub fn config_path(&self) -> PathBuf {
        self.path(DEFAULT_FILE_NAME)
    }

    /// Load the repository's configuration.
    pub fn load_config(&self) -> Config {
        Config::load(&self.config_path()).expect("load config")
    }

    /// Write `contents` to `rel`, creating parent directories.
    pub fn write(&self, rel: &str, contents: &str) {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dir");
        }
        std::fs::write(path, contents).expect("write file");
    }

    /// Read `rel` as a string.
    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.path(rel)).expect("read file")
    }

    /// Run `dotsync apply` against this repository, returning the logger for
    /// inspection of the recorded tasks.
    pub fn apply(&self, opts: ApplyOpts) -> (anyhow::Result<()>, Arc<Logger>) {
        let global = GlobalOpts {
            config: Some(self.config_path()),
        };
        let log = Arc::new(Logger::new("test"));
        let result = commands::apply::run(&global, &opts, &log, false);
        (result, log)
    }
}

/// `apply` options without watch mode or filters.
pub fn apply_opts() -> ApplyOpts {
    ApplyOpts {
        watch: false,
        skip: Vec::new(),
        only: Vec::new(),
    }
}

/// Fluent builder for [`IntegrationTestContext`].
pub struct TestContextBuilder {
    ctx: IntegrationTestContext,
}

impl TestContextBuilder {
    /// Begin building a new context backed by an empty repository.
    pub fn new() -> Self {
        Self {
            ctx: IntegrationTestContext::new(),
        }
    }

    /// Replace `dotsync.toml` with `content`.
    pub fn with_config(self, content: &str) -> Self {
        std::fs::write(self.ctx.config_path(), content).expect("write config");
        self
    }

    /// Create a source file at `rel` inside the repository.
    pub fn with_file(self, rel: &str, contents: &str) -> Self {
        self.ctx.write(rel, contents);
        self
    }

    /// Finish building and return the configured context.
    pub fn build(self) -> IntegrationTestContext {
        self.ctx
    }
}
