use std::sync::Arc;

use anyhow::Result;

use crate::config::Config;
use crate::exec::Executor;
use crate::logging::Log;
use crate::paths::PathRef;

/// Shared context for task execution.
#[derive(Clone)]
pub struct Context {
    /// Loaded configuration.
    pub config: Arc<Config>,
    /// Logger for output and task recording.
    pub log: Arc<dyn Log>,
    /// Command executor (for testing or real system calls).
    pub executor: Arc<dyn Executor>,
    /// Echo command lines before running them.
    pub verbose: bool,
    /// Register watches with the monitor (`apply --watch`).
    pub watch: bool,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config.path)
            .field("log", &"<dyn Log>")
            .field("executor", &"<dyn Executor>")
            .field("verbose", &self.verbose)
            .field("watch", &self.watch)
            .finish()
    }
}

impl Context {
    /// Creates a new context for task execution.
    #[must_use]
    pub fn new(config: Arc<Config>, log: Arc<dyn Log>, executor: Arc<dyn Executor>) -> Self {
        Self {
            config,
            log,
            executor,
            verbose: false,
            watch: false,
        }
    }

    /// Echo command lines before running them.
    #[must_use]
    pub const fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Register watches while running tasks.
    #[must_use]
    pub const fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    /// Replace the logger.
    #[must_use]
    pub fn with_log(mut self, log: Arc<dyn Log>) -> Self {
        self.log = log;
        self
    }

    /// Resolve a path from the configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if `~` cannot be expanded or an ancestor cannot be
    /// canonicalized.
    pub fn resolve(&self, raw: &str) -> Result<PathRef> {
        self.config.resolve(raw)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use crate::tasks::test_helpers::make_context;

    #[test]
    fn builders_set_flags() {
        let (ctx, _log, _dir) = make_context();
        assert!(!ctx.verbose && !ctx.watch);
        let ctx = ctx.with_verbose(true).with_watch(true);
        assert!(ctx.verbose && ctx.watch);
    }

    #[test]
    fn debug_hides_trait_objects() {
        let (ctx, _log, _dir) = make_context();
        let rendered = format!("{ctx:?}");
        assert!(rendered.contains("<dyn Executor>"));
        assert!(rendered.contains("dotsync.toml"));
    }

    #[test]
    fn resolve_uses_config_root() {
        let (ctx, _log, dir) = make_context();
        let resolved = ctx.resolve("a/b").unwrap();
        assert!(resolved.starts_with(dunce::canonicalize(dir.path()).unwrap()));
    }
}
