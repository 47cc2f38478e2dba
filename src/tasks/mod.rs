//! Named tasks built from the configuration and run in file order.
mod context;
mod processing;
pub mod sync;
pub mod watch;

pub use context::Context;
pub use processing::{TaskResult, log_report, process_resource};

use anyhow::Result;

use crate::config::Config;
use crate::logging::TaskStatus;
use crate::monitor::Monitor;

/// A named, executable task.
pub trait Task {
    /// Human-readable task name.
    fn name(&self) -> &str;

    /// Execute the task.
    ///
    /// Tasks that react to later changes register themselves with `monitor`.
    ///
    /// # Errors
    ///
    /// Returns an error if the task fails to execute, such as when system commands
    /// fail, file operations are not permitted, or the destination conflicts.
    fn run(&self, ctx: &Context, monitor: &mut Monitor) -> Result<TaskResult>;
}

/// Name-based selection from `--skip` and `--only`.
#[derive(Debug, Default, Clone)]
pub struct TaskFilter {
    /// Task names to leave out.
    pub skip: Vec<String>,
    /// When non-empty, the only task names to run.
    pub only: Vec<String>,
}

impl TaskFilter {
    /// Why `name` is filtered out, or `None` if it should run.
    #[must_use]
    pub fn exclusion(&self, name: &str) -> Option<&'static str> {
        if !self.only.is_empty() && !self.only.iter().any(|n| n == name) {
            Some("excluded by --only")
        } else if self.skip.iter().any(|n| n == name) {
            Some("excluded by --skip")
        } else {
            None
        }
    }
}

/// Every task for `config`, in file order.  `[[watch]]` entries are only
/// registered in watch mode.
#[must_use]
pub fn all_apply_tasks(config: &Config, watch: bool) -> Vec<Box<dyn Task>> {
    let mut tasks: Vec<Box<dyn Task>> = config
        .actions
        .iter()
        .map(|entry| Box::new(sync::ActionTask::new(entry)) as Box<dyn Task>)
        .collect();
    if watch && !config.watches.is_empty() {
        tasks.push(Box::new(watch::RegisterWatches));
    }
    tasks
}

/// Execute a task, recording the result in the logger.
///
/// # Errors
///
/// Returns the task's error after recording it as failed.
pub fn execute(task: &dyn Task, ctx: &Context, monitor: &mut Monitor) -> Result<()> {
    ctx.log.stage(task.name());

    match task.run(ctx, monitor) {
        Ok(TaskResult::Ok) => {
            ctx.log.record_task(task.name(), TaskStatus::Ok, None);
            Ok(())
        }
        Ok(TaskResult::Skipped(reason)) => {
            ctx.log.info(&format!("skipped: {reason}"));
            ctx.log
                .record_task(task.name(), TaskStatus::Skipped, Some(reason.as_str()));
            Ok(())
        }
        Err(e) => {
            ctx.log.error(&format!("{}: {e:#}", task.name()));
            ctx.log
                .record_task(task.name(), TaskStatus::Failed, Some(format!("{e:#}").as_str()));
            Err(e)
        }
    }
}

/// Run `tasks` sequentially, stopping at the first failure.
///
/// # Errors
///
/// Returns the first task error; later tasks are not run.
pub fn run_all(
    tasks: &[Box<dyn Task>],
    ctx: &Context,
    monitor: &mut Monitor,
    filter: &TaskFilter,
) -> Result<()> {
    for task in tasks {
        if let Some(reason) = filter.exclusion(task.name()) {
            ctx.log.debug(&format!("skipping task: {} ({reason})", task.name()));
            ctx.log
                .record_task(task.name(), TaskStatus::Skipped, Some(reason));
            continue;
        }
        execute(task.as_ref(), ctx, monitor)?;
    }
    Ok(())
}

/// Shared helpers for task unit tests.
#[cfg(test)]
pub mod test_helpers {
    use std::sync::Arc;

    use crate::config::test_helpers::write_config;
    use crate::exec::{Executor, SystemExecutor};
    use crate::logging::{Log, Logger};

    use super::Context;

    /// Build a [`Context`] for the config text `toml` with the given executor,
    /// also returning the [`Logger`] so tests can inspect recorded task state.
    #[must_use]
    pub fn context_with(
        executor: Arc<dyn Executor>,
        toml: &str,
    ) -> (Context, Arc<Logger>, tempfile::TempDir) {
        let (dir, config) = write_config(toml);
        let log = Arc::new(Logger::new("test"));
        let ctx = Context::new(
            Arc::new(config),
            Arc::clone(&log) as Arc<dyn Log>,
            executor,
        );
        (ctx, log, dir)
    }

    /// [`context_with`] using the real executor.
    #[must_use]
    pub fn make_context_from(toml: &str) -> (Context, Arc<Logger>, tempfile::TempDir) {
        context_with(Arc::new(SystemExecutor), toml)
    }

    /// Context for an empty configuration.
    #[must_use]
    pub fn make_context() -> (Context, Arc<Logger>, tempfile::TempDir) {
        make_context_from("")
    }
}
