//! Registration of `[[watch]]` entries with the monitor.
use std::sync::Arc;

use anyhow::Result;

use super::{Context, Task, TaskResult};
use crate::exec::run_checked;
use crate::monitor::Monitor;

/// Register every `[[watch]]` entry so its command runs when the path changes.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegisterWatches;

impl Task for RegisterWatches {
    fn name(&self) -> &str {
        "watches"
    }

    fn run(&self, ctx: &Context, monitor: &mut Monitor) -> Result<TaskResult> {
        if !ctx.watch {
            return Ok(TaskResult::Skipped("watch mode off".to_string()));
        }
        for spec in &ctx.config.watches {
            let path = ctx.resolve(&spec.path)?;
            let executor = Arc::clone(&ctx.executor);
            let command = spec.command.clone();
            let verbose = ctx.verbose;
            ctx.log.debug(&format!("watching {path}: {command}"));
            monitor.watch(path, move || {
                run_checked(executor.as_ref(), &command, verbose, false).map(|_| ())
            });
        }
        Ok(TaskResult::Ok)
    }
}
