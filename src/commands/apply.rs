use std::sync::Arc;

use anyhow::Result;

use super::CommandSetup;
use super::version::version;
use crate::cli::{ApplyOpts, GlobalOpts};
use crate::logging::{Log, Logger};
use crate::monitor::Monitor;
use crate::tasks::{self, TaskFilter};

/// Run the apply command.
///
/// Every action runs in file order; the first failure stops the run.  With
/// `--watch`, the monitor then polls registered paths until interrupted.
///
/// # Errors
///
/// Returns an error if configuration loading fails or a task fails.
pub fn run(global: &GlobalOpts, opts: &ApplyOpts, log: &Arc<Logger>, verbose: bool) -> Result<()> {
    log.info(&format!("dotsync {}", version()));

    let setup = CommandSetup::init(global, log)?;
    let ctx = setup
        .context(Arc::clone(log) as Arc<dyn Log>, verbose)
        .with_watch(opts.watch);

    let tasks = tasks::all_apply_tasks(&setup.config, opts.watch);
    let filter = TaskFilter {
        skip: opts.skip.clone(),
        only: opts.only.clone(),
    };
    let mut monitor = Monitor::with_interval(setup.config.settings.interval());

    let outcome = tasks::run_all(&tasks, &ctx, &mut monitor, &filter);
    log.print_summary();
    outcome?;

    if opts.watch {
        if monitor.is_empty() {
            log.warn("--watch given but nothing to watch");
            return Ok(());
        }
        monitor.run_until_interrupted(log.as_ref())?;
    }
    Ok(())
}
