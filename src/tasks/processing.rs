//! Shared resource-processing helpers used by the sync tasks.
use anyhow::Result;

use super::Context;
use crate::resources::tree::SyncReport;
use crate::resources::{Resource, ResourceChange, ResourceState};

/// Outcome of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskResult {
    /// Task completed successfully.
    Ok,
    /// Task did nothing on purpose; the reason ends up in the summary.
    Skipped(String),
}

/// Check a resource and apply it if needed.
///
/// A resource already in the desired state is only mentioned at debug
/// level, so re-running a converged configuration prints nothing per item.
///
/// # Errors
///
/// Returns an error if the state cannot be determined or applying fails.
pub fn process_resource(ctx: &Context, resource: &dyn Resource, verb: &str) -> Result<TaskResult> {
    let desc = resource.description();
    let state = resource.current_state()?;
    if state == ResourceState::Correct {
        ctx.log.debug(&format!("ok: {desc}"));
        return Ok(TaskResult::Ok);
    }
    if let ResourceState::Incorrect { current } = &state {
        ctx.log.debug(&format!("{desc}: {current}"));
    }

    match resource.apply()? {
        ResourceChange::Applied => ctx.log.info(&format!("{verb}: {desc}")),
        ResourceChange::AlreadyCorrect => ctx.log.debug(&format!("ok: {desc}")),
    }
    Ok(TaskResult::Ok)
}

/// Log every mutation of a tree copy or mirror pass.
pub fn log_report(ctx: &Context, desc: &str, report: &SyncReport) -> TaskResult {
    for (path, kind) in &report.removed {
        ctx.log.info(&format!("removed {} {}", kind.as_str(), path.display()));
    }
    for path in &report.created {
        ctx.log.debug(&format!("created {}", path.display()));
    }
    for path in &report.copied {
        ctx.log.info(&format!("copied {}", path.display()));
    }
    for path in &report.skipped {
        ctx.log.debug(&format!("not following {}", path.display()));
    }
    if report.is_noop() {
        ctx.log.debug(&format!("ok: {desc}"));
    } else {
        ctx.log.debug(&format!("{desc}: {} change(s)", report.changes()));
    }
    TaskResult::Ok
}
