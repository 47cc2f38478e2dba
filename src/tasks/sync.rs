//! One task per configured `[[action]]`.
use std::sync::Arc;

use anyhow::Result;

use super::{Context, Task, TaskResult, log_report, process_resource};
use crate::config::{ActionEntry, ActionKind};
use crate::exec::run_checked;
use crate::monitor::Monitor;
use crate::resources::remove::RemoveResource;
use crate::resources::symlink::SymlinkResource;
use crate::resources::template::TemplateResource;
use crate::resources::tree::{CopyTreeResource, MirrorResource, TreeFilter};
use crate::resources::{Applicable as _, ResourceChange};

/// Apply a single configuration action.
#[derive(Debug, Clone)]
pub struct ActionTask {
    name: String,
    kind: ActionKind,
}

impl ActionTask {
    /// Create a task for `entry`.
    #[must_use]
    pub fn new(entry: &ActionEntry) -> Self {
        Self {
            name: entry.display_name(),
            kind: entry.kind.clone(),
        }
    }
}

impl Task for ActionTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: &Context, monitor: &mut Monitor) -> Result<TaskResult> {
        ctx.log.debug(&self.kind.to_string());
        match &self.kind {
            ActionKind::Symlink { source, target } => {
                let resource = SymlinkResource::new(
                    ctx.resolve(source)?,
                    ctx.resolve(target)?,
                    Arc::clone(&ctx.executor),
                );
                process_resource(ctx, &resource, "link")
            }
            ActionKind::Copy {
                source,
                target,
                include,
                dotfiles,
            } => {
                let resource = CopyTreeResource::new(ctx.resolve(source)?, ctx.resolve(target)?)
                    .with_filter(tree_filter(include.as_deref(), *dotfiles));
                let report = resource.sync()?;
                Ok(log_report(ctx, &resource.description(), &report))
            }
            ActionKind::Mirror {
                source,
                target,
                include,
                dotfiles,
            } => {
                let resource = MirrorResource::new(ctx.resolve(source)?, ctx.resolve(target)?)
                    .with_filter(tree_filter(include.as_deref(), *dotfiles));
                let report = resource.sync()?;
                Ok(log_report(ctx, &resource.description(), &report))
            }
            ActionKind::Template {
                source,
                target,
                watch,
            } => {
                let resource = TemplateResource::new(
                    ctx.resolve(source)?,
                    ctx.resolve(target)?,
                    ctx.config.vars.clone(),
                );
                let result = process_resource(ctx, &resource, "render")?;
                if *watch && ctx.watch {
                    watch_template(ctx, monitor, resource);
                }
                Ok(result)
            }
            ActionKind::Remove { path, recursive } => {
                let resource = RemoveResource::new(ctx.resolve(path)?, *recursive);
                process_resource(ctx, &resource, "remove")
            }
            ActionKind::Run {
                command,
                allow_failure,
                silent,
                requires,
            } => {
                if let Some(program) = requires
                    && !ctx.executor.which(program)
                {
                    let reason = format!("{program} not found on PATH");
                    ctx.log.warn(&format!("{command}: {reason}"));
                    return Ok(TaskResult::Skipped(reason));
                }
                run_command(ctx, command, *allow_failure, *silent)
            }
        }
    }
}

fn tree_filter(include: Option<&str>, dotfiles: bool) -> TreeFilter {
    TreeFilter {
        dotfiles,
        include: include.map(str::to_string),
    }
}

/// Re-render `resource` whenever its source changes.
fn watch_template(ctx: &Context, monitor: &mut Monitor, resource: TemplateResource) {
    let log = Arc::clone(&ctx.log);
    let source = resource.source.clone();
    ctx.log.debug(&format!("watching {source}"));
    monitor.watch(source, move || {
        if resource.apply()? == ResourceChange::Applied {
            log.info(&format!("render: {}", resource.description()));
        }
        Ok(())
    });
}

fn run_command(
    ctx: &Context,
    command: &str,
    allow_failure: bool,
    silent: bool,
) -> Result<TaskResult> {
    if !allow_failure {
        run_checked(ctx.executor.as_ref(), command, ctx.verbose, silent)?;
        return Ok(TaskResult::Ok);
    }

    let result = ctx.executor.execute(command, ctx.verbose, silent)?;
    if result.success {
        return Ok(TaskResult::Ok);
    }
    let reason = if result.command_not_found() {
        "command not found".to_string()
    } else {
        result
            .code
            .map_or_else(|| "terminated by signal".to_string(), |c| format!("exit {c}"))
    };
    ctx.log.warn(&format!("{command}: {reason} (allowed to fail)"));
    Ok(TaskResult::Skipped(reason))
}
