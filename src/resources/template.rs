//! Tera template rendering resource.
use std::collections::BTreeMap;
use std::error::Error as _;
use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tera::Tera;

use super::error::SyncError;
use super::helpers::fs::{EntryKind, ensure_parent_dir, entry_kind, remove_existing};
use super::{Applicable, Resource, ResourceChange, ResourceState};
use crate::paths::PathRef;

/// Values visible to a template: every configured variable at the top
/// level plus the process environment under `env`.
#[derive(Debug, Serialize)]
struct RenderContext<'a> {
    #[serde(flatten)]
    vars: &'a BTreeMap<String, String>,
    env: BTreeMap<String, String>,
}

/// Render the template at `source` with `vars`.
///
/// # Errors
///
/// Returns [`SyncError::NotFound`] if `source` is not a regular file,
/// [`SyncError::Io`] if it cannot be read and [`SyncError::Render`] if Tera
/// rejects it.
pub fn render(source: &Path, vars: &BTreeMap<String, String>) -> Result<String, SyncError> {
    if !source.is_file() {
        return Err(SyncError::not_found(source, "template file"));
    }
    let content =
        std::fs::read_to_string(source).map_err(|e| SyncError::io("read", source, e))?;
    let name = source.to_string_lossy();

    let render_error = |e: tera::Error| SyncError::Render {
        path: source.to_path_buf(),
        message: error_chain(&e),
    };
    let context = tera::Context::from_serialize(RenderContext {
        vars,
        env: std::env::vars().collect(),
    })
    .map_err(render_error)?;

    let mut tera = Tera::default();
    tera.autoescape_on(Vec::new());
    tera.add_raw_template(&name, &content).map_err(render_error)?;
    tera.render(&name, &context).map_err(render_error)
}

/// Tera puts the useful part of a message in the source chain.
fn error_chain(e: &tera::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

/// Render `source` into `target`, writing only when the output differs.
///
/// # Errors
///
/// Everything [`render`] returns, plus [`SyncError::Conflict`] when `target`
/// is a directory and [`SyncError::Io`] if writing fails.
pub fn render_template(
    source: &Path,
    target: &Path,
    vars: &BTreeMap<String, String>,
) -> Result<ResourceChange, SyncError> {
    let rendered = render(source, vars)?;
    match rendered_state(target, &rendered) {
        ResourceState::Correct => return Ok(ResourceChange::AlreadyCorrect),
        ResourceState::Invalid { reason } => return Err(SyncError::conflict(target, reason)),
        ResourceState::Missing | ResourceState::Incorrect { .. } => {}
    }

    ensure_parent_dir(target)?;
    if entry_kind(target) == Some(EntryKind::Symlink) {
        remove_existing(target)?;
    }
    std::fs::write(target, rendered.as_bytes()).map_err(|e| SyncError::io("write", target, e))?;
    Ok(ResourceChange::Applied)
}

fn rendered_state(target: &Path, rendered: &str) -> ResourceState {
    match entry_kind(target) {
        None => ResourceState::Missing,
        Some(EntryKind::Directory) => ResourceState::Invalid {
            reason: "target is a directory".to_string(),
        },
        Some(EntryKind::Symlink) => ResourceState::Incorrect {
            current: "target is a symlink".to_string(),
        },
        Some(EntryKind::File) => match std::fs::read(target) {
            Ok(existing) if existing == rendered.as_bytes() => ResourceState::Correct,
            Ok(_) => ResourceState::Incorrect {
                current: "rendered content differs".to_string(),
            },
            Err(e) => ResourceState::Incorrect {
                current: format!("unreadable: {e}"),
            },
        },
    }
}

/// A rendered template that can be checked and applied.
#[derive(Debug, Clone)]
pub struct TemplateResource {
    /// Template file.
    pub source: PathRef,
    /// Rendered output path.
    pub target: PathRef,
    /// Variables available to the template.
    pub vars: BTreeMap<String, String>,
}

impl TemplateResource {
    /// Create a new template resource.
    #[must_use]
    pub const fn new(source: PathRef, target: PathRef, vars: BTreeMap<String, String>) -> Self {
        Self {
            source,
            target,
            vars,
        }
    }
}

impl Applicable for TemplateResource {
    fn description(&self) -> String {
        format!("{} -> {}", self.source, self.target)
    }

    fn apply(&self) -> Result<ResourceChange> {
        Ok(render_template(&self.source, &self.target, &self.vars)?)
    }
}

impl Resource for TemplateResource {
    fn current_state(&self) -> Result<ResourceState> {
        let rendered = render(&self.source, &self.vars)?;
        Ok(rendered_state(&self.target, &rendered))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn vars() -> BTreeMap<String, String> {
        BTreeMap::from([("name".to_string(), "Ada".to_string())])
    }

    #[test]
    fn renders_variables_and_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("greeting.tera");
        let dst = dir.path().join("out").join("greeting");
        std::fs::write(&src, "hello {{ name }}\n").unwrap();

        assert_eq!(render_template(&src, &dst, &vars()).unwrap(), ResourceChange::Applied);
        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "hello Ada\n");
        assert_eq!(
            render_template(&src, &dst, &vars()).unwrap(),
            ResourceChange::AlreadyCorrect
        );
    }

    #[test]
    fn environment_is_exposed_under_env() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("env.tera");
        std::fs::write(&src, "{% if env.PATH %}has path{% endif %}").unwrap();
        assert_eq!(render(&src, &BTreeMap::new()).unwrap(), "has path");
    }

    #[test]
    fn undefined_variable_is_render_error() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("bad.tera");
        std::fs::write(&src, "{{ missing_var }}").unwrap();
        let err = render(&src, &vars()).unwrap_err();
        assert!(matches!(err, SyncError::Render { .. }));
        assert!(err.to_string().contains("missing_var"), "{err}");
    }

    #[test]
    fn missing_template_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = render(&dir.path().join("nope.tera"), &vars()).unwrap_err();
        assert!(matches!(err, SyncError::NotFound { .. }));
    }

    #[test]
    fn directory_target_is_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("t.tera");
        std::fs::write(&src, "x").unwrap();
        let dst = dir.path().join("dst");
        std::fs::create_dir(&dst).unwrap();
        assert!(matches!(
            render_template(&src, &dst, &vars()),
            Err(SyncError::Conflict { .. })
        ));
    }

    #[test]
    fn resource_state_follows_variables() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("t.tera");
        let dst = dir.path().join("t");
        std::fs::write(&src, "{{ name }}").unwrap();
        let resource = TemplateResource::new(
            PathRef::from_cwd(&src).unwrap(),
            PathRef::from_cwd(&dst).unwrap(),
            vars(),
        );
        resource.apply().unwrap();
        assert_eq!(resource.current_state().unwrap(), ResourceState::Correct);

        let changed = TemplateResource {
            vars: BTreeMap::from([("name".to_string(), "Grace".to_string())]),
            ..resource
        };
        assert!(matches!(
            changed.current_state().unwrap(),
            ResourceState::Incorrect { .. }
        ));
    }
}
