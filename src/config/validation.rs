//! Non-fatal configuration checks reported before apply runs.
use std::collections::HashMap;

use super::Config;
use super::actions::ActionKind;
use crate::monitor::MIN_INTERVAL;

/// A validation warning detected after configuration loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// The configuration section (`"settings"`, `"action"` or `"watch"`).
    pub source: String,
    /// The specific item that triggered the warning.
    pub item: String,
    /// Human-readable warning message.
    pub message: String,
}

impl ValidationWarning {
    /// Create a new warning.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        item: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            item: item.into(),
            message: message.into(),
        }
    }
}

/// Trait for configuration validators.
pub trait ConfigValidator {
    /// Validate the configuration and return any warnings found.
    fn validate(&self, config: &Config) -> Vec<ValidationWarning>;
}

/// Checks `[[action]]` entries: sources exist, commands are not empty,
/// `include` filters compile, and no two actions write the same target.
#[derive(Debug, Default)]
pub struct ActionValidator;

impl ConfigValidator for ActionValidator {
    fn validate(&self, config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        let mut targets: HashMap<std::path::PathBuf, String> = HashMap::new();

        for action in &config.actions {
            let item = action.display_name();

            if let Some(source) = action.kind.source() {
                // Symlinks may point at paths that appear later.
                let must_exist = !matches!(action.kind, ActionKind::Symlink { .. });
                match config.resolve(source) {
                    Ok(path) if must_exist && !path.exists() => warnings.push(
                        ValidationWarning::new(
                            "action",
                            &item,
                            format!("source does not exist: {path}"),
                        ),
                    ),
                    Ok(_) => {}
                    Err(e) => warnings.push(ValidationWarning::new(
                        "action",
                        &item,
                        format!("cannot resolve source: {e:#}"),
                    )),
                }
            }

            if let ActionKind::Run { command, .. } = &action.kind
                && command.trim().is_empty()
            {
                warnings.push(ValidationWarning::new("action", &item, "command is empty"));
            }

            if let Some(pattern) = action.kind.include()
                && let Err(e) = regex::Regex::new(pattern)
            {
                warnings.push(ValidationWarning::new(
                    "action",
                    &item,
                    format!("include is not a valid regex: {e}"),
                ));
            }

            if let Some(target) = action.kind.target()
                && let Ok(path) = config.resolve(target)
            {
                if let Some(first) = targets.get(path.as_path()) {
                    warnings.push(ValidationWarning::new(
                        "action",
                        &item,
                        format!("target {path} is also written by '{first}'"),
                    ));
                } else {
                    targets.insert(path.into_path_buf(), item.clone());
                }
            }
        }

        warnings
    }
}

/// Checks `[[watch]]` entries for empty commands.
#[derive(Debug, Default)]
pub struct WatchValidator;

impl ConfigValidator for WatchValidator {
    fn validate(&self, config: &Config) -> Vec<ValidationWarning> {
        config
            .watches
            .iter()
            .filter(|w| w.command.trim().is_empty())
            .map(|w| ValidationWarning::new("watch", &w.path, "command is empty"))
            .collect()
    }
}

/// Checks `[settings]` for a poll interval the monitor will not honour.
#[derive(Debug, Default)]
pub struct SettingsValidator;

impl ConfigValidator for SettingsValidator {
    fn validate(&self, config: &Config) -> Vec<ValidationWarning> {
        if config.settings.interval() >= MIN_INTERVAL {
            return Vec::new();
        }
        vec![ValidationWarning::new(
            "settings",
            "interval_ms",
            format!(
                "{} ms is below the minimum, polling every {} ms instead",
                config.settings.interval_ms,
                MIN_INTERVAL.as_millis()
            ),
        )]
    }
}

/// Run every validator over `config`.
#[must_use]
pub fn validate_all(config: &Config) -> Vec<ValidationWarning> {
    let validators: [&dyn ConfigValidator; 3] =
        [&SettingsValidator, &ActionValidator, &WatchValidator];
    validators
        .iter()
        .flat_map(|v| v.validate(config))
        .collect()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::test_helpers::write_config;

    #[test]
    fn clean_config_has_no_warnings() {
        let (dir, config) = write_config(
            r#"
[[action]]
type = "copy"
source = "present.txt"
target = "out/present.txt"
"#,
        );
        std::fs::write(dir.path().join("present.txt"), "x").unwrap();
        assert!(validate_all(&config).is_empty());
    }

    #[test]
    fn missing_source_is_reported() {
        let (_dir, config) = write_config(
            r#"
[[action]]
type = "template"
source = "missing.tera"
target = "out"
"#,
        );
        let warnings = validate_all(&config);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("source does not exist"));
    }

    #[test]
    fn dangling_symlink_source_is_allowed() {
        let (_dir, config) = write_config(
            r#"
[[action]]
type = "symlink"
source = "not-yet"
target = "link"
"#,
        );
        assert!(validate_all(&config).is_empty());
    }

    #[test]
    fn empty_commands_are_reported() {
        let (_dir, config) = write_config(
            r#"
[[action]]
type = "run"
command = "  "

[[watch]]
path = "x"
command = ""
"#,
        );
        let warnings = validate_all(&config);
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].source, "action");
        assert_eq!(warnings[1].source, "watch");
    }

    #[test]
    fn duplicate_targets_are_reported() {
        let (dir, config) = write_config(
            r#"
[[action]]
type = "symlink"
source = "a"
target = "same"
name = "first"

[[action]]
type = "remove"
path = "./same"
"#,
        );
        std::fs::write(dir.path().join("a"), "a").unwrap();
        let warnings = validate_all(&config);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("'first'"));
    }

    #[test]
    fn bad_include_regex_is_reported() {
        let (dir, config) = write_config(
            r#"
[[action]]
type = "mirror"
source = "conf"
target = "out"
include = "(unclosed"
"#,
        );
        std::fs::create_dir(dir.path().join("conf")).unwrap();
        let warnings = validate_all(&config);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.starts_with("include is not a valid regex"));
    }

    #[test]
    fn zero_interval_is_reported() {
        let (_dir, config) = write_config("[settings]\ninterval_ms = 0\n");
        let warnings = validate_all(&config);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].source, "settings");
        assert!(warnings[0].message.contains("polling every 10 ms"));
    }
}
