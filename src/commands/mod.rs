pub mod apply;
pub mod version;

use std::sync::Arc;

use anyhow::Result;

use crate::cli::GlobalOpts;
use crate::config::Config;
use crate::exec::SystemExecutor;
use crate::logging::{Log, Logger};
use crate::tasks::Context;

/// Shared state produced by the common command setup sequence.
#[derive(Debug)]
pub struct CommandSetup {
    /// Loaded configuration shared with every task.
    pub config: Arc<Config>,
}

impl CommandSetup {
    /// Locate and load the configuration, printing validation warnings.
    ///
    /// # Errors
    ///
    /// Returns an error if no configuration file can be found or it fails to
    /// parse.
    pub fn init(global: &GlobalOpts, log: &Logger) -> Result<Self> {
        log.stage("Loading configuration");
        let path = Config::locate(global.config.as_deref())?;
        let config = Config::load(&path)?;
        log.info(&format!(
            "loaded {} action(s), {} watch(es) from {}",
            config.actions.len(),
            config.watches.len(),
            config.path.display()
        ));
        log.debug(&format!("{} template variable(s)", config.vars.len()));

        let warnings = config.validate();
        if !warnings.is_empty() {
            log.warn(&format!(
                "found {} configuration warning(s):",
                warnings.len()
            ));
            for warning in &warnings {
                log.warn(&format!(
                    "  {} [{}]: {}",
                    warning.source, warning.item, warning.message
                ));
            }
        }

        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// Build the task context backed by the real system executor.
    #[must_use]
    pub fn context(&self, log: Arc<dyn Log>, verbose: bool) -> Context {
        Context::new(Arc::clone(&self.config), log, Arc::new(SystemExecutor)).with_verbose(verbose)
    }
}
