//! Polling change monitor that re-runs actions when watched files change.
//!
//! A [`Monitor`] is an ordinary owned value: tasks register watches on it
//! while the configuration is applied, then the apply command hands it to
//! [`Monitor::run_until_interrupted`].  Change detection compares
//! modification times on a fixed interval; there is no OS event
//! subscription.
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime};

use anyhow::{Context as _, Result};

use crate::logging::Log;
use crate::paths::PathRef;

/// Default time between two polls.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

/// Shortest accepted poll interval; smaller values are raised to this.
pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Longest single sleep while waiting for the next poll.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Callback fired when a watched path changes.
pub type WatchAction = Box<dyn FnMut() -> Result<()>>;

/// A watched path and the action bound to it.
pub struct WatchEntry {
    /// Path whose modification time is tracked.
    pub path: PathRef,
    /// Modification time observed at the last poll.
    pub last_seen: Option<SystemTime>,
    action: WatchAction,
}

impl fmt::Debug for WatchEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchEntry")
            .field("path", &self.path)
            .field("last_seen", &self.last_seen)
            .finish_non_exhaustive()
    }
}

/// Registry of watched paths polled by [`Monitor::run_loop`].
#[derive(Debug)]
pub struct Monitor {
    entries: Vec<WatchEntry>,
    interval: Duration,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Monitor {
    /// Create an empty monitor polling every [`DEFAULT_INTERVAL`].
    #[must_use]
    pub const fn new() -> Self {
        Self::with_interval(DEFAULT_INTERVAL)
    }

    /// Create an empty monitor with a custom poll interval, never shorter
    /// than [`MIN_INTERVAL`].
    #[must_use]
    pub const fn with_interval(interval: Duration) -> Self {
        let interval = if interval.as_nanos() < MIN_INTERVAL.as_nanos() {
            MIN_INTERVAL
        } else {
            interval
        };
        Self {
            entries: Vec::new(),
            interval,
        }
    }

    /// Poll interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Register `action` to run whenever `path` is modified.
    ///
    /// Registrations accumulate; the same path may be watched more than once.
    pub fn watch(&mut self, path: PathRef, action: impl FnMut() -> Result<()> + 'static) {
        let last_seen = modified(&path);
        self.entries.push(WatchEntry {
            path,
            last_seen,
            action: Box::new(action),
        });
    }

    /// Number of registered watches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when nothing is watched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record the current modification time of every watched path.
    pub fn arm(&mut self) {
        for entry in &mut self.entries {
            entry.last_seen = modified(&entry.path);
        }
    }

    /// Check every watched path once and fire the actions of those that
    /// changed.  Returns how many actions ran.
    ///
    /// The new modification time is recorded before the action runs, so a
    /// failing action is not retried until the path changes again.  Failures
    /// are logged as warnings.
    pub fn poll_once(&mut self, log: &dyn Log) -> usize {
        let mut fired = 0;
        for entry in &mut self.entries {
            let current = modified(&entry.path);
            if current == entry.last_seen {
                continue;
            }
            entry.last_seen = current;
            if current.is_none() {
                log.debug(&format!("watched path disappeared: {}", entry.path));
                continue;
            }
            log.info(&format!("changed: {}", entry.path));
            fired += 1;
            if let Err(e) = (entry.action)() {
                log.warn(&format!("action for {} failed: {e:#}", entry.path));
            }
        }
        fired
    }

    /// Poll until `stop` is set.
    ///
    /// Modification times are re-armed first so that changes made while the
    /// configuration was applied do not fire.
    pub fn run_loop(&mut self, stop: &AtomicBool, log: &dyn Log) {
        self.arm();
        while !stop.load(Ordering::SeqCst) {
            self.poll_once(log);
            sleep_unless_stopped(self.interval, stop);
        }
    }

    /// Poll until the user presses Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if the Ctrl-C handler cannot be installed.
    pub fn run_until_interrupted(&mut self, log: &dyn Log) -> Result<()> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
            .context("installing Ctrl-C handler")?;

        log.stage(&format!(
            "Watching {} path(s) every {} ms (Ctrl-C to stop)",
            self.len(),
            self.interval.as_millis()
        ));
        self.run_loop(&stop, log);
        log.info("stopped watching");
        Ok(())
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + total;
    while !stop.load(Ordering::SeqCst) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        std::thread::sleep(remaining.min(SLEEP_SLICE));
    }
}
