//! Sync primitives: each one inspects its target, then converges it.
pub mod copy;
pub mod error;
pub mod helpers;
pub mod remove;
pub mod symlink;
pub mod template;
pub mod tree;

use anyhow::Result;

/// Something a task can converge.
///
/// Copy and mirror only learn what differs while walking both trees, so they
/// stop here.  Single-target resources also implement [`Resource`].
pub trait Applicable {
    /// One-line description used in log messages.
    fn description(&self) -> String;

    /// Bring the target to the desired state, creating parent directories as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error on filesystem failures or when the target holds
    /// something that must not be replaced.
    fn apply(&self) -> Result<ResourceChange>;
}

/// What a resource found at its target before applying.
///
/// # Examples
///
/// ```
/// use dotsync_cli::resources::ResourceState;
///
/// let stale = ResourceState::Incorrect { current: "-> /old/vimrc".into() };
/// assert_ne!(stale, ResourceState::Correct);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// Nothing at the target.
    Missing,
    /// Target already matches.
    Correct,
    /// Target exists with different content or link destination.
    Incorrect {
        /// What the target holds now.
        current: String,
    },
    /// Target holds something apply refuses to replace.
    Invalid {
        /// Why the target cannot be converged.
        reason: String,
    },
}

/// What [`Applicable::apply`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceChange {
    /// The target was written, linked or deleted.
    Applied,
    /// The target was already in the desired state.
    AlreadyCorrect,
}

/// A resource that can inspect its own target without applying.
pub trait Resource: Applicable {
    /// Inspect the target.
    ///
    /// # Errors
    ///
    /// Returns an error if the target cannot be read.
    fn current_state(&self) -> Result<ResourceState>;
}
