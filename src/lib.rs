//! Declarative dotfile provisioning.
//!
//! `dotsync` converges the filesystem to a TOML description: symlinks, file
//! and tree copies, mirrors, rendered templates, removals and shell commands.
//! In watch mode it keeps polling the sources and re-applies on change.
//!
//! The public API is organised into layers:
//!
//! - **[`exec`]**: run shell commands and capture both output streams
//! - **[`resources`]**: idempotent `check + apply` filesystem primitives
//! - **[`monitor`]**: poll modification times and fire callbacks
//! - **[`config`]**: parse and validate `dotsync.toml`
//! - **[`tasks`]**: named units of work wired to resources
//! - **[`commands`]**: top-level subcommand orchestration
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod logging;
pub mod monitor;
pub mod paths;
pub mod resources;
pub mod tasks;
