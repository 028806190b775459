//! Merlin: declarative macOS workstation setup from a dotfiles repository.
//!
//! The public API is organised into layers:
//!
//! - **[`config`]**: discover the repository and resolve its declarations
//! - **[`resources`]**: reconciliation engines (symlinks, backups, scripts, packages)
//! - **[`drift`]**: compare the declared model with a live snapshot
//! - **[`vcs`]**: commit declared-state changes without touching unrelated work
//! - **[`commands`]**: top-level subcommand orchestration
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod drift;
pub mod error;
pub mod exec;
pub mod logging;
pub mod platform;
pub mod resources;
pub mod vcs;
