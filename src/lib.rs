//! marksync - three-way bookmark synchronization.
//!
//! Keeps a local bookmark tree and a shared remote document (a JSON array
//! of records) in step, using the last agreed state as the merge base.
//!
//! # Architecture
//!
//! - [`model`] - Records, structural identity, the nested tree shape
//! - [`sync`] - Merge engine, change-set planning, sync cycle, coordinator
//! - [`remote`] - HTTP transport for the remote document
//! - [`storage`] - SQLite state store and the local tree file
//! - [`config`] - Settings and path resolution
//! - [`cli`] - Command-line interface using clap
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod remote;
pub mod storage;
pub mod sync;

pub use error::{Error, Result};

/// Global dry-run flag for `--dry-run`.
///
/// When set, commands compute and report what they would do without
/// writing the tree, the database or the remote document.
pub static DRY_RUN: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(false);

/// Check if dry-run mode is active.
#[inline]
pub fn is_dry_run() -> bool {
    DRY_RUN.load(std::sync::atomic::Ordering::Relaxed)
}
