//! Local persistence for marksync.
//!
//! # Submodules
//!
//! - [`sqlite`] - baseline, tombstones, pending plan, status and history
//! - [`tree`] - the local bookmark tree (`TreeStore` trait, JSON-backed `FileTree`)
//! - [`events`] - audit event storage
//! - [`schema`] / [`migrations`] - database schema
//! - [`file`] - atomic file writes

pub mod events;
pub mod file;
pub mod migrations;
pub mod schema;
pub mod sqlite;
pub mod tree;

pub use sqlite::{MutationContext, SqliteStorage, StatusMessage, SyncCommit, SyncRun};
pub use tree::{FileTree, TreeStore};
