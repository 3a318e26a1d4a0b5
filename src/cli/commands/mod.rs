//! Command implementations.

pub mod bookmark;
pub mod completions;
pub mod config;
pub mod init;
pub mod pending;
pub mod plan;
pub mod status;
pub mod sync;
pub mod tombstones;
pub mod version;
pub mod watch;

use std::path::{Path, PathBuf};

use crate::cli::Cli;
use crate::config::{default_actor, resolve_config_path, resolve_db_path, resolve_tree_path, Settings};
use crate::error::{Error, Result};
use crate::storage::{FileTree, SqliteStorage};

/// Paths and flags every command resolves the same way.
#[derive(Debug, Clone)]
pub struct Context {
    pub db: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub tree: Option<PathBuf>,
    pub actor: String,
    pub json: bool,
}

impl Context {
    #[must_use]
    pub fn from_cli(cli: &Cli, json: bool) -> Self {
        Self {
            db: cli.db.clone(),
            config: cli.config.clone(),
            tree: cli.tree.clone(),
            actor: cli.actor.clone().unwrap_or_else(default_actor),
            json,
        }
    }

    /// Resolved database path.
    pub fn db_path(&self) -> Result<PathBuf> {
        resolve_db_path(self.db.as_deref())
            .ok_or_else(|| Error::Config("Could not determine database location".to_string()))
    }

    /// Resolved settings file path.
    pub fn config_path(&self) -> Result<PathBuf> {
        resolve_config_path(self.config.as_deref())
            .ok_or_else(|| Error::Config("Could not determine settings location".to_string()))
    }

    /// Settings with environment overrides applied.
    pub fn settings(&self) -> Result<Settings> {
        Settings::load_with_env(&self.config_path()?)
    }

    /// Resolved tree file path.
    pub fn tree_path(&self, settings: &Settings) -> Result<PathBuf> {
        resolve_tree_path(self.tree.as_deref(), settings)
            .ok_or_else(|| Error::Config("Could not determine bookmark tree location".to_string()))
    }

    /// Open the existing database.
    pub fn open_storage(&self) -> Result<SqliteStorage> {
        let path = self.db_path()?;
        if !path.exists() {
            return Err(Error::NotInitialized);
        }
        SqliteStorage::open(&path)
    }

    /// Open the existing tree file.
    pub fn open_tree(&self, settings: &Settings) -> Result<FileTree> {
        FileTree::open(&self.tree_path(settings)?)
    }
}

/// Print a serializable value as one line of JSON.
pub(crate) fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

/// Format Unix milliseconds for humans.
pub(crate) fn format_millis(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map_or_else(|| millis.to_string(), |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

/// Display form of a possibly missing path.
pub(crate) fn show_path(path: Option<&Path>) -> String {
    path.map_or_else(|| "-".to_string(), |p| p.display().to_string())
}
