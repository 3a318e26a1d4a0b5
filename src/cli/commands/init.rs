//! Initialize marksync on this machine.
//!
//! Creates the database, an empty local bookmark tree and, if missing, an
//! empty settings file. Settings are never overwritten, even with `--force`.

use crate::cli::commands::{print_json, Context};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::storage::{FileTree, SqliteStorage};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(Serialize)]
struct InitOutput {
    database: PathBuf,
    tree: PathBuf,
    config: PathBuf,
    tree_created: bool,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns [`Error::AlreadyInitialized`] if the database exists and `force`
/// is not set, or an error if a file cannot be created.
pub fn execute(ctx: &Context, force: bool) -> Result<()> {
    let db_path = ctx.db_path()?;
    if db_path.exists() && !force {
        return Err(Error::AlreadyInitialized { path: db_path });
    }

    let config_path = ctx.config_path()?;
    let settings = if config_path.exists() {
        Settings::load(&config_path)?
    } else {
        let settings = Settings::default();
        settings.save(&config_path)?;
        settings
    };

    if force && db_path.exists() {
        fs::remove_file(&db_path)?;
    }
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    SqliteStorage::open(&db_path)?;

    let tree_path = ctx.tree_path(&settings)?;
    let tree_created = force || !tree_path.exists();
    if tree_created {
        FileTree::create_file(&tree_path)?;
    }
    info!(db = %db_path.display(), tree = %tree_path.display(), "Initialized");

    if ctx.json {
        print_json(&InitOutput {
            database: db_path,
            tree: tree_path,
            config: config_path,
            tree_created,
        })?;
    } else {
        println!("Initialized marksync");
        println!("  Database: {}", db_path.display());
        println!("  Tree:     {}", tree_path.display());
        println!("  Settings: {}", config_path.display());
        println!();
        println!("Next: marksync config set url <document-url> (and username, password, interval)");
    }

    Ok(())
}
