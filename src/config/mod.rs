//! Configuration management.
//!
//! This module resolves where marksync keeps its files and loads the
//! user settings that point it at a remote document.
//!
//! # Layout
//!
//! Everything lives under `~/.marksync/` unless overridden:
//! - **Settings**: `~/.marksync/config.json`
//! - **Database**: `~/.marksync/data/marksync.db` (baseline, tombstones, history)
//! - **Local tree**: `~/.marksync/bookmarks.json`

mod settings;

pub use settings::{Settings, ValidSettings, SETTING_KEYS};

use std::path::{Path, PathBuf};

/// Get the global marksync directory (`~/.marksync/`).
#[must_use]
pub fn global_marksync_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".marksync"))
}

/// Resolve the settings file path.
///
/// Priority:
/// 1. `--config` flag
/// 2. `MARKSYNC_CONFIG` environment variable
/// 3. `~/.marksync/config.json`
#[must_use]
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env_path("MARKSYNC_CONFIG") {
        return Some(path);
    }
    global_marksync_dir().map(|dir| dir.join("config.json"))
}

/// Resolve the database path.
///
/// Priority:
/// 1. `--db` flag
/// 2. `MARKSYNC_DB` environment variable
/// 3. `~/.marksync/data/marksync.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env_path("MARKSYNC_DB") {
        return Some(path);
    }
    global_marksync_dir().map(|dir| dir.join("data").join("marksync.db"))
}

/// Resolve the local bookmark tree file.
///
/// Priority:
/// 1. `--tree` flag
/// 2. `MARKSYNC_TREE` environment variable
/// 3. `tree_path` from settings
/// 4. `~/.marksync/bookmarks.json`
#[must_use]
pub fn resolve_tree_path(explicit_path: Option<&Path>, settings: &Settings) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env_path("MARKSYNC_TREE") {
        return Some(path);
    }
    if let Some(path) = &settings.tree_path {
        return Some(path.clone());
    }
    global_marksync_dir().map(|dir| dir.join("bookmarks.json"))
}

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

/// Get the default actor name recorded in audit events.
///
/// Priority:
/// 1. `MARKSYNC_ACTOR` environment variable
/// 2. System username
/// 3. "unknown"
#[must_use]
pub fn default_actor() -> String {
    if let Ok(actor) = std::env::var("MARKSYNC_ACTOR") {
        if !actor.is_empty() {
            return actor;
        }
    }

    if let Ok(user) = std::env::var("USER") {
        if !user.is_empty() {
            return user;
        }
    }

    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_actor() {
        let actor = default_actor();
        assert!(!actor.is_empty());
    }

    #[test]
    fn test_resolve_db_path_with_explicit() {
        let explicit = PathBuf::from("/custom/path/db.sqlite");
        let result = resolve_db_path(Some(&explicit));
        assert_eq!(result, Some(explicit));
    }

    #[test]
    fn test_resolve_config_path_with_explicit() {
        let explicit = PathBuf::from("/custom/marksync.json");
        assert_eq!(resolve_config_path(Some(&explicit)), Some(explicit));
    }

    #[test]
    fn test_tree_path_prefers_flag_over_settings() {
        let settings = Settings {
            tree_path: Some(PathBuf::from("/from/settings.json")),
            ..Settings::default()
        };
        let flag = PathBuf::from("/from/flag.json");
        assert_eq!(resolve_tree_path(Some(&flag), &settings), Some(flag));
    }

    #[test]
    fn test_global_marksync_dir_returns_some() {
        let dir = global_marksync_dir().unwrap();
        assert!(dir.ends_with(".marksync"));
    }
}
