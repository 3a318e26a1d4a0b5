//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::sync::Choice;

pub mod commands;

/// marksync - three-way bookmark sync against a shared remote document
#[derive(Parser, Debug)]
#[command(name = "marksync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.marksync/data/marksync.db)
    #[arg(long, global = true, env = "MARKSYNC_DB")]
    pub db: Option<PathBuf>,

    /// Settings file (default: ~/.marksync/config.json)
    #[arg(long, global = true, env = "MARKSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Local bookmark tree file (default: ~/.marksync/bookmarks.json)
    #[arg(long, global = true, env = "MARKSYNC_TREE")]
    pub tree: Option<PathBuf>,

    /// Actor name for the audit trail
    #[arg(long, global = true, env = "MARKSYNC_ACTOR")]
    pub actor: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Preview changes without writing anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database, settings and an empty local tree
    Init {
        /// Recreate the database and tree even if they exist
        #[arg(long)]
        force: bool,
    },

    /// Print version information
    Version,

    /// Show or change settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Run one sync cycle against the remote document
    Sync(SyncArgs),

    /// Keep syncing: on local edits (debounced) and every interval
    Watch {
        /// Detect conflicts instead of reconciling silently
        #[arg(long)]
        strict: bool,

        /// Quiet period after a local edit, in seconds
        #[arg(long, default_value = "2")]
        debounce: u64,
    },

    /// Show last sync status and local state
    Status,

    /// Inspect or drop the plan waiting for confirmation
    Pending {
        #[command(subcommand)]
        command: PendingCommands,
    },

    /// Edit the local bookmark tree
    Bookmark {
        #[command(subcommand)]
        command: BookmarkCommands,
    },

    /// Inspect or clear local deletion records
    Tombstones {
        #[command(subcommand)]
        command: TombstoneCommands,
    },

    /// Compute a sync plan from a JSON file of states (no I/O)
    Plan {
        /// File with oldRemoteState, currentLocalState, currentRemoteState
        inputs: PathBuf,

        /// Detect conflicts instead of reconciling silently
        #[arg(long)]
        strict: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show current settings (password masked)
    Show,

    /// Set a value (url, username, password, interval, tree_path, confirm)
    Set {
        key: String,
        value: String,
    },

    /// Remove a value
    Unset {
        key: String,
    },

    /// Check that a sync can be attempted
    Validate,
}

// ============================================================================
// Sync
// ============================================================================

/// Which side wins a conflict.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Prefer {
    Local,
    Remote,
}

impl From<Prefer> for Choice {
    fn from(prefer: Prefer) -> Self {
        match prefer {
            Prefer::Local => Self::Local,
            Prefer::Remote => Self::Remote,
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct SyncArgs {
    /// Apply without asking
    #[arg(short, long)]
    pub yes: bool,

    /// Resolve every conflict in favor of one side
    #[arg(long, value_enum)]
    pub prefer: Option<Prefer>,

    /// Detect conflicts instead of reconciling silently
    #[arg(long)]
    pub strict: bool,
}

// ============================================================================
// Pending / Tombstones
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum PendingCommands {
    /// Show the pending plan and its conflicts
    Show,

    /// Drop the pending plan
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum TombstoneCommands {
    /// List local deletion records
    List,

    /// Forget all local deletion records
    Clear,
}

// ============================================================================
// Bookmark Commands
// ============================================================================

/// Nodes are addressed by slash-separated titles from the root,
/// e.g. `Bar/Dev/Rust`.
#[derive(Subcommand, Debug)]
pub enum BookmarkCommands {
    /// List all bookmarks and folders
    List {
        /// Only list under this folder
        folder: Option<String>,
    },

    /// Add a bookmark to a folder
    Add {
        /// Parent folder ("" for the top level)
        folder: String,
        title: String,
        url: String,

        /// Position among siblings (default: last)
        #[arg(short, long)]
        index: Option<usize>,
    },

    /// Create a folder
    Mkdir {
        /// Parent folder ("" for the top level)
        folder: String,
        title: String,

        #[arg(short, long)]
        index: Option<usize>,
    },

    /// Remove a bookmark or folder (with its content)
    Rm {
        /// Node path
        path: String,
    },

    /// Move a node to another folder and/or position
    Mv {
        /// Node path
        path: String,

        /// Destination folder (default: current folder)
        #[arg(long)]
        to: Option<String>,

        #[arg(short, long)]
        index: Option<usize>,
    },

    /// Change a node's title and/or URL
    Rename {
        /// Node path
        path: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New URL (bookmarks only)
        #[arg(long)]
        url: Option<String>,
    },

    /// Find bookmarks by title or URL
    Search {
        query: String,
    },
}

/// Split a slash-separated node path into segments. Empty input is the root.
#[must_use]
pub fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
