//! Error types for marksync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=storage, 3=not_found, 4=validation, etc.)
//! - Retryability flags
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for marksync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Storage (exit 2)
    NotInitialized,
    AlreadyInitialized,
    DatabaseError,

    // Not Found (exit 3)
    BookmarkNotFound,
    FolderNotFound,
    NodeNotFound,

    // Validation (exit 4)
    InvalidArgument,
    InvalidTree,

    // Conflict (exit 5)
    PendingConflicts,

    // Remote (exit 6)
    RemoteError,
    RemoteUnavailable,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::BookmarkNotFound => "BOOKMARK_NOT_FOUND",
            Self::FolderNotFound => "FOLDER_NOT_FOUND",
            Self::NodeNotFound => "NODE_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::InvalidTree => "INVALID_TREE",
            Self::PendingConflicts => "PENDING_CONFLICTS",
            Self::RemoteError => "REMOTE_ERROR",
            Self::RemoteUnavailable => "REMOTE_UNAVAILABLE",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized | Self::AlreadyInitialized | Self::DatabaseError => 2,
            Self::BookmarkNotFound | Self::FolderNotFound | Self::NodeNotFound => 3,
            Self::InvalidArgument | Self::InvalidTree => 4,
            Self::PendingConflicts => 5,
            Self::RemoteError | Self::RemoteUnavailable => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether retrying the same operation later may succeed.
    ///
    /// True for transient remote failures, lock contention and bad input
    /// that can be corrected. False for not-found, config or internal errors.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument
                | Self::DatabaseError
                | Self::RemoteError
                | Self::RemoteUnavailable
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in marksync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `marksync init` first")]
    NotInitialized,

    #[error("Already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("Bookmark not found: {path}")]
    BookmarkNotFound { path: String },

    #[error("Folder not found: {path}")]
    FolderNotFound { path: String },

    #[error("Node not found: {id}")]
    NodeNotFound { id: String },

    #[error("Invalid bookmark tree: {0}")]
    InvalidTree(String),

    #[error("{count} conflict(s) awaiting a decision")]
    PendingConflicts { count: usize },

    #[error("Remote write failed: HTTP {status}")]
    RemoteWrite { status: u16 },

    #[error("Error fetching bookmarks: {0}")]
    RemoteUnavailable(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::BookmarkNotFound { .. } => ErrorCode::BookmarkNotFound,
            Self::FolderNotFound { .. } => ErrorCode::FolderNotFound,
            Self::NodeNotFound { .. } => ErrorCode::NodeNotFound,
            Self::InvalidTree(_) => ErrorCode::InvalidTree,
            Self::PendingConflicts { .. } => ErrorCode::PendingConflicts,
            Self::RemoteWrite { .. } | Self::Http(_) => ErrorCode::RemoteError,
            Self::RemoteUnavailable(_) => ErrorCode::RemoteUnavailable,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => {
                Some("Run `marksync init` to create the database and bookmark tree".to_string())
            }

            Self::AlreadyInitialized { path } => Some(format!(
                "Database already exists at {}. Use `--force` to reinitialize.",
                path.display()
            )),

            Self::BookmarkNotFound { .. } | Self::FolderNotFound { .. } => Some(
                "Use `marksync bookmark list` to see the current tree. \
                 Paths are folder titles joined with '/'."
                    .to_string(),
            ),

            Self::PendingConflicts { .. } => Some(
                "Review with `marksync pending show`, then rerun \
                 `marksync sync --prefer local|remote` or `marksync sync --yes`"
                    .to_string(),
            ),

            Self::Config(_) => Some(
                "Set the missing value with `marksync config set <key> <value>` \
                 or the matching MARKSYNC_* environment variable"
                    .to_string(),
            ),

            Self::RemoteWrite { status: 401 | 403 } => {
                Some("Check the configured username and password".to_string())
            }

            Self::RemoteUnavailable(_) | Self::Http(_) => Some(
                "Nothing was changed locally. The next sync will retry from the same baseline."
                    .to_string(),
            ),

            Self::InvalidArgument(msg) if msg.contains("choice") => {
                Some("Valid choices: local, remote".to_string())
            }

            Self::Database(_)
            | Self::NodeNotFound { .. }
            | Self::InvalidTree(_)
            | Self::RemoteWrite { .. }
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidArgument(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
