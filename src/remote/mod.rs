//! Remote document transport.
//!
//! The remote side of a sync is a single JSON array of records at one URL.
//! [`RemoteStore`] is the seam the sync cycle talks to; [`RemoteClient`]
//! implements it over HTTP.
//!
//! A fetch has three outcomes that must stay distinct:
//!
//! - `Found` - a document was returned and parsed
//! - `NotFound` - HTTP 404, nothing pushed yet; merges as an empty state
//! - `Unavailable` - any other failure to read the document; the cycle aborts
//!
//! Transport failures (DNS, connection refused, timeout) are not an outcome:
//! they come back as `Err` and abort the cycle.

pub mod client;

use std::future::Future;

use tracing::debug;

use crate::error::Result;
use crate::model::BookmarkRecord;

pub use client::RemoteClient;

/// Header sent with every request so the server can tell sync traffic apart.
pub const MARKER_HEADER: &str = "X-Marksync-Client";

/// Value of [`MARKER_HEADER`].
#[must_use]
pub fn marker_value() -> String {
    format!("marksync/{}", env!("CARGO_PKG_VERSION"))
}

/// Result of reading the remote document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteDocument {
    Found(Vec<BookmarkRecord>),
    NotFound,
    Unavailable { reason: String },
}

impl RemoteDocument {
    /// State to merge against, or `None` when the remote could not be read.
    #[must_use]
    pub fn into_state(self) -> Option<Vec<BookmarkRecord>> {
        match self {
            Self::Found(records) => Some(records),
            Self::NotFound => Some(Vec::new()),
            Self::Unavailable { .. } => None,
        }
    }
}

/// Where the shared document lives.
///
/// Implemented by [`RemoteClient`] and by in-memory fakes in tests.
pub trait RemoteStore: Send + Sync {
    /// Read the current document.
    fn fetch(&self) -> impl Future<Output = Result<RemoteDocument>> + Send;

    /// Replace the document with `records`.
    ///
    /// Any non-success response is an error; nothing may be committed
    /// locally after a failed push.
    fn push(&self, records: &[BookmarkRecord]) -> impl Future<Output = Result<()>> + Send;
}

/// Interpret a fetch response.
#[must_use]
pub fn parse_document(status: u16, body: &str) -> RemoteDocument {
    if status == 404 {
        return RemoteDocument::NotFound;
    }
    if !(200..300).contains(&status) {
        return RemoteDocument::Unavailable {
            reason: format!("HTTP {status}"),
        };
    }

    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            return RemoteDocument::Unavailable {
                reason: format!("malformed JSON: {e}"),
            };
        }
    };
    if !value.is_array() {
        return RemoteDocument::Unavailable {
            reason: "document is not an array".to_string(),
        };
    }

    match serde_json::from_value::<Vec<BookmarkRecord>>(value) {
        Ok(records) => {
            debug!(count = records.len(), "Parsed remote document");
            RemoteDocument::Found(records)
        }
        Err(e) => RemoteDocument::Unavailable {
            reason: format!("invalid record: {e}"),
        },
    }
}
