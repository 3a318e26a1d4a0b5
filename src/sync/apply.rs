//! Apply a change-set to a local tree.
//!
//! Deletions run first (content before folders), then insertions (parents
//! before children, ascending index), then index moves. A single item that
//! cannot be applied is logged and skipped; the next cycle sees the same
//! discrepancy and retries it.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::BookmarkRecord;
use crate::storage::TreeStore;
use crate::sync::types::Changes;

/// Kind of tree mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Delete,
    Insert,
    Move,
}

/// One item that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyFailure {
    pub operation: Operation,
    pub record: String,
    pub reason: String,
}

/// Outcome of applying a change-set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub deleted: usize,
    pub inserted: usize,
    pub moved: usize,
    /// Items already in the wanted shape.
    pub skipped: usize,
    pub failed: Vec<ApplyFailure>,
}

impl ApplyReport {
    /// Number of mutations actually performed.
    #[must_use]
    pub fn applied(&self) -> usize {
        self.deleted + self.inserted + self.moved
    }

    fn fail(&mut self, operation: Operation, record: &BookmarkRecord, err: &Error) {
        warn!(
            op = ?operation,
            record = %record.display_path(),
            error = %err,
            "Skipping change that could not be applied"
        );
        self.failed.push(ApplyFailure {
            operation,
            record: record.display_path(),
            reason: err.to_string(),
        });
    }
}

/// Apply `changes` to `tree`, then flush it.
///
/// # Errors
///
/// Per-item failures are collected in the report. Only a failure to
/// flush the tree is returned as an error.
pub fn apply_changes<T: TreeStore + ?Sized>(tree: &mut T, changes: &Changes) -> Result<ApplyReport> {
    let mut report = ApplyReport::default();

    for record in &changes.deletions {
        match delete_one(tree, record) {
            Ok(true) => report.deleted += 1,
            Ok(false) => report.skipped += 1,
            Err(e) => report.fail(Operation::Delete, record, &e),
        }
    }

    for record in &changes.insertions {
        match insert_one(tree, record) {
            Ok(true) => report.inserted += 1,
            Ok(false) => report.skipped += 1,
            Err(e) => report.fail(Operation::Insert, record, &e),
        }
    }

    for update in &changes.updates {
        match move_one(tree, &update.new) {
            Ok(()) => report.moved += 1,
            Err(e) => report.fail(Operation::Move, &update.new, &e),
        }
    }

    tree.flush()?;
    debug!(
        deleted = report.deleted,
        inserted = report.inserted,
        moved = report.moved,
        skipped = report.skipped,
        failed = report.failed.len(),
        "Applied local changes"
    );
    Ok(report)
}

/// Returns false when the node was already gone.
fn delete_one<T: TreeStore + ?Sized>(tree: &mut T, record: &BookmarkRecord) -> Result<bool> {
    let Some(id) = tree.find(&record.path, &record.title, record.url.as_deref())? else {
        return Ok(false);
    };
    tree.remove(&id)?;
    Ok(true)
}

/// Returns false when an identical node already exists.
fn insert_one<T: TreeStore + ?Sized>(tree: &mut T, record: &BookmarkRecord) -> Result<bool> {
    if tree
        .find(&record.path, &record.title, record.url.as_deref())?
        .is_some()
    {
        return Ok(false);
    }
    let parent = tree
        .find_folder(&record.path)?
        .ok_or_else(|| Error::FolderNotFound {
            path: record.path.join("/"),
        })?;
    let index = usize::try_from(record.index).unwrap_or(usize::MAX);
    tree.create(&parent, &record.title, record.url.as_deref(), Some(index))?;
    Ok(true)
}

fn move_one<T: TreeStore + ?Sized>(tree: &mut T, target: &BookmarkRecord) -> Result<()> {
    let id = tree
        .find(&target.path, &target.title, target.url.as_deref())?
        .ok_or_else(|| Error::BookmarkNotFound {
            path: target.display_path(),
        })?;
    let index = usize::try_from(target.index).unwrap_or(usize::MAX);
    tree.move_node(&id, None, Some(index))?;
    Ok(())
}
