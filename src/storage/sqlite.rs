//! SQLite storage implementation.
//!
//! Holds everything that must survive between sync cycles: the baseline
//! (last agreed state), the local tombstone set, a pending plan awaiting
//! confirmation, the last status message and the sync history. Every write
//! goes through [`SqliteStorage::mutate`] so it is atomic and audited.

use crate::error::{Error, Result};
use crate::model::BookmarkRecord;
use crate::storage::events::{insert_event, recent_events, Event, EventType};
use crate::storage::schema::apply_schema;
use crate::sync::PendingSync;
use rusqlite::{Connection, OptionalExtension, Transaction};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

const KEY_BASELINE: &str = "baseline";
const KEY_STATUS: &str = "status";
const KEY_PENDING: &str = "pending";
const KEY_LOCAL_SNAPSHOT: &str = "local_snapshot";

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Context for a mutation operation, collecting audit events.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Actor performing the operation (`sync`, `cli`, `watch`).
    pub actor: String,
    /// Events to write at the end of the transaction.
    pub events: Vec<Event>,
}

impl MutationContext {
    /// Create a new mutation context.
    #[must_use]
    pub fn new(op_name: &str, actor: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            actor: actor.to_string(),
            events: Vec::new(),
        }
    }

    /// Record an event for this operation.
    pub fn record_event(&mut self, entity_type: &str, entity_id: &str, event_type: EventType) {
        self.events
            .push(Event::new(entity_type, entity_id, event_type, &self.actor));
    }

    /// Record an event with a comment.
    pub fn record_comment(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        event_type: EventType,
        comment: &str,
    ) {
        self.events.push(
            Event::new(entity_type, entity_id, event_type, &self.actor).with_comment(comment),
        );
    }
}

/// Human-readable result of the last sync attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub message: String,
    pub ok: bool,
    /// Unix milliseconds.
    pub at: i64,
}

impl StatusMessage {
    /// Status stamped now.
    #[must_use]
    pub fn now(message: impl Into<String>, ok: bool) -> Self {
        Self {
            message: message.into(),
            ok,
            at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// One row of sync history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: i64,
    pub started_at: i64,
    pub finished_at: i64,
    /// `synced`, `up_to_date`, `conflicts`, `cancelled`, `failed`.
    pub outcome: String,
    pub local_changes: usize,
    pub remote_changes: usize,
    pub conflicts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Everything a finished cycle writes, committed in one transaction.
#[derive(Debug)]
pub struct SyncCommit<'a> {
    /// New baseline, or `None` to keep the stored one.
    pub baseline: Option<&'a [BookmarkRecord]>,
    /// Full replacement for the local tombstone set, or `None` to keep it.
    pub tombstones: Option<&'a [BookmarkRecord]>,
    /// Local tree records as last seen, or `None` to keep the stored ones.
    pub local_snapshot: Option<&'a [BookmarkRecord]>,
    /// `Some(None)` clears the pending plan, `Some(Some(_))` replaces it.
    pub pending: Option<Option<&'a PendingSync>>,
    pub status: &'a StatusMessage,
    pub run: &'a SyncRun,
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_millis(timeout_ms.unwrap_or(5000)))?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a mutation inside an IMMEDIATE transaction.
    ///
    /// Audit events collected in the context are written before commit.
    /// The transaction is rolled back if the closure fails.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails.
    pub fn mutate<F, R>(&mut self, op: &str, actor: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op, actor);
        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;
        Ok(result)
    }

    // ==================
    // Key/value documents
    // ==================

    fn get_kv<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        raw.map(|json| serde_json::from_str(&json).map_err(Error::from))
            .transpose()
    }

    /// Stored baseline (empty before the first successful sync).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored JSON is corrupt.
    pub fn load_baseline(&self) -> Result<Vec<BookmarkRecord>> {
        Ok(self.get_kv(KEY_BASELINE)?.unwrap_or_default())
    }

    /// Replace the baseline.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn save_baseline(&mut self, baseline: &[BookmarkRecord], actor: &str) -> Result<()> {
        self.mutate("save_baseline", actor, |tx, ctx| {
            write_baseline(tx, ctx, baseline)
        })
    }

    /// Last status message, if any sync was attempted.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored JSON is corrupt.
    pub fn load_status(&self) -> Result<Option<StatusMessage>> {
        self.get_kv(KEY_STATUS)
    }

    /// Pending plan awaiting confirmation.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored JSON is corrupt.
    pub fn load_pending(&self) -> Result<Option<PendingSync>> {
        self.get_kv(KEY_PENDING)
    }

    /// Store or clear the pending plan.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_pending(&mut self, pending: Option<&PendingSync>, actor: &str) -> Result<()> {
        self.mutate("set_pending", actor, |tx, ctx| write_pending(tx, ctx, pending))
    }

    /// Local tree records as of the last sync or edit, if any was recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored JSON is corrupt.
    pub fn load_local_snapshot(&self) -> Result<Option<Vec<BookmarkRecord>>> {
        self.get_kv(KEY_LOCAL_SNAPSHOT)
    }

    /// Remember the tree as it is now, with tombstones for what vanished since
    /// the previous snapshot. Returns the number of tombstones written.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn observe_local(
        &mut self,
        snapshot: &[BookmarkRecord],
        vanished: &[BookmarkRecord],
        actor: &str,
    ) -> Result<usize> {
        self.mutate("observe_local", actor, |tx, ctx| {
            let written = upsert_tombstones(tx, vanished)?;
            if written > 0 {
                ctx.record_comment(
                    "tombstones",
                    "local",
                    EventType::TombstonesRecorded,
                    &format!("{written} tombstone(s)"),
                );
            }
            set_kv(tx, KEY_LOCAL_SNAPSHOT, snapshot)?;
            Ok(written)
        })
    }

    // ==================
    // Tombstones
    // ==================

    /// All local tombstones, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored record is corrupt.
    pub fn list_tombstones(&self) -> Result<Vec<BookmarkRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT record FROM tombstones ORDER BY deleted_at, identity")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(serde_json::from_str(&row?)?);
        }
        Ok(out)
    }

    /// Add tombstones, replacing any stored for the same identity.
    ///
    /// Live records are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn record_tombstones(&mut self, tombstones: &[BookmarkRecord], actor: &str) -> Result<usize> {
        self.mutate("record_tombstones", actor, |tx, ctx| {
            let written = upsert_tombstones(tx, tombstones)?;
            if written > 0 {
                ctx.record_comment(
                    "tombstones",
                    "local",
                    EventType::TombstonesRecorded,
                    &format!("{written} tombstone(s)"),
                );
            }
            Ok(written)
        })
    }

    /// Delete every local tombstone.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn clear_tombstones(&mut self, actor: &str) -> Result<usize> {
        self.mutate("clear_tombstones", actor, |tx, ctx| {
            let removed = tx.execute("DELETE FROM tombstones", [])?;
            ctx.record_comment(
                "tombstones",
                "local",
                EventType::TombstonesCleared,
                &format!("{removed} tombstone(s)"),
            );
            Ok(removed)
        })
    }

    // ==================
    // Sync commit + history
    // ==================

    /// Write everything a cycle produced in a single transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; nothing is committed then.
    pub fn commit_sync(&mut self, commit: &SyncCommit<'_>, actor: &str) -> Result<i64> {
        self.mutate("commit_sync", actor, |tx, ctx| {
            if let Some(baseline) = commit.baseline {
                write_baseline(tx, ctx, baseline)?;
            }
            if let Some(tombstones) = commit.tombstones {
                let before = stored_identities(tx)?;
                tx.execute("DELETE FROM tombstones", [])?;
                upsert_tombstones(tx, tombstones)?;
                let after = stored_identities(tx)?;
                if before != after {
                    let dropped = before.difference(&after).count();
                    let added = after.difference(&before).count();
                    ctx.record_comment(
                        "tombstones",
                        "local",
                        EventType::TombstonesPruned,
                        &format!("{dropped} dropped, {added} added"),
                    );
                }
            }
            if let Some(snapshot) = commit.local_snapshot {
                set_kv(tx, KEY_LOCAL_SNAPSHOT, snapshot)?;
            }
            if let Some(pending) = commit.pending {
                write_pending(tx, ctx, pending)?;
            }
            write_status(tx, ctx, commit.status)?;
            insert_sync_run(tx, commit.run)
        })
    }

    /// Append a history row on its own (failed or cancelled cycles).
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn record_sync_run(&mut self, run: &SyncRun, status: &StatusMessage, actor: &str) -> Result<i64> {
        self.mutate("record_sync_run", actor, |tx, ctx| {
            write_status(tx, ctx, status)?;
            insert_sync_run(tx, run)
        })
    }

    /// Most recent sync runs, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn recent_sync_runs(&self, limit: u32) -> Result<Vec<SyncRun>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, finished_at, outcome, local_changes, remote_changes, conflicts, detail
             FROM sync_runs
             ORDER BY started_at DESC, id DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit], |row| {
            Ok(SyncRun {
                id: row.get(0)?,
                started_at: row.get(1)?,
                finished_at: row.get(2)?,
                outcome: row.get(3)?,
                local_changes: row.get(4)?,
                remote_changes: row.get(5)?,
                conflicts: row.get(6)?,
                detail: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Most recent audit events, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn recent_events(&self, limit: u32) -> Result<Vec<Event>> {
        Ok(recent_events(&self.conn, limit)?)
    }
}

fn set_kv<T: Serialize + ?Sized>(tx: &Transaction, key: &str, value: &T) -> Result<()> {
    tx.execute(
        "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        rusqlite::params![
            key,
            serde_json::to_string(value)?,
            chrono::Utc::now().timestamp_millis()
        ],
    )?;
    Ok(())
}

fn write_baseline(tx: &Transaction, ctx: &mut MutationContext, baseline: &[BookmarkRecord]) -> Result<()> {
    set_kv(tx, KEY_BASELINE, baseline)?;
    ctx.record_comment(
        "kv",
        KEY_BASELINE,
        EventType::BaselineSaved,
        &format!("{} record(s)", baseline.len()),
    );
    Ok(())
}

fn write_status(tx: &Transaction, ctx: &mut MutationContext, status: &StatusMessage) -> Result<()> {
    set_kv(tx, KEY_STATUS, status)?;
    ctx.record_comment("kv", KEY_STATUS, EventType::StatusUpdated, &status.message);
    Ok(())
}

fn write_pending(
    tx: &Transaction,
    ctx: &mut MutationContext,
    pending: Option<&PendingSync>,
) -> Result<()> {
    match pending {
        Some(pending) => {
            set_kv(tx, KEY_PENDING, pending)?;
            ctx.record_event("kv", KEY_PENDING, EventType::PendingStored);
        }
        None => {
            if tx.execute("DELETE FROM kv WHERE key = ?1", [KEY_PENDING])? > 0 {
                ctx.record_event("kv", KEY_PENDING, EventType::PendingCleared);
            }
        }
    }
    Ok(())
}

fn stored_identities(tx: &Transaction) -> Result<HashSet<String>> {
    let mut stmt = tx.prepare("SELECT identity FROM tombstones")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut out = HashSet::new();
    for row in rows {
        out.insert(row?);
    }
    Ok(out)
}

fn upsert_tombstones(tx: &Transaction, tombstones: &[BookmarkRecord]) -> Result<usize> {
    let mut stmt = tx.prepare(
        "INSERT INTO tombstones (identity, record, deleted_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(identity) DO UPDATE SET record = excluded.record, deleted_at = excluded.deleted_at",
    )?;
    let mut written = 0;
    for tombstone in tombstones.iter().filter(|t| t.deleted) {
        stmt.execute(rusqlite::params![
            tombstone.key().as_str(),
            serde_json::to_string(tombstone)?,
            tombstone.deleted_at.unwrap_or_default(),
        ])?;
        written += 1;
    }
    Ok(written)
}

fn insert_sync_run(tx: &Transaction, run: &SyncRun) -> Result<i64> {
    tx.execute(
        "INSERT INTO sync_runs (started_at, finished_at, outcome, local_changes, remote_changes, conflicts, detail)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            run.started_at,
            run.finished_at,
            run.outcome,
            run.local_changes,
            run.remote_changes,
            run.conflicts,
            run.detail,
        ],
    )?;
    Ok(tx.last_insert_rowid())
}
