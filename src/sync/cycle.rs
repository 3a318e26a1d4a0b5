//! One complete sync cycle against a remote document.
//!
//! ```text
//! snapshot local ─┐
//!                 ├─ plan ─ confirm ─ push ─ apply ─ commit
//! fetch remote ───┘
//! ```
//!
//! The order matters. The remote is written before the local tree is
//! touched, and nothing is committed to storage until both succeeded, so a
//! failed push leaves the baseline where it was and the next cycle retries
//! from the same point.
//!
//! The one early write is local: records that left the tree since the stored
//! snapshot (edited outside marksync) are tombstoned before planning, so the
//! merge sees a deletion rather than a record it never had.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::BookmarkRecord;
use crate::remote::{RemoteDocument, RemoteStore};
use crate::storage::{SqliteStorage, StatusMessage, SyncCommit, SyncRun, TreeStore};
use crate::sync::apply::{apply_changes, ApplyReport};
use crate::sync::hash::state_fingerprint;
use crate::sync::plan::calc_sync_changes_with;
use crate::sync::tombstones::{
    local_state, merge_tombstones, next_local_tombstones, vanished_tombstones,
};
use crate::sync::types::{ConflictChoice, PendingSync, SyncOptions, SyncPlan};

/// What the confirmation step decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Apply the plan as computed; conflicts stay pending.
    Accept,
    /// Commit nothing and keep the plan as the pending payload.
    Cancel,
    /// Apply per-conflict choices, then proceed.
    Resolve(Vec<ConflictChoice>),
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Plan computed, nothing written.
    DryRun,
    /// Both sides already agreed.
    UpToDate,
    Synced,
    /// Synced what could be synced; some conflicts await a decision.
    Conflicts,
    Cancelled,
}

impl CycleOutcome {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DryRun => "dry_run",
            Self::UpToDate => "up_to_date",
            Self::Synced => "synced",
            Self::Conflicts => "conflicts",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Result of a cycle, suitable for printing.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub plan: SyncPlan,
    /// Whether the remote document was written.
    pub pushed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied: Option<ApplyReport>,
    pub status: String,
}

/// One sync cycle over borrowed collaborators.
pub struct SyncCycle<'a, R, T: ?Sized> {
    remote: &'a R,
    tree: &'a mut T,
    storage: &'a mut SqliteStorage,
    options: SyncOptions,
    dry_run: bool,
    actor: String,
}

impl<'a, R, T> SyncCycle<'a, R, T>
where
    R: RemoteStore,
    T: TreeStore + ?Sized,
{
    pub fn new(remote: &'a R, tree: &'a mut T, storage: &'a mut SqliteStorage, actor: impl Into<String>) -> Self {
        Self {
            remote,
            tree,
            storage,
            options: SyncOptions::default(),
            dry_run: false,
            actor: actor.into(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Stop after planning.
    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run the cycle. `confirm` is consulted only when there is something to do.
    ///
    /// # Errors
    ///
    /// - `Error::RemoteUnavailable` when the document could not be read
    ///   (recorded as a failed run with a status message)
    /// - `Error::Http` on transport failure during fetch or push (a failed
    ///   fetch is also recorded as a failed run)
    /// - `Error::RemoteWrite` when the remote rejected the push
    /// - storage or tree errors
    pub async fn run<F>(mut self, mut confirm: F) -> Result<CycleReport>
    where
        F: FnMut(&SyncPlan) -> Result<Decision>,
    {
        let started_at = chrono::Utc::now().timestamp_millis();

        let snapshot = self.tree.records()?;
        let mut stored_tombstones = self.storage.list_tombstones()?;
        let vanished = match self.storage.load_local_snapshot()? {
            Some(previous) => vanished_tombstones(&previous, &snapshot),
            None => Vec::new(),
        };
        if !vanished.is_empty() {
            debug!(count = vanished.len(), "Records left the tree since the last snapshot");
            if !self.dry_run {
                self.storage.observe_local(&snapshot, &vanished, &self.actor)?;
            }
            stored_tombstones = merge_tombstones(&stored_tombstones, &vanished);
        }
        let local = local_state(&snapshot, &stored_tombstones);

        let remote = match self.remote.fetch().await {
            Ok(RemoteDocument::Found(records)) => records,
            Ok(RemoteDocument::NotFound) => Vec::new(),
            Ok(RemoteDocument::Unavailable { reason }) => {
                return Err(self.fail_fetch(started_at, Error::RemoteUnavailable(reason)));
            }
            Err(e) => return Err(self.fail_fetch(started_at, e)),
        };

        let baseline = self.storage.load_baseline()?;
        let mut plan = calc_sync_changes_with(&baseline, &local, &remote, &self.options);
        for warning in &plan.warnings {
            warn!(%warning, "Merge fallback");
        }

        if self.dry_run {
            let status = summarize(&plan, false);
            return Ok(CycleReport {
                outcome: CycleOutcome::DryRun,
                plan,
                pushed: false,
                applied: None,
                status,
            });
        }

        let document_differs = state_fingerprint(&plan.remote_document()) != state_fingerprint(&remote);
        let has_work = !plan.is_converged() || document_differs;

        if has_work {
            match confirm(&plan)? {
                Decision::Accept => {}
                Decision::Cancel => return self.cancel(plan, &snapshot, started_at),
                Decision::Resolve(choices) => {
                    plan = plan.resolve(&local, &remote, &choices)?;
                }
            }
        }

        let document = plan.remote_document();
        let needs_push = !plan.remote_changes.is_empty() || state_fingerprint(&document) != state_fingerprint(&remote);

        if needs_push {
            if let Err(e) = self.remote.push(&document).await {
                self.record_failure(started_at, &plan, &format!("Error saving bookmarks: {e}"))?;
                return Err(e);
            }
        }

        let applied = if plan.local_changes.is_empty() {
            None
        } else {
            Some(apply_changes(&mut *self.tree, &plan.local_changes)?)
        };

        self.commit(plan, needs_push, applied, &stored_tombstones, started_at)
    }

    /// Record a fetch failure as a failed run and hand the error back.
    fn fail_fetch(self, started_at: i64, err: Error) -> Error {
        warn!(error = %err, "Remote unavailable, sync aborted");
        if !self.dry_run {
            let message = match &err {
                Error::RemoteUnavailable(_) => err.to_string(),
                other => format!("Error fetching bookmarks: {other}"),
            };
            let run = failed_row(started_at, &SyncPlan::default(), message.clone());
            let status = StatusMessage::now(message, false);
            if let Err(store_err) = self.storage.record_sync_run(&run, &status, &self.actor) {
                warn!(error = %store_err, "Could not record failed sync run");
            }
        }
        err
    }

    fn cancel(self, plan: SyncPlan, snapshot: &[BookmarkRecord], started_at: i64) -> Result<CycleReport> {
        let pending = PendingSync {
            created_at: chrono::Utc::now().timestamp_millis(),
            plan,
        };
        let status = StatusMessage::now("Sync cancelled; changes kept pending", true);
        let run = history_row(started_at, CycleOutcome::Cancelled, &pending.plan, None);
        self.storage.commit_sync(
            &SyncCommit {
                baseline: None,
                tombstones: None,
                local_snapshot: Some(snapshot),
                pending: Some(Some(&pending)),
                status: &status,
                run: &run,
            },
            &self.actor,
        )?;
        info!("Sync cancelled, plan stored as pending");

        Ok(CycleReport {
            outcome: CycleOutcome::Cancelled,
            plan: pending.plan,
            pushed: false,
            applied: None,
            status: status.message,
        })
    }

    fn record_failure(&mut self, started_at: i64, plan: &SyncPlan, message: &str) -> Result<()> {
        warn!(%message, "Sync failed");
        let run = failed_row(started_at, plan, message.to_string());
        self.storage
            .record_sync_run(&run, &StatusMessage::now(message, false), &self.actor)?;
        Ok(())
    }

    fn commit(
        self,
        plan: SyncPlan,
        pushed: bool,
        applied: Option<ApplyReport>,
        stored_tombstones: &[BookmarkRecord],
        started_at: i64,
    ) -> Result<CycleReport> {
        let outcome = if !plan.conflicts.is_empty() {
            CycleOutcome::Conflicts
        } else if !pushed && plan.local_changes.is_empty() {
            CycleOutcome::UpToDate
        } else {
            CycleOutcome::Synced
        };

        let baseline = plan.next_baseline();
        let tombstones = next_local_tombstones(stored_tombstones, &plan.new_state);
        let snapshot = self.tree.records()?;
        let pending = (!plan.conflicts.is_empty()).then(|| PendingSync {
            created_at: chrono::Utc::now().timestamp_millis(),
            plan: plan.clone(),
        });

        let failed = applied.as_ref().map_or(0, |r| r.failed.len());
        let mut message = summarize(&plan, pushed);
        if failed > 0 {
            message.push_str(&format!("; {failed} local change(s) could not be applied"));
        }
        let status = StatusMessage::now(message, true);
        let run = history_row(
            started_at,
            outcome,
            &plan,
            (failed > 0).then(|| format!("{failed} apply failure(s)")),
        );

        self.storage.commit_sync(
            &SyncCommit {
                baseline: Some(&baseline),
                tombstones: Some(&tombstones),
                local_snapshot: Some(&snapshot),
                pending: Some(pending.as_ref()),
                status: &status,
                run: &run,
            },
            &self.actor,
        )?;

        info!(
            outcome = outcome.as_str(),
            local_changes = plan.local_changes.len(),
            remote_changes = plan.remote_changes.len(),
            conflicts = plan.conflicts.len(),
            pushed,
            "Sync cycle finished"
        );

        Ok(CycleReport {
            outcome,
            plan,
            pushed,
            applied,
            status: status.message,
        })
    }
}

fn history_row(started_at: i64, outcome: CycleOutcome, plan: &SyncPlan, detail: Option<String>) -> SyncRun {
    SyncRun {
        id: 0,
        started_at,
        finished_at: chrono::Utc::now().timestamp_millis(),
        outcome: outcome.as_str().to_string(),
        local_changes: plan.local_changes.len(),
        remote_changes: plan.remote_changes.len(),
        conflicts: plan.conflicts.len(),
        detail,
    }
}

fn failed_row(started_at: i64, plan: &SyncPlan, detail: String) -> SyncRun {
    SyncRun {
        outcome: "failed".to_string(),
        ..history_row(started_at, CycleOutcome::Synced, plan, Some(detail))
    }
}

/// One-line status for a plan.
fn summarize(plan: &SyncPlan, pushed: bool) -> String {
    if plan.is_converged() && !pushed {
        return "Up to date".to_string();
    }
    let mut message = format!(
        "{} local change(s), {} remote change(s)",
        plan.local_changes.len(),
        plan.remote_changes.len()
    );
    if !plan.conflicts.is_empty() {
        message.push_str(&format!(", {} conflict(s) awaiting a decision", plan.conflicts.len()));
    }
    message
}
