//! Sync orchestrator: merge, guard, then diff the target against each side.
//!
//! Everything here is a pure function of its input states.

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{dedupe, BookmarkRecord};
use crate::sync::diff::diff_states;
use crate::sync::guard::protect_folders_with_content;
use crate::sync::merge::{merge_states, StateBuilder};
use crate::sync::types::{
    Changes, Choice, Conflict, ConflictChoice, SyncInputs, SyncOptions, SyncPlan,
};

/// Compute both change-sets with the default (index-tolerant) matching.
#[must_use]
pub fn calc_sync_changes(
    old_remote_state: &[BookmarkRecord],
    current_local_state: &[BookmarkRecord],
    current_remote_state: &[BookmarkRecord],
) -> SyncPlan {
    calc_sync_changes_with(
        old_remote_state,
        current_local_state,
        current_remote_state,
        &SyncOptions::default(),
    )
}

/// Compute both change-sets with explicit options.
#[must_use]
pub fn calc_sync_changes_with(
    old_remote_state: &[BookmarkRecord],
    current_local_state: &[BookmarkRecord],
    current_remote_state: &[BookmarkRecord],
    options: &SyncOptions,
) -> SyncPlan {
    let baseline = dedupe(old_remote_state);
    let local = dedupe(current_local_state);
    let remote = dedupe(current_remote_state);

    let outcome = merge_states(&baseline, &local, &remote, options.mode);
    let mut new_state = outcome.new_state;
    let revived = protect_folders_with_content(&mut new_state);

    let plan = finish_plan(&local, &remote, new_state, outcome.conflicts, outcome.warnings);
    debug!(
        mode = ?options.mode,
        local_changes = plan.local_changes.len(),
        remote_changes = plan.remote_changes.len(),
        conflicts = plan.conflicts.len(),
        revived,
        "Sync plan computed"
    );
    plan
}

/// Diff `new_state` against both sides and hide conflicted items.
fn finish_plan(
    local: &[BookmarkRecord],
    remote: &[BookmarkRecord],
    new_state: Vec<BookmarkRecord>,
    conflicts: Vec<Conflict>,
    warnings: Vec<String>,
) -> SyncPlan {
    let mut local_changes = diff_states(local, &new_state);
    let mut remote_changes = diff_states(remote, &new_state);
    filter_conflicted(&mut local_changes, &conflicts);
    filter_conflicted(&mut remote_changes, &conflicts);

    SyncPlan {
        local_changes,
        remote_changes,
        conflicts,
        new_state,
        warnings,
    }
}

fn filter_conflicted(changes: &mut Changes, conflicts: &[Conflict]) {
    if conflicts.is_empty() {
        return;
    }
    changes.retain_unless(|record| conflicts.iter().any(|c| c.matches(record)));
}

impl SyncInputs {
    /// Run the orchestrator over these inputs, reading absent states as empty.
    #[must_use]
    pub fn plan(&self, options: &SyncOptions) -> SyncPlan {
        calc_sync_changes_with(
            self.old_remote_state.as_deref().unwrap_or_default(),
            self.current_local_state.as_deref().unwrap_or_default(),
            self.current_remote_state.as_deref().unwrap_or_default(),
            options,
        )
    }
}

impl SyncPlan {
    /// Apply per-conflict decisions and recompute both change-sets.
    ///
    /// `current_local` and `current_remote` must be the snapshots this plan
    /// was computed from. Conflicts without a decision stay in the plan and
    /// stay filtered out of the change-sets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if a choice names a conflict index
    /// that does not exist or a side with no version to take.
    pub fn resolve(
        &self,
        current_local: &[BookmarkRecord],
        current_remote: &[BookmarkRecord],
        choices: &[ConflictChoice],
    ) -> Result<Self> {
        if let Some(bad) = choices.iter().find(|c| c.conflict >= self.conflicts.len()) {
            return Err(Error::InvalidArgument(format!(
                "conflict #{} does not exist ({} conflict(s) in plan)",
                bad.conflict + 1,
                self.conflicts.len()
            )));
        }

        let mut builder = StateBuilder::from_records(&self.new_state);
        let mut unresolved = Vec::new();

        for (i, conflict) in self.conflicts.iter().enumerate() {
            let Some(choice) = choices.iter().rev().find(|c| c.conflict == i) else {
                unresolved.push(conflict.clone());
                continue;
            };
            let chosen = conflict.chosen(choice.choice).ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "conflict #{} has no {:?} version to choose",
                    i + 1,
                    choice.choice
                ))
            })?;
            debug!(conflict = %conflict.label(), choice = ?choice.choice, "Conflict resolved");
            builder.force(chosen.clone());
        }

        let mut new_state = builder.into_records();
        protect_folders_with_content(&mut new_state);

        Ok(finish_plan(
            &dedupe(current_local),
            &dedupe(current_remote),
            new_state,
            unresolved,
            self.warnings.clone(),
        ))
    }

    /// The same side for every conflict.
    #[must_use]
    pub fn choose_all(&self, choice: Choice) -> Vec<ConflictChoice> {
        (0..self.conflicts.len())
            .map(|conflict| ConflictChoice { conflict, choice })
            .collect()
    }

    /// Choose the same side for every conflict.
    ///
    /// # Errors
    ///
    /// See [`SyncPlan::resolve`].
    pub fn resolve_all(
        &self,
        current_local: &[BookmarkRecord],
        current_remote: &[BookmarkRecord],
        choice: Choice,
    ) -> Result<Self> {
        self.resolve(current_local, current_remote, &self.choose_all(choice))
    }

    /// Baseline to store after this plan is applied.
    ///
    /// Unresolved conflicts keep their baseline record so they are detected
    /// again on the next cycle instead of being decided by omission.
    #[must_use]
    pub fn next_baseline(&self) -> Vec<BookmarkRecord> {
        self.with_conflict_versions(|c| c.bookmark.as_ref())
    }

    /// Document to write to the remote after this plan is applied.
    ///
    /// Unresolved conflicts keep the remote's version in the document.
    #[must_use]
    pub fn remote_document(&self) -> Vec<BookmarkRecord> {
        self.with_conflict_versions(|c| c.remote_version.as_ref())
    }

    fn with_conflict_versions(
        &self,
        pick: impl Fn(&Conflict) -> Option<&BookmarkRecord>,
    ) -> Vec<BookmarkRecord> {
        let mut builder = StateBuilder::from_records(&self.new_state);
        for record in self.conflicts.iter().filter_map(&pick) {
            builder.place(record.clone());
        }
        builder.into_records()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::types::ConflictType;

    fn bm(title: &str, index: u32) -> BookmarkRecord {
        BookmarkRecord::bookmark(title, format!("https://{title}.example"), &["Bar"], index)
    }

    #[test]
    fn test_at_rest_is_converged() {
        let state = vec![BookmarkRecord::folder("Bar", &[], 0), bm("A", 0), bm("B", 1)];
        let plan = calc_sync_changes(&state, &state, &state);
        assert!(plan.is_converged());
        assert_eq!(plan.new_state, state);
    }

    #[test]
    fn test_inputs_with_missing_states() {
        let inputs = SyncInputs {
            old_remote_state: None,
            current_local_state: None,
            current_remote_state: Some(vec![bm("X", 0)]),
        };
        let plan = inputs.plan(&SyncOptions::default());
        assert_eq!(plan.local_changes.insertions, vec![bm("X", 0)]);
        assert!(plan.remote_changes.is_empty());
    }

    #[test]
    fn test_duplicate_inputs_are_deduplicated() {
        let state = vec![bm("A", 0), bm("A", 0)];
        let plan = calc_sync_changes(&state, &state, &state);
        assert!(plan.is_converged());
        assert_eq!(plan.new_state.len(), 1);
    }

    fn edit_conflict_inputs() -> (Vec<BookmarkRecord>, Vec<BookmarkRecord>, Vec<BookmarkRecord>) {
        let base = vec![bm("A", 0), bm("B", 1)];
        let mut local = bm("A", 0);
        local.url = Some("https://local.example".into());
        let mut remote = bm("A", 0);
        remote.url = Some("https://remote.example".into());
        (base, vec![local, bm("B", 1)], vec![remote, bm("B", 1)])
    }

    #[test]
    fn test_conflicts_are_filtered_from_change_sets() {
        let (base, local, remote) = edit_conflict_inputs();
        let plan = calc_sync_changes_with(&base, &local, &remote, &SyncOptions::strict());
        assert_eq!(plan.conflicts.len(), 1);
        assert_eq!(plan.conflicts[0].conflict_type, ConflictType::EditConflict);
        assert!(plan.local_changes.is_empty());
        assert!(plan.remote_changes.is_empty());
        assert_eq!(plan.new_state, vec![bm("B", 1)]);
    }

    #[test]
    fn test_unresolved_conflict_survives_in_baseline_and_document() {
        let (base, local, remote) = edit_conflict_inputs();
        let plan = calc_sync_changes_with(&base, &local, &remote, &SyncOptions::strict());

        let baseline = plan.next_baseline();
        assert!(baseline.contains(&bm("A", 0)));
        let document = plan.remote_document();
        assert!(document.contains(&remote[0]));

        // Next cycle sees the same conflict again.
        let again = calc_sync_changes_with(&baseline, &local, &document, &SyncOptions::strict());
        assert_eq!(again.conflicts.len(), 1);
    }

    #[test]
    fn test_resolve_local_pushes_local_version() {
        let (base, local, remote) = edit_conflict_inputs();
        let plan = calc_sync_changes_with(&base, &local, &remote, &SyncOptions::strict());
        let resolved = plan
            .resolve(
                &local,
                &remote,
                &[ConflictChoice {
                    conflict: 0,
                    choice: Choice::Local,
                }],
            )
            .unwrap();

        assert!(resolved.conflicts.is_empty());
        assert!(resolved.local_changes.is_empty());
        assert_eq!(resolved.remote_changes.insertions, vec![local[0].clone()]);
        assert_eq!(resolved.remote_changes.deletions, vec![remote[0].clone()]);
        assert_eq!(resolved.next_baseline(), resolved.new_state);
    }

    #[test]
    fn test_resolve_delete_side_tombstones() {
        let base = vec![bm("X", 0)];
        let mut edited = bm("X", 0);
        edited.title = "X-edited".into();
        let local = vec![edited.clone()];
        let remote = vec![bm("X", 0).make_tombstone_at(5)];

        let plan = calc_sync_changes_with(&base, &local, &remote, &SyncOptions::strict());
        let resolved = plan.resolve_all(&local, &remote, Choice::Remote).unwrap();
        assert!(resolved.conflicts.is_empty());
        assert_eq!(resolved.local_changes.deletions, vec![edited]);
        assert!(resolved.new_state.iter().all(|r| r.deleted));
    }

    #[test]
    fn test_resolve_rejects_unknown_conflict() {
        let plan = calc_sync_changes(&[], &[], &[]);
        let err = plan
            .resolve(
                &[],
                &[],
                &[ConflictChoice {
                    conflict: 0,
                    choice: Choice::Local,
                }],
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
