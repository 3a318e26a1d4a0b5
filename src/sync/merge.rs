//! Three-way merge of baseline, local and remote states.
//!
//! Each live baseline record is resolved from the pair of per-side
//! categorizations; then each side's additions are placed; finally the
//! tombstones of both sides are carried forward so deletions persist.
//!
//! Every identity appears at most once in the result (first writer wins,
//! except that a live re-creation replaces a tombstone).

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::model::{
    active, differing_attribute, differing_attributes, exact_equal, tombstones, Attribute,
    BookmarkRecord, IdentityKey,
};
use crate::sync::categorize::{categorize_changes, SideChange};
use crate::sync::types::{Conflict, ConflictType, MatchMode, MergeOutcome};

/// How one baseline record ends up in the new state.
#[derive(Debug)]
enum Resolution {
    Keep(BookmarkRecord),
    Tombstone(BookmarkRecord),
    Conflict(Conflict),
    Absent,
    /// No rule applied: keep the baseline record and report it.
    Fallback(String),
}

/// Builder for the new state that enforces one record per identity.
#[derive(Debug, Default)]
pub(crate) struct StateBuilder {
    records: Vec<BookmarkRecord>,
    positions: HashMap<IdentityKey, usize>,
    reserved: HashSet<IdentityKey>,
}

impl StateBuilder {
    pub(crate) fn from_records(records: &[BookmarkRecord]) -> Self {
        let mut builder = Self::default();
        for record in records {
            builder.place(record.clone());
        }
        builder
    }

    /// Place a record. Returns false when it was dropped as a duplicate.
    pub(crate) fn place(&mut self, record: BookmarkRecord) -> bool {
        let key = record.key();
        if self.reserved.contains(&key) {
            debug!(record = %record.display_path(), "Skipping record reserved by a conflict");
            return false;
        }
        match self.positions.get(&key) {
            None => {
                self.positions.insert(key, self.records.len());
                self.records.push(record);
                true
            }
            Some(&pos) if self.records[pos].deleted && !record.deleted => {
                debug!(record = %record.display_path(), "Re-creation replaces tombstone");
                self.records[pos] = record;
                true
            }
            Some(_) => {
                debug!(record = %record.display_path(), "Skipping duplicate identity");
                false
            }
        }
    }

    /// Replace whatever holds this identity, ignoring reservations.
    pub(crate) fn force(&mut self, record: BookmarkRecord) {
        let key = record.key();
        self.reserved.remove(&key);
        if let Some(&pos) = self.positions.get(&key) {
            self.records[pos] = record;
        } else {
            self.positions.insert(key, self.records.len());
            self.records.push(record);
        }
    }

    fn reserve(&mut self, conflict: &Conflict) {
        for version in conflict.versions() {
            self.reserved.insert(version.key());
        }
    }

    fn contains(&self, key: &IdentityKey) -> bool {
        self.positions.contains_key(key) || self.reserved.contains(key)
    }

    pub(crate) fn into_records(self) -> Vec<BookmarkRecord> {
        self.records
    }
}

/// Merge `baseline`, `local` and `remote` into one target state.
///
/// Inputs may mix live records and tombstones.
#[must_use]
pub fn merge_states(
    baseline: &[BookmarkRecord],
    local: &[BookmarkRecord],
    remote: &[BookmarkRecord],
    mode: MatchMode,
) -> MergeOutcome {
    let baseline_active: Vec<BookmarkRecord> = active(baseline).cloned().collect();
    let local_active: Vec<BookmarkRecord> = active(local).cloned().collect();
    let local_tombstones: Vec<BookmarkRecord> = tombstones(local).cloned().collect();
    let remote_active: Vec<BookmarkRecord> = active(remote).cloned().collect();
    let remote_tombstones: Vec<BookmarkRecord> = tombstones(remote).cloned().collect();

    let local_cat = categorize_changes(&baseline_active, &local_active, &local_tombstones, mode);
    let remote_cat =
        categorize_changes(&baseline_active, &remote_active, &remote_tombstones, mode);

    let mut builder = StateBuilder::default();
    let mut conflicts = Vec::new();
    let mut warnings = Vec::new();

    for ((old, local_change), remote_change) in baseline_active
        .iter()
        .zip(&local_cat.changes)
        .zip(&remote_cat.changes)
    {
        match resolve(old, local_change, remote_change) {
            Resolution::Keep(record) | Resolution::Tombstone(record) => {
                builder.place(record);
            }
            Resolution::Conflict(conflict) => {
                debug!(
                    record = %old.display_path(),
                    kind = conflict.conflict_type.as_str(),
                    "Conflict detected"
                );
                builder.reserve(&conflict);
                conflicts.push(conflict);
            }
            Resolution::Absent => {
                debug!(record = %old.display_path(), "Lost on both sides without tombstone");
            }
            Resolution::Fallback(reason) => {
                warn!(record = %old.display_path(), %reason, "Merge fallback: keeping baseline record");
                warnings.push(format!("{}: {reason}", old.display_path()));
                builder.place(old.clone());
            }
        }
    }

    let (local_added, remote_added) = if mode == MatchMode::Strict {
        split_add_conflicts(&local_cat.added, &remote_cat.added, &mut builder, &mut conflicts)
    } else {
        (local_cat.added, remote_cat.added)
    };

    for record in local_added.into_iter().chain(remote_added) {
        builder.place(record);
    }

    for tombstone in local_tombstones.into_iter().chain(remote_tombstones) {
        if !builder.contains(&tombstone.key()) {
            builder.place(tombstone);
        }
    }

    MergeOutcome {
        new_state: builder.into_records(),
        conflicts,
        warnings,
    }
}

/// Resolve one baseline record from both sides' outcomes.
fn resolve(old: &BookmarkRecord, local: &SideChange, remote: &SideChange) -> Resolution {
    use SideChange::{Deleted, Missing, Modified, Unchanged};

    match (local, remote) {
        (Unchanged(l), Unchanged(r)) => Resolution::Keep(reconcile_index(old, l, r)),

        (Unchanged(_) | Missing, Deleted(t)) | (Deleted(t), Unchanged(_) | Missing | Deleted(_)) => {
            Resolution::Tombstone(t.clone())
        }

        (Unchanged(_) | Missing, Modified(r)) | (Missing, Unchanged(r)) => {
            Resolution::Keep(r.clone())
        }
        (Modified(l), Unchanged(_) | Missing) | (Unchanged(l), Missing) => {
            Resolution::Keep(l.clone())
        }

        (Modified(l), Modified(r)) => merge_modified(old, l, r),

        (Deleted(t), Modified(edit)) => delete_vs_edit(old, t, edit, true),
        (Modified(edit), Deleted(t)) => delete_vs_edit(old, t, edit, false),

        (Missing, Missing) => Resolution::Absent,
    }
}

/// Index rule for records both sides kept: local wins if it moved the record
/// since the baseline, else remote.
fn reconcile_index(old: &BookmarkRecord, local: &BookmarkRecord, remote: &BookmarkRecord) -> BookmarkRecord {
    if local.index == old.index {
        remote.clone()
    } else {
        local.clone()
    }
}

fn merge_modified(old: &BookmarkRecord, local: &BookmarkRecord, remote: &BookmarkRecord) -> Resolution {
    if exact_equal(local, remote) {
        return Resolution::Keep(local.clone());
    }

    match (differing_attribute(old, local), differing_attribute(old, remote)) {
        (Some(Attribute::Index), Some(Attribute::Index)) => Resolution::Keep(local.clone()),
        (Some(a), Some(b)) if a == b => Resolution::Conflict(Conflict {
            conflict_type: ConflictType::EditConflict,
            bookmark: Some(old.clone()),
            local_version: Some(local.clone()),
            remote_version: Some(remote.clone()),
            attribute: Some(a),
        }),
        (Some(a), Some(b)) => {
            let mut merged = old.clone();
            merged.set_attribute_from(local, a);
            merged.set_attribute_from(remote, b);
            Resolution::Keep(merged)
        }
        (l, r) => Resolution::Fallback(format!(
            "modified on both sides but no differing attribute (local: {l:?}, remote: {r:?})"
        )),
    }
}

/// One side deleted, the other edited. An index-only edit is sibling churn,
/// so the deletion wins silently.
fn delete_vs_edit(
    old: &BookmarkRecord,
    tombstone: &BookmarkRecord,
    edit: &BookmarkRecord,
    deleted_locally: bool,
) -> Resolution {
    let changed = differing_attributes(old, edit);
    if changed.iter().all(|a| *a == Attribute::Index) {
        return Resolution::Tombstone(tombstone.clone());
    }

    let (local_version, remote_version) = if deleted_locally {
        (tombstone.clone(), edit.clone())
    } else {
        (edit.clone(), tombstone.clone())
    };
    Resolution::Conflict(Conflict {
        conflict_type: ConflictType::DeleteVsEdit,
        bookmark: Some(old.clone()),
        local_version: Some(local_version),
        remote_version: Some(remote_version),
        attribute: changed.into_iter().find(|a| *a != Attribute::Index),
    })
}

/// Pull out pairs of additions that share title and path but differ in URL.
fn split_add_conflicts(
    local_added: &[BookmarkRecord],
    remote_added: &[BookmarkRecord],
    builder: &mut StateBuilder,
    conflicts: &mut Vec<Conflict>,
) -> (Vec<BookmarkRecord>, Vec<BookmarkRecord>) {
    let local_keys: HashSet<IdentityKey> = local_added.iter().map(BookmarkRecord::key).collect();
    let remote_keys: HashSet<IdentityKey> = remote_added.iter().map(BookmarkRecord::key).collect();

    let mut remote_taken = vec![false; remote_added.len()];
    let mut local_rest = Vec::new();

    for local in local_added {
        let eligible = !local.is_folder() && !remote_keys.contains(&local.key());
        let partner = remote_added.iter().enumerate().find(|(i, remote)| {
            eligible
                && !remote_taken[*i]
                && !remote.is_folder()
                && !local_keys.contains(&remote.key())
                && remote.title == local.title
                && remote.path == local.path
                && remote.url_or_empty() != local.url_or_empty()
        });

        if let Some((i, remote)) = partner {
            remote_taken[i] = true;
            let conflict = Conflict {
                conflict_type: ConflictType::AddConflict,
                bookmark: None,
                local_version: Some(local.clone()),
                remote_version: Some(remote.clone()),
                attribute: Some(Attribute::Url),
            };
            builder.reserve(&conflict);
            conflicts.push(conflict);
        } else {
            local_rest.push(local.clone());
        }
    }

    let remote_rest = remote_added
        .iter()
        .zip(&remote_taken)
        .filter(|(_, taken)| !**taken)
        .map(|(r, _)| r.clone())
        .collect();

    (local_rest, remote_rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bm(title: &str, index: u32) -> BookmarkRecord {
        BookmarkRecord::bookmark(title, format!("https://{title}.example"), &["Bar"], index)
    }

    fn titles(records: &[BookmarkRecord]) -> Vec<(String, bool)> {
        records.iter().map(|r| (r.title.clone(), r.deleted)).collect()
    }

    #[test]
    fn test_unchanged_keeps_record_and_local_index_wins() {
        let baseline = vec![bm("A", 0)];
        let outcome = merge_states(&baseline, &[bm("A", 2)], &[bm("A", 5)], MatchMode::IndexTolerant);
        assert_eq!(outcome.new_state, vec![bm("A", 2)]);

        let outcome = merge_states(&baseline, &[bm("A", 0)], &[bm("A", 5)], MatchMode::IndexTolerant);
        assert_eq!(outcome.new_state, vec![bm("A", 5)]);
    }

    #[test]
    fn test_deletion_propagates_from_either_side() {
        let baseline = vec![bm("A", 0)];
        let tomb = bm("A", 0).make_tombstone_at(7);

        let outcome = merge_states(&baseline, &[tomb.clone()], &[bm("A", 0)], MatchMode::IndexTolerant);
        assert_eq!(outcome.new_state, vec![tomb.clone()]);

        let outcome = merge_states(&baseline, &[bm("A", 0)], &[tomb.clone()], MatchMode::IndexTolerant);
        assert_eq!(outcome.new_state, vec![tomb]);
    }

    #[test]
    fn test_missing_without_tombstone_is_restored_from_other_side() {
        let baseline = vec![bm("A", 0)];
        let outcome = merge_states(&baseline, &[], &[bm("A", 0)], MatchMode::IndexTolerant);
        assert_eq!(outcome.new_state, vec![bm("A", 0)]);
        assert!(outcome.conflicts.is_empty());
    }

    #[test]
    fn test_missing_on_both_sides_stays_absent() {
        let outcome = merge_states(&[bm("A", 0)], &[], &[], MatchMode::IndexTolerant);
        assert!(outcome.new_state.is_empty());
    }

    #[test]
    fn test_deleted_vs_missing_deletion_wins() {
        let tomb = bm("A", 0).make_tombstone_at(3);
        let outcome = merge_states(&[bm("A", 0)], &[], &[tomb.clone()], MatchMode::IndexTolerant);
        assert_eq!(outcome.new_state, vec![tomb]);
    }

    #[test]
    fn test_strict_one_sided_edit_is_adopted() {
        let mut edited = bm("A", 0);
        edited.url = Some("https://new.example".into());
        let outcome = merge_states(&[bm("A", 0)], &[bm("A", 0)], &[edited.clone()], MatchMode::Strict);
        assert_eq!(outcome.new_state, vec![edited]);
    }

    #[test]
    fn test_strict_orthogonal_edits_merge() {
        let mut retitled = bm("A", 0);
        retitled.title = "A2".into();
        let mut moved = bm("A", 0);
        moved.index = 3;

        let outcome = merge_states(&[bm("A", 0)], &[retitled], &[moved], MatchMode::Strict);
        assert!(outcome.conflicts.is_empty());
        assert_eq!(outcome.new_state.len(), 1);
        assert_eq!(outcome.new_state[0].title, "A2");
        assert_eq!(outcome.new_state[0].index, 3);
    }

    #[test]
    fn test_strict_same_attribute_conflicts() {
        let mut local = bm("A", 0);
        local.title = "Local".into();
        let mut remote = bm("A", 0);
        remote.title = "Remote".into();

        let outcome = merge_states(&[bm("A", 0)], &[local.clone()], &[remote.clone()], MatchMode::Strict);
        assert_eq!(outcome.conflicts.len(), 1);
        let conflict = &outcome.conflicts[0];
        assert_eq!(conflict.conflict_type, ConflictType::EditConflict);
        assert_eq!(conflict.attribute, Some(Attribute::Title));
        assert_eq!(conflict.local_version.as_ref(), Some(&local));
        assert_eq!(conflict.remote_version.as_ref(), Some(&remote));
        assert!(outcome.new_state.is_empty());
    }

    #[test]
    fn test_strict_same_edit_on_both_sides() {
        let mut edited = bm("A", 0);
        edited.title = "Same".into();
        let outcome = merge_states(&[bm("A", 0)], &[edited.clone()], &[edited.clone()], MatchMode::Strict);
        assert!(outcome.conflicts.is_empty());
        assert_eq!(outcome.new_state, vec![edited]);
    }

    #[test]
    fn test_strict_both_moved_index_local_wins() {
        let outcome = merge_states(&[bm("A", 0)], &[bm("A", 1)], &[bm("A", 2)], MatchMode::Strict);
        assert!(outcome.conflicts.is_empty());
        assert_eq!(outcome.new_state, vec![bm("A", 1)]);
    }

    #[test]
    fn test_strict_delete_vs_edit() {
        let mut edited = bm("A", 0);
        edited.title = "A-edited".into();
        let tomb = bm("A", 0).make_tombstone_at(1);

        let outcome = merge_states(&[bm("A", 0)], &[tomb.clone()], &[edited.clone()], MatchMode::Strict);
        assert_eq!(outcome.conflicts.len(), 1);
        let conflict = &outcome.conflicts[0];
        assert_eq!(conflict.conflict_type, ConflictType::DeleteVsEdit);
        assert_eq!(conflict.local_version.as_ref(), Some(&tomb));
        assert_eq!(conflict.remote_version.as_ref(), Some(&edited));
        assert_eq!(conflict.attribute, Some(Attribute::Title));
        // Neither the edit nor the tombstone leak into the new state.
        assert!(outcome.new_state.is_empty());
    }

    #[test]
    fn test_strict_delete_vs_index_only_edit_deletes() {
        let tomb = bm("A", 0).make_tombstone_at(1);
        let outcome = merge_states(&[bm("A", 0)], &[bm("A", 4)], &[tomb.clone()], MatchMode::Strict);
        assert!(outcome.conflicts.is_empty());
        assert_eq!(outcome.new_state, vec![tomb]);
    }

    #[test]
    fn test_adds_from_both_sides_deduplicate() {
        let outcome = merge_states(
            &[],
            &[bm("A", 0), bm("B", 1)],
            &[bm("B", 3), bm("C", 2)],
            MatchMode::IndexTolerant,
        );
        assert_eq!(
            titles(&outcome.new_state),
            vec![("A".into(), false), ("B".into(), false), ("C".into(), false)]
        );
        // First writer (local) wins for the shared identity.
        assert_eq!(outcome.new_state[1].index, 1);
    }

    #[test]
    fn test_recreation_beats_stale_tombstone() {
        let tomb = bm("A", 0).make_tombstone_at(1);
        let outcome = merge_states(&[], &[bm("A", 0)], &[tomb], MatchMode::IndexTolerant);
        assert_eq!(outcome.new_state, vec![bm("A", 0)]);
    }

    #[test]
    fn test_tombstones_are_carried_forward() {
        let tomb = bm("Old", 0).make_tombstone_at(1);
        let outcome = merge_states(&[], &[], &[tomb.clone()], MatchMode::IndexTolerant);
        assert_eq!(outcome.new_state, vec![tomb]);
    }

    #[test]
    fn test_strict_add_conflict() {
        let local = BookmarkRecord::bookmark("Docs", "https://a.example", &["Bar"], 0);
        let remote = BookmarkRecord::bookmark("Docs", "https://b.example", &["Bar"], 0);

        let outcome = merge_states(&[], &[local.clone()], &[remote.clone()], MatchMode::Strict);
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(outcome.conflicts[0].conflict_type, ConflictType::AddConflict);
        assert!(outcome.new_state.is_empty());

        // Tolerant mode keeps both.
        let outcome = merge_states(&[], &[local], &[remote], MatchMode::IndexTolerant);
        assert!(outcome.conflicts.is_empty());
        assert_eq!(outcome.new_state.len(), 2);
    }

    #[test]
    fn test_state_builder_force_replaces_reserved() {
        let mut builder = StateBuilder::default();
        let conflict = Conflict {
            conflict_type: ConflictType::EditConflict,
            bookmark: Some(bm("A", 0)),
            local_version: None,
            remote_version: None,
            attribute: None,
        };
        builder.reserve(&conflict);
        assert!(!builder.place(bm("A", 0)));
        builder.force(bm("A", 1));
        assert_eq!(builder.into_records(), vec![bm("A", 1)]);
    }
}
