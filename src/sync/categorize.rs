//! Classify what one side did to each baseline record.

use std::collections::HashMap;

use crate::model::{exact_equal, partial_match, BookmarkRecord, IdentityKey};
use crate::sync::types::MatchMode;

/// What happened to a baseline record on one side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideChange {
    /// Still present; carries the side's current record.
    Unchanged(BookmarkRecord),
    /// Removed with a tombstone; carries the tombstone.
    Deleted(BookmarkRecord),
    /// Edited (strict mode only); carries the side's current record.
    Modified(BookmarkRecord),
    /// Gone without a tombstone.
    Missing,
}

impl SideChange {
    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        match self {
            Self::Unchanged(_) => ChangeKind::Unchanged,
            Self::Deleted(_) => ChangeKind::Deleted,
            Self::Modified(_) => ChangeKind::Modified,
            Self::Missing => ChangeKind::Missing,
        }
    }
}

/// Discriminant of [`SideChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Unchanged,
    Deleted,
    Modified,
    Missing,
}

/// Categorization of one side against the baseline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Categorized {
    /// One entry per baseline record, in baseline order.
    pub changes: Vec<SideChange>,
    /// Current records not matched to any baseline record.
    pub added: Vec<BookmarkRecord>,
}

impl Categorized {
    /// Number of baseline records in the given category.
    #[must_use]
    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind() == kind).count()
    }

    /// `(old, current)` pairs of the given category.
    ///
    /// `baseline` must be the slice this categorization was computed from.
    pub fn pairs<'a>(
        &'a self,
        baseline: &'a [BookmarkRecord],
        kind: ChangeKind,
    ) -> impl Iterator<Item = (&'a BookmarkRecord, &'a BookmarkRecord)> + 'a {
        baseline
            .iter()
            .zip(&self.changes)
            .filter_map(move |(old, change)| match change {
                SideChange::Unchanged(current)
                | SideChange::Deleted(current)
                | SideChange::Modified(current)
                    if change.kind() == kind =>
                {
                    Some((old, current))
                }
                _ => None,
            })
    }
}

/// Classify each live baseline record against one side's current snapshot.
///
/// `baseline_active` and `current_active` hold live records only;
/// `current_tombstones` holds the side's tombstones.
#[must_use]
pub fn categorize_changes(
    baseline_active: &[BookmarkRecord],
    current_active: &[BookmarkRecord],
    current_tombstones: &[BookmarkRecord],
    mode: MatchMode,
) -> Categorized {
    let mut by_key: HashMap<IdentityKey, usize> = HashMap::new();
    for (i, record) in current_active.iter().enumerate() {
        by_key.entry(record.key()).or_insert(i);
    }
    let tombstone_by_key: HashMap<IdentityKey, &BookmarkRecord> = current_tombstones
        .iter()
        .map(|t| (t.key(), t))
        .collect();

    let mut matched = vec![false; current_active.len()];
    let mut changes = vec![SideChange::Missing; baseline_active.len()];

    // Pass 1: unchanged.
    for (slot, old) in changes.iter_mut().zip(baseline_active) {
        let Some(&i) = by_key.get(&old.key()) else {
            continue;
        };
        if matched[i] {
            continue;
        }
        let current = &current_active[i];
        if mode == MatchMode::IndexTolerant || exact_equal(old, current) {
            matched[i] = true;
            *slot = SideChange::Unchanged(current.clone());
        }
    }

    // Pass 2: deleted.
    for (slot, old) in changes.iter_mut().zip(baseline_active) {
        if *slot != SideChange::Missing {
            continue;
        }
        if let Some(tombstone) = tombstone_by_key.get(&old.key()) {
            *slot = SideChange::Deleted((*tombstone).clone());
        }
    }

    // Pass 3 (strict): modified. Same identity at a new index first, then
    // any 3-of-4 partial match.
    if mode == MatchMode::Strict {
        for (slot, old) in changes.iter_mut().zip(baseline_active) {
            if *slot != SideChange::Missing {
                continue;
            }
            let same_identity = by_key.get(&old.key()).copied().filter(|&i| !matched[i]);
            let candidate = same_identity.or_else(|| {
                current_active
                    .iter()
                    .enumerate()
                    .find(|(i, current)| !matched[*i] && partial_match(old, current))
                    .map(|(i, _)| i)
            });
            if let Some(i) = candidate {
                matched[i] = true;
                *slot = SideChange::Modified(current_active[i].clone());
            }
        }
    }

    let added = current_active
        .iter()
        .zip(&matched)
        .filter(|(_, m)| !**m)
        .map(|(r, _)| r.clone())
        .collect();

    Categorized { changes, added }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bm(title: &str, index: u32) -> BookmarkRecord {
        BookmarkRecord::bookmark(title, format!("https://{title}.example"), &["Bar"], index)
    }

    #[test]
    fn test_tolerant_ignores_index_drift() {
        let baseline = vec![bm("A", 0)];
        let current = vec![bm("A", 5)];
        let result = categorize_changes(&baseline, &current, &[], MatchMode::IndexTolerant);
        assert_eq!(result.changes, vec![SideChange::Unchanged(bm("A", 5))]);
        assert!(result.added.is_empty());
    }

    #[test]
    fn test_deleted_requires_tombstone() {
        let baseline = vec![bm("A", 0), bm("B", 1)];
        let tombstone = bm("A", 0).make_tombstone_at(9);
        let result =
            categorize_changes(&baseline, &[], &[tombstone.clone()], MatchMode::IndexTolerant);
        assert_eq!(result.changes[0], SideChange::Deleted(tombstone));
        assert_eq!(result.changes[1], SideChange::Missing);
        assert_eq!(result.count(ChangeKind::Missing), 1);
    }

    #[test]
    fn test_tolerant_edit_is_missing_plus_added() {
        let baseline = vec![bm("A", 0)];
        let mut edited = bm("A", 0);
        edited.title = "A-edited".into();
        let result =
            categorize_changes(&baseline, &[edited.clone()], &[], MatchMode::IndexTolerant);
        assert_eq!(result.changes, vec![SideChange::Missing]);
        assert_eq!(result.added, vec![edited]);
    }

    #[test]
    fn test_strict_index_shift_is_modified() {
        let baseline = vec![bm("A", 0)];
        let result = categorize_changes(&baseline, &[bm("A", 1)], &[], MatchMode::Strict);
        assert_eq!(result.changes, vec![SideChange::Modified(bm("A", 1))]);
    }

    #[test]
    fn test_strict_partial_match_is_modified() {
        let baseline = vec![bm("A", 0), bm("B", 1)];
        let mut renamed = bm("A", 0);
        renamed.title = "A2".into();
        let current = vec![renamed.clone(), bm("B", 1), bm("C", 2)];
        let result = categorize_changes(&baseline, &current, &[], MatchMode::Strict);
        assert_eq!(result.changes[0], SideChange::Modified(renamed));
        assert_eq!(result.changes[1], SideChange::Unchanged(bm("B", 1)));
        assert_eq!(result.added, vec![bm("C", 2)]);

        let pairs: Vec<_> = result.pairs(&baseline, ChangeKind::Modified).collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0.title, "A");
        assert_eq!(pairs[0].1.title, "A2");
    }

    #[test]
    fn test_each_current_record_matches_once() {
        let baseline = vec![bm("A", 0), bm("A", 0)];
        let result = categorize_changes(&baseline, &[bm("A", 0)], &[], MatchMode::IndexTolerant);
        assert_eq!(result.count(ChangeKind::Unchanged), 1);
        assert_eq!(result.count(ChangeKind::Missing), 1);
    }
}
