//! Local tombstone policy.
//!
//! The tombstone store remembers identities deleted locally so the merge can
//! tell "deleted here" from "never seen here". It grows on every local
//! delete or move-away, absorbs the merged state's tombstones after each
//! sync, and drops any tombstone whose identity is live again.

use std::collections::{HashMap, HashSet};

use crate::model::{active, tombstones, BookmarkRecord, IdentityKey};

/// Tombstones for every record of `before` whose identity is not live in `after`.
///
/// This is how a delete or a move becomes "old identity gone" for the merge.
#[must_use]
pub fn vanished_tombstones(before: &[BookmarkRecord], after: &[BookmarkRecord]) -> Vec<BookmarkRecord> {
    let live: HashSet<IdentityKey> = active(after).map(BookmarkRecord::key).collect();
    active(before)
        .filter(|r| !live.contains(&r.key()))
        .map(BookmarkRecord::make_tombstone)
        .collect()
}

/// Union of two tombstone sets, one per identity, keeping the newest deletion.
///
/// Order is stable: stored entries first, then new identities from `incoming`.
#[must_use]
pub fn merge_tombstones(stored: &[BookmarkRecord], incoming: &[BookmarkRecord]) -> Vec<BookmarkRecord> {
    let mut positions: HashMap<IdentityKey, usize> = HashMap::new();
    let mut out: Vec<BookmarkRecord> = Vec::new();

    for tombstone in tombstones(stored).chain(tombstones(incoming)) {
        let key = tombstone.key();
        match positions.get(&key) {
            Some(&pos) => {
                if tombstone.deleted_at > out[pos].deleted_at {
                    out[pos] = tombstone.clone();
                }
            }
            None => {
                positions.insert(key, out.len());
                out.push(tombstone.clone());
            }
        }
    }
    out
}

/// Drop tombstones whose identity is live in `state`.
#[must_use]
pub fn prune_revived(tombstones: &[BookmarkRecord], state: &[BookmarkRecord]) -> Vec<BookmarkRecord> {
    let live: HashSet<IdentityKey> = active(state).map(BookmarkRecord::key).collect();
    tombstones
        .iter()
        .filter(|t| !live.contains(&t.key()))
        .cloned()
        .collect()
}

/// Local tombstone set to store after a sync that converged on `new_state`.
#[must_use]
pub fn next_local_tombstones(
    stored: &[BookmarkRecord],
    new_state: &[BookmarkRecord],
) -> Vec<BookmarkRecord> {
    prune_revived(&merge_tombstones(stored, new_state), new_state)
}

/// Current local state: the tree's live records plus stored tombstones for
/// identities that are not live in the tree.
#[must_use]
pub fn local_state(tree_records: &[BookmarkRecord], stored: &[BookmarkRecord]) -> Vec<BookmarkRecord> {
    let mut state: Vec<BookmarkRecord> = active(tree_records).cloned().collect();
    state.extend(prune_revived(stored, tree_records));
    state
}
