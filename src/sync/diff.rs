//! State diffing under loose identity.
//!
//! Only live records take part; tombstones never produce mutations.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::model::{active, Attribute, BookmarkRecord, IdentityKey};
use crate::sync::types::{Changes, Update};

/// Mutations that transform `current` into `target`.
///
/// Inputs are expected to hold one representative per identity; if they do
/// not, the first occurrence wins. The result is ordered for an applier:
/// deletions deepest-first, insertions and updates shallowest-first by index.
#[must_use]
pub fn diff_states(current: &[BookmarkRecord], target: &[BookmarkRecord]) -> Changes {
    let mut current_by_key: HashMap<IdentityKey, &BookmarkRecord> = HashMap::new();
    for record in active(current) {
        current_by_key.entry(record.key()).or_insert(record);
    }

    let mut target_keys = HashSet::new();
    let mut changes = Changes::default();

    for record in active(target) {
        let key = record.key();
        if !target_keys.insert(key.clone()) {
            continue;
        }
        match current_by_key.get(&key) {
            None => changes.insertions.push(record.clone()),
            Some(existing) if existing.index != record.index => changes.updates.push(Update {
                changed_attribute: Attribute::Index,
                old: (*existing).clone(),
                new: record.clone(),
            }),
            Some(_) => {}
        }
    }

    let mut deleted_keys = HashSet::new();
    for record in active(current) {
        let key = record.key();
        if !target_keys.contains(&key) && deleted_keys.insert(key) {
            changes.deletions.push(record.clone());
        }
    }

    sort_changes(&mut changes);
    changes
}

/// Order a change-set the way appliers consume it.
pub fn sort_changes(changes: &mut Changes) {
    changes.deletions.sort_by(deletion_order);
    changes.insertions.sort_by(insertion_order);
    changes
        .updates
        .sort_by(|a, b| insertion_order(&a.new, &b.new));
}

/// Content before its containing folders: deeper first, bookmarks before
/// folders at equal depth, then descending index.
fn deletion_order(a: &BookmarkRecord, b: &BookmarkRecord) -> Ordering {
    b.path
        .len()
        .cmp(&a.path.len())
        .then_with(|| a.is_folder().cmp(&b.is_folder()))
        .then_with(|| b.index.cmp(&a.index))
}

/// Parents before children, then ascending index.
fn insertion_order(a: &BookmarkRecord, b: &BookmarkRecord) -> Ordering {
    a.path
        .len()
        .cmp(&b.path.len())
        .then_with(|| a.path.cmp(&b.path))
        .then_with(|| a.index.cmp(&b.index))
}
