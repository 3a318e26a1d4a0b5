//! Folder content guard.
//!
//! A folder tombstone loses to live content underneath it: if any live record
//! sits at the folder's child path (or deeper), the folder is revived in place.

use std::collections::HashSet;

use tracing::debug;

use crate::model::{active, BookmarkRecord};

/// Revive folder tombstones that still have live content below them.
///
/// Works over the flat list: every path prefix of every live record is
/// collected once, then each folder tombstone is checked against that set.
/// Returns the number of folders revived.
pub fn protect_folders_with_content(state: &mut [BookmarkRecord]) -> usize {
    let mut occupied: HashSet<Vec<String>> = HashSet::new();
    for record in active(state) {
        for depth in 1..=record.path.len() {
            occupied.insert(record.path[..depth].to_vec());
        }
    }

    let mut revived = 0;
    for record in state.iter_mut() {
        if record.deleted && record.is_folder() && occupied.contains(&record.child_path()) {
            debug!(folder = %record.display_path(), "Reviving deleted folder that still has content");
            *record = record.revive();
            revived += 1;
        }
    }
    revived
}
