//! State fingerprints for change detection.
//!
//! A fingerprint is a SHA256 over the identity key, tombstone flag and index
//! of every record, sorted by key. Two states with the same fingerprint need
//! no write between them, whatever order their records were listed in.

use sha2::{Digest, Sha256};

use crate::model::BookmarkRecord;

/// Compute the fingerprint of a state.
#[must_use]
pub fn state_fingerprint(records: &[BookmarkRecord]) -> String {
    let mut entries: Vec<(String, bool, u32)> = records
        .iter()
        .map(|r| (r.key().as_str().to_string(), r.deleted, r.index))
        .collect();
    entries.sort();

    let mut hasher = Sha256::new();
    for (key, deleted, index) in &entries {
        hasher.update(key.as_bytes());
        hasher.update([0, u8::from(*deleted)]);
        hasher.update(index.to_be_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Check if a state differs from a previously stored fingerprint.
///
/// Returns `true` when nothing is stored yet.
#[must_use]
pub fn has_changed(current_hash: &str, stored_hash: Option<&str>) -> bool {
    stored_hash.is_none_or(|h| h != current_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> Vec<BookmarkRecord> {
        vec![
            BookmarkRecord::folder("Bar", &[], 0),
            BookmarkRecord::bookmark("A", "https://a.example", &["Bar"], 0),
        ]
    }

    #[test]
    fn test_fingerprint_ignores_order() {
        let mut reversed = state();
        reversed.reverse();
        assert_eq!(state_fingerprint(&state()), state_fingerprint(&reversed));
        assert_eq!(state_fingerprint(&state()).len(), 64);
    }

    #[test]
    fn test_fingerprint_sees_index_and_tombstones() {
        let base = state_fingerprint(&state());

        let mut moved = state();
        moved[1].index = 3;
        assert_ne!(base, state_fingerprint(&moved));

        let mut deleted = state();
        deleted[1] = deleted[1].make_tombstone_at(1);
        assert_ne!(base, state_fingerprint(&deleted));
    }

    #[test]
    fn test_fingerprint_ignores_deletion_time() {
        let a = BookmarkRecord::bookmark("A", "https://a.example", &[], 0);
        assert_eq!(
            state_fingerprint(&[a.make_tombstone_at(1)]),
            state_fingerprint(&[a.make_tombstone_at(2)])
        );
    }

    #[test]
    fn test_has_changed() {
        assert!(has_changed("abc123", None));
        assert!(has_changed("abc123", Some("xyz789")));
        assert!(!has_changed("abc123", Some("abc123")));
    }
}
