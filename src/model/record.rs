//! Bookmark record model and structural identity.
//!
//! A record is one flattened node of a bookmark tree: either a leaf bookmark
//! (non-empty `url`) or a folder (no `url`). Records carry no stable ID.
//! Identity is structural:
//!
//! - **loose identity**: title + url-or-empty + path (index ignored)
//! - **exact identity**: loose identity + index
//!
//! The index is volatile: it shifts whenever a sibling is inserted or removed,
//! so it is treated as state, not identity.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// One flattened bookmark, folder, or tombstone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkRecord {
    /// Display title (may be empty, e.g. separators).
    pub title: String,

    /// Target URL. `None` or empty marks a folder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Ancestor folder titles from the root, excluding the record's own title.
    #[serde(default)]
    pub path: Vec<String>,

    /// Sibling position within the parent at snapshot time.
    #[serde(default)]
    pub index: u32,

    /// Tombstone marker.
    #[serde(default, skip_serializing_if = "is_false")]
    pub deleted: bool,

    /// Deletion timestamp (Unix milliseconds), set on tombstones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

/// The four comparable attributes of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Title,
    Url,
    Path,
    Index,
}

impl Attribute {
    /// All attributes in comparison order.
    pub const ALL: [Self; 4] = [Self::Title, Self::Url, Self::Path, Self::Index];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Url => "url",
            Self::Path => "path",
            Self::Index => "index",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical encoding of a record's loose identity.
///
/// Every component is length-prefixed, so a delimiter inside a title or path
/// segment cannot make two different decompositions collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(String);

impl IdentityKey {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn push_segment(buf: &mut String, segment: &str) {
    buf.push_str(&segment.len().to_string());
    buf.push(':');
    buf.push_str(segment);
}

impl BookmarkRecord {
    /// Create a live leaf bookmark.
    pub fn bookmark(title: impl Into<String>, url: impl Into<String>, path: &[&str], index: u32) -> Self {
        Self {
            title: title.into(),
            url: Some(url.into()),
            path: path.iter().map(|s| (*s).to_string()).collect(),
            index,
            deleted: false,
            deleted_at: None,
        }
    }

    /// Create a live folder.
    pub fn folder(title: impl Into<String>, path: &[&str], index: u32) -> Self {
        Self {
            title: title.into(),
            url: None,
            path: path.iter().map(|s| (*s).to_string()).collect(),
            index,
            deleted: false,
            deleted_at: None,
        }
    }

    /// URL, with a missing URL read as the empty string.
    #[must_use]
    pub fn url_or_empty(&self) -> &str {
        self.url.as_deref().unwrap_or("")
    }

    /// Canonical loose-identity key.
    #[must_use]
    pub fn key(&self) -> IdentityKey {
        let mut buf = String::new();
        push_segment(&mut buf, &self.title);
        buf.push('|');
        buf.push_str(&self.path.len().to_string());
        for segment in &self.path {
            buf.push('|');
            push_segment(&mut buf, segment);
        }
        buf.push('|');
        push_segment(&mut buf, self.url_or_empty());
        IdentityKey(buf)
    }

    /// True for folders (no URL).
    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.url_or_empty().is_empty()
    }

    /// True for tombstones.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.deleted
    }

    /// Path of this record's children: its own path extended by its title.
    #[must_use]
    pub fn child_path(&self) -> Vec<String> {
        let mut path = self.path.clone();
        path.push(self.title.clone());
        path
    }

    /// Tombstone carrying this record's identity, stamped now.
    #[must_use]
    pub fn make_tombstone(&self) -> Self {
        self.make_tombstone_at(chrono::Utc::now().timestamp_millis())
    }

    /// Tombstone carrying this record's identity with an explicit timestamp.
    #[must_use]
    pub fn make_tombstone_at(&self, deleted_at: i64) -> Self {
        Self {
            deleted: true,
            deleted_at: Some(deleted_at),
            ..self.clone()
        }
    }

    /// Live copy of a tombstone (same title/url/path/index).
    #[must_use]
    pub fn revive(&self) -> Self {
        Self {
            deleted: false,
            deleted_at: None,
            ..self.clone()
        }
    }

    /// Human-readable location, e.g. `Bar/Dev/Rust docs`.
    #[must_use]
    pub fn display_path(&self) -> String {
        if self.path.is_empty() {
            self.title.clone()
        } else {
            format!("{}/{}", self.path.join("/"), self.title)
        }
    }

    fn attribute_eq(&self, other: &Self, attribute: Attribute) -> bool {
        match attribute {
            Attribute::Title => self.title == other.title,
            Attribute::Url => self.url_or_empty() == other.url_or_empty(),
            Attribute::Path => self.path == other.path,
            Attribute::Index => self.index == other.index,
        }
    }

    /// Copy `attribute` from `source` onto this record.
    pub fn set_attribute_from(&mut self, source: &Self, attribute: Attribute) {
        match attribute {
            Attribute::Title => self.title.clone_from(&source.title),
            Attribute::Url => self.url.clone_from(&source.url),
            Attribute::Path => self.path.clone_from(&source.path),
            Attribute::Index => self.index = source.index,
        }
    }
}

/// Same bookmark under loose identity: title, url-or-empty and path match.
#[must_use]
pub fn loose_equal(a: &BookmarkRecord, b: &BookmarkRecord) -> bool {
    a.title == b.title && a.url_or_empty() == b.url_or_empty() && a.path == b.path
}

/// Loose identity plus matching index.
#[must_use]
pub fn exact_equal(a: &BookmarkRecord, b: &BookmarkRecord) -> bool {
    loose_equal(a, b) && a.index == b.index
}

/// At least three of {title, url, path, index} match.
///
/// Best-effort correlation only; never used as canonical identity.
#[must_use]
pub fn partial_match(a: &BookmarkRecord, b: &BookmarkRecord) -> bool {
    Attribute::ALL
        .iter()
        .filter(|attr| a.attribute_eq(b, **attr))
        .count()
        >= 3
}

/// First attribute (title, url, path, index order) that differs, if any.
///
/// For a pair that satisfies [`partial_match`] this is the single differing
/// attribute.
#[must_use]
pub fn differing_attribute(a: &BookmarkRecord, b: &BookmarkRecord) -> Option<Attribute> {
    Attribute::ALL
        .into_iter()
        .find(|attr| !a.attribute_eq(b, *attr))
}

/// Every attribute that differs between `a` and `b`.
#[must_use]
pub fn differing_attributes(a: &BookmarkRecord, b: &BookmarkRecord) -> Vec<Attribute> {
    Attribute::ALL
        .into_iter()
        .filter(|attr| !a.attribute_eq(b, *attr))
        .collect()
}

/// Live records of a state.
pub fn active(records: &[BookmarkRecord]) -> impl Iterator<Item = &BookmarkRecord> {
    records.iter().filter(|r| !r.deleted)
}

/// Tombstones of a state.
pub fn tombstones(records: &[BookmarkRecord]) -> impl Iterator<Item = &BookmarkRecord> {
    records.iter().filter(|r| r.deleted)
}

/// Keep one representative per loose identity.
///
/// The first live record wins; a tombstone is kept only if no live record
/// shares its identity.
#[must_use]
pub fn dedupe(records: &[BookmarkRecord]) -> Vec<BookmarkRecord> {
    let live_keys: HashSet<IdentityKey> = active(records).map(BookmarkRecord::key).collect();
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(records.len());

    for record in records {
        let key = record.key();
        if record.deleted && live_keys.contains(&key) {
            continue;
        }
        if seen.insert(key) {
            out.push(record.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ignores_index() {
        let a = BookmarkRecord::bookmark("Rust", "https://rust-lang.org", &["Bar"], 0);
        let b = BookmarkRecord::bookmark("Rust", "https://rust-lang.org", &["Bar"], 7);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_key_is_unambiguous_with_delimiters_in_titles() {
        // "a|b" under [] vs "b" under ["a"] would collide with a joined key.
        let a = BookmarkRecord::folder("a|b", &[], 0);
        let b = BookmarkRecord::folder("b", &["a"], 0);
        assert_ne!(a.key(), b.key());

        let c = BookmarkRecord::folder("x", &["a/b"], 0);
        let d = BookmarkRecord::folder("x", &["a", "b"], 0);
        assert_ne!(c.key(), d.key());
    }

    #[test]
    fn test_missing_and_empty_url_are_the_same_folder() {
        let mut a = BookmarkRecord::folder("Dev", &[], 0);
        let b = a.clone();
        a.url = Some(String::new());
        assert!(loose_equal(&a, &b));
        assert!(a.is_folder());
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_exact_equal_requires_index() {
        let a = BookmarkRecord::bookmark("A", "https://a", &[], 0);
        let b = BookmarkRecord::bookmark("A", "https://a", &[], 1);
        assert!(loose_equal(&a, &b));
        assert!(!exact_equal(&a, &b));
    }

    #[test]
    fn test_partial_match_three_of_four() {
        let base = BookmarkRecord::bookmark("A", "https://a", &["Bar"], 0);
        let mut retitled = base.clone();
        retitled.title = "A2".into();
        assert!(partial_match(&base, &retitled));
        assert_eq!(differing_attribute(&base, &retitled), Some(Attribute::Title));

        let mut moved = retitled.clone();
        moved.index = 4;
        assert!(!partial_match(&base, &moved));
        assert_eq!(
            differing_attributes(&base, &moved),
            vec![Attribute::Title, Attribute::Index]
        );
    }

    #[test]
    fn test_differing_attribute_none_when_identical() {
        let a = BookmarkRecord::bookmark("A", "https://a", &[], 0);
        assert_eq!(differing_attribute(&a, &a.clone()), None);
    }

    #[test]
    fn test_tombstone_roundtrip_keeps_identity() {
        let a = BookmarkRecord::bookmark("A", "https://a", &["Bar"], 3);
        let t = a.make_tombstone_at(42);
        assert!(t.is_tombstone());
        assert_eq!(t.deleted_at, Some(42));
        assert_eq!(t.key(), a.key());
        assert_eq!(t.revive(), a);
    }

    #[test]
    fn test_make_tombstone_stamps_now() {
        let a = BookmarkRecord::bookmark("A", "https://a", &["Bar"], 3);
        let before = chrono::Utc::now().timestamp_millis();
        let t = a.make_tombstone();
        let after = chrono::Utc::now().timestamp_millis();
        assert!(t.deleted);
        assert!(t.deleted_at.is_some_and(|at| (before..=after).contains(&at)));
        assert_eq!(t.key(), a.key());
    }

    #[test]
    fn test_serializes_as_plain_json_record() {
        let folder = BookmarkRecord::folder("Dev", &["Bar"], 1);
        let json = serde_json::to_value(&folder).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"title": "Dev", "path": ["Bar"], "index": 1})
        );

        let tomb = BookmarkRecord::bookmark("A", "https://a", &[], 0).make_tombstone_at(5);
        let json = serde_json::to_value(&tomb).unwrap();
        assert_eq!(json["deleted"], true);
        assert_eq!(json["deletedAt"], 5);
    }

    #[test]
    fn test_dedupe_prefers_live_record() {
        let a = BookmarkRecord::bookmark("A", "https://a", &[], 0);
        let records = vec![a.make_tombstone_at(1), a.clone(), a.clone()];
        let out = dedupe(&records);
        assert_eq!(out, vec![a]);
    }
}
