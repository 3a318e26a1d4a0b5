//! Nested bookmark tree as the host store hands it out.
//!
//! The sync core never works on trees; it works on the flat record lists
//! produced by [`flatten`]. Flattening walks the tree iteratively with an
//! explicit stack.

use serde::{Deserialize, Serialize};

use super::record::BookmarkRecord;

/// ID of the root node.
pub const ROOT_ID: &str = "root";

/// One node of a bookmark tree.
///
/// Folders carry `children` (possibly empty); leaves carry `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkNode {
    /// Store-local handle. Not portable across machines and never used as identity.
    #[serde(default = "BookmarkNode::new_id")]
    pub id: String,

    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<BookmarkNode>>,
}

impl BookmarkNode {
    /// Generate a fresh store-local node ID.
    #[must_use]
    pub fn new_id() -> String {
        format!("bm_{}", &uuid::Uuid::new_v4().to_string()[..12])
    }

    /// New empty folder.
    pub fn new_folder(title: impl Into<String>) -> Self {
        Self {
            id: Self::new_id(),
            title: title.into(),
            url: None,
            children: Some(Vec::new()),
        }
    }

    /// New leaf bookmark.
    pub fn new_bookmark(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: Self::new_id(),
            title: title.into(),
            url: Some(url.into()),
            children: None,
        }
    }

    /// Empty root node.
    #[must_use]
    pub fn new_root() -> Self {
        Self {
            id: ROOT_ID.to_string(),
            title: String::new(),
            url: None,
            children: Some(Vec::new()),
        }
    }

    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.url.as_deref().is_none_or(str::is_empty)
    }

    /// Children slice (empty for leaves).
    #[must_use]
    pub fn children(&self) -> &[BookmarkNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Convert to a record at the given location.
    #[must_use]
    pub fn to_record(&self, path: Vec<String>, index: u32) -> BookmarkRecord {
        BookmarkRecord {
            title: self.title.clone(),
            url: self.url.clone().filter(|u| !u.is_empty()),
            path,
            index,
            deleted: false,
            deleted_at: None,
        }
    }
}

/// Flatten a tree into records, excluding the root itself.
///
/// The root's title is normalized away: top-level nodes get an empty path.
/// Records come out in pre-order (parents before children).
#[must_use]
pub fn flatten(root: &BookmarkNode) -> Vec<BookmarkRecord> {
    flatten_children(root, &[])
}

/// Flatten the descendants of `node`, whose children live at `child_path`.
///
/// The node itself is not included.
#[must_use]
pub fn flatten_children(node: &BookmarkNode, child_path: &[String]) -> Vec<BookmarkRecord> {
    let mut out = Vec::new();
    let mut stack: Vec<(&BookmarkNode, Vec<String>, u32)> = node
        .children()
        .iter()
        .enumerate()
        .rev()
        .map(|(i, child)| (child, child_path.to_vec(), index_of(i)))
        .collect();

    while let Some((current, path, index)) = stack.pop() {
        out.push(current.to_record(path.clone(), index));

        if current.children.is_some() {
            let mut next_path = path;
            next_path.push(current.title.clone());
            for (i, child) in current.children().iter().enumerate().rev() {
                stack.push((child, next_path.clone(), index_of(i)));
            }
        }
    }

    out
}

/// Sibling position as stored in a record.
#[must_use]
pub fn index_of(position: usize) -> u32 {
    u32::try_from(position).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> BookmarkNode {
        let mut root = BookmarkNode::new_root();
        root.title = "Root".into();
        let mut bar = BookmarkNode::new_folder("Bar");
        let mut dev = BookmarkNode::new_folder("Dev");
        dev.children = Some(vec![BookmarkNode::new_bookmark("Rust", "https://rust-lang.org")]);
        bar.children = Some(vec![
            BookmarkNode::new_bookmark("News", "https://news.example"),
            dev,
        ]);
        root.children = Some(vec![bar, BookmarkNode::new_folder("Other")]);
        root
    }

    #[test]
    fn test_flatten_excludes_root_title() {
        let records = flatten(&sample_tree());
        let bar = &records[0];
        assert_eq!(bar.title, "Bar");
        assert!(bar.path.is_empty());
        assert!(bar.is_folder());
    }

    #[test]
    fn test_flatten_preorder_with_paths_and_indices() {
        let records = flatten(&sample_tree());
        let summary: Vec<(String, u32)> = records
            .iter()
            .map(|r| (r.display_path(), r.index))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Bar".to_string(), 0),
                ("Bar/News".to_string(), 0),
                ("Bar/Dev".to_string(), 1),
                ("Bar/Dev/Rust".to_string(), 0),
                ("Other".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_empty_url_is_folder() {
        let mut node = BookmarkNode::new_bookmark("x", "");
        assert!(node.is_folder());
        node.url = Some("https://x".into());
        assert!(!node.is_folder());
        assert_eq!(node.to_record(vec![], 0).url.as_deref(), Some("https://x"));
    }
}
