//! Local bookmark tree store.
//!
//! [`TreeStore`] is the seam between the sync engine and whatever holds the
//! user's bookmarks. [`FileTree`] keeps the tree as one JSON document (the
//! nested root node) and writes it back atomically on [`TreeStore::flush`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{
    flatten, flatten_children, index_of, BookmarkNode, BookmarkRecord, ROOT_ID,
};
use crate::storage::file::{modified_time, read_json, write_json};

/// Operations the sync engine and the CLI need from a bookmark tree.
///
/// Node IDs are store-local handles. Methods that change a node's identity
/// (remove, move, update) return the affected subtree's records as they were
/// before the change, so the caller can tombstone identities that vanished.
pub trait TreeStore {
    /// Full tree, rooted at the (untitled) root node.
    fn snapshot(&self) -> Result<BookmarkNode>;

    /// Create a node under `parent_id` at `index` (clamped; `None` appends).
    fn create(
        &mut self,
        parent_id: &str,
        title: &str,
        url: Option<&str>,
        index: Option<usize>,
    ) -> Result<String>;

    /// Remove a node and its descendants.
    fn remove(&mut self, id: &str) -> Result<Vec<BookmarkRecord>>;

    /// Move a node to a new parent and/or index.
    fn move_node(
        &mut self,
        id: &str,
        parent_id: Option<&str>,
        index: Option<usize>,
    ) -> Result<Vec<BookmarkRecord>>;

    /// Change a node's title and/or URL.
    fn update(&mut self, id: &str, title: Option<&str>, url: Option<&str>)
        -> Result<Vec<BookmarkRecord>>;

    /// Direct children of a folder.
    fn children(&self, parent_id: &str) -> Result<Vec<BookmarkNode>>;

    /// Persist pending edits. No-op for stores that write through.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Flattened records of the whole tree.
    fn records(&self) -> Result<Vec<BookmarkRecord>> {
        Ok(flatten(&self.snapshot()?))
    }

    /// Records whose title or URL contains `query` (case-insensitive).
    fn search(&self, query: &str) -> Result<Vec<BookmarkRecord>> {
        let needle = query.to_lowercase();
        Ok(self
            .records()?
            .into_iter()
            .filter(|r| {
                r.title.to_lowercase().contains(&needle)
                    || r.url_or_empty().to_lowercase().contains(&needle)
            })
            .collect())
    }

    /// ID of the folder at `path` (folder titles from the root).
    fn find_folder(&self, path: &[String]) -> Result<Option<String>> {
        let root = self.snapshot()?;
        let mut current = &root;
        for segment in path {
            match current
                .children()
                .iter()
                .find(|c| c.children.is_some() && &c.title == segment)
            {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current.id.clone()))
    }

    /// ID of the node under `path` with this title and URL (`None` for a folder).
    fn find(&self, path: &[String], title: &str, url: Option<&str>) -> Result<Option<String>> {
        let Some(parent_id) = self.find_folder(path)? else {
            return Ok(None);
        };
        let url = url.unwrap_or("");
        Ok(self
            .children(&parent_id)?
            .into_iter()
            .find(|c| c.title == title && c.url.as_deref().unwrap_or("") == url)
            .map(|c| c.id))
    }
}

/// Tree kept in memory and saved as JSON.
#[derive(Debug, Clone)]
pub struct FileTree {
    root: BookmarkNode,
    path: Option<PathBuf>,
    dirty: bool,
    last_written: Option<SystemTime>,
}

impl FileTree {
    /// Load the tree file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] if the file does not exist and
    /// [`Error::InvalidTree`] if the root is not a folder.
    pub fn open(path: &Path) -> Result<Self> {
        let mut root: BookmarkNode = read_json(path)?.ok_or(Error::NotInitialized)?;
        if root.children.is_none() {
            return Err(Error::InvalidTree(format!(
                "root of {} is not a folder",
                path.display()
            )));
        }
        root.id = ROOT_ID.to_string();
        Ok(Self {
            root,
            path: Some(path.to_path_buf()),
            dirty: false,
            last_written: None,
        })
    }

    /// Create a new tree file with an empty root.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn create_file(path: &Path) -> Result<Self> {
        let mut tree = Self {
            root: BookmarkNode::new_root(),
            path: Some(path.to_path_buf()),
            dirty: true,
            last_written: None,
        };
        tree.flush()?;
        Ok(tree)
    }

    /// Tree that is never written anywhere.
    #[must_use]
    pub fn in_memory(root: BookmarkNode) -> Self {
        Self {
            root,
            path: None,
            dirty: false,
            last_written: None,
        }
    }

    /// Backing file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Modification time of the file as left by our own last write.
    #[must_use]
    pub fn last_written(&self) -> Option<SystemTime> {
        self.last_written
    }

    /// Root node.
    #[must_use]
    pub fn root(&self) -> &BookmarkNode {
        &self.root
    }

    /// Child-index path from the root to the node with `id`.
    fn locate(&self, id: &str) -> Option<Vec<usize>> {
        if self.root.id == id {
            return Some(Vec::new());
        }
        let mut stack: Vec<(&BookmarkNode, Vec<usize>)> = vec![(&self.root, Vec::new())];
        while let Some((node, trail)) = stack.pop() {
            for (i, child) in node.children().iter().enumerate() {
                let mut child_trail = trail.clone();
                child_trail.push(i);
                if child.id == id {
                    return Some(child_trail);
                }
                if child.children.is_some() {
                    stack.push((child, child_trail));
                }
            }
        }
        None
    }

    fn locate_or_err(&self, id: &str) -> Result<Vec<usize>> {
        self.locate(id)
            .ok_or_else(|| Error::NodeNotFound { id: id.to_string() })
    }

    fn node_at(&self, trail: &[usize]) -> &BookmarkNode {
        let mut node = &self.root;
        for &i in trail {
            node = &node.children()[i];
        }
        node
    }

    fn node_at_mut(&mut self, trail: &[usize]) -> Result<&mut BookmarkNode> {
        let mut node = &mut self.root;
        for &i in trail {
            node = node
                .children
                .as_mut()
                .and_then(|c| c.get_mut(i))
                .ok_or_else(|| Error::InvalidTree("stale node location".to_string()))?;
        }
        Ok(node)
    }

    /// Ancestor titles and sibling index of the node at `trail`.
    fn location(&self, trail: &[usize]) -> (Vec<String>, u32) {
        let mut path = Vec::new();
        let mut node = &self.root;
        for &i in &trail[..trail.len().saturating_sub(1)] {
            node = &node.children()[i];
            path.push(node.title.clone());
        }
        (path, trail.last().map_or(0, |&i| index_of(i)))
    }

    /// The node at `trail` and its descendants, as records.
    fn subtree_records(&self, trail: &[usize]) -> Vec<BookmarkRecord> {
        let node = self.node_at(trail);
        let (path, index) = self.location(trail);
        let record = node.to_record(path, index);
        let child_path = record.child_path();
        let mut out = vec![record];
        out.extend(flatten_children(node, &child_path));
        out
    }

    fn folder_children_mut(&mut self, id: &str) -> Result<&mut Vec<BookmarkNode>> {
        let trail = self.locate_or_err(id)?;
        let node = self.node_at_mut(&trail)?;
        let title = node.title.clone();
        node.children.as_mut().ok_or(Error::FolderNotFound { path: title })
    }

    fn detach(&mut self, trail: &[usize]) -> Result<BookmarkNode> {
        let Some((&last, parent_trail)) = trail.split_last() else {
            return Err(Error::InvalidArgument("cannot detach the root folder".to_string()));
        };
        let parent = self.node_at_mut(parent_trail)?;
        let children = parent
            .children
            .as_mut()
            .ok_or_else(|| Error::InvalidTree("parent is not a folder".to_string()))?;
        let node = children.remove(last);
        self.dirty = true;
        Ok(node)
    }

    fn collect_ids(node: &BookmarkNode, ids: &mut HashSet<String>) {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            ids.insert(current.id.clone());
            stack.extend(current.children());
        }
    }
}

impl TreeStore for FileTree {
    fn snapshot(&self) -> Result<BookmarkNode> {
        Ok(self.root.clone())
    }

    fn create(
        &mut self,
        parent_id: &str,
        title: &str,
        url: Option<&str>,
        index: Option<usize>,
    ) -> Result<String> {
        let node = match url.filter(|u| !u.is_empty()) {
            Some(url) => BookmarkNode::new_bookmark(title, url),
            None => BookmarkNode::new_folder(title),
        };
        let id = node.id.clone();

        let children = self.folder_children_mut(parent_id)?;
        let at = index.unwrap_or(children.len()).min(children.len());
        children.insert(at, node);
        self.dirty = true;

        debug!(id = %id, parent = parent_id, index = at, "Created node");
        Ok(id)
    }

    fn remove(&mut self, id: &str) -> Result<Vec<BookmarkRecord>> {
        let trail = self.locate_or_err(id)?;
        let removed = self.subtree_records(&trail);
        self.detach(&trail)?;
        debug!(id, count = removed.len(), "Removed node");
        Ok(removed)
    }

    fn move_node(
        &mut self,
        id: &str,
        parent_id: Option<&str>,
        index: Option<usize>,
    ) -> Result<Vec<BookmarkRecord>> {
        let trail = self.locate_or_err(id)?;
        let Some((_, current_parent)) = trail.split_last() else {
            return Err(Error::InvalidArgument("cannot move the root folder".to_string()));
        };
        let target_id = match parent_id {
            Some(target) => target.to_string(),
            None => self.node_at(current_parent).id.clone(),
        };

        let mut subtree_ids = HashSet::new();
        Self::collect_ids(self.node_at(&trail), &mut subtree_ids);
        if subtree_ids.contains(&target_id) {
            return Err(Error::InvalidArgument(
                "cannot move a folder into itself".to_string(),
            ));
        }
        // Resolve the target before detaching so a bad parent leaves the tree intact.
        self.folder_children_mut(&target_id)?;

        let before = self.subtree_records(&trail);
        let node = self.detach(&trail)?;
        let children = self.folder_children_mut(&target_id)?;
        let at = index.unwrap_or(children.len()).min(children.len());
        children.insert(at, node);

        debug!(id, parent = %target_id, index = at, "Moved node");
        Ok(before)
    }

    fn update(
        &mut self,
        id: &str,
        title: Option<&str>,
        url: Option<&str>,
    ) -> Result<Vec<BookmarkRecord>> {
        let trail = self.locate_or_err(id)?;
        if trail.is_empty() {
            return Err(Error::InvalidArgument("cannot edit the root folder".to_string()));
        }
        let before = self.subtree_records(&trail);
        let node = self.node_at_mut(&trail)?;

        if let Some(url) = url {
            if node.is_folder() || url.is_empty() {
                return Err(Error::InvalidArgument(
                    "url can only be changed on bookmarks, and cannot be empty".to_string(),
                ));
            }
            node.url = Some(url.to_string());
        }
        if let Some(title) = title {
            node.title = title.to_string();
        }
        self.dirty = true;
        Ok(before)
    }

    fn children(&self, parent_id: &str) -> Result<Vec<BookmarkNode>> {
        let trail = self.locate_or_err(parent_id)?;
        let node = self.node_at(&trail);
        match &node.children {
            Some(children) => Ok(children.clone()),
            None => Err(Error::FolderNotFound {
                path: node.title.clone(),
            }),
        }
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(path) = &self.path {
            write_json(path, &self.root)?;
            self.last_written = modified_time(path);
            debug!(path = %path.display(), "Saved bookmark tree");
        }
        self.dirty = false;
        Ok(())
    }
}
