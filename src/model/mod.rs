//! Data model for bookmark sync.
//!
//! - [`record`] - flat bookmark/folder/tombstone records and structural identity
//! - [`tree`] - nested tree nodes as the local store holds them

pub mod record;
pub mod tree;

pub use record::{
    active, dedupe, differing_attribute, differing_attributes, exact_equal, loose_equal,
    partial_match, tombstones, Attribute, BookmarkRecord, IdentityKey,
};
pub use tree::{flatten, flatten_children, index_of, BookmarkNode, ROOT_ID};
