//! Three-way bookmark synchronization.
//!
//! The core is pure: given the last state both sides agreed on (the
//! baseline), the current local state and the current remote state, it
//! computes a merged target state, the change-set that brings each side to
//! it, and the conflicts a user has to decide.
//!
//! - **Categorize**: per side, what happened to each baseline record
//! - **Merge**: combine both sides' outcomes into the target state
//! - **Guard**: revive folders that still hold live content
//! - **Plan**: diff the target against each side, hide conflicted items
//!
//! Around the core sit the parts that touch the world: [`apply`] writes a
//! change-set to a local tree, [`cycle`] runs fetch, plan, push, apply and
//! commit in order, and [`coordinator`] decides when the next cycle runs.
//!
//! # Example
//!
//! ```
//! use marksync::model::BookmarkRecord;
//! use marksync::sync::calc_sync_changes;
//!
//! let baseline = vec![BookmarkRecord::bookmark("A", "https://a.example", &[], 0)];
//! let local = baseline.clone();
//! let remote = vec![];
//!
//! let plan = calc_sync_changes(&baseline, &local, &remote);
//! assert_eq!(plan.local_changes.deletions.len(), 1);
//! ```

pub mod apply;
pub mod categorize;
pub mod coordinator;
pub mod cycle;
pub mod diff;
pub mod guard;
pub mod hash;
pub mod merge;
pub mod plan;
pub mod tombstones;
pub mod types;

pub use apply::{apply_changes, ApplyFailure, ApplyReport, Operation};
pub use categorize::{categorize_changes, Categorized, ChangeKind, SideChange};
pub use coordinator::{CoordinatorState, SyncCoordinator, DEFAULT_DEBOUNCE};
pub use cycle::{CycleOutcome, CycleReport, Decision, SyncCycle};
pub use diff::diff_states;
pub use guard::protect_folders_with_content;
pub use hash::{has_changed, state_fingerprint};
pub use merge::merge_states;
pub use plan::{calc_sync_changes, calc_sync_changes_with};
pub use tombstones::{local_state, merge_tombstones, next_local_tombstones, prune_revived, vanished_tombstones};
pub use types::{
    Changes, Choice, Conflict, ConflictChoice, ConflictType, MatchMode, MergeOutcome, PendingSync,
    SyncInputs, SyncOptions, SyncPlan, Update,
};
