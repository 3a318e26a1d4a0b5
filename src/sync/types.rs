//! Types shared by the merge engine, the orchestrator and the appliers.

use serde::{Deserialize, Serialize};

use crate::model::{partial_match, Attribute, BookmarkRecord};

/// How records are correlated between the baseline and a side's snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Identity ignores index; index drift is reconciled silently.
    #[default]
    IndexTolerant,
    /// Exact 4-attribute matching for "unchanged", 3-of-4 partial matching
    /// for "modified", with explicit conflict objects.
    Strict,
}

impl std::str::FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "index_tolerant" | "tolerant" => Ok(Self::IndexTolerant),
            "strict" => Ok(Self::Strict),
            _ => Err(format!("Unknown match mode: {s}")),
        }
    }
}

/// Options for one sync computation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    pub mode: MatchMode,
}

impl SyncOptions {
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            mode: MatchMode::Strict,
        }
    }
}

/// An in-place change to a record that keeps its loose identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Update {
    pub changed_attribute: Attribute,
    pub old: BookmarkRecord,
    pub new: BookmarkRecord,
}

/// Mutations that transform one state into another.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changes {
    pub insertions: Vec<BookmarkRecord>,
    pub deletions: Vec<BookmarkRecord>,
    pub updates: Vec<Update>,
}

impl Changes {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.insertions.is_empty() && self.deletions.is_empty() && self.updates.is_empty()
    }

    /// Total number of mutations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.insertions.len() + self.deletions.len() + self.updates.len()
    }

    /// Drop every mutation touching a record for which `exclude` is true.
    pub fn retain_unless(&mut self, exclude: impl Fn(&BookmarkRecord) -> bool) {
        self.insertions.retain(|r| !exclude(r));
        self.deletions.retain(|r| !exclude(r));
        self.updates.retain(|u| !exclude(&u.old) && !exclude(&u.new));
    }
}

/// Kind of a detected conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Both sides changed the same attribute to different values.
    EditConflict,
    /// One side deleted what the other side edited.
    DeleteVsEdit,
    /// Both sides added the same title/path with different URLs.
    AddConflict,
}

impl ConflictType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::EditConflict => "edit_conflict",
            Self::DeleteVsEdit => "delete_vs_edit",
            Self::AddConflict => "add_conflict",
        }
    }
}

impl std::fmt::Display for ConflictType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change that needs a user decision.
///
/// For `delete_vs_edit`, the deleting side's version is its tombstone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    #[serde(rename = "type")]
    pub conflict_type: ConflictType,
    /// Baseline record (absent for `add_conflict`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bookmark: Option<BookmarkRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_version: Option<BookmarkRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_version: Option<BookmarkRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<Attribute>,
}

impl Conflict {
    /// Every record this conflict was built from.
    pub fn versions(&self) -> impl Iterator<Item = &BookmarkRecord> {
        self.bookmark
            .iter()
            .chain(self.local_version.iter())
            .chain(self.remote_version.iter())
    }

    /// Whether `record` correlates with one of this conflict's versions.
    #[must_use]
    pub fn matches(&self, record: &BookmarkRecord) -> bool {
        self.versions().any(|v| partial_match(v, record))
    }

    /// Version chosen by `choice`.
    #[must_use]
    pub fn chosen(&self, choice: Choice) -> Option<&BookmarkRecord> {
        match choice {
            Choice::Local => self.local_version.as_ref(),
            Choice::Remote => self.remote_version.as_ref(),
        }
    }

    /// Short label for display.
    #[must_use]
    pub fn label(&self) -> String {
        self.versions()
            .next()
            .map_or_else(String::new, BookmarkRecord::display_path)
    }
}

/// Side picked when resolving a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Choice {
    Local,
    Remote,
}

impl std::str::FromStr for Choice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "l" | "mine" => Ok(Self::Local),
            "remote" | "r" | "theirs" => Ok(Self::Remote),
            _ => Err(format!("Unknown choice: {s} (expected local or remote)")),
        }
    }
}

/// A decision for the conflict at `conflict` (index into `SyncPlan::conflicts`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictChoice {
    pub conflict: usize,
    pub choice: Choice,
}

/// Output of the three-way merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    pub new_state: Vec<BookmarkRecord>,
    pub conflicts: Vec<Conflict>,
    /// Safety-fallback diagnostics.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Everything a sync cycle needs to converge both sides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPlan {
    pub local_changes: Changes,
    pub remote_changes: Changes,
    pub conflicts: Vec<Conflict>,
    pub new_state: Vec<BookmarkRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl SyncPlan {
    /// True when neither side needs changes and nothing is in conflict.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.local_changes.is_empty() && self.remote_changes.is_empty() && self.conflicts.is_empty()
    }
}

/// A plan held back for user confirmation, stored between invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSync {
    /// Unix milliseconds.
    pub created_at: i64,
    pub plan: SyncPlan,
}

/// The three states of a sync computation, as loaded from JSON.
///
/// Missing states read as empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncInputs {
    #[serde(default)]
    pub old_remote_state: Option<Vec<BookmarkRecord>>,
    #[serde(default)]
    pub current_local_state: Option<Vec<BookmarkRecord>>,
    #[serde(default)]
    pub current_remote_state: Option<Vec<BookmarkRecord>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changes_len_and_empty() {
        let mut changes = Changes::default();
        assert!(changes.is_empty());
        changes
            .insertions
            .push(BookmarkRecord::bookmark("A", "https://a", &[], 0));
        assert_eq!(changes.len(), 1);
        assert!(!changes.is_empty());
    }

    #[test]
    fn test_conflict_serializes_type_tag() {
        let base = BookmarkRecord::bookmark("A", "https://a", &[], 0);
        let conflict = Conflict {
            conflict_type: ConflictType::DeleteVsEdit,
            bookmark: Some(base.clone()),
            local_version: Some(base.make_tombstone_at(1)),
            remote_version: None,
            attribute: None,
        };
        let json = serde_json::to_value(&conflict).unwrap();
        assert_eq!(json["type"], "delete_vs_edit");
        assert!(json.get("remoteVersion").is_none());
    }

    #[test]
    fn test_choice_parsing() {
        assert_eq!("local".parse::<Choice>().unwrap(), Choice::Local);
        assert_eq!("Remote".parse::<Choice>().unwrap(), Choice::Remote);
        assert!("both".parse::<Choice>().is_err());
    }

    #[test]
    fn test_match_mode_default_is_index_tolerant() {
        assert_eq!(MatchMode::default(), MatchMode::IndexTolerant);
        assert_eq!("strict".parse::<MatchMode>().unwrap(), MatchMode::Strict);
    }

    #[test]
    fn test_inputs_missing_states_parse() {
        let inputs: SyncInputs = serde_json::from_str(r#"{"currentRemoteState": null}"#).unwrap();
        assert!(inputs.old_remote_state.is_none());
        assert!(inputs.current_remote_state.is_none());
    }
}
