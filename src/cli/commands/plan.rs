//! Plan command: run the sync computation over states read from a file.
//!
//! Pure: reads one JSON file, prints the plan, touches nothing else.

use std::path::Path;

use crate::cli::commands::sync::print_plan;
use crate::cli::commands::{print_json, Context};
use crate::error::{Error, Result};
use crate::storage::file::read_json;
use crate::sync::{SyncInputs, SyncOptions, SyncPlan};

/// Compute the plan for the states in `inputs`.
///
/// # Errors
///
/// Returns an error if the file is missing or is not a valid inputs object.
pub fn compute(inputs: &Path, strict: bool) -> Result<SyncPlan> {
    let inputs: SyncInputs = read_json(inputs)?.ok_or_else(|| {
        Error::InvalidArgument(format!("inputs file not found: {}", inputs.display()))
    })?;
    let options = if strict {
        SyncOptions::strict()
    } else {
        SyncOptions::default()
    };
    Ok(inputs.plan(&options))
}

/// Execute the plan command.
///
/// # Errors
///
/// Same as [`compute`].
pub fn execute(ctx: &Context, inputs: &Path, strict: bool) -> Result<()> {
    let plan = compute(inputs, strict)?;
    if ctx.json {
        return print_json(&plan);
    }
    if plan.is_converged() {
        println!("Nothing to do.");
    } else {
        print_plan(&plan);
    }
    println!("Target state: {} record(s)", plan.new_state.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_absent_states_read_as_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inputs.json");
        std::fs::write(
            &path,
            r#"{"oldRemoteState": null,
                "currentLocalState": [{"title":"A","url":"https://a.example","path":[],"index":0}]}"#,
        )
        .unwrap();

        let plan = compute(&path, false).unwrap();
        assert!(plan.local_changes.is_empty());
        assert_eq!(plan.remote_changes.insertions.len(), 1);
    }

    #[test]
    fn test_missing_file_is_invalid_argument() {
        let dir = TempDir::new().unwrap();
        let err = compute(&dir.path().join("nope.json"), false).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
