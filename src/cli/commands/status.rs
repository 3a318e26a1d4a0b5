//! Status command implementation.

use crate::cli::commands::{format_millis, print_json, show_path, Context};
use crate::error::Result;
use crate::model::{active, BookmarkRecord};
use crate::storage::{StatusMessage, SyncRun, TreeStore};
use crate::sync::{has_changed, state_fingerprint};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

/// Output for status command.
#[derive(Serialize)]
struct StatusOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    last_status: Option<StatusMessage>,
    configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    config_problem: Option<String>,
    tree_path: Option<PathBuf>,
    local_records: usize,
    baseline_records: usize,
    tombstones: usize,
    /// Local state differs from the last synced baseline.
    local_changed: bool,
    pending_conflicts: usize,
    recent_runs: Vec<SyncRun>,
}

/// Execute status command.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or read.
pub fn execute(ctx: &Context) -> Result<()> {
    let storage = ctx.open_storage()?;
    let settings = ctx.settings()?;
    let config_problem = settings.validate().err().map(|e| e.to_string());

    let tree_path = ctx.tree_path(&settings).ok();
    let tree_records = match ctx.open_tree(&settings) {
        Ok(tree) => tree.records()?,
        Err(_) => Vec::new(),
    };

    let baseline = storage.load_baseline()?;
    let tombstones = storage.list_tombstones()?;
    let live = |records: &[BookmarkRecord]| active(records).cloned().collect::<Vec<_>>();
    let baseline_hash = state_fingerprint(&live(&baseline));
    let local_changed = has_changed(&state_fingerprint(&live(&tree_records)), Some(baseline_hash.as_str()));

    let output = StatusOutput {
        last_status: storage.load_status()?,
        configured: config_problem.is_none(),
        config_problem,
        tree_path,
        local_records: active(&tree_records).count(),
        baseline_records: active(&baseline).count(),
        tombstones: tombstones.len(),
        local_changed,
        pending_conflicts: storage.load_pending()?.map_or(0, |p| p.plan.conflicts.len()),
        recent_runs: storage.recent_sync_runs(5)?,
    };

    if ctx.json {
        return print_json(&output);
    }

    println!("marksync status");
    println!("===============");
    println!();
    match &output.last_status {
        Some(status) if status.ok => {
            println!("Last sync: {} ({})", status.message.green(), format_millis(status.at));
        }
        Some(status) => println!("Last sync: {} ({})", status.message.red(), format_millis(status.at)),
        None => println!("Last sync: {}", "never".dimmed()),
    }
    if let Some(problem) = &output.config_problem {
        println!("Settings:  {} {problem}", "not ready:".yellow());
    }
    println!();
    println!("Tree:      {}", show_path(output.tree_path.as_deref()));
    println!("  Records:    {}", output.local_records);
    println!("  Baseline:   {}", output.baseline_records);
    println!("  Tombstones: {}", output.tombstones);
    if output.local_changed {
        println!("  {}", "Local changes not yet synced".yellow());
    }
    if output.pending_conflicts > 0 {
        println!(
            "  {}",
            format!("{} conflict(s) pending (marksync pending show)", output.pending_conflicts).red()
        );
    }

    if !output.recent_runs.is_empty() {
        println!();
        println!("Recent runs:");
        for run in &output.recent_runs {
            println!(
                "  {}  {:<11} local {:>3}  remote {:>3}  conflicts {}",
                format_millis(run.started_at),
                run.outcome,
                run.local_changes,
                run.remote_changes,
                run.conflicts
            );
        }
    }

    Ok(())
}
