//! Watch command: keep syncing until interrupted.
//!
//! The tree file is polled for modification; an edit arms the debounce,
//! and the configured interval forces a cycle even without edits. The
//! tree modification produced by a cycle's own writes is ignored.
//! Conflicts are never decided here; they stay pending for `marksync sync`.

use std::path::Path;
use std::time::{Duration, Instant};

use colored::Colorize;
use tracing::{info, warn};

use crate::cli::commands::{format_millis, print_json, Context};
use crate::error::{Error, Result};
use crate::remote::RemoteClient;
use crate::storage::file::modified_time;
use crate::storage::{FileTree, SqliteStorage};
use crate::sync::{CycleReport, Decision, SyncCoordinator, SyncCycle, SyncOptions};

/// How often the tree file is checked for edits.
const POLL: Duration = Duration::from_secs(1);

/// Execute the watch command.
///
/// # Errors
///
/// Returns an error if settings are invalid or marksync is not initialized.
/// Failures inside a cycle are logged and retried on the next one.
pub fn execute(ctx: &Context, strict: bool, debounce_secs: u64) -> Result<()> {
    let settings = ctx.settings()?;
    let valid = settings.validate()?;
    let mut storage = ctx.open_storage()?;
    let tree_path = ctx.tree_path(&settings)?;
    if !tree_path.exists() {
        return Err(Error::NotInitialized);
    }
    let client = RemoteClient::from_settings(&valid)?;
    let options = if strict {
        SyncOptions::strict()
    } else {
        SyncOptions::default()
    };
    let coordinator = SyncCoordinator::new(Duration::from_secs(debounce_secs), valid.interval, Instant::now());

    if !ctx.json {
        println!(
            "Watching {} (every {}s, Ctrl-C to stop)",
            tree_path.display(),
            valid.interval.as_secs()
        );
    }

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))?;
    rt.block_on(watch_loop(ctx, &client, &mut storage, &tree_path, options, coordinator))
}

async fn watch_loop(
    ctx: &Context,
    client: &RemoteClient,
    storage: &mut SqliteStorage,
    tree_path: &Path,
    options: SyncOptions,
    mut coordinator: SyncCoordinator,
) -> Result<()> {
    let mut last_seen = modified_time(tree_path);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        if coordinator.tick(Instant::now()) {
            match run_cycle(ctx, client, storage, tree_path, options).await {
                Ok(report) => print_cycle(ctx, &report)?,
                Err(Error::NotInitialized) => return Err(Error::NotInitialized),
                Err(e) => {
                    warn!(error = %e, "Sync cycle failed; retrying later");
                    if !ctx.json {
                        println!("{} {e}", "!".red());
                    }
                }
            }
            if let Some(mtime) = modified_time(tree_path) {
                coordinator.suppress_until(mtime);
                last_seen = Some(mtime);
            }
            coordinator.finish(Instant::now());
            continue;
        }

        let wait = coordinator.next_wakeup(Instant::now()).min(POLL);
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Watch stopped");
                return Ok(());
            }
            () = tokio::time::sleep(wait) => {}
        }

        let current = modified_time(tree_path);
        if current != last_seen {
            if let Some(mtime) = current {
                if coordinator.observe_change(mtime, Instant::now()) {
                    info!("Local edit detected");
                }
            }
            last_seen = current;
        }
    }
}

async fn run_cycle(
    ctx: &Context,
    client: &RemoteClient,
    storage: &mut SqliteStorage,
    tree_path: &Path,
    options: SyncOptions,
) -> Result<CycleReport> {
    let mut tree = FileTree::open(tree_path)?;
    SyncCycle::new(client, &mut tree, storage, ctx.actor.clone())
        .with_options(options)
        .dry_run(crate::is_dry_run())
        .run(|_| Ok(Decision::Accept))
        .await
}

fn print_cycle(ctx: &Context, report: &CycleReport) -> Result<()> {
    if ctx.json {
        return print_json(report);
    }
    let now = format_millis(chrono::Utc::now().timestamp_millis());
    println!("[{now}] {}: {}", report.outcome.as_str(), report.status);
    Ok(())
}
