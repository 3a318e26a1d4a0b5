//! Pending command implementations.
//!
//! A plan is pending when a sync was cancelled at confirmation, or when it
//! finished with conflicts nobody decided yet.

use crate::cli::commands::sync::print_plan;
use crate::cli::commands::{format_millis, print_json, Context};
use crate::cli::PendingCommands;
use crate::error::Result;
use crate::storage::SqliteStorage;

/// Execute pending commands.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or written.
pub fn execute(ctx: &Context, command: &PendingCommands) -> Result<()> {
    let mut storage = ctx.open_storage()?;
    match command {
        PendingCommands::Show => show(ctx, &storage),
        PendingCommands::Clear => clear(ctx, &mut storage),
    }
}

fn show(ctx: &Context, storage: &SqliteStorage) -> Result<()> {
    let pending = storage.load_pending()?;

    if ctx.json {
        return print_json(&pending);
    }
    match pending {
        None => println!("Nothing pending."),
        Some(p) => {
            println!("Pending since {}", format_millis(p.created_at));
            println!();
            print_plan(&p.plan);
        }
    }
    Ok(())
}

fn clear(ctx: &Context, storage: &mut SqliteStorage) -> Result<()> {
    let had = storage.load_pending()?.is_some();
    if crate::is_dry_run() {
        println!("Would clear pending plan: {had}");
        return Ok(());
    }
    if had {
        storage.set_pending(None, &ctx.actor)?;
    }

    if ctx.json {
        print_json(&serde_json::json!({ "cleared": had }))
    } else {
        println!("{}", if had { "Pending plan cleared." } else { "Nothing pending." });
        Ok(())
    }
}
