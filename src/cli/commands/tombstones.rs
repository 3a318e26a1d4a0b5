//! Tombstone command implementations.

use crate::cli::commands::{format_millis, print_json, Context};
use crate::cli::TombstoneCommands;
use crate::error::Result;

/// Execute tombstone commands.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or written.
pub fn execute(ctx: &Context, command: &TombstoneCommands) -> Result<()> {
    let mut storage = ctx.open_storage()?;

    match command {
        TombstoneCommands::List => {
            let tombstones = storage.list_tombstones()?;
            if ctx.json {
                return print_json(&tombstones);
            }
            if tombstones.is_empty() {
                println!("No tombstones.");
            }
            for t in &tombstones {
                let when = t.deleted_at.map_or_else(|| "-".to_string(), format_millis);
                println!("{when}  {}", t.display_path());
            }
            Ok(())
        }
        TombstoneCommands::Clear => {
            if crate::is_dry_run() {
                let count = storage.list_tombstones()?.len();
                println!("Would forget {count} tombstone(s)");
                return Ok(());
            }
            let removed = storage.clear_tombstones(&ctx.actor)?;
            if ctx.json {
                print_json(&serde_json::json!({ "removed": removed }))
            } else {
                println!("Forgot {removed} tombstone(s).");
                Ok(())
            }
        }
    }
}
