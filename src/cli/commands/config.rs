//! Config command implementations.

use crate::cli::commands::{print_json, Context};
use crate::cli::ConfigCommands;
use crate::config::Settings;
use crate::error::Result;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct ShowOutput {
    path: PathBuf,
    settings: Settings,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    problem: Option<String>,
}

#[derive(Serialize)]
struct ValidateOutput {
    valid: bool,
    url: String,
    interval_secs: u64,
    confirm: bool,
}

/// Execute config commands.
///
/// # Errors
///
/// Returns an error if the settings file cannot be read or written, a key
/// is unknown, or (for `validate`) the settings are incomplete.
pub fn execute(ctx: &Context, command: &ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show => show(ctx),
        ConfigCommands::Set { key, value } => update(ctx, key, |s| s.set(key, value)),
        ConfigCommands::Unset { key } => update(ctx, key, |s| s.unset(key)),
        ConfigCommands::Validate => validate(ctx),
    }
}

fn show(ctx: &Context) -> Result<()> {
    let path = ctx.config_path()?;
    let settings = ctx.settings()?;
    let problem = settings.validate().err().map(|e| e.to_string());
    let shown = settings.redacted();

    if ctx.json {
        return print_json(&ShowOutput {
            path,
            settings: shown,
            valid: problem.is_none(),
            problem,
        });
    }

    println!("Settings: {}", path.display());
    let field = |name: &str, value: Option<String>| {
        println!("  {name:<10} {}", value.unwrap_or_else(|| "(unset)".dimmed().to_string()));
    };
    field("url", shown.url);
    field("username", shown.username);
    field("password", shown.password);
    field("interval", shown.interval.map(|i| format!("{i} min")));
    field("tree_path", shown.tree_path.map(|p| p.display().to_string()));
    field("confirm", shown.confirm.map(|c| c.to_string()));
    println!();
    match problem {
        None => println!("{}", "Ready to sync".green()),
        Some(p) => println!("{} {p}", "Not ready:".yellow()),
    }
    Ok(())
}

/// Load the file without env overrides, change it, save it back.
fn update(ctx: &Context, key: &str, change: impl FnOnce(&mut Settings) -> Result<()>) -> Result<()> {
    let path = ctx.config_path()?;
    let mut settings = Settings::load(&path)?;
    change(&mut settings)?;

    if crate::is_dry_run() {
        println!("Would update '{key}' in {}", path.display());
        return Ok(());
    }
    settings.save(&path)?;

    if ctx.json {
        print_json(&serde_json::json!({ "updated": key, "path": path }))
    } else {
        println!("Updated {key}");
        Ok(())
    }
}

fn validate(ctx: &Context) -> Result<()> {
    let valid = ctx.settings()?.validate()?;

    if ctx.json {
        print_json(&ValidateOutput {
            valid: true,
            url: valid.url,
            interval_secs: valid.interval.as_secs(),
            confirm: valid.confirm,
        })
    } else {
        println!("{} syncing {} every {}s", "OK".green(), valid.url, valid.interval.as_secs());
        Ok(())
    }
}
