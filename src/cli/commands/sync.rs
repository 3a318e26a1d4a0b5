//! Sync command: one cycle against the configured remote document.
//!
//! Confirmation policy:
//! - `--yes`, or `confirm` unset in settings: apply without asking
//! - interactive terminal: show the plan and ask
//! - otherwise: cancel and keep the plan pending
//!
//! `--prefer` resolves every conflict in favor of one side before applying.
//! Conflicts left pending make the command exit with the pending-conflicts code.

use std::io::{BufRead, IsTerminal, Write};

use colored::Colorize;
use tracing::debug;

use crate::cli::commands::{print_json, Context};
use crate::cli::SyncArgs;
use crate::error::{Error, Result};
use crate::remote::RemoteClient;
use crate::sync::{
    Changes, Choice, CycleOutcome, CycleReport, Decision, SyncCycle, SyncOptions, SyncPlan,
};

/// Execute the sync command.
///
/// # Errors
///
/// Returns an error if settings are invalid, the remote cannot be read or
/// written, or local storage fails.
pub fn execute(ctx: &Context, args: &SyncArgs) -> Result<()> {
    let settings = ctx.settings()?;
    let valid = settings.validate()?;
    let mut storage = ctx.open_storage()?;
    let mut tree = ctx.open_tree(&settings)?;
    let client = RemoteClient::from_settings(&valid)?;

    let options = if args.strict {
        SyncOptions::strict()
    } else {
        SyncOptions::default()
    };
    let ask = valid.confirm && !args.yes;
    let interactive = !ctx.json && std::io::stdin().is_terminal();
    let prefer = args.prefer.map(Choice::from);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))?;

    let report = rt.block_on(
        SyncCycle::new(&client, &mut tree, &mut storage, ctx.actor.clone())
            .with_options(options)
            .dry_run(crate::is_dry_run())
            .run(|plan| decide(plan, ask, interactive, prefer)),
    )?;

    if ctx.json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }

    let unresolved = report.plan.conflicts.len();
    match report.outcome {
        CycleOutcome::Conflicts | CycleOutcome::Cancelled if unresolved > 0 => {
            Err(Error::PendingConflicts { count: unresolved })
        }
        _ => Ok(()),
    }
}

/// Turn the confirmation policy into a decision for `plan`.
fn decide(plan: &SyncPlan, ask: bool, interactive: bool, prefer: Option<Choice>) -> Result<Decision> {
    let preferred = |choice: Choice| Decision::Resolve(plan.choose_all(choice));

    if !ask {
        return Ok(match prefer {
            Some(choice) if !plan.conflicts.is_empty() => preferred(choice),
            _ => Decision::Accept,
        });
    }
    if !interactive {
        debug!("Confirmation required but no terminal; keeping plan pending");
        return Ok(Decision::Cancel);
    }

    print_plan(plan);
    let prompt = if plan.conflicts.is_empty() {
        "Apply these changes? [y/N] "
    } else {
        "Apply? [y]es (keep conflicts pending) / [l]ocal wins / [r]emote wins / [N]o: "
    };
    let answer = prompt_line(prompt)?;
    Ok(match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => match prefer {
            Some(choice) if !plan.conflicts.is_empty() => preferred(choice),
            _ => Decision::Accept,
        },
        "l" | "local" if !plan.conflicts.is_empty() => preferred(Choice::Local),
        "r" | "remote" if !plan.conflicts.is_empty() => preferred(Choice::Remote),
        _ => Decision::Cancel,
    })
}

fn prompt_line(prompt: &str) -> Result<String> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{prompt}")?;
    stdout.flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

pub(crate) fn print_plan(plan: &SyncPlan) {
    print_changes("Local", &plan.local_changes);
    print_changes("Remote", &plan.remote_changes);
    if !plan.conflicts.is_empty() {
        println!("{}", "Conflicts".red().bold());
        for (i, conflict) in plan.conflicts.iter().enumerate() {
            println!("  #{i} {} {}", conflict.conflict_type.to_string().red(), conflict.label());
            if let Some(local) = &conflict.local_version {
                println!("       local:  {}", describe(local));
            }
            if let Some(remote) = &conflict.remote_version {
                println!("       remote: {}", describe(remote));
            }
        }
    }
}

fn describe(record: &crate::model::BookmarkRecord) -> String {
    if record.deleted {
        return "(deleted)".to_string();
    }
    match &record.url {
        Some(url) => format!("{} <{url}>", record.display_path()),
        None => format!("{}/", record.display_path()),
    }
}

fn print_changes(side: &str, changes: &Changes) {
    if changes.is_empty() {
        return;
    }
    println!("{}", format!("{side} changes").cyan().bold());
    for record in &changes.insertions {
        println!("  {} {}", "+".green(), describe(record));
    }
    for record in &changes.deletions {
        println!("  {} {}", "-".red(), describe(record));
    }
    for update in &changes.updates {
        println!(
            "  {} {} ({} {} -> {})",
            "~".yellow(),
            update.new.display_path(),
            update.changed_attribute.as_str(),
            update.old.index,
            update.new.index
        );
    }
}

fn print_report(report: &CycleReport) {
    if report.outcome == CycleOutcome::DryRun {
        println!("{}", "Dry run: nothing written".dimmed());
        print_plan(&report.plan);
    }
    let headline = match report.outcome {
        CycleOutcome::UpToDate => "Up to date".green(),
        CycleOutcome::Synced => "Synced".green(),
        CycleOutcome::Conflicts => "Synced with conflicts".yellow(),
        CycleOutcome::Cancelled => "Cancelled".yellow(),
        CycleOutcome::DryRun => "Plan".cyan(),
    };
    println!("{headline}: {}", report.status);
    if let Some(applied) = &report.applied {
        for failure in &applied.failed {
            println!("  {} {} ({})", "!".red(), failure.record, failure.reason);
        }
    }
}
