//! Bookmark command implementations: edit the local tree.
//!
//! Every edit that makes an identity vanish (remove, move to another
//! folder, rename) records tombstones for it, so the next sync propagates
//! the edit instead of pulling the old record back from the remote. The
//! stored tree snapshot moves forward with each edit.

use colored::Colorize;
use serde::Serialize;

use crate::cli::commands::{print_json, Context};
use crate::cli::{split_path, BookmarkCommands};
use crate::error::{Error, Result};
use crate::model::BookmarkRecord;
use crate::storage::{FileTree, TreeStore};
use crate::sync::{merge_tombstones, vanished_tombstones};

#[derive(Serialize)]
struct EditOutput<'a> {
    action: &'a str,
    node: String,
    tombstones: usize,
    dry_run: bool,
}

/// Execute bookmark commands.
///
/// # Errors
///
/// Returns an error if the tree or database cannot be opened, a node or
/// folder does not exist, or an argument is invalid.
pub fn execute(ctx: &Context, command: &BookmarkCommands) -> Result<()> {
    match command {
        BookmarkCommands::List { folder } => list(ctx, folder.as_deref()),
        BookmarkCommands::Search { query } => search(ctx, query),
        BookmarkCommands::Add {
            folder,
            title,
            url,
            index,
        } => edit(ctx, "add", |tree| {
            let parent = folder_id(&*tree, folder)?;
            tree.create(&parent, title, Some(url), *index)?;
            Ok(join(folder, title))
        }),
        BookmarkCommands::Mkdir { folder, title, index } => edit(ctx, "mkdir", |tree| {
            let parent = folder_id(&*tree, folder)?;
            tree.create(&parent, title, None, *index)?;
            Ok(join(folder, title))
        }),
        BookmarkCommands::Rm { path } => edit(ctx, "rm", |tree| {
            let id = node_id(&*tree, path)?;
            let removed = tree.remove(&id)?;
            Ok(format!("{path} ({} node(s))", removed.len()))
        }),
        BookmarkCommands::Mv { path, to, index } => edit(ctx, "mv", |tree| {
            let id = node_id(&*tree, path)?;
            let parent = to.as_deref().map(|f| folder_id(&*tree, f)).transpose()?;
            tree.move_node(&id, parent.as_deref(), *index)?;
            Ok(match to {
                Some(folder) => format!("{path} -> {folder}"),
                None => path.clone(),
            })
        }),
        BookmarkCommands::Rename { path, title, url } => edit(ctx, "rename", |tree| {
            if title.is_none() && url.is_none() {
                return Err(Error::InvalidArgument("nothing to change: pass --title and/or --url".into()));
            }
            let id = node_id(&*tree, path)?;
            tree.update(&id, title.as_deref(), url.as_deref())?;
            Ok(path.clone())
        }),
    }
}

/// Run an edit against the tree, persist it and tombstone vanished identities.
fn edit(ctx: &Context, action: &str, change: impl FnOnce(&mut FileTree) -> Result<String>) -> Result<()> {
    let settings = ctx.settings()?;
    let mut storage = ctx.open_storage()?;
    let mut tree = ctx.open_tree(&settings)?;

    let before = tree.records()?;
    let node = change(&mut tree)?;
    let after = tree.records()?;
    let mut tombstones = vanished_tombstones(&before, &after);
    if let Some(previous) = storage.load_local_snapshot()? {
        tombstones = merge_tombstones(&vanished_tombstones(&previous, &after), &tombstones);
    }
    let dry_run = crate::is_dry_run();

    if !dry_run {
        tree.flush()?;
        storage.observe_local(&after, &tombstones, &ctx.actor)?;
    }

    if ctx.json {
        return print_json(&EditOutput {
            action,
            node,
            tombstones: tombstones.len(),
            dry_run,
        });
    }
    let verb = if dry_run { "Would" } else { "Done:" };
    println!("{verb} {action} {node}");
    if !tombstones.is_empty() {
        println!("  {} identit(ies) marked deleted for sync", tombstones.len());
    }
    Ok(())
}

fn list(ctx: &Context, folder: Option<&str>) -> Result<()> {
    let settings = ctx.settings()?;
    let tree = ctx.open_tree(&settings)?;
    let prefix = folder.map(split_path).unwrap_or_default();
    let records: Vec<BookmarkRecord> = tree
        .records()?
        .into_iter()
        .filter(|r| r.path.starts_with(&prefix))
        .collect();

    if ctx.json {
        return print_json(&records);
    }
    if records.is_empty() {
        println!("No bookmarks.");
    }
    for record in &records {
        let indent = "  ".repeat(record.path.len() - prefix.len());
        match &record.url {
            Some(url) => println!("{indent}{} {}", record.title, url.dimmed()),
            None => println!("{indent}{}", format!("{}/", record.title).bold()),
        }
    }
    Ok(())
}

fn search(ctx: &Context, query: &str) -> Result<()> {
    let settings = ctx.settings()?;
    let tree = ctx.open_tree(&settings)?;
    let hits = tree.search(query)?;

    if ctx.json {
        return print_json(&hits);
    }
    if hits.is_empty() {
        println!("No matches for '{query}'.");
    }
    for hit in &hits {
        println!("{} {}", hit.display_path(), hit.url_or_empty().dimmed());
    }
    Ok(())
}

fn join(folder: &str, title: &str) -> String {
    let mut segments = split_path(folder);
    segments.push(title.to_string());
    segments.join("/")
}

fn folder_id<T: TreeStore + ?Sized>(tree: &T, folder: &str) -> Result<String> {
    tree.find_folder(&split_path(folder))?
        .ok_or_else(|| Error::FolderNotFound {
            path: folder.to_string(),
        })
}

/// ID of the node at a slash-separated path. The last segment is the title.
fn node_id<T: TreeStore + ?Sized>(tree: &T, path: &str) -> Result<String> {
    let mut segments = split_path(path);
    let Some(title) = segments.pop() else {
        return Err(Error::InvalidArgument("the root cannot be edited".into()));
    };
    let not_found = || Error::BookmarkNotFound { path: path.to_string() };

    let parent = tree.find_folder(&segments)?.ok_or_else(not_found)?;
    let mut matches = tree
        .children(&parent)?
        .into_iter()
        .filter(|c| c.title == title);
    let first = matches.next().ok_or_else(not_found)?;
    if matches.next().is_some() {
        return Err(Error::InvalidArgument(format!(
            "'{path}' matches more than one node; rename one of them first"
        )));
    }
    Ok(first.id)
}
