//! End-to-end merge scenarios through the public API.

use marksync::model::{active, partial_match, tombstones, BookmarkRecord};
use marksync::sync::{
    calc_sync_changes, calc_sync_changes_with, categorize_changes, merge_states, ConflictType,
    MatchMode, SideChange, SyncOptions,
};

fn bm(title: &str, path: &[&str], index: u32) -> BookmarkRecord {
    BookmarkRecord::bookmark(title, format!("https://example.com/{title}"), path, index)
}

fn titles(records: &[BookmarkRecord]) -> Vec<&str> {
    let mut out: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
    out.sort_unstable();
    out
}

#[test]
fn remote_only_record_is_inserted_locally() {
    let x = bm("X", &["Bar"], 0);
    let plan = calc_sync_changes(&[], &[], &[x.clone()]);

    assert_eq!(plan.local_changes.insertions, vec![x]);
    assert!(plan.remote_changes.is_empty());
    assert!(plan.conflicts.is_empty());
}

#[test]
fn mutual_delete_is_already_converged() {
    let x = bm("X", &["Bar"], 0);
    let gone = x.make_tombstone_at(10);
    let plan = calc_sync_changes(&[x], &[gone.clone()], &[gone]);

    assert!(plan.local_changes.is_empty());
    assert!(plan.remote_changes.is_empty());
    assert!(plan.conflicts.is_empty());
}

#[test]
fn edit_against_delete_is_a_conflict_in_strict_mode() {
    let x = bm("X", &["Bar"], 0);
    let mut edited = x.clone();
    edited.title = "X-edited".into();
    let gone = x.make_tombstone_at(10);

    let plan = calc_sync_changes_with(&[x], &[edited], &[gone], &SyncOptions::strict());

    assert_eq!(plan.conflicts.len(), 1);
    assert_eq!(plan.conflicts[0].conflict_type, ConflictType::DeleteVsEdit);
}

#[test]
fn index_shift_never_blocks_a_delete() {
    let x = bm("X", &["Bar"], 0);
    let shifted = bm("X", &["Bar"], 1);
    let gone = x.make_tombstone_at(10);

    for mode in [MatchMode::IndexTolerant, MatchMode::Strict] {
        let plan = calc_sync_changes_with(
            &[x.clone()],
            &[shifted.clone()],
            &[gone.clone()],
            &SyncOptions { mode },
        );
        assert!(plan.conflicts.is_empty(), "{mode:?}");
        assert_eq!(plan.local_changes.deletions.len(), 1, "{mode:?}");
        assert_eq!(plan.local_changes.deletions[0].title, "X");
    }
}

#[test]
fn folder_with_new_content_survives_remote_delete() {
    let folder = BookmarkRecord::folder("F", &["Bar"], 0);
    let y = bm("Y", &["Bar", "F"], 0);

    let plan = calc_sync_changes(
        &[folder.clone()],
        &[folder.clone(), y.clone()],
        &[folder.make_tombstone_at(10)],
    );

    assert!(plan.conflicts.is_empty());
    assert!(plan.remote_changes.insertions.contains(&y));
    let f = plan.new_state.iter().find(|r| r.title == "F").unwrap();
    assert!(!f.deleted, "folder revived");
}

#[test]
fn bulk_delete_and_bulk_add_cross_over() {
    let baseline: Vec<BookmarkRecord> = (0..50).map(|i| bm(&format!("A{i}"), &["Bar"], i)).collect();

    let mut local: Vec<BookmarkRecord> = baseline[..25].iter().map(|r| r.make_tombstone_at(10)).collect();
    local.extend(
        baseline[25..]
            .iter()
            .enumerate()
            .map(|(i, r)| BookmarkRecord { index: u32::try_from(i).unwrap(), ..r.clone() }),
    );

    let mut remote = baseline.clone();
    remote.extend((50..60).map(|i| bm(&format!("A{i}"), &["Bar"], i)));

    let plan = calc_sync_changes(&baseline, &local, &remote);

    assert_eq!(plan.local_changes.insertions.len(), 10);
    assert_eq!(plan.remote_changes.deletions.len(), 25);
    assert!(plan.conflicts.is_empty());
}

fn sample_states() -> Vec<Vec<BookmarkRecord>> {
    let folder = BookmarkRecord::folder("Dev", &["Bar"], 0);
    let a = bm("A", &["Bar", "Dev"], 0);
    let b = bm("B", &["Bar", "Dev"], 1);
    let c = bm("C", &["Bar"], 1);
    let a_renamed = BookmarkRecord { title: "A2".into(), ..a.clone() };
    let b_relinked = BookmarkRecord { url: Some("https://example.com/B2".into()), ..b.clone() };
    vec![
        vec![],
        vec![folder.clone()],
        vec![folder.clone(), a.clone(), b.clone()],
        vec![folder.clone(), b.clone(), a.make_tombstone_at(5)],
        vec![folder.make_tombstone_at(5), a.make_tombstone_at(5), c.clone()],
        vec![c.clone(), bm("A", &["Bar", "Dev"], 3)],
        vec![folder.clone(), a, b.clone(), c.clone()],
        vec![folder.clone(), a_renamed.clone(), b_relinked],
        vec![folder, a_renamed, b, c],
    ]
}

const MODES: [MatchMode; 2] = [MatchMode::IndexTolerant, MatchMode::Strict];

fn categorize(baseline: &[BookmarkRecord], side: &[BookmarkRecord], mode: MatchMode) -> Vec<SideChange> {
    let baseline: Vec<BookmarkRecord> = active(baseline).cloned().collect();
    let live: Vec<BookmarkRecord> = active(side).cloned().collect();
    let gone: Vec<BookmarkRecord> = tombstones(side).cloned().collect();
    categorize_changes(&baseline, &live, &gone, mode).changes
}

#[test]
fn state_at_rest_stays_at_rest() {
    for state in sample_states() {
        for mode in MODES {
            let plan = calc_sync_changes_with(&state, &state, &state, &SyncOptions { mode });
            assert!(plan.is_converged(), "{mode:?} {state:?}");
        }
    }
}

#[test]
fn second_sync_is_stable() {
    let states = sample_states();
    for mode in MODES {
        let options = SyncOptions { mode };
        for baseline in &states {
            for local in &states {
                for remote in &states {
                    let first = calc_sync_changes_with(baseline, local, remote, &options);
                    let settled = &first.new_state;
                    let again = calc_sync_changes_with(settled, settled, settled, &options);
                    assert!(again.is_converged(), "{mode:?} {baseline:?} {local:?} {remote:?}");
                }
            }
        }
    }
}

/// Every baseline identity ends up exactly once in the merged state (as
/// itself, an edit of it, or its tombstone) or in a conflict. It is absent
/// only when both sides dropped it without a tombstone.
#[test]
fn every_baseline_record_has_exactly_one_outcome() {
    let states = sample_states();
    for mode in MODES {
        for baseline in &states {
            for local in &states {
                for remote in &states {
                    let outcome = merge_states(baseline, local, remote, mode);
                    let local_changes = categorize(baseline, local, mode);
                    let remote_changes = categorize(baseline, remote, mode);

                    for ((record, l), r) in active(baseline).zip(&local_changes).zip(&remote_changes) {
                        let edits: Vec<&BookmarkRecord> = [l, r]
                            .into_iter()
                            .filter_map(|change| match change {
                                SideChange::Modified(edit) => Some(edit),
                                _ => None,
                            })
                            .collect();
                        let key = record.key();

                        let placed = outcome
                            .new_state
                            .iter()
                            .filter(|placed| {
                                placed.key() == key
                                    || edits.iter().any(|e| e.key() == placed.key())
                                    || (edits.len() == 2 && edits.iter().all(|e| partial_match(e, placed)))
                            })
                            .count();
                        let conflicted = outcome
                            .conflicts
                            .iter()
                            .filter(|c| c.bookmark.as_ref().is_some_and(|b| b.key() == key))
                            .count();

                        let expected = usize::from(!matches!((l, r), (SideChange::Missing, SideChange::Missing)));
                        assert_eq!(
                            placed + conflicted,
                            expected,
                            "{mode:?} {} baseline={baseline:?} local={local:?} remote={remote:?}",
                            record.display_path()
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn independent_adds_cross_over() {
    let a = bm("A", &["Bar"], 0);
    let b = bm("B", &["Bar"], 1);
    let plan = calc_sync_changes(&[], &[a.clone()], &[b.clone()]);

    assert!(plan.conflicts.is_empty());
    assert_eq!(plan.local_changes.insertions, vec![b]);
    assert_eq!(plan.remote_changes.insertions, vec![a]);
    assert_eq!(titles(&plan.new_state), vec!["A", "B"]);
}
