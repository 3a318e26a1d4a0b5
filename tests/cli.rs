//! Binary-level tests: run `marksync` against files in a temp directory.

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

struct Env {
    dir: TempDir,
}

impl Env {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("marksync").unwrap();
        cmd.arg("--db")
            .arg(self.dir.path().join("marksync.db"))
            .arg("--config")
            .arg(self.dir.path().join("config.json"))
            .arg("--tree")
            .arg(self.dir.path().join("bookmarks.json"))
            .arg("--json")
            .env("MARKSYNC_ACTOR", "tester");
        for var in ["MARKSYNC_URL", "MARKSYNC_USERNAME", "MARKSYNC_PASSWORD", "MARKSYNC_INTERVAL"] {
            cmd.env_remove(var);
        }
        cmd
    }

    fn json(&self, args: &[&str]) -> Value {
        let output = self.cmd().args(args).assert().success().get_output().stdout.clone();
        serde_json::from_slice(&output).unwrap()
    }

    fn init(&self) {
        self.cmd().arg("init").assert().success();
    }
}

#[test]
fn status_before_init_reports_not_initialized() {
    let env = Env::new();
    env.cmd().arg("status").assert().failure().code(2);
}

#[test]
fn init_twice_needs_force() {
    let env = Env::new();
    env.init();
    env.cmd().arg("init").assert().failure().code(2);
    env.cmd().args(["init", "--force"]).assert().success();
}

#[test]
fn bookmark_edits_show_up_in_list() {
    let env = Env::new();
    env.init();

    env.cmd().args(["bookmark", "mkdir", "", "Bar"]).assert().success();
    env.cmd()
        .args(["bookmark", "add", "Bar", "Rust", "https://rust-lang.org"])
        .assert()
        .success();

    let list = env.json(&["bookmark", "list"]);
    let records = list.as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().any(|r| r["title"] == "Rust" && r["path"][0] == "Bar"));
}

#[test]
fn removing_a_synced_looking_bookmark_records_a_tombstone() {
    let env = Env::new();
    env.init();
    env.cmd()
        .args(["bookmark", "add", "", "Docs", "https://docs.rs"])
        .assert()
        .success();

    let removed = env.json(&["bookmark", "rm", "Docs"]);
    assert_eq!(removed["tombstones"], 1);

    let tombstones = env.json(&["tombstones", "list"]);
    assert_eq!(tombstones.as_array().unwrap().len(), 1);
}

#[test]
fn missing_bookmark_exits_with_not_found() {
    let env = Env::new();
    env.init();
    env.cmd().args(["bookmark", "rm", "Nope"]).assert().failure().code(3);
}

#[test]
fn incomplete_settings_fail_validation() {
    let env = Env::new();
    env.init();
    env.cmd().args(["config", "validate"]).assert().failure().code(7);

    for (key, value) in [
        ("url", "https://dav.example/bookmarks.json"),
        ("username", "alice"),
        ("password", "secret"),
        ("interval", "15"),
    ] {
        env.cmd().args(["config", "set", key, value]).assert().success();
    }
    let valid = env.json(&["config", "validate"]);
    assert_eq!(valid["valid"], true);
    assert_eq!(valid["interval_secs"], 900);

    let shown = env.json(&["config", "show"]);
    assert_eq!(shown["settings"]["password"], "********");
}

#[test]
fn plan_reads_states_from_file() {
    let env = Env::new();
    let inputs = env.dir.path().join("inputs.json");
    std::fs::write(
        &inputs,
        r#"{
            "oldRemoteState": [],
            "currentLocalState": [],
            "currentRemoteState": [{"title": "X", "url": "https://x.example", "path": ["Bar"], "index": 0}]
        }"#,
    )
    .unwrap();

    let plan = env.json(&["plan", inputs.to_str().unwrap()]);
    assert_eq!(plan["localChanges"]["insertions"][0]["title"], "X");
    assert_eq!(plan["conflicts"].as_array().unwrap().len(), 0);
}

#[test]
fn version_reports_client_marker() {
    let env = Env::new();
    let version = env.json(&["version"]);
    assert!(version["client"].as_str().unwrap().starts_with("marksync/"));
}
