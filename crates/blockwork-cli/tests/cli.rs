//! CLI end-to-end tests.
//!
//! Each test runs the built binary against its own config, state file and
//! blocklist file in a temporary directory.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

struct Sandbox {
    dir: tempfile::TempDir,
}

impl Sandbox {
    fn new(extra: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let vault = root.join("vault");
        std::fs::create_dir_all(vault.join("Daily")).unwrap();
        let config = format!(
            r#"
blocked_sites = ["reddit.com", "x.com"]
timezone = "UTC"
state_path = "{state}"
blocklist_file = "{blocklist}"

[notes]
vault_path = "{vault}"
daily_note_pattern = "Daily/{{date}}.md"

[conditions.workout]
type = "checkbox"
pattern = "- [x] Workout"
{extra}
"#,
            state = toml_path(&root.join("state.json")),
            blocklist = toml_path(&root.join("blocklist.conf")),
            vault = toml_path(&vault),
        );
        std::fs::write(root.join("config.toml"), config).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_blockwork"));
        command
            .args(args)
            .env("BLOCKWORK_CONFIG", self.path("config.toml"))
            .env("HOME", self.dir.path())
            .env_remove("RUST_LOG");
        command
    }

    fn run(&self, args: &[&str]) -> (String, String, i32) {
        let output = self.command(args).output().expect("failed to run blockwork");
        (
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
            output.status.code().unwrap_or(-1),
        )
    }

    fn run_ok(&self, args: &[&str]) -> String {
        let (stdout, stderr, code) = self.run(args);
        assert_eq!(code, 0, "{args:?} failed: {stderr}");
        stdout
    }

    fn status(&self) -> serde_json::Value {
        serde_json::from_str(&self.run_ok(&["status", "--json"])).unwrap()
    }

    fn blocklist(&self) -> String {
        std::fs::read_to_string(self.path("blocklist.conf")).unwrap_or_default()
    }

    fn write_today_note(&self, content: &str) {
        let today = chrono::Utc::now().date_naive().format("%Y-%m-%d");
        let note = self.path("vault").join("Daily").join(format!("{today}.md"));
        std::fs::write(note, content).unwrap();
    }
}

fn toml_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "\\\\")
}

#[test]
fn status_starts_blocked() {
    let sandbox = Sandbox::new("");
    let status = sandbox.status();
    assert_eq!(status["blocked"], true);
    assert_eq!(status["emergency_count"], 0);
    assert_eq!(status["emergency_max"], 3);
    assert_eq!(status["next_emergency_wait"], 30);
    assert_eq!(status["conditions_satisfied"], false);
    assert_eq!(status["blocked_sites"], 2);
    assert!(sandbox.path("state.json").exists());
}

#[test]
fn on_and_off_rewrite_the_blocklist() {
    let sandbox = Sandbox::new("");

    sandbox.run_ok(&["on"]);
    let blocklist = sandbox.blocklist();
    assert!(blocklist.contains("address=/reddit.com/"));
    assert!(blocklist.contains("address=/www.x.com/"));

    sandbox.run_ok(&["off", "--minutes", "10"]);
    assert_eq!(sandbox.blocklist(), "");
    let status = sandbox.status();
    assert_eq!(status["blocked"], false);
    assert_eq!(status["unlocked_via_conditions_today"], false);

    sandbox.run_ok(&["on"]);
    assert_eq!(sandbox.status()["blocked"], true);
}

#[test]
fn unlock_needs_the_checkbox() {
    let sandbox = Sandbox::new("");

    let stdout = sandbox.run_ok(&["unlock"]);
    assert!(stdout.contains("Conditions not met"));
    assert_eq!(sandbox.status()["blocked"], true);

    sandbox.write_today_note("# Today\n\n- [x] Workout\n- [ ] Read\n");
    let outcome: serde_json::Value = serde_json::from_str(&sandbox.run_ok(&["unlock", "--json"])).unwrap();
    assert_eq!(outcome["outcome"], "unlocked");
    let status = sandbox.status();
    assert_eq!(status["blocked"], false);
    assert_eq!(status["unlocked_via_conditions_today"], true);
    assert_eq!(sandbox.blocklist(), "");
}

#[test]
fn emergency_rejects_the_wrong_phrase() {
    let sandbox = Sandbox::new("");
    let mut child = sandbox
        .command(&["emergency"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"please\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error: Incorrect confirmation"));
    assert_eq!(sandbox.status()["emergency_count"], 0);
}

#[test]
fn emergency_with_no_wait_unlocks() {
    let sandbox = Sandbox::new("[unlock]\nemergency_initial_wait = 0\n");
    let mut child = sandbox
        .command(&["emergency"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"I CHOOSE DISTRACTION\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert_eq!(output.status.code(), Some(0));
    let status = sandbox.status();
    assert_eq!(status["blocked"], false);
    assert_eq!(status["emergency_count"], 1);
    assert_eq!(status["emergency_remaining"], 2);
}

#[test]
fn check_runs_one_tick() {
    let sandbox = Sandbox::new("[auto_unlock]\nearliest_time = \"00:00\"\n");
    let report: serde_json::Value = serde_json::from_str(&sandbox.run_ok(&["check", "--json"])).unwrap();
    assert_eq!(report["pushed"], true);
    assert_eq!(report["auto_unlock"]["outcome"], "not_met");
    assert!(sandbox.status()["last_check_at"].is_string());
    assert!(sandbox.blocklist().contains("address=/reddit.com/"));
}

#[test]
fn add_and_remove_sites() {
    let sandbox = Sandbox::new("");
    sandbox.run_ok(&["add", "https://News.Example.org/front"]);
    let sites: Vec<String> = serde_json::from_str(&sandbox.run_ok(&["list", "--json"])).unwrap();
    assert_eq!(sites, vec!["reddit.com", "x.com", "news.example.org"]);
    assert!(sandbox.blocklist().contains("address=/news.example.org/"));

    let stdout = sandbox.run_ok(&["add", "news.example.org"]);
    assert!(stdout.contains("already blocked"));

    let stdout = sandbox.run_ok(&["remove", "https://News.Example.org/front"]);
    assert!(stdout.contains("Removed"));
    assert!(!sandbox.blocklist().contains("example.org"));

    let (_, stderr, code) = sandbox.run(&["add", "not a domain"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn config_get_and_set() {
    let sandbox = Sandbox::new("");
    assert_eq!(sandbox.run_ok(&["config", "get", "auto_unlock.earliest_time"]).trim(), "17:00");

    sandbox.run_ok(&["config", "set", "auto_unlock.earliest_time", "18:30"]);
    assert_eq!(sandbox.run_ok(&["config", "get", "auto_unlock.earliest_time"]).trim(), "18:30");

    let (_, stderr, code) = sandbox.run(&["config", "set", "unlock.bogus", "1"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("Unknown configuration key"));
}
