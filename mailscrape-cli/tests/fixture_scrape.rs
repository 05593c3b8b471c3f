//! End-to-end runs of the `mailscrape` binary against JSON fixtures

use serde_json::json;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let ws = Self {
            dir: TempDir::new().unwrap(),
        };
        let fixture = json!({
            "channels": [
                {
                    "id": -1001,
                    "title": "Combo Drops",
                    "username": "combodrops",
                    "messages": [
                        "old@mail.test:1",
                        null,
                        "dup@mail.test:2 old@mail.test:1",
                        "fresh@mail.test:3"
                    ]
                },
                {
                    "id": -1002,
                    "title": "Vault",
                    "invite": { "token": "VaultTok", "policy": "approval" },
                    "messages": ["secret@mail.test:9"]
                }
            ]
        });
        std::fs::write(ws.fixture(), fixture.to_string()).unwrap();
        std::fs::create_dir_all(ws.delivered()).unwrap();
        ws
    }

    fn fixture(&self) -> PathBuf {
        self.dir.path().join("account.json")
    }

    fn delivered(&self) -> PathBuf {
        self.dir.path().join("delivered")
    }

    fn artifacts(&self) -> PathBuf {
        self.dir.path().join("artifacts")
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_mailscrape"));
        cmd.env("MAILSCRAPE_SCRAPE_OUTPUT_DIR", self.artifacts())
            .env_remove("RUST_LOG")
            .arg("--log-level")
            .arg("warn");
        cmd
    }

    fn scrape(&self, reference: &str, limit: &str) -> Output {
        self.command()
            .arg("scrape")
            .arg(reference)
            .arg(limit)
            .arg("--fixture")
            .arg(self.fixture())
            .arg("--deliver-to")
            .arg(self.delivered())
            .output()
            .unwrap()
    }
}

fn combo_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| p.to_string_lossy().ends_with("_combos.txt"))
                .collect()
        })
        .unwrap_or_default();
    files.sort();
    files
}

#[test]
fn test_scrape_delivers_unique_credentials() {
    let ws = Workspace::new();
    let output = ws.scrape("@combodrops", "10");
    assert!(output.status.success(), "{:?}", output);

    let delivered = combo_files(&ws.delivered());
    assert_eq!(delivered.len(), 1);
    let contents = std::fs::read_to_string(&delivered[0]).unwrap();
    assert_eq!(
        contents,
        "fresh@mail.test:3\ndup@mail.test:2\nold@mail.test:1\n"
    );

    let mut caption_path = delivered[0].clone().into_os_string();
    caption_path.push(".caption.txt");
    let caption = std::fs::read_to_string(caption_path).unwrap();
    assert!(caption.contains("Source: Combo Drops"));
    assert!(caption.contains("Amount: 3"));
    assert!(caption.contains("Duplicates Removed: 1"));
    assert!(caption.contains("Scraped By: cli"));

    assert!(combo_files(&ws.artifacts()).is_empty());
}

#[test]
fn test_scrape_limit_truncates() {
    let ws = Workspace::new();
    let output = ws.scrape("https://t.me/combodrops", "1");
    assert!(output.status.success());

    let delivered = combo_files(&ws.delivered());
    let contents = std::fs::read_to_string(&delivered[0]).unwrap();
    assert_eq!(contents, "fresh@mail.test:3\n");
}

#[test]
fn test_scrape_unknown_username_fails() {
    let ws = Workspace::new();
    let output = ws.scrape("@nobody_here", "5");

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Incorrect username"), "{}", stdout);
    assert!(combo_files(&ws.delivered()).is_empty());
}

#[test]
fn test_scrape_pending_invite_is_not_an_error() {
    let ws = Workspace::new();
    let output = ws.scrape("https://t.me/+VaultTok", "5");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("join_pending"), "{}", stdout);
    assert!(combo_files(&ws.delivered()).is_empty());
}

#[test]
fn test_scrape_bad_limit_reports_missing_arguments() {
    let ws = Workspace::new();
    let output = ws.scrape("@combodrops", "-3");

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("aborted(missing_arguments)"), "{}", stdout);
}

#[test]
fn test_scrape_refuses_delivery_into_output_dir() {
    let ws = Workspace::new();
    std::fs::create_dir_all(ws.artifacts()).unwrap();
    let output = ws
        .command()
        .arg("scrape")
        .arg("@combodrops")
        .arg("10")
        .arg("--fixture")
        .arg(ws.fixture())
        .arg("--deliver-to")
        .arg(ws.artifacts())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--deliver-to must differ"), "{}", stderr);
    assert!(combo_files(&ws.artifacts()).is_empty());
}

#[test]
fn test_serve_runs_each_command_line() {
    let ws = Workspace::new();
    let mut child = ws
        .command()
        .arg("serve")
        .arg("--fixture")
        .arg(ws.fixture())
        .arg("--deliver-to")
        .arg(ws.delivered())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();

    {
        let mut stdin = child.stdin.take().unwrap();
        writeln!(stdin, "/scrmail @combodrops 2").unwrap();
        writeln!(stdin, "hello, not a command").unwrap();
        writeln!(stdin, ".mailscr combodrops 5").unwrap();
        writeln!(stdin, "!scrmail @combodrops").unwrap();
    }

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.matches(" done: ").count(), 2, "{}", stdout);
    assert_eq!(stdout.matches("missing_arguments").count(), 1, "{}", stdout);
    assert_eq!(combo_files(&ws.delivered()).len(), 2);
    assert!(combo_files(&ws.artifacts()).is_empty());
}

#[test]
fn test_config_init_writes_loadable_file() {
    let ws = Workspace::new();
    let path = ws.dir.path().join("mailscrape.toml");

    let status = ws
        .command()
        .args(["config", "init"])
        .arg(&path)
        .status()
        .unwrap();
    assert!(status.success());
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("[scrape]"));

    // Refuses to clobber without --force
    let status = ws
        .command()
        .args(["config", "init"])
        .arg(&path)
        .status()
        .unwrap();
    assert!(!status.success());

    let output = ws
        .command()
        .arg("--config")
        .arg(&path)
        .arg("scrape")
        .arg("@combodrops")
        .arg("1")
        .arg("--fixture")
        .arg(ws.fixture())
        .arg("--deliver-to")
        .arg(ws.delivered())
        .output()
        .unwrap();
    assert!(output.status.success(), "{:?}", output);
}
