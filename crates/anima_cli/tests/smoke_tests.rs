//! CLI smoke tests: verify basic binary behavior.

use std::io::Write;
use std::process::{Command, Stdio};

fn cli_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_anima"));
    cmd.env_remove("ANIMA_CONFIG")
        .env_remove("ANIMA_GRAPH")
        .env_remove("LLM_PROVIDER");
    cmd
}

#[test]
fn test_help_flag() {
    let output = cli_bin().arg("--help").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"), "Expected usage info in --help output");
    assert!(stdout.contains("--graph"));
}

#[test]
fn test_version_flag() {
    let output = cli_bin().arg("--version").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("anima"), "Expected crate name in --version output");
}

#[test]
fn test_missing_graph_fails() {
    let dir = tempfile::TempDir::new().unwrap();
    let output = cli_bin()
        .current_dir(dir.path())
        .args(["--provider", "mock", "--graph", "absent.json"])
        .stdin(Stdio::null())
        .output()
        .expect("failed to run");
    assert!(!output.status.success());
}

#[test]
fn test_mock_conversation() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("mind.json"),
        r#"{"states": [{"name": "Грусть"}, {"name": "Тоска", "conditions": ["Грусть"]}]}"#,
    )
    .unwrap();

    let mut child = cli_bin()
        .current_dir(dir.path())
        .args(["--provider", "mock", "--graph", "mind.json"])
        .args(["--knowledge", "world_model.json", "--journal", "analyze.txt"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to run");
    child
        .stdin
        .take()
        .unwrap()
        .write_all("привет\nstatus\nquit\n".as_bytes())
        .unwrap();

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Бот: (Mock"));
    assert!(stdout.contains("\"session_id\""));
    assert!(dir.path().join("analyze.txt").exists());
}
