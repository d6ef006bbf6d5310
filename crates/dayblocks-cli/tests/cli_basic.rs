//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own data directory with the
//! clock pinned through `DAYBLOCKS_NOW`.

use std::path::Path;
use std::process::Command;

use serde_json::Value;

/// 09:05 UTC falls in block 27.
const NOW: &str = "2026-03-02T09:05:00Z";

/// Run a CLI command and return (exit code, stdout, stderr).
fn run_cli(data_dir: &Path, now: &str, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_dayblocks"))
        .args(args)
        .env("DAYBLOCKS_DATA_DIR", data_dir)
        .env("DAYBLOCKS_NOW", now)
        .env_remove("DAYBLOCKS_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

/// Fresh data directory with the block clock pinned to UTC.
fn workspace() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(dir.path(), NOW, &["config", "set", "day.utc_offset_minutes", "0"]);
    assert_eq!(code, 0, "config set failed: {stderr}");
    let (code, _, stderr) = run_cli(dir.path(), NOW, &["config", "set", "notifications.enabled", "false"]);
    assert_eq!(code, 0, "config set failed: {stderr}");
    dir
}

fn json(stdout: &str) -> Value {
    serde_json::from_str(stdout).unwrap_or_else(|e| panic!("not JSON ({e}): {stdout}"))
}

#[test]
fn test_config_get_set() {
    let dir = workspace();

    let (code, stdout, _) = run_cli(dir.path(), NOW, &["config", "get", "day.day_start_hour"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "6");

    let (code, _, _) = run_cli(dir.path(), NOW, &["config", "set", "day.day_start_hour", "7"]);
    assert_eq!(code, 0);
    let (_, stdout, _) = run_cli(dir.path(), NOW, &["config", "get", "day.day_start_hour"]);
    assert_eq!(stdout.trim(), "7");

    let (code, _, stderr) = run_cli(dir.path(), NOW, &["config", "set", "day.day_start_hour", "25"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("day_start_hour"), "{stderr}");
}

#[test]
fn test_config_list() {
    let dir = workspace();
    let (code, stdout, _) = run_cli(dir.path(), NOW, &["config", "list"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("auto_continue.enabled = true"), "{stdout}");
}

#[test]
fn test_timer_start_status_stop() {
    let dir = workspace();

    let (code, stdout, stderr) = run_cli(
        dir.path(),
        NOW,
        &["timer", "start", "--category", "deep", "--label", "draft"],
    );
    assert_eq!(code, 0, "{stderr}");
    let events = json(&stdout);
    let started = &events[0];
    assert_eq!(started["type"], "timer_started");
    assert_eq!(started["block_index"], 27);
    assert_eq!(started["category"], "deep");

    let (code, stdout, _) = run_cli(dir.path(), "2026-03-02T09:06:00Z", &["timer", "status"]);
    assert_eq!(code, 0);
    let view = json(&stdout);
    assert_eq!(view["state"], "running_work");
    assert_eq!(view["time_left_secs"], 840);

    let (code, stdout, _) = run_cli(dir.path(), "2026-03-02T09:06:00Z", &["timer", "stop"]);
    assert_eq!(code, 0);
    let events = json(&stdout);
    assert!(events
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e["type"] == "timer_completed"));

    let (_, stdout, _) = run_cli(
        dir.path(),
        "2026-03-02T09:06:00Z",
        &["day", "show", "--json"],
    );
    let day = json(&stdout);
    let block = &day["blocks"][27];
    assert_eq!(block["usedSeconds"], 60);
}

#[test]
fn test_rejected_transition_exits_with_two() {
    let dir = workspace();
    let (code, _, stderr) = run_cli(dir.path(), NOW, &["timer", "pause"]);
    assert_eq!(code, 2);
    assert!(stderr.starts_with("error:"), "{stderr}");
}

#[test]
fn test_block_plan_and_day_show() {
    let dir = workspace();

    let (code, stdout, stderr) = run_cli(
        dir.path(),
        NOW,
        &["block", "plan", "30", "--category", "email"],
    );
    assert_eq!(code, 0, "{stderr}");
    let block = json(&stdout);
    assert_eq!(block["category"], "email");
    assert_eq!(block["status"], "planned");

    let (code, stdout, _) = run_cli(dir.path(), NOW, &["day", "show"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("10:00"), "{stdout}");
    assert!(stdout.contains("planned"), "{stdout}");
}

#[test]
fn test_block_index_out_of_range() {
    let dir = workspace();
    let (code, _, _) = run_cli(dir.path(), NOW, &["block", "plan", "72"]);
    assert_ne!(code, 0);
}

#[test]
fn test_day_stats() {
    let dir = workspace();
    let _ = run_cli(dir.path(), NOW, &["timer", "start", "--category", "deep"]);
    let _ = run_cli(dir.path(), "2026-03-02T09:10:00Z", &["timer", "stop"]);

    let (code, stdout, _) = run_cli(dir.path(), "2026-03-02T09:10:00Z", &["day", "stats"]);
    assert_eq!(code, 0);
    let stats = json(&stdout);
    assert_eq!(stats["worked_seconds"], 300);
    assert_eq!(stats["by_category"]["deep"], 300);
}

#[test]
fn test_completions() {
    let dir = workspace();
    let (code, stdout, _) = run_cli(dir.path(), NOW, &["completions", "bash"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("dayblocks"));
}
