//! Integration tests for the driftwatch binary.
//!
//! Every test points `--config` into a temporary directory so the user's
//! own configuration and log file are never touched.
//!
//! Run with: `cargo test -p driftwatch-cli --test cli_workflow`

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

const MOORING_TRACK: &str = r#"{
    "name": "mooring",
    "points": [
        { "offset_secs": 0,  "lat": -22.2700, "lon": 166.4500, "accuracy_m": 4 },
        { "offset_secs": 20, "lat": -22.2700, "lon": 166.4501, "accuracy_m": 4 },
        { "offset_secs": 40, "lat": -22.2700, "lon": 166.4501, "battery_level": 0.3 },
        { "offset_secs": 65, "lat": -22.2700, "lon": 166.4501 },
        { "offset_secs": 80, "lat": -22.2702, "lon": 166.4502 }
    ]
}"#;

/// Run the CLI and capture output.
fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_driftwatch"))
        .args(args)
        .output()
        .expect("Failed to execute CLI command")
}

/// Assert a command succeeded.
fn assert_success(output: &Output, context: &str) {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        panic!("{} failed:\nstdout: {}\nstderr: {}", context, stdout, stderr);
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Write a config whose log file lives in `dir`.
fn write_config(dir: &Path, extra: &str) -> PathBuf {
    let path = dir.join("config.ini");
    let log = dir.join("logs").join("driftwatch.log");
    fs::write(
        &path,
        format!("[logging]\nfile = {}\n{}", log.display(), extra),
    )
    .unwrap();
    path
}

#[test]
fn test_distance_reports_meters_and_radius() {
    let output = run_cli(&["distance", "-22.2700", "166.4500", "-22.2702", "166.4502"]);
    assert_success(&output, "distance");

    let text = stdout(&output);
    assert!(text.contains(" m"), "unexpected output: {}", text);
    assert!(text.contains("beyond the 20 m radius"), "unexpected output: {}", text);
}

#[test]
fn test_distance_rejects_out_of_range_latitude() {
    let output = run_cli(&["distance", "91", "0", "0", "0"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid coordinate"));
}

#[test]
fn test_config_init_show_check() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("config.ini");
    let path_arg = path.to_str().unwrap();

    let output = run_cli(&["config", "init", "--config", path_arg]);
    assert_success(&output, "config init");
    assert!(path.exists());

    let output = run_cli(&["config", "show", "--config", path_arg]);
    assert_success(&output, "config show");
    let text = stdout(&output);
    assert!(text.contains("[tracking]"));
    assert!(text.contains("[alerts]"));

    let output = run_cli(&["config", "check", "--config", path_arg]);
    assert_success(&output, "config check");
    assert!(stdout(&output).contains("Configuration OK"));
}

#[test]
fn test_config_init_keeps_existing_file() {
    let temp = TempDir::new().unwrap();
    let path = write_config(temp.path(), "[tracking]\nimmobility_radius_m = 35\n");

    let output = run_cli(&["config", "init", "--config", path.to_str().unwrap()]);
    assert_success(&output, "config init");

    assert!(fs::read_to_string(&path)
        .unwrap()
        .contains("immobility_radius_m = 35"));
}

#[test]
fn test_config_check_rejects_offline_timeout_below_fallback() {
    let temp = TempDir::new().unwrap();
    let path = write_config(
        temp.path(),
        "[tracking]\noffline_timeout_secs = 10\nfallback_interval_secs = 30\n",
    );

    let output = run_cli(&["config", "check", "--config", path.to_str().unwrap()]);
    assert!(!output.status.success());
}

#[test]
fn test_simulate_mooring_track_as_json() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "");
    let track = temp.path().join("mooring.json");
    fs::write(&track, MOORING_TRACK).unwrap();

    let output = run_cli(&[
        "simulate",
        "--json",
        "--config",
        config.to_str().unwrap(),
        "--track",
        track.to_str().unwrap(),
    ]);
    assert_success(&output, "simulate");

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();

    let history: Vec<&str> = report["history"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["status"].as_str().unwrap())
        .collect();
    assert_eq!(history, vec!["moving", "stationary", "moving"]);

    let alerts: Vec<&str> = report["alerts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s.as_str().unwrap())
        .collect();
    assert_eq!(
        alerts,
        vec!["alerte-urgence", "champignon-mario", "sonar", "la-cucaracha"]
    );

    let writes = report["writes"].as_array().unwrap();
    let last = writes.last().unwrap();
    assert_eq!(last["is_sharing"], false);
    assert_eq!(last["status"], "offline");

    assert_eq!(report["view"]["boat-1"]["status"], "offline");
    assert!(temp.path().join("logs").join("driftwatch.log").exists());
}

#[test]
fn test_simulate_ghost_hidden_from_group_viewer() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "");
    let track = temp.path().join("mooring.json");
    fs::write(&track, MOORING_TRACK).unwrap();

    let output = run_cli(&[
        "simulate",
        "--json",
        "--ghost",
        "--config",
        config.to_str().unwrap(),
        "--track",
        track.to_str().unwrap(),
    ]);
    assert_success(&output, "simulate --ghost");

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(report["view"].as_object().unwrap().is_empty());
    assert!(report["alerts"].as_array().unwrap().is_empty());
    assert!(report["writes"]
        .as_array()
        .unwrap()
        .iter()
        .all(|w| w["is_ghost"] == true));
}

#[test]
fn test_simulate_missing_track_fails() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path(), "");

    let output = run_cli(&[
        "simulate",
        "--config",
        config.to_str().unwrap(),
        "--track",
        temp.path().join("missing.json").to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to load track"));
}
