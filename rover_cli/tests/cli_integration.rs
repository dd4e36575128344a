use assert_cmd::Command;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

// Short tick so runs settle quickly; everything else stays at defaults.
fn write_config(dir: &tempfile::TempDir, extra: &str) -> PathBuf {
    let toml = format!(
        r#"
[bus]
path = "/dev/i2c-1"
motor_port = 6
others_port = 7

[supervisor]
tick_ms = 10
power_interval_ms = 50

[navigation]
fps = 50
pause_poll_ms = 10
{extra}
"#
    );
    let path = dir.path().join("rover.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["print-config"], 0, "tick_ms = 10", "stdout")]
#[case(&["self-check"], 0, "self-check OK", "stdout")]
#[case(&["supervise", "--duration-ms", "200"], 0, "distance: 1000mm", "stdout")]
#[case(&["navigate", "--auto", "--max-ms", "300"], 0, "outcome: cancelled", "stdout")]
#[case(&["fly"], 2, "unrecognized subcommand", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    let mut cmd = Command::cargo_bin("rover").unwrap();
    cmd.arg("--config").arg(&cfg);
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
#[case("[navigation]\nfps = 0\n", "fps must be > 0")]
#[case("[supervisor]\ndistance_ports = [1, 1]\n", "duplicate port 1")]
#[case("[supervisor]\ntick_ms = \"fast\"\n", "parse config")]
fn invalid_config_exits_with_config_code(#[case] toml: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, toml).unwrap();

    Command::cargo_bin("rover")
        .unwrap()
        .arg("--config")
        .arg(&path)
        .arg("self-check")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("What happened: Invalid configuration"))
        .stderr(predicate::str::contains(needle));
}

#[test]
fn missing_explicit_config_is_an_error() {
    Command::cargo_bin("rover")
        .unwrap()
        .args(["--config", "/nonexistent/rover.toml", "print-config"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("read config"));
}

#[test]
fn json_errors_are_structured() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[navigation]\nfps = 0\n").unwrap();

    let out = Command::cargo_bin("rover")
        .unwrap()
        .arg("--config")
        .arg(&path)
        .args(["--json", "self-check"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(3));
    let stderr = String::from_utf8(out.stderr).unwrap();
    let line = stderr.lines().last().unwrap();
    let v: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(v["reason"], "Config");
    assert_eq!(v["code"], 3);
}

#[test]
fn supervise_json_snapshot_has_every_channel() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    let out = Command::cargo_bin("rover")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args(["--json", "supervise", "--duration-ms", "200"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    let v: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(v["distance_mm"].as_array().unwrap().len(), 6);
    assert_eq!(v["distance_mm"][0], 1000);
    assert_eq!(v["sessions"], 1);
}

#[test]
fn disabled_distance_sensing_reports_no_capture() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("rover.toml");
    fs::write(&cfg, "[supervisor]\ntick_ms = 10\ndistance_enabled = false\n").unwrap();

    Command::cargo_bin("rover")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args(["supervise", "--duration-ms", "100"])
        .timeout(std::time::Duration::from_secs(10))
        .assert()
        .success()
        .stdout(predicate::str::contains("distance: (no capture)"));
}

#[test]
fn disabled_distance_sensing_json_has_null_readings() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("rover.toml");
    fs::write(&cfg, "[supervisor]\ntick_ms = 10\ndistance_enabled = false\n").unwrap();

    let out = Command::cargo_bin("rover")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args(["--json", "supervise", "--duration-ms", "100"])
        .timeout(std::time::Duration::from_secs(10))
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    let v: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert!(v["distance_mm"].is_null());
    assert_eq!(v["sessions"], 1);
}

#[test]
fn navigate_reads_commands_from_stdin() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    Command::cargo_bin("rover")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("navigate")
        .write_stdin("bogus\nstart\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("outcome: cancelled"))
        .stderr(predicate::str::contains("unknown command"));
}

#[test]
fn navigate_without_start_has_no_outcome() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    Command::cargo_bin("rover")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("navigate")
        .write_stdin("quit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("outcome: none"))
        .stdout(predicate::str::contains("targets reached: 0"));
}

#[test]
fn log_file_is_created() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("rover.log");
    let extra = format!("\n[logging]\nfile = {:?}\nrotation = \"never\"\n", log.display().to_string());
    let cfg = write_config(&dir, &extra);

    Command::cargo_bin("rover")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("self-check")
        .assert()
        .success();
    assert!(log.exists(), "log file {log:?} should exist");
}
