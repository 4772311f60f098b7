use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Small resonance sweep that settles well inside the default run length
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[travel]
min_position = 1000
max_position = 28000
zero_tolerance = 200

[watchdog]
slow_tick_ms = 10
timeout_ms = 8000

[simulation]
resonance = 17500
home = 16000
noise = 0
pulse_hz = 200
"#;
    let path = dir.path().join("afc.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["simulate", "--duration", "12"], 0, "run finished", "stdout")]
#[case(&["self-check"], 0, "ok: bring-up complete", "stdout")]
#[case(&["simulate", "--duration=-1"], 1, "invalid duration", "stderr")]
#[case(&["calibrate"], 2, "unrecognized subcommand", "stderr")]
#[case(&["simulate", "--rt"], 2, "--realtime", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("afc_cli").unwrap();
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

#[test]
fn simulate_json_report_is_parseable() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = Command::cargo_bin("afc_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--json")
        .args(["simulate", "--duration", "12", "--trace-every", "100"])
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8(out.stdout).unwrap();
    let line = stdout.lines().last().unwrap();
    let v: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(v["mode"], "run-afc");
    assert_eq!(v["mode_code"], 0x40);
    assert!(v["pulses_fired"].as_u64().unwrap() > 0);
    assert!(v["samples"].as_u64().unwrap() > 0);
    assert!(!v["trace"].as_array().unwrap().is_empty());
    let pos = v["position"].as_u64().unwrap();
    assert!((1_000..=28_000).contains(&pos));
}

#[test]
fn manual_target_is_reported() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = Command::cargo_bin("afc_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--json")
        .args(["simulate", "--duration", "12", "--pulse-from", "8", "--manual", "20000"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value =
        serde_json::from_str(String::from_utf8(out.stdout).unwrap().trim()).unwrap();
    assert_eq!(v["mode"], "run-manual");
    assert_eq!(v["target"], 20_000);
    assert_eq!(v["status"]["manual_mode"], true);
}

#[test]
fn missing_config_file_is_explained() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("afc_cli").unwrap();
    cmd.arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("self-check");
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("config file could not be read"));
}

#[test]
fn malformed_config_is_a_parse_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[travel]\nmin_position = \"low\"\n").unwrap();

    Command::cargo_bin("afc_cli")
        .unwrap()
        .arg("--config")
        .arg(&path)
        .arg("self-check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not valid TOML"));
}

#[rstest]
#[case("[travel]\nmin_position = 5000\nmax_position = 4000\n", "travel.min_position")]
#[case("[power]\nmin_reading = 100\nmax_reading = 100\n", "power.min_reading")]
#[case("[direction]\nfast_move_delta = 0\n", "direction.fast_move_delta")]
fn invalid_values_are_rejected(#[case] body: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("invalid.toml");
    fs::write(&path, body).unwrap();

    Command::cargo_bin("afc_cli")
        .unwrap()
        .arg("--config")
        .arg(&path)
        .arg("self-check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration is invalid"))
        .stderr(predicate::str::contains(needle));
}

#[test]
fn json_errors_are_structured() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("invalid.toml");
    fs::write(&path, "[cooldown]\nbucket_shift = 40\n").unwrap();

    let out = Command::cargo_bin("afc_cli")
        .unwrap()
        .arg("--config")
        .arg(&path)
        .arg("--json")
        .arg("self-check")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8(out.stderr).unwrap();
    let v: serde_json::Value = serde_json::from_str(stderr.lines().last().unwrap()).unwrap();
    assert_eq!(v["reason"], "Error");
    assert_eq!(v["exit_code"], 1);
    assert!(v["message"].as_str().unwrap().contains("bucket_shift"));
}

#[test]
fn log_file_receives_json_lines() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("afc.log");
    let path = dir.path().join("afc.toml");
    fs::write(
        &path,
        format!(
            "[logging]\nfile = {:?}\nlevel = \"info\"\n",
            log.to_string_lossy()
        ),
    )
    .unwrap();

    Command::cargo_bin("afc_cli")
        .unwrap()
        .arg("--config")
        .arg(&path)
        .args(["simulate", "--duration", "1"])
        .assert()
        .success();

    let text = fs::read_to_string(&log).unwrap();
    let first = text.lines().next().expect("log file has a line");
    let v: serde_json::Value = serde_json::from_str(first).unwrap();
    assert!(v.get("level").is_some());
}
