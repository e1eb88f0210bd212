use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;

#[test]
fn test_cpu_subcommand() {
    let mut cmd = Command::cargo_bin("intgemm-bench").unwrap();
    cmd.arg("cpu");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("SSE2"))
        .stdout(predicate::str::contains("dispatching to"));
}

#[test]
fn test_bench_single_iteration() {
    let mut cmd = Command::cargo_bin("intgemm-bench").unwrap();
    cmd.arg("1").arg("--sizes").arg("2x64x8");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("CPU:"))
        .stdout(predicate::str::contains("1 iterations per shape"));
}

#[test]
fn test_bench_json_format() {
    let mut cmd = Command::cargo_bin("intgemm-bench").unwrap();
    cmd.arg("1").arg("--sizes").arg("2x64x8").arg("-f").arg("json");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"signed_seconds\""))
        .stdout(predicate::str::contains("\"shifted_seconds\""));
}

#[test]
fn test_bench_writes_report_file() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path().to_path_buf();

    let mut cmd = Command::cargo_bin("intgemm-bench").unwrap();
    cmd.arg("1")
        .arg("--sizes")
        .arg("2x64x8")
        .arg("--output")
        .arg(&path);
    cmd.assert().success();

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(report["repeat"], 1);
    assert_eq!(report["shapes"][0]["width"], 64);
}

#[test]
fn test_bad_shape_is_rejected() {
    let mut cmd = Command::cargo_bin("intgemm-bench").unwrap();
    cmd.arg("1").arg("--sizes").arg("2x64");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("expected ROWSxWIDTHxCOLS"));
}

#[test]
fn test_unaligned_width_is_rejected() {
    let mut cmd = Command::cargo_bin("intgemm-bench").unwrap();
    cmd.arg("1").arg("--sizes").arg("2x65x8");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("must be a multiple of"));
}
