#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

/// Install a fake circomspect that prints canned diagnostics and exits 1,
/// the way the real tool does when it has something to report.
fn fake_circomspect(dir: &Path) -> PathBuf {
    let script = dir.join("fake-circomspect.sh");
    let body = "#!/bin/sh\n\
cat <<'EOF'\n\
circomspect: analyzing template 'Multiplier'\n\
warning[CS0005]: Intermediate signals should typically occur in at least two separate constraints.\n\
   \u{250c}\u{2500} circuit.circom:12:5\n\
EOF\n\
exit 1\n";
    fs::write(&script, body).expect("write fake circomspect");
    let mut perms = fs::metadata(&script).expect("script metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&script, perms).expect("make script executable");
    script
}

fn write_circuit(dir: &Path) -> PathBuf {
    let circuit = dir.join("circuit.circom");
    fs::write(&circuit, "template Multiplier() { signal input a; }\n").expect("write circuit");
    circuit
}

#[test]
fn analyze_reports_findings_from_a_fake_tool() {
    let tmp = tempdir().expect("tempdir");
    let script = fake_circomspect(tmp.path());
    let circuit = write_circuit(tmp.path());
    let out = tmp.path().join("runs");

    cargo_bin_cmd!("zk-triage")
        .env("ZK_TRIAGE_CIRCOMSPECT_BIN", &script)
        .arg("analyze")
        .arg("--circuit")
        .arg(&circuit)
        .arg("--tools")
        .arg("circomspect")
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("circomspect: 1 finding(s)"))
        .stdout(predicate::str::contains("CS0005"));
}

#[test]
fn analyze_persists_the_run_tree() {
    let tmp = tempdir().expect("tempdir");
    let script = fake_circomspect(tmp.path());
    let circuit = write_circuit(tmp.path());
    let out = tmp.path().join("runs");

    let output = cargo_bin_cmd!("zk-triage")
        .env("ZK_TRIAGE_CIRCOMSPECT_BIN", &script)
        .arg("analyze")
        .arg("--circuit")
        .arg(&circuit)
        .arg("--tools")
        .arg("circomspect")
        .arg("--out")
        .arg(&out)
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let body: serde_json::Value = serde_json::from_slice(&output).expect("analyze json");
    assert_eq!(body["rows"][0]["tool_id"], "circomspect");
    assert_eq!(body["rows"][0]["record"]["exit_code"], 1);
    assert_eq!(body["rows"][0]["findings"][0]["check_id"], "CS0005");

    let run_dir = PathBuf::from(body["run_dir"].as_str().expect("run_dir"));
    let pair = run_dir.join("circuit").join("circomspect");
    assert!(pair.join("raw.json").is_file());
    assert!(pair.join("findings.json").is_file());
    // No ground truth in analyze mode, so no verdict artifact.
    assert!(!pair.join("verdict.json").exists());
    assert!(run_dir.join("summary.json").is_file());

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(pair.join("raw.json")).expect("raw.json"))
            .expect("raw json");
    assert!(raw["stdout"].as_str().expect("stdout").contains("CS0005"));
}

#[test]
fn analyze_rejects_a_missing_circuit() {
    let tmp = tempdir().expect("tempdir");
    cargo_bin_cmd!("zk-triage")
        .arg("analyze")
        .arg("--circuit")
        .arg(tmp.path().join("nope.circom"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn analyze_rejects_an_unknown_tool() {
    let tmp = tempdir().expect("tempdir");
    let circuit = write_circuit(tmp.path());
    cargo_bin_cmd!("zk-triage")
        .arg("analyze")
        .arg("--circuit")
        .arg(&circuit)
        .arg("--tools")
        .arg("ecne")
        .arg("--out")
        .arg(tmp.path().join("runs"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown tool 'ecne'"));
}
