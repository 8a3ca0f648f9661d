//! CLI subprocess integration tests.
//!
//! These tests invoke the `topolab` binary as a subprocess and verify exit
//! codes, stdout content, and output stability.

use std::fs;
use std::path::Path;
use std::process::Command;

fn topolab_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_topolab"))
}

fn write_lab(dir: &Path, lab_conf: &str) {
    let topo = dir.join("topology");
    fs::create_dir_all(&topo).unwrap();
    fs::write(topo.join("lab.conf"), lab_conf).unwrap();
}

const SIMPLE_LAB: &str = r#"
pc1[0]="lan1"
router[0]="lan1"
router[1]="lan2"
router[image]="kathara/frr"
pc2[0]="lan2"
"#;

#[test]
fn cli_version_exits_zero() {
    let output = topolab_bin().arg("--version").output().unwrap();
    assert!(output.status.success(), "topolab --version must exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("topolab"),
        "version output must contain 'topolab': {stdout}"
    );
}

#[test]
fn cli_help_lists_commands() {
    let output = topolab_bin().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("generate"));
    assert!(stdout.contains("estimate"));
    assert!(stdout.contains("images"));
}

#[test]
fn cli_generate_writes_compose_file() {
    let lab = tempfile::tempdir().unwrap();
    write_lab(lab.path(), SIMPLE_LAB);

    let output = topolab_bin()
        .args(["generate", &lab.path().to_string_lossy()])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "generate must exit 0. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let compose = fs::read_to_string(lab.path().join("compose.yaml")).unwrap();
    assert!(compose.contains("services:"));
    assert!(compose.contains("router:"));
    assert!(compose.contains("internal: true"));
}

#[test]
fn cli_generate_twice_is_byte_identical() {
    let lab = tempfile::tempdir().unwrap();
    write_lab(lab.path(), SIMPLE_LAB);
    let lab_arg = lab.path().to_string_lossy().to_string();

    assert!(topolab_bin()
        .args(["generate", &lab_arg])
        .status()
        .unwrap()
        .success());
    let first = fs::read(lab.path().join("compose.yaml")).unwrap();

    assert!(topolab_bin()
        .args(["generate", &lab_arg])
        .status()
        .unwrap()
        .success());
    let second = fs::read(lab.path().join("compose.yaml")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn cli_generate_json_reports_identity() {
    let lab = tempfile::tempdir().unwrap();
    write_lab(lab.path(), SIMPLE_LAB);

    let output = topolab_bin()
        .args(["--json", "generate", &lab.path().to_string_lossy()])
        .output()
        .unwrap();
    assert!(output.status.success());

    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("JSON output must parse");
    assert_eq!(payload["machines"], 3);
    assert_eq!(payload["networks"], 2);
    assert_eq!(payload["entry_machine"], "pc1");
    assert_eq!(payload["short_id"].as_str().unwrap().len(), 12);
}

#[test]
fn cli_check_rejects_malformed_lab_with_config_exit_code() {
    let lab = tempfile::tempdir().unwrap();
    // Interface index 1 is missing.
    write_lab(lab.path(), "pc1[0]=\"lan1\"\npc1[2]=\"lan2\"\n");

    let output = topolab_bin()
        .args(["check", &lab.path().to_string_lossy()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("non-contiguous"), "stderr: {stderr}");
}

#[test]
fn cli_check_missing_lab_dir_is_config_error() {
    let empty = tempfile::tempdir().unwrap();
    let output = topolab_bin()
        .args(["check", &empty.path().to_string_lossy()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_images_lists_registry() {
    let output = topolab_bin().arg("images").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("kathara/frr"));
    assert!(stdout.contains("kathara/base"));
}

#[test]
fn cli_images_json_is_structured() {
    let output = topolab_bin().args(["--json", "images"]).output().unwrap();
    assert!(output.status.success());
    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let images = payload.as_array().unwrap();
    assert!(images.iter().any(|i| i["image"] == "kathara/frr"));
}

#[test]
fn cli_estimate_json_with_static_ceiling() {
    let lab = tempfile::tempdir().unwrap();
    write_lab(lab.path(), SIMPLE_LAB);

    let output = topolab_bin()
        .args([
            "--json",
            "estimate",
            &lab.path().to_string_lossy(),
            "--static-ceiling",
            "17179869184",
        ])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(payload["machines"], 3);
    assert!(payload["estimated_cost_bytes"].as_u64().unwrap() > 0);
    assert!(payload["concurrent_labs"].as_u64().unwrap() >= 1);
    // FRR lab: 5s image delay + 5s stabilization.
    assert_eq!(payload["estimated_startup_secs"], 10);
}

#[test]
fn cli_inspect_shows_machines_and_networks() {
    let lab = tempfile::tempdir().unwrap();
    write_lab(lab.path(), SIMPLE_LAB);

    let output = topolab_bin()
        .args(["inspect", &lab.path().to_string_lossy()])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("router (router, kathara/frr)"));
    assert!(stdout.contains("eth0=lan1"));
    assert!(stdout.contains("entry machine: pc1"));
}

#[test]
fn cli_startup_override_lands_in_manifest() {
    let lab = tempfile::tempdir().unwrap();
    write_lab(lab.path(), SIMPLE_LAB);

    let output = topolab_bin()
        .args([
            "generate",
            &lab.path().to_string_lossy(),
            "--startup",
            "router=vtysh -b",
            "--merge",
            "replace",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let compose = fs::read_to_string(lab.path().join("compose.yaml")).unwrap();
    assert!(compose.contains("vtysh -b"));
}
