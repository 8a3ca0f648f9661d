//! End-to-end tests: lab directory in, compose manifest out, with admission
//! control driving concurrent startups.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use topolab_core::{
    estimate_startup_secs, AdmissionController, BootSequence, CostModel, Engine, FixedTelemetry,
};

fn write_lab(dir: &Path, lab_conf: &str) {
    let topo = dir.join("topology");
    fs::create_dir_all(&topo).unwrap();
    fs::write(topo.join("lab.conf"), lab_conf).unwrap();
}

const RIP_LAB: &str = r#"
# Two LANs joined by a RIP router
LAB_NAME="rip-basic"
ENTRY="pc1"

pc1[0]="lan1"
pc2[0]="lan2"
router[0]="lan1"
router[1]="lan2"
router[image]="kathara/frr"
"#;

#[test]
fn full_compile_produces_expected_manifest() {
    let dir = tempfile::tempdir().unwrap();
    write_lab(dir.path(), RIP_LAB);
    fs::write(
        dir.path().join("topology/router.startup"),
        "ip addr add 10.128.0.3/28 dev eth0\nip addr add 10.128.0.19/28 dev eth1\n",
    )
    .unwrap();

    let compiled = Engine::new().compile_dir(dir.path()).unwrap();
    let manifest = &compiled.manifest;

    assert_eq!(manifest.entry_machine, "pc1");
    assert_eq!(manifest.services.len(), 3);
    assert_eq!(manifest.networks.len(), 2);

    let router = &manifest.services["router"];
    assert_eq!(router.cap_add, vec!["NET_ADMIN", "SYS_ADMIN"]);
    assert_eq!(router.networks["lan1"].interface_name, "eth0");
    assert_eq!(router.networks["lan2"].interface_name, "eth1");
    assert!(router.command.contains("ip addr add 10.128.0.3/28 dev eth0"));

    for net in manifest.networks.values() {
        assert!(net.internal);
        assert_eq!(net.driver, "bridge");
    }
}

#[test]
fn generation_twice_from_same_input_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    write_lab(dir.path(), RIP_LAB);

    let engine = Engine::new();
    let out = dir.path().join("compose.yaml");
    engine.write_compose(dir.path(), Some(&out)).unwrap();
    let first = fs::read(&out).unwrap();
    engine.write_compose(dir.path(), Some(&out)).unwrap();
    let second = fs::read(&out).unwrap();
    assert_eq!(first, second);
}

#[test]
fn identity_is_stable_across_input_forms() {
    // The same topology written textually and structurally normalizes to
    // the same model, hence the same identity.
    let textual_dir = tempfile::tempdir().unwrap();
    write_lab(textual_dir.path(), "pc1[0]=\"lan1\"\npc2[0]=\"lan1\"\n");

    let structured_dir = tempfile::tempdir().unwrap();
    fs::write(
        structured_dir.path().join("topolab.toml"),
        r#"
version = 1

[machines.pc1]
interfaces = ["lan1"]

[machines.pc2]
interfaces = ["lan1"]

[networks.lan1]
"#,
    )
    .unwrap();

    let engine = Engine::new();
    let a = engine.compile_dir(textual_dir.path()).unwrap();
    let b = engine.compile_dir(structured_dir.path()).unwrap();
    assert_eq!(a.identity, b.identity);
    assert_eq!(
        a.manifest.document().unwrap(),
        b.manifest.document().unwrap()
    );
}

#[test]
fn admission_gates_concurrent_lab_startups() {
    let dir = tempfile::tempdir().unwrap();
    write_lab(dir.path(), RIP_LAB);

    let engine = Engine::new().with_cost_model(CostModel::with_base_bytes(10));
    let compiled = engine.compile_dir(dir.path()).unwrap();
    // pc1 + pc2 at weight 100, router at 150: 10 + 10 + 15.
    let cost = engine.estimate_cost(&compiled.model);
    assert_eq!(cost, 35);

    // Ceiling fits two labs, not three.
    let controller = Arc::new(AdmissionController::new(2 * cost));
    let a = controller.admit(cost);
    let _b = controller.admit(cost);
    assert_eq!(controller.committed(), 2 * cost);

    let third = {
        let controller = Arc::clone(&controller);
        thread::spawn(move || {
            let _c = controller.admit(cost);
        })
    };
    while controller.queued() != 1 {
        thread::sleep(std::time::Duration::from_millis(2));
    }
    drop(a);
    third.join().unwrap();
}

#[test]
fn boot_sequence_walks_services_in_manifest_order() {
    let dir = tempfile::tempdir().unwrap();
    write_lab(dir.path(), RIP_LAB);
    let compiled = Engine::new().compile_dir(dir.path()).unwrap();

    let seq = BootSequence::for_lab(&compiled.model);
    let booted: Vec<String> = {
        let mut names = Vec::new();
        seq.start_all(|machine| {
            names.push(machine.to_string());
            Ok::<(), ()>(())
        })
        .unwrap();
        names
    };
    let service_names: Vec<&String> = compiled.manifest.services.keys().collect();
    assert_eq!(
        booted,
        service_names.iter().map(|s| (*s).clone()).collect::<Vec<_>>()
    );
}

#[test]
fn startup_estimate_accounts_for_routing_suite() {
    let dir = tempfile::tempdir().unwrap();
    write_lab(dir.path(), RIP_LAB);
    let compiled = Engine::new().compile_dir(dir.path()).unwrap();
    // FRR's 5s delay plus the stabilization margin.
    assert_eq!(estimate_startup_secs(&compiled.model), 10);
}

#[test]
fn controller_from_fake_telemetry_admits_by_available_memory() {
    let telemetry = FixedTelemetry::new(16 << 30, 8 << 30);
    let controller = AdmissionController::from_telemetry(&telemetry, None).unwrap();

    let lab_cost = 4_u64 << 30;
    let one = controller.admit(lab_cost);
    // 6 GiB ceiling (3/4 of 8): a second 4 GiB lab must wait.
    assert!(controller.try_admit(lab_cost).is_none());
    drop(one);
    assert!(controller.try_admit(lab_cost).is_some());
}
