use super::{json_pretty, EXIT_SUCCESS};
use std::path::Path;
use topolab_core::Engine;
use topolab_schema::registry;

pub fn run(lab_dir: &Path, json: bool) -> Result<u8, String> {
    let compiled = Engine::new()
        .compile_dir(lab_dir)
        .map_err(|e| e.to_string())?;

    if json {
        let payload = serde_json::json!({
            "lab_id": compiled.identity.lab_id,
            "short_id": compiled.identity.short_id,
            "entry_machine": compiled.manifest.entry_machine,
            "model": compiled.model,
        });
        println!("{}", json_pretty(&payload)?);
        return Ok(EXIT_SUCCESS);
    }

    println!("lab {}", compiled.identity.short_id);
    println!("entry machine: {}", compiled.manifest.entry_machine);
    for (key, value) in &compiled.model.metadata {
        println!("{}: {value}", key.to_lowercase());
    }
    println!();

    println!("machines:");
    for machine in compiled.model.machines.values() {
        let capability = registry::lookup(&machine.image);
        let role = if capability.routing { "router" } else { "host" };
        let interfaces: Vec<String> = machine
            .interfaces
            .iter()
            .enumerate()
            .map(|(i, net)| format!("eth{i}={net}"))
            .collect();
        println!(
            "  {} ({role}, {}) [{}]",
            machine.name,
            machine.image,
            interfaces.join(", ")
        );
    }

    println!("networks:");
    for (name, net) in &compiled.manifest.networks {
        let exposure = if net.internal { "internal" } else { "external" };
        println!("  {name} ({exposure}, {})", net.ipam.config[0].subnet);
    }
    Ok(EXIT_SUCCESS)
}
