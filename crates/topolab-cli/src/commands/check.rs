use super::{json_pretty, EXIT_SUCCESS};
use std::path::Path;
use topolab_core::Engine;

pub fn run(lab_dir: &Path, json: bool) -> Result<u8, String> {
    let compiled = Engine::new()
        .compile_dir(lab_dir)
        .map_err(|e| e.to_string())?;

    if json {
        let payload = serde_json::json!({
            "status": "ok",
            "short_id": compiled.identity.short_id,
            "machines": compiled.model.machines.len(),
            "networks": compiled.model.networks.len(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "ok: {} machines, {} networks, entry machine '{}'",
            compiled.model.machines.len(),
            compiled.model.networks.len(),
            compiled.manifest.entry_machine
        );
    }
    Ok(EXIT_SUCCESS)
}
