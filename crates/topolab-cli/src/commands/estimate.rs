use super::{format_bytes, json_pretty, EXIT_SUCCESS};
use std::path::Path;
use topolab_core::{estimate_startup_secs, AdmissionController, CoreError, Engine, ProcMeminfo};

pub fn run(lab_dir: &Path, static_ceiling: Option<u64>, json: bool) -> Result<u8, String> {
    let engine = Engine::new();
    let compiled = engine
        .compile_dir(lab_dir)
        .map_err(|e| e.to_string())?;

    let cost = engine.estimate_cost(&compiled.model);
    let startup_secs = estimate_startup_secs(&compiled.model);

    let controller = AdmissionController::from_telemetry(&ProcMeminfo, static_ceiling)
        .map_err(|e| CoreError::from(e).to_string())?;
    let ceiling = controller.ceiling();
    // At least one lab is always admitted, even over the ceiling.
    let concurrent = (ceiling / cost.max(1)).max(1);

    if json {
        let payload = serde_json::json!({
            "short_id": compiled.identity.short_id,
            "machines": compiled.model.machines.len(),
            "estimated_cost_bytes": cost,
            "estimated_startup_secs": startup_secs,
            "ceiling_bytes": ceiling,
            "concurrent_labs": concurrent,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "lab {}: {} machines, estimated cost {}",
            compiled.identity.short_id,
            compiled.model.machines.len(),
            format_bytes(cost)
        );
        println!("estimated startup time: {startup_secs}s");
        println!(
            "host ceiling {}: up to {concurrent} concurrent lab(s)",
            format_bytes(ceiling)
        );
    }
    Ok(EXIT_SUCCESS)
}
