use super::{json_pretty, EXIT_SUCCESS};
use std::fs;
use std::path::Path;
use topolab_compose::{MergePolicy, StartupOverrides};
use topolab_core::Engine;

pub fn run(
    lab_dir: &Path,
    output: Option<&Path>,
    startup: &[String],
    policy: MergePolicy,
    json: bool,
) -> Result<u8, String> {
    let overrides = parse_overrides(startup)?;

    let engine = Engine::new();
    let compiled = engine
        .compile_dir_with(lab_dir, &overrides, policy)
        .map_err(|e| e.to_string())?;

    let document = compiled.manifest.document().map_err(|e| e.to_string())?;
    let out_path = output.map_or_else(|| lab_dir.join("compose.yaml"), Path::to_path_buf);
    fs::write(&out_path, document).map_err(|e| e.to_string())?;

    if json {
        let payload = serde_json::json!({
            "lab_id": compiled.identity.lab_id,
            "short_id": compiled.identity.short_id,
            "output": out_path,
            "entry_machine": compiled.manifest.entry_machine,
            "machines": compiled.manifest.services.len(),
            "networks": compiled.manifest.networks.len(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "generated {} ({} machines, {} networks)",
            out_path.display(),
            compiled.manifest.services.len(),
            compiled.manifest.networks.len()
        );
        println!("lab_id: {}", compiled.identity.short_id);
    }
    Ok(EXIT_SUCCESS)
}

fn parse_overrides(startup: &[String]) -> Result<StartupOverrides, String> {
    let mut overrides = StartupOverrides::new();
    for spec in startup {
        let Some((machine, command)) = spec.split_once('=') else {
            return Err(format!(
                "invalid --startup '{spec}', expected MACHINE=COMMAND"
            ));
        };
        overrides
            .entry(machine.trim().into())
            .or_default()
            .push(command.trim().to_owned());
    }
    Ok(overrides)
}
