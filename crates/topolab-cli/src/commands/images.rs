use super::{json_pretty, EXIT_SUCCESS};
use topolab_schema::registry::BUILTIN_IMAGES;

pub fn run(json: bool) -> Result<u8, String> {
    if json {
        println!("{}", json_pretty(&BUILTIN_IMAGES)?);
        return Ok(EXIT_SUCCESS);
    }

    println!(
        "{:<18} {:<8} {:<6} {:>6} {:>7}  services",
        "image", "routing", "cli", "delay", "weight"
    );
    for cap in BUILTIN_IMAGES {
        println!(
            "{:<18} {:<8} {:<6} {:>5}s {:>6}%  {}",
            cap.image,
            if cap.routing { "yes" } else { "no" },
            if cap.management_cli { "yes" } else { "no" },
            cap.startup_delay_secs,
            cap.memory_weight,
            cap.services.join(", ")
        );
    }
    Ok(EXIT_SUCCESS)
}
