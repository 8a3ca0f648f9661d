//! Textual lab description front-end.
//!
//! The textual form is a line-oriented key-value format:
//!
//! ```text
//! # two hosts behind one router
//! LAB_NAME="demo"
//! ENTRY="pc1"
//!
//! pc1[0]="lan1"
//! router[0]="lan1"
//! router[1]="lan2"
//! router[image]="kathara/frr"
//! pc2[0]="lan2"
//! ```
//!
//! `machine[N]="net"` binds interface index `N` to a network; index order is
//! load-bearing (index 0 becomes the primary interface). `machine[image]`
//! assigns the container image. Bare `KEY=value` lines and lines whose
//! machine part is all-uppercase are lab metadata; the `ENTRY` key designates
//! the entry machine. Comments and blank lines are ignored. Unrecognized
//! per-machine attributes are skipped.
//!
//! Networks have no separate declaration in this form: referencing a network
//! in a binding declares it, isolated by default.
//!
//! Values quote with `"` and escape `\"` and `\\`; [`serialize_lab_conf`]
//! emits a canonical rendering that reparses to the same model.

use crate::model::{ConfigError, InterfaceBinding, LabModel, MachineSpec, NetworkSpec};
use crate::types::{MachineName, NetworkName};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Default)]
struct RawMachine {
    bindings: Vec<InterfaceBinding>,
    image: Option<String>,
}

/// Parse the textual lab description into a normalized [`LabModel`].
pub fn parse_lab_conf_str(input: &str) -> Result<LabModel, ConfigError> {
    let mut raw: BTreeMap<String, RawMachine> = BTreeMap::new();
    let mut metadata: BTreeMap<String, String> = BTreeMap::new();

    for (i, raw_line) in input.lines().enumerate() {
        let line = raw_line.trim();
        let lineno = i + 1;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some(eq) = line.find('=') else {
            return Err(malformed(lineno, line));
        };
        let key_part = line[..eq].trim_end();
        let value = parse_value(&line[eq + 1..], lineno, line)?;

        if let Some(open) = key_part.find('[') {
            let name = key_part[..open].trim();
            let close = key_part[open + 1..]
                .find(']')
                .map(|p| open + 1 + p)
                .ok_or_else(|| malformed(lineno, line))?;
            if !key_part[close + 1..].trim().is_empty() || !is_ident(name) {
                return Err(malformed(lineno, line));
            }
            let attr = key_part[open + 1..close].trim();

            if is_metadata_name(name) {
                metadata.insert(format!("{name}_{attr}").to_ascii_uppercase(), value);
            } else if attr.chars().all(|c| c.is_ascii_digit()) && !attr.is_empty() {
                let index: u32 = attr.parse().map_err(|_| malformed(lineno, line))?;
                raw.entry(name.to_owned())
                    .or_default()
                    .bindings
                    .push(InterfaceBinding {
                        index,
                        network: NetworkName::new(value),
                    });
            } else if attr.eq_ignore_ascii_case("image") {
                raw.entry(name.to_owned()).or_default().image = Some(value);
            }
            // Other per-machine attributes are not part of the model.
        } else {
            let key = key_part.trim();
            if !is_ident(key) {
                return Err(malformed(lineno, line));
            }
            metadata.insert(key.to_ascii_uppercase(), value);
        }
    }

    if raw.is_empty() {
        return Err(ConfigError::NoMachines);
    }

    let mut networks: BTreeSet<NetworkName> = BTreeSet::new();
    let mut machines = Vec::with_capacity(raw.len());
    for (name, decl) in raw {
        for binding in &decl.bindings {
            networks.insert(binding.network.clone());
        }
        machines.push(MachineSpec::from_bindings(
            MachineName::new(name),
            decl.bindings,
            decl.image,
        )?);
    }

    let entry = metadata.remove("ENTRY").map(MachineName::new);
    let mut model = LabModel::new(
        machines,
        networks.into_iter().map(NetworkSpec::isolated).collect(),
        entry,
    )?;
    model.metadata = metadata;
    Ok(model)
}

/// Render a model back into the textual form.
///
/// The rendering is canonical: metadata first (sorted), then per-machine
/// binding and image lines in name order. Machine startup commands live in
/// separate startup scripts and are not part of this format. The output
/// reparses to an equal model.
pub fn serialize_lab_conf(model: &LabModel) -> String {
    let mut out = String::new();

    if let Some(entry) = &model.entry {
        out.push_str(&format!("ENTRY={}\n", quote_value(entry.as_str())));
    }
    for (key, value) in &model.metadata {
        out.push_str(&format!("{key}={}\n", quote_value(value)));
    }
    if !out.is_empty() {
        out.push('\n');
    }

    for machine in model.machines.values() {
        for (index, network) in machine.interfaces.iter().enumerate() {
            out.push_str(&format!(
                "{}[{index}]={}\n",
                machine.name,
                quote_value(network.as_str())
            ));
        }
        out.push_str(&format!(
            "{}[image]={}\n",
            machine.name,
            quote_value(&machine.image)
        ));
    }

    out
}

fn malformed(line: usize, text: &str) -> ConfigError {
    ConfigError::MalformedLine {
        line,
        text: text.to_owned(),
    }
}

fn is_ident(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
}

/// All-uppercase machine parts address lab metadata, not machines
/// (machine names are lowercase by convention).
fn is_metadata_name(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_uppercase()) && !name.chars().any(|c| c.is_ascii_lowercase())
}

fn parse_value(raw: &str, line: usize, text: &str) -> Result<String, ConfigError> {
    let raw = raw.trim();
    let Some(rest) = raw.strip_prefix('"') else {
        return Ok(raw.to_owned());
    };

    let mut out = String::new();
    let mut chars = rest.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped @ ('"' | '\\')) => out.push(escaped),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => return Err(ConfigError::UnterminatedQuote { line }),
            },
            '"' => {
                let trailing: String = chars.collect();
                if trailing.trim().is_empty() {
                    return Ok(out);
                }
                return Err(malformed(line, text));
            }
            other => out.push(other),
        }
    }
    Err(ConfigError::UnterminatedQuote { line })
}

fn quote_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
