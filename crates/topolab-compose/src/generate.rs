use crate::allocate::AllocatedNetwork;
use crate::manifest::{
    Healthcheck, Ipam, IpamConfig, Manifest, NetworkEntry, ServiceEntry, ServiceNetwork,
};
use crate::ComposeError;
use std::collections::BTreeMap;
use topolab_schema::registry::ROUTER_SYSCTLS;
use topolab_schema::{registry, LabModel, MachineName, MachineSpec, NetworkName};

/// How a per-machine startup override combines with the machine's base
/// startup commands. There is no implicit merge rule: the caller always
/// states the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// The override replaces the base command sequence entirely.
    Replace,
    /// The override runs after the base command sequence.
    Append,
}

/// Per-machine startup command overrides.
pub type StartupOverrides = BTreeMap<MachineName, Vec<String>>;

/// Compose a manifest from a validated model and its network allocation.
///
/// Generation is all-or-nothing: any error leaves no partial output. The
/// entry machine is the model's designated one, else the lexicographically
/// first machine name. Service and network collections are name-sorted, so
/// equal inputs generate byte-identical documents.
pub fn generate(
    model: &LabModel,
    allocated: &BTreeMap<NetworkName, AllocatedNetwork>,
    overrides: &StartupOverrides,
    policy: MergePolicy,
) -> Result<Manifest, ComposeError> {
    let entry = model
        .entry_machine()
        .ok_or(ComposeError::EmptyLab)?
        .to_string();

    let mut services = BTreeMap::new();
    for machine in model.machines.values() {
        let mut attachments = BTreeMap::new();
        for (index, network) in machine.interfaces.iter().enumerate() {
            if !allocated.contains_key(network) {
                return Err(ComposeError::UnresolvedReference {
                    machine: machine.name.to_string(),
                    network: network.to_string(),
                });
            }
            attachments.insert(
                network.to_string(),
                ServiceNetwork {
                    interface_name: format!("eth{index}"),
                },
            );
        }

        let capability = registry::lookup(&machine.image);
        let cap_add = machine.capabilities.clone().unwrap_or_else(|| {
            capability
                .capabilities
                .iter()
                .map(|c| (*c).to_owned())
                .collect()
        });

        let sysctls = if capability.routing {
            ROUTER_SYSCTLS
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect()
        } else {
            BTreeMap::new()
        };

        services.insert(
            machine.name.to_string(),
            ServiceEntry {
                image: machine.image.clone(),
                init: true,
                hostname: machine.name.to_string(),
                cap_add,
                sysctls,
                networks: attachments,
                command: assemble_command(machine, overrides.get(&machine.name), policy),
                healthcheck: healthcheck_for(capability.services),
            },
        );
    }

    let mut networks = BTreeMap::new();
    for net in allocated.values() {
        networks.insert(
            net.name.to_string(),
            NetworkEntry {
                driver: "bridge".to_owned(),
                internal: net.internal,
                ipam: Ipam {
                    driver: "default".to_owned(),
                    config: vec![IpamConfig {
                        subnet: net.subnet.clone(),
                    }],
                },
            },
        );
    }

    Ok(Manifest {
        entry_machine: entry,
        services,
        networks,
    })
}

/// Build the in-container command: flush inherited addresses and routes,
/// run the startup sequence, then keep the container alive.
fn assemble_command(
    machine: &MachineSpec,
    override_commands: Option<&Vec<String>>,
    policy: MergePolicy,
) -> String {
    let mut lines = vec![
        "bash -lc '".to_owned(),
        r#"for d in $(ls /sys/class/net | grep -v lo); do ip addr flush dev "$$d"; done;"#
            .to_owned(),
        r#"for d in $(ls /sys/class/net | grep -v lo); do ip route flush dev "$$d"; done;"#
            .to_owned(),
    ];

    match (override_commands, policy) {
        (Some(commands), MergePolicy::Replace) => lines.extend(commands.iter().cloned()),
        (Some(commands), MergePolicy::Append) => {
            lines.extend(machine.startup.iter().cloned());
            lines.extend(commands.iter().cloned());
        }
        (None, _) => lines.extend(machine.startup.iter().cloned()),
    }

    lines.push("sleep infinity".to_owned());
    lines.push("'".to_owned());
    lines.join("\n")
}

fn healthcheck_for(services: &[&str]) -> Option<Healthcheck> {
    if services.is_empty() {
        return None;
    }
    let probes: Vec<String> = services.iter().map(|s| format!("pgrep -f {s}")).collect();
    Some(Healthcheck {
        test: vec!["CMD-SHELL".to_owned(), probes.join(" && ")],
        interval: "2s".to_owned(),
        timeout: "5s".to_owned(),
        retries: 10,
        start_period: "5s".to_owned(),
    })
}
