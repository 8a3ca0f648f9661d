use crate::model::LabModel;
use crate::types::{LabId, ShortId};
use serde::Serialize;

/// Deterministic identity for a lab, derived from its normalized model.
///
/// Two labs with equal models (regardless of input form or declaration
/// order) share an identity. Used to cache generated manifests and to diff
/// expected-vs-actual output in tests.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LabIdentity {
    pub lab_id: LabId,
    pub short_id: ShortId,
}

pub fn compute_lab_id(model: &LabModel) -> Result<LabIdentity, serde_json::Error> {
    let mut hasher = blake3::Hasher::new();

    hasher.update(model.canonical_json()?.as_bytes());

    for machine in model.machines.values() {
        hasher.update(format!("machine:{}:{}", machine.name, machine.image).as_bytes());
        for (index, network) in machine.interfaces.iter().enumerate() {
            hasher.update(format!("iface:{}:{index}:{network}", machine.name).as_bytes());
        }
    }
    for network in model.networks.values() {
        hasher.update(
            format!(
                "network:{}:{}:{}",
                network.name,
                network.external,
                network.subnet.as_deref().unwrap_or("")
            )
            .as_bytes(),
        );
    }
    if let Some(entry) = model.entry_machine() {
        hasher.update(format!("entry:{entry}").as_bytes());
    }

    let hex = hasher.finalize().to_hex().to_string();
    let short = hex[..12].to_owned();

    Ok(LabIdentity {
        lab_id: LabId::new(hex),
        short_id: ShortId::new(short),
    })
}
