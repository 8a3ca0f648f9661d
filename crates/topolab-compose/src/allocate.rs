use serde::Serialize;
use std::collections::BTreeMap;
use topolab_schema::{LabModel, NetworkName};

/// Base of the derived-subnet pool: 10.128.0.0. Each network without an
/// explicit subnet receives one /28 (16 addresses) out of this pool, which
/// keeps large labs from exhausting the container runtime's default
/// address pools.
const SUBNET_BASE: u32 = 0x0A80_0000;
const SUBNET_STRIDE: u32 = 16;

/// A network with its concrete identity fixed.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AllocatedNetwork {
    pub name: NetworkName,
    pub subnet: String,
    /// Isolated from the outside world. True unless the model explicitly
    /// marks the network as externally reachable.
    pub internal: bool,
}

/// Deterministically allocate every network declared in the model.
///
/// Networks are processed in name order; the idx-th network without an
/// explicit subnet receives `10.128.0.0 + idx*16` as a /28. The mapping
/// depends only on the declared network set, never on process state or
/// prior allocations, so equal models always allocate identically.
pub fn allocate(model: &LabModel) -> BTreeMap<NetworkName, AllocatedNetwork> {
    let mut allocated = BTreeMap::new();
    for (idx, spec) in model.networks.values().enumerate() {
        let subnet = spec.subnet.clone().unwrap_or_else(|| {
            let addr = SUBNET_BASE + idx as u32 * SUBNET_STRIDE;
            format!(
                "{}.{}.{}.{}/28",
                (addr >> 24) & 0xFF,
                (addr >> 16) & 0xFF,
                (addr >> 8) & 0xFF,
                addr & 0xFF
            )
        });
        allocated.insert(
            spec.name.clone(),
            AllocatedNetwork {
                name: spec.name.clone(),
                subnet,
                internal: !spec.external,
            },
        );
    }
    allocated
}
