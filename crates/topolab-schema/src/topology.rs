use crate::model::{ConfigError, LabModel, MachineSpec, NetworkSpec};
use crate::registry::DEFAULT_IMAGE;
use crate::types::{MachineName, NetworkName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Structured topology document, the TOML alternative to the textual form.
///
/// Both front-ends normalize to the same [`LabModel`]. Unlike the textual
/// form, networks here are declared explicitly in `[networks]`; a machine
/// interface naming an undeclared network is a configuration error.
///
/// ```toml
/// version = 1
/// entry = "router"
///
/// [machines.router]
/// image = "kathara/frr"
/// interfaces = ["lan1", "lan2"]
/// startup = ["vtysh -b"]
///
/// [machines.pc1]
/// interfaces = ["lan1"]
///
/// [networks.lan1]
///
/// [networks.lan2]
/// subnet = "10.0.2.0/24"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TopologyV1 {
    pub version: u32,
    #[serde(default)]
    pub entry: Option<String>,
    pub machines: BTreeMap<String, MachineSection>,
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkSection>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MachineSection {
    #[serde(default)]
    pub image: Option<String>,
    /// Ordered interface list: position 0 is the primary interface.
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub startup: Vec<String>,
    #[serde(default)]
    pub capabilities: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct NetworkSection {
    #[serde(default)]
    pub external: bool,
    #[serde(default)]
    pub subnet: Option<String>,
}

impl TopologyV1 {
    /// Normalize into a validated [`LabModel`].
    pub fn normalize(&self) -> Result<LabModel, ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::UnsupportedVersion(self.version));
        }

        let machines = self
            .machines
            .iter()
            .map(|(name, section)| MachineSpec {
                name: MachineName::new(name.clone()),
                interfaces: section
                    .interfaces
                    .iter()
                    .map(|n| NetworkName::new(n.clone()))
                    .collect(),
                image: section
                    .image
                    .clone()
                    .unwrap_or_else(|| DEFAULT_IMAGE.to_owned()),
                startup: section.startup.clone(),
                capabilities: section.capabilities.clone(),
            })
            .collect();

        let networks = self
            .networks
            .iter()
            .map(|(name, section)| NetworkSpec {
                name: NetworkName::new(name.clone()),
                external: section.external,
                subnet: section.subnet.clone(),
            })
            .collect();

        let entry = self.entry.clone().map(MachineName::new);
        let mut model = LabModel::new(machines, networks, entry)?;
        model.metadata = self.metadata.clone();
        Ok(model)
    }
}

pub fn parse_topology_str(input: &str) -> Result<TopologyV1, ConfigError> {
    Ok(toml::from_str(input)?)
}

pub fn parse_topology_file(path: impl AsRef<Path>) -> Result<TopologyV1, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_topology_str(&content)
}
