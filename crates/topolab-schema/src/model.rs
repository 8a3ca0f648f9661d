use crate::registry::DEFAULT_IMAGE;
use crate::types::{MachineName, NetworkName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read lab config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse topology: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("unsupported topology version: {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("lab declares no machines")]
    NoMachines,
    #[error("machine name must not be empty")]
    EmptyMachineName,
    #[error("network name must not be empty")]
    EmptyNetworkName,
    #[error("duplicate machine name: '{0}'")]
    DuplicateMachine(String),
    #[error("duplicate network name: '{0}'")]
    DuplicateNetwork(String),
    #[error("machine '{machine}' declares interface index {index} more than once")]
    DuplicateInterface { machine: String, index: u32 },
    #[error("machine '{machine}' has non-contiguous interface indices: missing index {missing}")]
    NonContiguousInterfaces { machine: String, missing: u32 },
    #[error("machine '{machine}' references undeclared network '{network}'")]
    UndeclaredNetwork { machine: String, network: String },
    #[error("entry machine '{0}' is not declared in the lab")]
    UnknownEntryMachine(String),
    #[error("malformed declaration at line {line}: '{text}'")]
    MalformedLine { line: usize, text: String },
    #[error("unterminated quoted value at line {line}")]
    UnterminatedQuote { line: usize },
}

/// A raw interface declaration as it appears in the input: an explicit
/// index bound to a network name. Front-ends produce these; normalization
/// validates that indices are unique and contiguous from zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceBinding {
    pub index: u32,
    pub network: NetworkName,
}

/// One simulated host within a lab.
///
/// `interfaces` is ordered: position `i` is the machine's `eth{i}` device,
/// so the first entry names the network behind its primary interface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MachineSpec {
    pub name: MachineName,
    pub interfaces: Vec<NetworkName>,
    pub image: String,
    #[serde(default)]
    pub startup: Vec<String>,
    /// Explicit capability flags. `None` means "derive from the image
    /// capability registry".
    #[serde(default)]
    pub capabilities: Option<Vec<String>>,
}

impl MachineSpec {
    /// Build a machine from raw indexed bindings, validating that interface
    /// indices are unique and contiguous from zero.
    pub fn from_bindings(
        name: MachineName,
        bindings: Vec<InterfaceBinding>,
        image: Option<String>,
    ) -> Result<Self, ConfigError> {
        if name.as_str().trim().is_empty() {
            return Err(ConfigError::EmptyMachineName);
        }

        let mut by_index: BTreeMap<u32, NetworkName> = BTreeMap::new();
        for binding in bindings {
            if by_index.insert(binding.index, binding.network).is_some() {
                return Err(ConfigError::DuplicateInterface {
                    machine: name.to_string(),
                    index: binding.index,
                });
            }
        }
        if let Some((&max, _)) = by_index.last_key_value() {
            for i in 0..=max {
                if !by_index.contains_key(&i) {
                    return Err(ConfigError::NonContiguousInterfaces {
                        machine: name.to_string(),
                        missing: i,
                    });
                }
            }
        }
        let interfaces = by_index.into_values().collect();

        Ok(Self {
            name,
            interfaces,
            image: image.unwrap_or_else(|| DEFAULT_IMAGE.to_owned()),
            startup: Vec::new(),
            capabilities: None,
        })
    }
}

/// A collision-domain network.
///
/// Networks are isolated by default: labs simulate private infrastructure
/// and must not leak traffic externally unless explicitly requested.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkSpec {
    pub name: NetworkName,
    #[serde(default)]
    pub external: bool,
    #[serde(default)]
    pub subnet: Option<String>,
}

impl NetworkSpec {
    pub fn isolated(name: impl Into<NetworkName>) -> Self {
        Self {
            name: name.into(),
            external: false,
            subnet: None,
        }
    }
}

/// Normalized, validated in-memory representation of a lab.
///
/// Machine and network maps are name-keyed and sorted, so serializing the
/// model (and everything derived from it) is deterministic regardless of
/// declaration order in the input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LabModel {
    pub machines: BTreeMap<MachineName, MachineSpec>,
    pub networks: BTreeMap<NetworkName, NetworkSpec>,
    /// Explicitly designated entry machine, if any. Use [`LabModel::entry_machine`]
    /// for the resolved value.
    pub entry: Option<MachineName>,
    /// Free-form lab metadata captured from the input (name, description, ...).
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl LabModel {
    /// Assemble and validate a model from its parts.
    pub fn new(
        machines: Vec<MachineSpec>,
        networks: Vec<NetworkSpec>,
        entry: Option<MachineName>,
    ) -> Result<Self, ConfigError> {
        if machines.is_empty() {
            return Err(ConfigError::NoMachines);
        }

        let mut network_map = BTreeMap::new();
        for net in networks {
            if net.name.as_str().trim().is_empty() {
                return Err(ConfigError::EmptyNetworkName);
            }
            if network_map.contains_key(&net.name) {
                return Err(ConfigError::DuplicateNetwork(net.name.to_string()));
            }
            network_map.insert(net.name.clone(), net);
        }

        let mut machine_map = BTreeMap::new();
        for machine in machines {
            if machine.name.as_str().trim().is_empty() {
                return Err(ConfigError::EmptyMachineName);
            }
            if machine_map.contains_key(&machine.name) {
                return Err(ConfigError::DuplicateMachine(machine.name.to_string()));
            }
            machine_map.insert(machine.name.clone(), machine);
        }

        let model = Self {
            machines: machine_map,
            networks: network_map,
            entry,
            metadata: BTreeMap::new(),
        };
        model.validate()?;
        Ok(model)
    }

    /// Re-check structural invariants: every referenced network is declared
    /// and the explicit entry machine, if any, exists.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for machine in self.machines.values() {
            for network in &machine.interfaces {
                if !self.networks.contains_key(network) {
                    return Err(ConfigError::UndeclaredNetwork {
                        machine: machine.name.to_string(),
                        network: network.to_string(),
                    });
                }
            }
        }
        if let Some(entry) = &self.entry {
            if !self.machines.contains_key(entry) {
                return Err(ConfigError::UnknownEntryMachine(entry.to_string()));
            }
        }
        Ok(())
    }

    /// Resolve the entry machine: the explicitly designated one, else the
    /// lexicographically first machine name. `None` only for an empty model.
    ///
    /// The lexicographic default is deliberate: downstream tooling binds to
    /// "the entry machine" by convention, and the choice must be stable
    /// across runs for evaluations to be reproducible.
    pub fn entry_machine(&self) -> Option<&MachineName> {
        self.entry.as_ref().or_else(|| self.machines.keys().next())
    }

    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
