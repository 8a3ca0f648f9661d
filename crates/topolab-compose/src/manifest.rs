//! Typed compose document.
//!
//! The manifest mirrors the container-orchestration compose format: a
//! `services` map and a `networks` map, plus an `x-entry-machine` extension
//! field recording the resolved entry machine. All collections are
//! name-keyed `BTreeMap`s, so serialization order is fixed and two
//! generations from equal inputs are byte-identical.

use crate::ComposeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Manifest {
    #[serde(rename = "x-entry-machine")]
    pub entry_machine: String,
    pub services: BTreeMap<String, ServiceEntry>,
    pub networks: BTreeMap<String, NetworkEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceEntry {
    pub image: String,
    pub init: bool,
    pub hostname: String,
    pub cap_add: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sysctls: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub networks: BTreeMap<String, ServiceNetwork>,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<Healthcheck>,
}

/// Per-service network attachment. `interface_name` pins the in-container
/// device name so interface order from the lab description survives into
/// the running machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceNetwork {
    pub interface_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Healthcheck {
    pub test: Vec<String>,
    pub interval: String,
    pub timeout: String,
    pub retries: u32,
    pub start_period: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkEntry {
    pub driver: String,
    pub internal: bool,
    pub ipam: Ipam,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ipam {
    pub driver: String,
    pub config: Vec<IpamConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IpamConfig {
    pub subnet: String,
}

impl Manifest {
    /// Serialize to compose YAML.
    pub fn to_yaml(&self) -> Result<String, ComposeError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Serialize to compose YAML with a generated header comment listing
    /// the lab's machines and networks.
    pub fn document(&self) -> Result<String, ComposeError> {
        let machines: Vec<&str> = self.services.keys().map(String::as_str).collect();
        let networks: Vec<&str> = self.networks.keys().map(String::as_str).collect();
        let mut out = String::new();
        out.push_str("# Generated lab manifest. Do not edit; regenerate from the lab description.\n");
        out.push_str(&format!("# Machines: {}\n", machines.join(", ")));
        out.push_str(&format!("# Networks: {}\n", networks.join(", ")));
        out.push_str(&format!("# Entry machine: {}\n\n", self.entry_machine));
        out.push_str(&self.to_yaml()?);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_manifest() -> Manifest {
        let mut services = BTreeMap::new();
        services.insert(
            "pc1".to_owned(),
            ServiceEntry {
                image: "kathara/base".to_owned(),
                init: true,
                hostname: "pc1".to_owned(),
                cap_add: vec!["NET_ADMIN".to_owned()],
                sysctls: BTreeMap::new(),
                networks: BTreeMap::from([(
                    "lan1".to_owned(),
                    ServiceNetwork {
                        interface_name: "eth0".to_owned(),
                    },
                )]),
                command: "sleep infinity".to_owned(),
                healthcheck: None,
            },
        );
        let mut networks = BTreeMap::new();
        networks.insert(
            "lan1".to_owned(),
            NetworkEntry {
                driver: "bridge".to_owned(),
                internal: true,
                ipam: Ipam {
                    driver: "default".to_owned(),
                    config: vec![IpamConfig {
                        subnet: "10.128.0.0/28".to_owned(),
                    }],
                },
            },
        );
        Manifest {
            entry_machine: "pc1".to_owned(),
            services,
            networks,
        }
    }

    #[test]
    fn serializes_to_valid_yaml_and_parses_back() {
        let manifest = sample_manifest();
        let yaml = manifest.to_yaml().unwrap();
        assert!(yaml.contains("services:"));
        assert!(yaml.contains("networks:"));
        assert!(yaml.contains("x-entry-machine: pc1"));

        let parsed: Manifest = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn empty_sysctls_are_omitted() {
        let yaml = sample_manifest().to_yaml().unwrap();
        assert!(!yaml.contains("sysctls"));
        assert!(!yaml.contains("healthcheck"));
    }

    #[test]
    fn document_carries_header_comment() {
        let doc = sample_manifest().document().unwrap();
        assert!(doc.starts_with("# Generated lab manifest"));
        assert!(doc.contains("# Machines: pc1"));
        assert!(doc.contains("# Networks: lan1"));
        assert!(doc.contains("# Entry machine: pc1"));
    }

    #[test]
    fn serialization_is_byte_stable() {
        let a = sample_manifest().to_yaml().unwrap();
        let b = sample_manifest().to_yaml().unwrap();
        assert_eq!(a, b);
    }
}
