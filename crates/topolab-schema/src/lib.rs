//! Lab config parsing, normalization, and image metadata for Topolab.
//!
//! This crate defines the schema layer: textual `lab.conf` parsing
//! ([`parse_lab_conf_str`]), the structured TOML topology front-end
//! ([`TopologyV1`]), the normalized lab model ([`LabModel`]), the static
//! image capability registry ([`lookup`]), and deterministic lab identity
//! computation ([`compute_lab_id`]).

pub mod identity;
pub mod labconf;
pub mod model;
pub mod registry;
pub mod topology;
pub mod types;

pub use identity::{compute_lab_id, LabIdentity};
pub use labconf::{parse_lab_conf_str, serialize_lab_conf};
pub use model::{ConfigError, InterfaceBinding, LabModel, MachineSpec, NetworkSpec};
pub use registry::{
    expected_services, has_management_cli, is_routing_image, lookup, startup_delay_secs,
    ImageCapability, DEFAULT_IMAGE,
};
pub use topology::{parse_topology_file, parse_topology_str, TopologyV1};
pub use types::{LabId, MachineName, NetworkName, ShortId};
