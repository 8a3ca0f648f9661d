//! Static capability registry for lab machine images.
//!
//! Each known image carries behavioral traits the compiler and the admission
//! controller consume: whether the image runs a routing suite, whether it
//! ships a management CLI, which capability flags its containers need, which
//! services are expected to come up, how long startup typically takes, and a
//! relative memory weight. The registry is a fixed table constructed at
//! compile time; lookups are total and never fail.

use serde::Serialize;

/// Image assigned to machines that do not name one.
pub const DEFAULT_IMAGE: &str = "kathara/base";

/// Capability flags for machines running a routing suite.
pub const ROUTER_CAPABILITIES: &[&str] = &["NET_ADMIN", "SYS_ADMIN"];

/// Capability flags for plain hosts.
pub const HOST_CAPABILITIES: &[&str] = &["NET_ADMIN"];

/// Sysctl enabling packet forwarding, applied to routing machines.
pub const ROUTER_SYSCTLS: &[(&str, &str)] = &[("net.ipv4.ip_forward", "1")];

/// Per-image behavioral traits.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImageCapability {
    pub image: &'static str,
    /// The image runs a routing suite (needs forwarding sysctls and
    /// elevated capabilities).
    pub routing: bool,
    /// The image ships an interactive management CLI for its daemons.
    pub management_cli: bool,
    /// Capability flags containers of this image are granted.
    pub capabilities: &'static [&'static str],
    /// Daemons expected to be running once the machine is up. Used for
    /// manifest healthchecks.
    pub services: &'static [&'static str],
    /// Seconds the image typically needs before its services are usable.
    pub startup_delay_secs: u64,
    /// Relative memory cost in percent of the base machine cost
    /// (100 = baseline).
    pub memory_weight: u32,
}

pub const BUILTIN_IMAGES: &[ImageCapability] = &[
    ImageCapability {
        image: "kathara/frr",
        routing: true,
        management_cli: true,
        capabilities: ROUTER_CAPABILITIES,
        services: &["frr"],
        startup_delay_secs: 5,
        memory_weight: 150,
    },
    ImageCapability {
        image: "kathara/quagga",
        routing: true,
        management_cli: true,
        capabilities: ROUTER_CAPABILITIES,
        services: &["zebra", "ospfd", "bgpd", "ripd"],
        startup_delay_secs: 5,
        memory_weight: 150,
    },
    ImageCapability {
        image: "kathara/openbgpd",
        routing: true,
        management_cli: false,
        capabilities: ROUTER_CAPABILITIES,
        services: &["openbgpd"],
        startup_delay_secs: 3,
        memory_weight: 150,
    },
    ImageCapability {
        image: "kathara/bird",
        routing: true,
        management_cli: false,
        capabilities: ROUTER_CAPABILITIES,
        services: &["bird"],
        startup_delay_secs: 3,
        memory_weight: 150,
    },
    ImageCapability {
        image: "kathara/bind",
        routing: false,
        management_cli: false,
        capabilities: HOST_CAPABILITIES,
        services: &["named"],
        startup_delay_secs: 3,
        memory_weight: 100,
    },
    ImageCapability {
        image: "kathara/sdn",
        routing: false,
        management_cli: false,
        capabilities: HOST_CAPABILITIES,
        services: &["openvswitch-switch"],
        startup_delay_secs: 5,
        memory_weight: 125,
    },
    ImageCapability {
        image: "kathara/p4",
        routing: false,
        management_cli: false,
        capabilities: HOST_CAPABILITIES,
        services: &["simple_switch_grpc"],
        startup_delay_secs: 5,
        memory_weight: 125,
    },
    ImageCapability {
        image: "kathara/scion",
        routing: false,
        management_cli: false,
        capabilities: HOST_CAPABILITIES,
        services: &[],
        startup_delay_secs: 8,
        memory_weight: 100,
    },
    ImageCapability {
        image: "kathara/base",
        routing: false,
        management_cli: false,
        capabilities: HOST_CAPABILITIES,
        services: &[],
        startup_delay_secs: 1,
        memory_weight: 100,
    },
];

/// Conservative record for images the registry does not know: no routing,
/// no management CLI, minimal capabilities. The system favors "runs with
/// reduced assumptions" over "refuses to run".
const FALLBACK: ImageCapability = ImageCapability {
    image: "",
    routing: false,
    management_cli: false,
    capabilities: HOST_CAPABILITIES,
    services: &[],
    startup_delay_secs: 1,
    memory_weight: 100,
};

/// Look up the capability record for an image reference.
///
/// Tries an exact match first, then the reference with its tag stripped
/// (`kathara/bind:9.18` matches `kathara/bind`). Unknown references resolve
/// to the conservative fallback, never an error.
pub fn lookup(image: &str) -> &'static ImageCapability {
    let exact = BUILTIN_IMAGES.iter().find(|c| c.image == image);
    if let Some(found) = exact {
        return found;
    }
    let base = image.split(':').next().unwrap_or(image);
    BUILTIN_IMAGES
        .iter()
        .find(|c| c.image == base)
        .unwrap_or(&FALLBACK)
}

pub fn is_routing_image(image: &str) -> bool {
    lookup(image).routing
}

pub fn has_management_cli(image: &str) -> bool {
    lookup(image).management_cli
}

pub fn startup_delay_secs(image: &str) -> u64 {
    lookup(image).startup_delay_secs
}

pub fn expected_services(image: &str) -> &'static [&'static str] {
    lookup(image).services
}
