//! Core orchestration for Topolab.
//!
//! This crate ties schema parsing and manifest generation into the
//! [`Engine`] — lab-directory compilation, startup-script discovery, and
//! compose file output — and provides the admission control layer that
//! gates concurrent lab startups on a resource-constrained host:
//! memory-cost estimation ([`CostModel`]), a strict-FIFO capacity gate
//! ([`AdmissionController`]), serialized per-lab boot sequencing
//! ([`BootSequence`]), and injectable memory telemetry.

pub mod admission;
pub mod boot;
pub mod cost;
pub mod engine;
pub mod lifecycle;
pub mod telemetry;

pub use admission::{AdmissionController, AdmissionPermit, AdmissionTicket};
pub use boot::{estimate_startup_secs, BootSequence, STARTUP_STABILIZATION_SECS};
pub use cost::{CostModel, DEFAULT_MACHINE_BYTES};
pub use engine::{CompiledLab, Engine};
pub use lifecycle::{validate_transition, TicketState};
pub use telemetry::{FixedTelemetry, MemoryTelemetry, ProcMeminfo};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdmissionError {
    /// Memory telemetry could not be read and no static ceiling was
    /// configured. Callers choose between retrying with a static fallback
    /// and aborting; the controller never runs unbounded.
    #[error("memory telemetry unavailable and no static ceiling configured")]
    CapacityUnavailable,
    #[error("invalid ticket transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("config error: {0}")]
    Config(#[from] topolab_schema::ConfigError),
    #[error("compose error: {0}")]
    Compose(#[from] topolab_compose::ComposeError),
    #[error("admission error: {0}")]
    Admission(#[from] AdmissionError),
    #[error("no lab configuration found in {0} (expected topology/lab.conf, lab.conf, or topolab.toml)")]
    MissingLabConfig(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
