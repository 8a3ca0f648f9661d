//! Translation back-end for Topolab: deterministic network allocation and
//! compose manifest generation.
//!
//! The compiler front half (parsing, normalization) lives in
//! `topolab-schema`; this crate takes a validated [`topolab_schema::LabModel`]
//! through [`allocate`] and [`generate`] to a byte-for-byte reproducible
//! [`Manifest`].

pub mod allocate;
pub mod generate;
pub mod manifest;

pub use allocate::{allocate, AllocatedNetwork};
pub use generate::{generate, MergePolicy, StartupOverrides};
pub use manifest::{Healthcheck, Manifest, NetworkEntry, ServiceEntry, ServiceNetwork};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComposeError {
    /// A machine references a network the allocator never produced. This is
    /// a defensive invariant check: a model that passed schema validation
    /// cannot trip it.
    #[error("machine '{machine}' references unallocated network '{network}'")]
    UnresolvedReference { machine: String, network: String },
    #[error("cannot generate a manifest for a lab with no machines")]
    EmptyLab,
    #[error("manifest serialization failed: {0}")]
    Serialize(#[from] serde_yaml::Error),
}
