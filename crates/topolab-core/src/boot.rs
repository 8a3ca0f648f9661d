//! Serialized per-lab boot sequencing.
//!
//! Starting every machine of a lab at once produces a burst of image pulls
//! and service initializations that starve one another. A [`BootSequence`]
//! starts machines one at a time: the closure for one machine must return
//! (its start completed or confirmed in-flight) before the next begins.
//! Sequences of different labs interleave freely; the guard is per-lab.

use std::sync::{Mutex, MutexGuard};
use topolab_schema::{registry, LabModel, MachineName};

/// Margin added to startup estimates so slow services settle before the
/// lab is considered up.
pub const STARTUP_STABILIZATION_SECS: u64 = 5;

pub struct BootSequence {
    order: Vec<MachineName>,
    inflight: Mutex<()>,
}

impl BootSequence {
    /// Boot order for a lab: machines in name order, matching the manifest's
    /// service order.
    pub fn for_lab(model: &LabModel) -> Self {
        Self {
            order: model.machines.keys().cloned().collect(),
            inflight: Mutex::new(()),
        }
    }

    pub fn order(&self) -> &[MachineName] {
        &self.order
    }

    /// Run `start` for every machine, strictly one at a time.
    ///
    /// Stops at the first error; machines already started are the caller's
    /// to tear down (the admission permit's release is unaffected).
    pub fn start_all<E>(
        &self,
        mut start: impl FnMut(&MachineName) -> Result<(), E>,
    ) -> Result<(), E> {
        let _guard: MutexGuard<'_, ()> = match self.inflight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for machine in &self.order {
            start(machine)?;
        }
        Ok(())
    }
}

/// Seconds a lab typically needs from first container start to usable
/// services: the slowest image's startup delay plus a stabilization margin.
pub fn estimate_startup_secs(model: &LabModel) -> u64 {
    let slowest = model
        .machines
        .values()
        .map(|m| registry::startup_delay_secs(&m.image))
        .max()
        .unwrap_or(STARTUP_STABILIZATION_SECS);
    slowest + STARTUP_STABILIZATION_SECS
}
