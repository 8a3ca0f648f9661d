use std::collections::BTreeMap;
use topolab_schema::{registry, LabModel};

/// Baseline memory cost of one machine. Lab containers run full service
/// stacks, not single processes; observed steady-state usage is on the
/// order of 1.7 GiB each.
pub const DEFAULT_MACHINE_BYTES: u64 = 1700 * 1024 * 1024;

/// Estimates a lab's memory demand from its machine count and image mix.
///
/// Each machine costs the base bytes scaled by its image's relative weight
/// (percent, 100 = baseline): routing suites cost more than plain hosts.
/// Weights come from the image capability registry unless overridden per
/// image reference. The estimate is computed once from the model, before
/// any machine is started.
#[derive(Debug, Clone)]
pub struct CostModel {
    pub base_machine_bytes: u64,
    pub weight_overrides: BTreeMap<String, u32>,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            base_machine_bytes: DEFAULT_MACHINE_BYTES,
            weight_overrides: BTreeMap::new(),
        }
    }
}

impl CostModel {
    pub fn with_base_bytes(base_machine_bytes: u64) -> Self {
        Self {
            base_machine_bytes,
            weight_overrides: BTreeMap::new(),
        }
    }

    pub fn override_weight(mut self, image: impl Into<String>, weight_percent: u32) -> Self {
        self.weight_overrides.insert(image.into(), weight_percent);
        self
    }

    /// Relative weight for an image, in percent of the base cost.
    pub fn weight(&self, image: &str) -> u32 {
        if let Some(w) = self.weight_overrides.get(image) {
            return *w;
        }
        let base = image.split(':').next().unwrap_or(image);
        if let Some(w) = self.weight_overrides.get(base) {
            return *w;
        }
        registry::lookup(image).memory_weight
    }

    pub fn machine_cost(&self, image: &str) -> u64 {
        self.base_machine_bytes * u64::from(self.weight(image)) / 100
    }

    /// Estimated total memory demand of a lab in bytes.
    pub fn estimate(&self, model: &LabModel) -> u64 {
        model
            .machines
            .values()
            .map(|m| self.machine_cost(&m.image))
            .sum()
    }
}
