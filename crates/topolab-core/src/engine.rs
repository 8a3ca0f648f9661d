use crate::cost::CostModel;
use crate::CoreError;
use std::fs;
use std::path::{Path, PathBuf};
use topolab_compose::{allocate, generate, Manifest, MergePolicy, StartupOverrides};
use topolab_schema::{
    compute_lab_id, parse_lab_conf_str, parse_topology_file, LabIdentity, LabModel, MachineName,
};
use tracing::{debug, info};

/// Relative location of the textual lab description inside a lab directory.
const LAB_CONF_PATHS: &[&str] = &["topology/lab.conf", "lab.conf"];

/// Structured topology file at the lab directory root.
const TOPOLOGY_FILE: &str = "topolab.toml";

/// Default location of per-machine startup scripts, with `{name}` replaced
/// by the machine name.
const DEFAULT_STARTUP_PATTERN: &str = "topology/{name}.startup";

/// Central compilation engine: reads a lab directory, normalizes it,
/// allocates networks, and emits the compose manifest.
pub struct Engine {
    cost_model: CostModel,
    startup_pattern: String,
}

/// Result of compiling one lab.
#[derive(Debug)]
pub struct CompiledLab {
    pub model: LabModel,
    pub identity: LabIdentity,
    pub manifest: Manifest,
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            cost_model: CostModel::default(),
            startup_pattern: DEFAULT_STARTUP_PATTERN.to_owned(),
        }
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cost_model(mut self, cost_model: CostModel) -> Self {
        self.cost_model = cost_model;
        self
    }

    /// Override where startup scripts are discovered, e.g.
    /// `"scripts/{name}.sh"` relative to the lab directory.
    pub fn with_startup_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.startup_pattern = pattern.into();
        self
    }

    pub fn cost_model(&self) -> &CostModel {
        &self.cost_model
    }

    /// Compile a lab directory with no startup overrides.
    pub fn compile_dir(&self, lab_dir: &Path) -> Result<CompiledLab, CoreError> {
        self.compile_dir_with(lab_dir, &StartupOverrides::new(), MergePolicy::Append)
    }

    /// Compile a lab directory, applying per-machine startup overrides per
    /// the given merge policy.
    pub fn compile_dir_with(
        &self,
        lab_dir: &Path,
        overrides: &StartupOverrides,
        policy: MergePolicy,
    ) -> Result<CompiledLab, CoreError> {
        let mut model = self.load_model(lab_dir)?;

        // Machines whose description carries no startup commands pick them
        // up from their startup script, if one exists.
        let names: Vec<MachineName> = model.machines.keys().cloned().collect();
        for name in names {
            let needs_script = model.machines.get(&name).is_some_and(|m| m.startup.is_empty());
            if !needs_script {
                continue;
            }
            if let Some(commands) = self.read_startup_script(lab_dir, &name)? {
                if let Some(machine) = model.machines.get_mut(&name) {
                    machine.startup = commands;
                }
            }
        }

        self.compile_model(&model, overrides, policy)
    }

    /// Compile an already-normalized model.
    pub fn compile_model(
        &self,
        model: &LabModel,
        overrides: &StartupOverrides,
        policy: MergePolicy,
    ) -> Result<CompiledLab, CoreError> {
        model.validate()?;
        let identity = compute_lab_id(model)?;
        let allocated = allocate(model);
        let manifest = generate(model, &allocated, overrides, policy)?;
        info!(
            "compiled lab {} ({} machines, {} networks)",
            identity.short_id,
            model.machines.len(),
            model.networks.len()
        );
        Ok(CompiledLab {
            model: model.clone(),
            identity,
            manifest,
        })
    }

    /// Compile a lab directory and write its compose manifest.
    ///
    /// Generation is all-or-nothing: the file is only written once the full
    /// document exists in memory. Returns the output path
    /// (`<lab_dir>/compose.yaml` unless overridden).
    pub fn write_compose(
        &self,
        lab_dir: &Path,
        output: Option<&Path>,
    ) -> Result<PathBuf, CoreError> {
        let compiled = self.compile_dir(lab_dir)?;
        let document = compiled.manifest.document()?;
        let out_path = output.map_or_else(|| lab_dir.join("compose.yaml"), Path::to_path_buf);
        fs::write(&out_path, document)?;
        info!("wrote compose manifest to {}", out_path.display());
        Ok(out_path)
    }

    /// Estimated memory cost of a lab in bytes, per the engine's cost model.
    pub fn estimate_cost(&self, model: &LabModel) -> u64 {
        self.cost_model.estimate(model)
    }

    fn load_model(&self, lab_dir: &Path) -> Result<LabModel, CoreError> {
        for rel in LAB_CONF_PATHS {
            let path = lab_dir.join(rel);
            if path.exists() {
                debug!("loading textual lab description from {}", path.display());
                let content = fs::read_to_string(&path)?;
                return Ok(parse_lab_conf_str(&content)?);
            }
        }
        let topology = lab_dir.join(TOPOLOGY_FILE);
        if topology.exists() {
            debug!("loading structured topology from {}", topology.display());
            return Ok(parse_topology_file(&topology)?.normalize()?);
        }
        Err(CoreError::MissingLabConfig(lab_dir.display().to_string()))
    }

    fn read_startup_script(
        &self,
        lab_dir: &Path,
        machine: &MachineName,
    ) -> Result<Option<Vec<String>>, CoreError> {
        let rel = self.startup_pattern.replace("{name}", machine.as_str());
        let path = lab_dir.join(rel);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let commands: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_owned)
            .collect();
        debug!(
            "startup script for '{machine}': {} commands from {}",
            commands.len(),
            path.display()
        );
        Ok(Some(commands))
    }
}
