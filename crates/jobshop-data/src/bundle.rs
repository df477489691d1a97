//! Instance bundles: a validated shop plus its optional starting point.

use crate::loader::{DataLoadError, deserialize_file, find_data_file, require_data_file};
use jobshop_core::engine::{SimulationOptions, Simulator};
use jobshop_core::instance::{InstanceConfig, InstanceError};
use jobshop_core::state::State;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceBundle {
    pub instance: InstanceConfig,
    /// Starting state. When absent, [`InstanceConfig::initial_state`] is used.
    #[serde(default)]
    pub initial_state: Option<State>,
    #[serde(default)]
    pub options: Option<SimulationOptions>,
}

impl InstanceBundle {
    /// The shipped initial state, or the instance's derived one.
    pub fn start_state(&self) -> Result<State, InstanceError> {
        match &self.initial_state {
            Some(state) => Ok(state.clone()),
            None => self.instance.initial_state(),
        }
    }

    /// A seeded simulator carrying the bundle's options.
    pub fn simulator(&self, seed: u64) -> Simulator {
        Simulator::seeded(self.instance.clone(), seed)
            .with_options(self.options.clone().unwrap_or_default())
    }
}

// ===========================================================================
// Loading
// ===========================================================================

/// Load a bundle stored in a single file.
pub fn load_bundle(path: &Path) -> Result<InstanceBundle, DataLoadError> {
    let bundle: InstanceBundle = deserialize_file(path)?;
    check_bundle(&bundle, path)?;
    info!(
        file = %path.display(),
        jobs = bundle.instance.jobs.len(),
        machines = bundle.instance.machines.len(),
        transports = bundle.instance.transports.len(),
        "loaded instance bundle"
    );
    Ok(bundle)
}

/// Load a bundle split across `instance.*` (required), `state.*`, and
/// `options.*` in `dir`.
pub fn load_bundle_dir(dir: &Path) -> Result<InstanceBundle, DataLoadError> {
    let instance_path = require_data_file(dir, "instance")?;
    let instance: InstanceConfig = deserialize_file(&instance_path)?;
    validate_instance(&instance, &instance_path)?;

    let initial_state = match find_data_file(dir, "state")? {
        Some(path) => {
            let state: State = deserialize_file(&path)?;
            check_state_shape(&instance, &state, &path)?;
            Some(state)
        }
        None => None,
    };

    let options = match find_data_file(dir, "options")? {
        Some(path) => Some(deserialize_file(&path)?),
        None => None,
    };

    debug!(
        dir = %dir.display(),
        has_state = initial_state.is_some(),
        has_options = options.is_some(),
        "loaded split bundle"
    );

    Ok(InstanceBundle {
        instance,
        initial_state,
        options,
    })
}

fn check_bundle(bundle: &InstanceBundle, path: &Path) -> Result<(), DataLoadError> {
    validate_instance(&bundle.instance, path)?;
    if let Some(state) = &bundle.initial_state {
        check_state_shape(&bundle.instance, state, path)?;
    }
    Ok(())
}

fn validate_instance(instance: &InstanceConfig, path: &Path) -> Result<(), DataLoadError> {
    instance
        .validate()
        .map_err(|source| DataLoadError::InvalidInstance {
            file: path.to_path_buf(),
            source,
        })
}

/// The state must name the same components and jobs as the instance, in
/// the same order.
fn check_state_shape(
    instance: &InstanceConfig,
    state: &State,
    path: &Path,
) -> Result<(), DataLoadError> {
    let mismatch = |what: &str| DataLoadError::StateMismatch {
        file: path.to_path_buf(),
        detail: format!("{what} differ"),
    };

    if !state.jobs.iter().map(|j| j.id).eq(instance.jobs.iter().map(|j| j.id)) {
        return Err(mismatch("jobs"));
    }
    if !state.machines.iter().map(|m| m.id).eq(instance.machines.iter().map(|m| m.id)) {
        return Err(mismatch("machines"));
    }
    if !state
        .transports
        .iter()
        .map(|t| t.id)
        .eq(instance.transports.iter().map(|t| t.id))
    {
        return Err(mismatch("transports"));
    }
    if !state.buffers.iter().map(|b| b.id).eq(instance.buffers.iter().map(|b| b.id)) {
        return Err(mismatch("buffers"));
    }
    for (job, config) in state.jobs.iter().zip(&instance.jobs) {
        if job.operations.len() != config.operations.len() {
            return Err(DataLoadError::StateMismatch {
                file: path.to_path_buf(),
                detail: format!("{} has {} operations, expected {}", job.id, job.operations.len(), config.operations.len()),
            });
        }
    }
    Ok(())
}
