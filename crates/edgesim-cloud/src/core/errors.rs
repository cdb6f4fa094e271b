//! Errors of the cloud simulation.

use thiserror::Error;

use edgesim_core::SimulationError;
use edgesim_models::ShareError;

use crate::core::cloudlet::CloudletStatus;
use crate::core::common::EntityKind;

#[derive(Debug, Error)]
pub enum CloudError {
    /// No host of the datacenter can accommodate the VM.
    #[error("no suitable host for vm #{vm_id}")]
    NoSuitableHost { vm_id: u32 },

    /// Capacity division of some host or VM produced an inconsistent allocation.
    #[error("capacity exceeded on {kind} #{id} at {time:.3}: {source}")]
    CapacityExceeded {
        kind: EntityKind,
        id: u32,
        time: f64,
        #[source]
        source: ShareError,
    },

    #[error("cloudlet #{cloudlet_id} is misconfigured: {reason}")]
    TaskConfiguration { cloudlet_id: u32, reason: String },

    #[error("vm #{vm_id} is misconfigured: {reason}")]
    VmConfiguration { vm_id: u32, reason: String },

    #[error("{kind} #{id} is already registered")]
    DuplicateId { kind: EntityKind, id: u32 },

    #[error("{kind} #{id} is unknown")]
    UnknownEntity { kind: EntityKind, id: u32 },

    #[error("cloudlet #{cloudlet_id} can not be {action} in status {status}")]
    InvalidTransition {
        cloudlet_id: u32,
        status: CloudletStatus,
        action: &'static str,
    },

    #[error("invalid config: {0}")]
    Config(String),

    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

/// Extracts the cloud error from the error of event loop, if the run was aborted by a cloud component.
pub fn unwrap_simulation_error(err: SimulationError) -> CloudError {
    match err {
        SimulationError::Handler { component, source } => match source.downcast::<CloudError>() {
            Ok(err) => *err,
            Err(source) => CloudError::Simulation(SimulationError::Handler { component, source }),
        },
        other => CloudError::Simulation(other),
    }
}
