//! Simulation configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::cloudlet_scheduler::CloudletSchedulingPolicy;
use crate::core::errors::CloudError;
use crate::core::vm_allocation_policy::vm_allocation_policy_resolver;
use crate::core::vm_scheduler::VmSchedulingPolicy;

/// Holds raw simulation config parsed from YAML file.
#[derive(Serialize, Deserialize, Default, Debug, PartialEq, Clone)]
struct RawSimulationConfig {
    pub scheduling_interval: Option<f64>,
    pub message_delay: Option<f64>,
    pub vm_allocation_policy: Option<String>,
    pub vm_scheduler: Option<VmSchedulingPolicy>,
    pub cloudlet_scheduler: Option<CloudletSchedulingPolicy>,
    pub destroy_idle_vms: Option<bool>,
    pub record_allocations: Option<bool>,
    pub wall_clock_limit: Option<f64>,
}

/// Represents simulation configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// periodic scheduling update interval, 0 means updates only at predicted completions
    pub scheduling_interval: f64,
    /// delay of messages between broker and datacenter
    pub message_delay: f64,
    /// name of VM allocation policy: FirstFit, BestFit or WorstFit
    pub vm_allocation_policy: String,
    /// VM scheduler policy of hosts which do not set their own
    pub vm_scheduler: VmSchedulingPolicy,
    /// cloudlet scheduler policy of VMs which do not set their own
    pub cloudlet_scheduler: CloudletSchedulingPolicy,
    /// destroy VMs once all their cloudlets are finished
    pub destroy_idle_vms: bool,
    /// record allocation snapshot after each scheduling update
    pub record_allocations: bool,
    /// wall-clock limit of simulation run in seconds
    pub wall_clock_limit: Option<f64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            scheduling_interval: 0.,
            message_delay: 0.,
            vm_allocation_policy: "FirstFit".to_string(),
            vm_scheduler: VmSchedulingPolicy::TimeShared,
            cloudlet_scheduler: CloudletSchedulingPolicy::TimeShared,
            destroy_idle_vms: false,
            record_allocations: false,
            wall_clock_limit: None,
        }
    }
}

impl SimulationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates simulation config by reading parameter values from YAML file
    /// (uses default values if some parameters are absent).
    pub fn from_file(file_name: &str) -> Result<Self, CloudError> {
        let content = std::fs::read_to_string(file_name)
            .map_err(|err| CloudError::Config(format!("can't read file {}: {}", file_name, err)))?;
        Self::from_yaml(&content)
    }

    /// Creates simulation config from YAML string.
    pub fn from_yaml(content: &str) -> Result<Self, CloudError> {
        let data: RawSimulationConfig =
            serde_yaml::from_str(content).map_err(|err| CloudError::Config(format!("can't parse YAML: {}", err)))?;
        let default = SimulationConfig::default();
        let config = Self {
            scheduling_interval: data.scheduling_interval.unwrap_or(default.scheduling_interval),
            message_delay: data.message_delay.unwrap_or(default.message_delay),
            vm_allocation_policy: data.vm_allocation_policy.unwrap_or(default.vm_allocation_policy),
            vm_scheduler: data.vm_scheduler.unwrap_or(default.vm_scheduler),
            cloudlet_scheduler: data.cloudlet_scheduler.unwrap_or(default.cloudlet_scheduler),
            destroy_idle_vms: data.destroy_idle_vms.unwrap_or(default.destroy_idle_vms),
            record_allocations: data.record_allocations.unwrap_or(default.record_allocations),
            wall_clock_limit: data.wall_clock_limit,
        };
        config.validate()?;
        Ok(config)
    }

    /// Returns the wall-clock limit as duration.
    ///
    /// Fails if the limit is negative, not a number or too large to be represented.
    pub fn wall_clock_limit_duration(&self) -> Result<Option<Duration>, CloudError> {
        match self.wall_clock_limit {
            Some(limit) => Duration::try_from_secs_f64(limit).map(Some).map_err(|err| {
                CloudError::Config(format!("wall_clock_limit {} is not a valid duration: {}", limit, err))
            }),
            None => Ok(None),
        }
    }

    /// Checks parameter values.
    pub fn validate(&self) -> Result<(), CloudError> {
        if !self.scheduling_interval.is_finite() || self.scheduling_interval < 0. {
            return Err(CloudError::Config(format!(
                "scheduling_interval must be non-negative, got {}",
                self.scheduling_interval
            )));
        }
        if !self.message_delay.is_finite() || self.message_delay < 0. {
            return Err(CloudError::Config(format!(
                "message_delay must be non-negative, got {}",
                self.message_delay
            )));
        }
        self.wall_clock_limit_duration()?;
        vm_allocation_policy_resolver(&self.vm_allocation_policy).map(|_| ())
    }
}
