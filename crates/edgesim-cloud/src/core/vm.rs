//! Representation of virtual machine and its status.

use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::core::cloudlet_scheduler::{CloudletScheduler, CloudletSchedulingPolicy};

/// Status of virtual machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VmStatus {
    /// Submitted but not placed yet.
    Waiting,
    /// Placed on a host and able to execute cloudlets.
    Created,
    /// The last placement attempt found no suitable host.
    Failed,
    Destroyed,
}

impl Display for VmStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            VmStatus::Waiting => write!(f, "waiting"),
            VmStatus::Created => write!(f, "created"),
            VmStatus::Failed => write!(f, "failed"),
            VmStatus::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// Represents virtual machine (VM).
///
// VM requests `pes` cores of `mips` capacity each plus fixed amounts of RAM, bandwidth and storage (size).
// Once placed, it keeps the host for its whole lifetime and executes cloudlets with its cloudlet scheduler.
#[derive(Clone, Debug, Serialize)]
pub struct VirtualMachine {
    pub id: u32,
    pub mips: f64,
    pub pes: u32,
    pub ram: f64,
    pub bw: f64,
    pub size: f64,
    pub submission_delay: f64,
    #[serde(skip)]
    cloudlet_scheduling: Option<CloudletSchedulingPolicy>,
    #[serde(skip)]
    pub(crate) cloudlet_scheduler: CloudletScheduler,
    host: Option<u32>,
    status: VmStatus,
    allocated_mips: f64,
    creation_time: Option<f64>,
    destruction_time: Option<f64>,
    cloudlets: Vec<u32>,
}

impl VirtualMachine {
    /// Creates VM requesting `pes` cores with `mips` capacity each.
    ///
    /// RAM, bandwidth and size default to 1024, 1000 and 10000. The cloudlet scheduler policy is taken from the
    /// simulation config unless set with [`with_cloudlet_scheduler`](Self::with_cloudlet_scheduler).
    pub fn new(id: u32, mips: f64, pes: u32) -> Self {
        Self {
            id,
            mips,
            pes,
            ram: 1024.,
            bw: 1000.,
            size: 10000.,
            submission_delay: 0.,
            cloudlet_scheduling: None,
            cloudlet_scheduler: CloudletScheduler::new(CloudletSchedulingPolicy::default()),
            host: None,
            status: VmStatus::Waiting,
            allocated_mips: 0.,
            creation_time: None,
            destruction_time: None,
            cloudlets: Vec::new(),
        }
    }

    pub fn with_ram(mut self, ram: f64) -> Self {
        self.ram = ram;
        self
    }

    pub fn with_bw(mut self, bw: f64) -> Self {
        self.bw = bw;
        self
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub fn with_submission_delay(mut self, delay: f64) -> Self {
        self.submission_delay = delay;
        self
    }

    pub fn with_cloudlet_scheduler(mut self, policy: CloudletSchedulingPolicy) -> Self {
        self.cloudlet_scheduling = Some(policy);
        self.cloudlet_scheduler = CloudletScheduler::new(policy);
        self
    }

    /// Returns the total requested capacity of all VM cores.
    pub fn requested_mips(&self) -> f64 {
        self.pes as f64 * self.mips
    }

    /// Returns the id of host the VM is placed on.
    pub fn host(&self) -> Option<u32> {
        self.host
    }

    pub fn status(&self) -> VmStatus {
        self.status
    }

    /// Returns the capacity currently allocated to the VM by its host.
    pub fn allocated_mips(&self) -> f64 {
        self.allocated_mips
    }

    pub fn creation_time(&self) -> Option<f64> {
        self.creation_time
    }

    pub fn destruction_time(&self) -> Option<f64> {
        self.destruction_time
    }

    /// Returns ids of cloudlets submitted to the VM in submission order.
    pub fn cloudlets(&self) -> &[u32] {
        &self.cloudlets
    }

    pub fn cloudlet_scheduler(&self) -> &CloudletScheduler {
        &self.cloudlet_scheduler
    }

    pub(crate) fn set_allocated_mips(&mut self, mips: f64) {
        self.allocated_mips = mips;
    }

    pub(crate) fn set_failed(&mut self) {
        self.status = VmStatus::Failed;
    }

    pub(crate) fn place(&mut self, host_id: u32, time: f64, default_policy: CloudletSchedulingPolicy) {
        let policy = self.cloudlet_scheduling.unwrap_or(default_policy);
        self.cloudlet_scheduler = CloudletScheduler::new(policy);
        self.cloudlet_scheduler.set_last_update(time);
        self.host = Some(host_id);
        self.status = VmStatus::Created;
        self.creation_time = Some(time);
    }

    pub(crate) fn destroy(&mut self, time: f64) {
        self.status = VmStatus::Destroyed;
        self.allocated_mips = 0.;
        self.destruction_time = Some(time);
    }

    pub(crate) fn add_cloudlet(&mut self, cloudlet_id: u32) {
        if !self.cloudlets.contains(&cloudlet_id) {
            self.cloudlets.push(cloudlet_id);
        }
    }
}
