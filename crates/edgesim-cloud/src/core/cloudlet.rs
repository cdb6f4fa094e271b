//! Representation of cloudlet (task) and its status.

use std::fmt::{Display, Formatter};

use serde::Serialize;

use edgesim_models::UtilizationModel;

/// Relative precision of instruction accounting.
///
/// Progress which brings the cloudlet this close to its length completes it, which absorbs float rounding
/// of `rate * (length / rate)`.
pub const FINISH_TOLERANCE: f64 = 1e-9;

/// Status of cloudlet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum CloudletStatus {
    /// Created by the user, not yet accepted by a VM.
    Created,
    /// Accepted by a VM which has no spare capacity for it yet.
    Queued,
    /// Admitted to execution, waiting for nonzero allocation.
    Ready,
    InExec,
    Paused,
    Success,
    Failed,
}

impl CloudletStatus {
    /// Returns `true` for statuses which can not change anymore.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CloudletStatus::Success | CloudletStatus::Failed)
    }
}

impl Display for CloudletStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            CloudletStatus::Created => write!(f, "created"),
            CloudletStatus::Queued => write!(f, "queued"),
            CloudletStatus::Ready => write!(f, "ready"),
            CloudletStatus::InExec => write!(f, "in_exec"),
            CloudletStatus::Paused => write!(f, "paused"),
            CloudletStatus::Success => write!(f, "success"),
            CloudletStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Represents cloudlet, a unit of work executed inside a VM.
///
/// Cloudlet is characterized by its length in millions of instructions (MI), the number of PEs it can use in
/// parallel and the utilization model, which defines the fraction of granted capacity the cloudlet actually uses.
/// Lifecycle fields are updated by the datacenter only.
#[derive(Clone, Debug, Serialize)]
pub struct Cloudlet {
    pub id: u32,
    pub length: f64,
    pub pes: u32,
    pub file_size: f64,
    pub output_size: f64,
    pub utilization: UtilizationModel,
    pub submission_delay: f64,
    vm: Option<u32>,
    status: CloudletStatus,
    start_time: Option<f64>,
    finish_time: Option<f64>,
    finished_instructions: f64,
    allocated_mips: f64,
}

impl Cloudlet {
    /// Creates cloudlet with the given length (MI) and number of PEs, full utilization and no VM.
    pub fn new(id: u32, length: f64, pes: u32) -> Self {
        Self {
            id,
            length,
            pes,
            file_size: 0.,
            output_size: 0.,
            utilization: UtilizationModel::Full,
            submission_delay: 0.,
            vm: None,
            status: CloudletStatus::Created,
            start_time: None,
            finish_time: None,
            finished_instructions: 0.,
            allocated_mips: 0.,
        }
    }

    pub fn with_file_size(mut self, file_size: f64) -> Self {
        self.file_size = file_size;
        self
    }

    pub fn with_output_size(mut self, output_size: f64) -> Self {
        self.output_size = output_size;
        self
    }

    pub fn with_utilization(mut self, utilization: UtilizationModel) -> Self {
        self.utilization = utilization;
        self
    }

    pub fn with_submission_delay(mut self, delay: f64) -> Self {
        self.submission_delay = delay;
        self
    }

    /// Binds cloudlet to the VM with the given id.
    pub fn with_vm(mut self, vm_id: u32) -> Self {
        self.vm = Some(vm_id);
        self
    }

    /// Binds cloudlet to the VM with the given id.
    pub fn set_vm(&mut self, vm_id: u32) {
        self.vm = Some(vm_id);
    }

    pub fn vm(&self) -> Option<u32> {
        self.vm
    }

    pub fn status(&self) -> CloudletStatus {
        self.status
    }

    /// Returns the time the cloudlet received nonzero allocation for the first time.
    pub fn start_time(&self) -> Option<f64> {
        self.start_time
    }

    pub fn finish_time(&self) -> Option<f64> {
        self.finish_time
    }

    pub fn finished_instructions(&self) -> f64 {
        self.finished_instructions
    }

    pub fn remaining_instructions(&self) -> f64 {
        self.length - self.finished_instructions
    }

    /// Returns the currently granted processing rate (MIPS).
    pub fn allocated_mips(&self) -> f64 {
        self.allocated_mips
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns the time between the start and the finish of execution, if the cloudlet has both.
    pub fn execution_time(&self) -> Option<f64> {
        match (self.start_time, self.finish_time) {
            (Some(start), Some(finish)) => Some(finish - start),
            _ => None,
        }
    }

    pub(crate) fn set_status(&mut self, status: CloudletStatus) {
        self.status = status;
    }

    pub(crate) fn set_allocated_mips(&mut self, mips: f64) {
        self.allocated_mips = mips;
    }

    /// Marks execution start unless the cloudlet has already been started before.
    pub(crate) fn start(&mut self, time: f64) {
        self.status = CloudletStatus::InExec;
        if self.start_time.is_none() {
            self.start_time = Some(time);
        }
    }

    /// Moves cloudlet to the terminal status.
    pub(crate) fn finish(&mut self, status: CloudletStatus, time: f64) {
        self.status = status;
        self.finish_time = Some(time);
        self.allocated_mips = 0.;
    }

    /// Completes the cloudlet successfully, the remaining instructions are counted as executed.
    pub(crate) fn complete(&mut self, time: f64) {
        self.finished_instructions = self.length;
        self.finish(CloudletStatus::Success, time);
    }

    /// Returns `true` if the remaining instructions would be executed at the current rate in less time
    /// than can be added to `time` without rounding it back to `time`.
    pub(crate) fn is_below_time_resolution(&self, time: f64) -> bool {
        let remaining = self.remaining_instructions();
        self.allocated_mips > 0. && remaining > 0. && time + remaining / self.allocated_mips <= time
    }

    /// Adds executed instructions, returns `true` if the cloudlet reached its length.
    pub(crate) fn add_finished_instructions(&mut self, instructions: f64) -> bool {
        if instructions > 0. {
            self.finished_instructions = (self.finished_instructions + instructions).min(self.length);
        }
        if self.length - self.finished_instructions <= self.length * FINISH_TOLERANCE {
            self.finished_instructions = self.length;
        }
        self.finished_instructions == self.length
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_clamped_to_length() {
        let mut cloudlet = Cloudlet::new(0, 1000., 1);
        assert!(!cloudlet.add_finished_instructions(400.));
        assert_eq!(cloudlet.remaining_instructions(), 600.);
        assert!(cloudlet.add_finished_instructions(700.));
        assert_eq!(cloudlet.finished_instructions(), 1000.);
    }

    #[test]
    fn test_rounding_residue_completes_cloudlet() {
        let mut cloudlet = Cloudlet::new(0, 3000., 1);
        let rate = 1000. / 3.;
        let duration = 3000. / rate;
        assert!(cloudlet.add_finished_instructions(rate * duration * (1. - 1e-12)));
        assert_eq!(cloudlet.finished_instructions(), 3000.);
    }

    #[test]
    fn test_start_time_is_set_once() {
        let mut cloudlet = Cloudlet::new(0, 1000., 1);
        cloudlet.start(2.);
        cloudlet.set_status(CloudletStatus::Paused);
        cloudlet.start(5.);
        assert_eq!(cloudlet.start_time(), Some(2.));
        cloudlet.finish(CloudletStatus::Success, 7.);
        assert_eq!(cloudlet.execution_time(), Some(5.));
        assert!(cloudlet.is_finished());
    }
}
