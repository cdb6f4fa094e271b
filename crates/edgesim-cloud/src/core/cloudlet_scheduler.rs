//! Division of VM capacity among resident cloudlets.

use std::collections::VecDeque;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use edgesim_models::{divide, Demand};

use crate::core::cloudlet::{Cloudlet, CloudletStatus};
use crate::core::common::EntityKind;
use crate::core::errors::CloudError;

/// Policy of cloudlet scheduler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloudletSchedulingPolicy {
    /// All submitted cloudlets are executed concurrently and share the VM capacity.
    #[default]
    TimeShared,
    /// A cloudlet is admitted only if its PEs fit beside the PEs of admitted cloudlets, others wait in FIFO order.
    SpaceShared,
}

/// Per-VM scheduler which tracks resident cloudlets and divides the VM capacity among them.
///
/// Cloudlets are referenced by id, their state lives in the entity store and is passed to every call.
#[derive(Clone, Debug)]
pub struct CloudletScheduler {
    policy: CloudletSchedulingPolicy,
    exec_list: Vec<u32>,
    waiting_list: VecDeque<u32>,
    paused_list: Vec<u32>,
    last_update: f64,
}

impl CloudletScheduler {
    pub fn new(policy: CloudletSchedulingPolicy) -> Self {
        Self {
            policy,
            exec_list: Vec::new(),
            waiting_list: VecDeque::new(),
            paused_list: Vec::new(),
            last_update: 0.,
        }
    }

    pub fn policy(&self) -> CloudletSchedulingPolicy {
        self.policy
    }

    /// Returns admitted cloudlets (ready or in execution) in admission order.
    pub fn exec_list(&self) -> &[u32] {
        &self.exec_list
    }

    /// Returns queued cloudlets in FIFO order.
    pub fn waiting_list(&self) -> Vec<u32> {
        self.waiting_list.iter().copied().collect()
    }

    pub fn paused_list(&self) -> &[u32] {
        &self.paused_list
    }

    /// Returns the number of cloudlets which need further processing, paused cloudlets excluded.
    pub fn pending_count(&self) -> usize {
        self.exec_list.len() + self.waiting_list.len()
    }

    /// Returns the time of the last progress accounting.
    pub fn last_update(&self) -> f64 {
        self.last_update
    }

    pub(crate) fn set_last_update(&mut self, time: f64) {
        self.last_update = time;
    }

    fn used_pes(&self, vm_pes: u32, cloudlets: &IndexMap<u32, Cloudlet>) -> u32 {
        self.exec_list
            .iter()
            .filter_map(|id| cloudlets.get(id))
            .map(|cloudlet| cloudlet.pes.min(vm_pes))
            .sum()
    }

    fn can_admit(&self, cloudlet: &Cloudlet, vm_pes: u32, cloudlets: &IndexMap<u32, Cloudlet>) -> bool {
        match self.policy {
            CloudletSchedulingPolicy::TimeShared => true,
            CloudletSchedulingPolicy::SpaceShared => {
                self.used_pes(vm_pes, cloudlets) + cloudlet.pes.min(vm_pes) <= vm_pes
            }
        }
    }

    /// Accepts cloudlet, returns its new status: ready if admitted or queued otherwise.
    pub(crate) fn submit(
        &mut self,
        cloudlet_id: u32,
        vm_pes: u32,
        cloudlets: &mut IndexMap<u32, Cloudlet>,
    ) -> Result<CloudletStatus, CloudError> {
        let cloudlet = cloudlets.get(&cloudlet_id).ok_or(CloudError::UnknownEntity {
            kind: EntityKind::Cloudlet,
            id: cloudlet_id,
        })?;
        let status = if self.waiting_list.is_empty() && self.can_admit(cloudlet, vm_pes, cloudlets) {
            self.exec_list.push(cloudlet_id);
            CloudletStatus::Ready
        } else {
            self.waiting_list.push_back(cloudlet_id);
            CloudletStatus::Queued
        };
        if let Some(cloudlet) = cloudlets.get_mut(&cloudlet_id) {
            cloudlet.set_status(status);
            cloudlet.set_allocated_mips(0.);
        }
        Ok(status)
    }

    fn admit_waiting(&mut self, vm_pes: u32, cloudlets: &mut IndexMap<u32, Cloudlet>) {
        while let Some(cloudlet_id) = self.waiting_list.front().copied() {
            let admit = match cloudlets.get(&cloudlet_id) {
                Some(cloudlet) => self.can_admit(cloudlet, vm_pes, cloudlets),
                None => true,
            };
            if !admit {
                break;
            }
            self.waiting_list.pop_front();
            if let Some(cloudlet) = cloudlets.get_mut(&cloudlet_id) {
                cloudlet.set_status(CloudletStatus::Ready);
                self.exec_list.push(cloudlet_id);
            }
        }
    }

    /// Accounts the progress of executed cloudlets since the last update at their current rates.
    ///
    /// Returns ids of cloudlets completed by this update, they leave the scheduler.
    pub(crate) fn update_processing(&mut self, time: f64, cloudlets: &mut IndexMap<u32, Cloudlet>) -> Vec<u32> {
        let elapsed = time - self.last_update;
        self.last_update = time;
        let mut finished = Vec::new();
        self.exec_list.retain(|cloudlet_id| {
            let cloudlet = match cloudlets.get_mut(cloudlet_id) {
                Some(cloudlet) => cloudlet,
                None => return false,
            };
            if cloudlet.status() != CloudletStatus::InExec {
                return true;
            }
            let reached_length = elapsed > 0. && cloudlet.add_finished_instructions(cloudlet.allocated_mips() * elapsed);
            // at large times the completion delay of a tiny leftover rounds to zero
            if reached_length || cloudlet.is_below_time_resolution(time) {
                cloudlet.complete(time);
                finished.push(*cloudlet_id);
                return false;
            }
            true
        });
        finished
    }

    /// Admits queued cloudlets if possible and divides the VM capacity among admitted cloudlets.
    ///
    /// Each cloudlet requests the capacity of the VM cores it can use and consumes the fraction of its fair share
    /// given by its utilization model. Cloudlets receiving nonzero capacity for the first time start execution.
    pub(crate) fn allocate(
        &mut self,
        time: f64,
        vm_id: u32,
        vm_pes: u32,
        vm_allocated_mips: f64,
        cloudlets: &mut IndexMap<u32, Cloudlet>,
    ) -> Result<(), CloudError> {
        self.admit_waiting(vm_pes, cloudlets);
        let mips_per_pe = if vm_pes > 0 {
            vm_allocated_mips / vm_pes as f64
        } else {
            0.
        };
        let demands: Vec<Demand> = self
            .exec_list
            .iter()
            .filter_map(|id| cloudlets.get(id))
            .map(|cloudlet| {
                Demand::new(
                    cloudlet.pes.min(vm_pes) as f64 * mips_per_pe,
                    cloudlet.utilization.evaluate(time),
                )
            })
            .collect();
        let grants = divide(vm_allocated_mips, &demands).map_err(|source| CloudError::CapacityExceeded {
            kind: EntityKind::Vm,
            id: vm_id,
            time,
            source,
        })?;
        for (cloudlet_id, grant) in self.exec_list.iter().zip(grants) {
            if let Some(cloudlet) = cloudlets.get_mut(cloudlet_id) {
                cloudlet.set_allocated_mips(grant);
                if grant > 0. && cloudlet.status() == CloudletStatus::Ready {
                    cloudlet.start(time);
                }
            }
        }
        Ok(())
    }

    /// Returns the time left until the earliest completion at current rates.
    pub fn next_completion_delay(&self, cloudlets: &IndexMap<u32, Cloudlet>) -> Option<f64> {
        self.exec_list
            .iter()
            .filter_map(|id| cloudlets.get(id))
            .filter(|cloudlet| cloudlet.status() == CloudletStatus::InExec && cloudlet.allocated_mips() > 0.)
            .map(|cloudlet| cloudlet.remaining_instructions() / cloudlet.allocated_mips())
            .reduce(f64::min)
    }

    /// Returns the earliest moment after `time` when utilization of some admitted cloudlet changes stepwise.
    pub fn next_utilization_change(&self, time: f64, cloudlets: &IndexMap<u32, Cloudlet>) -> Option<f64> {
        self.exec_list
            .iter()
            .filter_map(|id| cloudlets.get(id))
            .filter_map(|cloudlet| cloudlet.utilization.next_change_after(time))
            .reduce(f64::min)
    }

    /// Returns `true` if some admitted cloudlet has utilization changing in time.
    pub fn has_time_varying_utilization(&self, cloudlets: &IndexMap<u32, Cloudlet>) -> bool {
        self.exec_list
            .iter()
            .filter_map(|id| cloudlets.get(id))
            .any(|cloudlet| cloudlet.utilization.is_time_varying())
    }

    fn remove(&mut self, cloudlet_id: u32) -> bool {
        if let Some(pos) = self.exec_list.iter().position(|id| *id == cloudlet_id) {
            self.exec_list.remove(pos);
        } else if let Some(pos) = self.waiting_list.iter().position(|id| *id == cloudlet_id) {
            self.waiting_list.remove(pos);
        } else if let Some(pos) = self.paused_list.iter().position(|id| *id == cloudlet_id) {
            self.paused_list.remove(pos);
        } else {
            return false;
        }
        true
    }

    /// Fails the cloudlet, returns `false` if the cloudlet does not reside in this scheduler.
    pub(crate) fn cancel(&mut self, cloudlet_id: u32, time: f64, cloudlets: &mut IndexMap<u32, Cloudlet>) -> bool {
        if !self.remove(cloudlet_id) {
            return false;
        }
        if let Some(cloudlet) = cloudlets.get_mut(&cloudlet_id) {
            cloudlet.finish(CloudletStatus::Failed, time);
        }
        true
    }

    /// Suspends admitted cloudlet keeping its progress, returns `false` if the cloudlet is not admitted here.
    pub(crate) fn pause(&mut self, cloudlet_id: u32, cloudlets: &mut IndexMap<u32, Cloudlet>) -> bool {
        match self.exec_list.iter().position(|id| *id == cloudlet_id) {
            Some(pos) => {
                self.exec_list.remove(pos);
                self.paused_list.push(cloudlet_id);
                if let Some(cloudlet) = cloudlets.get_mut(&cloudlet_id) {
                    cloudlet.set_status(CloudletStatus::Paused);
                    cloudlet.set_allocated_mips(0.);
                }
                true
            }
            None => false,
        }
    }

    /// Submits paused cloudlet again, returns its new status or `None` if the cloudlet is not paused here.
    pub(crate) fn resume(
        &mut self,
        cloudlet_id: u32,
        vm_pes: u32,
        cloudlets: &mut IndexMap<u32, Cloudlet>,
    ) -> Result<Option<CloudletStatus>, CloudError> {
        match self.paused_list.iter().position(|id| *id == cloudlet_id) {
            Some(pos) => {
                self.paused_list.remove(pos);
                self.submit(cloudlet_id, vm_pes, cloudlets).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Fails all resident cloudlets, returns their ids.
    pub(crate) fn abort_all(&mut self, time: f64, cloudlets: &mut IndexMap<u32, Cloudlet>) -> Vec<u32> {
        let mut aborted: Vec<u32> = self.exec_list.drain(..).collect();
        aborted.extend(self.waiting_list.drain(..));
        aborted.append(&mut self.paused_list);
        for cloudlet_id in aborted.iter() {
            if let Some(cloudlet) = cloudlets.get_mut(cloudlet_id) {
                cloudlet.finish(CloudletStatus::Failed, time);
            }
        }
        aborted
    }
}
