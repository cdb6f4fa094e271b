//! Broker component: submission of VMs and cloudlets on behalf of the user.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use edgesim_core::{cast, log_debug, log_info, log_warn};
use edgesim_core::{Event, EventHandler, EventId, HandlerResult, Id, SimulationContext};

use crate::core::cloudlet::{Cloudlet, CloudletStatus};
use crate::core::common::EntityKind;
use crate::core::config::SimulationConfig;
use crate::core::entity_store::EntityStore;
use crate::core::errors::CloudError;
use crate::core::events::allocation::{VmCreateFailed, VmCreateRequest, VmCreated, VmDestroyRequest, VmDestroyed};
use crate::core::events::cloudlet::{
    CloudletCancel, CloudletPause, CloudletRejected, CloudletResume, CloudletReturned, CloudletSubmit,
};
use crate::core::vm::{VirtualMachine, VmStatus};

/// Submits VMs and cloudlets to the datacenter and collects finished cloudlets.
///
/// VMs are requested once the simulation is started, cloudlets are submitted as soon as their VM is created.
/// The broker never retries failed placements by itself, see [`resubmit_waiting_vms`](Self::resubmit_waiting_vms).
pub struct Broker {
    datacenter_id: Id,
    store: Rc<RefCell<EntityStore>>,
    vm_waiting_list: Vec<u32>,
    vm_created_list: Vec<u32>,
    // VMs with outstanding creation or destruction requests
    vm_requested: HashSet<u32>,
    vm_destroy_requested: HashSet<u32>,
    cloudlet_waiting_list: Vec<u32>,
    cloudlet_submitted_list: Vec<u32>,
    // submission events which may still be in flight
    cloudlet_submit_events: HashMap<u32, EventId>,
    cloudlet_finished_list: Vec<u32>,
    failures: Vec<CloudError>,
    started: bool,
    ctx: SimulationContext,
    sim_config: Rc<SimulationConfig>,
}

impl Broker {
    pub fn new(
        datacenter_id: Id,
        store: Rc<RefCell<EntityStore>>,
        ctx: SimulationContext,
        sim_config: Rc<SimulationConfig>,
    ) -> Self {
        Self {
            datacenter_id,
            store,
            vm_waiting_list: Vec::new(),
            vm_created_list: Vec::new(),
            vm_requested: HashSet::new(),
            vm_destroy_requested: HashSet::new(),
            cloudlet_waiting_list: Vec::new(),
            cloudlet_submitted_list: Vec::new(),
            cloudlet_submit_events: HashMap::new(),
            cloudlet_finished_list: Vec::new(),
            failures: Vec::new(),
            started: false,
            ctx,
            sim_config,
        }
    }

    pub fn id(&self) -> Id {
        self.ctx.id()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Validates and registers VMs. Once the simulation is started, their creation is requested immediately.
    ///
    /// Nothing is registered if some VM is invalid.
    pub fn submit_vm_list(&mut self, vms: Vec<VirtualMachine>) -> Result<(), CloudError> {
        {
            let store = self.store.borrow();
            let mut ids = HashSet::new();
            for vm in vms.iter() {
                validate_vm(vm)?;
                if store.vm(vm.id).is_some() || !ids.insert(vm.id) {
                    return Err(CloudError::DuplicateId {
                        kind: EntityKind::Vm,
                        id: vm.id,
                    });
                }
            }
        }
        let ids: Vec<u32> = vms.iter().map(|vm| vm.id).collect();
        {
            let mut store = self.store.borrow_mut();
            for vm in vms {
                store.add_vm(vm)?;
            }
        }
        log_debug!(self.ctx, "submitted vms {:?}", ids);
        self.vm_waiting_list.extend(ids.iter().copied());
        if self.started {
            for vm_id in ids {
                self.request_vm_creation(vm_id)?;
            }
        }
        Ok(())
    }

    /// Validates and registers cloudlets. Each cloudlet must be bound to an already submitted VM.
    ///
    /// Nothing is registered if some cloudlet is invalid.
    pub fn submit_cloudlet_list(&mut self, cloudlets: Vec<Cloudlet>) -> Result<(), CloudError> {
        {
            let store = self.store.borrow();
            let mut ids = HashSet::new();
            for cloudlet in cloudlets.iter() {
                validate_cloudlet(cloudlet)?;
                let vm_id = cloudlet.vm().ok_or_else(|| CloudError::TaskConfiguration {
                    cloudlet_id: cloudlet.id,
                    reason: "cloudlet is not bound to a vm".to_string(),
                })?;
                if store.vm(vm_id).is_none() {
                    return Err(CloudError::TaskConfiguration {
                        cloudlet_id: cloudlet.id,
                        reason: format!("cloudlet is bound to unknown vm {}", vm_id),
                    });
                }
                if store.cloudlet(cloudlet.id).is_some() || !ids.insert(cloudlet.id) {
                    return Err(CloudError::DuplicateId {
                        kind: EntityKind::Cloudlet,
                        id: cloudlet.id,
                    });
                }
            }
        }
        let ids: Vec<u32> = cloudlets.iter().map(|cloudlet| cloudlet.id).collect();
        {
            let mut store = self.store.borrow_mut();
            for cloudlet in cloudlets {
                store.add_cloudlet(cloudlet)?;
            }
        }
        log_debug!(self.ctx, "submitted cloudlets {:?}", ids);
        self.cloudlet_waiting_list.extend(ids);
        if self.started {
            self.submit_ready_cloudlets()?;
        }
        Ok(())
    }

    /// Requests creation of all waiting VMs. Repeated calls have no effect.
    pub fn start(&mut self) -> Result<(), CloudError> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        log_info!(
            self.ctx,
            "started with {} vms and {} cloudlets",
            self.vm_waiting_list.len(),
            self.cloudlet_waiting_list.len()
        );
        for vm_id in self.vm_waiting_list.clone() {
            self.request_vm_creation(vm_id)?;
        }
        self.submit_ready_cloudlets()
    }

    /// Requests creation of waiting VMs which have no outstanding request, returns the number of requests.
    pub fn resubmit_waiting_vms(&mut self) -> Result<usize, CloudError> {
        let vm_ids: Vec<u32> = self
            .vm_waiting_list
            .iter()
            .copied()
            .filter(|vm_id| !self.vm_requested.contains(vm_id))
            .collect();
        if self.started {
            for vm_id in vm_ids.iter() {
                self.request_vm_creation(*vm_id)?;
            }
        }
        Ok(vm_ids.len())
    }

    fn request_vm_creation(&mut self, vm_id: u32) -> Result<(), CloudError> {
        if !self.vm_requested.insert(vm_id) {
            return Ok(());
        }
        let delay = match self.store.borrow().vm(vm_id) {
            Some(vm) => vm.submission_delay,
            None => return Err(CloudError::UnknownEntity { kind: EntityKind::Vm, id: vm_id }),
        };
        self.ctx.emit(
            VmCreateRequest { vm_id },
            self.datacenter_id,
            self.sim_config.message_delay + delay,
        )?;
        Ok(())
    }

    /// Submits waiting cloudlets whose VMs are created.
    fn submit_ready_cloudlets(&mut self) -> Result<(), CloudError> {
        let mut ready = Vec::new();
        {
            let store = self.store.borrow();
            let created = &self.vm_created_list;
            self.cloudlet_waiting_list.retain(|cloudlet_id| {
                let cloudlet = match store.cloudlet(*cloudlet_id) {
                    Some(cloudlet) => cloudlet,
                    None => return true,
                };
                match cloudlet.vm() {
                    Some(vm_id) if created.contains(&vm_id) => {
                        ready.push((*cloudlet_id, cloudlet.submission_delay));
                        false
                    }
                    _ => true,
                }
            });
        }
        for (cloudlet_id, delay) in ready {
            let event_id = self.ctx.emit(
                CloudletSubmit { cloudlet_id },
                self.datacenter_id,
                self.sim_config.message_delay + delay,
            )?;
            self.cloudlet_submit_events.insert(cloudlet_id, event_id);
            self.cloudlet_submitted_list.push(cloudlet_id);
        }
        Ok(())
    }

    /// Cancels cloudlet.
    ///
    /// A cloudlet which has not reached the datacenter yet fails immediately, a submitted one is cancelled
    /// by the datacenter.
    pub fn cancel_cloudlet(&mut self, cloudlet_id: u32) -> Result<(), CloudError> {
        let status = self.cloudlet_status(cloudlet_id)?;
        if let Some(pos) = self.cloudlet_waiting_list.iter().position(|id| *id == cloudlet_id) {
            self.cloudlet_waiting_list.remove(pos);
            log_info!(self.ctx, "cloudlet {} cancelled before submission", cloudlet_id);
            self.fail_cloudlet(cloudlet_id)
        } else if status == CloudletStatus::Created && self.cloudlet_submit_events.contains_key(&cloudlet_id) {
            // the datacenter has not received the cloudlet yet
            if let Some(event_id) = self.cloudlet_submit_events.remove(&cloudlet_id) {
                self.ctx.cancel_event(event_id);
            }
            log_info!(self.ctx, "cloudlet {} cancelled in transit", cloudlet_id);
            self.fail_cloudlet(cloudlet_id)
        } else if self.cloudlet_submitted_list.contains(&cloudlet_id) && !status.is_terminal() {
            self.ctx.emit(CloudletCancel { cloudlet_id }, self.datacenter_id, self.sim_config.message_delay)?;
            Ok(())
        } else {
            Err(CloudError::InvalidTransition {
                cloudlet_id,
                status,
                action: "cancelled",
            })
        }
    }

    /// Requests pausing of a ready or executed cloudlet.
    pub fn pause_cloudlet(&mut self, cloudlet_id: u32) -> Result<(), CloudError> {
        let status = self.cloudlet_status(cloudlet_id)?;
        if !matches!(status, CloudletStatus::Ready | CloudletStatus::InExec) {
            return Err(CloudError::InvalidTransition {
                cloudlet_id,
                status,
                action: "paused",
            });
        }
        self.ctx.emit(CloudletPause { cloudlet_id }, self.datacenter_id, self.sim_config.message_delay)?;
        Ok(())
    }

    /// Requests resuming of a paused cloudlet.
    pub fn resume_cloudlet(&mut self, cloudlet_id: u32) -> Result<(), CloudError> {
        let status = self.cloudlet_status(cloudlet_id)?;
        if status != CloudletStatus::Paused {
            return Err(CloudError::InvalidTransition {
                cloudlet_id,
                status,
                action: "resumed",
            });
        }
        self.ctx.emit(CloudletResume { cloudlet_id }, self.datacenter_id, self.sim_config.message_delay)?;
        Ok(())
    }

    /// Requests destruction of a created VM, cloudlets still running on it fail.
    pub fn destroy_vm(&mut self, vm_id: u32) -> Result<(), CloudError> {
        match self.store.borrow().vm(vm_id).map(|vm| vm.status()) {
            Some(VmStatus::Created) => {}
            Some(status) => {
                return Err(CloudError::VmConfiguration {
                    vm_id,
                    reason: format!("vm can not be destroyed in status {}", status),
                })
            }
            None => return Err(CloudError::UnknownEntity { kind: EntityKind::Vm, id: vm_id }),
        }
        if self.vm_destroy_requested.insert(vm_id) {
            self.ctx.emit(VmDestroyRequest { vm_id }, self.datacenter_id, self.sim_config.message_delay)?;
        }
        Ok(())
    }

    fn cloudlet_status(&self, cloudlet_id: u32) -> Result<CloudletStatus, CloudError> {
        self.store
            .borrow()
            .cloudlet(cloudlet_id)
            .map(|cloudlet| cloudlet.status())
            .ok_or(CloudError::UnknownEntity {
                kind: EntityKind::Cloudlet,
                id: cloudlet_id,
            })
    }

    fn fail_cloudlet(&mut self, cloudlet_id: u32) -> Result<(), CloudError> {
        if let Some(cloudlet) = self.store.borrow_mut().cloudlets.get_mut(&cloudlet_id) {
            cloudlet.finish(CloudletStatus::Failed, self.ctx.time());
        }
        self.finish_cloudlet(cloudlet_id)
    }

    fn finish_cloudlet(&mut self, cloudlet_id: u32) -> Result<(), CloudError> {
        self.cloudlet_submit_events.remove(&cloudlet_id);
        if let Some(pos) = self.cloudlet_submitted_list.iter().position(|id| *id == cloudlet_id) {
            self.cloudlet_submitted_list.remove(pos);
        }
        if self.cloudlet_finished_list.contains(&cloudlet_id) {
            return Ok(());
        }
        self.cloudlet_finished_list.push(cloudlet_id);
        if self.sim_config.destroy_idle_vms {
            self.destroy_vm_if_idle(cloudlet_id)?;
        }
        Ok(())
    }

    fn destroy_vm_if_idle(&mut self, cloudlet_id: u32) -> Result<(), CloudError> {
        let vm_id = {
            let store = self.store.borrow();
            let vm_id = match store.cloudlet(cloudlet_id).and_then(|cloudlet| cloudlet.vm()) {
                Some(vm_id) => vm_id,
                None => return Ok(()),
            };
            let has_work = self
                .cloudlet_waiting_list
                .iter()
                .chain(self.cloudlet_submitted_list.iter())
                .any(|id| store.cloudlet(*id).and_then(|cloudlet| cloudlet.vm()) == Some(vm_id));
            if has_work || !self.vm_created_list.contains(&vm_id) {
                return Ok(());
            }
            vm_id
        };
        log_debug!(self.ctx, "vm {} is idle", vm_id);
        self.destroy_vm(vm_id)
    }

    fn on_vm_created(&mut self, vm_id: u32, host_id: u32) -> Result<(), CloudError> {
        self.vm_requested.remove(&vm_id);
        self.vm_waiting_list.retain(|id| *id != vm_id);
        if !self.vm_created_list.contains(&vm_id) {
            self.vm_created_list.push(vm_id);
        }
        log_info!(self.ctx, "vm {} is running on host {}", vm_id, host_id);
        self.submit_ready_cloudlets()
    }

    fn on_vm_create_failed(&mut self, vm_id: u32) {
        self.vm_requested.remove(&vm_id);
        log_warn!(self.ctx, "creation of vm {} failed, it stays in the waiting list", vm_id);
        self.failures.push(CloudError::NoSuitableHost { vm_id });
    }

    fn on_vm_destroyed(&mut self, vm_id: u32, host_id: u32) {
        self.vm_destroy_requested.remove(&vm_id);
        self.vm_created_list.retain(|id| *id != vm_id);
        log_info!(self.ctx, "vm {} is destroyed on host {}", vm_id, host_id);
    }

    fn on_cloudlet_rejected(&mut self, cloudlet_id: u32, reason: String) -> Result<(), CloudError> {
        if self.cloudlet_finished_list.contains(&cloudlet_id) {
            // cancelled while the rejection was in flight
            return Ok(());
        }
        log_warn!(self.ctx, "cloudlet {} is rejected: {}", cloudlet_id, reason);
        self.failures.push(CloudError::TaskConfiguration { cloudlet_id, reason });
        self.fail_cloudlet(cloudlet_id)
    }

    fn on_cloudlet_returned(&mut self, cloudlet_id: u32) -> Result<(), CloudError> {
        if let Some(cloudlet) = self.store.borrow().cloudlet(cloudlet_id) {
            log_info!(
                self.ctx,
                "cloudlet {} returned: status={} start={:?} finish={:?}",
                cloudlet_id,
                cloudlet.status(),
                cloudlet.start_time(),
                cloudlet.finish_time()
            );
        }
        self.finish_cloudlet(cloudlet_id)
    }

    /// Returns ids of VMs which are not created yet.
    pub fn vm_waiting_list(&self) -> &[u32] {
        &self.vm_waiting_list
    }

    /// Returns ids of created VMs in creation order.
    pub fn vm_created_list(&self) -> &[u32] {
        &self.vm_created_list
    }

    /// Returns ids of cloudlets which are not submitted to the datacenter yet.
    pub fn cloudlet_waiting_list(&self) -> &[u32] {
        &self.cloudlet_waiting_list
    }

    /// Returns ids of cloudlets submitted to the datacenter and not returned yet.
    pub fn cloudlet_submitted_list(&self) -> &[u32] {
        &self.cloudlet_submitted_list
    }

    /// Returns ids of finished cloudlets in completion order.
    pub fn cloudlet_finished_ids(&self) -> &[u32] {
        &self.cloudlet_finished_list
    }

    /// Returns finished (succeeded or failed) cloudlets in completion order.
    pub fn cloudlet_finished_list(&self) -> Vec<Cloudlet> {
        let store = self.store.borrow();
        self.cloudlet_finished_list
            .iter()
            .filter_map(|id| store.cloudlet(*id).cloned())
            .collect()
    }

    /// Returns placement and submission failures reported by the datacenter.
    pub fn failures(&self) -> &[CloudError] {
        &self.failures
    }
}

fn validate_vm(vm: &VirtualMachine) -> Result<(), CloudError> {
    let invalid = |reason: &str| {
        Err(CloudError::VmConfiguration {
            vm_id: vm.id,
            reason: reason.to_string(),
        })
    };
    if vm.pes == 0 {
        return invalid("vm must have at least one PE");
    }
    if !vm.mips.is_finite() || vm.mips <= 0. {
        return invalid("mips must be positive");
    }
    if [vm.ram, vm.bw, vm.size].iter().any(|value| !value.is_finite() || *value < 0.) {
        return invalid("ram, bw and size must be non-negative");
    }
    if !vm.submission_delay.is_finite() || vm.submission_delay < 0. {
        return invalid("submission delay must be non-negative");
    }
    Ok(())
}

fn validate_cloudlet(cloudlet: &Cloudlet) -> Result<(), CloudError> {
    let invalid = |reason: &str| {
        Err(CloudError::TaskConfiguration {
            cloudlet_id: cloudlet.id,
            reason: reason.to_string(),
        })
    };
    if cloudlet.pes == 0 {
        return invalid("cloudlet must use at least one PE");
    }
    if !cloudlet.length.is_finite() || cloudlet.length <= 0. {
        return invalid("length must be positive");
    }
    if !cloudlet.submission_delay.is_finite() || cloudlet.submission_delay < 0. {
        return invalid("submission delay must be non-negative");
    }
    if cloudlet.status() != CloudletStatus::Created {
        return invalid("cloudlet is already processed");
    }
    Ok(())
}

impl EventHandler for Broker {
    fn on(&mut self, event: Event) -> HandlerResult {
        cast!(match event.data {
            VmCreated { vm_id, host_id } => {
                self.on_vm_created(vm_id, host_id)?;
            }
            VmCreateFailed { vm_id } => {
                self.on_vm_create_failed(vm_id);
            }
            VmDestroyed { vm_id, host_id } => {
                self.on_vm_destroyed(vm_id, host_id);
            }
            CloudletRejected { cloudlet_id, reason } => {
                self.on_cloudlet_rejected(cloudlet_id, reason)?;
            }
            CloudletReturned { cloudlet_id } => {
                self.on_cloudlet_returned(cloudlet_id)?;
            }
        });
        Ok(())
    }
}
