//! Datacenter component: VM placement and cloudlet execution.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use edgesim_core::{cast, log_debug, log_info, log_warn};
use edgesim_core::{Event, EventHandler, EventId, HandlerResult, Id, SimulationContext};

use crate::core::cloudlet::CloudletStatus;
use crate::core::common::EntityKind;
use crate::core::config::SimulationConfig;
use crate::core::entity_store::EntityStore;
use crate::core::errors::CloudError;
use crate::core::events::allocation::{VmCreateFailed, VmCreateRequest, VmCreated, VmDestroyRequest, VmDestroyed};
use crate::core::events::cloudlet::{
    CloudletCancel, CloudletPause, CloudletRejected, CloudletResume, CloudletReturned, CloudletSubmit,
};
use crate::core::events::processing::UpdateProcessing;
use crate::core::host::Host;
use crate::core::monitoring::Monitoring;
use crate::core::vm::VmStatus;
use crate::core::vm_allocation_policy::{vm_allocation_policy_resolver, VmAllocationPolicy};

/// Owns the pool of hosts, places VMs on them and executes cloudlets submitted by brokers.
///
/// Cloudlet progress is accounted lazily: on each scheduling update (and before any change of the set of executed
/// cloudlets) the datacenter adds `rate * elapsed` instructions to every executed cloudlet, reports completed ones,
/// recomputes host and VM allocations and schedules the next update at the earliest predicted completion.
pub struct Datacenter {
    hosts: IndexMap<u32, Host>,
    store: Rc<RefCell<EntityStore>>,
    allocation_policy: Box<dyn VmAllocationPolicy>,
    monitoring: Monitoring,
    // broker which submitted each executed cloudlet
    cloudlet_owners: HashMap<u32, Id>,
    next_update: Option<EventId>,
    pending_cloudlets: usize,
    time_varying_warned: bool,
    ctx: SimulationContext,
    sim_config: Rc<SimulationConfig>,
}

impl Datacenter {
    pub fn new(
        hosts: Vec<Host>,
        store: Rc<RefCell<EntityStore>>,
        ctx: SimulationContext,
        sim_config: Rc<SimulationConfig>,
    ) -> Result<Self, CloudError> {
        let allocation_policy = vm_allocation_policy_resolver(&sim_config.vm_allocation_policy)?;
        let mut host_map = IndexMap::new();
        for mut host in hosts {
            if host_map.contains_key(&host.id) {
                return Err(CloudError::DuplicateId {
                    kind: EntityKind::Host,
                    id: host.id,
                });
            }
            host.set_default_vm_scheduler(sim_config.vm_scheduler);
            host_map.insert(host.id, host);
        }
        Ok(Self {
            hosts: host_map,
            store,
            allocation_policy,
            monitoring: Monitoring::new(),
            cloudlet_owners: HashMap::new(),
            next_update: None,
            pending_cloudlets: 0,
            time_varying_warned: false,
            ctx,
            sim_config,
        })
    }

    pub fn id(&self) -> Id {
        self.ctx.id()
    }

    pub fn host(&self, id: u32) -> Option<&Host> {
        self.hosts.get(&id)
    }

    /// Returns hosts in datacenter order.
    pub fn hosts(&self) -> impl Iterator<Item = &Host> + '_ {
        self.hosts.values()
    }

    /// Replaces the VM allocation policy.
    pub fn set_allocation_policy(&mut self, allocation_policy: Box<dyn VmAllocationPolicy>) {
        self.allocation_policy = allocation_policy;
    }

    pub fn monitoring(&self) -> &Monitoring {
        &self.monitoring
    }

    /// Returns the number of cloudlets admitted or queued on VMs of this datacenter.
    pub fn pending_cloudlets(&self) -> usize {
        self.pending_cloudlets
    }

    fn on_vm_create_request(&mut self, vm_id: u32, src: Id) -> Result<(), CloudError> {
        self.advance()?;
        {
            let mut store = self.store.borrow_mut();
            let vm = match store.vms.get_mut(&vm_id) {
                Some(vm) => vm,
                None => {
                    log_warn!(self.ctx, "vm {} is unknown, creation request is ignored", vm_id);
                    return Ok(());
                }
            };
            if vm.status() == VmStatus::Created || vm.status() == VmStatus::Destroyed {
                log_warn!(self.ctx, "vm {} is {}, creation request is ignored", vm_id, vm.status());
                return Ok(());
            }
            match self.allocation_policy.select_host(vm, &self.hosts) {
                Some(host_id) => {
                    let time = self.ctx.time();
                    if let Some(host) = self.hosts.get_mut(&host_id) {
                        host.place_vm(vm);
                    }
                    vm.place(host_id, time, self.sim_config.cloudlet_scheduler);
                    log_info!(self.ctx, "vm {} created on host {}", vm_id, host_id);
                    self.ctx
                        .emit(VmCreated { vm_id, host_id }, src, self.sim_config.message_delay)?;
                }
                None => {
                    vm.set_failed();
                    log_warn!(self.ctx, "no suitable host for vm {}", vm_id);
                    self.ctx.emit(VmCreateFailed { vm_id }, src, self.sim_config.message_delay)?;
                    return Ok(());
                }
            }
        }
        self.reschedule()
    }

    fn on_vm_destroy_request(&mut self, vm_id: u32, src: Id) -> Result<(), CloudError> {
        self.advance()?;
        let aborted = {
            let time = self.ctx.time();
            let mut store = self.store.borrow_mut();
            let EntityStore { vms, cloudlets } = &mut *store;
            let placed = vms.get_mut(&vm_id).and_then(|vm| match (vm.status(), vm.host()) {
                (VmStatus::Created, Some(host_id)) => Some((vm, host_id)),
                _ => None,
            });
            let (vm, host_id) = match placed {
                Some(placed) => placed,
                None => {
                    log_warn!(self.ctx, "vm {} is not running, destroy request is ignored", vm_id);
                    return Ok(());
                }
            };
            if let Some(host) = self.hosts.get_mut(&host_id) {
                host.remove_vm(vm);
            }
            let aborted = vm.cloudlet_scheduler.abort_all(time, cloudlets);
            vm.destroy(time);
            log_info!(self.ctx, "vm {} destroyed on host {}", vm_id, host_id);
            self.ctx
                .emit(VmDestroyed { vm_id, host_id }, src, self.sim_config.message_delay)?;
            aborted
        };
        for cloudlet_id in aborted {
            log_warn!(self.ctx, "cloudlet {} failed: its vm {} is destroyed", cloudlet_id, vm_id);
            self.return_cloudlet(cloudlet_id)?;
        }
        self.reschedule()
    }

    fn on_cloudlet_submit(&mut self, cloudlet_id: u32, src: Id) -> Result<(), CloudError> {
        self.advance()?;
        {
            let mut store = self.store.borrow_mut();
            let EntityStore { vms, cloudlets } = &mut *store;
            let vm_id = match cloudlets.get(&cloudlet_id) {
                Some(cloudlet) => cloudlet.vm(),
                None => {
                    let reason = "cloudlet is unknown".to_string();
                    return self.reject_cloudlet(cloudlet_id, reason, src);
                }
            };
            let hosts = &self.hosts;
            let vm = vm_id.and_then(|id| vms.get_mut(&id)).filter(|vm| {
                vm.status() == VmStatus::Created && vm.host().map_or(false, |host_id| hosts.contains_key(&host_id))
            });
            let vm = match vm {
                Some(vm) => vm,
                None => {
                    let reason = format!("vm {:?} is not running in this datacenter", vm_id);
                    return self.reject_cloudlet(cloudlet_id, reason, src);
                }
            };
            let pes = vm.pes;
            let status = vm.cloudlet_scheduler.submit(cloudlet_id, pes, cloudlets)?;
            vm.add_cloudlet(cloudlet_id);
            self.cloudlet_owners.insert(cloudlet_id, src);
            log_debug!(self.ctx, "cloudlet {} submitted to vm {}: {}", cloudlet_id, vm.id, status);
        }
        self.reschedule()
    }

    fn reject_cloudlet(&self, cloudlet_id: u32, reason: String, src: Id) -> Result<(), CloudError> {
        log_warn!(self.ctx, "cloudlet {} is rejected: {}", cloudlet_id, reason);
        self.ctx
            .emit(CloudletRejected { cloudlet_id, reason }, src, self.sim_config.message_delay)?;
        Ok(())
    }

    fn on_cloudlet_cancel(&mut self, cloudlet_id: u32) -> Result<(), CloudError> {
        self.advance()?;
        let cancelled = {
            let time = self.ctx.time();
            let mut store = self.store.borrow_mut();
            let EntityStore { vms, cloudlets } = &mut *store;
            let vm_id = cloudlets.get(&cloudlet_id).and_then(|cloudlet| cloudlet.vm());
            match vm_id.and_then(|id| vms.get_mut(&id)) {
                Some(vm) => vm.cloudlet_scheduler.cancel(cloudlet_id, time, cloudlets),
                None => false,
            }
        };
        if cancelled {
            log_info!(self.ctx, "cloudlet {} cancelled", cloudlet_id);
            self.return_cloudlet(cloudlet_id)?;
        } else {
            log_warn!(self.ctx, "cloudlet {} is not executed here, cancel request is ignored", cloudlet_id);
        }
        self.reschedule()
    }

    fn on_cloudlet_pause(&mut self, cloudlet_id: u32) -> Result<(), CloudError> {
        self.advance()?;
        let paused = {
            let mut store = self.store.borrow_mut();
            let EntityStore { vms, cloudlets } = &mut *store;
            let vm_id = cloudlets.get(&cloudlet_id).and_then(|cloudlet| cloudlet.vm());
            match vm_id.and_then(|id| vms.get_mut(&id)) {
                Some(vm) => vm.cloudlet_scheduler.pause(cloudlet_id, cloudlets),
                None => false,
            }
        };
        if paused {
            log_debug!(self.ctx, "cloudlet {} paused", cloudlet_id);
        } else {
            log_warn!(self.ctx, "cloudlet {} is not executed here, pause request is ignored", cloudlet_id);
        }
        self.reschedule()
    }

    fn on_cloudlet_resume(&mut self, cloudlet_id: u32) -> Result<(), CloudError> {
        self.advance()?;
        let resumed = {
            let mut store = self.store.borrow_mut();
            let EntityStore { vms, cloudlets } = &mut *store;
            let vm_id = cloudlets.get(&cloudlet_id).and_then(|cloudlet| cloudlet.vm());
            match vm_id.and_then(|id| vms.get_mut(&id)) {
                Some(vm) => {
                    let pes = vm.pes;
                    vm.cloudlet_scheduler.resume(cloudlet_id, pes, cloudlets)?
                }
                None => None,
            }
        };
        match resumed {
            Some(status) => log_debug!(self.ctx, "cloudlet {} resumed: {}", cloudlet_id, status),
            None => log_warn!(self.ctx, "cloudlet {} is not paused here, resume request is ignored", cloudlet_id),
        }
        self.reschedule()
    }

    /// Accounts cloudlet progress up to the current time and reports completed cloudlets.
    fn advance(&mut self) -> Result<(), CloudError> {
        let time = self.ctx.time();
        let mut finished = Vec::new();
        {
            let mut store = self.store.borrow_mut();
            let EntityStore { vms, cloudlets } = &mut *store;
            for host in self.hosts.values() {
                for vm_id in host.vms() {
                    if let Some(vm) = vms.get_mut(vm_id) {
                        finished.extend(vm.cloudlet_scheduler.update_processing(time, cloudlets));
                    }
                }
            }
        }
        for cloudlet_id in finished {
            log_debug!(self.ctx, "cloudlet {} finished", cloudlet_id);
            self.return_cloudlet(cloudlet_id)?;
        }
        Ok(())
    }

    fn return_cloudlet(&mut self, cloudlet_id: u32) -> Result<(), CloudError> {
        match self.cloudlet_owners.remove(&cloudlet_id) {
            Some(owner) => {
                self.ctx
                    .emit(CloudletReturned { cloudlet_id }, owner, self.sim_config.message_delay)?;
            }
            None => log_warn!(self.ctx, "cloudlet {} has no owner to return to", cloudlet_id),
        }
        Ok(())
    }

    fn reschedule(&mut self) -> Result<(), CloudError> {
        self.reallocate()?;
        self.schedule_next_update()
    }

    /// Recomputes host and VM allocations and checks capacity invariants.
    fn reallocate(&mut self) -> Result<(), CloudError> {
        let time = self.ctx.time();
        let mut store = self.store.borrow_mut();
        let EntityStore { vms, cloudlets } = &mut *store;
        let mut pending = 0;
        for host in self.hosts.values_mut() {
            host.update_allocation(vms, time)?;
            for vm_id in host.vms() {
                let vm = vms.get_mut(vm_id).ok_or(CloudError::UnknownEntity {
                    kind: EntityKind::Vm,
                    id: *vm_id,
                })?;
                let (id, pes, allocated_mips) = (vm.id, vm.pes, vm.allocated_mips());
                vm.cloudlet_scheduler.allocate(time, id, pes, allocated_mips, cloudlets)?;
                pending += vm.cloudlet_scheduler.pending_count();
            }
        }
        self.pending_cloudlets = pending;
        if self.sim_config.record_allocations {
            self.monitoring.record(time, &self.hosts, vms, cloudlets);
        }
        Ok(())
    }

    /// Replaces the scheduled update with the one at the earliest moment allocations may change.
    fn schedule_next_update(&mut self) -> Result<(), CloudError> {
        if let Some(event_id) = self.next_update.take() {
            self.ctx.cancel_event(event_id);
        }
        if self.pending_cloudlets == 0 {
            return Ok(());
        }

        let time = self.ctx.time();
        let mut next_time: Option<f64> = None;
        let mut time_varying = false;
        {
            let store = self.store.borrow();
            for host in self.hosts.values() {
                for vm in host.vms().iter().filter_map(|vm_id| store.vms.get(vm_id)) {
                    let scheduler = vm.cloudlet_scheduler();
                    let completion = scheduler.next_completion_delay(&store.cloudlets).map(|delay| time + delay);
                    next_time = earliest(next_time, completion);
                    next_time = earliest(next_time, scheduler.next_utilization_change(time, &store.cloudlets));
                    time_varying |= scheduler.has_time_varying_utilization(&store.cloudlets);
                }
            }
        }
        if self.sim_config.scheduling_interval > 0. {
            next_time = earliest(next_time, Some(time + self.sim_config.scheduling_interval));
        } else if time_varying && !self.time_varying_warned {
            log_warn!(
                self.ctx,
                "utilization of some cloudlets changes in time, but scheduling_interval is not set"
            );
            self.time_varying_warned = true;
        }

        match next_time {
            Some(next_time) => {
                let event_id = self.ctx.emit_at(UpdateProcessing {}, self.ctx.id(), next_time)?;
                self.next_update = Some(event_id);
            }
            None => log_warn!(
                self.ctx,
                "{} cloudlets are pending but none of them can make progress",
                self.pending_cloudlets
            ),
        }
        Ok(())
    }

    /// Processes a scheduling update.
    fn update_processing(&mut self) -> Result<(), CloudError> {
        self.next_update = None;
        self.advance()?;
        self.reschedule()
    }

    /// Returns the number of cloudlets in the given status among cloudlets executed by this datacenter.
    pub fn cloudlet_count(&self, status: CloudletStatus) -> usize {
        let store = self.store.borrow();
        self.hosts
            .values()
            .flat_map(|host| host.vms().iter())
            .filter_map(|vm_id| store.vms.get(vm_id))
            .flat_map(|vm| vm.cloudlets().iter())
            .filter(|id| store.cloudlets.get(*id).map(|c| c.status()) == Some(status))
            .count()
    }
}

fn earliest(current: Option<f64>, candidate: Option<f64>) -> Option<f64> {
    match (current, candidate) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

impl EventHandler for Datacenter {
    fn on(&mut self, event: Event) -> HandlerResult {
        let src = event.src;
        cast!(match event.data {
            VmCreateRequest { vm_id } => {
                self.on_vm_create_request(vm_id, src)?;
            }
            VmDestroyRequest { vm_id } => {
                self.on_vm_destroy_request(vm_id, src)?;
            }
            CloudletSubmit { cloudlet_id } => {
                self.on_cloudlet_submit(cloudlet_id, src)?;
            }
            CloudletCancel { cloudlet_id } => {
                self.on_cloudlet_cancel(cloudlet_id)?;
            }
            CloudletPause { cloudlet_id } => {
                self.on_cloudlet_pause(cloudlet_id)?;
            }
            CloudletResume { cloudlet_id } => {
                self.on_cloudlet_resume(cloudlet_id)?;
            }
            UpdateProcessing {} => {
                self.update_processing()?;
            }
        });
        Ok(())
    }

    fn is_idle(&self) -> bool {
        self.pending_cloudlets == 0
    }
}
