//! Physical host and its processing elements.

use indexmap::IndexMap;
use serde::Serialize;

use edgesim_models::ShareError;

use crate::core::common::{AllocationVerdict, EntityKind};
use crate::core::errors::CloudError;
use crate::core::vm::VirtualMachine;
use crate::core::vm_scheduler::{VmScheduler, VmSchedulingPolicy};

const CAPACITY_TOLERANCE: f64 = 1e-9;

/// Processing element (CPU core) with fixed capacity in MIPS.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Pe {
    pub id: u32,
    pub mips: f64,
}

impl Pe {
    pub fn new(id: u32, mips: f64) -> Self {
        Self { id, mips }
    }

    /// Creates `count` identical PEs numbered from zero.
    pub fn list(count: u32, mips: f64) -> Vec<Pe> {
        (0..count).map(|id| Pe::new(id, mips)).collect()
    }
}

/// Represents physical host.
///
/// Host owns a fixed list of PEs and RAM, bandwidth and storage capacities. RAM, bandwidth and storage are
/// reserved by resident VMs for their whole lifetime, while PE capacity is divided among them by the VM scheduler
/// on each scheduling update.
#[derive(Clone, Debug)]
pub struct Host {
    pub id: u32,
    pes: Vec<Pe>,
    ram: f64,
    bw: f64,
    storage: f64,
    ram_allocated: f64,
    bw_allocated: f64,
    storage_allocated: f64,
    vm_scheduling: Option<VmSchedulingPolicy>,
    vm_scheduler: VmScheduler,
    vms: Vec<u32>,
}

impl Host {
    /// Creates host with the given PEs and capacities.
    ///
    /// The VM scheduler policy is taken from the simulation config unless set with
    /// [`with_vm_scheduler`](Self::with_vm_scheduler).
    pub fn new(id: u32, pes: Vec<Pe>, ram: f64, bw: f64, storage: f64) -> Self {
        let pe_count = pes.len();
        Self {
            id,
            pes,
            ram,
            bw,
            storage,
            ram_allocated: 0.,
            bw_allocated: 0.,
            storage_allocated: 0.,
            vm_scheduling: None,
            vm_scheduler: VmScheduler::new(VmSchedulingPolicy::default(), pe_count),
            vms: Vec::new(),
        }
    }

    pub fn with_vm_scheduler(mut self, policy: VmSchedulingPolicy) -> Self {
        self.vm_scheduling = Some(policy);
        self.vm_scheduler = VmScheduler::new(policy, self.pes.len());
        self
    }

    pub(crate) fn set_default_vm_scheduler(&mut self, policy: VmSchedulingPolicy) {
        if self.vm_scheduling.is_none() && self.vms.is_empty() {
            self.vm_scheduler = VmScheduler::new(policy, self.pes.len());
        }
    }

    pub fn pes(&self) -> &[Pe] {
        &self.pes
    }

    /// Returns the total capacity of host PEs.
    pub fn total_mips(&self) -> f64 {
        self.pes.iter().map(|pe| pe.mips).sum()
    }

    pub fn free_pes(&self) -> usize {
        self.vm_scheduler.free_pes()
    }

    pub fn ram(&self) -> f64 {
        self.ram
    }

    pub fn bw(&self) -> f64 {
        self.bw
    }

    pub fn storage(&self) -> f64 {
        self.storage
    }

    pub fn available_ram(&self) -> f64 {
        self.ram - self.ram_allocated
    }

    pub fn available_bw(&self) -> f64 {
        self.bw - self.bw_allocated
    }

    pub fn available_storage(&self) -> f64 {
        self.storage - self.storage_allocated
    }

    /// Returns ids of resident VMs in placement order.
    pub fn vms(&self) -> &[u32] {
        &self.vms
    }

    pub fn vm_scheduler(&self) -> &VmScheduler {
        &self.vm_scheduler
    }

    /// Returns the PE capacity currently allocated to resident VMs.
    pub fn allocated_mips(&self) -> f64 {
        self.vm_scheduler.total_allocated_mips()
    }

    pub fn is_suitable_for_vm(&self, vm: &VirtualMachine) -> AllocationVerdict {
        let verdict = self.vm_scheduler.is_suitable_for_vm(&self.pes, vm);
        if verdict != AllocationVerdict::Success {
            return verdict;
        }
        if self.available_ram() < vm.ram {
            return AllocationVerdict::NotEnoughRam;
        }
        if self.available_bw() < vm.bw {
            return AllocationVerdict::NotEnoughBandwidth;
        }
        if self.available_storage() < vm.size {
            return AllocationVerdict::NotEnoughStorage;
        }
        AllocationVerdict::Success
    }

    pub(crate) fn place_vm(&mut self, vm: &VirtualMachine) {
        self.ram_allocated += vm.ram;
        self.bw_allocated += vm.bw;
        self.storage_allocated += vm.size;
        self.vm_scheduler.place(&self.pes, vm);
        self.vms.push(vm.id);
    }

    pub(crate) fn remove_vm(&mut self, vm: &VirtualMachine) {
        if let Some(pos) = self.vms.iter().position(|id| *id == vm.id) {
            self.vms.remove(pos);
            self.ram_allocated -= vm.ram;
            self.bw_allocated -= vm.bw;
            self.storage_allocated -= vm.size;
            self.vm_scheduler.release(vm.id);
        }
    }

    /// Recomputes PE capacity allocated to resident VMs and stores it in VMs.
    pub(crate) fn update_allocation(
        &mut self,
        vms: &mut IndexMap<u32, VirtualMachine>,
        time: f64,
    ) -> Result<(), CloudError> {
        let mut requests = Vec::with_capacity(self.vms.len());
        for vm_id in self.vms.iter() {
            let vm = vms.get(vm_id).ok_or(CloudError::UnknownEntity {
                kind: EntityKind::Vm,
                id: *vm_id,
            })?;
            requests.push((*vm_id, vm.requested_mips()));
        }
        self.vm_scheduler
            .allocate(&self.pes, &requests)
            .map_err(|source| self.capacity_exceeded(time, source))?;

        let capacity = self.total_mips();
        let granted = self.vm_scheduler.total_allocated_mips();
        if granted > capacity * (1. + CAPACITY_TOLERANCE) {
            return Err(self.capacity_exceeded(time, ShareError::Oversubscribed { granted, capacity }));
        }
        for (vm_id, _) in requests {
            if let Some(vm) = vms.get_mut(&vm_id) {
                vm.set_allocated_mips(self.vm_scheduler.allocated_mips(vm_id));
            }
        }
        Ok(())
    }

    fn capacity_exceeded(&self, time: f64, source: ShareError) -> CloudError {
        CloudError::CapacityExceeded {
            kind: EntityKind::Host,
            id: self.id,
            time,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resources_are_reserved_and_released() {
        let mut host = Host::new(0, Pe::list(4, 1000.), 8192., 10000., 1000000.);
        let vm = VirtualMachine::new(0, 1000., 2).with_ram(4096.);
        assert_eq!(host.is_suitable_for_vm(&vm), AllocationVerdict::Success);
        host.place_vm(&vm);
        assert_eq!(host.available_ram(), 4096.);
        assert_eq!(host.free_pes(), 2);
        host.place_vm(&VirtualMachine::new(1, 1000., 2).with_ram(4096.));
        assert_eq!(
            host.is_suitable_for_vm(&VirtualMachine::new(2, 1000., 1).with_ram(1024.)),
            AllocationVerdict::NotEnoughRam
        );
        host.remove_vm(&vm);
        assert_eq!(host.vms(), &[1]);
        assert_eq!(host.available_ram(), 4096.);
    }

    #[test]
    fn test_allocation_is_stored_in_vms() {
        let mut host = Host::new(0, Pe::list(2, 1000.), 8192., 10000., 1000000.);
        let mut vms = IndexMap::new();
        for id in 0..2 {
            let vm = VirtualMachine::new(id, 1000., 2);
            host.place_vm(&vm);
            vms.insert(id, vm);
        }
        host.update_allocation(&mut vms, 0.).unwrap();
        assert_eq!(vms[&0].allocated_mips(), 1000.);
        assert_eq!(vms[&1].allocated_mips(), 1000.);
        assert_eq!(host.allocated_mips(), 2000.);
    }
}
