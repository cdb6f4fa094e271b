//! Division of host processing capacity among resident VMs.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use edgesim_models::{divide, Demand, ShareError};

use crate::core::common::AllocationVerdict;
use crate::core::host::Pe;
use crate::core::vm::VirtualMachine;

/// Policy of VM scheduler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VmSchedulingPolicy {
    /// VMs share all host PEs, under oversubscription each VM gets a share proportional to its request.
    #[default]
    TimeShared,
    /// Each VM exclusively owns the PEs it requested.
    SpaceShared,
}

/// Per-host scheduler which decides how much processing capacity each resident VM receives.
#[derive(Clone, Debug)]
pub struct VmScheduler {
    policy: VmSchedulingPolicy,
    // number of PEs requested by each resident VM
    placed: IndexMap<u32, u32>,
    // owner of each host PE, used by the space-shared policy only
    pe_owners: Vec<Option<u32>>,
    allocations: IndexMap<u32, f64>,
}

impl VmScheduler {
    pub fn new(policy: VmSchedulingPolicy, pe_count: usize) -> Self {
        Self {
            policy,
            placed: IndexMap::new(),
            pe_owners: vec![None; pe_count],
            allocations: IndexMap::new(),
        }
    }

    pub fn policy(&self) -> VmSchedulingPolicy {
        self.policy
    }

    /// Returns the number of host PEs not requested by resident VMs.
    pub fn free_pes(&self) -> usize {
        let reserved: usize = self.placed.values().map(|pes| *pes as usize).sum();
        self.pe_owners.len().saturating_sub(reserved)
    }

    /// Checks whether the host PEs can serve the VM.
    pub fn is_suitable_for_vm(&self, pes: &[Pe], vm: &VirtualMachine) -> AllocationVerdict {
        let required = vm.pes as usize;
        let candidates: Vec<&Pe> = match self.policy {
            VmSchedulingPolicy::TimeShared => pes.iter().collect(),
            VmSchedulingPolicy::SpaceShared => pes
                .iter()
                .zip(self.pe_owners.iter())
                .filter(|(_, owner)| owner.is_none())
                .map(|(pe, _)| pe)
                .collect(),
        };
        if candidates.len() < required {
            return AllocationVerdict::NotEnoughPes;
        }
        if candidates.iter().filter(|pe| pe.mips >= vm.mips).count() < required {
            return AllocationVerdict::PesTooSlow;
        }
        AllocationVerdict::Success
    }

    /// Registers the VM as resident, the VM must be suitable.
    pub fn place(&mut self, pes: &[Pe], vm: &VirtualMachine) {
        self.placed.insert(vm.id, vm.pes);
        self.allocations.insert(vm.id, 0.);
        if self.policy == VmSchedulingPolicy::SpaceShared {
            let mut remaining = vm.pes;
            for (pe, owner) in pes.iter().zip(self.pe_owners.iter_mut()) {
                if remaining == 0 {
                    break;
                }
                if owner.is_none() && pe.mips >= vm.mips {
                    *owner = Some(vm.id);
                    remaining -= 1;
                }
            }
        }
    }

    pub fn release(&mut self, vm_id: u32) {
        self.placed.shift_remove(&vm_id);
        self.allocations.shift_remove(&vm_id);
        for owner in self.pe_owners.iter_mut() {
            if *owner == Some(vm_id) {
                *owner = None;
            }
        }
    }

    /// Divides the capacity of host PEs among VMs, each VM is given as `(vm_id, requested_mips)`.
    pub fn allocate(&mut self, pes: &[Pe], requests: &[(u32, f64)]) -> Result<(), ShareError> {
        match self.policy {
            VmSchedulingPolicy::TimeShared => {
                let capacity: f64 = pes.iter().map(|pe| pe.mips).sum();
                let demands: Vec<Demand> = requests.iter().map(|(_, mips)| Demand::full(*mips)).collect();
                let grants = divide(capacity, &demands)?;
                for ((vm_id, _), grant) in requests.iter().zip(grants) {
                    self.allocations.insert(*vm_id, grant);
                }
            }
            VmSchedulingPolicy::SpaceShared => {
                for (vm_id, mips) in requests {
                    let capacity: f64 = pes
                        .iter()
                        .zip(self.pe_owners.iter())
                        .filter(|(_, owner)| **owner == Some(*vm_id))
                        .map(|(pe, _)| pe.mips)
                        .sum();
                    let grants = divide(capacity, &[Demand::full(*mips)])?;
                    self.allocations.insert(*vm_id, grants[0]);
                }
            }
        }
        Ok(())
    }

    pub fn allocated_mips(&self, vm_id: u32) -> f64 {
        self.allocations.get(&vm_id).copied().unwrap_or(0.)
    }

    pub fn total_allocated_mips(&self) -> f64 {
        self.allocations.values().sum()
    }
}
