//! Best Fit policy.

use indexmap::IndexMap;

use crate::core::common::AllocationVerdict;
use crate::core::host::Host;
use crate::core::vm::VirtualMachine;
use crate::core::vm_allocation_policy::VmAllocationPolicy;

/// Uses the most loaded (by free PEs) suitable host.
#[derive(Default)]
pub struct BestFit;

impl BestFit {
    pub fn new() -> Self {
        Self {}
    }
}

impl VmAllocationPolicy for BestFit {
    fn select_host(&self, vm: &VirtualMachine, hosts: &IndexMap<u32, Host>) -> Option<u32> {
        let mut result: Option<u32> = None;
        let mut min_free_pes = usize::MAX;

        for host in hosts.values() {
            if host.is_suitable_for_vm(vm) == AllocationVerdict::Success && host.free_pes() < min_free_pes {
                min_free_pes = host.free_pes();
                result = Some(host.id);
            }
        }
        result
    }
}
