//! Worst Fit policy.

use indexmap::IndexMap;

use crate::core::common::AllocationVerdict;
use crate::core::host::Host;
use crate::core::vm::VirtualMachine;
use crate::core::vm_allocation_policy::VmAllocationPolicy;

/// Uses the least loaded (by free PEs) suitable host.
#[derive(Default)]
pub struct WorstFit;

impl WorstFit {
    pub fn new() -> Self {
        Self {}
    }
}

impl VmAllocationPolicy for WorstFit {
    fn select_host(&self, vm: &VirtualMachine, hosts: &IndexMap<u32, Host>) -> Option<u32> {
        let mut result: Option<u32> = None;
        let mut max_free_pes = 0;

        for host in hosts.values() {
            if host.is_suitable_for_vm(vm) == AllocationVerdict::Success
                && (result.is_none() || host.free_pes() > max_free_pes)
            {
                max_free_pes = host.free_pes();
                result = Some(host.id);
            }
        }
        result
    }
}
