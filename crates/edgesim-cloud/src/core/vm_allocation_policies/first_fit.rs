//! First Fit policy.

use indexmap::IndexMap;

use crate::core::common::AllocationVerdict;
use crate::core::host::Host;
use crate::core::vm::VirtualMachine;
use crate::core::vm_allocation_policy::VmAllocationPolicy;

/// Uses the first suitable host in datacenter order.
#[derive(Default)]
pub struct FirstFit;

impl FirstFit {
    pub fn new() -> Self {
        Self {}
    }
}

impl VmAllocationPolicy for FirstFit {
    fn select_host(&self, vm: &VirtualMachine, hosts: &IndexMap<u32, Host>) -> Option<u32> {
        hosts
            .values()
            .find(|host| host.is_suitable_for_vm(vm) == AllocationVerdict::Success)
            .map(|host| host.id)
    }
}
