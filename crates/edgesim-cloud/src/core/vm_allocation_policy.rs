//! VM allocation policies.

use indexmap::IndexMap;

use crate::core::errors::CloudError;
use crate::core::host::Host;
use crate::core::vm::VirtualMachine;
use crate::core::vm_allocation_policies::best_fit::BestFit;
use crate::core::vm_allocation_policies::first_fit::FirstFit;
use crate::core::vm_allocation_policies::worst_fit::WorstFit;

/// Trait for implementation of VM allocation policies.
///
/// The policy is defined as a function of VM and current state of datacenter hosts, which returns an ID of host
/// selected for VM placement or `None` if there is no suitable host.
pub trait VmAllocationPolicy {
    fn select_host(&self, vm: &VirtualMachine, hosts: &IndexMap<u32, Host>) -> Option<u32>;
}

/// Returns the allocation policy with the given name.
pub fn vm_allocation_policy_resolver(name: &str) -> Result<Box<dyn VmAllocationPolicy>, CloudError> {
    match name {
        "FirstFit" => Ok(Box::new(FirstFit::new())),
        "BestFit" => Ok(Box::new(BestFit::new())),
        "WorstFit" => Ok(Box::new(WorstFit::new())),
        _ => Err(CloudError::Config(format!("unknown vm allocation policy: {}", name))),
    }
}
