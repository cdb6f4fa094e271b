//! Recording of capacity allocations.

use indexmap::IndexMap;
use serde::Serialize;

use crate::core::cloudlet::Cloudlet;
use crate::core::host::Host;
use crate::core::vm::VirtualMachine;

#[derive(Clone, Debug, Serialize)]
pub struct CloudletAllocation {
    pub cloudlet_id: u32,
    pub allocated_mips: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct VmAllocation {
    pub vm_id: u32,
    pub requested_mips: f64,
    pub allocated_mips: f64,
    pub cloudlets: Vec<CloudletAllocation>,
}

impl VmAllocation {
    /// Returns the capacity granted to the VM cloudlets.
    pub fn cloudlets_allocated_mips(&self) -> f64 {
        self.cloudlets.iter().map(|c| c.allocated_mips).sum()
    }
}

/// Snapshot of host allocations taken after a scheduling update.
#[derive(Clone, Debug, Serialize)]
pub struct HostAllocation {
    pub time: f64,
    pub host_id: u32,
    pub capacity_mips: f64,
    pub vms: Vec<VmAllocation>,
}

impl HostAllocation {
    pub fn allocated_mips(&self) -> f64 {
        self.vms.iter().map(|vm| vm.allocated_mips).sum()
    }

    pub fn requested_mips(&self) -> f64 {
        self.vms.iter().map(|vm| vm.requested_mips).sum()
    }
}

/// Keeps the history of allocations when `record_allocations` is enabled.
#[derive(Default)]
pub struct Monitoring {
    history: Vec<HostAllocation>,
}

impl Monitoring {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(
        &mut self,
        time: f64,
        hosts: &IndexMap<u32, Host>,
        vms: &IndexMap<u32, VirtualMachine>,
        cloudlets: &IndexMap<u32, Cloudlet>,
    ) {
        for host in hosts.values() {
            let vm_allocations = host
                .vms()
                .iter()
                .filter_map(|vm_id| vms.get(vm_id))
                .map(|vm| VmAllocation {
                    vm_id: vm.id,
                    requested_mips: vm.requested_mips(),
                    allocated_mips: vm.allocated_mips(),
                    cloudlets: vm
                        .cloudlet_scheduler()
                        .exec_list()
                        .iter()
                        .filter_map(|id| cloudlets.get(id))
                        .map(|cloudlet| CloudletAllocation {
                            cloudlet_id: cloudlet.id,
                            allocated_mips: cloudlet.allocated_mips(),
                        })
                        .collect(),
                })
                .collect();
            self.history.push(HostAllocation {
                time,
                host_id: host.id,
                capacity_mips: host.total_mips(),
                vms: vm_allocations,
            });
        }
    }

    /// Returns all recorded snapshots in time order.
    pub fn history(&self) -> &[HostAllocation] {
        &self.history
    }

    pub fn host_history(&self, host_id: u32) -> impl Iterator<Item = &HostAllocation> + '_ {
        self.history.iter().filter(move |record| record.host_id == host_id)
    }
}
