//! Shared storage of VMs and cloudlets.

use indexmap::IndexMap;

use crate::core::cloudlet::Cloudlet;
use crate::core::common::EntityKind;
use crate::core::errors::CloudError;
use crate::core::vm::VirtualMachine;

/// Stores VMs and cloudlets of the simulation keyed by their ids.
///
/// The store is shared between the datacenter and the broker, relations between entities are expressed with ids.
#[derive(Default)]
pub struct EntityStore {
    pub vms: IndexMap<u32, VirtualMachine>,
    pub cloudlets: IndexMap<u32, Cloudlet>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vm(&self, id: u32) -> Option<&VirtualMachine> {
        self.vms.get(&id)
    }

    pub fn cloudlet(&self, id: u32) -> Option<&Cloudlet> {
        self.cloudlets.get(&id)
    }

    pub fn add_vm(&mut self, vm: VirtualMachine) -> Result<(), CloudError> {
        if self.vms.contains_key(&vm.id) {
            return Err(CloudError::DuplicateId {
                kind: EntityKind::Vm,
                id: vm.id,
            });
        }
        self.vms.insert(vm.id, vm);
        Ok(())
    }

    pub fn add_cloudlet(&mut self, cloudlet: Cloudlet) -> Result<(), CloudError> {
        if self.cloudlets.contains_key(&cloudlet.id) {
            return Err(CloudError::DuplicateId {
                kind: EntityKind::Cloudlet,
                id: cloudlet.id,
            });
        }
        self.cloudlets.insert(cloudlet.id, cloudlet);
        Ok(())
    }
}
