//! Datacenter model: resources, entities, schedulers and simulation components.

pub mod broker;
pub mod cloudlet;
pub mod cloudlet_scheduler;
pub mod common;
pub mod config;
pub mod datacenter;
pub mod entity_store;
pub mod errors;
pub mod events;
pub mod host;
pub mod monitoring;
pub mod vm;
pub mod vm_allocation_policies;
pub mod vm_allocation_policy;
pub mod vm_scheduler;
