//! Main entry point for simulation configuration and execution.

use std::cell::RefCell;
use std::rc::Rc;

use sugars::{rc, refcell};

use edgesim_core::{Id, Simulation};

use crate::core::broker::Broker;
use crate::core::cloudlet::Cloudlet;
use crate::core::config::SimulationConfig;
use crate::core::datacenter::Datacenter;
use crate::core::entity_store::EntityStore;
use crate::core::errors::{unwrap_simulation_error, CloudError};
use crate::core::host::Host;
use crate::core::monitoring::HostAllocation;
use crate::core::vm::VirtualMachine;

/// Represents a simulation of edge datacenter with a single broker.
pub struct CloudSimulation {
    store: Rc<RefCell<EntityStore>>,
    datacenter: Rc<RefCell<Datacenter>>,
    datacenter_id: Id,
    broker: Rc<RefCell<Broker>>,
    broker_id: Id,
    sim: Simulation,
    sim_config: Rc<SimulationConfig>,
}

impl CloudSimulation {
    /// Creates a simulation with the given hosts and config.
    pub fn new(mut sim: Simulation, hosts: Vec<Host>, sim_config: SimulationConfig) -> Result<Self, CloudError> {
        sim_config.validate()?;
        let sim_config = rc!(sim_config);
        let store = rc!(refcell!(EntityStore::new()));

        let datacenter = rc!(refcell!(Datacenter::new(
            hosts,
            store.clone(),
            sim.create_context("datacenter"),
            sim_config.clone(),
        )?));
        let datacenter_id = sim.add_handler("datacenter", datacenter.clone());

        let broker = rc!(refcell!(Broker::new(
            datacenter_id,
            store.clone(),
            sim.create_context("broker"),
            sim_config.clone(),
        )));
        let broker_id = sim.add_handler("broker", broker.clone());

        Ok(Self {
            store,
            datacenter,
            datacenter_id,
            broker,
            broker_id,
            sim,
            sim_config,
        })
    }

    /// Submits VMs to the broker, see [`Broker::submit_vm_list`].
    pub fn submit_vm_list(&mut self, vms: Vec<VirtualMachine>) -> Result<(), CloudError> {
        self.broker.borrow_mut().submit_vm_list(vms)
    }

    /// Submits cloudlets to the broker, see [`Broker::submit_cloudlet_list`].
    pub fn submit_cloudlet_list(&mut self, cloudlets: Vec<Cloudlet>) -> Result<(), CloudError> {
        self.broker.borrow_mut().submit_cloudlet_list(cloudlets)
    }

    /// Starts the broker and runs the simulation until all submitted work is done, returns the final time.
    ///
    /// Fails with the error which aborted the run, e.g. [`CloudError::CapacityExceeded`]. If the configured
    /// wall-clock limit is exceeded, the run is interrupted and the current time is returned.
    pub fn start(&mut self) -> Result<f64, CloudError> {
        self.broker.borrow_mut().start()?;
        match self.sim_config.wall_clock_limit_duration()? {
            Some(limit) => {
                self.sim
                    .run_with_wall_clock_limit(limit)
                    .map_err(unwrap_simulation_error)?;
            }
            None => self.sim.run().map_err(unwrap_simulation_error)?,
        }
        Ok(self.sim.time())
    }

    /// Performs the specified number of steps through the simulation, starting the broker if needed.
    ///
    /// Returns `Ok(true)` if there could be more pending events and `Ok(false)` otherwise.
    pub fn steps(&mut self, step_count: u64) -> Result<bool, CloudError> {
        self.broker.borrow_mut().start()?;
        self.sim.steps(step_count).map_err(unwrap_simulation_error)
    }

    /// Steps through the simulation with duration limit, starting the broker if needed.
    ///
    /// Returns `Ok(true)` if there could be more pending events and `Ok(false)` otherwise.
    pub fn step_for_duration(&mut self, duration: f64) -> Result<bool, CloudError> {
        self.broker.borrow_mut().start()?;
        self.sim.step_for_duration(duration).map_err(unwrap_simulation_error)
    }

    /// Returns the current simulation time.
    pub fn current_time(&self) -> f64 {
        self.sim.time()
    }

    /// Returns the total number of created events.
    pub fn event_count(&self) -> u64 {
        self.sim.event_count()
    }

    pub fn broker(&self) -> Rc<RefCell<Broker>> {
        self.broker.clone()
    }

    pub fn broker_id(&self) -> Id {
        self.broker_id
    }

    pub fn datacenter(&self) -> Rc<RefCell<Datacenter>> {
        self.datacenter.clone()
    }

    pub fn datacenter_id(&self) -> Id {
        self.datacenter_id
    }

    pub fn sim_config(&self) -> Rc<SimulationConfig> {
        self.sim_config.clone()
    }

    /// Returns finished cloudlets in completion order.
    pub fn cloudlet_finished_list(&self) -> Vec<Cloudlet> {
        self.broker.borrow().cloudlet_finished_list()
    }

    /// Returns the current state of cloudlet.
    pub fn cloudlet(&self, id: u32) -> Option<Cloudlet> {
        self.store.borrow().cloudlet(id).cloned()
    }

    /// Returns the current state of VM.
    pub fn vm(&self, id: u32) -> Option<VirtualMachine> {
        self.store.borrow().vm(id).cloned()
    }

    /// Requests creation of VMs which failed placement before.
    pub fn resubmit_waiting_vms(&mut self) -> Result<usize, CloudError> {
        self.broker.borrow_mut().resubmit_waiting_vms()
    }

    pub fn cancel_cloudlet(&mut self, cloudlet_id: u32) -> Result<(), CloudError> {
        self.broker.borrow_mut().cancel_cloudlet(cloudlet_id)
    }

    pub fn pause_cloudlet(&mut self, cloudlet_id: u32) -> Result<(), CloudError> {
        self.broker.borrow_mut().pause_cloudlet(cloudlet_id)
    }

    pub fn resume_cloudlet(&mut self, cloudlet_id: u32) -> Result<(), CloudError> {
        self.broker.borrow_mut().resume_cloudlet(cloudlet_id)
    }

    pub fn destroy_vm(&mut self, vm_id: u32) -> Result<(), CloudError> {
        self.broker.borrow_mut().destroy_vm(vm_id)
    }

    /// Returns recorded allocation snapshots (empty unless `record_allocations` is enabled).
    pub fn allocation_history(&self) -> Vec<HostAllocation> {
        self.datacenter.borrow().monitoring().history().to_vec()
    }
}
