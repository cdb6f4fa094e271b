//! Accessing simulation from components.

use std::cell::RefCell;
use std::rc::Rc;

use rand::distributions::uniform::{SampleRange, SampleUniform};

use crate::component::Id;
use crate::error::SimulationError;
use crate::event::{EventData, EventId};
use crate::state::SimulationState;

/// A facade for accessing the simulation state and producing events from simulation components.
pub struct SimulationContext {
    id: Id,
    name: String,
    sim_state: Rc<RefCell<SimulationState>>,
}

impl SimulationContext {
    pub(crate) fn new(id: Id, name: &str, sim_state: Rc<RefCell<SimulationState>>) -> Self {
        Self {
            id,
            name: name.to_owned(),
            sim_state,
        }
    }

    /// Returns the identifier of component associated with this context.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Returns the name of component associated with this context.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.sim_state.borrow().time()
    }

    /// Returns a random float in the range _[0, 1)_ using the simulation-wide random number generator.
    pub fn rand(&self) -> f64 {
        self.sim_state.borrow_mut().rand()
    }

    /// Returns a random number in the specified range using the simulation-wide random number generator.
    pub fn gen_range<T, R>(&self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.sim_state.borrow_mut().gen_range(range)
    }

    /// Creates new event with specified payload, destination and delay, returns event id.
    ///
    /// Fails with [`SimulationError::InvalidTime`] if the delay is negative.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use serde::Serialize;
    /// use edgesim_core::{Simulation, SimulationError};
    ///
    /// #[derive(Clone, Serialize)]
    /// pub struct SomeEvent {
    /// }
    ///
    /// let mut sim = Simulation::new(123);
    /// let comp1_ctx = sim.create_context("comp1");
    /// let comp2_ctx = sim.create_context("comp2");
    /// let event_id = comp1_ctx.emit(SomeEvent {}, comp2_ctx.id(), 1.5).unwrap();
    /// assert_eq!(event_id, 0);
    /// let res = comp1_ctx.emit(SomeEvent {}, comp2_ctx.id(), -1.);
    /// assert!(matches!(res, Err(SimulationError::InvalidTime { .. })));
    /// ```
    pub fn emit<T>(&self, data: T, dst: Id, delay: f64) -> Result<EventId, SimulationError>
    where
        T: EventData,
    {
        self.sim_state.borrow_mut().add_event(data, self.id, dst, delay)
    }

    /// Creates new event with specified payload and destination at the current time.
    pub fn emit_now<T>(&self, data: T, dst: Id) -> Result<EventId, SimulationError>
    where
        T: EventData,
    {
        self.sim_state.borrow_mut().add_event(data, self.id, dst, 0.)
    }

    /// Creates new event for itself with specified payload and delay.
    pub fn emit_self<T>(&self, data: T, delay: f64) -> Result<EventId, SimulationError>
    where
        T: EventData,
    {
        self.sim_state.borrow_mut().add_event(data, self.id, self.id, delay)
    }

    /// Creates new event for itself with specified payload at the current time.
    pub fn emit_self_now<T>(&self, data: T) -> Result<EventId, SimulationError>
    where
        T: EventData,
    {
        self.sim_state.borrow_mut().add_event(data, self.id, self.id, 0.)
    }

    /// Creates new event with specified payload and destination at the specified absolute time.
    ///
    /// Fails with [`SimulationError::InvalidTime`] if the time is before the current simulation time.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use serde::Serialize;
    /// use edgesim_core::{Simulation, SimulationError};
    ///
    /// #[derive(Clone, Serialize)]
    /// pub struct Tick {
    /// }
    ///
    /// let mut sim = Simulation::new(123);
    /// let ctx = sim.create_context("comp");
    /// ctx.emit_at(Tick {}, ctx.id(), 3.).unwrap();
    /// sim.step().unwrap();
    /// assert_eq!(sim.time(), 3.);
    /// let res = ctx.emit_at(Tick {}, ctx.id(), 2.);
    /// assert!(matches!(res, Err(SimulationError::InvalidTime { time, current }) if time == 2. && current == 3.));
    /// ```
    pub fn emit_at<T>(&self, data: T, dst: Id, time: f64) -> Result<EventId, SimulationError>
    where
        T: EventData,
    {
        self.sim_state.borrow_mut().add_event_at(data, self.id, dst, time)
    }

    /// Cancels the specified event.
    ///
    /// Cancelling an already delivered event has no effect.
    pub fn cancel_event(&self, id: EventId) {
        self.sim_state.borrow_mut().cancel_event(id);
    }

    /// Returns the name of component by its identifier.
    pub fn lookup_name(&self, id: Id) -> Option<String> {
        self.sim_state.borrow().lookup_name(id).map(|name| name.to_owned())
    }
}
