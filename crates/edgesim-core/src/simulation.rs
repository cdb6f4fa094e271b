//! Simulation configuration and execution.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use log::Level::Trace;
use log::{debug, log_enabled, trace, warn};
use serde_json::json;
use serde_type_name::type_name;

use crate::component::Id;
use crate::context::SimulationContext;
use crate::error::SimulationError;
use crate::event::Event;
use crate::handler::EventHandler;
use crate::log::{get_colored, log_undelivered_event};
use crate::state::SimulationState;

/// Represents a simulation, provides methods for its configuration and execution.
pub struct Simulation {
    sim_state: Rc<RefCell<SimulationState>>,
    handlers: Vec<Option<Rc<RefCell<dyn EventHandler>>>>,
}

impl Simulation {
    /// Creates a new simulation with specified random seed.
    pub fn new(seed: u64) -> Self {
        Self {
            sim_state: Rc::new(RefCell::new(SimulationState::new(seed))),
            handlers: Vec::new(),
        }
    }

    fn register(&mut self, name: &str) -> Id {
        let id = self.sim_state.borrow_mut().register(name);
        if self.handlers.len() <= id as usize {
            self.handlers.resize(id as usize + 1, None);
        }
        id
    }

    /// Returns the identifier of component by its name.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use edgesim_core::Simulation;
    ///
    /// let mut sim = Simulation::new(123);
    /// let comp_ctx = sim.create_context("comp");
    /// assert_eq!(sim.lookup_id("comp"), Some(comp_ctx.id()));
    /// assert_eq!(sim.lookup_id("comp1"), None);
    /// ```
    pub fn lookup_id(&self, name: &str) -> Option<Id> {
        self.sim_state.borrow().lookup_id(name)
    }

    /// Returns the name of component by its identifier.
    pub fn lookup_name(&self, id: Id) -> Option<String> {
        self.sim_state.borrow().lookup_name(id).map(|name| name.to_owned())
    }

    /// Creates a new simulation context with specified name.
    ///
    /// Component ids are assigned sequentially starting from 0. Creating a context with already registered name
    /// returns the context of that component.
    pub fn create_context<S>(&mut self, name: S) -> SimulationContext
    where
        S: AsRef<str>,
    {
        let id = self.register(name.as_ref());
        let ctx = SimulationContext::new(id, name.as_ref(), self.sim_state.clone());
        debug!(
            target: "simulation",
            "[{:.3} {} simulation] Created context: {}",
            self.time(),
            get_colored("DEBUG", colored::Color::Blue),
            json!({"name": ctx.name(), "id": ctx.id()})
        );
        ctx
    }

    /// Registers the event handler implementation for component with specified name, returns the component Id.
    ///
    /// When the handler is registered for component with existing context, the Id assigned in
    /// [`create_context()`](Self::create_context()) is reused.
    pub fn add_handler<S>(&mut self, name: S, handler: Rc<RefCell<dyn EventHandler>>) -> Id
    where
        S: AsRef<str>,
    {
        let id = self.register(name.as_ref());
        self.handlers[id as usize] = Some(handler);
        debug!(
            target: "simulation",
            "[{:.3} {} simulation] Added handler: {}",
            self.time(),
            get_colored("DEBUG", colored::Color::Blue),
            json!({"name": name.as_ref(), "id": id})
        );
        id
    }

    /// Removes the event handler for component with specified name.
    ///
    /// All subsequent events destined for this component are discarded until the handler is added again.
    pub fn remove_handler<S>(&mut self, name: S)
    where
        S: AsRef<str>,
    {
        if let Some(id) = self.lookup_id(name.as_ref()) {
            self.handlers[id as usize] = None;
            debug!(
                target: "simulation",
                "[{:.3} {} simulation] Removed handler: {}",
                self.time(),
                get_colored("DEBUG", colored::Color::Blue),
                json!({"name": name.as_ref(), "id": id})
            );
        }
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> f64 {
        self.sim_state.borrow().time()
    }

    /// Performs a single step through the simulation.
    ///
    /// Takes the next event from the queue, advances the simulation time to event time and tries to process it
    /// by invoking the [`EventHandler::on()`](crate::EventHandler::on()) method of the corresponding event handler.
    /// If there is no handler registered for component with Id `event.dst`, logs the undelivered event and discards it.
    ///
    /// Returns `Ok(true)` if some pending event was found and `Ok(false)` if there are no pending events.
    /// Fails with [`SimulationError::Handler`] if the handler returned an error.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use serde::Serialize;
    /// use edgesim_core::Simulation;
    ///
    /// #[derive(Clone, Serialize)]
    /// pub struct SomeEvent {
    /// }
    ///
    /// let mut sim = Simulation::new(123);
    /// let comp_ctx = sim.create_context("comp");
    /// comp_ctx.emit_self(SomeEvent {}, 1.2).unwrap();
    /// assert!(sim.step().unwrap());
    /// assert_eq!(sim.time(), 1.2);
    /// assert!(!sim.step().unwrap());
    /// ```
    pub fn step(&mut self) -> Result<bool, SimulationError> {
        let next = self.sim_state.borrow_mut().next_event();
        let event = match next {
            Some(event) => event,
            None => return Ok(false),
        };
        let handler = self.handlers.get(event.dst as usize).and_then(|handler| handler.clone());
        match handler {
            Some(handler) => {
                let dst_name = self.component_name(event.dst);
                if log_enabled!(Trace) {
                    self.trace_event(&event, &dst_name);
                }
                handler
                    .borrow_mut()
                    .on(event)
                    .map_err(|source| SimulationError::Handler {
                        component: dst_name,
                        source,
                    })?;
            }
            None => log_undelivered_event(event),
        }
        Ok(true)
    }

    /// Performs the specified number of steps through the simulation.
    ///
    /// Returns `Ok(true)` if there could be more pending events and `Ok(false)` otherwise.
    pub fn steps(&mut self, step_count: u64) -> Result<bool, SimulationError> {
        for _ in 0..step_count {
            if !self.step()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Steps through the simulation until the next event time is above `current_time + duration`
    /// or there are no pending events left.
    ///
    /// Returns `Ok(true)` if there could be more pending events and `Ok(false)` otherwise.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use serde::Serialize;
    /// use edgesim_core::Simulation;
    ///
    /// #[derive(Clone, Serialize)]
    /// pub struct SomeEvent {
    /// }
    ///
    /// let mut sim = Simulation::new(123);
    /// let comp_ctx = sim.create_context("comp");
    /// comp_ctx.emit_self(SomeEvent {}, 1.0).unwrap();
    /// comp_ctx.emit_self(SomeEvent {}, 2.0).unwrap();
    /// comp_ctx.emit_self(SomeEvent {}, 3.5).unwrap();
    /// assert!(sim.step_for_duration(1.5).unwrap());
    /// assert_eq!(sim.time(), 1.0);
    /// assert!(!sim.step_for_duration(3.0).unwrap());
    /// assert_eq!(sim.time(), 3.5);
    /// ```
    pub fn step_for_duration(&mut self, duration: f64) -> Result<bool, SimulationError> {
        let end_time = self.time() + duration;
        loop {
            let next_time = self.sim_state.borrow_mut().peek_event().map(|event| event.time);
            match next_time {
                Some(time) if time > end_time => return Ok(true),
                Some(_) => {
                    self.step()?;
                }
                None => return Ok(false),
            }
        }
    }

    /// Runs the simulation until quiescence: the event queue is empty and no component reports pending work.
    ///
    /// Fails with [`SimulationError::Stalled`] if the queue is drained while some component is not idle,
    /// or with [`SimulationError::Handler`] if some event handler failed.
    pub fn run(&mut self) -> Result<(), SimulationError> {
        while self.step()? {}
        self.check_quiescence()
    }

    /// Same as [`run()`](Self::run()), but stops stepping once the specified wall-clock time is spent.
    ///
    /// The limit is a safety valve only and does not affect simulated time. Returns `Ok(true)` if quiescence
    /// was reached and `Ok(false)` if the run was interrupted by the limit.
    pub fn run_with_wall_clock_limit(&mut self, limit: Duration) -> Result<bool, SimulationError> {
        let started = Instant::now();
        loop {
            if started.elapsed() >= limit {
                warn!(
                    target: "simulation",
                    "[{:.3} {} simulation] Wall-clock limit of {:?} exceeded, {} events are left",
                    self.time(),
                    get_colored("WARN", colored::Color::Yellow),
                    limit,
                    self.sim_state.borrow().pending_event_count(),
                );
                return Ok(false);
            }
            if !self.step()? {
                break;
            }
        }
        self.check_quiescence()?;
        Ok(true)
    }

    fn check_quiescence(&self) -> Result<(), SimulationError> {
        for (id, handler) in self.handlers.iter().enumerate() {
            if let Some(handler) = handler {
                if !handler.borrow().is_idle() {
                    return Err(SimulationError::Stalled {
                        component: self.component_name(id as Id),
                    });
                }
            }
        }
        Ok(())
    }

    /// Returns a random float in the range _[0, 1)_ using the simulation-wide random number generator.
    pub fn rand(&mut self) -> f64 {
        self.sim_state.borrow_mut().rand()
    }

    /// Returns a random number in the specified range using the simulation-wide random number generator.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use edgesim_core::Simulation;
    ///
    /// let mut sim = Simulation::new(123);
    /// let n: u32 = sim.gen_range(1..=10);
    /// assert!(n >= 1 && n <= 10);
    /// ```
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.sim_state.borrow_mut().gen_range(range)
    }

    /// Returns the total number of created events.
    ///
    /// Cancelled events are also counted here.
    pub fn event_count(&self) -> u64 {
        self.sim_state.borrow().event_count()
    }

    /// Cancels pending events that satisfy the given predicate function.
    pub fn cancel_events<F>(&mut self, pred: F)
    where
        F: Fn(&Event) -> bool,
    {
        self.sim_state.borrow_mut().cancel_events(pred);
    }

    fn component_name(&self, id: Id) -> String {
        self.lookup_name(id).unwrap_or_else(|| format!("#{}", id))
    }

    fn trace_event(&self, event: &Event, dst_name: &str) {
        let src_name = self.component_name(event.src);
        trace!(
            target: dst_name,
            "[{:.3} {} {}] {}",
            event.time,
            get_colored("EVENT", colored::Color::BrightBlack),
            dst_name,
            json!({"type": type_name(&event.data).unwrap_or("unknown"), "data": event.data, "src": src_name})
        );
    }
}
