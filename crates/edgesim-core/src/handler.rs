//! Event handling.

use crate::event::Event;

/// Result of event processing.
///
/// An error returned by a handler aborts the simulation run, see [`Simulation::step`](crate::Simulation::step).
pub type HandlerResult = Result<(), Box<dyn std::error::Error>>;

/// Trait for consuming events in simulation components.
pub trait EventHandler {
    /// Processes event delivered to the component.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::cell::RefCell;
    /// use std::rc::Rc;
    /// use serde::Serialize;
    /// use edgesim_core::{cast, Event, EventHandler, HandlerResult, Simulation};
    ///
    /// #[derive(Clone, Serialize)]
    /// pub struct Deposit {
    ///     amount: i64,
    /// }
    ///
    /// #[derive(Default)]
    /// pub struct Account {
    ///     balance: i64,
    /// }
    ///
    /// impl EventHandler for Account {
    ///     fn on(&mut self, event: Event) -> HandlerResult {
    ///         cast!(match event.data {
    ///             Deposit { amount } => {
    ///                 if self.balance + amount < 0 {
    ///                     return Err("negative balance".into());
    ///                 }
    ///                 self.balance += amount;
    ///             }
    ///         });
    ///         Ok(())
    ///     }
    /// }
    ///
    /// let mut sim = Simulation::new(123);
    /// let client = sim.create_context("client");
    /// let account = Rc::new(RefCell::new(Account::default()));
    /// let account_id = sim.add_handler("account", account.clone());
    /// client.emit(Deposit { amount: 10 }, account_id, 1.).unwrap();
    /// client.emit(Deposit { amount: -20 }, account_id, 2.).unwrap();
    /// sim.step().unwrap();
    /// assert_eq!(account.borrow().balance, 10);
    /// assert!(sim.step().is_err());
    /// assert_eq!(account.borrow().balance, 10);
    /// ```
    fn on(&mut self, event: Event) -> HandlerResult;

    /// Returns `false` while the component has work that requires further events to be processed.
    ///
    /// Checked by [`Simulation::run`](crate::Simulation::run) once the event queue is drained.
    fn is_idle(&self) -> bool {
        true
    }
}

/// Enables the use of pattern matching syntax for processing different types of events
/// by downcasting the event payload from [`EventData`](crate::event::EventData) to user-defined types.
///
/// Match arms need not be exhaustive. If the event payload does not match any of specified arms,
/// the macro logs the event as unhandled under `ERROR` level. Arms are expanded in place, so `?` and `return`
/// inside them apply to the enclosing handler.
#[macro_export]
macro_rules! cast {
    ( match $event:ident.data { $( $type:ident { $($tt:tt)* } => { $($expr:tt)* } )+ } ) => {
        $(
            if $event.data.is::<$type>() {
                if let Ok(__value) = $event.data.downcast::<$type>() {
                    let $type { $($tt)* } = *__value;
                    $($expr)*
                }
            } else
        )*
        {
            $crate::log::log_unhandled_event($event);
        }
    }
}
