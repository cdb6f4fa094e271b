//! Errors reported by the simulation engine.

use thiserror::Error;

/// Error raised while scheduling or processing events.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Event is scheduled before the current simulation time.
    #[error("event time {time} is before the current simulation time {current}")]
    InvalidTime {
        /// Requested event time.
        time: f64,
        /// Simulation time at the moment of the request.
        current: f64,
    },
    /// Event queue is empty while some component still has pending work.
    #[error("component `{component}` has pending work but no events are scheduled")]
    Stalled {
        /// Name of the component reporting pending work.
        component: String,
    },
    /// Event handler of some component returned an error, the simulation run is aborted.
    #[error("component `{component}` failed to process event: {source}")]
    Handler {
        /// Name of the failed component.
        component: String,
        /// Error returned by the handler.
        #[source]
        source: Box<dyn std::error::Error>,
    },
}
