//! Simulation component identity.

/// Identifier of simulation component.
pub type Id = u32;
