//! Proportional fair-share division of a finite capacity.
//!
//! Each consumer requests some amount of capacity and declares a ceiling, the fraction of its fair share it is
//! able to use. When the total request fits into the capacity, everyone receives its request. Otherwise
//! each request is scaled down by `capacity / total_requested`, so no consumer with a nonzero request is starved.
//! The ceiling is applied after the division and the capacity left unused by it is not redistributed.

use thiserror::Error;

const RELATIVE_TOLERANCE: f64 = 1e-9;

/// Capacity request of a single consumer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Demand {
    /// Requested amount of capacity.
    pub requested: f64,
    /// Fraction of the fair share actually used, in `[0, 1]`.
    pub ceiling: f64,
}

impl Demand {
    /// Creates demand with the given request and ceiling.
    pub fn new(requested: f64, ceiling: f64) -> Self {
        Self { requested, ceiling }
    }

    /// Creates demand which uses its whole fair share.
    pub fn full(requested: f64) -> Self {
        Self::new(requested, 1.)
    }
}

/// Inconsistent input or result of capacity division.
#[derive(Debug, Error, PartialEq)]
pub enum ShareError {
    /// Divided capacity is negative or not a number.
    #[error("capacity {0} is not a non-negative number")]
    InvalidCapacity(f64),
    /// Request of some consumer is negative or not finite.
    #[error("consumer #{index} requested {value}")]
    InvalidRequest {
        /// Position of the consumer in the demand list.
        index: usize,
        /// Requested value.
        value: f64,
    },
    /// Ceiling of some consumer is outside of `[0, 1]`.
    #[error("consumer #{index} has ceiling {value} outside of [0, 1]")]
    InvalidCeiling {
        /// Position of the consumer in the demand list.
        index: usize,
        /// Ceiling value.
        value: f64,
    },
    /// Granted amounts exceed the divided capacity.
    #[error("granted {granted} exceeds capacity {capacity}")]
    Oversubscribed {
        /// Total granted amount.
        granted: f64,
        /// Divided capacity.
        capacity: f64,
    },
}

/// Divides `capacity` among consumers, returns the granted amounts in the order of `demands`.
///
/// Invalid input is reported as an error and never clamped.
///
/// # Examples
///
/// ```rust
/// use edgesim_models::fair_share::{divide, Demand};
///
/// // enough capacity: every request is granted
/// let grants = divide(4000., &[Demand::full(2000.), Demand::full(1000.)]).unwrap();
/// assert_eq!(grants, vec![2000., 1000.]);
///
/// // oversubscribed: proportional shares, then the ceiling is applied
/// let grants = divide(1000., &[Demand::full(1500.), Demand::new(500., 0.5)]).unwrap();
/// assert_eq!(grants, vec![750., 125.]);
/// ```
pub fn divide(capacity: f64, demands: &[Demand]) -> Result<Vec<f64>, ShareError> {
    if capacity.is_nan() || capacity < 0. || capacity.is_infinite() {
        return Err(ShareError::InvalidCapacity(capacity));
    }
    for (index, demand) in demands.iter().enumerate() {
        if !demand.requested.is_finite() || demand.requested < 0. {
            return Err(ShareError::InvalidRequest {
                index,
                value: demand.requested,
            });
        }
        if demand.ceiling.is_nan() || !(0. ..=1.).contains(&demand.ceiling) {
            return Err(ShareError::InvalidCeiling {
                index,
                value: demand.ceiling,
            });
        }
    }

    let total_requested: f64 = demands.iter().map(|d| d.requested).sum();
    let scale = if total_requested <= capacity {
        1.
    } else {
        capacity / total_requested
    };
    let grants: Vec<f64> = demands.iter().map(|d| d.requested * scale * d.ceiling).collect();

    let granted: f64 = grants.iter().sum();
    if granted > capacity * (1. + RELATIVE_TOLERANCE) {
        return Err(ShareError::Oversubscribed { granted, capacity });
    }
    Ok(grants)
}
