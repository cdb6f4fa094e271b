//! Utilization models.
//!
//! A utilization model is a function of simulation time which returns the fraction of granted capacity a task
//! actually consumes. Values are not clamped to `[0, 1]` here: a model producing a value outside of this range
//! is a configuration error which is detected by the capacity divider.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

/// Utilization model of a task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UtilizationModel {
    /// Always uses the whole granted capacity.
    Full,
    /// Uses a constant fraction of the granted capacity.
    Constant {
        /// Utilization fraction.
        value: f64,
    },
    /// Utilization changes linearly with time: `initial + increment * time`, bounded by `[0, max]`.
    Dynamic {
        /// Utilization at time 0.
        initial: f64,
        /// Utilization change per second.
        #[serde(default)]
        increment: f64,
        /// Upper bound of utilization.
        #[serde(default = "default_max")]
        max: f64,
    },
    /// Utilization is drawn uniformly from `[min, max]`.
    ///
    /// The value depends only on the seed and the time, so repeated evaluations and repeated runs agree.
    Stochastic {
        /// Lower bound of utilization.
        min: f64,
        /// Upper bound of utilization.
        max: f64,
        /// Seed of the random number generator.
        #[serde(default)]
        seed: u64,
    },
    /// Step function defined by `(time, utilization)` points sorted by time.
    ///
    /// Before the first point the utilization of the first point is used.
    Trace {
        /// Points of the trace.
        points: Vec<(f64, f64)>,
    },
}

fn default_max() -> f64 {
    1.
}

impl Default for UtilizationModel {
    fn default() -> Self {
        UtilizationModel::Full
    }
}

impl UtilizationModel {
    /// Creates constant utilization model.
    pub fn constant(value: f64) -> Self {
        UtilizationModel::Constant { value }
    }

    /// Returns the utilization at the given time.
    ///
    /// Returns NaN for malformed models (empty trace, non-finite stochastic bounds).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use edgesim_models::UtilizationModel;
    ///
    /// assert_eq!(UtilizationModel::constant(0.5).evaluate(100.), 0.5);
    /// let dynamic = UtilizationModel::Dynamic { initial: 0.2, increment: 0.1, max: 0.8 };
    /// assert_eq!(dynamic.evaluate(3.), 0.5);
    /// assert_eq!(dynamic.evaluate(60.), 0.8);
    /// let trace = UtilizationModel::Trace { points: vec![(0., 0.3), (10., 0.9)] };
    /// assert_eq!(trace.evaluate(9.99), 0.3);
    /// assert_eq!(trace.evaluate(10.), 0.9);
    /// ```
    pub fn evaluate(&self, time: f64) -> f64 {
        match self {
            UtilizationModel::Full => 1.,
            UtilizationModel::Constant { value } => *value,
            UtilizationModel::Dynamic { initial, increment, max } => {
                (initial + increment * time).min(*max).max(0.)
            }
            UtilizationModel::Stochastic { min, max, seed } => {
                if !min.is_finite() || !max.is_finite() {
                    return f64::NAN;
                }
                let mut rng = Pcg64::seed_from_u64(seed ^ time.to_bits());
                rng.gen_range(min.min(*max)..=min.max(*max))
            }
            UtilizationModel::Trace { points } => {
                let idx = points.partition_point(|(t, _)| *t <= time);
                match (idx, points.first()) {
                    (_, None) => f64::NAN,
                    (0, Some((_, value))) => *value,
                    _ => points[idx - 1].1,
                }
            }
        }
    }

    /// Returns `true` if the utilization may differ between two moments of time.
    pub fn is_time_varying(&self) -> bool {
        match self {
            UtilizationModel::Full | UtilizationModel::Constant { .. } => false,
            UtilizationModel::Dynamic { increment, .. } => *increment != 0.,
            UtilizationModel::Stochastic { min, max, .. } => min != max,
            UtilizationModel::Trace { points } => points.len() > 1,
        }
    }

    /// Returns the next moment after `time` when the utilization is known to change, if any.
    ///
    /// Only trace models have discrete change points, continuously changing models return `None`.
    pub fn next_change_after(&self, time: f64) -> Option<f64> {
        match self {
            UtilizationModel::Trace { points } => points.iter().map(|(t, _)| *t).find(|t| *t > time),
            _ => None,
        }
    }
}
