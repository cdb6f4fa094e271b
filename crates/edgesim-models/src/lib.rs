#![doc = include_str!("../readme.md")]
#![warn(missing_docs)]

pub mod fair_share;
pub mod utilization;

pub use fair_share::{divide, Demand, ShareError};
pub use utilization::UtilizationModel;
