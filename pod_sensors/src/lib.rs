//! Sensor Aggregator.
//!
//! Polls every configured device once per cycle, collates the results into
//! the registry's `Sensors` and `Batteries` substructures, and publishes
//! each independently, only when its own change condition is met.
//!
//! # Module Structure
//!
//! - [`aggregator`] - `SensorAggregator`, the per-cycle poll/collate/publish worker

pub mod aggregator;

pub use aggregator::{SensorAggregator, SensorDevices};
