//! Convenience re-exports for common consumers.
//!
//! ```rust
//! use pod_common::prelude::*;
//! ```

pub use crate::config::{ConfigError, ConfigLoader, LogLevel, PodConfig};
pub use crate::consts::{CYCLE_TIME_US, MIN_CALIBRATION_SAMPLES};
pub use crate::status::ModuleStatus;
pub use crate::types::{
    BatteryReading, Batteries, DataPoint, ImuReading, MotorData, MotorSetpoint, Navigation,
    PodState, ProximityReading, Sensors, StateMachineData, StripeCount,
};
