//! Read-only sensor capability traits.
//!
//! Each sensor kind gets its own small trait instead of one large virtual
//! base class: the Sensor Aggregator only ever needs `read` and
//! `is_online` from any given device, so a capability set is sufficient
//! and keeps device drivers free to implement only what they are.

use pod_common::types::{BatteryReading, ImuReading, ProximityReading, StripeCount};

use crate::error::DeviceError;

/// A single IMU.
pub trait ImuSource: Send {
    fn read(&mut self) -> Result<ImuReading, DeviceError>;
    fn is_online(&self) -> bool;
}

/// A single time-of-flight proximity sensor.
pub trait ProximitySource: Send {
    fn read(&mut self) -> Result<ProximityReading, DeviceError>;
    fn is_online(&self) -> bool;
}

/// The GPIO edge-counter tracking stripe markers along the track.
pub trait StripeSource: Send {
    fn read(&mut self) -> Result<StripeCount, DeviceError>;
    fn is_online(&self) -> bool;
}

/// A single battery management system channel.
pub trait BmsSource: Send {
    fn read(&mut self) -> Result<BatteryReading, DeviceError>;
    fn is_online(&self) -> bool;
}
