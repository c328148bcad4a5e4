//! Telemetry domain types.
//!
//! These are the substructures published through the telemetry registry.
//! Each is a plain, `Clone`-able snapshot — no pointers, no interior
//! mutability — so a reader can hold its own copy outside any lock.

use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;

use crate::consts::{EMERGENCY_DECELERATION_MPS2, NUM_IMUS, NUM_PROXIMITY_PER_BANK};
use crate::status::ModuleStatus;

/// A single timestamped value.
///
/// `timestamp_us` is expected to be monotonic within one producer; readers
/// detect "has this advanced" by comparing timestamps, never by comparing
/// `value`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[repr(C)]
pub struct DataPoint<T> {
    pub value: T,
    pub timestamp_us: u64,
}

impl<T> DataPoint<T> {
    pub const fn new(value: T, timestamp_us: u64) -> Self {
        Self {
            value,
            timestamp_us,
        }
    }
}

/// Stripe count: absolute-ish displacement ticks from the GPIO edge counter.
pub type StripeCount = DataPoint<u32>;

/// Proximity (time-of-flight) sample.
pub type ProximityReading = DataPoint<f64>;

const_assert_eq!(core::mem::size_of::<StripeCount>(), 16);
const_assert_eq!(core::mem::size_of::<ProximityReading>(), 16);

/// A single IMU sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[repr(C)]
pub struct ImuReading {
    pub accel: [f64; 3],
    pub gyro: [f64; 3],
    pub timestamp_us: u64,
}

const_assert_eq!(core::mem::size_of::<ImuReading>(), 56);

/// Raw sensor snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Sensors {
    pub imus: [ImuReading; NUM_IMUS],
    pub proximity_front: [ProximityReading; NUM_PROXIMITY_PER_BANK],
    pub proximity_back: [ProximityReading; NUM_PROXIMITY_PER_BANK],
    pub stripe_count: StripeCount,
}

impl Default for Sensors {
    fn default() -> Self {
        Self {
            imus: [ImuReading::default(); NUM_IMUS],
            proximity_front: [ProximityReading::default(); NUM_PROXIMITY_PER_BANK],
            proximity_back: [ProximityReading::default(); NUM_PROXIMITY_PER_BANK],
            stripe_count: StripeCount::default(),
        }
    }
}

/// A single battery reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct BatteryReading {
    pub voltage: f64,
    pub current: f64,
    pub temperature: f64,
    pub charge: f64,
}

/// Battery snapshot: low-power and high-power banks.
///
/// Unlike the fixed-size sensor banks, the number of batteries per bank is
/// configuration-driven (the pod's battery pack layout varies by build), so
/// these are `Vec` rather than fixed arrays.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Batteries {
    pub low_power: Vec<BatteryReading>,
    pub high_power: Vec<BatteryReading>,
}

/// Fused navigation estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Navigation {
    pub distance_m: f64,
    pub velocity_mps: f64,
    pub acceleration_mps2: f64,
    pub stripe_count: u32,
    pub emergency_braking_distance_m: f64,
}

impl Navigation {
    /// Construct a navigation snapshot, deriving the emergency braking
    /// distance from velocity so callers cannot desynchronize the two.
    pub fn new(distance_m: f64, velocity_mps: f64, acceleration_mps2: f64, stripe_count: u32) -> Self {
        Self {
            distance_m,
            velocity_mps,
            acceleration_mps2,
            stripe_count,
            emergency_braking_distance_m: braking_distance(velocity_mps),
        }
    }
}

impl Default for Navigation {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 0)
    }
}

/// Minimum stopping distance assumed by the controller, `v^2 / (2 * a)`.
pub fn braking_distance(velocity_mps: f64) -> f64 {
    (velocity_mps * velocity_mps) / (2.0 * EMERGENCY_DECELERATION_MPS2)
}

/// Per-motor setpoint/feedback pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[repr(C)]
pub struct MotorSetpoint {
    pub velocity: i32,
    pub torque: i16,
}

const_assert_eq!(core::mem::size_of::<MotorSetpoint>(), 8);

/// The pod's exhaustive state set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PodState {
    #[default]
    Idle,
    Calibrating,
    Ready,
    Accelerating,
    Cruising,
    Decelerating,
    RunComplete,
    Exiting,
    EmergencyBraking,
    FailureStopped,
}

/// Current state of the pod's global controller, as published by the
/// state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StateMachineData {
    pub state: PodState,
    pub critical_failure: bool,
}

/// Motor control snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotorData {
    pub motors: [MotorSetpoint; 4],
    pub status: ModuleStatus,
}

impl MotorData {
    pub const fn new(motors: [MotorSetpoint; 4], status: ModuleStatus) -> Self {
        Self { motors, status }
    }

    /// All four motors report zero velocity — fully stopped.
    pub fn all_stopped(&self) -> bool {
        self.motors.iter().all(|m| m.velocity == 0)
    }
}

impl Default for MotorData {
    fn default() -> Self {
        Self::new([MotorSetpoint::default(); 4], ModuleStatus::Start)
    }
}
