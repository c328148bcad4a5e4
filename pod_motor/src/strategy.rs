//! Target-velocity and target-torque control law.
//!
//! The measured forward velocity is passed in so richer strategies can
//! close the loop on it; the baseline deliberately ignores it and applies
//! a constant step. Any substitute strategy must preserve monotonicity:
//! non-decreasing setpoints while accelerating, non-increasing while
//! decelerating.

use pod_common::consts::VELOCITY_STEP_RPM;

/// Constant per-motor torque command issued alongside a velocity setpoint
/// while accelerating or decelerating.
const TORQUE_STEP: i16 = 50;

pub trait VelocityStrategy: Send {
    /// Next per-motor target velocity while in `Accelerating`.
    fn accelerate(&mut self, current_rpm: [i32; 4], measured_velocity_mps: f64) -> [i32; 4];

    /// Next per-motor target velocity while in `Decelerating`.
    fn decelerate(&mut self, current_rpm: [i32; 4], measured_velocity_mps: f64) -> [i32; 4];

    /// Next per-motor target torque while in `Accelerating`.
    fn accelerate_torque(&mut self, current_torque: [i16; 4], measured_velocity_mps: f64) -> [i16; 4];

    /// Next per-motor target torque while in `Decelerating`.
    fn decelerate_torque(&mut self, current_torque: [i16; 4], measured_velocity_mps: f64) -> [i16; 4];
}

/// Constant ±`VELOCITY_STEP_RPM`/±`TORQUE_STEP` step per tick, ignoring
/// measured velocity.
#[derive(Debug, Default, Clone, Copy)]
pub struct StepVelocityStrategy;

impl VelocityStrategy for StepVelocityStrategy {
    fn accelerate(&mut self, current_rpm: [i32; 4], _measured_velocity_mps: f64) -> [i32; 4] {
        current_rpm.map(|v| v + VELOCITY_STEP_RPM)
    }

    fn decelerate(&mut self, current_rpm: [i32; 4], _measured_velocity_mps: f64) -> [i32; 4] {
        current_rpm.map(|v| (v - VELOCITY_STEP_RPM).max(0))
    }

    fn accelerate_torque(&mut self, _current_torque: [i16; 4], _measured_velocity_mps: f64) -> [i16; 4] {
        [TORQUE_STEP; 4]
    }

    fn decelerate_torque(&mut self, _current_torque: [i16; 4], _measured_velocity_mps: f64) -> [i16; 4] {
        [-TORQUE_STEP; 4]
    }
}
