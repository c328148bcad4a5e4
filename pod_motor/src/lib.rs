//! Motor Controller.
//!
//! A single cooperative worker that tracks the pod state machine and
//! drives four CAN motor controllers in lockstep with it, with hard
//! fail-safe stop guarantees on any failure or critical-failure signal.
//!
//! # Module Structure
//!
//! - [`strategy`] - `VelocityStrategy`, the pluggable target-velocity law
//! - [`controller`] - `MotorController`, the per-state dispatch worker

pub mod controller;
pub mod strategy;

pub use controller::MotorController;
pub use strategy::{StepVelocityStrategy, VelocityStrategy};
