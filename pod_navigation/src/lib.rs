//! Navigation Estimator.
//!
//! Fuses IMU, proximity, and stripe-count readings into a forward-motion
//! estimate: a calibration phase that accumulates gravity and gyro bias,
//! followed by a fused estimation phase that dead-reckons velocity and
//! displacement and corrects them against proximity/stripe evidence.
//!
//! # Module Structure
//!
//! - [`estimator`] - `NavigationEstimator`, its internal state machine,
//!   and the update math

pub mod estimator;

pub use estimator::{NavState, NavigationEstimator};
