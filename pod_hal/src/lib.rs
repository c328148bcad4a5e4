//! Hardware abstraction traits for the pod's external devices.
//!
//! # Module Structure
//!
//! - [`error`] - `DeviceError`, shared by every sensor/motor transport
//! - [`sensors`] - read-only sensor capability traits (`ImuSource`,
//!   `ProximitySource`, `StripeSource`, `BmsSource`)
//! - [`motor`] - `Communicator`, the CAN motor transport trait

pub mod error;
pub mod motor;
pub mod sensors;

pub use error::DeviceError;
pub use motor::{Communicator, ControllerHealth};
pub use sensors::{BmsSource, ImuSource, ProximitySource, StripeSource};
