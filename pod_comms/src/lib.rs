//! Ground-station Communications.
//!
//! Long-lived TCP client: translates inbound ground-station command codes
//! into state-machine events and pushes pod telemetry upstream. Socket
//! errors trigger reconnection with exponential backoff; persistent
//! failure surfaces a critical failure to the state machine rather than
//! retrying forever.
//!
//! # Module Structure
//!
//! - [`error`] - `CommsError`
//! - [`client`] - `Communications`, the reconnect-and-serve worker

pub mod client;
pub mod error;

pub use client::Communications;
pub use error::CommsError;
