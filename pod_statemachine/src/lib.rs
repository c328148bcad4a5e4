//! Pod State Machine.
//!
//! Owns the pod's global state and the single-consumer event queue every
//! other worker feeds. All other workers only ever read the published
//! `StateMachineData`; none of them may write it directly.
//!
//! # Module Structure
//!
//! - [`events`] - `MachineEvent`, `EventSender`/`EventReceiver`
//! - [`machine`] - the transition table and `PodStateMachine` worker

pub mod events;
pub mod machine;

pub use events::{EventReceiver, EventSender, MachineEvent};
pub use machine::{PodStateMachine, TransitionResult};
