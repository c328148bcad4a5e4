//! Pod Telemetry Registry.
//!
//! A single owned value, constructed once and handed to every worker at
//! startup rather than reached through a process-wide singleton or a
//! shared-memory segment. Holds one `RwLock` per published substructure,
//! providing last-writer-wins publication with by-value snapshot reads.
//!
//! # Module Structure
//!
//! - [`registry`] - `TelemetryRegistry` and the per-substructure get/set API
//! - [`sync`] - the post-calibration barrier and the shared `running` flag

pub mod registry;
pub mod sync;

pub use pod_common::types::{PodState, StateMachineData};
pub use registry::TelemetryRegistry;
pub use sync::RunControl;
