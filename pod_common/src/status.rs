//! Shared per-module status enum, published alongside `MotorData` and every
//! other telemetry substructure as its producer-health field.

use serde::{Deserialize, Serialize};

/// Health status of a telemetry-producing module.
///
/// Mirrors the small per-module status lifecycle every worker publishes:
/// a module starts at `Start`, moves through `Init` while bringing up its
/// hardware/state, settles at `Ready` once operating normally, and latches
/// at `CriticalFailure` if it can no longer safely continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ModuleStatus {
    #[default]
    Start,
    Init,
    Ready,
    CriticalFailure,
}

impl ModuleStatus {
    /// Once `CriticalFailure` is observed, status must never improve.
    pub const fn is_critical(self) -> bool {
        matches!(self, ModuleStatus::CriticalFailure)
    }
}
