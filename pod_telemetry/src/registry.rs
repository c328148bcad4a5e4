//! Per-substructure `get`/`set` publication.
//!
//! Each substructure is guarded by its own `RwLock`, so a slow reader of
//! Navigation never blocks a writer of MotorData. Critical sections are
//! bounded by a clone of a small POD value — no read or write blocks
//! indefinitely.
//!
//! A poisoned lock (a producer panicked mid-write) is fatal: a partially
//! written snapshot cannot be trusted, so we log at `CRITICAL` and abort
//! the process rather than propagate a `PoisonError` for callers to
//! mishandle.

use std::sync::RwLock;

use pod_common::types::{Batteries, MotorData, Navigation, Sensors, StateMachineData};

use crate::sync::RunControl;

/// The shared telemetry registry: one owned value, handed out as `Arc` to
/// every worker at construction.
pub struct TelemetryRegistry {
    sensors: RwLock<Sensors>,
    batteries: RwLock<Batteries>,
    navigation: RwLock<Navigation>,
    motor_data: RwLock<MotorData>,
    state_machine: RwLock<StateMachineData>,
    pub run_control: RunControl,
}

impl TelemetryRegistry {
    /// Construct a fresh registry with every substructure zero-initialized
    /// and `module_status = Start`.
    pub fn new() -> Self {
        Self::with_barrier_parties(crate::sync::CALIBRATION_BARRIER_PARTIES)
    }

    /// Construct with a non-default calibration-barrier party count, for
    /// the CLI's single-worker run modes. See
    /// [`RunControl::with_barrier_parties`].
    pub fn with_barrier_parties(parties: usize) -> Self {
        Self {
            sensors: RwLock::new(Sensors::default()),
            batteries: RwLock::new(Batteries::default()),
            navigation: RwLock::new(Navigation::default()),
            motor_data: RwLock::new(MotorData::default()),
            state_machine: RwLock::new(StateMachineData::default()),
            run_control: RunControl::with_barrier_parties(parties),
        }
    }

    pub fn get_sensors(&self) -> Sensors {
        *self.sensors.read().unwrap_or_else(|_| abort_poisoned("sensors"))
    }

    pub fn set_sensors(&self, value: Sensors) {
        *self
            .sensors
            .write()
            .unwrap_or_else(|_| abort_poisoned("sensors")) = value;
    }

    pub fn get_batteries(&self) -> Batteries {
        self.batteries
            .read()
            .unwrap_or_else(|_| abort_poisoned("batteries"))
            .clone()
    }

    pub fn set_batteries(&self, value: Batteries) {
        *self
            .batteries
            .write()
            .unwrap_or_else(|_| abort_poisoned("batteries")) = value;
    }

    pub fn get_navigation(&self) -> Navigation {
        *self
            .navigation
            .read()
            .unwrap_or_else(|_| abort_poisoned("navigation"))
    }

    pub fn set_navigation(&self, value: Navigation) {
        *self
            .navigation
            .write()
            .unwrap_or_else(|_| abort_poisoned("navigation")) = value;
    }

    pub fn get_motor_data(&self) -> MotorData {
        *self
            .motor_data
            .read()
            .unwrap_or_else(|_| abort_poisoned("motor_data"))
    }

    pub fn set_motor_data(&self, value: MotorData) {
        *self
            .motor_data
            .write()
            .unwrap_or_else(|_| abort_poisoned("motor_data")) = value;
    }

    pub fn get_state_machine(&self) -> StateMachineData {
        *self
            .state_machine
            .read()
            .unwrap_or_else(|_| abort_poisoned("state_machine"))
    }

    /// Publish new state-machine data. `critical_failure` is monotonic:
    /// once true, this call can never make it false again.
    pub fn set_state_machine(&self, value: StateMachineData) {
        let mut guard = self
            .state_machine
            .write()
            .unwrap_or_else(|_| abort_poisoned("state_machine"));
        let critical_failure = guard.critical_failure || value.critical_failure;
        *guard = StateMachineData {
            critical_failure,
            ..value
        };
    }
}

impl Default for TelemetryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A poisoned lock means a writer panicked holding this substructure's
/// lock. The stored value may be a torn write of a safety-critical
/// snapshot, so readers can no longer be guaranteed a fully-committed
/// value. Abort rather than attempt recovery.
fn abort_poisoned(name: &str) -> ! {
    tracing::error!(target: "pod_telemetry", substructure = name, "CRITICAL: telemetry lock poisoned, aborting");
    std::process::abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pod_common::status::ModuleStatus;
    use pod_common::types::PodState;

    #[test]
    fn fresh_registry_has_zeroed_substructures() {
        let reg = TelemetryRegistry::new();
        assert_eq!(reg.get_navigation(), Navigation::default());
        assert_eq!(reg.get_motor_data().status, ModuleStatus::Start);
        assert_eq!(reg.get_state_machine().state, PodState::Idle);
        assert!(!reg.get_state_machine().critical_failure);
    }

    #[test]
    fn set_then_get_round_trips() {
        let reg = TelemetryRegistry::new();
        let nav = Navigation::new(10.0, 5.0, 1.0, 3);
        reg.set_navigation(nav);
        assert_eq!(reg.get_navigation(), nav);
    }

    #[test]
    fn duplicate_publish_is_idempotent_for_readers() {
        let reg = TelemetryRegistry::new();
        let md = MotorData::default();
        reg.set_motor_data(md);
        reg.set_motor_data(md);
        assert_eq!(reg.get_motor_data(), md);
    }

    #[test]
    fn critical_failure_is_monotonic() {
        let reg = TelemetryRegistry::new();
        reg.set_state_machine(StateMachineData {
            state: PodState::Accelerating,
            critical_failure: true,
        });
        assert!(reg.get_state_machine().critical_failure);

        // A later publish that doesn't set critical_failure cannot clear it.
        reg.set_state_machine(StateMachineData {
            state: PodState::EmergencyBraking,
            critical_failure: false,
        });
        assert!(reg.get_state_machine().critical_failure);
        assert_eq!(reg.get_state_machine().state, PodState::EmergencyBraking);
    }

    #[test]
    fn batteries_independent_lock_from_navigation() {
        let reg = TelemetryRegistry::new();
        let _nav_guard = reg.navigation.read().unwrap();
        // Batteries lock must still be acquirable — independent locks.
        let _ = reg.get_batteries();
    }
}
