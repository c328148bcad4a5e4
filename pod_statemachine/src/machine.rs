//! The pod's transition table and the worker that drains its event queue.

use std::sync::Arc;

use pod_common::types::{PodState, StateMachineData};
use pod_telemetry::TelemetryRegistry;
use tracing::{info, warn};

use crate::events::{EventReceiver, MachineEvent};

/// Result of a transition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionResult {
    Ok(PodState),
    Rejected(&'static str),
}

/// Owns the pod's current state and drains the single-consumer event
/// queue, publishing `StateMachineData` after every accepted transition.
pub struct PodStateMachine {
    state: PodState,
    critical_failure: bool,
    events: EventReceiver,
    registry: Arc<TelemetryRegistry>,
}

impl PodStateMachine {
    pub fn new(events: EventReceiver, registry: Arc<TelemetryRegistry>) -> Self {
        Self {
            state: PodState::Idle,
            critical_failure: false,
            events,
            registry,
        }
    }

    pub fn state(&self) -> PodState {
        self.state
    }

    /// Run until the event queue closes (every `EventSender` dropped) or
    /// the terminal state is reached and drained.
    pub fn run(&mut self) {
        while self.registry.run_control.is_running() {
            match self.events.recv() {
                Some(event) => {
                    self.handle_event(event);
                }
                None => break,
            }
        }
    }

    /// Attempt a transition given an event. Illegal transitions are
    /// idempotent: state is unchanged, no registry write occurs beyond
    /// the warning log.
    pub fn handle_event(&mut self, event: MachineEvent) -> TransitionResult {
        use MachineEvent::*;
        use PodState::*;

        let next = match (self.state, event) {
            (Idle, OnStart) => Calibrating,
            (Calibrating, CalibrationComplete) => Ready,
            (Ready, OnStart) => Accelerating,
            (Accelerating, MaxDistanceReached) => Cruising,
            (Cruising, EndOfRunReached) => Decelerating,
            (Decelerating, AllMotorsStopped) => RunComplete,
            (RunComplete, OnExit) => Exiting,
            (Exiting, EndOfTubeReached) => FailureStopped,
            (EmergencyBraking, AllMotorsStopped) => FailureStopped,
            (state, CriticalFailureDetected) if state != FailureStopped => EmergencyBraking,
            (state, event) => {
                warn!(?state, ?event, "illegal event for current state, ignoring");
                return TransitionResult::Rejected(illegal_event_reason(state, event));
            }
        };

        if matches!(event, CriticalFailureDetected) {
            self.critical_failure = true;
        }

        info!(from = ?self.state, to = ?next, ?event, "state transition");
        self.state = next;
        self.registry.set_state_machine(StateMachineData {
            state: self.state,
            critical_failure: self.critical_failure,
        });
        TransitionResult::Ok(next)
    }
}

fn illegal_event_reason(state: PodState, event: MachineEvent) -> &'static str {
    use MachineEvent::*;
    use PodState::*;
    match (state, event) {
        (FailureStopped, _) => "FailureStopped is terminal: no further transitions accepted",
        (Idle, _) => "Idle: only OnStart is accepted",
        (Calibrating, _) => "Calibrating: only CalibrationComplete is accepted",
        (Ready, _) => "Ready: only OnStart (launch) is accepted",
        (Accelerating, _) => "Accelerating: only MaxDistanceReached is accepted",
        (Cruising, _) => "Cruising: only EndOfRunReached is accepted",
        (Decelerating, _) => "Decelerating: only AllMotorsStopped is accepted",
        (RunComplete, _) => "RunComplete: only OnExit is accepted",
        (Exiting, _) => "Exiting: only EndOfTubeReached is accepted",
        (EmergencyBraking, _) => "EmergencyBraking: only AllMotorsStopped is accepted",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::channel;
    use MachineEvent::*;
    use PodState::*;

    fn new_machine() -> (PodStateMachine, crate::events::EventSender) {
        let (tx, rx) = channel();
        let registry = Arc::new(TelemetryRegistry::new());
        (PodStateMachine::new(rx, registry), tx)
    }

    #[test]
    fn initial_state_is_idle() {
        let (sm, _tx) = new_machine();
        assert_eq!(sm.state(), Idle);
    }

    #[test]
    fn happy_path_reaches_failure_stopped_clean() {
        let (mut sm, _tx) = new_machine();
        let script = [
            OnStart,
            CalibrationComplete,
            OnStart,
            MaxDistanceReached,
            EndOfRunReached,
            AllMotorsStopped,
            OnExit,
            EndOfTubeReached,
        ];
        for event in script {
            assert!(matches!(sm.handle_event(event), TransitionResult::Ok(_)));
        }
        assert_eq!(sm.state(), FailureStopped);
        assert!(!sm.critical_failure);
    }

    #[test]
    fn critical_failure_mid_acceleration_goes_to_emergency_braking() {
        let (mut sm, _tx) = new_machine();
        sm.handle_event(OnStart);
        sm.handle_event(CalibrationComplete);
        sm.handle_event(OnStart);
        assert_eq!(sm.state(), Accelerating);

        assert_eq!(
            sm.handle_event(CriticalFailureDetected),
            TransitionResult::Ok(EmergencyBraking)
        );
        assert!(sm.critical_failure);

        assert_eq!(
            sm.handle_event(AllMotorsStopped),
            TransitionResult::Ok(FailureStopped)
        );
    }

    #[test]
    fn illegal_event_from_idle_is_rejected_and_idempotent() {
        let (mut sm, _tx) = new_machine();
        let result = sm.handle_event(MaxDistanceReached);
        assert!(matches!(result, TransitionResult::Rejected(_)));
        assert_eq!(sm.state(), Idle);
    }

    #[test]
    fn critical_failure_from_any_non_terminal_state_reaches_emergency_braking() {
        for initial in [Idle, Calibrating, Ready, Accelerating, Cruising, Decelerating, RunComplete, Exiting] {
            let (tx, rx) = channel();
            let registry = Arc::new(TelemetryRegistry::new());
            let mut sm = PodStateMachine {
                state: initial,
                critical_failure: false,
                events: rx,
                registry,
            };
            let _ = &tx;
            assert_eq!(
                sm.handle_event(CriticalFailureDetected),
                TransitionResult::Ok(EmergencyBraking),
                "CriticalFailureDetected from {initial:?} should reach EmergencyBraking"
            );
        }
    }

    #[test]
    fn failure_stopped_is_terminal() {
        let (tx, rx) = channel();
        let registry = Arc::new(TelemetryRegistry::new());
        let mut sm = PodStateMachine {
            state: FailureStopped,
            critical_failure: true,
            events: rx,
            registry,
        };
        let _ = &tx;
        assert!(matches!(
            sm.handle_event(OnStart),
            TransitionResult::Rejected(_)
        ));
        assert_eq!(sm.state(), FailureStopped);
    }

    #[test]
    fn critical_failure_flag_is_published_and_monotonic() {
        let (mut sm, _tx) = new_machine();
        sm.handle_event(CriticalFailureDetected);
        assert!(sm.registry.get_state_machine().critical_failure);
    }
}
