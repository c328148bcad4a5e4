//! The single-consumer event queue and the events it carries.
//!
//! Any worker (Communications, Navigation, Motor Controller) may hold a
//! clone of the `EventSender` and push events; only the Pod State Machine
//! holds the `EventReceiver` and drains them one at a time.

use std::sync::mpsc;

/// Event that can trigger a pod state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineEvent {
    /// Ground station commanded launch, or the operator commanded the
    /// initial calibration run.
    OnStart,
    /// Navigation finished calibration and crossed the barrier.
    CalibrationComplete,
    /// Navigation's displacement estimate crossed the configured
    /// acceleration-phase distance.
    MaxDistanceReached,
    /// Navigation's displacement estimate crossed the configured
    /// end-of-run distance.
    EndOfRunReached,
    /// Operator/ground station commanded shutdown after a completed run.
    OnExit,
    /// Navigation's displacement estimate reached the end of the tube.
    EndOfTubeReached,
    /// Any worker detected an unrecoverable fault.
    CriticalFailureDetected,
    /// Motor Controller's stop procedure observed all four motors at zero.
    AllMotorsStopped,
}

/// Cloneable handle for injecting events. Every worker that can originate
/// a `MachineEvent` holds one of these.
#[derive(Clone)]
pub struct EventSender(mpsc::Sender<MachineEvent>);

impl EventSender {
    /// Push an event onto the queue. The channel's receiver lives for the
    /// lifetime of the state machine worker, so this only fails after the
    /// state machine has already exited — treated as a no-op.
    pub fn send(&self, event: MachineEvent) {
        let _ = self.0.send(event);
    }
}

/// Held exclusively by the Pod State Machine worker.
pub struct EventReceiver(mpsc::Receiver<MachineEvent>);

impl EventReceiver {
    /// Block until an event arrives or the last sender is dropped.
    pub fn recv(&self) -> Option<MachineEvent> {
        self.0.recv().ok()
    }

    /// Drain without blocking; used by tests that want to assert "no more
    /// events" rather than block forever.
    pub fn try_recv(&self) -> Option<MachineEvent> {
        self.0.try_recv().ok()
    }
}

/// Construct a fresh event queue: one `EventReceiver` for the state
/// machine, one `EventSender` to clone out to every other worker.
pub fn channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel();
    (EventSender(tx), EventReceiver(rx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sent_event_is_received() {
        let (tx, rx) = channel();
        tx.send(MachineEvent::OnStart);
        assert_eq!(rx.recv(), Some(MachineEvent::OnStart));
    }

    #[test]
    fn multiple_producers_share_one_queue() {
        let (tx, rx) = channel();
        let tx2 = tx.clone();
        tx.send(MachineEvent::OnStart);
        tx2.send(MachineEvent::CriticalFailureDetected);
        assert_eq!(rx.recv(), Some(MachineEvent::OnStart));
        assert_eq!(rx.recv(), Some(MachineEvent::CriticalFailureDetected));
    }

    #[test]
    fn try_recv_empty_is_none() {
        let (_tx, rx) = channel();
        assert_eq!(rx.try_recv(), None);
    }
}
