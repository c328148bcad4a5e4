//! Cooperative run control shared by every worker thread.
//!
//! No async runtime is used: each worker is a plain OS thread that polls a
//! shared `running` flag once per cycle and exits its loop when it goes
//! false. `RunControl` bundles that flag together with the post-calibration
//! rendezvous point where the navigation estimator and the motor controller
//! synchronize before propulsion begins.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};

/// Number of workers that must reach the post-calibration barrier before
/// any of them is released: the navigation estimator (which declares
/// calibration complete) and the motor controller (which must not begin
/// accelerating before navigation can report a valid zero point).
pub const CALIBRATION_BARRIER_PARTIES: usize = 2;

/// Shared cancellation flag and calibration rendezvous, cloned (via `Arc`)
/// into every worker at construction.
#[derive(Clone)]
pub struct RunControl {
    running: Arc<AtomicBool>,
    calibration_barrier: Arc<Barrier>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::with_barrier_parties(CALIBRATION_BARRIER_PARTIES)
    }

    /// Construct with a non-default party count. Used by the CLI's
    /// `--sensors-only`/`--motors-only` single-worker modes, where only
    /// one side of the rendezvous ever runs and the barrier must be
    /// configured to release immediately instead of blocking forever.
    pub fn with_barrier_parties(parties: usize) -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            calibration_barrier: Arc::new(Barrier::new(parties.max(1))),
        }
    }

    /// True until `stop()` is called. Workers check this once per cycle.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Signal every worker to exit its loop at the next cycle boundary.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Block until every party (navigation estimator, motor controller)
    /// has called this once. Released together, after calibration
    /// completes, so motors never begin accelerating before navigation
    /// has a valid reference frame.
    pub fn wait_for_calibration(&self) {
        self.calibration_barrier.wait();
    }
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn fresh_control_is_running() {
        let rc = RunControl::new();
        assert!(rc.is_running());
    }

    #[test]
    fn single_party_barrier_releases_immediately() {
        let rc = RunControl::with_barrier_parties(1);
        rc.wait_for_calibration();
    }

    #[test]
    fn stop_is_observed_by_clones() {
        let rc = RunControl::new();
        let clone = rc.clone();
        rc.stop();
        assert!(!clone.is_running());
    }

    #[test]
    fn barrier_releases_both_parties() {
        let rc = RunControl::new();
        let other = rc.clone();

        let handle = thread::spawn(move || {
            other.wait_for_calibration();
        });

        // Give the spawned thread a chance to block on the barrier first.
        thread::sleep(Duration::from_millis(20));
        rc.wait_for_calibration();

        handle.join().expect("worker thread should not panic");
    }
}
