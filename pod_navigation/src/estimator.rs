//! Calibration and fused estimation phases.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pod_common::consts::{
    ACCELERATION_PHASE_DISTANCE_M, CYCLE_TIME_US, STRIPE_SPACING_M, TUBE_LENGTH_M,
};
use pod_common::types::{Navigation, PodState, Sensors};
use pod_statemachine::{EventSender, MachineEvent};
use pod_telemetry::TelemetryRegistry;
use tracing::{error, info};

/// The estimator's internal phase. Distinct from `PodState`: navigation's
/// own calibration lifecycle is independent of the pod's global state
/// machine, which learns about it only through `CalibrationComplete` /
/// `CriticalFailureDetected` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    Init,
    Calibrating,
    Operational,
    Failed,
}

pub struct NavigationEstimator {
    state: NavState,
    min_calibration_samples: u64,
    calibration_timeout: Duration,
    calibration_samples: u64,
    calibration_started_at: Option<Instant>,
    gravity_accum: [f64; 3],
    gyro_bias_accum: [f64; 3],
    gravity: [f64; 3],
    gyro_bias: [f64; 3],
    distance_m: f64,
    velocity_mps: f64,
    acceleration_mps2: f64,
    prev_sensors: Sensors,
    max_distance_sent: bool,
    end_of_tube_sent: bool,
    registry: Arc<TelemetryRegistry>,
    events: EventSender,
}

impl NavigationEstimator {
    pub fn new(
        registry: Arc<TelemetryRegistry>,
        events: EventSender,
        min_calibration_samples: u64,
        calibration_timeout: Duration,
    ) -> Self {
        Self {
            state: NavState::Init,
            min_calibration_samples,
            calibration_timeout,
            calibration_samples: 0,
            calibration_started_at: None,
            gravity_accum: [0.0; 3],
            gyro_bias_accum: [0.0; 3],
            gravity: [0.0; 3],
            gyro_bias: [0.0; 3],
            distance_m: 0.0,
            velocity_mps: 0.0,
            acceleration_mps2: 0.0,
            prev_sensors: Sensors::default(),
            max_distance_sent: false,
            end_of_tube_sent: false,
            registry,
            events,
        }
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn run(&mut self) {
        let cycle = Duration::from_micros(CYCLE_TIME_US);
        while self.registry.run_control.is_running() && self.state != NavState::Failed {
            self.tick();
            thread::sleep(cycle);
        }
    }

    /// One estimator cycle. Exposed separately from `run` for deterministic
    /// unit testing.
    pub fn tick(&mut self) {
        let sensors = self.registry.get_sensors();

        match self.state {
            NavState::Init => {
                if any_imu_advanced(&self.prev_sensors, &sensors) {
                    self.state = NavState::Calibrating;
                    self.calibration_started_at = Some(Instant::now());
                    self.accumulate_calibration_sample(&sensors);
                }
            }
            NavState::Calibrating => {
                if any_imu_advanced(&self.prev_sensors, &sensors) {
                    self.accumulate_calibration_sample(&sensors);
                }
                if self.calibration_samples >= self.min_calibration_samples {
                    self.finish_calibration();
                } else if self.calibration_timed_out() {
                    self.fail_calibration();
                }
            }
            NavState::Operational => {
                self.update_operational(&sensors);
                self.check_distance_events();
            }
            NavState::Failed => {}
        }

        self.prev_sensors = sensors;
    }

    fn accumulate_calibration_sample(&mut self, sensors: &Sensors) {
        for imu in &sensors.imus {
            for axis in 0..3 {
                self.gravity_accum[axis] += imu.accel[axis];
                self.gyro_bias_accum[axis] += imu.gyro[axis];
            }
        }
        self.calibration_samples += 1;
    }

    fn calibration_timed_out(&self) -> bool {
        match self.calibration_started_at {
            Some(started) => started.elapsed() >= self.calibration_timeout,
            None => false,
        }
    }

    fn finish_calibration(&mut self) {
        let n = self.calibration_samples.max(1) as f64;
        for axis in 0..3 {
            self.gravity[axis] = self.gravity_accum[axis] / n;
            self.gyro_bias[axis] = self.gyro_bias_accum[axis] / n;
        }

        // Navigation is the sole producer of `CalibrationComplete`: the
        // state machine cannot leave `Calibrating` until this fires, and
        // the Motor Controller only reaches the barrier once the state
        // machine has driven it into `Accelerating`. So the event must go
        // out, and `OPERATIONAL` must be visible, *before* we block here —
        // otherwise both parties wait on each other forever.
        self.state = NavState::Operational;
        info!("calibration complete, entering operational mode");
        self.events.send(MachineEvent::CalibrationComplete);

        // Rendezvous with the Motor Controller: it must never observe
        // `Accelerating` before this point.
        self.registry.run_control.wait_for_calibration();
    }

    fn fail_calibration(&mut self) {
        self.state = NavState::Failed;
        error!(
            samples = self.calibration_samples,
            required = self.min_calibration_samples,
            "CRITICAL: calibration timed out"
        );
        self.events.send(MachineEvent::CriticalFailureDetected);
    }

    /// Apply the appropriate update variant for whichever sensor groups
    /// advanced this tick. The integration here is a deliberately simple
    /// Euler/linear-complementary scheme — fusion filtering internals are
    /// not this crate's concern, only the state transitions are.
    fn update_operational(&mut self, sensors: &Sensors) {
        let imu_advanced = any_imu_advanced(&self.prev_sensors, sensors);
        let proximity_advanced = any_proximity_advanced(&self.prev_sensors, sensors);
        let stripe_advanced = sensors.stripe_count.timestamp_us > self.prev_sensors.stripe_count.timestamp_us;

        if !imu_advanced && !proximity_advanced && !stripe_advanced {
            return;
        }

        if imu_advanced {
            let dt = imu_dt_seconds(&self.prev_sensors, sensors);
            let mean_forward_accel = sensors
                .imus
                .iter()
                .map(|r| r.accel[0])
                .sum::<f64>()
                / sensors.imus.len() as f64;
            self.acceleration_mps2 = mean_forward_accel - self.gravity[0];
            self.velocity_mps = (self.velocity_mps + self.acceleration_mps2 * dt).max(0.0);
            self.distance_m += self.velocity_mps * dt;
        }

        if proximity_advanced {
            let proximity_estimate = mean_proximity(sensors);
            self.distance_m = blend(self.distance_m, proximity_estimate, 0.1);
        }

        if stripe_advanced {
            // Stripe correction wins on a tie with proximity: applied last
            // so it overrides whatever proximity just nudged.
            self.distance_m = sensors.stripe_count.value as f64 * STRIPE_SPACING_M;
        }

        self.registry.set_navigation(Navigation::new(
            self.distance_m,
            self.velocity_mps,
            self.acceleration_mps2,
            sensors.stripe_count.value,
        ));
    }

    fn check_distance_events(&mut self) {
        let current_state = self.registry.get_state_machine().state;

        if !self.max_distance_sent
            && current_state == PodState::Accelerating
            && self.distance_m >= ACCELERATION_PHASE_DISTANCE_M
        {
            self.max_distance_sent = true;
            self.events.send(MachineEvent::MaxDistanceReached);
        }

        if !self.end_of_tube_sent
            && current_state == PodState::Exiting
            && self.distance_m >= TUBE_LENGTH_M
        {
            self.end_of_tube_sent = true;
            self.events.send(MachineEvent::EndOfTubeReached);
        }
    }
}

fn any_imu_advanced(prev: &Sensors, cur: &Sensors) -> bool {
    prev.imus
        .iter()
        .zip(cur.imus.iter())
        .any(|(p, c)| c.timestamp_us > p.timestamp_us)
}

fn any_proximity_advanced(prev: &Sensors, cur: &Sensors) -> bool {
    let front = prev
        .proximity_front
        .iter()
        .zip(cur.proximity_front.iter())
        .any(|(p, c)| c.timestamp_us > p.timestamp_us);
    let back = prev
        .proximity_back
        .iter()
        .zip(cur.proximity_back.iter())
        .any(|(p, c)| c.timestamp_us > p.timestamp_us);
    front || back
}

fn mean_proximity(sensors: &Sensors) -> f64 {
    let sum: f64 = sensors.proximity_front.iter().map(|r| r.value).sum::<f64>()
        + sensors.proximity_back.iter().map(|r| r.value).sum::<f64>();
    let count = (sensors.proximity_front.len() + sensors.proximity_back.len()) as f64;
    sum / count
}

fn blend(current: f64, target: f64, weight: f64) -> f64 {
    current + (target - current) * weight
}

fn imu_dt_seconds(prev: &Sensors, cur: &Sensors) -> f64 {
    let delta_us = prev
        .imus
        .iter()
        .zip(cur.imus.iter())
        .map(|(p, c)| c.timestamp_us.saturating_sub(p.timestamp_us))
        .max()
        .unwrap_or(CYCLE_TIME_US);
    let delta_us = if delta_us == 0 { CYCLE_TIME_US } else { delta_us };
    delta_us as f64 / 1_000_000.0
}
