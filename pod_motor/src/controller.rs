//! Per-state dispatch worker.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pod_common::consts::CYCLE_TIME_US;
use pod_common::status::ModuleStatus;
use pod_common::types::{MotorData, MotorSetpoint, PodState};
use pod_hal::{Communicator, ControllerHealth};
use pod_statemachine::{EventSender, MachineEvent};
use pod_telemetry::TelemetryRegistry;
use tracing::{error, info, warn};

use crate::strategy::VelocityStrategy;

/// Upper bound on stop-convergence polling iterations. Not specified by
/// the control loop's contract (which only requires eventual convergence)
/// but a real `stop_motors` still must return; after this many iterations
/// it force-latches rather than spin forever on a wedged bus.
const STOP_CONVERGENCE_MAX_ITERATIONS: u32 = 10_000;

pub struct MotorController {
    communicator: Box<dyn Communicator>,
    strategy: Box<dyn VelocityStrategy>,
    registry: Arc<TelemetryRegistry>,
    events: EventSender,
    motor_failure: bool,
    barrier_crossed: bool,
    decel_stop_sent: bool,
    last_state: Option<PodState>,
}

impl MotorController {
    pub fn new(
        communicator: Box<dyn Communicator>,
        strategy: Box<dyn VelocityStrategy>,
        registry: Arc<TelemetryRegistry>,
        events: EventSender,
    ) -> Self {
        Self {
            communicator,
            strategy,
            registry,
            events,
            motor_failure: false,
            barrier_crossed: false,
            decel_stop_sent: false,
            last_state: None,
        }
    }

    pub fn run(&mut self) {
        let cycle = Duration::from_micros(CYCLE_TIME_US);
        while self.registry.run_control.is_running() {
            self.tick();
            thread::sleep(cycle);
        }
    }

    /// One dispatch cycle. Exposed separately from `run` for deterministic
    /// unit testing.
    pub fn tick(&mut self) {
        let state = self.registry.get_state_machine().state;
        if self.last_state != Some(PodState::Decelerating) && state == PodState::Decelerating {
            self.decel_stop_sent = false;
        }

        match state {
            PodState::Idle => self.init_motors(),
            PodState::Calibrating => self.prepare_motors(),
            PodState::Ready | PodState::RunComplete => {}
            PodState::Accelerating => {
                if !self.barrier_crossed {
                    self.registry.run_control.wait_for_calibration();
                    self.barrier_crossed = true;
                }
                self.control_loop_tick(true);
            }
            PodState::Cruising => {}
            PodState::Decelerating => self.control_loop_tick(false),
            PodState::Exiting => self.service_propulsion(),
            PodState::EmergencyBraking => self.stop_motors(),
            PodState::FailureStopped => {
                let _ = self.communicator.enter_pre_operational();
            }
        }

        self.last_state = Some(state);
    }

    /// `Idle` → register and configure controllers on the bus.
    fn init_motors(&mut self) {
        if self.motor_failure {
            return;
        }
        let result = self
            .communicator
            .register_controllers()
            .and_then(|()| self.communicator.configure_controllers());

        match result {
            Ok(()) => self.publish_status(ModuleStatus::Init),
            Err(err) => {
                warn!(error = %err, "motor controller initialization failed");
                self.declare_motor_failure();
            }
        }
    }

    /// `Calibrating` → put controllers in operational mode, health-check.
    fn prepare_motors(&mut self) {
        if self.motor_failure {
            return;
        }
        let result = self
            .communicator
            .prepare_motors()
            .and_then(|()| self.communicator.health_check());

        match result {
            Ok(ControllerHealth::Ok) => self.publish_status(ModuleStatus::Ready),
            Ok(ControllerHealth::Fault) => {
                warn!("motor controller health check reported fault during preparation");
                self.declare_motor_failure();
            }
            Err(err) => {
                warn!(error = %err, "motor controller preparation failed");
                self.declare_motor_failure();
            }
        }
    }

    /// `Exiting` → service-propulsion maintenance. No maintenance
    /// operations are defined for this firmware; left as a no-op.
    fn service_propulsion(&mut self) {}

    /// Shared accelerate/decelerate control loop body for one cycle.
    fn control_loop_tick(&mut self, accelerating: bool) {
        if self.registry.get_state_machine().critical_failure {
            self.stop_motors();
            return;
        }

        match self.communicator.health_check() {
            Ok(ControllerHealth::Ok) => {}
            Ok(ControllerHealth::Fault) => {
                warn!("motor controller health check reported fault, stopping");
                self.declare_motor_failure();
                self.stop_motors();
                return;
            }
            Err(err) => {
                warn!(error = %err, "motor controller health check failed, stopping");
                self.declare_motor_failure();
                self.stop_motors();
                return;
            }
        }

        let navigation_velocity = self.registry.get_navigation().velocity_mps;
        let current = self.registry.get_motor_data();
        let current_rpm = current.motors.map(|m| m.velocity);
        let current_torque = current.motors.map(|m| m.torque);

        let (target_rpm, target_torque) = if accelerating {
            (
                self.strategy.accelerate(current_rpm, navigation_velocity),
                self.strategy.accelerate_torque(current_torque, navigation_velocity),
            )
        } else {
            (
                self.strategy.decelerate(current_rpm, navigation_velocity),
                self.strategy.decelerate_torque(current_torque, navigation_velocity),
            )
        };

        if let Err(err) = self.communicator.send_target_velocity(target_rpm) {
            warn!(error = %err, "failed to send target velocity, retaining stale setpoint");
        }
        if let Err(err) = self.communicator.send_target_torque(target_torque) {
            warn!(error = %err, "failed to send target torque, retaining stale setpoint");
        }

        let actual_velocity = self
            .communicator
            .request_actual_velocity()
            .unwrap_or(current_rpm);
        let actual_torque = self
            .communicator
            .request_actual_torque()
            .unwrap_or(current_torque);

        let motors = std::array::from_fn(|i| MotorSetpoint {
            velocity: actual_velocity[i],
            torque: actual_torque[i],
        });
        self.registry.set_motor_data(MotorData::new(motors, ModuleStatus::Ready));

        if !accelerating && !self.decel_stop_sent && actual_velocity.iter().all(|&v| v == 0) {
            self.decel_stop_sent = true;
            self.events.send(MachineEvent::AllMotorsStopped);
        }
    }

    /// Fail-safe stop: quick-stop all four controllers, then poll actual
    /// velocity until every motor reports zero. Never waits on any other
    /// worker, only on its own motor transport.
    fn stop_motors(&mut self) {
        if let Err(err) = self.communicator.quick_stop_all() {
            error!(error = %err, "CRITICAL: quick-stop command failed");
        }

        let mut iterations = 0;
        loop {
            let actual = self.communicator.request_actual_velocity().unwrap_or([0; 4]);
            let motors = actual.map(|v| MotorSetpoint { velocity: v, torque: 0 });
            self.registry
                .set_motor_data(MotorData::new(motors, ModuleStatus::CriticalFailure));

            if actual.iter().all(|&v| v == 0) {
                break;
            }
            iterations += 1;
            if iterations >= STOP_CONVERGENCE_MAX_ITERATIONS {
                warn!("stop_motors exceeded convergence bound, forcing latch");
                break;
            }
            thread::sleep(Duration::from_micros(CYCLE_TIME_US));
        }

        info!("all motors stopped");
        self.events.send(MachineEvent::AllMotorsStopped);
        let _ = self.communicator.enter_pre_operational();
    }

    fn declare_motor_failure(&mut self) {
        self.motor_failure = true;
        self.publish_status(ModuleStatus::CriticalFailure);
        self.events.send(MachineEvent::CriticalFailureDetected);
    }

    fn publish_status(&self, status: ModuleStatus) {
        let mut current = self.registry.get_motor_data();
        current.status = status;
        self.registry.set_motor_data(current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pod_hal::motor::test_doubles::LoopbackCommunicator;
    use pod_statemachine::events::channel;
    use pod_statemachine::events::EventReceiver;

    fn harness() -> (MotorController, Arc<TelemetryRegistry>, EventReceiver) {
        let registry = Arc::new(TelemetryRegistry::new());
        let (tx, rx) = channel();
        let controller = MotorController::new(
            Box::new(LoopbackCommunicator::default()),
            Box::new(crate::strategy::StepVelocityStrategy),
            registry.clone(),
            tx,
        );
        (controller, registry, rx)
    }

    #[test]
    fn idle_init_publishes_init_status() {
        let (mut mc, registry, _rx) = harness();
        mc.tick();
        assert_eq!(registry.get_motor_data().status, ModuleStatus::Init);
    }

    #[test]
    fn motor_failure_latches_and_suppresses_further_init() {
        let (mut mc, registry, rx) = harness();
        mc.motor_failure = true;
        mc.tick();
        assert_eq!(registry.get_motor_data().status, ModuleStatus::Start);
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn accelerating_ramps_velocity_up() {
        let (mut mc, registry, _rx) = harness();
        registry.set_state_machine(pod_common::types::StateMachineData {
            state: PodState::Accelerating,
            critical_failure: false,
        });

        let barrier_registry = registry.clone();
        let handle = thread::spawn(move || {
            barrier_registry.run_control.wait_for_calibration();
        });
        mc.tick();
        handle.join().unwrap();

        assert!(registry.get_motor_data().motors[0].velocity > 0);
    }

    #[test]
    fn decelerating_to_zero_emits_all_motors_stopped() {
        let (mut mc, registry, rx) = harness();
        registry.set_motor_data(MotorData::new(
            [MotorSetpoint { velocity: 100, torque: 0 }; 4],
            ModuleStatus::Ready,
        ));
        registry.set_state_machine(pod_common::types::StateMachineData {
            state: PodState::Decelerating,
            critical_failure: false,
        });

        // Step from 100 down to 0 in increments of VELOCITY_STEP_RPM (100).
        mc.tick();
        assert_eq!(registry.get_motor_data().motors[0].velocity, 0);
        assert_eq!(rx.try_recv(), Some(MachineEvent::AllMotorsStopped));
    }

    #[test]
    fn critical_failure_triggers_stop_and_emergency_status() {
        let (mut mc, registry, _rx) = harness();
        registry.set_state_machine(pod_common::types::StateMachineData {
            state: PodState::EmergencyBraking,
            critical_failure: true,
        });
        mc.tick();
        assert!(registry.get_motor_data().all_stopped());
    }
}
