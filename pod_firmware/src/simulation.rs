//! Simulation driver.
//!
//! Real sensor transport (I2C/SPI/CAN to MPU9250, VL6180, BMS, CanProxi)
//! and the CAN frame layout for motor controllers live outside this crate.
//! This module supplies the software-only stand-ins the CLI wires up by
//! default so the firmware is runnable without physical hardware attached,
//! mirroring the workspace's simulation-driver convention for bringing up
//! a HAL-backed binary without real devices.

use std::time::{SystemTime, UNIX_EPOCH};

use pod_common::consts::{NUM_IMUS, NUM_PROXIMITY_PER_BANK};
use pod_hal::error::DeviceError;
use pod_hal::motor::ControllerHealth;
use pod_hal::{BmsSource, Communicator, ImuSource, ProximitySource, StripeSource};
use pod_common::types::{BatteryReading, ImuReading, ProximityReading, StripeCount};
use pod_sensors::SensorDevices;

fn now_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// A steady, always-online IMU reporting approximately 1g on the vertical
/// axis (as if the pod were stationary and level) plus the configured
/// constant forward acceleration.
struct SimulatedImu {
    forward_accel_mps2: f64,
}

impl ImuSource for SimulatedImu {
    fn read(&mut self) -> Result<ImuReading, DeviceError> {
        Ok(ImuReading {
            accel: [self.forward_accel_mps2, 0.0, 9.81],
            gyro: [0.0, 0.0, 0.0],
            timestamp_us: now_us(),
        })
    }

    fn is_online(&self) -> bool {
        true
    }
}

/// A proximity sensor reporting a fixed standoff distance.
struct SimulatedProximity;

impl ProximitySource for SimulatedProximity {
    fn read(&mut self) -> Result<ProximityReading, DeviceError> {
        Ok(ProximityReading::new(50.0, now_us()))
    }

    fn is_online(&self) -> bool {
        true
    }
}

/// A stripe counter that never ticks; a real run drives this from track
/// GPIO edges, which a simulation has none of.
#[derive(Default)]
struct SimulatedStripeCounter {
    count: u32,
}

impl StripeSource for SimulatedStripeCounter {
    fn read(&mut self) -> Result<StripeCount, DeviceError> {
        Ok(StripeCount::new(self.count, now_us()))
    }

    fn is_online(&self) -> bool {
        true
    }
}

/// A battery reporting a steady nominal charge.
struct SimulatedBattery {
    voltage: f64,
}

impl BmsSource for SimulatedBattery {
    fn read(&mut self) -> Result<BatteryReading, DeviceError> {
        Ok(BatteryReading {
            voltage: self.voltage,
            current: 0.0,
            temperature: 25.0,
            charge: 1.0,
        })
    }

    fn is_online(&self) -> bool {
        true
    }
}

/// Build the full simulated sensor rig: 8 IMUs, 24+24 proximity sensors,
/// one stripe counter, and a nominal battery on each bank.
pub fn create_sensor_devices() -> SensorDevices {
    SensorDevices {
        imus: (0..NUM_IMUS)
            .map(|_| Box::new(SimulatedImu { forward_accel_mps2: 1.0 }) as Box<dyn ImuSource>)
            .collect(),
        proximity_front: (0..NUM_PROXIMITY_PER_BANK)
            .map(|_| Box::new(SimulatedProximity) as Box<dyn ProximitySource>)
            .collect(),
        proximity_back: (0..NUM_PROXIMITY_PER_BANK)
            .map(|_| Box::new(SimulatedProximity) as Box<dyn ProximitySource>)
            .collect(),
        stripe: Box::new(SimulatedStripeCounter::default()),
        batteries_low: vec![Box::new(SimulatedBattery { voltage: 24.0 })],
        batteries_high: vec![Box::new(SimulatedBattery { voltage: 400.0 })],
    }
}

/// An in-memory CAN transport: commanded setpoints are echoed back as the
/// "actual" reading on the next poll, as a real bus would once the
/// controllers have converged.
#[derive(Default)]
pub struct SimulatedCommunicator {
    velocity: [i32; 4],
    torque: [i16; 4],
}

impl Communicator for SimulatedCommunicator {
    fn register_controllers(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn configure_controllers(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn prepare_motors(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn health_check(&mut self) -> Result<ControllerHealth, DeviceError> {
        Ok(ControllerHealth::Ok)
    }

    fn send_target_velocity(&mut self, velocity_rpm: [i32; 4]) -> Result<(), DeviceError> {
        self.velocity = velocity_rpm;
        Ok(())
    }

    fn send_target_torque(&mut self, torque: [i16; 4]) -> Result<(), DeviceError> {
        self.torque = torque;
        Ok(())
    }

    fn request_actual_velocity(&mut self) -> Result<[i32; 4], DeviceError> {
        Ok(self.velocity)
    }

    fn request_actual_torque(&mut self) -> Result<[i16; 4], DeviceError> {
        Ok(self.torque)
    }

    fn quick_stop_all(&mut self) -> Result<(), DeviceError> {
        self.velocity = [0; 4];
        Ok(())
    }

    fn enter_pre_operational(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
}
