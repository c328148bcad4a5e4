//! CAN motor controller transport.

use crate::error::DeviceError;

/// Result of a controller health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerHealth {
    Ok,
    Fault,
}

/// Transport to the four CAN motor controllers.
///
/// Frame layouts, bus addressing, and CANopen object dictionaries are
/// external concerns; this trait exposes only the operations the Motor
/// Controller's state dispatch needs.
pub trait Communicator: Send {
    /// Register all four controllers on the bus. Called once from `Idle`.
    fn register_controllers(&mut self) -> Result<(), DeviceError>;

    /// Push operating parameters to all four controllers.
    fn configure_controllers(&mut self) -> Result<(), DeviceError>;

    /// Transition all four controllers into operational mode.
    fn prepare_motors(&mut self) -> Result<(), DeviceError>;

    /// Poll bus-level health across all four controllers.
    fn health_check(&mut self) -> Result<ControllerHealth, DeviceError>;

    fn send_target_velocity(&mut self, velocity_rpm: [i32; 4]) -> Result<(), DeviceError>;

    fn send_target_torque(&mut self, torque: [i16; 4]) -> Result<(), DeviceError>;

    fn request_actual_velocity(&mut self) -> Result<[i32; 4], DeviceError>;

    fn request_actual_torque(&mut self) -> Result<[i16; 4], DeviceError>;

    /// Command an immediate, uncoordinated stop on all four controllers.
    fn quick_stop_all(&mut self) -> Result<(), DeviceError>;

    /// Command all four controllers into the safe pre-operational state.
    fn enter_pre_operational(&mut self) -> Result<(), DeviceError>;
}

#[cfg(test)]
pub(crate) mod test_doubles {
    use super::*;

    /// In-memory stand-in for the CAN bus: tracks commanded setpoints and
    /// reports them back as "actual" immediately, so control-loop tests
    /// can assert convergence without real hardware.
    #[derive(Debug, Default)]
    pub struct LoopbackCommunicator {
        pub velocity: [i32; 4],
        pub torque: [i16; 4],
        pub registered: bool,
        pub configured: bool,
        pub operational: bool,
        pub health: ControllerHealth,
        pub quick_stopped: bool,
    }

    impl Default for ControllerHealth {
        fn default() -> Self {
            ControllerHealth::Ok
        }
    }

    impl Communicator for LoopbackCommunicator {
        fn register_controllers(&mut self) -> Result<(), DeviceError> {
            self.registered = true;
            Ok(())
        }

        fn configure_controllers(&mut self) -> Result<(), DeviceError> {
            self.configured = true;
            Ok(())
        }

        fn prepare_motors(&mut self) -> Result<(), DeviceError> {
            self.operational = true;
            Ok(())
        }

        fn health_check(&mut self) -> Result<ControllerHealth, DeviceError> {
            Ok(self.health)
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
            self.quick_stopped = true;
            self.velocity = [0; 4];
            Ok(())
        }

        fn enter_pre_operational(&mut self) -> Result<(), DeviceError> {
            self.operational = false;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_doubles::LoopbackCommunicator;
    use super::*;

    #[test]
    fn quick_stop_zeroes_velocity() {
        let mut comm = LoopbackCommunicator::default();
        comm.send_target_velocity([100, 100, 100, 100]).unwrap();
        comm.quick_stop_all().unwrap();
        assert_eq!(comm.request_actual_velocity().unwrap(), [0, 0, 0, 0]);
    }

    #[test]
    fn registration_sequence_sets_flags() {
        let mut comm = LoopbackCommunicator::default();
        comm.register_controllers().unwrap();
        comm.configure_controllers().unwrap();
        comm.prepare_motors().unwrap();
        assert!(comm.registered);
        assert!(comm.configured);
        assert!(comm.operational);
    }
}
