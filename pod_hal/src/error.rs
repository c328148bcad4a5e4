//! Error types shared by every device transport.

use thiserror::Error;

/// Failure modes reported by sensor and motor transports.
///
/// A single `Transient` read failure is expected and retried next cycle; a
/// device that keeps producing `Transient` errors past a caller-defined
/// threshold is reclassified as `Offline` and excluded from "updated"
/// checks until it recovers.
#[derive(Debug, Clone, Error)]
pub enum DeviceError {
    /// A single operation failed; the device may recover on the next poll.
    #[error("transient device error on {device}: {reason}")]
    Transient { device: String, reason: String },

    /// The device has failed enough consecutive reads to be considered
    /// unreachable for this run.
    #[error("device offline: {device}")]
    Offline { device: String },

    /// The device reported a fault that cannot be resolved by retrying.
    #[error("device fault on {device}: {reason}")]
    Fault { device: String, reason: String },
}

impl DeviceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, DeviceError::Transient { .. })
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, DeviceError::Offline { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_is_not_offline() {
        let e = DeviceError::Transient {
            device: "imu-0".into(),
            reason: "timeout".into(),
        };
        assert!(e.is_transient());
        assert!(!e.is_offline());
    }

    #[test]
    fn display_includes_device_name() {
        let e = DeviceError::Offline {
            device: "proximity-front-3".into(),
        };
        assert!(e.to_string().contains("proximity-front-3"));
    }
}
