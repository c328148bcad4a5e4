//! Errors surfaced by the ground-station TCP client.

use thiserror::Error;

/// Failure modes for the ground-station link.
///
/// `Connect`/`Io` are per-attempt errors that never leave [`crate::client`]:
/// it counts consecutive occurrences and, past a configured threshold,
/// returns `PersistentFailure` instead. `Communications::run` maps that
/// into [`pod_statemachine::MachineEvent::CriticalFailureDetected`] rather
/// than propagating the error further.
#[derive(Debug, Error)]
pub enum CommsError {
    #[error("failed to connect to ground station at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ground station socket I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ground station connection lost after {attempts} reconnect attempts")]
    PersistentFailure { attempts: u32 },
}
