//! Long-lived ground-station TCP client.
//!
//! Newline-terminated text protocol: inbound lines carry a single integer
//! command code, outbound lines carry `"<code> <value>\n"` telemetry.
//! Reconnects with exponential backoff on any socket error; past a
//! configured number of consecutive failures it surfaces
//! `CriticalFailureDetected` to the state machine rather than retrying
//! forever.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pod_common::consts::CYCLE_TIME_US;
use pod_statemachine::{EventSender, MachineEvent};
use pod_telemetry::TelemetryRegistry;
use tracing::{debug, error, info, warn};

use crate::error::CommsError;

/// How often the client pushes a telemetry snapshot upstream while
/// connected.
const TELEMETRY_PERIOD: Duration = Duration::from_millis(200);

/// Inbound ground-station command codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandCode {
    Stop,
    KillPower,
    Launch,
}

impl CommandCode {
    fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(CommandCode::Stop),
            2 => Some(CommandCode::KillPower),
            3 => Some(CommandCode::Launch),
            _ => None,
        }
    }

    fn to_event(self) -> MachineEvent {
        match self {
            CommandCode::Stop => MachineEvent::EndOfRunReached,
            CommandCode::KillPower => MachineEvent::CriticalFailureDetected,
            CommandCode::Launch => MachineEvent::OnStart,
        }
    }
}

/// Outbound telemetry line codes. Frame content beyond "code, value" is
/// not specified by the ground-station protocol; this is the firmware's
/// own choice of what it pushes upstream every period.
#[derive(Debug, Clone, Copy)]
enum TelemetryCode {
    State = 10,
    VelocityMmPerSec = 11,
}

pub struct Communications {
    addr: String,
    backoff_min: Duration,
    backoff_max: Duration,
    max_reconnect_attempts: u32,
    registry: Arc<TelemetryRegistry>,
    events: EventSender,
}

impl Communications {
    pub fn new(
        addr: String,
        backoff_min: Duration,
        backoff_max: Duration,
        max_reconnect_attempts: u32,
        registry: Arc<TelemetryRegistry>,
        events: EventSender,
    ) -> Self {
        Self {
            addr,
            backoff_min,
            backoff_max,
            max_reconnect_attempts,
            registry,
            events,
        }
    }

    /// Reconnect loop: serve until the run is stopped, or until
    /// `max_reconnect_attempts` consecutive failures force a critical
    /// failure report.
    pub fn run(&mut self) {
        if let Err(err) = self.serve_until_persistent_failure() {
            error!(error = %err, "CRITICAL: ground station link failed persistently");
            self.events.send(MachineEvent::CriticalFailureDetected);
        }
    }

    /// Reconnect loop body. Returns `Err(CommsError::PersistentFailure)`
    /// once `max_reconnect_attempts` consecutive failures are reached;
    /// returns `Ok(())` if the run is stopped first.
    fn serve_until_persistent_failure(&mut self) -> Result<(), CommsError> {
        let mut attempt: u32 = 0;
        while self.registry.run_control.is_running() {
            match self.connect_and_serve() {
                Ok(()) => attempt = 0,
                Err(err) => {
                    warn!(error = %err, attempt, "ground station connection failed");
                    attempt += 1;
                    if attempt >= self.max_reconnect_attempts {
                        return Err(CommsError::PersistentFailure { attempts: attempt });
                    }
                    self.sleep_respecting_running(self.backoff_for(attempt));
                }
            }
        }
        Ok(())
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let scale = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        let backoff = self.backoff_min.saturating_mul(scale);
        backoff.min(self.backoff_max)
    }

    fn sleep_respecting_running(&self, duration: Duration) {
        let step = Duration::from_micros(CYCLE_TIME_US);
        let deadline = Instant::now() + duration;
        while self.registry.run_control.is_running() && Instant::now() < deadline {
            thread::sleep(step.min(duration));
        }
    }

    /// One connection's lifetime: connect, then alternate reading inbound
    /// commands and pushing outbound telemetry until the socket errors,
    /// the peer closes, or the run is stopped.
    fn connect_and_serve(&mut self) -> Result<(), CommsError> {
        let stream = TcpStream::connect(&self.addr).map_err(|source| CommsError::Connect {
            addr: self.addr.clone(),
            source,
        })?;
        info!(addr = %self.addr, "connected to ground station");

        stream
            .set_read_timeout(Some(Duration::from_millis(100)))
            .map_err(CommsError::Io)?;
        let mut writer = stream.try_clone().map_err(CommsError::Io)?;
        let mut reader = BufReader::new(stream);

        let mut line = String::new();
        let mut last_telemetry = Instant::now() - TELEMETRY_PERIOD;

        while self.registry.run_control.is_running() {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => {
                    return Err(CommsError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "ground station closed the connection",
                    )));
                }
                Ok(_) => self.handle_inbound_line(&line),
                Err(err)
                    if matches!(
                        err.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) => {}
                Err(err) => return Err(CommsError::Io(err)),
            }

            if last_telemetry.elapsed() >= TELEMETRY_PERIOD {
                self.send_telemetry(&mut writer)?;
                last_telemetry = Instant::now();
            }
        }

        Ok(())
    }

    fn handle_inbound_line(&self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }
        match trimmed.parse::<i64>() {
            Ok(code) => match CommandCode::from_code(code) {
                Some(command) => {
                    debug!(?command, code, "received ground station command");
                    self.events.send(command.to_event());
                }
                None => warn!(code, "unrecognized ground station command code, ignoring"),
            },
            Err(_) => warn!(line = trimmed, "malformed ground station command, ignoring"),
        }
    }

    fn send_telemetry(&self, writer: &mut TcpStream) -> Result<(), CommsError> {
        let state = self.registry.get_state_machine().state;
        let navigation = self.registry.get_navigation();
        let velocity_mm_per_s = (navigation.velocity_mps * 1000.0) as i64;

        write!(
            writer,
            "{} {}\n{} {}\n",
            TelemetryCode::State as u32,
            state as u32,
            TelemetryCode::VelocityMmPerSec as u32,
            velocity_mm_per_s
        )
        .map_err(CommsError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pod_common::types::{PodState, StateMachineData};
    use pod_statemachine::events::channel;
    use std::io::Read;
    use std::net::TcpListener;

    fn harness() -> (TcpListener, Arc<TelemetryRegistry>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let registry = Arc::new(TelemetryRegistry::new());
        (listener, registry)
    }

    #[test]
    fn command_code_maps_to_expected_events() {
        assert_eq!(
            CommandCode::from_code(1).unwrap().to_event(),
            MachineEvent::EndOfRunReached
        );
        assert_eq!(
            CommandCode::from_code(2).unwrap().to_event(),
            MachineEvent::CriticalFailureDetected
        );
        assert_eq!(
            CommandCode::from_code(3).unwrap().to_event(),
            MachineEvent::OnStart
        );
        assert!(CommandCode::from_code(99).is_none());
    }

    #[test]
    fn persistent_failure_reports_attempts_and_run_raises_critical_failure() {
        // Bind then immediately drop the listener so the port refuses
        // connections for every reconnect attempt below.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let registry = Arc::new(TelemetryRegistry::new());
        let (tx, rx) = channel();
        let mut comms = Communications::new(
            addr.to_string(),
            Duration::from_millis(1),
            Duration::from_millis(5),
            3,
            registry,
            tx,
        );

        let err = comms.serve_until_persistent_failure().unwrap_err();
        assert!(matches!(err, CommsError::PersistentFailure { attempts: 3 }));

        comms.run();
        assert_eq!(rx.try_recv(), Some(MachineEvent::CriticalFailureDetected));
    }

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        let (_listener, registry) = harness();
        let (tx, _rx) = channel();
        let comms = Communications::new(
            "127.0.0.1:0".into(),
            Duration::from_millis(100),
            Duration::from_secs(2),
            8,
            registry,
            tx,
        );
        assert_eq!(comms.backoff_for(1), Duration::from_millis(100));
        assert_eq!(comms.backoff_for(2), Duration::from_millis(200));
        assert_eq!(comms.backoff_for(3), Duration::from_millis(400));
        // Caps at backoff_max regardless of how large attempt grows.
        assert_eq!(comms.backoff_for(20), Duration::from_secs(2));
    }

    #[test]
    fn inbound_launch_command_emits_on_start() {
        let (listener, registry) = harness();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = channel();
        let mut comms = Communications::new(
            addr.to_string(),
            Duration::from_millis(10),
            Duration::from_millis(50),
            8,
            registry.clone(),
            tx,
        );

        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            socket.write_all(b"3\n").unwrap();
            thread::sleep(Duration::from_millis(150));
            registry.run_control.stop();
        });

        comms.connect_and_serve().ok();
        server.join().unwrap();
        assert_eq!(rx.try_recv(), Some(MachineEvent::OnStart));
    }

    #[test]
    fn telemetry_line_reflects_published_state() {
        let (listener, registry) = harness();
        let addr = listener.local_addr().unwrap();
        registry.set_state_machine(StateMachineData {
            state: PodState::Cruising,
            critical_failure: false,
        });
        let (tx, _rx) = channel();
        let mut comms = Communications::new(
            addr.to_string(),
            Duration::from_millis(10),
            Duration::from_millis(50),
            8,
            registry.clone(),
            tx,
        );

        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut buf = [0u8; 128];
            let n = socket.read(&mut buf).unwrap();
            registry.run_control.stop();
            String::from_utf8_lossy(&buf[..n]).to_string()
        });

        comms.connect_and_serve().ok();
        let received = server.join().unwrap();
        assert!(received.contains(&format!("{} {}", TelemetryCode::State as u32, PodState::Cruising as u32)));
    }
}
