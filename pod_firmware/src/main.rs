//! Pod Control Firmware — CLI entry point.
//!
//! Wires the telemetry registry and every worker thread together per the
//! selected run mode, then blocks until the pod reaches its terminal state
//! or the process receives a shutdown signal.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use clap::Parser;
use pod_common::prelude::{ConfigLoader, LogLevel, PodConfig};
use pod_common::types::PodState;
use pod_motor::MotorController;
use pod_navigation::NavigationEstimator;
use pod_sensors::SensorAggregator;
use pod_statemachine::PodStateMachine;
use pod_telemetry::TelemetryRegistry;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod simulation;

/// Pod Control Firmware — onboard control for a hyperloop prototype pod.
#[derive(Parser, Debug)]
#[command(name = "pod_firmware")]
#[command(author = "Pod Control Team")]
#[command(version)]
#[command(about = "Onboard control firmware for a hyperloop prototype pod")]
struct Args {
    /// Path to the pod configuration TOML file.
    #[arg(short, long, default_value = "/etc/pod/pod.toml")]
    config: PathBuf,

    /// Override the configured log level.
    #[arg(long)]
    log_level: Option<CliLogLevel>,

    /// Run only the sensor aggregator (diagnostic mode, no motors/comms).
    #[arg(long, conflicts_with = "motors_only")]
    sensors_only: bool,

    /// Run only the state machine and motor controller (diagnostic mode,
    /// no sensors/navigation/comms).
    #[arg(long, conflicts_with = "sensors_only")]
    motors_only: bool,

    /// Override the number of parties required at the post-calibration
    /// barrier. Full runs always use 2 (navigation, motor controller);
    /// single-worker diagnostic modes default to 1 so the lone worker
    /// doesn't block forever waiting for a rendezvous partner that is
    /// never spawned. Only override this for test harnesses.
    #[arg(long)]
    barrier_parties: Option<usize>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum CliLogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<CliLogLevel> for LogLevel {
    fn from(level: CliLogLevel) -> Self {
        match level {
            CliLogLevel::Trace => LogLevel::Trace,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Error => LogLevel::Error,
        }
    }
}

/// Process exit codes: clean shutdown, configuration error, latched
/// critical failure.
mod exit_code {
    pub const CLEAN: i32 = 0;
    pub const CONFIG_ERROR: i32 = 1;
    pub const CRITICAL_FAILURE: i32 = 2;
}

fn main() {
    let args = Args::parse();

    let mut config = match PodConfig::load(&args.config) {
        Ok(config) => config,
        Err(pod_common::config::ConfigError::FileNotFound) => PodConfig::default(),
        Err(err) => {
            setup_tracing(LogLevel::Info);
            error!(error = %err, "failed to load configuration");
            std::process::exit(exit_code::CONFIG_ERROR);
        }
    };

    if let Some(level) = args.log_level {
        config.log_level = level.into();
    }
    setup_tracing(config.log_level);

    if let Err(err) = config.validate() {
        error!(error = %err, "configuration failed validation");
        std::process::exit(exit_code::CONFIG_ERROR);
    }

    info!(version = env!("CARGO_PKG_VERSION"), "pod firmware starting");

    let critical_failure = run(&args, &config);

    if critical_failure {
        error!("CRITICAL: run ended with a latched critical failure");
        std::process::exit(exit_code::CRITICAL_FAILURE);
    }
    info!("pod firmware shutdown complete");
    std::process::exit(exit_code::CLEAN);
}

/// Wire up and run the selected workers; returns whether the run ended
/// with `critical_failure` latched.
fn run(args: &Args, config: &PodConfig) -> bool {
    let default_parties = if args.sensors_only || args.motors_only { 1 } else { 2 };
    let barrier_parties = args.barrier_parties.unwrap_or(default_parties);
    let registry = Arc::new(TelemetryRegistry::with_barrier_parties(barrier_parties));

    let shutdown_registry = registry.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        info!("received shutdown signal");
        shutdown_registry.run_control.stop();
    }) {
        error!(error = %err, "failed to install signal handler, continuing without one");
    }

    let (tx, rx) = pod_statemachine::events::channel();
    let mut handles: Vec<JoinHandle<()>> = Vec::new();

    let sm_registry = registry.clone();
    let sm_handle = thread::spawn(move || {
        PodStateMachine::new(rx, sm_registry).run();
    });

    if !args.motors_only {
        let sensor_registry = registry.clone();
        handles.push(thread::spawn(move || {
            let devices = simulation::create_sensor_devices();
            SensorAggregator::new(devices, sensor_registry).run();
        }));
    }

    if !args.sensors_only && !args.motors_only {
        let nav_registry = registry.clone();
        let nav_tx = tx.clone();
        let min_calibration_samples = config.min_calibration_samples;
        let calibration_timeout = Duration::from_secs_f64(config.calibration_timeout_s);
        handles.push(thread::spawn(move || {
            NavigationEstimator::new(nav_registry, nav_tx, min_calibration_samples, calibration_timeout).run();
        }));
    }

    if !args.sensors_only {
        let motor_registry = registry.clone();
        let motor_tx = tx.clone();
        handles.push(thread::spawn(move || {
            MotorController::new(
                Box::new(simulation::SimulatedCommunicator::default()),
                Box::new(pod_motor::StepVelocityStrategy),
                motor_registry,
                motor_tx,
            )
            .run();
        }));
    }

    if !args.sensors_only && !args.motors_only {
        let comms_registry = registry.clone();
        let comms_tx = tx.clone();
        let comms_config = config.comms.clone();
        handles.push(thread::spawn(move || {
            pod_comms::Communications::new(
                comms_config.ground_station_addr,
                Duration::from_secs_f64(comms_config.backoff_min_s),
                Duration::from_secs_f64(comms_config.backoff_max_s),
                pod_common::consts::COMMS_MAX_RECONNECT_ATTEMPTS,
                comms_registry,
                comms_tx,
            )
            .run();
        }));
    }

    // Drop the original sender once every worker holds its own clone, so
    // the channel closes (and the state machine's `recv()` unblocks) once
    // every worker thread above has exited.
    drop(tx);

    wait_for_shutdown(&registry);
    registry.run_control.stop();
    for handle in handles {
        let _ = handle.join();
    }
    let _ = sm_handle.join();

    registry.get_state_machine().critical_failure
}

/// Block until the pod reaches its terminal state or the process is
/// asked to shut down.
fn wait_for_shutdown(registry: &Arc<TelemetryRegistry>) {
    let poll = Duration::from_millis(50);
    while registry.run_control.is_running() {
        if registry.get_state_machine().state == PodState::FailureStopped {
            break;
        }
        thread::sleep(poll);
    }
}

fn setup_tracing(level: LogLevel) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter_str()));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
