//! Per-cycle poll, collate, and change-gated publish loop.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pod_common::consts::{CYCLE_TIME_US, NUM_IMUS, NUM_PROXIMITY_PER_BANK};
use pod_common::types::{BatteryReading, Batteries, ImuReading, ProximityReading, Sensors};
use pod_hal::{BmsSource, DeviceError, ImuSource, ProximitySource, StripeSource};
use pod_telemetry::TelemetryRegistry;
use tracing::{debug, warn};

/// Consecutive read failures before a device is excluded from the
/// "updated" check (spec: "sustained read failures").
const OFFLINE_THRESHOLD: u32 = 5;

/// Per-device failure bookkeeping, kept outside the device trait object so
/// the aggregator (not the driver) owns the offline/online policy.
#[derive(Default)]
struct Health {
    consecutive_failures: u32,
    excluded: bool,
}

impl Health {
    fn record(&mut self, device: &str, result: &Result<(), &DeviceError>) {
        match result {
            Ok(()) => {
                self.consecutive_failures = 0;
                self.excluded = false;
            }
            Err(err) => {
                debug!(device, error = %err, "sensor read failed, retaining stale value");
                self.consecutive_failures += 1;
                if self.consecutive_failures >= OFFLINE_THRESHOLD && !self.excluded {
                    self.excluded = true;
                    warn!(device, "sensor declared offline, excluded from update checks");
                }
            }
        }
    }
}

/// The full set of devices the aggregator polls each cycle. Owned
/// exclusively by the aggregator for the life of the run.
pub struct SensorDevices {
    pub imus: Vec<Box<dyn ImuSource>>,
    pub proximity_front: Vec<Box<dyn ProximitySource>>,
    pub proximity_back: Vec<Box<dyn ProximitySource>>,
    pub stripe: Box<dyn StripeSource>,
    pub batteries_low: Vec<Box<dyn BmsSource>>,
    pub batteries_high: Vec<Box<dyn BmsSource>>,
}

pub struct SensorAggregator {
    devices: SensorDevices,
    imu_health: Vec<Health>,
    proximity_front_health: Vec<Health>,
    proximity_back_health: Vec<Health>,
    battery_low_health: Vec<Health>,
    battery_high_health: Vec<Health>,
    sensors: Sensors,
    batteries: Batteries,
    registry: Arc<TelemetryRegistry>,
}

impl SensorAggregator {
    pub fn new(devices: SensorDevices, registry: Arc<TelemetryRegistry>) -> Self {
        let imu_health = devices.imus.iter().map(|_| Health::default()).collect();
        let proximity_front_health = devices
            .proximity_front
            .iter()
            .map(|_| Health::default())
            .collect();
        let proximity_back_health = devices
            .proximity_back
            .iter()
            .map(|_| Health::default())
            .collect();
        let battery_low_health = devices
            .batteries_low
            .iter()
            .map(|_| Health::default())
            .collect();
        let battery_high_health = devices
            .batteries_high
            .iter()
            .map(|_| Health::default())
            .collect();

        Self {
            devices,
            imu_health,
            proximity_front_health,
            proximity_back_health,
            battery_low_health,
            battery_high_health,
            sensors: Sensors::default(),
            batteries: Batteries::default(),
            registry,
        }
    }

    /// Run until `running` is cleared, sleeping one cycle between polls.
    pub fn run(&mut self) {
        let cycle = Duration::from_micros(CYCLE_TIME_US);
        while self.registry.run_control.is_running() {
            self.tick();
            thread::sleep(cycle);
        }
    }

    /// One poll/collate/publish cycle. Exposed separately from `run` for
    /// deterministic unit testing.
    pub fn tick(&mut self) {
        let mut next_sensors = self.sensors;
        let mut imu_all_advanced = true;
        for i in 0..NUM_IMUS.min(self.devices.imus.len()) {
            match self.devices.imus[i].read() {
                Ok(reading) => {
                    self.imu_health[i].record("imu", &Ok(()));
                    if reading.timestamp_us <= self.sensors.imus[i].timestamp_us {
                        imu_all_advanced = false;
                    }
                    next_sensors.imus[i] = reading;
                }
                Err(err) => {
                    self.imu_health[i].record("imu", &Err(&err));
                    if !self.imu_health[i].excluded {
                        imu_all_advanced = false;
                    }
                }
            }
        }

        let front_advanced = poll_proximity_bank(
            &mut self.devices.proximity_front,
            &mut self.proximity_front_health,
            &self.sensors.proximity_front,
            &mut next_sensors.proximity_front,
            "proximity_front",
        );
        let back_advanced = poll_proximity_bank(
            &mut self.devices.proximity_back,
            &mut self.proximity_back_health,
            &self.sensors.proximity_back,
            &mut next_sensors.proximity_back,
            "proximity_back",
        );

        match self.devices.stripe.read() {
            Ok(count) => next_sensors.stripe_count = count,
            Err(err) => debug!(device = "stripe", error = %err, "stripe read failed, retaining stale value"),
        }

        // Source policy (preserved literally): publication requires EVERY
        // tracked IMU timestamp to have advanced, not merely one. A single
        // stalled IMU halts Sensors publication even while every other
        // device continues ticking; see the aggregator tests below.
        let sensors_updated = imu_all_advanced && front_advanced && back_advanced;
        if sensors_updated {
            self.sensors = next_sensors;
            self.registry.set_sensors(self.sensors);
        }

        let mut next_batteries = Batteries {
            low_power: vec![BatteryReading::default(); self.devices.batteries_low.len()],
            high_power: vec![BatteryReading::default(); self.devices.batteries_high.len()],
        };
        let low_changed = poll_battery_bank(
            &mut self.devices.batteries_low,
            &mut self.battery_low_health,
            &self.batteries.low_power,
            &mut next_batteries.low_power,
            "battery_low",
        );
        let high_changed = poll_battery_bank(
            &mut self.devices.batteries_high,
            &mut self.battery_high_health,
            &self.batteries.high_power,
            &mut next_batteries.high_power,
            "battery_high",
        );

        if low_changed || high_changed {
            self.batteries = next_batteries;
            self.registry.set_batteries(self.batteries.clone());
        }
    }
}

/// Poll one proximity bank; returns whether any tracked (non-excluded)
/// sensor in the bank advanced its timestamp.
fn poll_proximity_bank(
    devices: &mut [Box<dyn ProximitySource>],
    health: &mut [Health],
    previous: &[ProximityReading; NUM_PROXIMITY_PER_BANK],
    next: &mut [ProximityReading; NUM_PROXIMITY_PER_BANK],
    tag: &'static str,
) -> bool {
    let mut advanced = false;
    for i in 0..NUM_PROXIMITY_PER_BANK.min(devices.len()) {
        match devices[i].read() {
            Ok(reading) => {
                health[i].record(tag, &Ok(()));
                if reading.timestamp_us > previous[i].timestamp_us {
                    advanced = true;
                }
                next[i] = reading;
            }
            Err(err) => health[i].record(tag, &Err(&err)),
        }
    }
    advanced
}

/// Poll one battery bank; returns whether any tracked sensor's voltage or
/// temperature changed from its previous reading.
fn poll_battery_bank(
    devices: &mut [Box<dyn BmsSource>],
    health: &mut [Health],
    previous: &[BatteryReading],
    next: &mut [BatteryReading],
    tag: &'static str,
) -> bool {
    let mut changed = false;
    for i in 0..devices.len() {
        match devices[i].read() {
            Ok(reading) => {
                health[i].record(tag, &Ok(()));
                if let Some(prev) = previous.get(i) {
                    if reading.voltage != prev.voltage || reading.temperature != prev.temperature {
                        changed = true;
                    }
                } else {
                    changed = true;
                }
                next[i] = reading;
            }
            Err(err) => {
                health[i].record(tag, &Err(&err));
                if let Some(prev) = previous.get(i) {
                    next[i] = *prev;
                }
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AdvancingImu {
        timestamp_us: u64,
    }

    impl ImuSource for AdvancingImu {
        fn read(&mut self) -> Result<ImuReading, DeviceError> {
            self.timestamp_us += 10;
            Ok(ImuReading {
                accel: [0.0; 3],
                gyro: [0.0; 3],
                timestamp_us: self.timestamp_us,
            })
        }

        fn is_online(&self) -> bool {
            true
        }
    }

    struct StuckImu;

    impl ImuSource for StuckImu {
        fn read(&mut self) -> Result<ImuReading, DeviceError> {
            Ok(ImuReading {
                accel: [0.0; 3],
                gyro: [0.0; 3],
                timestamp_us: 0,
            })
        }

        fn is_online(&self) -> bool {
            true
        }
    }

    struct AdvancingProximity {
        timestamp_us: u64,
    }

    impl ProximitySource for AdvancingProximity {
        fn read(&mut self) -> Result<ProximityReading, DeviceError> {
            self.timestamp_us += 10;
            Ok(ProximityReading::new(1.0, self.timestamp_us))
        }

        fn is_online(&self) -> bool {
            true
        }
    }

    struct AdvancingStripe {
        count: u32,
    }

    impl StripeSource for AdvancingStripe {
        fn read(&mut self) -> Result<pod_common::types::StripeCount, DeviceError> {
            self.count += 1;
            Ok(pod_common::types::StripeCount::new(self.count, self.count as u64 * 10))
        }

        fn is_online(&self) -> bool {
            true
        }
    }

    fn devices_all_advancing() -> SensorDevices {
        SensorDevices {
            imus: (0..NUM_IMUS)
                .map(|_| Box::new(AdvancingImu { timestamp_us: 0 }) as Box<dyn ImuSource>)
                .collect(),
            proximity_front: (0..NUM_PROXIMITY_PER_BANK)
                .map(|_| Box::new(AdvancingProximity { timestamp_us: 0 }) as Box<dyn ProximitySource>)
                .collect(),
            proximity_back: (0..NUM_PROXIMITY_PER_BANK)
                .map(|_| Box::new(AdvancingProximity { timestamp_us: 0 }) as Box<dyn ProximitySource>)
                .collect(),
            stripe: Box::new(AdvancingStripe { count: 0 }),
            batteries_low: Vec::new(),
            batteries_high: Vec::new(),
        }
    }

    #[test]
    fn publishes_when_everything_advances() {
        let registry = Arc::new(TelemetryRegistry::new());
        let mut agg = SensorAggregator::new(devices_all_advancing(), registry.clone());
        agg.tick();
        assert!(registry.get_sensors().imus[0].timestamp_us > 0);
    }

    #[test]
    fn one_stalled_imu_blocks_publication() {
        let mut devices = devices_all_advancing();
        devices.imus[3] = Box::new(StuckImu);
        let registry = Arc::new(TelemetryRegistry::new());
        let mut agg = SensorAggregator::new(devices, registry.clone());

        agg.tick();
        agg.tick();

        // The literal source policy requires ALL IMU timestamps to have
        // advanced; one stalled IMU keeps the whole Sensors publication
        // frozen at its zero-initialized default even though every other
        // device ticked twice.
        assert_eq!(registry.get_sensors().imus[0].timestamp_us, 0);
    }

    #[test]
    fn excluded_device_no_longer_blocks_publication() {
        let mut devices = devices_all_advancing();

        struct FailingImu;
        impl ImuSource for FailingImu {
            fn read(&mut self) -> Result<ImuReading, DeviceError> {
                Err(DeviceError::Transient {
                    device: "imu".into(),
                    reason: "nack".into(),
                })
            }
            fn is_online(&self) -> bool {
                false
            }
        }
        devices.imus[5] = Box::new(FailingImu);

        let registry = Arc::new(TelemetryRegistry::new());
        let mut agg = SensorAggregator::new(devices, registry.clone());

        for _ in 0..OFFLINE_THRESHOLD + 1 {
            agg.tick();
        }

        assert!(registry.get_sensors().imus[0].timestamp_us > 0);
    }
}
