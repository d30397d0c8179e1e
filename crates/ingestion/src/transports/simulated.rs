//! Simulated vehicle transport
//!
//! Emits JSON lines for a handful of built-in measurements at a fixed
//! frequency with small random variation. Stands in for a vehicle or the
//! network simulator when no hardware is attached.

use std::time::{Duration, Instant};

use bytes::{BufMut, Bytes, BytesMut};
use chrono::Utc;
use contracts::{ContractError, Formatter, JsonFormatter, RawMeasurement, RawRecord, Transport, TransportRead};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatedConfig {
    /// Emission rate of measurement batches (Hz)
    pub frequency_hz: f64,

    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 10.0,
            seed: None,
        }
    }
}

const GEARS: [&str; 6] = ["first", "second", "third", "fourth", "fifth", "sixth"];

#[derive(Debug)]
struct VehicleModel {
    speed: f64,
    steering: f64,
    fuel: f64,
    odometer: f64,
    latitude: f64,
    longitude: f64,
    headlamps: bool,
}

impl Default for VehicleModel {
    fn default() -> Self {
        Self {
            speed: 0.0,
            steering: 0.0,
            fuel: 80.0,
            odometer: 1200.0,
            latitude: 42.292834,
            longitude: -83.237275,
            headlamps: false,
        }
    }
}

pub struct SimulatedTransport {
    name: String,
    interval: Duration,
    next_emit: Instant,
    tick: u64,
    model: VehicleModel,
    rng: StdRng,
}

/// Emission interval bounds; out-of-range frequencies are clamped
const MIN_INTERVAL: Duration = Duration::from_millis(1);
const MAX_INTERVAL: Duration = Duration::from_secs(3600);

impl SimulatedTransport {
    pub fn new(name: impl Into<String>, config: SimulatedConfig) -> Self {
        let frequency = if config.frequency_hz > 0.0 {
            config.frequency_hz
        } else {
            SimulatedConfig::default().frequency_hz
        };
        let interval = Duration::try_from_secs_f64(1.0 / frequency)
            .unwrap_or(MAX_INTERVAL)
            .clamp(MIN_INTERVAL, MAX_INTERVAL);
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            name: name.into(),
            interval,
            next_emit: Instant::now(),
            tick: 0,
            model: VehicleModel::default(),
            rng,
        }
    }

    fn step(&mut self) -> Vec<RawMeasurement> {
        let dt = self.interval.as_secs_f64();
        let model = &mut self.model;
        let rng = &mut self.rng;

        let throttle: f64 = rng.random_range(0.0..60.0);
        model.speed = (model.speed + rng.random_range(-2.0..3.0)).clamp(0.0, 120.0);
        model.steering = (model.steering + rng.random_range(-5.0..5.0)).clamp(-90.0, 90.0);
        model.fuel = (model.fuel - model.speed * dt * 1e-4).max(0.0);
        model.odometer += model.speed * dt / 3600.0;
        model.latitude += rng.random_range(-1e-5..1e-5);
        model.longitude += rng.random_range(-1e-5..1e-5);

        let mut batch = vec![
            RawMeasurement::new("vehicle_speed", model.speed),
            RawMeasurement::new("engine_speed", 800.0 + model.speed * 30.0),
            RawMeasurement::new("accelerator_pedal_position", throttle),
            RawMeasurement::new("steering_wheel_angle", model.steering),
            RawMeasurement::new("fuel_level", model.fuel),
            RawMeasurement::new("odometer", model.odometer),
            RawMeasurement::new("latitude", model.latitude),
            RawMeasurement::new("longitude", model.longitude),
        ];

        if self.tick % 10 == 0 {
            if rng.random_bool(0.1) {
                model.headlamps = !model.headlamps;
            }
            let gear = GEARS[((model.speed / 20.0) as usize).min(GEARS.len() - 1)];
            batch.push(RawMeasurement::new("ignition_status", "run"));
            batch.push(RawMeasurement::new("transmission_gear_position", gear));
            batch.push(RawMeasurement::new("headlamp_status", model.headlamps));
            batch.push(RawMeasurement::new("brake_pedal_status", throttle < 5.0));
        }
        if self.tick % 40 == 39 {
            batch.push(RawMeasurement::new("button_event", "ok").with_event("pressed"));
        }

        self.tick += 1;
        batch
    }

    fn encode(&self, batch: Vec<RawMeasurement>) -> Result<Bytes, ContractError> {
        let timestamp = Utc::now().timestamp_micros() as f64 / 1_000_000.0;
        let mut out = BytesMut::new();
        for measurement in batch {
            let record = RawRecord::Measurement(measurement.with_timestamp(timestamp));
            out.put_slice(&JsonFormatter.serialize(&record)?);
            out.put_u8(b'\n');
        }
        Ok(out.freeze())
    }
}

impl Transport for SimulatedTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self, timeout: Duration) -> Result<TransportRead, ContractError> {
        let now = Instant::now();
        if self.next_emit > now {
            let wait = self.next_emit - now;
            std::thread::sleep(wait.min(timeout));
            if wait > timeout {
                return Ok(TransportRead::Idle);
            }
        }

        self.next_emit += self.interval;
        let batch = self.step();
        trace!(transport = %self.name, tick = self.tick, lines = batch.len(), "simulated batch");
        Ok(TransportRead::Data(self.encode(batch)?))
    }

    /// Commands are accepted and ignored
    fn write(&mut self, data: &[u8]) -> Result<usize, ContractError> {
        Ok(data.len())
    }
}
