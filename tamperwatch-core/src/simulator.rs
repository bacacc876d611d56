//! Synthetic reading generation per device type.
//!
//! Two modes exist for the weighing scale: the batch generator (independent
//! uniform noise around a 50 kg baseline, used to seed windows) and the
//! continuous random-walk mode (directionally-biased drift around a slowly
//! wandering 100 kg base, used by the live monitor view). Both take their
//! randomness from an injected, seedable RNG so streams replay
//! deterministically under test.

use crate::types::{DeviceType, Measurement, NozzleState, Reading};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SCALE_BASE_WEIGHT: f64 = 50.0;
const ENERGY_BASE_VOLTAGE: f64 = 230.0;
const ENERGY_BASE_CURRENT: f64 = 5.0;
const FUEL_BASE_FLOW_RATE: f64 = 3.2;
const FUEL_INITIAL_TOTALIZER: f64 = 1000.0;

/// Continuous-mode walk base weight.
const WALK_BASE_WEIGHT: f64 = 100.0;
/// Probability per tick of the drift direction flipping.
const WALK_FLIP_PROBABILITY: f64 = 0.08;

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Batch reading generator. Holds the RNG and the fuel totalizer, which
/// accumulates across calls.
pub struct DataSimulator {
    rng: StdRng,
    totalizer: f64,
}

impl DataSimulator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            totalizer: FUEL_INITIAL_TOTALIZER,
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            totalizer: FUEL_INITIAL_TOTALIZER,
        }
    }

    /// Generate `count` readings for the given device type. `count == 0`
    /// returns an empty vector without touching any simulator state.
    pub fn generate(&mut self, device_type: DeviceType, count: usize) -> Vec<Reading> {
        match device_type {
            DeviceType::WeighingScale => self.generate_weighing_scale(count),
            DeviceType::EnergyMeter => self.generate_energy_meter(count),
            DeviceType::FuelDispenser => self.generate_fuel_dispenser(count),
        }
    }

    /// Weighing scale: 50 kg baseline perturbed by uniform noise in ±1.0 kg.
    /// `calibration_drift = |weight − baseline|`, both rounded to 2 decimals.
    pub fn generate_weighing_scale(&mut self, count: usize) -> Vec<Reading> {
        let now = Utc::now().timestamp_millis();
        (0..count)
            .map(|i| {
                let weight = round2(SCALE_BASE_WEIGHT + self.rng.gen_range(-1.0..1.0));
                Reading {
                    // Backdated one minute per point; the newest point is now.
                    timestamp: now - ((count - 1 - i) as i64) * 60_000,
                    is_anomaly: false,
                    measurement: Measurement::WeighingScale {
                        weight,
                        calibration_drift: round2((weight - SCALE_BASE_WEIGHT).abs()),
                    },
                }
            })
            .collect()
    }

    /// Energy meter: 230 V ± 5 V, 5 A ± 1 A, `power = V·A / 1000` kW rounded
    /// to 3 decimals.
    pub fn generate_energy_meter(&mut self, count: usize) -> Vec<Reading> {
        let now = Utc::now().timestamp_millis();
        (0..count)
            .map(|i| {
                let voltage = round2(ENERGY_BASE_VOLTAGE + self.rng.gen_range(-5.0..5.0));
                let current = round2(ENERGY_BASE_CURRENT + self.rng.gen_range(-1.0..1.0));
                Reading {
                    timestamp: now - ((count - 1 - i) as i64) * 60_000,
                    is_anomaly: false,
                    measurement: Measurement::EnergyMeter {
                        voltage,
                        current,
                        power: round3(voltage * current / 1000.0),
                    },
                }
            })
            .collect()
    }

    /// Fuel dispenser: 3.2 L/min ± 0.25 flow, totalizer accumulating
    /// `flow/60` per tick, pulse count `⌊flow·10⌋`, magnetic field in
    /// [0, 0.6] T, pressure 2.5 ± 0.15 bar.
    pub fn generate_fuel_dispenser(&mut self, count: usize) -> Vec<Reading> {
        let now = Utc::now().timestamp_millis();
        (0..count)
            .map(|i| {
                let flow_rate = round2(FUEL_BASE_FLOW_RATE + self.rng.gen_range(-0.25..0.25));
                self.totalizer += flow_rate / 60.0;
                Reading {
                    // Fuel feeds tick per second, not per minute.
                    timestamp: now - ((count - 1 - i) as i64) * 1_000,
                    is_anomaly: false,
                    measurement: Measurement::FuelDispenser {
                        flow_rate,
                        totalizer: round2(self.totalizer),
                        pulse_count: (flow_rate * 10.0).floor() as u32,
                        magnetic_field: round2(self.rng.gen_range(0.0..0.6)),
                        pressure: round2(2.5 + self.rng.gen_range(-0.15..0.15)),
                        nozzle_state: if flow_rate > 1.0 {
                            NozzleState::Open
                        } else {
                            NozzleState::Closed
                        },
                    },
                }
            })
            .collect()
    }

    /// Advance a continuous walk one tick using this simulator's RNG.
    pub fn step_walk(&mut self, state: ScaleWalkState) -> (ScaleWalkState, Reading) {
        step_scale_walk(state, &mut self.rng)
    }

    /// Generate a batch with tamper anomalies injected into the late portion
    /// of the window, pre-tagged `is_anomaly`. Used for demo and classifier
    /// exercise data.
    pub fn generate_with_tamper(&mut self, device_type: DeviceType, count: usize) -> Vec<Reading> {
        let mut readings = self.generate(device_type, count);
        let n = count as f64;
        for (i, reading) in readings.iter_mut().enumerate() {
            let pos = i as f64;
            match &mut reading.measurement {
                Measurement::WeighingScale {
                    weight,
                    calibration_drift,
                } => {
                    if pos > n * 0.7 && self.rng.gen::<f64>() < 0.3 {
                        *weight = round2(*weight + self.rng.gen_range(5.0..15.0));
                        *calibration_drift = round2((*weight - SCALE_BASE_WEIGHT).abs());
                        reading.is_anomaly = true;
                    }
                }
                Measurement::EnergyMeter {
                    voltage,
                    current,
                    power,
                } => {
                    if pos > n * 0.6 && self.rng.gen::<f64>() < 0.25 {
                        *voltage = round2(*voltage + self.rng.gen_range(20.0..50.0));
                        *power = round3(*voltage * *current / 1000.0);
                        reading.is_anomaly = true;
                    }
                }
                Measurement::FuelDispenser {
                    flow_rate,
                    magnetic_field,
                    pulse_count,
                    nozzle_state,
                    ..
                } => {
                    if pos > n * 0.7 && self.rng.gen::<f64>() < 0.3 {
                        *magnetic_field = round2(*magnetic_field + self.rng.gen_range(2.0..5.0));
                        *flow_rate = round2(*flow_rate * self.rng.gen_range(0.7..0.9));
                        *pulse_count = (*flow_rate * 10.0).floor() as u32;
                        *nozzle_state = if *flow_rate > 1.0 {
                            NozzleState::Open
                        } else {
                            NozzleState::Closed
                        };
                        reading.is_anomaly = true;
                    }
                }
            }
        }
        readings
    }
}

// ── Continuous random-walk mode ──────────────────────────────────────────────

/// Walk state for the weighing-scale live view, carried explicitly between
/// ticks: a slowly wandering base weight and a drift direction that flips
/// with 8% probability per tick.
#[derive(Debug, Clone, Copy)]
pub struct ScaleWalkState {
    pub base_weight: f64,
    /// −1.0 or +1.0
    pub drift_direction: f64,
    pub last_weight: f64,
}

impl ScaleWalkState {
    pub fn new() -> Self {
        Self::with_base(WALK_BASE_WEIGHT)
    }

    pub fn with_base(base_weight: f64) -> Self {
        Self {
            base_weight,
            drift_direction: 1.0,
            last_weight: base_weight,
        }
    }
}

impl Default for ScaleWalkState {
    fn default() -> Self {
        Self::new()
    }
}

/// Advance the walk one tick: pure function of the prior state and the RNG.
/// Next weight is the last weight plus directional drift in U(0, 0.25) and
/// local noise in ±0.075; `calibration_drift = |weight − base| · 0.15`.
pub fn step_scale_walk(state: ScaleWalkState, rng: &mut StdRng) -> (ScaleWalkState, Reading) {
    let direction = if rng.gen::<f64>() < WALK_FLIP_PROBABILITY {
        -state.drift_direction
    } else {
        state.drift_direction
    };

    let next_weight = round2(
        state.last_weight + direction * rng.gen_range(0.0..0.25) + rng.gen_range(-0.075..0.075),
    );
    let base_weight = state.base_weight + rng.gen_range(-0.025..0.025);
    let calibration_drift = round2((next_weight - base_weight).abs() * 0.15);

    let reading = Reading {
        timestamp: Utc::now().timestamp_millis(),
        is_anomaly: false,
        measurement: Measurement::WeighingScale {
            weight: next_weight,
            calibration_drift,
        },
    };
    let next_state = ScaleWalkState {
        base_weight,
        drift_direction: direction,
        last_weight: next_weight,
    };
    (next_state, reading)
}
