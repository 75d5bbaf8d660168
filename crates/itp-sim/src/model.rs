//! ---
//! itp_section: "11-simulation"
//! itp_subsection: "module"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "Randomised value model for water, temperature and pump telemetry."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
use std::ops::RangeInclusive;

use itp_store::PumpStatus;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::profile::{diurnal_factor, seasonal_offset};

pub const HOT_CH1_RANGE: RangeInclusive<f64> = 2.5..=4.5;
pub const HOT_CH2_RANGE: RangeInclusive<f64> = 1.5..=3.0;
/// Cold flow exceeds the hot total by this margin before shaping.
pub const COLD_MARGIN_RANGE: RangeInclusive<f64> = 1.0..=3.0;
pub const SUPPLY_RANGE: RangeInclusive<f64> = 65.0..=70.0;
pub const RETURN_RANGE: RangeInclusive<f64> = 42.0..=46.0;
pub const PUMP_BASE_HOURS: RangeInclusive<u32> = 5_000..=8_000;
pub const PRESSURE_IN_RANGE: RangeInclusive<f64> = 2.0..=4.0;
pub const PRESSURE_LIFT_RANGE: RangeInclusive<f64> = 1.0..=3.0;
pub const VIBRATION_RANGE: RangeInclusive<f64> = 0.0..=7.0;

const WARNING_HOURS: u32 = 10_000;
const CRITICAL_HOURS: u32 = 15_000;
const WARNING_PROBABILITY: f64 = 0.4;
const CRITICAL_PROBABILITY: f64 = 0.3;

/// One tick of water flow for a building, m³/h.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaterSample {
    pub cold: f64,
    pub hot_ch1: f64,
    pub hot_ch2: f64,
}

impl WaterSample {
    pub fn hot_total(&self) -> f64 {
        self.hot_ch1 + self.hot_ch2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureSample {
    pub supply: f64,
    pub return_temp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PumpSample {
    pub label: String,
    pub status: PumpStatus,
    pub operating_hours: u32,
    pub pressure_in: f64,
    pub pressure_out: f64,
    pub vibration: f64,
}

/// Stable numeric key for a building, used to derive per-building constants.
pub fn building_key(building_id: Uuid) -> u64 {
    let (high, low) = building_id.as_u64_pair();
    high ^ low
}

/// Number of pumps installed in the building: two or three, fixed per building.
pub fn pump_count(key: u64) -> u32 {
    2 + (key % 2) as u32
}

/// Operating hours of a pump when the building was commissioned.
pub fn pump_base_hours(key: u64, index: u32) -> u32 {
    let seed = key ^ u64::from(index).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    StdRng::seed_from_u64(seed).gen_range(PUMP_BASE_HOURS)
}

pub fn pump_label(index: u32) -> String {
    format!("Pump-{index}")
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Seedable source of plausible telemetry values.
#[derive(Debug)]
pub struct SyntheticModel {
    rng: StdRng,
}

impl SyntheticModel {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Fixed seed when provided, entropy otherwise.
    pub fn from_seed(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::new)
    }

    /// Independent model for a worker, derived from this one.
    pub fn fork(&mut self) -> Self {
        Self::new(self.rng.next_u64())
    }

    /// Water flows for the given hour of day. Cold always covers the hot total.
    pub fn water(&mut self, hour: u32) -> WaterSample {
        let factor = diurnal_factor(hour);
        let hot_ch1 = self.rng.gen_range(HOT_CH1_RANGE);
        let hot_ch2 = self.rng.gen_range(HOT_CH2_RANGE);
        let cold = hot_ch1 + hot_ch2 + self.rng.gen_range(COLD_MARGIN_RANGE);
        WaterSample {
            cold: round_to(cold * factor, 2),
            hot_ch1: round_to(hot_ch1 * factor, 2),
            hot_ch2: round_to(hot_ch2 * factor, 2),
        }
    }

    /// Supply and return temperatures for the given month, rounded to 0.1 °C.
    pub fn temperature(&mut self, month: u32) -> TemperatureSample {
        let offset = seasonal_offset(month);
        let supply = self.rng.gen_range(SUPPLY_RANGE) + offset.supply;
        let return_temp = self.rng.gen_range(RETURN_RANGE) + offset.return_temp;
        TemperatureSample {
            supply: round_to(supply, 1),
            return_temp: round_to(return_temp, 1),
        }
    }

    /// Readings for every pump of a building commissioned `age_days` ago.
    pub fn pumps(&mut self, key: u64, age_days: u32) -> Vec<PumpSample> {
        (1..=pump_count(key))
            .map(|index| {
                let operating_hours =
                    pump_base_hours(key, index).saturating_add(age_days.saturating_mul(24));
                self.pump(index, operating_hours)
            })
            .collect()
    }

    fn pump(&mut self, index: u32, operating_hours: u32) -> PumpSample {
        let mut status = PumpStatus::Normal;
        if operating_hours > WARNING_HOURS && self.rng.gen_bool(WARNING_PROBABILITY) {
            status = PumpStatus::Warning;
        }
        if operating_hours > CRITICAL_HOURS && self.rng.gen_bool(CRITICAL_PROBABILITY) {
            status = PumpStatus::Critical;
        }
        let pressure_in = round_to(self.rng.gen_range(PRESSURE_IN_RANGE), 2);
        let pressure_out = round_to(pressure_in + self.rng.gen_range(PRESSURE_LIFT_RANGE), 2);
        PumpSample {
            label: pump_label(index),
            status,
            operating_hours,
            pressure_in,
            pressure_out,
            vibration: round_to(self.rng.gen_range(VIBRATION_RANGE), 2),
        }
    }
}
