//! ---
//! itp_section: "08-consumption-analysis"
//! itp_subsection: "module"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "Threshold rules for water balance, temperature and pump health."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
//! Every function in this module is pure: aggregates in, status out.

use itp_store::{LatestPumpReading, PumpStatus, TemperatureStats};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// Totals above this value are treated as meter faults.
pub const MAX_PLAUSIBLE_TOTAL: f64 = 1_000_000.0;

pub const NORMAL_RATIO: (f64, f64) = (40.0, 70.0);
pub const WARNING_RATIO: (f64, f64) = (30.0, 80.0);

pub const NORMAL_DELTA: (f64, f64) = (17.0, 23.0);
pub const WARNING_DELTA: (f64, f64) = (15.0, 25.0);

/// Acceptable pressure lift across a pump, bar.
pub const PRESSURE_LIFT: (f64, f64) = (1.0, 3.0);
pub const MAX_VIBRATION: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WaterBalanceStatus {
    Normal,
    Warning,
    Leak,
    Error,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TemperatureStatus {
    Normal,
    Warning,
    Critical,
    Unknown,
}

/// Health of the pump group, or of one pump metric across the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PumpHealth {
    Normal,
    Warning,
    Critical,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DataSource {
    /// Figures come from stored readings.
    Database,
    /// Too few readings; figures come from typical consumption baselines.
    Estimated,
}

/// Water figures of one analysis window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaterFigures {
    pub cold_total: f64,
    pub hot_total: f64,
    pub cold_count: u64,
    pub hot_count: u64,
    pub window_hours: f64,
}

impl WaterFigures {
    pub fn avg_cold_per_hour(&self) -> f64 {
        per_hour(self.cold_total, self.window_hours)
    }

    pub fn avg_hot_per_hour(&self) -> f64 {
        per_hour(self.hot_total, self.window_hours)
    }

    /// Hot flow as a percentage of cold flow; zero when there is no cold flow.
    pub fn ratio_percent(&self) -> f64 {
        hot_to_cold_ratio(self.hot_total, self.cold_total)
    }

    pub fn is_sufficient(&self, min_records: u64) -> bool {
        self.cold_count >= min_records && self.hot_count >= min_records
    }

    pub fn totals_out_of_range(&self) -> bool {
        let range = 0.0..=MAX_PLAUSIBLE_TOTAL;
        !range.contains(&self.cold_total) || !range.contains(&self.hot_total)
    }
}

fn per_hour(total: f64, hours: f64) -> f64 {
    if hours > 0.0 {
        total / hours
    } else {
        0.0
    }
}

pub fn hot_to_cold_ratio(hot_total: f64, cold_total: f64) -> f64 {
    if cold_total == 0.0 {
        0.0
    } else {
        hot_total * 100.0 / cold_total
    }
}

fn in_band(value: f64, band: (f64, f64)) -> bool {
    value >= band.0 && value <= band.1
}

/// Ordered rule table; the first matching rule decides.
pub fn classify_water_balance(figures: &WaterFigures, min_records: u64) -> WaterBalanceStatus {
    if !figures.is_sufficient(min_records) {
        return WaterBalanceStatus::Unknown;
    }
    let avg_cold = figures.avg_cold_per_hour();
    let avg_hot = figures.avg_hot_per_hour();
    if avg_cold <= 0.0 || avg_hot < 0.0 {
        return WaterBalanceStatus::Error;
    }
    // The hot branch is fed from the cold branch and cannot exceed it.
    if avg_hot > avg_cold {
        return WaterBalanceStatus::Leak;
    }
    let ratio = figures.ratio_percent();
    if in_band(ratio, NORMAL_RATIO) {
        WaterBalanceStatus::Normal
    } else if in_band(ratio, WARNING_RATIO) {
        WaterBalanceStatus::Warning
    } else if ratio < WARNING_RATIO.0 {
        WaterBalanceStatus::Error
    } else {
        WaterBalanceStatus::Leak
    }
}

/// Classify the window's average delta-T.
pub fn classify_temperature(stats: &TemperatureStats) -> TemperatureStatus {
    if stats.count == 0 {
        return TemperatureStatus::Unknown;
    }
    classify_delta(stats.avg_delta)
}

pub fn classify_delta(delta: f64) -> TemperatureStatus {
    if in_band(delta, NORMAL_DELTA) {
        TemperatureStatus::Normal
    } else if in_band(delta, WARNING_DELTA) {
        TemperatureStatus::Warning
    } else {
        TemperatureStatus::Critical
    }
}

/// Map a healthy-fraction to a status: 0.8 and above is normal, 0.5 and
/// above is warning.
pub fn health_from_ratio(ratio: f64) -> PumpHealth {
    if ratio >= 0.8 {
        PumpHealth::Normal
    } else if ratio >= 0.5 {
        PumpHealth::Warning
    } else {
        PumpHealth::Critical
    }
}

/// Condition of the pump group, from the latest reading of each pump.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PumpSummary {
    pub status: PumpHealth,
    pub pump_count: usize,
    pub max_operating_hours: u32,
    pub normal: usize,
    pub warning: usize,
    pub critical: usize,
    pub pressure_health: PumpHealth,
    pub vibration_health: PumpHealth,
}

pub fn assess_pumps(latest: &[LatestPumpReading]) -> PumpSummary {
    if latest.is_empty() {
        return PumpSummary {
            status: PumpHealth::Unknown,
            pump_count: 0,
            max_operating_hours: 0,
            normal: 0,
            warning: 0,
            critical: 0,
            pressure_health: PumpHealth::Unknown,
            vibration_health: PumpHealth::Unknown,
        };
    }

    let count_of = |status: PumpStatus| latest.iter().filter(|p| p.status == status).count();
    let normal = count_of(PumpStatus::Normal);
    let warning = count_of(PumpStatus::Warning);
    let critical = count_of(PumpStatus::Critical);

    let status = if critical > 0 {
        PumpHealth::Critical
    } else if warning > 0 {
        PumpHealth::Warning
    } else {
        PumpHealth::Normal
    };

    let total = latest.len() as f64;
    let pressure_ok = latest
        .iter()
        .filter(|p| in_band(p.pressure_out - p.pressure_in, PRESSURE_LIFT))
        .count();
    let vibration_ok = latest
        .iter()
        .filter(|p| p.vibration <= MAX_VIBRATION)
        .count();

    PumpSummary {
        status,
        pump_count: latest.len(),
        max_operating_hours: latest.iter().map(|p| p.operating_hours).max().unwrap_or(0),
        normal,
        warning,
        critical,
        pressure_health: health_from_ratio(pressure_ok as f64 / total),
        vibration_health: health_from_ratio(vibration_ok as f64 / total),
    }
}

/// Number of independent anomaly signals raised by a classification.
pub fn count_anomalies(
    figures: &WaterFigures,
    balance: WaterBalanceStatus,
    temperature: TemperatureStatus,
    pumps: PumpHealth,
) -> u32 {
    let signals = [
        figures.totals_out_of_range(),
        figures.hot_total > figures.cold_total,
        matches!(balance, WaterBalanceStatus::Leak | WaterBalanceStatus::Error),
        temperature == TemperatureStatus::Critical,
        pumps == PumpHealth::Critical,
    ];
    signals.iter().filter(|raised| **raised).count() as u32
}
