//! ---
//! itp_section: "08-consumption-analysis"
//! itp_subsection: "module"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "Consumption analysis report returned to callers."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use itp_store::TemperatureStats;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classify::{
    classify_temperature, DataSource, PumpSummary, TemperatureStatus, WaterBalanceStatus,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureSummary {
    pub status: TemperatureStatus,
    pub avg_supply: f64,
    pub avg_return: f64,
    pub avg_delta: f64,
    pub min_delta: f64,
    pub max_delta: f64,
    pub readings: u64,
}

impl From<&TemperatureStats> for TemperatureSummary {
    fn from(stats: &TemperatureStats) -> Self {
        Self {
            status: classify_temperature(stats),
            avg_supply: stats.avg_supply,
            avg_return: stats.avg_return,
            avg_delta: stats.avg_delta,
            min_delta: stats.min_delta,
            max_delta: stats.max_delta,
            readings: stats.count,
        }
    }
}

/// Consumption-health assessment of one building over one window.
///
/// Built once per request and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionAnalysis {
    pub building_id: Uuid,
    /// `YYYY-MM-DD to YYYY-MM-DD`
    pub period: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub window_days: u32,
    pub data_source: DataSource,
    /// m³ over the window.
    pub total_cold_water: f64,
    pub total_hot_water: f64,
    pub difference: f64,
    pub hot_to_cold_ratio_percent: f64,
    pub avg_cold_per_hour: f64,
    pub avg_hot_per_hour: f64,
    pub cold_records: u64,
    pub hot_records: u64,
    pub water_balance_status: WaterBalanceStatus,
    pub temperature: TemperatureSummary,
    pub pumps: PumpSummary,
    pub has_anomalies: bool,
    pub anomaly_count: u32,
    pub recommendations: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl ConsumptionAnalysis {
    pub fn temperature_status(&self) -> TemperatureStatus {
        self.temperature.status
    }

    /// Cumulative runtime of the most worn pump.
    pub fn pump_operating_hours(&self) -> u32 {
        self.pumps.max_operating_hours
    }

    pub fn is_estimated(&self) -> bool {
        self.data_source == DataSource::Estimated
    }
}
