//! ---
//! itp_section: "03-persistence"
//! itp_subsection: "module"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "Telemetry entities and aggregate shapes."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Apartment building served by one thermal substation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub id: Uuid,
    pub address: String,
    #[serde(default)]
    pub fias_id: Option<String>,
    #[serde(default)]
    pub unom_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Building {
    pub fn new(id: Uuid, address: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            address: address.into(),
            fias_id: None,
            unom_id: None,
            created_at,
        }
    }
}

/// Individual thermal substation (ITP) metering the building's cold-water inlet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Substation {
    pub id: Uuid,
    pub building_id: Uuid,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

impl Substation {
    /// Label derived from the first eight characters of the building id.
    pub fn label_for(building_id: Uuid) -> String {
        let simple = building_id.simple().to_string();
        format!("ITP-{}", &simple[..8])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColdWaterReading {
    pub substation_id: Uuid,
    /// m³/h
    pub flow_rate: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotWaterReading {
    pub building_id: Uuid,
    pub flow_rate_ch1: f64,
    pub flow_rate_ch2: f64,
    pub timestamp: DateTime<Utc>,
}

impl HotWaterReading {
    pub fn total_flow(&self) -> f64 {
        self.flow_rate_ch1 + self.flow_rate_ch2
    }
}

/// Supply/return temperature pair. `delta_temp` is fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub building_id: Uuid,
    pub supply_temp: f64,
    pub return_temp: f64,
    pub delta_temp: f64,
    pub timestamp: DateTime<Utc>,
}

impl TemperatureReading {
    pub fn new(
        building_id: Uuid,
        supply_temp: f64,
        return_temp: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            building_id,
            supply_temp,
            return_temp,
            delta_temp: supply_temp - return_temp,
            timestamp,
        }
    }
}

/// Maintenance state reported by a pump controller.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PumpStatus {
    #[default]
    Normal,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PumpReading {
    pub building_id: Uuid,
    pub pump_label: String,
    pub status: PumpStatus,
    pub operating_hours: u32,
    /// bar
    pub pressure_in: f64,
    /// bar
    pub pressure_out: f64,
    pub vibration_level: f64,
    pub timestamp: DateTime<Utc>,
}

/// Water totals and record counts for a building over a window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WaterAggregate {
    pub cold_total: f64,
    /// Sum of both hot-water channels.
    pub hot_total: f64,
    pub cold_count: u64,
    pub hot_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TemperatureStats {
    pub avg_supply: f64,
    pub avg_return: f64,
    pub avg_delta: f64,
    pub min_delta: f64,
    pub max_delta: f64,
    pub count: u64,
}

impl TemperatureStats {
    /// Fold a set of readings into window statistics.
    pub fn from_readings<'a, I>(readings: I) -> Self
    where
        I: IntoIterator<Item = &'a TemperatureReading>,
    {
        let mut stats = TemperatureStats {
            min_delta: f64::INFINITY,
            max_delta: f64::NEG_INFINITY,
            ..TemperatureStats::default()
        };
        let (mut supply, mut ret, mut delta) = (0.0, 0.0, 0.0);
        for reading in readings {
            supply += reading.supply_temp;
            ret += reading.return_temp;
            delta += reading.delta_temp;
            stats.min_delta = stats.min_delta.min(reading.delta_temp);
            stats.max_delta = stats.max_delta.max(reading.delta_temp);
            stats.count += 1;
        }
        if stats.count == 0 {
            return TemperatureStats::default();
        }
        let n = stats.count as f64;
        stats.avg_supply = supply / n;
        stats.avg_return = ret / n;
        stats.avg_delta = delta / n;
        stats
    }
}

/// Most recent reading of one pump within a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestPumpReading {
    pub label: String,
    pub status: PumpStatus,
    pub operating_hours: u32,
    pub pressure_in: f64,
    pub pressure_out: f64,
    pub vibration: f64,
    pub timestamp: DateTime<Utc>,
}

impl From<&PumpReading> for LatestPumpReading {
    fn from(reading: &PumpReading) -> Self {
        Self {
            label: reading.pump_label.clone(),
            status: reading.status,
            operating_hours: reading.operating_hours,
            pressure_in: reading.pressure_in,
            pressure_out: reading.pressure_out,
            vibration: reading.vibration_level,
            timestamp: reading.timestamp,
        }
    }
}

/// Per-kind record counts for a building, used by operator diagnostics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordCounts {
    pub building_id: Uuid,
    pub cold_water_records: u64,
    pub hot_water_records: u64,
    pub temperature_records: u64,
    pub pump_records: u64,
    pub latest_cold_water: Option<DateTime<Utc>>,
    pub latest_hot_water: Option<DateTime<Utc>>,
    pub latest_temperature: Option<DateTime<Utc>>,
    pub latest_pump: Option<DateTime<Utc>>,
}

impl RecordCounts {
    pub fn has_water_data(&self) -> bool {
        self.cold_water_records > 0 && self.hot_water_records > 0
    }
}
