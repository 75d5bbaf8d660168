//! ---
//! itp_section: "03-persistence"
//! itp_subsection: "module"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "Process-local telemetry store used by tests and demos."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::model::{
    Building, ColdWaterReading, HotWaterReading, LatestPumpReading, PumpReading, RecordCounts,
    Substation, TemperatureReading, TemperatureStats, WaterAggregate,
};
use crate::{Result, StoreError, TelemetryStore};

#[derive(Debug, Default)]
struct Inner {
    buildings: Vec<Building>,
    substations: Vec<Substation>,
    cold_water: Vec<ColdWaterReading>,
    hot_water: Vec<HotWaterReading>,
    temperature: Vec<TemperatureReading>,
    pumps: Vec<PumpReading>,
}

impl Inner {
    fn has_building(&self, building_id: Uuid) -> bool {
        self.buildings.iter().any(|b| b.id == building_id)
    }

    fn substation_of(&self, building_id: Uuid) -> Option<&Substation> {
        self.substations
            .iter()
            .find(|s| s.building_id == building_id)
    }
}

fn within(ts: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    ts >= start && ts <= end
}

/// In-memory [`TelemetryStore`]. All data is lost when the process exits.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn substations(&self) -> Vec<Substation> {
        self.inner.read().substations.clone()
    }

    pub fn cold_water_readings(&self, substation_id: Uuid) -> Vec<ColdWaterReading> {
        self.inner
            .read()
            .cold_water
            .iter()
            .filter(|r| r.substation_id == substation_id)
            .cloned()
            .collect()
    }

    pub fn hot_water_readings(&self, building_id: Uuid) -> Vec<HotWaterReading> {
        self.inner
            .read()
            .hot_water
            .iter()
            .filter(|r| r.building_id == building_id)
            .cloned()
            .collect()
    }

    pub fn temperature_readings(&self, building_id: Uuid) -> Vec<TemperatureReading> {
        self.inner
            .read()
            .temperature
            .iter()
            .filter(|r| r.building_id == building_id)
            .cloned()
            .collect()
    }

    pub fn pump_readings(&self, building_id: Uuid) -> Vec<PumpReading> {
        self.inner
            .read()
            .pumps
            .iter()
            .filter(|r| r.building_id == building_id)
            .cloned()
            .collect()
    }

    /// Number of readings of every kind across all buildings.
    pub fn total_readings(&self) -> usize {
        let inner = self.inner.read();
        inner.cold_water.len() + inner.hot_water.len() + inner.temperature.len() + inner.pumps.len()
    }
}

#[async_trait]
impl TelemetryStore for InMemoryStore {
    async fn list_buildings(&self) -> Result<Vec<Building>> {
        Ok(self.inner.read().buildings.clone())
    }

    async fn find_building(&self, building_id: Uuid) -> Result<Option<Building>> {
        Ok(self
            .inner
            .read()
            .buildings
            .iter()
            .find(|b| b.id == building_id)
            .cloned())
    }

    async fn insert_building(&self, building: &Building) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.has_building(building.id) {
            return Err(StoreError::DuplicateBuilding(building.id));
        }
        inner.buildings.push(building.clone());
        Ok(())
    }

    async fn ensure_substation(&self, building_id: Uuid) -> Result<Uuid> {
        let mut inner = self.inner.write();
        if let Some(existing) = inner.substation_of(building_id) {
            return Ok(existing.id);
        }
        if !inner.has_building(building_id) {
            return Err(StoreError::UnknownBuilding(building_id));
        }
        let substation = Substation {
            id: Uuid::new_v4(),
            building_id,
            label: Substation::label_for(building_id),
            created_at: Utc::now(),
        };
        let id = substation.id;
        inner.substations.push(substation);
        tracing::debug!(building = %building_id, substation = %id, "substation created");
        Ok(id)
    }

    async fn insert_cold_water(&self, reading: &ColdWaterReading) -> Result<()> {
        self.inner.write().cold_water.push(reading.clone());
        Ok(())
    }

    async fn insert_hot_water(&self, reading: &HotWaterReading) -> Result<()> {
        self.inner.write().hot_water.push(reading.clone());
        Ok(())
    }

    async fn insert_temperature(&self, reading: &TemperatureReading) -> Result<()> {
        self.inner.write().temperature.push(reading.clone());
        Ok(())
    }

    async fn insert_pump(&self, reading: &PumpReading) -> Result<()> {
        self.inner.write().pumps.push(reading.clone());
        Ok(())
    }

    async fn query_aggregate(
        &self,
        building_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<WaterAggregate> {
        let inner = self.inner.read();
        let mut aggregate = WaterAggregate::default();
        if let Some(substation) = inner.substation_of(building_id) {
            for reading in inner
                .cold_water
                .iter()
                .filter(|r| r.substation_id == substation.id && within(r.timestamp, start, end))
            {
                aggregate.cold_total += reading.flow_rate;
                aggregate.cold_count += 1;
            }
        }
        for reading in inner
            .hot_water
            .iter()
            .filter(|r| r.building_id == building_id && within(r.timestamp, start, end))
        {
            aggregate.hot_total += reading.total_flow();
            aggregate.hot_count += 1;
        }
        Ok(aggregate)
    }

    async fn query_temperature_stats(
        &self,
        building_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<TemperatureStats> {
        let inner = self.inner.read();
        Ok(TemperatureStats::from_readings(
            inner
                .temperature
                .iter()
                .filter(|r| r.building_id == building_id && within(r.timestamp, start, end)),
        ))
    }

    async fn query_latest_pump_readings(
        &self,
        building_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LatestPumpReading>> {
        let inner = self.inner.read();
        let mut latest: BTreeMap<&str, &PumpReading> = BTreeMap::new();
        for reading in inner
            .pumps
            .iter()
            .filter(|r| r.building_id == building_id && within(r.timestamp, start, end))
        {
            latest
                .entry(reading.pump_label.as_str())
                .and_modify(|current| {
                    if reading.timestamp >= current.timestamp {
                        *current = reading;
                    }
                })
                .or_insert(reading);
        }
        Ok(latest.into_values().map(LatestPumpReading::from).collect())
    }

    async fn record_counts(&self, building_id: Uuid) -> Result<RecordCounts> {
        let inner = self.inner.read();
        let mut counts = RecordCounts {
            building_id,
            ..RecordCounts::default()
        };
        if let Some(substation) = inner.substation_of(building_id) {
            let cold = inner
                .cold_water
                .iter()
                .filter(|r| r.substation_id == substation.id);
            for reading in cold {
                counts.cold_water_records += 1;
                counts.latest_cold_water = counts.latest_cold_water.max(Some(reading.timestamp));
            }
        }
        for reading in inner.hot_water.iter().filter(|r| r.building_id == building_id) {
            counts.hot_water_records += 1;
            counts.latest_hot_water = counts.latest_hot_water.max(Some(reading.timestamp));
        }
        for reading in inner
            .temperature
            .iter()
            .filter(|r| r.building_id == building_id)
        {
            counts.temperature_records += 1;
            counts.latest_temperature = counts.latest_temperature.max(Some(reading.timestamp));
        }
        for reading in inner.pumps.iter().filter(|r| r.building_id == building_id) {
            counts.pump_records += 1;
            counts.latest_pump = counts.latest_pump.max(Some(reading.timestamp));
        }
        Ok(counts)
    }
}
