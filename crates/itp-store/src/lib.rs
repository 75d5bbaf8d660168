//! ---
//! itp_section: "03-persistence"
//! itp_subsection: "module"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "Telemetry store abstraction and storage bindings."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
//! Time-series storage for substation telemetry.
//!
//! The analyzer reads through the aggregate queries of [`TelemetryStore`]; the
//! generator writes through its insert operations. Readings are append-only.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use itp_common::config::{StoreBackend, StoreConfig};
use uuid::Uuid;

/// Result alias used throughout the store crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Error type for the storage subsystem.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Wrapper for SQLite failures.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Wrapper for IO errors while preparing the database location.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The referenced building does not exist.
    #[error("building {0} not found")]
    UnknownBuilding(Uuid),
    /// A building with the same id already exists.
    #[error("building {0} already exists")]
    DuplicateBuilding(Uuid),
    /// A stored row could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
    /// Backend not reachable or misconfigured.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub mod memory;
pub mod model;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use model::{
    Building, ColdWaterReading, HotWaterReading, LatestPumpReading, PumpReading, PumpStatus,
    RecordCounts, Substation, TemperatureReading, TemperatureStats, WaterAggregate,
};
pub use sqlite::SqliteStore;

/// Read and write interface of the time-series store.
///
/// Range queries include both `start` and `end`.
#[async_trait]
pub trait TelemetryStore: Send + Sync + std::fmt::Debug {
    /// All known buildings.
    async fn list_buildings(&self) -> Result<Vec<Building>>;

    /// Look up one building.
    async fn find_building(&self, building_id: Uuid) -> Result<Option<Building>>;

    /// Register a building. Buildings are normally created outside the monitor;
    /// this exists for demo seeding.
    async fn insert_building(&self, building: &Building) -> Result<()>;

    /// Return the building's substation id, creating the substation when missing.
    /// Never creates a second substation for the same building.
    async fn ensure_substation(&self, building_id: Uuid) -> Result<Uuid>;

    /// Append a cold-water reading.
    async fn insert_cold_water(&self, reading: &ColdWaterReading) -> Result<()>;

    /// Append a hot-water reading.
    async fn insert_hot_water(&self, reading: &HotWaterReading) -> Result<()>;

    /// Append a temperature reading.
    async fn insert_temperature(&self, reading: &TemperatureReading) -> Result<()>;

    /// Append a pump reading.
    async fn insert_pump(&self, reading: &PumpReading) -> Result<()>;

    /// Water totals and counts for the window.
    async fn query_aggregate(
        &self,
        building_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<WaterAggregate>;

    /// Temperature statistics for the window.
    async fn query_temperature_stats(
        &self,
        building_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<TemperatureStats>;

    /// Most recent reading per pump label in the window, ordered by label.
    async fn query_latest_pump_readings(
        &self,
        building_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LatestPumpReading>>;

    /// Record counts over the whole history of a building.
    async fn record_counts(&self, building_id: Uuid) -> Result<RecordCounts>;
}

/// Open the backend selected by configuration.
pub fn open(config: &StoreConfig) -> Result<Arc<dyn TelemetryStore>> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryStore::new())),
        StoreBackend::Sqlite => {
            let path = config.path.as_ref().ok_or_else(|| {
                StoreError::Unavailable("sqlite backend requires store.path".to_owned())
            })?;
            Ok(Arc::new(SqliteStore::open(path)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_are_readable() {
        let err = StoreError::UnknownBuilding(Uuid::nil());
        assert_eq!(
            format!("{err}"),
            "building 00000000-0000-0000-0000-000000000000 not found"
        );
    }

    #[test]
    fn sqlite_backend_requires_path() {
        let config = StoreConfig {
            backend: StoreBackend::Sqlite,
            path: None,
        };
        assert!(matches!(open(&config), Err(StoreError::Unavailable(_))));
    }
}
