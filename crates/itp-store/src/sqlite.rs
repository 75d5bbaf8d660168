//! ---
//! itp_section: "03-persistence"
//! itp_subsection: "module"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "SQLite-backed telemetry store."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
//! Timestamps are stored as unix milliseconds and identifiers as text.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::task;
use tracing::{debug, info};
use uuid::Uuid;

use crate::model::{
    Building, ColdWaterReading, HotWaterReading, LatestPumpReading, PumpReading, PumpStatus,
    RecordCounts, Substation, TemperatureReading, TemperatureStats, WaterAggregate,
};
use crate::{Result, StoreError, TelemetryStore};

const SCHEMA: &str = "
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS buildings (
        id          TEXT PRIMARY KEY,
        address     TEXT NOT NULL,
        fias_id     TEXT,
        unom_id     TEXT,
        created_at  INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS itp (
        id          TEXT PRIMARY KEY,
        building_id TEXT NOT NULL UNIQUE,
        label       TEXT NOT NULL,
        created_at  INTEGER NOT NULL,
        FOREIGN KEY (building_id) REFERENCES buildings(id)
    );

    CREATE TABLE IF NOT EXISTS cold_water_meters (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        itp_id      TEXT NOT NULL,
        flow_rate   REAL NOT NULL,
        ts          INTEGER NOT NULL,
        FOREIGN KEY (itp_id) REFERENCES itp(id)
    );

    CREATE INDEX IF NOT EXISTS idx_cold_water_itp_ts
        ON cold_water_meters(itp_id, ts);

    CREATE TABLE IF NOT EXISTS hot_water_meters (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        building_id   TEXT NOT NULL,
        flow_rate_ch1 REAL NOT NULL,
        flow_rate_ch2 REAL NOT NULL,
        ts            INTEGER NOT NULL,
        FOREIGN KEY (building_id) REFERENCES buildings(id)
    );

    CREATE INDEX IF NOT EXISTS idx_hot_water_building_ts
        ON hot_water_meters(building_id, ts);

    CREATE TABLE IF NOT EXISTS temperature_readings (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        building_id TEXT NOT NULL,
        supply_temp REAL NOT NULL,
        return_temp REAL NOT NULL,
        delta_temp  REAL NOT NULL,
        ts          INTEGER NOT NULL,
        FOREIGN KEY (building_id) REFERENCES buildings(id)
    );

    CREATE INDEX IF NOT EXISTS idx_temperature_building_ts
        ON temperature_readings(building_id, ts);

    CREATE TABLE IF NOT EXISTS pump_data (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        building_id     TEXT NOT NULL,
        pump_label      TEXT NOT NULL,
        status          TEXT NOT NULL,
        operating_hours INTEGER NOT NULL,
        pressure_in     REAL NOT NULL,
        pressure_out    REAL NOT NULL,
        vibration_level REAL NOT NULL,
        ts              INTEGER NOT NULL,
        FOREIGN KEY (building_id) REFERENCES buildings(id)
    );

    CREATE INDEX IF NOT EXISTS idx_pump_building_label_ts
        ON pump_data(building_id, pump_label, ts);
";

/// [`TelemetryStore`] persisted in a single SQLite file.
///
/// Statements run on the blocking pool so the async workers never wait on
/// disk I/O.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database file and apply the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self::with_connection(conn)?;
        info!(path = %path.display(), "sqlite telemetry store opened");
        Ok(store)
    }

    /// Private in-memory database, mainly for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        task::spawn_blocking(move || {
            let conn = conn.lock();
            op(&conn)
        })
        .await
        .map_err(|err| StoreError::Unavailable(format!("sqlite task failed: {err}")))?
    }
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp {ms} out of range")))
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|err| StoreError::Corrupt(format!("invalid id {raw}: {err}")))
}

fn to_count(raw: i64) -> u64 {
    u64::try_from(raw).unwrap_or(0)
}

fn substation_id(conn: &Connection, building_id: Uuid) -> Result<Option<Uuid>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT id FROM itp WHERE building_id = ?1",
            params![building_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    raw.as_deref().map(parse_uuid).transpose()
}

fn building_exists(conn: &Connection, building_id: Uuid) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM buildings WHERE id = ?1",
            params![building_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

type BuildingRow = (String, String, Option<String>, Option<String>, i64);

fn building_from_row(row: BuildingRow) -> Result<Building> {
    let (id, address, fias_id, unom_id, created_at) = row;
    Ok(Building {
        id: parse_uuid(&id)?,
        address,
        fias_id,
        unom_id,
        created_at: from_millis(created_at)?,
    })
}

fn count_and_latest(
    conn: &Connection,
    sql: &str,
    building_id: Uuid,
) -> Result<(u64, Option<DateTime<Utc>>)> {
    let (count, latest): (i64, Option<i64>) =
        conn.query_row(sql, params![building_id.to_string()], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?;
    Ok((to_count(count), latest.map(from_millis).transpose()?))
}

#[async_trait]
impl TelemetryStore for SqliteStore {
    async fn list_buildings(&self) -> Result<Vec<Building>> {
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, address, fias_id, unom_id, created_at FROM buildings ORDER BY created_at, id",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
                })?
                .collect::<rusqlite::Result<Vec<BuildingRow>>>()?;
            rows.into_iter().map(building_from_row).collect()
        })
        .await
    }

    async fn find_building(&self, building_id: Uuid) -> Result<Option<Building>> {
        self.run(move |conn| {
            let row: Option<BuildingRow> = conn
                .query_row(
                    "SELECT id, address, fias_id, unom_id, created_at FROM buildings WHERE id = ?1",
                    params![building_id.to_string()],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
                )
                .optional()?;
            row.map(building_from_row).transpose()
        })
        .await
    }

    async fn insert_building(&self, building: &Building) -> Result<()> {
        let building = building.clone();
        self.run(move |conn| {
            if building_exists(conn, building.id)? {
                return Err(StoreError::DuplicateBuilding(building.id));
            }
            conn.execute(
                "INSERT INTO buildings (id, address, fias_id, unom_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    building.id.to_string(),
                    building.address,
                    building.fias_id,
                    building.unom_id,
                    to_millis(building.created_at),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn ensure_substation(&self, building_id: Uuid) -> Result<Uuid> {
        self.run(move |conn| {
            if let Some(existing) = substation_id(conn, building_id)? {
                return Ok(existing);
            }
            if !building_exists(conn, building_id)? {
                return Err(StoreError::UnknownBuilding(building_id));
            }
            let id = Uuid::new_v4();
            conn.execute(
                "INSERT INTO itp (id, building_id, label, created_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(building_id) DO NOTHING",
                params![
                    id.to_string(),
                    building_id.to_string(),
                    Substation::label_for(building_id),
                    to_millis(Utc::now()),
                ],
            )?;
            let stored = substation_id(conn, building_id)?.ok_or_else(|| {
                StoreError::Corrupt(format!("substation for {building_id} vanished"))
            })?;
            debug!(building = %building_id, substation = %stored, "substation created");
            Ok(stored)
        })
        .await
    }

    async fn insert_cold_water(&self, reading: &ColdWaterReading) -> Result<()> {
        let reading = reading.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO cold_water_meters (itp_id, flow_rate, ts) VALUES (?1, ?2, ?3)",
                params![
                    reading.substation_id.to_string(),
                    reading.flow_rate,
                    to_millis(reading.timestamp),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn insert_hot_water(&self, reading: &HotWaterReading) -> Result<()> {
        let reading = reading.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO hot_water_meters (building_id, flow_rate_ch1, flow_rate_ch2, ts)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    reading.building_id.to_string(),
                    reading.flow_rate_ch1,
                    reading.flow_rate_ch2,
                    to_millis(reading.timestamp),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn insert_temperature(&self, reading: &TemperatureReading) -> Result<()> {
        let reading = reading.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO temperature_readings (building_id, supply_temp, return_temp, delta_temp, ts)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    reading.building_id.to_string(),
                    reading.supply_temp,
                    reading.return_temp,
                    reading.delta_temp,
                    to_millis(reading.timestamp),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn insert_pump(&self, reading: &PumpReading) -> Result<()> {
        let reading = reading.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO pump_data (building_id, pump_label, status, operating_hours,
                                        pressure_in, pressure_out, vibration_level, ts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    reading.building_id.to_string(),
                    reading.pump_label,
                    reading.status.as_ref(),
                    reading.operating_hours,
                    reading.pressure_in,
                    reading.pressure_out,
                    reading.vibration_level,
                    to_millis(reading.timestamp),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn query_aggregate(
        &self,
        building_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<WaterAggregate> {
        self.run(move |conn| {
            let building = building_id.to_string();
            let (from, to) = (to_millis(start), to_millis(end));
            let (cold_total, cold_count): (f64, i64) = conn.query_row(
                "SELECT COALESCE(SUM(c.flow_rate), 0.0), COUNT(c.id)
                 FROM cold_water_meters c
                 JOIN itp i ON c.itp_id = i.id
                 WHERE i.building_id = ?1 AND c.ts BETWEEN ?2 AND ?3",
                params![building, from, to],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            let (hot_total, hot_count): (f64, i64) = conn.query_row(
                "SELECT COALESCE(SUM(flow_rate_ch1 + flow_rate_ch2), 0.0), COUNT(id)
                 FROM hot_water_meters
                 WHERE building_id = ?1 AND ts BETWEEN ?2 AND ?3",
                params![building, from, to],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok(WaterAggregate {
                cold_total,
                hot_total,
                cold_count: to_count(cold_count),
                hot_count: to_count(hot_count),
            })
        })
        .await
    }

    async fn query_temperature_stats(
        &self,
        building_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<TemperatureStats> {
        self.run(move |conn| {
            let row: (i64, Option<f64>, Option<f64>, Option<f64>, Option<f64>, Option<f64>) = conn
                .query_row(
                    "SELECT COUNT(id), AVG(supply_temp), AVG(return_temp), AVG(delta_temp),
                            MIN(delta_temp), MAX(delta_temp)
                     FROM temperature_readings
                     WHERE building_id = ?1 AND ts BETWEEN ?2 AND ?3",
                    params![building_id.to_string(), to_millis(start), to_millis(end)],
                    |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                        ))
                    },
                )?;
            let (count, avg_supply, avg_return, avg_delta, min_delta, max_delta) = row;
            if count == 0 {
                return Ok(TemperatureStats::default());
            }
            Ok(TemperatureStats {
                avg_supply: avg_supply.unwrap_or_default(),
                avg_return: avg_return.unwrap_or_default(),
                avg_delta: avg_delta.unwrap_or_default(),
                min_delta: min_delta.unwrap_or_default(),
                max_delta: max_delta.unwrap_or_default(),
                count: to_count(count),
            })
        })
        .await
    }

    async fn query_latest_pump_readings(
        &self,
        building_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<LatestPumpReading>> {
        type PumpRow = (String, String, u32, f64, f64, f64, i64);
        self.run(move |conn| {
            // SQLite returns the bare columns of the row holding MAX(ts).
            let mut stmt = conn.prepare(
                "SELECT pump_label, status, operating_hours, pressure_in, pressure_out,
                        vibration_level, MAX(ts)
                 FROM pump_data
                 WHERE building_id = ?1 AND ts BETWEEN ?2 AND ?3
                 GROUP BY pump_label
                 ORDER BY pump_label",
            )?;
            let rows = stmt
                .query_map(
                    params![building_id.to_string(), to_millis(start), to_millis(end)],
                    |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                            row.get(6)?,
                        ))
                    },
                )?
                .collect::<rusqlite::Result<Vec<PumpRow>>>()?;
            rows.into_iter()
                .map(
                    |(label, status, hours, pressure_in, pressure_out, vibration, ts)| {
                        let status = PumpStatus::from_str(&status).map_err(|_| {
                            StoreError::Corrupt(format!("unknown pump status {status}"))
                        })?;
                        Ok(LatestPumpReading {
                            label,
                            status,
                            operating_hours: hours,
                            pressure_in,
                            pressure_out,
                            vibration,
                            timestamp: from_millis(ts)?,
                        })
                    },
                )
                .collect()
        })
        .await
    }

    async fn record_counts(&self, building_id: Uuid) -> Result<RecordCounts> {
        self.run(move |conn| {
            let (cold_water_records, latest_cold_water) = count_and_latest(
                conn,
                "SELECT COUNT(c.id), MAX(c.ts) FROM cold_water_meters c
                 JOIN itp i ON c.itp_id = i.id WHERE i.building_id = ?1",
                building_id,
            )?;
            let (hot_water_records, latest_hot_water) = count_and_latest(
                conn,
                "SELECT COUNT(id), MAX(ts) FROM hot_water_meters WHERE building_id = ?1",
                building_id,
            )?;
            let (temperature_records, latest_temperature) = count_and_latest(
                conn,
                "SELECT COUNT(id), MAX(ts) FROM temperature_readings WHERE building_id = ?1",
                building_id,
            )?;
            let (pump_records, latest_pump) = count_and_latest(
                conn,
                "SELECT COUNT(id), MAX(ts) FROM pump_data WHERE building_id = ?1",
                building_id,
            )?;
            Ok(RecordCounts {
                building_id,
                cold_water_records,
                hot_water_records,
                temperature_records,
                pump_records,
                latest_cold_water,
                latest_hot_water,
                latest_temperature,
                latest_pump,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_conversion_is_lossless_for_millisecond_timestamps() {
        let ts = DateTime::from_timestamp_millis(1_714_000_000_123).unwrap();
        assert_eq!(from_millis(to_millis(ts)).unwrap(), ts);
    }

    #[test]
    fn corrupt_ids_are_reported() {
        assert!(matches!(parse_uuid("not-a-uuid"), Err(StoreError::Corrupt(_))));
    }
}
