//! ---
//! itp_section: "11-simulation"
//! itp_subsection: "module"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "Demo building seeding and historical data backfill."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Datelike, Duration, Local, Timelike, Utc};
use itp_common::time::elapsed_days;
use itp_sim::{building_key, SyntheticModel};
use itp_store::{Building, TelemetryStore, TemperatureReading};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::workers::{
    cold_water_reading, hot_water_reading, pump_reading, KIND_COLD_WATER, KIND_HOT_WATER, KIND_PUMP,
    KIND_TEMPERATURE,
};

/// Local hour at which the daily pump snapshot is written.
const PUMP_SNAPSHOT_HOUR: u32 = 12;
const TEMPERATURE_EVERY_HOURS: u32 = 4;

struct DemoBuilding {
    id: u128,
    address: &'static str,
    fias_id: &'static str,
    unom_id: &'static str,
}

const DEMO_BUILDINGS: [DemoBuilding; 3] = [
    DemoBuilding {
        id: 0x11111111_1111_1111_1111_111111111111,
        address: "Moscow, Lenina St. 10",
        fias_id: "fias-001",
        unom_id: "unom-1001",
    },
    DemoBuilding {
        id: 0x22222222_2222_2222_2222_222222222222,
        address: "Moscow, Mira Ave. 25",
        fias_id: "fias-002",
        unom_id: "unom-1002",
    },
    DemoBuilding {
        id: 0x33333333_3333_3333_3333_333333333333,
        address: "Moscow, Gagarina St. 15",
        fias_id: "fias-003",
        unom_id: "unom-1003",
    },
];

/// Ids of the buildings created by [`seed_demo_buildings`].
pub fn demo_building_ids() -> Vec<Uuid> {
    DEMO_BUILDINGS
        .iter()
        .map(|demo| Uuid::from_u128(demo.id))
        .collect()
}

/// Insert the demo buildings and their substations into an empty store.
/// Returns the number of buildings created; zero when the store already
/// holds buildings.
pub async fn seed_demo_buildings(store: &dyn TelemetryStore) -> Result<usize> {
    let existing = store
        .list_buildings()
        .await
        .context("failed to list buildings before seeding")?;
    if !existing.is_empty() {
        info!(buildings = existing.len(), "buildings already present, skipping demo seed");
        return Ok(0);
    }

    let now = Utc::now();
    for demo in &DEMO_BUILDINGS {
        let mut building = Building::new(Uuid::from_u128(demo.id), demo.address, now);
        building.fias_id = Some(demo.fias_id.to_owned());
        building.unom_id = Some(demo.unom_id.to_owned());
        store
            .insert_building(&building)
            .await
            .with_context(|| format!("failed to insert demo building {}", demo.address))?;
        if let Err(err) = store.ensure_substation(building.id).await {
            warn!(building_id = %building.id, error = %err, "failed to create substation for demo building");
        }
    }
    info!(buildings = DEMO_BUILDINGS.len(), "demo buildings created");
    Ok(DEMO_BUILDINGS.len())
}

/// Outcome of a history backfill.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillSummary {
    pub buildings: usize,
    /// Buildings skipped because their substation could not be bootstrapped.
    pub skipped_buildings: usize,
    pub written: u64,
    pub failed: u64,
}

impl BackfillSummary {
    fn tally(&mut self, building_id: Uuid, kind: &str, result: itp_store::Result<()>) {
        match result {
            Ok(()) => self.written += 1,
            Err(err) => {
                warn!(building_id = %building_id, kind, error = %err, "backfill write failed");
                self.failed += 1;
            }
        }
    }
}

/// Write `days` days of hourly history ending at `now` for every building:
/// water every hour, temperature every four hours and one pump snapshot per
/// day at local noon.
pub async fn backfill_history(
    store: &dyn TelemetryStore,
    model: &mut SyntheticModel,
    days: u32,
    now: DateTime<Utc>,
) -> Result<BackfillSummary> {
    let buildings = store
        .list_buildings()
        .await
        .context("failed to list buildings for backfill")?;
    if buildings.is_empty() {
        bail!("no buildings found to backfill");
    }

    let hours = i64::from(days) * 24;
    let mut summary = BackfillSummary {
        buildings: buildings.len(),
        ..BackfillSummary::default()
    };
    info!(buildings = buildings.len(), days, "backfilling history");

    for building in &buildings {
        let substation = match store.ensure_substation(building.id).await {
            Ok(id) => id,
            Err(err) => {
                warn!(building_id = %building.id, error = %err, "substation bootstrap failed, skipping building");
                summary.skipped_buildings += 1;
                continue;
            }
        };
        let key = building_key(building.id);

        for offset in (1..=hours).rev() {
            let timestamp = now - Duration::hours(offset);
            let local_hour = timestamp.with_timezone(&Local).hour();

            let sample = model.water(local_hour);
            let hot = hot_water_reading(building.id, &sample, timestamp);
            summary.tally(building.id, KIND_HOT_WATER, store.insert_hot_water(&hot).await);
            let cold = cold_water_reading(substation, &sample, timestamp);
            summary.tally(building.id, KIND_COLD_WATER, store.insert_cold_water(&cold).await);

            if local_hour % TEMPERATURE_EVERY_HOURS == 0 {
                let month = timestamp.with_timezone(&Local).month();
                let temp = model.temperature(month);
                let reading =
                    TemperatureReading::new(building.id, temp.supply, temp.return_temp, timestamp);
                summary.tally(
                    building.id,
                    KIND_TEMPERATURE,
                    store.insert_temperature(&reading).await,
                );
            }

            if local_hour == PUMP_SNAPSHOT_HOUR {
                let age_days = elapsed_days(building.created_at, timestamp);
                for pump in model.pumps(key, age_days) {
                    let reading = pump_reading(building.id, pump, timestamp);
                    summary.tally(building.id, KIND_PUMP, store.insert_pump(&reading).await);
                }
            }
        }
    }

    info!(
        written = summary.written,
        failed = summary.failed,
        skipped_buildings = summary.skipped_buildings,
        "history backfill complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use itp_store::InMemoryStore;

    #[tokio::test]
    async fn demo_seed_only_runs_on_empty_store() {
        let store = InMemoryStore::new();
        assert_eq!(seed_demo_buildings(&store).await.unwrap(), 3);
        assert_eq!(seed_demo_buildings(&store).await.unwrap(), 0);

        let buildings = store.list_buildings().await.unwrap();
        let mut ids: Vec<Uuid> = buildings.iter().map(|b| b.id).collect();
        ids.sort();
        assert_eq!(ids, demo_building_ids());
        assert_eq!(store.substations().len(), 3);
        assert!(buildings.iter().all(|b| b.unom_id.is_some()));
    }

    #[tokio::test]
    async fn backfill_requires_buildings() {
        let store = InMemoryStore::new();
        let mut model = SyntheticModel::new(1);
        assert!(backfill_history(&store, &mut model, 1, Utc::now())
            .await
            .is_err());
    }
}
