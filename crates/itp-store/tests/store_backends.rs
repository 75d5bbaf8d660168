//! ---
//! itp_section: "15-testing-qa-runbook"
//! itp_subsection: "integration-tests"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "Behaviour shared by every telemetry store backend."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use itp_store::{
    Building, ColdWaterReading, HotWaterReading, InMemoryStore, PumpReading, PumpStatus,
    SqliteStore, StoreError, TelemetryStore, TemperatureReading,
};
use uuid::Uuid;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
}

fn backends() -> Vec<(&'static str, Arc<dyn TelemetryStore>)> {
    vec![
        ("memory", Arc::new(InMemoryStore::new())),
        ("sqlite", Arc::new(SqliteStore::open_in_memory().unwrap())),
    ]
}

async fn seeded(store: &dyn TelemetryStore) -> Uuid {
    let building = Building::new(Uuid::new_v4(), "1 Test Street", t0());
    store.insert_building(&building).await.unwrap();
    building.id
}

fn pump(building_id: Uuid, label: &str, status: PumpStatus, hours: u32, ts: DateTime<Utc>) -> PumpReading {
    PumpReading {
        building_id,
        pump_label: label.to_owned(),
        status,
        operating_hours: hours,
        pressure_in: 3.0,
        pressure_out: 5.0,
        vibration_level: 2.0,
        timestamp: ts,
    }
}

#[tokio::test]
async fn ensure_substation_is_idempotent() {
    for (name, store) in backends() {
        let building = seeded(store.as_ref()).await;
        let first = store.ensure_substation(building).await.unwrap();
        let second = store.ensure_substation(building).await.unwrap();
        assert_eq!(first, second, "backend {name}");
    }
}

#[tokio::test]
async fn ensure_substation_rejects_unknown_building() {
    for (name, store) in backends() {
        let err = store.ensure_substation(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownBuilding(_)), "backend {name}: {err}");
    }
}

#[tokio::test]
async fn duplicate_building_is_rejected() {
    for (name, store) in backends() {
        let building = Building::new(Uuid::new_v4(), "2 Test Street", t0());
        store.insert_building(&building).await.unwrap();
        let err = store.insert_building(&building).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateBuilding(_)), "backend {name}");
        assert_eq!(store.list_buildings().await.unwrap().len(), 1);
        assert_eq!(
            store.find_building(building.id).await.unwrap().map(|b| b.address),
            Some("2 Test Street".to_owned())
        );
    }
}

#[tokio::test]
async fn aggregate_window_is_inclusive() {
    for (name, store) in backends() {
        let building = seeded(store.as_ref()).await;
        let substation = store.ensure_substation(building).await.unwrap();
        let start = t0();
        let end = t0() + Duration::hours(2);
        for (offset, flow) in [(-1, 100.0), (0, 5.0), (60, 6.0), (120, 7.0), (121, 100.0)] {
            let ts = start + Duration::minutes(offset);
            store
                .insert_cold_water(&ColdWaterReading {
                    substation_id: substation,
                    flow_rate: flow,
                    timestamp: ts,
                })
                .await
                .unwrap();
            store
                .insert_hot_water(&HotWaterReading {
                    building_id: building,
                    flow_rate_ch1: flow / 2.0,
                    flow_rate_ch2: 1.0,
                    timestamp: ts,
                })
                .await
                .unwrap();
        }

        let aggregate = store.query_aggregate(building, start, end).await.unwrap();
        assert_eq!(aggregate.cold_count, 3, "backend {name}");
        assert_eq!(aggregate.hot_count, 3, "backend {name}");
        assert!((aggregate.cold_total - 18.0).abs() < 1e-9, "backend {name}");
        assert!((aggregate.hot_total - 12.0).abs() < 1e-9, "backend {name}");
    }
}

#[tokio::test]
async fn aggregate_without_substation_is_empty() {
    for (name, store) in backends() {
        let building = seeded(store.as_ref()).await;
        let aggregate = store
            .query_aggregate(building, t0() - Duration::days(1), t0())
            .await
            .unwrap();
        assert_eq!(aggregate.cold_count, 0, "backend {name}");
        assert_eq!(aggregate.cold_total, 0.0, "backend {name}");
    }
}

#[tokio::test]
async fn temperature_stats_average_the_window() {
    for (name, store) in backends() {
        let building = seeded(store.as_ref()).await;
        for (hour, supply, ret) in [(0, 70.0, 50.0), (1, 66.0, 44.0), (30, 90.0, 10.0)] {
            store
                .insert_temperature(&TemperatureReading::new(
                    building,
                    supply,
                    ret,
                    t0() + Duration::hours(hour),
                ))
                .await
                .unwrap();
        }
        let stats = store
            .query_temperature_stats(building, t0(), t0() + Duration::hours(2))
            .await
            .unwrap();
        assert_eq!(stats.count, 2, "backend {name}");
        assert!((stats.avg_delta - 21.0).abs() < 1e-9, "backend {name}");
        assert!((stats.avg_supply - 68.0).abs() < 1e-9, "backend {name}");
        assert_eq!(stats.min_delta, 20.0, "backend {name}");
        assert_eq!(stats.max_delta, 22.0, "backend {name}");

        let empty = store
            .query_temperature_stats(building, t0() - Duration::days(3), t0() - Duration::days(2))
            .await
            .unwrap();
        assert_eq!(empty.count, 0, "backend {name}");
    }
}

#[tokio::test]
async fn latest_pump_reading_wins_per_label() {
    for (name, store) in backends() {
        let building = seeded(store.as_ref()).await;
        let readings = [
            pump(building, "Pump-2", PumpStatus::Normal, 6000, t0()),
            pump(building, "Pump-1", PumpStatus::Normal, 5000, t0()),
            pump(building, "Pump-1", PumpStatus::Critical, 5024, t0() + Duration::hours(1)),
            pump(building, "Pump-2", PumpStatus::Warning, 9999, t0() + Duration::days(5)),
        ];
        for reading in &readings {
            store.insert_pump(reading).await.unwrap();
        }

        let latest = store
            .query_latest_pump_readings(building, t0(), t0() + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(latest.len(), 2, "backend {name}");
        assert_eq!(latest[0].label, "Pump-1");
        assert_eq!(latest[0].status, PumpStatus::Critical, "backend {name}");
        assert_eq!(latest[0].operating_hours, 5024, "backend {name}");
        assert_eq!(latest[1].label, "Pump-2");
        assert_eq!(latest[1].status, PumpStatus::Normal, "backend {name}");
    }
}

#[tokio::test]
async fn record_counts_cover_whole_history() {
    for (name, store) in backends() {
        let building = seeded(store.as_ref()).await;
        let substation = store.ensure_substation(building).await.unwrap();
        for day in 0..3 {
            store
                .insert_cold_water(&ColdWaterReading {
                    substation_id: substation,
                    flow_rate: 8.0,
                    timestamp: t0() - Duration::days(day * 100),
                })
                .await
                .unwrap();
        }
        store
            .insert_pump(&pump(building, "Pump-1", PumpStatus::Normal, 5000, t0()))
            .await
            .unwrap();

        let counts = store.record_counts(building).await.unwrap();
        assert_eq!(counts.cold_water_records, 3, "backend {name}");
        assert_eq!(counts.hot_water_records, 0, "backend {name}");
        assert_eq!(counts.pump_records, 1, "backend {name}");
        assert_eq!(counts.latest_cold_water, Some(t0()), "backend {name}");
        assert_eq!(counts.latest_hot_water, None, "backend {name}");
        assert!(!counts.has_water_data());
    }
}

#[tokio::test]
async fn sqlite_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("itp.db");
    let building = {
        let store = SqliteStore::open(&path).unwrap();
        let building = seeded(&store).await;
        store.ensure_substation(building).await.unwrap();
        building
    };
    let reopened = SqliteStore::open(&path).unwrap();
    let buildings = reopened.list_buildings().await.unwrap();
    assert_eq!(buildings.len(), 1);
    assert_eq!(buildings[0].id, building);
    assert_eq!(buildings[0].created_at, t0());
    let substation = reopened.ensure_substation(building).await.unwrap();
    assert_eq!(reopened.ensure_substation(building).await.unwrap(), substation);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sqlite_writers_share_one_connection_across_tasks() {
    let store = SqliteStore::open_in_memory().unwrap();
    let building = seeded(&store).await;

    let mut writers = Vec::new();
    for worker in 0..4 {
        let store = store.clone();
        writers.push(tokio::spawn(async move {
            for step in 0..25 {
                store
                    .insert_hot_water(&HotWaterReading {
                        building_id: building,
                        flow_rate_ch1: 3.0,
                        flow_rate_ch2: 2.0,
                        timestamp: t0() - Duration::minutes(worker * 100 + step),
                    })
                    .await
                    .unwrap();
            }
        }));
    }
    for writer in writers {
        writer.await.unwrap();
    }

    let counts = store.record_counts(building).await.unwrap();
    assert_eq!(counts.hot_water_records, 100);
    assert_eq!(counts.latest_hot_water, Some(t0()));
}
