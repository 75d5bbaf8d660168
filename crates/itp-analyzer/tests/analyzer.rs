//! ---
//! itp_section: "15-testing-qa-runbook"
//! itp_subsection: "integration-tests"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "Consumption analyzer integration tests."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use itp_analyzer::{
    AnalyzerError, ConsumptionAnalyzer, DataSource, PumpHealth, TemperatureStatus,
    WaterBalanceStatus,
};
use itp_common::AnalyzerConfig;
use itp_store::{
    Building, ColdWaterReading, HotWaterReading, InMemoryStore, LatestPumpReading, PumpReading,
    PumpStatus, RecordCounts, StoreError, TelemetryStore, TemperatureReading, TemperatureStats,
    WaterAggregate,
};
use uuid::Uuid;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
}

async fn store_with_building() -> (Arc<InMemoryStore>, Uuid, Uuid) {
    let store = Arc::new(InMemoryStore::new());
    let building = Building::new(Uuid::new_v4(), "5 Analyzer Lane", now() - Duration::days(400));
    store.insert_building(&building).await.unwrap();
    let substation = store.ensure_substation(building.id).await.unwrap();
    (store, building.id, substation)
}

async fn write_water(
    store: &InMemoryStore,
    building: Uuid,
    substation: Uuid,
    hours: i64,
    cold: f64,
    hot: (f64, f64),
) {
    for hour in 0..hours {
        let ts = now() - Duration::hours(hour);
        store
            .insert_cold_water(&ColdWaterReading {
                substation_id: substation,
                flow_rate: cold,
                timestamp: ts,
            })
            .await
            .unwrap();
        store
            .insert_hot_water(&HotWaterReading {
                building_id: building,
                flow_rate_ch1: hot.0,
                flow_rate_ch2: hot.1,
                timestamp: ts,
            })
            .await
            .unwrap();
    }
}

fn analyzer(store: Arc<dyn TelemetryStore>) -> ConsumptionAnalyzer {
    ConsumptionAnalyzer::new(store, AnalyzerConfig::default())
}

#[tokio::test]
async fn healthy_building_is_normal_across_domains() {
    let (store, building, substation) = store_with_building().await;
    write_water(&store, building, substation, 24, 10.0, (3.0, 2.5)).await;
    for hour in (0..24).step_by(4) {
        store
            .insert_temperature(&TemperatureReading::new(
                building,
                67.5,
                47.0,
                now() - Duration::hours(hour),
            ))
            .await
            .unwrap();
    }
    for label in ["Pump-1", "Pump-2"] {
        store
            .insert_pump(&PumpReading {
                building_id: building,
                pump_label: label.to_owned(),
                status: PumpStatus::Normal,
                operating_hours: 7200,
                pressure_in: 3.0,
                pressure_out: 5.0,
                vibration_level: 1.5,
                timestamp: now() - Duration::hours(1),
            })
            .await
            .unwrap();
    }

    let report = analyzer(store).analyze_at(building, 1, now()).await.unwrap();
    assert_eq!(report.data_source, DataSource::Database);
    assert_eq!(report.water_balance_status, WaterBalanceStatus::Normal);
    assert_eq!(report.temperature.status, TemperatureStatus::Normal);
    assert_eq!(report.pumps.status, PumpHealth::Normal);
    assert_eq!(report.pump_operating_hours(), 7200);
    assert_eq!(report.cold_records, 24);
    assert!((report.hot_to_cold_ratio_percent - 55.0).abs() < 1e-9);
    assert!(!report.has_anomalies);
    assert_eq!(report.recommendations, vec!["System operating normally".to_owned()]);
}

#[tokio::test]
async fn sparse_cold_meter_produces_estimated_report() {
    let (store, building, substation) = store_with_building().await;
    write_water(&store, building, substation, 3, 1.0, (20.0, 20.0)).await;
    for hour in 3..10 {
        store
            .insert_hot_water(&HotWaterReading {
                building_id: building,
                flow_rate_ch1: 20.0,
                flow_rate_ch2: 20.0,
                timestamp: now() - Duration::hours(hour),
            })
            .await
            .unwrap();
    }

    let report = analyzer(store).analyze_at(building, 7, now()).await.unwrap();
    assert_eq!(report.cold_records, 3);
    assert_eq!(report.hot_records, 10);
    assert_eq!(report.data_source, DataSource::Estimated);
    assert!(report.is_estimated());
    assert!(!report.has_anomalies);
    assert_eq!(report.water_balance_status, WaterBalanceStatus::Unknown);
    assert_eq!(report.temperature.status, TemperatureStatus::Unknown);
    assert_eq!(report.pumps.status, PumpHealth::Unknown);
}

#[tokio::test]
async fn readings_outside_the_window_are_ignored() {
    let (store, building, substation) = store_with_building().await;
    write_water(&store, building, substation, 24, 10.0, (3.0, 2.0)).await;
    store
        .insert_hot_water(&HotWaterReading {
            building_id: building,
            flow_rate_ch1: 5_000.0,
            flow_rate_ch2: 5_000.0,
            timestamp: now() - Duration::days(3),
        })
        .await
        .unwrap();

    let report = analyzer(store).analyze_at(building, 1, now()).await.unwrap();
    assert_eq!(report.water_balance_status, WaterBalanceStatus::Normal);
    assert_eq!(report.hot_records, 24);
}

#[tokio::test]
async fn zero_day_window_is_rejected() {
    let (store, building, _) = store_with_building().await;
    let err = analyzer(store).analyze_at(building, 0, now()).await.unwrap_err();
    assert!(matches!(err, AnalyzerError::InvalidWindow(0)));
}

#[tokio::test]
async fn window_beyond_calendar_is_rejected() {
    let (store, building, _) = store_with_building().await;
    let err = analyzer(store)
        .analyze_at(building, 200_000_000, now())
        .await
        .unwrap_err();
    assert!(matches!(err, AnalyzerError::InvalidWindow(200_000_000)));
}

#[tokio::test]
async fn report_export_writes_envelope() -> anyhow::Result<()> {
    let (store, building, substation) = store_with_building().await;
    write_water(&store, building, substation, 12, 10.0, (4.0, 3.5)).await;
    let report = analyzer(store).analyze_at(building, 1, now()).await?;

    let dir = tempfile::tempdir()?;
    let path = report.exporter().export(&dir.path().join("reports"))?;
    assert_eq!(
        path.file_name().and_then(|name| name.to_str()),
        Some(format!("analysis-{building}-{}.json", now().timestamp()).as_str())
    );
    let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(written["schema"]["title"], "ConsumptionAnalysis");
    assert_eq!(written["data"]["building_id"], building.to_string());
    assert_eq!(written["data"]["water_balance_status"], "warning");
    Ok(())
}

#[derive(Debug)]
struct UnavailableStore;

#[async_trait]
impl TelemetryStore for UnavailableStore {
    async fn list_buildings(&self) -> itp_store::Result<Vec<Building>> {
        Err(StoreError::Unavailable("offline".into()))
    }

    async fn find_building(&self, _: Uuid) -> itp_store::Result<Option<Building>> {
        Err(StoreError::Unavailable("offline".into()))
    }

    async fn insert_building(&self, _: &Building) -> itp_store::Result<()> {
        Err(StoreError::Unavailable("offline".into()))
    }

    async fn ensure_substation(&self, _: Uuid) -> itp_store::Result<Uuid> {
        Err(StoreError::Unavailable("offline".into()))
    }

    async fn insert_cold_water(&self, _: &ColdWaterReading) -> itp_store::Result<()> {
        Err(StoreError::Unavailable("offline".into()))
    }

    async fn insert_hot_water(&self, _: &HotWaterReading) -> itp_store::Result<()> {
        Err(StoreError::Unavailable("offline".into()))
    }

    async fn insert_temperature(&self, _: &TemperatureReading) -> itp_store::Result<()> {
        Err(StoreError::Unavailable("offline".into()))
    }

    async fn insert_pump(&self, _: &PumpReading) -> itp_store::Result<()> {
        Err(StoreError::Unavailable("offline".into()))
    }

    async fn query_aggregate(
        &self,
        _: Uuid,
        _: DateTime<Utc>,
        _: DateTime<Utc>,
    ) -> itp_store::Result<WaterAggregate> {
        Err(StoreError::Unavailable("offline".into()))
    }

    async fn query_temperature_stats(
        &self,
        _: Uuid,
        _: DateTime<Utc>,
        _: DateTime<Utc>,
    ) -> itp_store::Result<TemperatureStats> {
        Err(StoreError::Unavailable("offline".into()))
    }

    async fn query_latest_pump_readings(
        &self,
        _: Uuid,
        _: DateTime<Utc>,
        _: DateTime<Utc>,
    ) -> itp_store::Result<Vec<LatestPumpReading>> {
        Err(StoreError::Unavailable("offline".into()))
    }

    async fn record_counts(&self, _: Uuid) -> itp_store::Result<RecordCounts> {
        Err(StoreError::Unavailable("offline".into()))
    }
}

#[tokio::test]
async fn store_failures_surface_as_fetch_errors() {
    let err = analyzer(Arc::new(UnavailableStore))
        .analyze(Uuid::new_v4(), 30)
        .await
        .unwrap_err();
    assert!(matches!(err, AnalyzerError::Fetch(StoreError::Unavailable(_))));
}
