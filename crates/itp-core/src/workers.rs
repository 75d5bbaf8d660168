//! ---
//! itp_section: "01-core-functionality"
//! itp_subsection: "module"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "Periodic writers of the continuous telemetry generator."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Local, Timelike, Utc};
use itp_common::time::elapsed_days;
use itp_metrics::GeneratorMetrics;
use itp_rt::{CancelToken, PeriodicTicker};
use itp_sim::{building_key, PumpSample, SyntheticModel, WaterSample};
use itp_store::{
    Building, ColdWaterReading, HotWaterReading, PumpReading, TelemetryStore, TemperatureReading,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::notify::{DataNotifier, NewDataEvent};

pub(crate) const KIND_COLD_WATER: &str = "cold_water";
pub(crate) const KIND_HOT_WATER: &str = "hot_water";
pub(crate) const KIND_TEMPERATURE: &str = "temperature";
pub(crate) const KIND_PUMP: &str = "pump";
pub(crate) const KIND_SUBSTATION: &str = "substation";
const KIND_BUILDINGS: &str = "buildings";

/// Shared handles every worker writes through.
#[derive(Debug, Clone)]
pub(crate) struct WorkerContext {
    pub store: Arc<dyn TelemetryStore>,
    pub metrics: Option<GeneratorMetrics>,
    pub cancel: CancelToken,
}

impl WorkerContext {
    fn record(&self, kind: &'static str, building_id: Uuid, result: itp_store::Result<()>) {
        match result {
            Ok(()) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_write(kind);
                }
            }
            Err(err) => {
                warn!(building_id = %building_id, kind, error = %err, "failed to write reading");
                self.record_failure(kind);
            }
        }
    }

    fn record_failure(&self, kind: &'static str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_failure(kind);
        }
    }

    async fn buildings(&self, task: &'static str) -> Option<Vec<Building>> {
        match self.store.list_buildings().await {
            Ok(buildings) => Some(buildings),
            Err(err) => {
                warn!(task, error = %err, "failed to list buildings, skipping tick");
                self.record_failure(KIND_BUILDINGS);
                None
            }
        }
    }
}

#[async_trait]
pub(crate) trait TickWorker: Send + 'static {
    const NAME: &'static str;

    async fn tick(&mut self, ctx: &WorkerContext, now: DateTime<Utc>);
}

/// Run `worker` every `period` until the context is cancelled. The first tick
/// fires immediately; cancellation is observed between ticks and between
/// buildings, never in the middle of a write.
pub(crate) async fn run_worker<W: TickWorker>(mut worker: W, period: Duration, ctx: WorkerContext) {
    let mut ticker = PeriodicTicker::new(period);
    let mut stop = ctx.cancel.clone();
    debug!(task = W::NAME, period_secs = period.as_secs_f64(), "worker started");
    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if ctx.cancel.is_cancelled() {
            break;
        }
        worker.tick(&ctx, Utc::now()).await;
        if let Some(metrics) = &ctx.metrics {
            metrics.record_tick(W::NAME);
        }
    }
    debug!(task = W::NAME, "worker stopped");
}

pub(crate) fn hot_water_reading(
    building_id: Uuid,
    sample: &WaterSample,
    timestamp: DateTime<Utc>,
) -> HotWaterReading {
    HotWaterReading {
        building_id,
        flow_rate_ch1: sample.hot_ch1,
        flow_rate_ch2: sample.hot_ch2,
        timestamp,
    }
}

pub(crate) fn cold_water_reading(
    substation_id: Uuid,
    sample: &WaterSample,
    timestamp: DateTime<Utc>,
) -> ColdWaterReading {
    ColdWaterReading {
        substation_id,
        flow_rate: sample.cold,
        timestamp,
    }
}

pub(crate) fn pump_reading(
    building_id: Uuid,
    sample: PumpSample,
    timestamp: DateTime<Utc>,
) -> PumpReading {
    PumpReading {
        building_id,
        pump_label: sample.label,
        status: sample.status,
        operating_hours: sample.operating_hours,
        pressure_in: sample.pressure_in,
        pressure_out: sample.pressure_out,
        vibration_level: sample.vibration,
        timestamp,
    }
}

pub(crate) struct WaterWorker {
    model: SyntheticModel,
}

impl WaterWorker {
    pub fn new(model: SyntheticModel) -> Self {
        Self { model }
    }
}

#[async_trait]
impl TickWorker for WaterWorker {
    const NAME: &'static str = "water";

    async fn tick(&mut self, ctx: &WorkerContext, now: DateTime<Utc>) {
        let Some(buildings) = ctx.buildings(Self::NAME).await else {
            return;
        };
        let hour = now.with_timezone(&Local).hour();
        for building in buildings {
            if ctx.cancel.is_cancelled() {
                return;
            }
            let substation = match ctx.store.ensure_substation(building.id).await {
                Ok(id) => id,
                Err(err) => {
                    warn!(building_id = %building.id, error = %err, "substation bootstrap failed, skipping building");
                    ctx.record_failure(KIND_SUBSTATION);
                    continue;
                }
            };
            let sample = self.model.water(hour);
            let hot = hot_water_reading(building.id, &sample, now);
            ctx.record(KIND_HOT_WATER, building.id, ctx.store.insert_hot_water(&hot).await);
            let cold = cold_water_reading(substation, &sample, now);
            ctx.record(KIND_COLD_WATER, building.id, ctx.store.insert_cold_water(&cold).await);
        }
    }
}

pub(crate) struct TemperatureWorker {
    model: SyntheticModel,
}

impl TemperatureWorker {
    pub fn new(model: SyntheticModel) -> Self {
        Self { model }
    }
}

#[async_trait]
impl TickWorker for TemperatureWorker {
    const NAME: &'static str = "temperature";

    async fn tick(&mut self, ctx: &WorkerContext, now: DateTime<Utc>) {
        let Some(buildings) = ctx.buildings(Self::NAME).await else {
            return;
        };
        let month = now.with_timezone(&Local).month();
        for building in buildings {
            if ctx.cancel.is_cancelled() {
                return;
            }
            let sample = self.model.temperature(month);
            let reading =
                TemperatureReading::new(building.id, sample.supply, sample.return_temp, now);
            ctx.record(
                KIND_TEMPERATURE,
                building.id,
                ctx.store.insert_temperature(&reading).await,
            );
        }
    }
}

pub(crate) struct PumpWorker {
    model: SyntheticModel,
}

impl PumpWorker {
    pub fn new(model: SyntheticModel) -> Self {
        Self { model }
    }
}

#[async_trait]
impl TickWorker for PumpWorker {
    const NAME: &'static str = "pump";

    async fn tick(&mut self, ctx: &WorkerContext, now: DateTime<Utc>) {
        let Some(buildings) = ctx.buildings(Self::NAME).await else {
            return;
        };
        for building in buildings {
            if ctx.cancel.is_cancelled() {
                return;
            }
            let age_days = elapsed_days(building.created_at, now);
            for sample in self.model.pumps(building_key(building.id), age_days) {
                let reading = pump_reading(building.id, sample, now);
                ctx.record(KIND_PUMP, building.id, ctx.store.insert_pump(&reading).await);
            }
        }
    }
}

pub(crate) struct NotifyWorker {
    notifier: Arc<dyn DataNotifier>,
    sequence: u64,
}

impl NotifyWorker {
    pub fn new(notifier: Arc<dyn DataNotifier>) -> Self {
        Self {
            notifier,
            sequence: 0,
        }
    }
}

#[async_trait]
impl TickWorker for NotifyWorker {
    const NAME: &'static str = "notify";

    async fn tick(&mut self, _ctx: &WorkerContext, now: DateTime<Utc>) {
        self.sequence += 1;
        self.notifier
            .notify(NewDataEvent {
                sequence: self.sequence,
                emitted_at: now,
            })
            .await;
    }
}
