//! ---
//! itp_section: "08-consumption-analysis"
//! itp_subsection: "module"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "Consumption analyzer: fetch, classify, recommend."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
pub mod classify;
pub mod errors;
pub mod pipeline;
pub mod recommendations;
pub mod report;
pub mod reports;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use itp_common::{AnalysisWindow, AnalyzerConfig};
use itp_store::TelemetryStore;
use tracing::{debug, info};
use uuid::Uuid;

use crate::pipeline::{evaluate, WindowData};
use crate::reports::ReportExporter;

pub use classify::{DataSource, PumpHealth, PumpSummary, TemperatureStatus, WaterBalanceStatus};
pub use errors::{AnalyzerError, Result};
pub use report::{ConsumptionAnalysis, TemperatureSummary};

impl ConsumptionAnalysis {
    pub fn exporter(&self) -> ReportExporter<'_> {
        ReportExporter::new(self)
    }
}

/// Stateless read path over a [`TelemetryStore`]. Safe to call concurrently.
#[derive(Debug, Clone)]
pub struct ConsumptionAnalyzer {
    store: Arc<dyn TelemetryStore>,
    config: AnalyzerConfig,
}

impl ConsumptionAnalyzer {
    pub fn new(store: Arc<dyn TelemetryStore>, config: AnalyzerConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyze the `days` days ending now.
    pub async fn analyze(&self, building_id: Uuid, days: u32) -> Result<ConsumptionAnalysis> {
        self.analyze_at(building_id, days, Utc::now()).await
    }

    /// Analyze using the configured default window.
    pub async fn analyze_default(&self, building_id: Uuid) -> Result<ConsumptionAnalysis> {
        self.analyze(building_id, self.config.default_window_days)
            .await
    }

    /// Analyze the `days` days ending at `now`.
    ///
    /// Store failures abort the analysis; no partial report is produced.
    pub async fn analyze_at(
        &self,
        building_id: Uuid,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<ConsumptionAnalysis> {
        if days == 0 {
            return Err(AnalyzerError::InvalidWindow(days));
        }
        let window =
            AnalysisWindow::ending_at(now, days).ok_or(AnalyzerError::InvalidWindow(days))?;
        let data = self.fetch(building_id, &window).await?;
        debug!(
            building_id = %building_id,
            cold_records = data.water.cold_count,
            hot_records = data.water.hot_count,
            temperature_records = data.temperature.count,
            pumps = data.pumps.len(),
            "window data fetched"
        );

        let analysis = evaluate(building_id, &window, &data, self.config.min_records, now);
        info!(
            building_id = %building_id,
            period = %analysis.period,
            data_source = %analysis.data_source,
            water_balance = %analysis.water_balance_status,
            temperature = %analysis.temperature.status,
            pumps = %analysis.pumps.status,
            anomalies = analysis.anomaly_count,
            "consumption analysis complete"
        );
        Ok(analysis)
    }

    async fn fetch(&self, building_id: Uuid, window: &AnalysisWindow) -> Result<WindowData> {
        let water = self
            .store
            .query_aggregate(building_id, window.start, window.end)
            .await?;
        let temperature = self
            .store
            .query_temperature_stats(building_id, window.start, window.end)
            .await?;
        let pumps = self
            .store
            .query_latest_pump_readings(building_id, window.start, window.end)
            .await?;
        Ok(WindowData {
            water,
            temperature,
            pumps,
        })
    }
}
