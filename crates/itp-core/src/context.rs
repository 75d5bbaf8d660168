//! ---
//! itp_section: "01-core-functionality"
//! itp_subsection: "module"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "Service context and caller-facing monitor API."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use itp_analyzer::{ConsumptionAnalysis, ConsumptionAnalyzer};
use itp_common::AppConfig;
use itp_metrics::{AnalyzerMetrics, GeneratorMetrics, SharedRegistry};
use itp_sim::SyntheticModel;
use itp_store::{RecordCounts, TelemetryStore};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::generator::ContinuousGenerator;
use crate::notify::{BroadcastNotifier, NewDataEvent};
use crate::seed::{backfill_history, seed_demo_buildings, BackfillSummary};

/// Shared resources built once per process from configuration.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    config: Arc<AppConfig>,
    store: Arc<dyn TelemetryStore>,
    registry: SharedRegistry,
    notifier: BroadcastNotifier,
}

impl ServiceContext {
    /// Validate the configuration and open the configured store.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        config.validate()?;
        let store = itp_store::open(&config.store).context("failed to open telemetry store")?;
        info!(backend = ?config.store.backend, "telemetry store opened");
        Ok(Self::with_store(config, store))
    }

    /// Use an already opened store, typically an in-memory one in tests.
    pub fn with_store(config: AppConfig, store: Arc<dyn TelemetryStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            registry: itp_metrics::new_registry(),
            notifier: BroadcastNotifier::default(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn TelemetryStore> {
        self.store.clone()
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }
}

/// Caller-facing API: analysis, generator control and the notify stream.
#[derive(Debug)]
pub struct ItpMonitor {
    context: ServiceContext,
    analyzer: ConsumptionAnalyzer,
    generator: ContinuousGenerator,
    analyzer_metrics: AnalyzerMetrics,
}

impl ItpMonitor {
    /// Registers the generator and analyzer metric families on the context
    /// registry, so one context backs at most one monitor.
    pub fn new(context: ServiceContext) -> Result<Self> {
        let generator_metrics = GeneratorMetrics::new(&context.registry)
            .context("failed to register generator metrics")?;
        let analyzer_metrics = AnalyzerMetrics::new(&context.registry)
            .context("failed to register analyzer metrics")?;
        let analyzer = ConsumptionAnalyzer::new(context.store(), context.config.analyzer.clone());
        let generator = ContinuousGenerator::new(
            context.store(),
            context.config.generator.clone(),
            Arc::new(context.notifier.clone()),
            Some(generator_metrics),
        );
        Ok(Self {
            context,
            analyzer,
            generator,
            analyzer_metrics,
        })
    }

    pub fn context(&self) -> &ServiceContext {
        &self.context
    }

    pub async fn analyze(
        &self,
        building_id: Uuid,
        days: u32,
    ) -> itp_analyzer::Result<ConsumptionAnalysis> {
        let started = Instant::now();
        match self.analyzer.analyze(building_id, days).await {
            Ok(analysis) => {
                self.analyzer_metrics.record_success(
                    analysis.data_source.as_ref(),
                    started.elapsed().as_secs_f64(),
                );
                Ok(analysis)
            }
            Err(err) => {
                warn!(building_id = %building_id, error = %err, "consumption analysis failed");
                self.analyzer_metrics.record_failure();
                Err(err)
            }
        }
    }

    pub async fn analyze_default(
        &self,
        building_id: Uuid,
    ) -> itp_analyzer::Result<ConsumptionAnalysis> {
        self.analyze(building_id, self.analyzer.config().default_window_days)
            .await
    }

    pub fn start_generator(&self) -> bool {
        self.generator.start()
    }

    pub async fn stop_generator(&self) -> bool {
        self.generator.stop().await
    }

    pub fn is_generator_running(&self) -> bool {
        self.generator.is_running()
    }

    /// Receive new-data events while the generator runs.
    pub fn subscribe(&self) -> broadcast::Receiver<NewDataEvent> {
        self.context.notifier.subscribe()
    }

    pub async fn record_counts(&self, building_id: Uuid) -> Result<RecordCounts> {
        self.context
            .store
            .record_counts(building_id)
            .await
            .with_context(|| format!("failed to count records for building {building_id}"))
    }

    pub async fn seed_demo_buildings(&self) -> Result<usize> {
        seed_demo_buildings(self.context.store.as_ref()).await
    }

    /// Backfill `days` of history ending now, seeded from the generator seed.
    pub async fn backfill(&self, days: u32) -> Result<BackfillSummary> {
        let mut model = SyntheticModel::from_seed(self.context.config.generator.random_seed);
        backfill_history(self.context.store.as_ref(), &mut model, days, Utc::now()).await
    }

    /// Seed demo buildings and backfill the configured history when
    /// `seed.fill_initial_data` is set. Failures are logged, not returned.
    pub async fn fill_initial_data(&self) {
        let seed = &self.context.config.seed;
        if !seed.fill_initial_data {
            return;
        }
        if let Err(err) = self.seed_demo_buildings().await {
            warn!(error = %err, "could not create demo buildings");
            return;
        }
        match self.backfill(seed.history_days).await {
            Ok(summary) => info!(written = summary.written, "initial data filled"),
            Err(err) => warn!(error = %err, "could not fill initial data"),
        }
    }
}
