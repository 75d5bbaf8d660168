//! ---
//! itp_section: "01-core-functionality"
//! itp_subsection: "module"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "Start/stop lifecycle of the continuous telemetry generator."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
//! The generator owns four periodic workers (water, temperature, pumps and
//! the new-data notification). `start` and `stop` are idempotent; a stop
//! waits for every worker to exit, so no reading is written after it returns.

use std::fmt;
use std::sync::Arc;

use itp_common::GeneratorConfig;
use itp_metrics::GeneratorMetrics;
use itp_rt::{cancellation, CancelSource, TaskGroup};
use itp_sim::SyntheticModel;
use itp_store::TelemetryStore;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::notify::DataNotifier;
use crate::workers::{
    run_worker, NotifyWorker, PumpWorker, TemperatureWorker, TickWorker, WaterWorker,
    WorkerContext,
};

struct RunHandle {
    cancel: CancelSource,
    tasks: TaskGroup,
}

pub struct ContinuousGenerator {
    store: Arc<dyn TelemetryStore>,
    config: GeneratorConfig,
    notifier: Arc<dyn DataNotifier>,
    metrics: Option<GeneratorMetrics>,
    state: Mutex<Option<RunHandle>>,
}

impl fmt::Debug for ContinuousGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContinuousGenerator")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl ContinuousGenerator {
    pub fn new(
        store: Arc<dyn TelemetryStore>,
        config: GeneratorConfig,
        notifier: Arc<dyn DataNotifier>,
        metrics: Option<GeneratorMetrics>,
    ) -> Self {
        Self {
            store,
            config,
            notifier,
            metrics,
            state: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Spawn the workers. Returns `false` without side effects when the
    /// generator is already running. Must be called inside a Tokio runtime.
    pub fn start(&self) -> bool {
        let mut state = self.state.lock();
        if state.is_some() {
            warn!("generator already running");
            return false;
        }

        let (source, token) = cancellation();
        let ctx = WorkerContext {
            store: self.store.clone(),
            metrics: self.metrics.clone(),
            cancel: token,
        };
        let mut parent = SyntheticModel::from_seed(self.config.random_seed);
        let mut tasks = TaskGroup::new();
        tasks.spawn(
            WaterWorker::NAME,
            run_worker(
                WaterWorker::new(parent.fork()),
                self.config.water_interval,
                ctx.clone(),
            ),
        );
        tasks.spawn(
            TemperatureWorker::NAME,
            run_worker(
                TemperatureWorker::new(parent.fork()),
                self.config.temperature_interval,
                ctx.clone(),
            ),
        );
        tasks.spawn(
            PumpWorker::NAME,
            run_worker(
                PumpWorker::new(parent.fork()),
                self.config.pump_interval,
                ctx.clone(),
            ),
        );
        tasks.spawn(
            NotifyWorker::NAME,
            run_worker(
                NotifyWorker::new(self.notifier.clone()),
                self.config.notify_interval,
                ctx,
            ),
        );

        info!(
            workers = ?tasks.names(),
            water_secs = self.config.water_interval.as_secs(),
            temperature_secs = self.config.temperature_interval.as_secs(),
            pump_secs = self.config.pump_interval.as_secs(),
            notify_secs = self.config.notify_interval.as_secs(),
            "continuous generator started"
        );
        if let Some(metrics) = &self.metrics {
            metrics.set_running(true);
        }
        *state = Some(RunHandle {
            cancel: source,
            tasks,
        });
        true
    }

    /// Cancel the workers and wait for them to exit. Returns `false` when the
    /// generator was not running.
    pub async fn stop(&self) -> bool {
        let handle = self.state.lock().take();
        let Some(RunHandle { cancel, tasks }) = handle else {
            return false;
        };
        cancel.cancel();
        tasks.join().await;
        if let Some(metrics) = &self.metrics {
            metrics.set_running(false);
        }
        info!("continuous generator stopped");
        true
    }
}

impl Drop for ContinuousGenerator {
    fn drop(&mut self) {
        // Workers exit on their next cancellation check once the source drops.
        if let Some(handle) = self.state.get_mut().take() {
            handle.cancel.cancel();
        }
    }
}
