//! ---
//! itp_section: "03-persistence-logging"
//! itp_subsection: "module"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "Metrics collection and export utilities."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, StatusCode};
use axum::routing::get;
use axum::{response::IntoResponse, Router};
use prometheus::{
    GaugeVec, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Shared registry type used across the monitor.
pub type SharedRegistry = Arc<Registry>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Encode every family of the registry in the Prometheus text format.
pub fn render(registry: &Registry) -> Result<String> {
    TextEncoder::new()
        .encode_to_string(&registry.gather())
        .context("failed to encode metrics")
}

/// Spawn an HTTP server that exposes the registry at `/metrics`.
pub fn spawn_http_server(registry: SharedRegistry, addr: SocketAddr) -> Result<MetricsServer> {
    let app = Router::new().route(
        "/metrics",
        get({
            let registry = registry.clone();
            move || metrics_handler(registry.clone())
        }),
    );

    let std_listener = StdTcpListener::bind(addr)
        .with_context(|| format!("failed to bind metrics listener {}", addr))?;
    std_listener
        .set_nonblocking(true)
        .with_context(|| "failed to configure metrics listener as non-blocking")?;
    let bound = std_listener
        .local_addr()
        .with_context(|| "failed to read metrics listener address")?;
    let listener = TcpListener::from_std(std_listener)
        .with_context(|| "failed to convert std listener into tokio listener")?;

    info!(address = %bound, "metrics server starting");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let service = app.into_make_service();
    let handle: JoinHandle<Result<()>> = tokio::spawn(async move {
        axum::serve(listener, service)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .context("metrics server encountered an error")?;
        Ok(())
    });

    Ok(MetricsServer {
        addr: bound,
        shutdown: Some(shutdown_tx),
        task: handle,
    })
}

async fn metrics_handler(registry: SharedRegistry) -> impl IntoResponse {
    match render(&registry) {
        Ok(body) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                String::from("metrics encoding error"),
            )
                .into_response()
        }
    }
}

/// Handle to the running HTTP exporter.
#[derive(Debug)]
pub struct MetricsServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl MetricsServer {
    /// Address the listener is bound to; resolves port 0 to the chosen port.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signal shutdown and await task completion.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err),
            Err(join_err) => Err(anyhow::Error::new(join_err)),
        }
    }
}

/// Metrics recorded by the telemetry generator.
#[derive(Clone, Debug)]
pub struct GeneratorMetrics {
    readings_written: IntCounterVec,
    write_failures: IntCounterVec,
    ticks: IntCounterVec,
    running: IntGauge,
}

impl GeneratorMetrics {
    pub fn new(registry: &Registry) -> Result<Self> {
        let readings_written = IntCounterVec::new(
            Opts::new(
                "itp_readings_written_total",
                "Synthetic readings written, by reading kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(readings_written.clone()))?;

        let write_failures = IntCounterVec::new(
            Opts::new(
                "itp_write_failures_total",
                "Failed generator writes, by reading kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(write_failures.clone()))?;

        let ticks = IntCounterVec::new(
            Opts::new("itp_generator_ticks_total", "Completed ticks per generator task"),
            &["task"],
        )?;
        registry.register(Box::new(ticks.clone()))?;

        let running = IntGauge::with_opts(Opts::new(
            "itp_generator_running",
            "Indicator (0/1) whether the generator is running",
        ))?;
        registry.register(Box::new(running.clone()))?;

        Ok(Self {
            readings_written,
            write_failures,
            ticks,
            running,
        })
    }

    pub fn record_write(&self, kind: &str) {
        self.readings_written.with_label_values(&[kind]).inc();
    }

    pub fn record_failure(&self, kind: &str) {
        self.write_failures.with_label_values(&[kind]).inc();
    }

    pub fn record_tick(&self, task: &str) {
        self.ticks.with_label_values(&[task]).inc();
    }

    pub fn set_running(&self, running: bool) {
        self.running.set(i64::from(running));
    }

    pub fn written(&self, kind: &str) -> u64 {
        self.readings_written.with_label_values(&[kind]).get()
    }

    pub fn failures(&self, kind: &str) -> u64 {
        self.write_failures.with_label_values(&[kind]).get()
    }
}

/// Metrics recorded on the analysis path.
#[derive(Clone, Debug)]
pub struct AnalyzerMetrics {
    analyses: IntCounterVec,
    failures: IntCounter,
    duration_seconds: Histogram,
}

impl AnalyzerMetrics {
    pub fn new(registry: &Registry) -> Result<Self> {
        let analyses = IntCounterVec::new(
            Opts::new(
                "itp_analyses_total",
                "Completed consumption analyses, by data source",
            ),
            &["data_source"],
        )?;
        registry.register(Box::new(analyses.clone()))?;

        let failures = IntCounter::with_opts(Opts::new(
            "itp_analysis_failures_total",
            "Consumption analyses aborted by a fetch error",
        ))?;
        registry.register(Box::new(failures.clone()))?;

        let buckets = prometheus::exponential_buckets(0.0005, 2.0, 14)
            .context("failed to construct histogram buckets")?;
        let duration_seconds = Histogram::with_opts(
            HistogramOpts::new("itp_analysis_seconds", "Time spent producing one analysis")
                .buckets(buckets),
        )?;
        registry.register(Box::new(duration_seconds.clone()))?;

        Ok(Self {
            analyses,
            failures,
            duration_seconds,
        })
    }

    pub fn record_success(&self, data_source: &str, seconds: f64) {
        self.analyses.with_label_values(&[data_source]).inc();
        self.duration_seconds.observe(seconds);
    }

    pub fn record_failure(&self) {
        self.failures.inc();
    }
}

/// Metrics recorded by the daemon process itself.
#[derive(Clone)]
pub struct DaemonMetrics {
    starts_total: IntCounter,
    build_info: GaugeVec,
}

impl DaemonMetrics {
    pub fn new(registry: &Registry) -> Result<Self> {
        let starts_total = IntCounter::with_opts(Opts::new(
            "itpd_starts_total",
            "Total number of times the ITP daemon has initialised",
        ))?;
        registry.register(Box::new(starts_total.clone()))?;

        let build_info = GaugeVec::new(
            Opts::new("itpd_build_info", "Build metadata for the running daemon binary"),
            &["version", "profile"],
        )?;
        registry.register(Box::new(build_info.clone()))?;

        Ok(Self {
            starts_total,
            build_info,
        })
    }

    pub fn inc_start(&self) {
        self.starts_total.inc();
    }

    pub fn set_build_info(&self, version: &str, profile: &str) {
        self.build_info
            .with_label_values(&[version, profile])
            .set(1.0);
    }
}

pub use prometheus;

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    #[test]
    fn families_render_with_labels() {
        let registry = new_registry();
        let generator = GeneratorMetrics::new(&registry).unwrap();
        let analyzer = AnalyzerMetrics::new(&registry).unwrap();
        generator.record_write("hot_water");
        generator.record_write("hot_water");
        generator.record_failure("cold_water");
        generator.set_running(true);
        analyzer.record_success("estimated", 0.01);

        assert_eq!(generator.written("hot_water"), 2);
        assert_eq!(generator.failures("cold_water"), 1);
        let text = render(&registry).unwrap();
        assert!(text.contains("itp_readings_written_total{kind=\"hot_water\"} 2"));
        assert!(text.contains("itp_generator_running 1"));
        assert!(text.contains("itp_analyses_total{data_source=\"estimated\"} 1"));
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        let registry = new_registry();
        GeneratorMetrics::new(&registry).unwrap();
        assert!(GeneratorMetrics::new(&registry).is_err());
    }

    #[tokio::test]
    async fn http_endpoint_serves_registry() {
        let registry = new_registry();
        let daemon = DaemonMetrics::new(&registry).unwrap();
        daemon.inc_start();
        let server = spawn_http_server(registry, "127.0.0.1:0".parse().unwrap()).unwrap();

        let mut stream = TcpStream::connect(server.addr()).await.unwrap();
        stream
            .write_all(b"GET /metrics HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("itpd_starts_total 1"));

        server.shutdown().await.unwrap();
    }
}
