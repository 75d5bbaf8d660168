//! ---
//! itp_section: "01-core-functionality"
//! itp_subsection: "module"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "Shared primitives and utilities for the monitor runtime."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

const ENV_ENABLE_GENERATION: &str = "ENABLE_DATA_GENERATION";
const ENV_FILL_INITIAL_DATA: &str = "FILL_INITIAL_DATA";

fn default_water_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_temperature_interval() -> Duration {
    Duration::from_secs(120)
}

fn default_pump_interval() -> Duration {
    Duration::from_secs(300)
}

fn default_notify_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_window_days() -> u32 {
    30
}

fn default_min_records() -> u64 {
    7
}

fn default_history_days() -> u32 {
    7
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9898))
}

/// Primary configuration object for the monitor runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub seed: SeedConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
///
/// `source` is `None` when no file was found and built-in defaults apply.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "ITP_CONFIG";

    /// Load configuration from disk, respecting the `ITP_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration together with the effective source path.
    ///
    /// An explicit `ITP_CONFIG` path must exist. Candidates are optional and
    /// the defaults are used when none of them is present.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let mut config = Self::from_path(&path)?;
                config.apply_env_overrides();
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let mut config = Self::from_path(path)?;
                config.apply_env_overrides();
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path.to_path_buf()),
                });
            }
        }

        debug!("no configuration file found; using defaults");
        let mut config = AppConfig::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(LoadedAppConfig {
            config,
            source: None,
        })
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        contents
            .parse::<AppConfig>()
            .with_context(|| format!("failed to load config file {}", path.display()))
    }

    /// Apply the boolean deployment toggles `ENABLE_DATA_GENERATION` and
    /// `FILL_INITIAL_DATA`. Only the literal value `true` switches a toggle on.
    pub fn apply_env_overrides(&mut self) {
        if env_flag(ENV_ENABLE_GENERATION) {
            self.generator.start_on_boot = true;
        }
        if env_flag(ENV_FILL_INITIAL_DATA) {
            self.seed.fill_initial_data = true;
        }
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.store.validate()?;
        self.generator.validate()?;
        self.analyzer.validate()?;
        if self.seed.history_days == 0 {
            return Err(anyhow!("seed.history_days must be greater than zero"));
        }
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| value.trim() == "true")
        .unwrap_or(false)
}

/// Storage backend selection.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Database file, required for the SQLite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.backend == StoreBackend::Sqlite && self.path.is_none() {
            return Err(anyhow!("store.path is required for the sqlite backend"));
        }
        Ok(())
    }
}

/// Scheduling for the four synthetic writers.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default)]
    pub start_on_boot: bool,
    #[serde(default = "default_water_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub water_interval: Duration,
    #[serde(default = "default_temperature_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub temperature_interval: Duration,
    #[serde(default = "default_pump_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub pump_interval: Duration,
    #[serde(default = "default_notify_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub notify_interval: Duration,
    /// Fixed seed for reproducible runs; entropy is used when unset.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            start_on_boot: false,
            water_interval: default_water_interval(),
            temperature_interval: default_temperature_interval(),
            pump_interval: default_pump_interval(),
            notify_interval: default_notify_interval(),
            random_seed: None,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<()> {
        let intervals = [
            ("water_interval", self.water_interval),
            ("temperature_interval", self.temperature_interval),
            ("pump_interval", self.pump_interval),
            ("notify_interval", self.notify_interval),
        ];
        for (name, interval) in intervals {
            if interval.is_zero() {
                return Err(anyhow!("generator.{} must be greater than zero", name));
            }
        }
        Ok(())
    }

    /// Longest worker interval; bounds how long a stop can take to settle.
    pub fn longest_interval(&self) -> Duration {
        self.water_interval
            .max(self.temperature_interval)
            .max(self.pump_interval)
            .max(self.notify_interval)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default = "default_window_days")]
    pub default_window_days: u32,
    /// Record count below which a window is treated as insufficient.
    #[serde(default = "default_min_records")]
    pub min_records: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            default_window_days: default_window_days(),
            min_records: default_min_records(),
        }
    }
}

impl AnalyzerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_window_days == 0 {
            return Err(anyhow!("analyzer.default_window_days must be greater than zero"));
        }
        if self.min_records == 0 {
            return Err(anyhow!("analyzer.min_records must be greater than zero"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Create demo buildings and backfill history at startup.
    #[serde(default)]
    pub fill_initial_data: bool,
    #[serde(default = "default_history_days")]
    pub history_days: u32,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            fill_initial_data: false,
            history_days: default_history_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
    /// Disable to keep logs on stdout only.
    #[serde(default)]
    pub file_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
            file_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_metrics_listen(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: AppConfig = "".parse().unwrap();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.generator.water_interval, Duration::from_secs(30));
        assert_eq!(config.generator.temperature_interval, Duration::from_secs(120));
        assert_eq!(config.generator.pump_interval, Duration::from_secs(300));
        assert_eq!(config.generator.notify_interval, Duration::from_secs(10));
        assert_eq!(config.analyzer.min_records, 7);
        assert_eq!(config.analyzer.default_window_days, 30);
        assert_eq!(config.generator.longest_interval(), Duration::from_secs(300));
    }

    #[test]
    fn parses_sections() {
        let config: AppConfig = r#"
            [store]
            backend = "sqlite"
            path = "data/itp.db"

            [generator]
            water_interval = 5
            random_seed = 42

            [analyzer]
            min_records = 3
        "#
        .parse()
        .unwrap();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store.path, Some(PathBuf::from("data/itp.db")));
        assert_eq!(config.generator.water_interval, Duration::from_secs(5));
        assert_eq!(config.generator.random_seed, Some(42));
        assert_eq!(config.analyzer.min_records, 3);
    }

    #[test]
    fn sqlite_without_path_is_rejected() {
        let result = "[store]\nbackend = \"sqlite\"\n".parse::<AppConfig>();
        assert!(result.is_err());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let result = "[generator]\npump_interval = 0\n".parse::<AppConfig>();
        assert!(result.is_err());
    }

    #[test]
    fn loads_first_existing_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("itp.toml");
        fs::write(&path, "[analyzer]\ndefault_window_days = 14\n").unwrap();
        let missing = dir.path().join("missing.toml");

        let loaded = AppConfig::load_with_source(&[missing, path.clone()]).unwrap();
        assert_eq!(loaded.source, Some(path));
        assert_eq!(loaded.config.analyzer.default_window_days, 14);
    }

    #[test]
    fn shipped_example_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../configs/example.toml");
        let config = AppConfig::from_path(&path).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.metrics.enabled);
    }
}
