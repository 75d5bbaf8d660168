//! ---
//! itp_section: "01-core-functionality"
//! itp_subsection: "module"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "Shared primitives and utilities for the monitor runtime."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
//! Shared primitives for the ITP monitor workspace.
//! This crate exposes configuration loading, tracing setup, and the window
//! arithmetic consumed by the analyzer and the generator.

pub mod config;
pub mod logging;
pub mod time;

pub use config::{
    AnalyzerConfig, AppConfig, GeneratorConfig, LoadedAppConfig, LoggingConfig, MetricsConfig,
    SeedConfig, StoreBackend, StoreConfig,
};
pub use logging::{init_tracing, LogFormat};
pub use time::AnalysisWindow;
