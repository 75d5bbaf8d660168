//! ---
//! itp_section: "08-consumption-analysis"
//! itp_subsection: "module"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "Error taxonomy of the consumption analyzer."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
use itp_store::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalyzerError>;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("failed to fetch telemetry: {0}")]
    Fetch(#[from] StoreError),
    #[error("invalid analysis window of {0} days")]
    InvalidWindow(u32),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}
