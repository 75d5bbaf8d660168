//! ---
//! itp_section: "08-consumption-analysis"
//! itp_subsection: "module"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "JSON export of consumption analyses."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::{errors::Result, ConsumptionAnalysis};

#[derive(Debug)]
pub struct ReportExporter<'a> {
    analysis: &'a ConsumptionAnalysis,
}

impl<'a> ReportExporter<'a> {
    pub fn new(analysis: &'a ConsumptionAnalysis) -> Self {
        Self { analysis }
    }

    pub fn file_name(&self) -> String {
        format!(
            "analysis-{}-{}.json",
            self.analysis.building_id,
            self.analysis.generated_at.timestamp()
        )
    }

    /// Write the report into `output_dir`, returning the file path.
    pub fn export(&self, output_dir: &Path) -> Result<PathBuf> {
        if !output_dir.exists() {
            fs::create_dir_all(output_dir)?;
        }

        let timestamp = self.analysis.generated_at.to_rfc3339();
        let envelope = ReportEnvelope::new(&timestamp, analysis_schema(), self.analysis);
        let path = output_dir.join(self.file_name());
        write_json(&path, &envelope)?;

        info!(
            building_id = %self.analysis.building_id,
            path = %path.display(),
            "analysis report exported"
        );
        Ok(path)
    }
}

#[derive(Debug, Serialize)]
struct ReportEnvelope<'a, T: Serialize> {
    timestamp: &'a str,
    schema: serde_json::Value,
    data: &'a T,
}

impl<'a, T: Serialize> ReportEnvelope<'a, T> {
    fn new(timestamp: &'a str, schema: serde_json::Value, data: &'a T) -> Self {
        Self {
            timestamp,
            schema,
            data,
        }
    }
}

fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let serialized = serde_json::to_string_pretty(value)?;
    fs::write(path, serialized)?;
    Ok(())
}

fn analysis_schema() -> serde_json::Value {
    let status = |values: &[&str]| json!({"type": "string", "enum": values});
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "ConsumptionAnalysis",
        "type": "object",
        "properties": {
            "building_id": {"type": "string", "format": "uuid"},
            "period": {"type": "string"},
            "data_source": status(&["database", "estimated"]),
            "total_cold_water": {"type": "number"},
            "total_hot_water": {"type": "number"},
            "hot_to_cold_ratio_percent": {"type": "number"},
            "water_balance_status": status(&["normal", "warning", "leak", "error", "unknown"]),
            "temperature": {
                "type": "object",
                "properties": {
                    "status": status(&["normal", "warning", "critical", "unknown"]),
                    "avg_delta": {"type": "number"},
                    "readings": {"type": "integer", "minimum": 0}
                },
                "required": ["status", "avg_delta", "readings"]
            },
            "pumps": {
                "type": "object",
                "properties": {
                    "status": status(&["normal", "warning", "critical", "unknown"]),
                    "pump_count": {"type": "integer", "minimum": 0},
                    "max_operating_hours": {"type": "integer", "minimum": 0},
                    "pressure_health": status(&["normal", "warning", "critical", "unknown"]),
                    "vibration_health": status(&["normal", "warning", "critical", "unknown"])
                },
                "required": ["status", "pump_count", "max_operating_hours"]
            },
            "has_anomalies": {"type": "boolean"},
            "anomaly_count": {"type": "integer", "minimum": 0},
            "recommendations": {"type": "array", "items": {"type": "string"}}
        },
        "required": [
            "building_id",
            "period",
            "data_source",
            "water_balance_status",
            "temperature",
            "pumps",
            "has_anomalies",
            "anomaly_count",
            "recommendations"
        ]
    })
}
