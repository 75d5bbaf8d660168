//! ---
//! itp_section: "08-consumption-analysis"
//! itp_subsection: "module"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "Operator recommendations derived from a classification."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
use crate::classify::{PumpHealth, PumpSummary, TemperatureStatus, WaterBalanceStatus, WaterFigures};
use crate::report::TemperatureSummary;

pub const OPERATING_NORMALLY: &str = "System operating normally";
pub const ESTIMATED_FIGURES: &str =
    "Insufficient metered data, water figures are estimated from typical consumption";

/// Everything the recommendation text depends on.
#[derive(Debug, Clone, Copy)]
pub struct RecommendationInputs<'a> {
    pub figures: &'a WaterFigures,
    pub balance: WaterBalanceStatus,
    pub temperature: &'a TemperatureSummary,
    pub pumps: &'a PumpSummary,
    pub min_records: u64,
    pub estimated: bool,
    /// Set when the hot-to-cold ratio tripped the data-integrity override.
    pub integrity_override: bool,
}

/// Ordered, deterministic recommendation list.
pub fn recommend(inputs: &RecommendationInputs<'_>) -> Vec<String> {
    let mut out = Vec::new();
    if inputs.integrity_override {
        out.push(integrity_caveat(inputs.figures.ratio_percent()));
    }

    let domain = domain_recommendations(inputs);
    let notes = data_quality_notes(inputs);
    if inputs.estimated {
        out.push(ESTIMATED_FIGURES.to_owned());
    } else if domain.is_empty() && notes.is_empty() && out.is_empty() {
        out.push(OPERATING_NORMALLY.to_owned());
    }
    out.extend(domain);
    out.extend(notes);
    out
}

pub fn integrity_caveat(ratio: f64) -> String {
    format!(
        "Data integrity check: hot-to-cold ratio of {ratio:.1}% exceeds physical limits, verify meter readings before acting on this report"
    )
}

fn domain_recommendations(inputs: &RecommendationInputs<'_>) -> Vec<String> {
    let mut out = Vec::new();
    let ratio = inputs.figures.ratio_percent();

    match inputs.balance {
        WaterBalanceStatus::Leak => {
            out.push("Possible leak detected, inspect the hot-water circuit".to_owned())
        }
        WaterBalanceStatus::Error => out.push(format!(
            "Large water balance deviation (hot-to-cold ratio {ratio:.1}%), meter diagnostics required"
        )),
        WaterBalanceStatus::Warning => out.push(format!(
            "Hot-to-cold ratio {ratio:.1}% is outside the 40-70% band, monitor the water balance"
        )),
        WaterBalanceStatus::Normal | WaterBalanceStatus::Unknown => {}
    }

    let delta = inputs.temperature.avg_delta;
    match inputs.temperature.status {
        TemperatureStatus::Warning => out.push(format!(
            "Temperature regime close to critical (average delta-T {delta:.1} °C)"
        )),
        TemperatureStatus::Critical => out.push(format!(
            "Critical temperature deviation (average delta-T {delta:.1} °C), urgent inspection required"
        )),
        TemperatureStatus::Normal | TemperatureStatus::Unknown => {}
    }

    let pumps = inputs.pumps;
    let hours = pumps.max_operating_hours;
    match pumps.status {
        PumpHealth::Warning => out.push(format!(
            "Pump has run {hours} hours, schedule maintenance soon ({} of {} pumps in warning)",
            pumps.warning, pumps.pump_count
        )),
        PumpHealth::Critical => out.push(format!(
            "Pump has run {hours} hours, urgent maintenance required ({} of {} pumps critical)",
            pumps.critical, pumps.pump_count
        )),
        PumpHealth::Normal | PumpHealth::Unknown => {}
    }
    if matches!(pumps.pressure_health, PumpHealth::Warning | PumpHealth::Critical) {
        out.push(format!(
            "Pump pressure lift outside 1-3 bar, pressure health {}",
            pumps.pressure_health
        ));
    }
    if matches!(pumps.vibration_health, PumpHealth::Warning | PumpHealth::Critical) {
        out.push(format!(
            "Pump vibration above 5 on part of the group, vibration health {}",
            pumps.vibration_health
        ));
    }
    out
}

fn data_quality_notes(inputs: &RecommendationInputs<'_>) -> Vec<String> {
    let mut out = Vec::new();
    let figures = inputs.figures;
    if figures.cold_count < inputs.min_records {
        out.push(format!(
            "only {} cold-water records found, analysis confidence reduced",
            figures.cold_count
        ));
    }
    if figures.hot_count < inputs.min_records {
        out.push(format!(
            "only {} hot-water records found, analysis confidence reduced",
            figures.hot_count
        ));
    }
    if inputs.temperature.readings == 0 {
        out.push("no temperature readings in the analysis window".to_owned());
    }
    if inputs.pumps.pump_count == 0 {
        out.push("no pump readings in the analysis window".to_owned());
    }
    out
}
