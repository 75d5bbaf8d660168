//! ---
//! itp_section: "08-consumption-analysis"
//! itp_subsection: "module"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "Pure evaluation of fetched window data into a report."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use itp_common::AnalysisWindow;
use itp_store::{LatestPumpReading, TemperatureStats, WaterAggregate};
use uuid::Uuid;

use crate::classify::{
    assess_pumps, classify_water_balance, count_anomalies, DataSource, WaterBalanceStatus,
    WaterFigures,
};
use crate::recommendations::{recommend, RecommendationInputs};
use crate::report::{ConsumptionAnalysis, TemperatureSummary};

/// Typical cold inflow used when metered data is too sparse, m³/h.
pub const COLD_BASELINE_PER_HOUR: f64 = 7.0;
/// Typical hot consumption used when metered data is too sparse, m³/h.
pub const HOT_BASELINE_PER_HOUR: f64 = 4.0;

/// Ratios above this are treated as corrupt data rather than a leak.
pub const INTEGRITY_RATIO_LIMIT: f64 = 95.0;

/// Raw store results for one window.
#[derive(Debug, Clone, Default)]
pub struct WindowData {
    pub water: WaterAggregate,
    pub temperature: TemperatureStats,
    pub pumps: Vec<LatestPumpReading>,
}

/// Turn window data into a report. Never fails and never consults a clock or RNG.
pub fn evaluate(
    building_id: Uuid,
    window: &AnalysisWindow,
    data: &WindowData,
    min_records: u64,
    generated_at: DateTime<Utc>,
) -> ConsumptionAnalysis {
    let measured = WaterFigures {
        cold_total: data.water.cold_total,
        hot_total: data.water.hot_total,
        cold_count: data.water.cold_count,
        hot_count: data.water.hot_count,
        window_hours: window.hours(),
    };
    let temperature = TemperatureSummary::from(&data.temperature);
    let pumps = assess_pumps(&data.pumps);

    let estimated = !measured.is_sufficient(min_records);
    let (figures, data_source) = if estimated {
        (
            WaterFigures {
                cold_total: COLD_BASELINE_PER_HOUR * measured.window_hours,
                hot_total: HOT_BASELINE_PER_HOUR * measured.window_hours,
                ..measured
            },
            DataSource::Estimated,
        )
    } else {
        (measured, DataSource::Database)
    };

    let mut balance = classify_water_balance(&measured, min_records);
    let mut anomaly_count = if estimated {
        0
    } else {
        count_anomalies(&figures, balance, temperature.status, pumps.status)
    };

    let integrity_override = !estimated && figures.ratio_percent() > INTEGRITY_RATIO_LIMIT;
    if integrity_override {
        balance = WaterBalanceStatus::Warning;
        anomaly_count = 0;
    }

    let recommendations = recommend(&RecommendationInputs {
        figures: &figures,
        balance,
        temperature: &temperature,
        pumps: &pumps,
        min_records,
        estimated,
        integrity_override,
    });

    ConsumptionAnalysis {
        building_id,
        period: window.period_label(),
        window_start: window.start,
        window_end: window.end,
        window_days: window.days,
        data_source,
        total_cold_water: figures.cold_total,
        total_hot_water: figures.hot_total,
        difference: figures.cold_total - figures.hot_total,
        hot_to_cold_ratio_percent: figures.ratio_percent(),
        avg_cold_per_hour: figures.avg_cold_per_hour(),
        avg_hot_per_hour: figures.avg_hot_per_hour(),
        cold_records: figures.cold_count,
        hot_records: figures.hot_count,
        water_balance_status: balance,
        temperature,
        pumps,
        has_anomalies: anomaly_count > 0,
        anomaly_count,
        recommendations,
        generated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{PumpHealth, TemperatureStatus};
    use crate::recommendations::OPERATING_NORMALLY;
    use chrono::TimeZone;
    use itp_store::PumpStatus;

    fn window() -> AnalysisWindow {
        AnalysisWindow::ending_at(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(), 1).unwrap()
    }

    fn data(cold: f64, hot: f64, cold_count: u64, hot_count: u64) -> WindowData {
        WindowData {
            water: WaterAggregate {
                cold_total: cold,
                hot_total: hot,
                cold_count,
                hot_count,
            },
            temperature: TemperatureStats {
                avg_supply: 67.0,
                avg_return: 47.0,
                avg_delta: 20.0,
                min_delta: 19.0,
                max_delta: 21.0,
                count: 12,
            },
            pumps: vec![LatestPumpReading {
                label: "Pump-1".to_owned(),
                status: PumpStatus::Normal,
                operating_hours: 6500,
                pressure_in: 3.0,
                pressure_out: 5.0,
                vibration: 2.0,
                timestamp: window().end,
            }],
        }
    }

    #[test]
    fn healthy_window_reads_from_database() {
        let report = evaluate(Uuid::nil(), &window(), &data(240.0, 120.0, 48, 48), 7, window().end);
        assert_eq!(report.data_source, DataSource::Database);
        assert_eq!(report.water_balance_status, WaterBalanceStatus::Normal);
        assert_eq!(report.temperature_status(), TemperatureStatus::Normal);
        assert_eq!(report.pumps.status, PumpHealth::Normal);
        assert_eq!(report.hot_to_cold_ratio_percent, 50.0);
        assert_eq!(report.avg_cold_per_hour, 10.0);
        assert_eq!(report.difference, 120.0);
        assert!(!report.has_anomalies);
        assert_eq!(report.recommendations, vec![OPERATING_NORMALLY.to_owned()]);
        assert_eq!(report.period, "2024-01-31 to 2024-02-01");
    }

    #[test]
    fn sparse_cold_data_yields_estimate_without_anomalies() {
        let report = evaluate(Uuid::nil(), &window(), &data(30.0, 900.0, 3, 10), 7, window().end);
        assert_eq!(report.data_source, DataSource::Estimated);
        assert!(!report.has_anomalies);
        assert_eq!(report.anomaly_count, 0);
        assert_eq!(report.water_balance_status, WaterBalanceStatus::Unknown);
        assert_eq!(report.total_cold_water, 7.0 * 24.0);
        assert_eq!(report.total_hot_water, 4.0 * 24.0);
        assert_eq!(report.cold_records, 3);
        assert!(report
            .recommendations
            .contains(&"only 3 cold-water records found, analysis confidence reduced".to_owned()));
    }

    #[test]
    fn leak_raises_anomalies() {
        let report = evaluate(Uuid::nil(), &window(), &data(100.0, 90.0, 48, 48), 7, window().end);
        assert_eq!(report.water_balance_status, WaterBalanceStatus::Leak);
        assert_eq!(report.anomaly_count, 1);
        assert!(report.has_anomalies);
    }

    #[test]
    fn implausible_ratio_is_downgraded_to_warning() {
        let report = evaluate(Uuid::nil(), &window(), &data(100.0, 120.0, 48, 48), 7, window().end);
        assert_eq!(report.water_balance_status, WaterBalanceStatus::Warning);
        assert_eq!(report.anomaly_count, 0);
        assert!(!report.has_anomalies);
        assert!(report.recommendations[0].starts_with("Data integrity check"));
    }
}
