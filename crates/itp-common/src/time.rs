//! ---
//! itp_section: "01-core-functionality"
//! itp_subsection: "module"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "Shared primitives and utilities for the monitor runtime."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

/// Closed time range `[start, end]` covering a whole number of days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub days: u32,
}

impl AnalysisWindow {
    /// Window of `days` days ending at `end`. `None` when the start falls
    /// outside the representable date range.
    pub fn ending_at(end: DateTime<Utc>, days: u32) -> Option<Self> {
        let span = ChronoDuration::try_days(i64::from(days))?;
        Some(Self {
            start: end.checked_sub_signed(span)?,
            end,
            days,
        })
    }

    /// Window of `days` days ending now.
    pub fn trailing(days: u32) -> Option<Self> {
        Self::ending_at(Utc::now(), days)
    }

    pub fn hours(&self) -> f64 {
        f64::from(self.days) * 24.0
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    /// Human readable label, e.g. `2024-01-01 to 2024-01-31`.
    pub fn period_label(&self) -> String {
        format!(
            "{} to {}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// Whole days elapsed between `since` and `now`, never negative.
pub fn elapsed_days(since: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let days = (now - since).num_days();
    u32::try_from(days.max(0)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_spans_requested_days() {
        let end = Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap();
        let window = AnalysisWindow::ending_at(end, 30).unwrap();
        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
        assert_eq!(window.hours(), 720.0);
        assert_eq!(window.period_label(), "2024-03-01 to 2024-03-31");
        assert!(window.contains(window.start));
        assert!(window.contains(window.end));
        assert!(!window.contains(end + ChronoDuration::seconds(1)));
    }

    #[test]
    fn window_past_date_range_is_none() {
        let end = Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap();
        assert!(AnalysisWindow::ending_at(end, 200_000_000).is_none());
        assert!(AnalysisWindow::ending_at(end, u32::MAX).is_none());
    }

    #[test]
    fn elapsed_days_clamps_future_dates() {
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap();
        assert_eq!(elapsed_days(now - ChronoDuration::days(10), now), 10);
        assert_eq!(elapsed_days(now + ChronoDuration::days(2), now), 0);
    }
}
