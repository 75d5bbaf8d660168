//! ---
//! itp_section: "11-simulation"
//! itp_subsection: "module"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "Time-of-day and seasonal shaping of synthetic values."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

/// Consumption multiplier for the given local hour (0-23).
///
/// Morning peak 07:00-10:59, evening peak 18:00-22:59, night trough
/// 23:00-06:59, daytime shoulder otherwise.
pub fn diurnal_factor(hour: u32) -> f64 {
    match hour % 24 {
        7..=10 => 1.3,
        18..=22 => 1.4,
        23 | 0..=6 => 0.7,
        _ => 1.1,
    }
}

/// Temperature shift applied on top of the base supply/return ranges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeasonalOffset {
    pub supply: f64,
    pub return_temp: f64,
}

impl SeasonalOffset {
    pub const NONE: SeasonalOffset = SeasonalOffset {
        supply: 0.0,
        return_temp: 0.0,
    };
}

/// Seasonal offset for a calendar month (1-12). Winter raises supply by 5 °C,
/// summer lowers it by 3 °C; the return side moves by half as much.
pub fn seasonal_offset(month: u32) -> SeasonalOffset {
    let supply = match month {
        12 | 1 | 2 => 5.0,
        6..=8 => -3.0,
        _ => return SeasonalOffset::NONE,
    };
    SeasonalOffset {
        supply,
        return_temp: supply / 2.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diurnal_bands_cover_the_day() {
        assert_eq!(diurnal_factor(7), 1.3);
        assert_eq!(diurnal_factor(10), 1.3);
        assert_eq!(diurnal_factor(11), 1.1);
        assert_eq!(diurnal_factor(17), 1.1);
        assert_eq!(diurnal_factor(18), 1.4);
        assert_eq!(diurnal_factor(22), 1.4);
        assert_eq!(diurnal_factor(23), 0.7);
        assert_eq!(diurnal_factor(0), 0.7);
        assert_eq!(diurnal_factor(6), 0.7);
    }

    #[test]
    fn seasons_shift_return_by_half() {
        let winter = seasonal_offset(1);
        assert_eq!(winter.supply, 5.0);
        assert_eq!(winter.return_temp, 2.5);
        let summer = seasonal_offset(7);
        assert_eq!(summer.supply, -3.0);
        assert_eq!(summer.return_temp, -1.5);
        assert_eq!(seasonal_offset(4), SeasonalOffset::NONE);
        assert_eq!(seasonal_offset(12), winter);
    }
}
