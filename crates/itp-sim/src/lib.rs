//! ---
//! itp_section: "11-simulation"
//! itp_subsection: "module"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "Synthetic value model for substation telemetry."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
//! Plausible flow, temperature and pump values for buildings without real
//! meters. Pure shaping functions live in [`profile`]; randomness is confined
//! to [`SyntheticModel`] so that tests can seed it.

pub mod model;
pub mod profile;

pub use model::{
    building_key, pump_base_hours, pump_count, pump_label, PumpSample, SyntheticModel,
    TemperatureSample, WaterSample,
};
pub use profile::{diurnal_factor, seasonal_offset, SeasonalOffset};
