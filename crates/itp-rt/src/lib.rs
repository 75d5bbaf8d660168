//! ---
//! itp_section: "01-core-functionality"
//! itp_subsection: "module"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "Runtime helpers supporting the telemetry generator."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
//! Periodic scheduling and cancellation helpers for the ITP monitor runtime.

pub mod cancellation;
pub mod scheduling;

pub use cancellation::{cancellation, CancelSource, CancelToken};
pub use scheduling::{PeriodicTicker, TaskGroup};
