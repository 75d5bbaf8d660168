//! ---
//! itp_section: "01-core-functionality"
//! itp_subsection: "module"
//! itp_type: "source"
//! itp_scope: "code"
//! itp_description: "Primary orchestration and lifecycle management."
//! itp_version: "v0.0.0-prealpha"
//! itp_owner: "tbd"
//! ---
//! Service context, continuous telemetry generator and demo seeding for the
//! ITP monitor.

pub mod context;
pub mod generator;
pub mod notify;
pub mod seed;
mod workers;

pub use context::{ItpMonitor, ServiceContext};
pub use generator::ContinuousGenerator;
pub use notify::{BroadcastNotifier, DataNotifier, LogNotifier, NewDataEvent};
pub use seed::{backfill_history, demo_building_ids, seed_demo_buildings, BackfillSummary};
