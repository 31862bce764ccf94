//! Shared type definitions for the UW Crowd occupancy engine.
//!
//! Everything that crosses a process boundary lives here: the snapshot
//! document the dashboard polls, the baseline figures the summarizer reads,
//! and the occupancy records the device scanner produces. Types flow
//! downstream to `TypeScript` via `ts-rs` for the dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- The [`LocationId`] key used by every map in the workspace
//! - [`display`] -- Displayed occupancy, the snapshot document, and
//!   per-location observer views
//! - [`baseline`] -- Corrected baselines and the baseline report
//! - [`records`] -- Occupancy records in the scanner's wire format

pub mod baseline;
pub mod display;
pub mod ids;
pub mod records;

pub use baseline::{BaselineEntry, BaselineReport, CorrectedBaseline};
pub use display::{DisplayState, HealthReport, HealthStatus, LocationView, Snapshot};
pub use ids::LocationId;
pub use records::{OccupancyBatch, OccupancyRecord};
