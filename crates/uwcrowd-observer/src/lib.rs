//! Read-only HTTP API for the UW Crowd occupancy engine.
//!
//! An Axum server exposing the live snapshot, per-location detail, the
//! startup baselines, and a health check that flags locations whose
//! worker has stopped updating. It never writes the store.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
