//! Shared application state for the observer API.
//!
//! [`AppState`] holds a clone of the engine's [`SnapshotStore`] handle, so
//! every request reads the same per-entry locks the workers write. Reads
//! only ever take read locks, one entry at a time; the observer cannot
//! stall a worker for longer than a single copy.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use uwcrowd_core::SnapshotStore;
use uwcrowd_types::{BaselineReport, HealthReport, HealthStatus};

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`](std::sync::Arc) and injected via Axum's `State`
/// extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The live snapshot store.
    pub store: SnapshotStore,
    /// Baseline figures computed at startup.
    pub baselines: BaselineReport,
    /// A location that has not updated for longer than this is stale.
    pub stale_after: Duration,
}

impl AppState {
    /// Create the state served by the observer.
    pub const fn new(store: SnapshotStore, baselines: BaselineReport, stale_after: Duration) -> Self {
        Self {
            store,
            baselines,
            stale_after,
        }
    }

    /// Health as of `now`.
    ///
    /// A location is stale when its last write (or startup, if it has
    /// never written) is more than `stale_after` before `now`.
    pub async fn health_at(&self, now: DateTime<Utc>) -> HealthReport {
        let threshold = TimeDelta::from_std(self.stale_after).unwrap_or(TimeDelta::MAX);
        let entries = self.store.entries().await;

        let stale: Vec<_> = entries
            .iter()
            .filter(|(_, record)| now.signed_duration_since(record.updated_at) > threshold)
            .map(|(id, _)| id.clone())
            .collect();

        let status = if stale.is_empty() {
            HealthStatus::Ok
        } else {
            HealthStatus::Degraded
        };

        HealthReport {
            status,
            locations: u32::try_from(entries.len()).unwrap_or(u32::MAX),
            stale,
            checked_at: now,
        }
    }
}
