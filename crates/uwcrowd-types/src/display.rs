//! Displayed occupancy and the documents built from it.
//!
//! [`DisplayState`] is the per-location pair the dashboard renders.
//! [`Snapshot`] is the full mapping that gets serialized to the external
//! surface; its JSON form is `{"E7": {"people": 41, "percent_full": 2.6}}`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::baseline::CorrectedBaseline;
use crate::ids::LocationId;

/// The headcount currently shown for one location.
///
/// `percent_full` is always derived from `people` and the location's
/// capacity, rounded to one decimal place. Both fields are written together;
/// readers never observe one without the other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DisplayState {
    /// Displayed headcount.
    pub people: u32,
    /// Displayed headcount as a percentage of capacity (one decimal).
    pub percent_full: f64,
}

/// Displayed state of every registered location, keyed by location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Snapshot(pub BTreeMap<LocationId, DisplayState>);

impl Snapshot {
    /// Look up one location's displayed state.
    pub fn get(&self, id: &str) -> Option<&DisplayState> {
        self.0.get(id)
    }

    /// Number of locations in the snapshot.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the snapshot holds no locations.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate locations in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&LocationId, &DisplayState)> {
        self.0.iter()
    }
}

impl FromIterator<(LocationId, DisplayState)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (LocationId, DisplayState)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Everything the observer knows about one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LocationView {
    /// The location.
    pub id: LocationId,
    /// Current displayed state.
    pub display: DisplayState,
    /// The corrected baseline the display fluctuates around.
    pub baseline: CorrectedBaseline,
    /// Configured capacity, absent when missing or zero.
    pub capacity: Option<u32>,
    /// Number of fluctuation updates written so far.
    pub updates: u64,
    /// Wall-clock time of the last write.
    pub updated_at: DateTime<Utc>,
}

/// Overall engine health as reported by `GET /health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum HealthStatus {
    /// Every location updated within the staleness threshold.
    Ok,
    /// At least one location has not updated within the threshold.
    Degraded,
}

/// Health report listing locations whose worker appears stalled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HealthReport {
    /// Overall status.
    pub status: HealthStatus,
    /// Number of registered locations.
    pub locations: u32,
    /// Locations that have not updated within the threshold.
    pub stale: Vec<LocationId>,
    /// When the check ran.
    pub checked_at: DateTime<Utc>,
}
