//! Occupancy records in the device scanner's wire format.
//!
//! The scanner counts distinct nearby device addresses and posts a batch
//! shaped like:
//!
//! ```json
//! { "data": [{ "id": "e7", "name": "Engineering 7", "shortName": "E7",
//!              "currentOccupancy": 40, "maxCapacity": 1550,
//!              "coordinates": [43.4695, -80.5359] }] }
//! ```
//!
//! The engine reads such a batch once at startup as its raw-count source.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A single location's raw reading as reported by the scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct OccupancyRecord {
    /// Scanner-side identifier, usually the lower-cased short name.
    pub id: String,
    /// Full display name.
    #[serde(default)]
    pub name: String,
    /// Abbreviated display name.
    #[serde(default)]
    pub short_name: String,
    /// Number of distinct devices seen in the last scan.
    pub current_occupancy: f64,
    /// Building capacity as known to the scanner.
    #[serde(default)]
    pub max_capacity: Option<u32>,
    /// Latitude and longitude.
    #[serde(default)]
    pub coordinates: Option<[f64; 2]>,
}

/// A batch of records, the body the scanner posts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct OccupancyBatch {
    /// The records.
    pub data: Vec<OccupancyRecord>,
}

impl OccupancyBatch {
    /// Find the record for an identifier, ignoring ASCII case.
    pub fn find(&self, id: &str) -> Option<&OccupancyRecord> {
        self.data.iter().find(|r| r.id.eq_ignore_ascii_case(id))
    }
}
