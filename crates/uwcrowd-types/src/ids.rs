//! Location identifiers.
//!
//! Locations are keyed by short human-chosen names (`"E7"`, `"DC"`,
//! `"Dana_Porter"`) rather than generated UUIDs, because the same names
//! appear in the dashboard and in the scanner's records.

use std::borrow::Borrow;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Unique identifier for a monitored location.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LocationId(pub String);

impl LocationId {
    /// Create an identifier from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against an external identifier.
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl core::fmt::Display for LocationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LocationId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for LocationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// Lets `BTreeMap<LocationId, _>` be queried with a plain `&str`.
impl Borrow<str> for LocationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}
