//! Corrected baselines.
//!
//! A baseline is computed once per location at startup and never changes.
//! The [`BaselineReport`] is what the analytics summarizer consumes: the
//! non-fluctuated corrected counts and percentages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::LocationId;

/// Bias-corrected occupancy estimate for one location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CorrectedBaseline {
    /// Raw count divided by the correction factor. May be fractional.
    pub corrected_count: f64,
    /// Corrected count as a percentage of capacity (one decimal).
    pub percent_full: f64,
}

/// One row of the baseline report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BaselineEntry {
    /// The raw sensor reading the baseline was derived from.
    pub raw_count: f64,
    /// Divisor applied to the raw count.
    pub correction_factor: f64,
    /// Configured capacity, absent when missing or zero.
    pub capacity: Option<u32>,
    /// The corrected figures.
    #[serde(flatten)]
    pub baseline: CorrectedBaseline,
}

/// Baselines for every registered location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BaselineReport(pub BTreeMap<LocationId, BaselineEntry>);

impl BaselineReport {
    /// Look up one location's baseline row.
    pub fn get(&self, id: &str) -> Option<&BaselineEntry> {
        self.0.get(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn entry_flattens_baseline() {
        let entry = BaselineEntry {
            raw_count: 40.0,
            correction_factor: 1.0,
            capacity: Some(1550),
            baseline: CorrectedBaseline {
                corrected_count: 40.0,
                percent_full: 2.6,
            },
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["corrected_count"], 40.0);
        assert_eq!(json["percent_full"], 2.6);
        assert_eq!(json["capacity"], 1550);
    }
}
