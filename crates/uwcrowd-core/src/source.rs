//! Raw-count sources.
//!
//! The engine reads one raw count per location exactly once, at startup.
//! Where that number comes from is abstracted behind [`RawCountSource`]:
//!
//! - [`ConfiguredCounts`] -- the `raw_count` values written in the config
//!   file. Always available; used as the fallback.
//! - [`RecordFileSource`] -- the last batch of occupancy records written
//!   by the device scanner, in its `{"data": [...]}` wire format.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use uwcrowd_types::OccupancyBatch;

use crate::config::LocationConfig;

/// Errors that can occur while loading a raw-count source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The record document could not be read.
    #[error("failed to read occupancy records from {path}: {source}")]
    Io {
        /// The file that was read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The record document is not valid JSON or has the wrong shape.
    #[error("failed to parse occupancy records from {path}: {source}")]
    Parse {
        /// The file that was parsed.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },
}

/// Supplies the startup raw count for a location.
pub trait RawCountSource {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// The raw count for `location`, or `None` if this source has no
    /// reading for it.
    fn raw_count(&self, location: &LocationConfig) -> Option<f64>;
}

/// Raw counts taken verbatim from the configuration file.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfiguredCounts;

impl RawCountSource for ConfiguredCounts {
    fn name(&self) -> &'static str {
        "config"
    }

    fn raw_count(&self, location: &LocationConfig) -> Option<f64> {
        location.raw_count
    }
}

/// Raw counts read from a scanner occupancy-record document.
///
/// Locations are matched on [`LocationConfig::source_key`], ignoring ASCII
/// case, so a config entry `E7` picks up the scanner's `e7` record.
#[derive(Debug, Clone)]
pub struct RecordFileSource {
    batch: OccupancyBatch,
}

impl RecordFileSource {
    /// Load and parse the record document at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Io`] if the file cannot be read and
    /// [`SourceError::Parse`] if it is not a valid record batch.
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let batch: OccupancyBatch =
            serde_json::from_str(&contents).map_err(|source| SourceError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        info!(
            path = %path.display(),
            records = batch.data.len(),
            "Occupancy records loaded"
        );
        Ok(Self { batch })
    }

    /// Wrap an already-parsed batch.
    pub const fn from_batch(batch: OccupancyBatch) -> Self {
        Self { batch }
    }
}

impl RawCountSource for RecordFileSource {
    fn name(&self) -> &'static str {
        "records"
    }

    fn raw_count(&self, location: &LocationConfig) -> Option<f64> {
        let record = self.batch.find(location.source_key())?;
        debug!(
            location = location.id,
            record = record.id,
            raw_count = record.current_occupancy,
            "Matched scanner record"
        );
        Some(record.current_occupancy)
    }
}

/// A source that consults `primary` first and falls back to the config.
#[derive(Debug, Clone)]
pub struct WithConfigFallback<S> {
    primary: S,
}

impl<S: RawCountSource> WithConfigFallback<S> {
    /// Wrap `primary`.
    pub const fn new(primary: S) -> Self {
        Self { primary }
    }
}

impl<S: RawCountSource> RawCountSource for WithConfigFallback<S> {
    fn name(&self) -> &'static str {
        self.primary.name()
    }

    fn raw_count(&self, location: &LocationConfig) -> Option<f64> {
        self.primary
            .raw_count(location)
            .or_else(|| ConfiguredCounts.raw_count(location))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write as _;

    use uwcrowd_types::OccupancyRecord;

    use super::*;

    fn record(id: &str, occupancy: f64) -> OccupancyRecord {
        OccupancyRecord {
            id: id.to_owned(),
            name: String::new(),
            short_name: String::new(),
            current_occupancy: occupancy,
            max_capacity: None,
            coordinates: None,
        }
    }

    #[test]
    fn configured_counts_echo_config() {
        let loc = LocationConfig::new("E7", 40.0, 1.0, 1550);
        assert_eq!(ConfiguredCounts.raw_count(&loc), Some(40.0));

        let unread = LocationConfig {
            raw_count: None,
            ..loc
        };
        assert_eq!(ConfiguredCounts.raw_count(&unread), None);
    }

    #[test]
    fn records_match_case_insensitively_and_by_alias() {
        let source = RecordFileSource::from_batch(OccupancyBatch {
            data: vec![record("e7", 52.0), record("slc", 310.0)],
        });

        let e7 = LocationConfig::new("E7", 40.0, 1.0, 1550);
        assert_eq!(source.raw_count(&e7), Some(52.0));

        let mut dana = LocationConfig::new("Dana_Porter", 200.0, 1.0, 400);
        assert_eq!(source.raw_count(&dana), None);
        dana.source_id = Some(String::from("SLC"));
        assert_eq!(source.raw_count(&dana), Some(310.0));
    }

    #[test]
    fn fallback_uses_config_when_unmatched() {
        let source = WithConfigFallback::new(RecordFileSource::from_batch(OccupancyBatch {
            data: vec![record("pac", 99.0)],
        }));
        let pac = LocationConfig::new("PAC", 120.0, 1.0, 200);
        let dc = LocationConfig::new("DC", 85.0, 0.08, 1500);
        assert_eq!(source.raw_count(&pac), Some(99.0));
        assert_eq!(source.raw_count(&dc), Some(85.0));
    }

    #[test]
    fn load_reads_scanner_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"data":[{{"id":"dc","currentOccupancy":85,"maxCapacity":1500}}]}}"#
        )
        .unwrap();
        let source = RecordFileSource::load(file.path()).unwrap();
        let dc = LocationConfig::new("DC", 0.0, 0.08, 1500);
        assert_eq!(source.raw_count(&dc), Some(85.0));
    }

    #[test]
    fn load_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            RecordFileSource::load(file.path()),
            Err(SourceError::Parse { .. })
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(matches!(
            RecordFileSource::load(&missing),
            Err(SourceError::Io { .. })
        ));
    }
}
