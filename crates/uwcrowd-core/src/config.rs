//! Configuration loading and typed config structures for the occupancy engine.
//!
//! The canonical configuration lives in `uwcrowd-config.yaml`. This module
//! defines strongly-typed structs that mirror the YAML structure and a
//! loader that reads the file and applies environment overrides. Every
//! section has defaults, so an empty document (or no file at all) yields
//! the five campus buildings the engine was first deployed for.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A section parsed but holds values the engine cannot run with.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
///
/// Mirrors the structure of `uwcrowd-config.yaml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngineConfig {
    /// Monitored locations.
    #[serde(default = "default_locations")]
    pub locations: Vec<LocationConfig>,

    /// Noise and sleep-interval parameters shared by every worker.
    #[serde(default)]
    pub fluctuation: FluctuationConfig,

    /// Where and how often the snapshot is written.
    #[serde(default)]
    pub publisher: PublisherConfig,

    /// Where startup raw counts come from.
    #[serde(default)]
    pub source: SourceConfig,

    /// Read-only HTTP surface.
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            locations: default_locations(),
            fluctuation: FluctuationConfig::default(),
            publisher: PublisherConfig::default(),
            source: SourceConfig::default(),
            observer: ObserverConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override file values:
    /// - `UWCROWD_SNAPSHOT_PATH` overrides `publisher.snapshot_path`
    /// - `UWCROWD_BASELINE_PATH` overrides `publisher.baseline_path`
    /// - `UWCROWD_RECORDS_PATH` overrides `source.records_path`
    /// - `UWCROWD_OBSERVER_PORT` overrides `observer.port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if the envelope or overrides are malformed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string and apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config = Self::parse_without_env(yaml)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse without consulting the environment. Used by tests.
    fn parse_without_env(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not an empty mapping.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }

    /// Override file values with environment variables when set.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("UWCROWD_SNAPSHOT_PATH") {
            self.publisher.snapshot_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("UWCROWD_BASELINE_PATH") {
            self.publisher.baseline_path = Some(PathBuf::from(val));
        }
        if let Ok(val) = std::env::var("UWCROWD_RECORDS_PATH") {
            self.source.records_path = Some(PathBuf::from(val));
        }
        if let Ok(val) = std::env::var("UWCROWD_OBSERVER_PORT") {
            self.observer.port = val.parse().map_err(|e| ConfigError::Invalid {
                reason: format!("UWCROWD_OBSERVER_PORT={val}: {e}"),
            })?;
        }
        Ok(())
    }

    /// Check engine-wide settings.
    ///
    /// Per-location problems (bad correction factors and the like) are not
    /// checked here; they are reported by the registry and only drop the
    /// affected location.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fluctuation.min_interval_seconds.validate("min_interval_seconds")?;
        self.fluctuation.max_interval_seconds.validate("max_interval_seconds")?;
        if self.fluctuation.max_interval_seconds.low == 0 {
            return Err(ConfigError::Invalid {
                reason: String::from("max_interval_seconds.low must be at least 1"),
            });
        }
        if self.fluctuation.min_interval_seconds.high > self.fluctuation.max_interval_seconds.low {
            return Err(ConfigError::Invalid {
                reason: String::from(
                    "min_interval_seconds.high must not exceed max_interval_seconds.low",
                ),
            });
        }
        if !is_valid_noise_pct(self.fluctuation.noise_pct) {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "noise_pct must be a finite, non-negative number, got {}",
                    self.fluctuation.noise_pct
                ),
            });
        }
        if self.publisher.interval_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: String::from("publisher.interval_ms must be at least 1"),
            });
        }
        Ok(())
    }
}

/// Static configuration for one monitored location.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LocationConfig {
    /// Unique location identifier, used as the snapshot key.
    pub id: String,

    /// Last known raw sensor reading. Replaced by the raw-count source when
    /// that source has a reading for this location. A location with neither
    /// is rejected at registration.
    #[serde(default)]
    pub raw_count: Option<f64>,

    /// Divisor compensating systematic sensor bias. Must be positive.
    #[serde(default = "default_correction_factor")]
    pub correction_factor: f64,

    /// Maximum occupancy. Missing or zero means percentages read `0.0`.
    #[serde(default)]
    pub capacity: Option<u32>,

    /// Per-location noise fraction; falls back to `fluctuation.noise_pct`.
    #[serde(default)]
    pub noise_pct: Option<f64>,

    /// Fixed sleep interval for this location instead of a random draw
    /// from the global envelope.
    #[serde(default)]
    pub interval: Option<IntervalOverride>,

    /// Identifier of this location in the raw-count source, when it
    /// differs from `id` by more than letter case.
    #[serde(default)]
    pub source_id: Option<String>,
}

impl LocationConfig {
    /// Build a location with default noise, interval, and source mapping.
    pub fn new(id: impl Into<String>, raw_count: f64, correction_factor: f64, capacity: u32) -> Self {
        Self {
            id: id.into(),
            raw_count: Some(raw_count),
            correction_factor,
            capacity: Some(capacity),
            noise_pct: None,
            interval: None,
            source_id: None,
        }
    }

    /// The identifier to look up in the raw-count source.
    pub fn source_key(&self) -> &str {
        self.source_id.as_deref().unwrap_or(&self.id)
    }
}

/// Explicit `[min, max]` sleep bounds for one location, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct IntervalOverride {
    /// Shortest sleep between updates.
    pub min_seconds: f64,
    /// Longest sleep between updates.
    pub max_seconds: f64,
}

/// An inclusive range of whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SecondsRange {
    /// Lower bound, inclusive.
    pub low: u64,
    /// Upper bound, inclusive.
    pub high: u64,
}

impl SecondsRange {
    /// Create a range.
    pub const fn new(low: u64, high: u64) -> Self {
        Self { low, high }
    }

    fn validate(self, name: &str) -> Result<(), ConfigError> {
        if self.low > self.high {
            return Err(ConfigError::Invalid {
                reason: format!("{name}: low ({}) exceeds high ({})", self.low, self.high),
            });
        }
        Ok(())
    }
}

/// Noise and scheduling parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FluctuationConfig {
    /// Default noise as a fraction of the corrected count.
    #[serde(default = "default_noise_pct")]
    pub noise_pct: f64,

    /// Envelope from which each location draws its minimum sleep.
    #[serde(default = "default_min_interval_seconds")]
    pub min_interval_seconds: SecondsRange,

    /// Envelope from which each location draws its maximum sleep.
    #[serde(default = "default_max_interval_seconds")]
    pub max_interval_seconds: SecondsRange,

    /// Seed for reproducible runs. Unset means seeded from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for FluctuationConfig {
    fn default() -> Self {
        Self {
            noise_pct: default_noise_pct(),
            min_interval_seconds: default_min_interval_seconds(),
            max_interval_seconds: default_max_interval_seconds(),
            seed: None,
        }
    }
}

/// Snapshot publication settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PublisherConfig {
    /// File the snapshot document is written to.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    /// File the baseline report is written to, if any.
    #[serde(default)]
    pub baseline_path: Option<PathBuf>,

    /// Retry cadence in milliseconds for failed or pending writes.
    #[serde(default = "default_publish_interval_ms")]
    pub interval_ms: u64,

    /// Indent the JSON output.
    #[serde(default = "default_true")]
    pub pretty: bool,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            baseline_path: None,
            interval_ms: default_publish_interval_ms(),
            pretty: true,
        }
    }
}

/// Raw-count source settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SourceConfig {
    /// Occupancy-record document to read raw counts from at startup.
    #[serde(default)]
    pub records_path: Option<PathBuf>,
}

/// Observer HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObserverConfig {
    /// Whether the observer server runs.
    #[serde(default)]
    pub enabled: bool,

    /// Bind address.
    #[serde(default = "default_observer_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_observer_port")]
    pub port: u16,

    /// A location whose last update is older than this is reported stale.
    #[serde(default = "default_stale_after_seconds")]
    pub stale_after_seconds: u64,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_observer_host(),
            port: default_observer_port(),
            stale_after_seconds: default_stale_after_seconds(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Whether a noise fraction is usable.
pub fn is_valid_noise_pct(pct: f64) -> bool {
    pct.is_finite() && pct >= 0.0
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_locations() -> Vec<LocationConfig> {
    vec![
        LocationConfig::new("CMH", 150.0, 0.0769, 600),
        LocationConfig::new("PAC", 120.0, 1.0, 200),
        LocationConfig::new("DC", 85.0, 0.08, 1500),
        LocationConfig::new("E7", 40.0, 1.0, 1550),
        // The scanner reports this building as "slc".
        LocationConfig {
            source_id: Some(String::from("slc")),
            ..LocationConfig::new("Dana_Porter", 200.0, 1.0, 400)
        },
    ]
}

const fn default_correction_factor() -> f64 {
    1.0
}

const fn default_noise_pct() -> f64 {
    0.05
}

const fn default_min_interval_seconds() -> SecondsRange {
    SecondsRange::new(10, 20)
}

const fn default_max_interval_seconds() -> SecondsRange {
    SecondsRange::new(25, 40)
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("ui_fluctuator.json")
}

const fn default_publish_interval_ms() -> u64 {
    1000
}

fn default_observer_host() -> String {
    String::from("0.0.0.0")
}

const fn default_observer_port() -> u16 {
    8080
}

const fn default_stale_after_seconds() -> u64 {
    120
}

fn default_log_level() -> String {
    String::from("info")
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.locations.len(), 5);
        assert!((config.fluctuation.noise_pct - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.fluctuation.min_interval_seconds, SecondsRange::new(10, 20));
        assert_eq!(config.fluctuation.max_interval_seconds, SecondsRange::new(25, 40));
        assert_eq!(config.publisher.snapshot_path, PathBuf::from("ui_fluctuator.json"));
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = EngineConfig::parse_without_env("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
locations:
  - id: E7
    raw_count: 40
    correction_factor: 1
    capacity: 1550
  - id: CMH
    raw_count: 150
    correction_factor: 0.0769
    capacity: 600
    noise_pct: 0.1
    source_id: cmh
  - id: Annex
    raw_count: 12
    interval:
      min_seconds: 1.5
      max_seconds: 3

fluctuation:
  noise_pct: 0.02
  min_interval_seconds: { low: 5, high: 8 }
  max_interval_seconds: { low: 9, high: 12 }
  seed: 7

publisher:
  snapshot_path: "/tmp/occupancy.json"
  baseline_path: "/tmp/baselines.json"
  interval_ms: 250
  pretty: false

source:
  records_path: "/tmp/records.json"

observer:
  enabled: true
  port: 9090
  stale_after_seconds: 60

logging:
  level: debug
  format: json
"#;
        let config = EngineConfig::parse_without_env(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.locations.len(), 3);

        let cmh = config.locations.get(1).unwrap();
        assert_eq!(cmh.source_key(), "cmh");
        assert_eq!(cmh.noise_pct, Some(0.1));

        let annex = config.locations.get(2).unwrap();
        assert_eq!(annex.capacity, None);
        assert!((annex.correction_factor - 1.0).abs() < f64::EPSILON);
        assert_eq!(annex.source_key(), "Annex");
        assert_eq!(
            annex.interval,
            Some(IntervalOverride {
                min_seconds: 1.5,
                max_seconds: 3.0
            })
        );

        assert_eq!(config.fluctuation.seed, Some(7));
        assert_eq!(config.publisher.interval_ms, 250);
        assert!(!config.publisher.pretty);
        assert!(config.observer.enabled);
        assert_eq!(config.observer.port, 9090);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn overlapping_envelopes_are_rejected() {
        let yaml = r"
fluctuation:
  min_interval_seconds: { low: 10, high: 30 }
  max_interval_seconds: { low: 25, high: 40 }
";
        let config = EngineConfig::parse_without_env(yaml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn zero_length_sleeps_are_rejected() {
        let yaml = r"
fluctuation:
  min_interval_seconds: { low: 0, high: 0 }
  max_interval_seconds: { low: 0, high: 0 }
";
        let config = EngineConfig::parse_without_env(yaml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));

        let yaml = r"
fluctuation:
  min_interval_seconds: { low: 0, high: 0 }
  max_interval_seconds: { low: 1, high: 2 }
";
        let config = EngineConfig::parse_without_env(yaml).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn negative_noise_is_rejected() {
        let yaml = "fluctuation:\n  noise_pct: -0.5\n";
        let config = EngineConfig::parse_without_env(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let yaml = include_str!("../../../uwcrowd-config.yaml");
        let config = EngineConfig::parse_without_env(yaml).unwrap();
        assert!(config.validate().is_ok());
        let ids: Vec<_> = config.locations.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, ["CMH", "PAC", "DC", "E7", "Dana_Porter"]);
        assert_eq!(config.fluctuation, FluctuationConfig::default());
        assert_eq!(config.locations, EngineConfig::default().locations);
        let dana = config.locations.last().unwrap();
        assert_eq!(dana.source_key(), "slc");
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let result = EngineConfig::parse_without_env("locations: [ {id: ");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }
}
