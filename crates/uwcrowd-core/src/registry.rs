//! The location registry: validated, immutable per-location parameters.
//!
//! Building the registry is the only place configuration errors surface.
//! A location whose parameters are invalid is reported as a
//! [`RegistrationFailure`] and left out; every other location is still
//! registered and will run.

use std::collections::BTreeMap;
use std::num::NonZeroU32;

use rand::Rng;
use tracing::{info, warn};
use uwcrowd_types::{BaselineEntry, BaselineReport, CorrectedBaseline, LocationId};

use crate::config::{FluctuationConfig, LocationConfig, is_valid_noise_pct};
use crate::correction::{self, ConfigurationError};
use crate::schedule::SleepInterval;
use crate::source::RawCountSource;

/// Reasons a configured location could not be registered.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    /// The location's parameters are invalid.
    #[error("{source}")]
    Configuration {
        /// The underlying configuration error.
        #[from]
        source: ConfigurationError,
    },

    /// Another location already uses this identifier.
    #[error("duplicate location id")]
    DuplicateId,
}

/// A location that was left out of the registry, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationFailure {
    /// The configured identifier.
    pub id: String,
    /// What was wrong with it.
    pub error: RegistryError,
}

/// Everything a fluctuation worker needs to know about its location.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    /// Snapshot key.
    pub id: LocationId,
    /// Raw count the baseline was derived from.
    pub raw_count: f64,
    /// Divisor applied to the raw count.
    pub correction_factor: f64,
    /// Capacity; `None` when missing or zero.
    pub capacity: Option<NonZeroU32>,
    /// Corrected baseline, fixed for the lifetime of the process.
    pub baseline: CorrectedBaseline,
    /// Noise as a fraction of the corrected count.
    pub noise_pct: f64,
    /// Range this location's sleeps are drawn from.
    pub interval: SleepInterval,
}

impl Location {
    /// Validate one configured location against a raw count.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] for a non-positive correction
    /// factor, an invalid raw count, noise fraction, or interval override.
    pub fn from_config(
        config: &LocationConfig,
        raw_count: f64,
        fluctuation: &FluctuationConfig,
        rng: &mut impl Rng,
    ) -> Result<Self, ConfigurationError> {
        let capacity = correction::effective_capacity(config.capacity);
        let baseline = correction::correct(raw_count, config.correction_factor, capacity)?;

        let noise_pct = config.noise_pct.unwrap_or(fluctuation.noise_pct);
        if !is_valid_noise_pct(noise_pct) {
            return Err(ConfigurationError::InvalidNoise { noise_pct });
        }

        let interval = match config.interval {
            Some(fixed) => SleepInterval::from_override(fixed)?,
            None => SleepInterval::pick(fluctuation, rng),
        };

        Ok(Self {
            id: LocationId::new(config.id.clone()),
            raw_count,
            correction_factor: config.correction_factor,
            capacity,
            baseline,
            noise_pct,
            interval,
        })
    }

    /// The baseline report row for this location.
    pub fn baseline_entry(&self) -> BaselineEntry {
        BaselineEntry {
            raw_count: self.raw_count,
            correction_factor: self.correction_factor,
            capacity: self.capacity.map(NonZeroU32::get),
            baseline: self.baseline,
        }
    }
}

/// The set of registered locations. Fixed after construction.
#[derive(Debug, Clone, Default)]
pub struct LocationRegistry {
    locations: BTreeMap<LocationId, Location>,
}

impl LocationRegistry {
    /// Validate every configured location.
    ///
    /// Raw counts come from `source`. A location the source has no
    /// reading for is rejected with [`ConfigurationError::InvalidRawCount`].
    pub fn build(
        configs: &[LocationConfig],
        fluctuation: &FluctuationConfig,
        source: &dyn RawCountSource,
        rng: &mut impl Rng,
    ) -> (Self, Vec<RegistrationFailure>) {
        let mut locations: BTreeMap<LocationId, Location> = BTreeMap::new();
        let mut failures = Vec::new();

        for config in configs {
            if locations.contains_key(config.id.as_str()) {
                warn!(location = config.id, "Duplicate location id, skipping");
                failures.push(RegistrationFailure {
                    id: config.id.clone(),
                    error: RegistryError::DuplicateId,
                });
                continue;
            }

            let raw_count = source.raw_count(config).unwrap_or(f64::NAN);
            match Location::from_config(config, raw_count, fluctuation, rng) {
                Ok(location) => {
                    if location.capacity.is_none() {
                        warn!(
                            location = config.id,
                            "Capacity missing or zero, percentages will read 0.0"
                        );
                    }
                    info!(
                        location = config.id,
                        source = source.name(),
                        raw_count,
                        correction_factor = config.correction_factor,
                        corrected_count = location.baseline.corrected_count,
                        percent_full = location.baseline.percent_full,
                        min_interval_s = location.interval.min().as_secs_f64(),
                        max_interval_s = location.interval.max().as_secs_f64(),
                        "Location registered"
                    );
                    locations.insert(location.id.clone(), location);
                }
                Err(e) => {
                    warn!(location = config.id, error = %e, "Location rejected");
                    failures.push(RegistrationFailure {
                        id: config.id.clone(),
                        error: e.into(),
                    });
                }
            }
        }

        (Self { locations }, failures)
    }

    /// Build a registry from already-validated locations.
    pub fn from_locations(locations: impl IntoIterator<Item = Location>) -> Self {
        Self {
            locations: locations
                .into_iter()
                .map(|loc| (loc.id.clone(), loc))
                .collect(),
        }
    }

    /// Look up a location.
    pub fn get(&self, id: &str) -> Option<&Location> {
        self.locations.get(id)
    }

    /// Iterate locations in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.locations.values()
    }

    /// Number of registered locations.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    /// Whether no location registered.
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Non-fluctuated figures for every location.
    pub fn baseline_report(&self) -> BaselineReport {
        BaselineReport(
            self.locations
                .iter()
                .map(|(id, loc)| (id.clone(), loc.baseline_entry()))
                .collect(),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::source::ConfiguredCounts;

    fn build(configs: &[LocationConfig]) -> (LocationRegistry, Vec<RegistrationFailure>) {
        let mut rng = StdRng::seed_from_u64(1);
        LocationRegistry::build(
            configs,
            &FluctuationConfig::default(),
            &ConfiguredCounts,
            &mut rng,
        )
    }

    #[test]
    fn bad_factor_drops_only_that_location() {
        let configs = vec![
            LocationConfig::new("E7", 40.0, 1.0, 1550),
            LocationConfig::new("BROKEN", 10.0, 0.0, 100),
            LocationConfig::new("PAC", 120.0, 1.0, 200),
        ];
        let (registry, failures) = build(&configs);

        assert_eq!(registry.len(), 2);
        assert!(registry.get("BROKEN").is_none());
        assert_eq!(failures.len(), 1);
        let failure = failures.first().unwrap();
        assert_eq!(failure.id, "BROKEN");
        assert!(matches!(
            failure.error,
            RegistryError::Configuration {
                source: ConfigurationError::NonPositiveCorrectionFactor { .. }
            }
        ));
    }

    #[test]
    fn location_without_reading_is_rejected() {
        let yaml_like = LocationConfig {
            raw_count: None,
            ..LocationConfig::new("MC", 0.0, 1.0, 300)
        };
        let (registry, failures) = build(&[yaml_like]);
        assert!(registry.is_empty());
        assert!(matches!(
            failures.first().unwrap().error,
            RegistryError::Configuration {
                source: ConfigurationError::InvalidRawCount { .. }
            }
        ));
    }

    #[test]
    fn duplicate_ids_keep_the_first() {
        let configs = vec![
            LocationConfig::new("DC", 85.0, 0.08, 1500),
            LocationConfig::new("DC", 1.0, 1.0, 1),
        ];
        let (registry, failures) = build(&configs);
        assert_eq!(registry.len(), 1);
        assert!((registry.get("DC").unwrap().raw_count - 85.0).abs() < f64::EPSILON);
        assert_eq!(failures.first().unwrap().error, RegistryError::DuplicateId);
    }

    #[test]
    fn location_noise_overrides_global() {
        let mut config = LocationConfig::new("CMH", 150.0, 0.0769, 600);
        config.noise_pct = Some(0.2);
        let (registry, _) = build(&[config]);
        assert!((registry.get("CMH").unwrap().noise_pct - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_interval_override_is_rejected() {
        let mut config = LocationConfig::new("PAC", 120.0, 1.0, 200);
        config.interval = Some(crate::config::IntervalOverride {
            min_seconds: 9.0,
            max_seconds: 3.0,
        });
        let (registry, failures) = build(&[config]);
        assert!(registry.is_empty());
        assert_eq!(failures.len(), 1);
    }

    #[test]
    fn baseline_report_matches_locations() {
        let (registry, _) = build(&[
            LocationConfig::new("E7", 40.0, 1.0, 1550),
            LocationConfig {
                capacity: None,
                ..LocationConfig::new("Annex", 12.0, 1.0, 0)
            },
        ]);
        let report = registry.baseline_report();
        let e7 = report.get("E7").unwrap();
        assert!((e7.baseline.percent_full - 2.6).abs() < 1e-9);
        assert_eq!(e7.capacity, Some(1550));
        let annex = report.get("Annex").unwrap();
        assert_eq!(annex.capacity, None);
        assert!(annex.baseline.percent_full.abs() < f64::EPSILON);
    }
}
