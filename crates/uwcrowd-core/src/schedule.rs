//! Per-location sleep intervals.
//!
//! Each location draws its own `[min, max]` once at startup from a global
//! envelope, then draws every individual sleep uniformly from that range.
//! Two layers of randomness keep the locations visibly out of step.

use std::time::Duration;

use rand::Rng;

use crate::config::{FluctuationConfig, IntervalOverride, SecondsRange};
use crate::correction::ConfigurationError;

/// The range a single location's sleeps are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepInterval {
    min: Duration,
    max: Duration,
}

impl SleepInterval {
    /// Create an interval.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidInterval`] if `min > max` or
    /// `max` is zero.
    pub fn new(min: Duration, max: Duration) -> Result<Self, ConfigurationError> {
        if min > max || max.is_zero() {
            return Err(ConfigurationError::InvalidInterval {
                min_seconds: min.as_secs_f64(),
                max_seconds: max.as_secs_f64(),
            });
        }
        Ok(Self { min, max })
    }

    /// Build from a per-location override given in fractional seconds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidInterval`] for negative,
    /// non-finite, or inverted bounds.
    pub fn from_override(interval: IntervalOverride) -> Result<Self, ConfigurationError> {
        let invalid = || ConfigurationError::InvalidInterval {
            min_seconds: interval.min_seconds,
            max_seconds: interval.max_seconds,
        };
        let min = Duration::try_from_secs_f64(interval.min_seconds)
            .ok()
            .ok_or_else(invalid)?;
        let max = Duration::try_from_secs_f64(interval.max_seconds)
            .ok()
            .ok_or_else(invalid)?;
        Self::new(min, max)
    }

    /// Pick a location's interval from the global envelope.
    pub fn pick(envelope: &FluctuationConfig, rng: &mut impl Rng) -> Self {
        let min = Duration::from_secs(draw_seconds(envelope.min_interval_seconds, rng));
        // Sleeps are never zero-length, even for an unvalidated envelope.
        let max = Duration::from_secs(draw_seconds(envelope.max_interval_seconds, rng).max(1));
        // Validated envelopes never overlap, but a hand-built one might.
        Self {
            min: min.min(max),
            max: max.max(min),
        }
    }

    /// Shortest sleep.
    pub const fn min(&self) -> Duration {
        self.min
    }

    /// Longest sleep.
    pub const fn max(&self) -> Duration {
        self.max
    }

    /// Draw one sleep duration uniformly from `[min, max]`.
    pub fn draw(&self, rng: &mut impl Rng) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let secs = rng.random_range(self.min.as_secs_f64()..=self.max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

fn draw_seconds(range: SecondsRange, rng: &mut impl Rng) -> u64 {
    if range.low >= range.high {
        return range.low;
    }
    rng.random_range(range.low..=range.high)
}
