//! Bias correction and capacity percentages.
//!
//! Raw sensor counts systematically under- or over-count (a device scan
//! only sees occupants carrying a discoverable device). The correction
//! factor is an empirically chosen divisor: `corrected = raw / factor`.
//! Everything here is pure and runs once per location at startup, except
//! [`percent_full`], which the fluctuation workers call on every update.
//!
//! # Capacity policy
//!
//! A missing or zero capacity never fails and never divides by zero: the
//! percentage is reported as `0.0`. The same rule applies to baselines
//! and to displayed values so the two surfaces always agree.

use std::num::NonZeroU32;

use uwcrowd_types::CorrectedBaseline;

/// Errors that prevent a location from being registered.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    /// The correction factor is zero, negative, or not a number.
    #[error("correction factor must be positive and finite, got {factor}")]
    NonPositiveCorrectionFactor {
        /// The rejected factor.
        factor: f64,
    },

    /// The raw count is negative or not a number.
    #[error("raw count must be non-negative and finite, got {raw_count}")]
    InvalidRawCount {
        /// The rejected raw count.
        raw_count: f64,
    },

    /// The noise fraction is negative or not a number.
    #[error("noise percentage must be non-negative and finite, got {noise_pct}")]
    InvalidNoise {
        /// The rejected noise fraction.
        noise_pct: f64,
    },

    /// The sleep interval bounds are inverted or not positive.
    #[error("invalid sleep interval [{min_seconds}, {max_seconds}]")]
    InvalidInterval {
        /// Configured lower bound.
        min_seconds: f64,
        /// Configured upper bound.
        max_seconds: f64,
    },
}

/// Round to one decimal place, halves away from zero.
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Percentage of capacity, rounded to one decimal.
///
/// Returns `0.0` when the capacity is missing.
pub fn percent_full(count: f64, capacity: Option<NonZeroU32>) -> f64 {
    capacity.map_or(0.0, |cap| {
        round_to_tenth(count / f64::from(cap.get()) * 100.0)
    })
}

/// Round a (possibly fractional) headcount to the nearest whole person.
///
/// Negative and `NaN` inputs yield zero; values beyond `u32::MAX` saturate.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn whole_people(count: f64) -> u32 {
    // Float-to-int `as` saturates and maps NaN to 0.
    count.round().max(0.0) as u32
}

/// Normalise a configured capacity: zero is treated the same as missing.
pub fn effective_capacity(capacity: Option<u32>) -> Option<NonZeroU32> {
    capacity.and_then(NonZeroU32::new)
}

/// Compute the corrected baseline for one location.
///
/// # Errors
///
/// Returns [`ConfigurationError::NonPositiveCorrectionFactor`] when
/// `correction_factor` is not a positive finite number, and
/// [`ConfigurationError::InvalidRawCount`] when `raw_count` is negative
/// or not finite.
pub fn correct(
    raw_count: f64,
    correction_factor: f64,
    capacity: Option<NonZeroU32>,
) -> Result<CorrectedBaseline, ConfigurationError> {
    if !(correction_factor.is_finite() && correction_factor > 0.0) {
        return Err(ConfigurationError::NonPositiveCorrectionFactor {
            factor: correction_factor,
        });
    }
    if !(raw_count.is_finite() && raw_count >= 0.0) {
        return Err(ConfigurationError::InvalidRawCount { raw_count });
    }

    let corrected_count = raw_count / correction_factor;
    Ok(CorrectedBaseline {
        corrected_count,
        percent_full: percent_full(corrected_count, capacity),
    })
}
