//! Per-location fluctuation workers.
//!
//! Each registered location gets one [`FluctuationWorker`] running as its
//! own tokio task. The worker loops forever through three steps:
//!
//! 1. **Perturb** -- draw a headcount around the rounded corrected
//!    baseline with bounded symmetric noise ([`NoiseModel`]).
//! 2. **Publish** -- write it into its own snapshot entry.
//! 3. **Sleep** -- for a duration drawn from the location's interval.
//!
//! The only suspension points are the sleep and the entry's write lock.
//! Shutdown is checked when the sleep ends (or is cut short by the
//! signal), never between computing and writing a value.

use rand::Rng;
use rand::rngs::StdRng;
use tracing::{debug, info};
use uwcrowd_types::{DisplayState, LocationId};

use crate::correction::whole_people;
use crate::registry::Location;
use crate::schedule::SleepInterval;
use crate::shutdown::ShutdownSignal;
use crate::snapshot::SlotWriter;

/// Bounded symmetric noise around a fixed baseline.
///
/// `base = round(corrected)`, `magnitude = max(1, round(|corrected| * pct))`.
/// Every draw lies in `[max(0, base - magnitude), base + magnitude]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoiseModel {
    base: u32,
    magnitude: u32,
}

impl NoiseModel {
    /// Derive the model from a corrected count and a noise fraction.
    ///
    /// The magnitude has a floor of 1 so even tiny baselines visibly move.
    pub fn new(corrected_count: f64, noise_pct: f64) -> Self {
        let base = whole_people(corrected_count);
        let magnitude = whole_people(corrected_count.abs() * noise_pct).max(1);
        Self { base, magnitude }
    }

    /// The integer baseline.
    pub const fn base(&self) -> u32 {
        self.base
    }

    /// The largest possible deviation from the baseline.
    pub const fn magnitude(&self) -> u32 {
        self.magnitude
    }

    /// Draw one headcount, clamped at zero.
    pub fn sample(&self, rng: &mut impl Rng) -> u32 {
        let magnitude = i64::from(self.magnitude);
        let delta = rng.random_range(-magnitude..=magnitude);
        let people = i64::from(self.base).saturating_add(delta).max(0);
        u32::try_from(people).unwrap_or(u32::MAX)
    }
}

/// Why a worker stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    /// The worker's location.
    pub location: LocationId,
    /// Number of values written before exiting.
    pub updates: u64,
}

/// The task that owns one location's snapshot entry.
#[derive(Debug)]
pub struct FluctuationWorker {
    writer: SlotWriter,
    noise: NoiseModel,
    interval: SleepInterval,
    rng: StdRng,
    shutdown: ShutdownSignal,
}

impl FluctuationWorker {
    /// Create a worker for `location`, writing through `writer`.
    pub fn new(
        location: &Location,
        writer: SlotWriter,
        rng: StdRng,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            writer,
            noise: NoiseModel::new(location.baseline.corrected_count, location.noise_pct),
            interval: location.interval,
            rng,
            shutdown,
        }
    }

    /// The worker's noise model.
    pub const fn noise(&self) -> NoiseModel {
        self.noise
    }

    /// Perturb and write once. Returns the stored state.
    pub async fn step(&mut self) -> DisplayState {
        let people = self.noise.sample(&mut self.rng);
        let shown = self.writer.write(people).await;
        info!(
            location = %self.writer.id(),
            people = shown.people,
            percent_full = shown.percent_full,
            "Occupancy updated"
        );
        shown
    }

    /// Run until shutdown is signalled.
    ///
    /// A write that has started always completes before the worker looks
    /// at the signal again.
    pub async fn run(mut self) -> WorkerReport {
        let mut updates: u64 = 0;
        debug!(
            location = %self.writer.id(),
            base = self.noise.base(),
            magnitude = self.noise.magnitude(),
            min_interval_s = self.interval.min().as_secs_f64(),
            max_interval_s = self.interval.max().as_secs_f64(),
            "Fluctuation worker started"
        );

        while !self.shutdown.is_triggered() {
            self.step().await;
            updates = updates.saturating_add(1);

            let pause = self.interval.draw(&mut self.rng);
            tokio::select! {
                () = tokio::time::sleep(pause) => {}
                () = self.shutdown.wait() => break,
            }
        }

        debug!(location = %self.writer.id(), updates, "Fluctuation worker stopped");
        WorkerReport {
            location: self.writer.id().clone(),
            updates,
        }
    }
}
