//! Occupancy engine core for UW Crowd.
//!
//! Turns one raw device count per location into a corrected baseline, then
//! keeps a live, gently fluctuating headcount for every location that the
//! dashboard polls from a JSON snapshot.
//!
//! # Architecture
//!
//! ```text
//! config + raw-count source --> LocationRegistry (correct, validate)
//!                                      |
//!                       SnapshotStore::from_registry
//!                        /             |            \
//!            FluctuationWorker  FluctuationWorker  ...   (one task each)
//!                        \             |            /
//!                     per-entry RwLock writes + change notify
//!                                      |
//!                                  Publisher --> ui_fluctuator.json
//! ```
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration with environment overrides
//! - [`correction`] -- Count correction and percentage arithmetic
//! - [`source`] -- Where startup raw counts come from
//! - [`schedule`] -- Per-location sleep intervals
//! - [`registry`] -- Validated, immutable location parameters
//! - [`snapshot`] -- The shared store with per-entry locking
//! - [`fluctuation`] -- Noise model and the per-location worker loop
//! - [`publisher`] -- Atomic JSON file surface and the publish loop
//! - [`shutdown`] -- Cooperative stop signal
//! - [`engine`] -- Spawning and orderly shutdown of all tasks

pub mod config;
pub mod correction;
pub mod engine;
pub mod fluctuation;
pub mod publisher;
pub mod registry;
pub mod schedule;
pub mod shutdown;
pub mod snapshot;
pub mod source;

pub use config::{ConfigError, EngineConfig, LocationConfig};
pub use correction::ConfigurationError;
pub use engine::{Engine, EngineReport, RunningEngine};
pub use publisher::{JsonFileSurface, PublishError, Publisher, PublisherReport};
pub use registry::{Location, LocationRegistry, RegistrationFailure, RegistryError};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use snapshot::{SlotWriter, SnapshotStore};
pub use source::{ConfiguredCounts, RawCountSource, RecordFileSource, SourceError, WithConfigFallback};
