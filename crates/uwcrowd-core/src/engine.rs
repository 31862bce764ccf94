//! Wiring: registry in, running workers and publisher out.
//!
//! [`Engine::start`] builds the snapshot store from a registry, spawns one
//! [`FluctuationWorker`] task per location and a single [`Publisher`] task,
//! and returns a [`RunningEngine`]. Shutdown runs in two phases: workers
//! are signalled and joined first, then the publisher is told to stop and
//! flushes the final state. Nothing writes the store after the workers
//! have been joined.

use std::time::Duration;

use futures::future::join_all;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::EngineConfig;
use crate::fluctuation::{FluctuationWorker, WorkerReport};
use crate::publisher::{JsonFileSurface, Publisher, PublisherReport};
use crate::registry::LocationRegistry;
use crate::shutdown::{Shutdown, ShutdownSignal};
use crate::snapshot::SnapshotStore;

/// Summary of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineReport {
    /// One entry per worker that exited cleanly.
    pub workers: Vec<WorkerReport>,
    /// Workers whose task panicked or was cancelled.
    pub failed_workers: usize,
    /// Publisher counters, if the publisher task completed.
    pub publisher: Option<PublisherReport>,
}

impl EngineReport {
    /// Total writes across every worker.
    pub fn total_updates(&self) -> u64 {
        self.workers
            .iter()
            .fold(0_u64, |acc, w| acc.saturating_add(w.updates))
    }
}

/// Entry point for starting the engine.
#[derive(Debug)]
pub struct Engine;

impl Engine {
    /// Spawn every worker and the publisher on the current tokio runtime.
    ///
    /// Worker RNGs are seeded from `fluctuation.seed` when set (each
    /// location gets `seed + index`) and from the thread RNG otherwise.
    pub fn start(registry: &LocationRegistry, config: &EngineConfig) -> RunningEngine {
        let (store, writers) = SnapshotStore::from_registry(registry);
        let shutdown = Shutdown::new();
        let publisher_stop = Shutdown::new();

        let mut workers = Vec::with_capacity(writers.len());
        for (index, writer) in writers.into_iter().enumerate() {
            let Some(location) = registry.get(writer.id().as_str()) else {
                continue;
            };
            let rng = worker_rng(config.fluctuation.seed, index);
            let worker = FluctuationWorker::new(location, writer, rng, shutdown.signal());
            workers.push(tokio::spawn(worker.run()));
        }

        let mut publisher = Publisher::new(
            store.clone(),
            JsonFileSurface::new(&config.publisher.snapshot_path, config.publisher.pretty),
            Duration::from_millis(config.publisher.interval_ms),
            publisher_stop.signal(),
        );
        if let Some(path) = &config.publisher.baseline_path {
            publisher = publisher.with_baseline(
                JsonFileSurface::new(path, config.publisher.pretty),
                registry.baseline_report(),
            );
        }
        let publisher_handle = tokio::spawn(publisher.run());

        info!(
            workers = workers.len(),
            snapshot_path = %config.publisher.snapshot_path.display(),
            "Engine started"
        );

        RunningEngine {
            store,
            shutdown,
            workers,
            publisher_stop,
            publisher: publisher_handle,
        }
    }
}

fn worker_rng(seed: Option<u64>, index: usize) -> StdRng {
    match seed {
        Some(seed) => {
            let offset = u64::try_from(index).unwrap_or(u64::MAX);
            StdRng::seed_from_u64(seed.wrapping_add(offset))
        }
        None => StdRng::from_rng(&mut rand::rng()),
    }
}

/// Handles to a running engine.
#[derive(Debug)]
pub struct RunningEngine {
    store: SnapshotStore,
    shutdown: Shutdown,
    workers: Vec<JoinHandle<WorkerReport>>,
    publisher_stop: Shutdown,
    publisher: JoinHandle<PublisherReport>,
}

impl RunningEngine {
    /// The shared snapshot store.
    pub const fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// A listener that fires when shutdown begins, for tasks that should
    /// stop alongside the workers (the observer server).
    pub fn signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Number of worker tasks spawned.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop every worker, wait for them, then flush and stop the publisher.
    pub async fn shutdown(self) -> EngineReport {
        info!(workers = self.workers.len(), "Shutdown requested");
        self.shutdown.trigger();

        let mut report = EngineReport::default();
        for joined in join_all(self.workers).await {
            match joined {
                Ok(worker) => report.workers.push(worker),
                Err(e) => {
                    error!(error = %e, "Fluctuation worker failed");
                    report.failed_workers = report.failed_workers.saturating_add(1);
                }
            }
        }

        self.publisher_stop.trigger();
        match self.publisher.await {
            Ok(publisher) => report.publisher = Some(publisher),
            Err(e) => error!(error = %e, "Publisher task failed"),
        }

        info!(
            workers = report.workers.len(),
            failed_workers = report.failed_workers,
            total_updates = report.total_updates(),
            "Engine stopped"
        );
        report
    }
}
