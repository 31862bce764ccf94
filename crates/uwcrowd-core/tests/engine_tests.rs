//! Integration tests for the running engine.
//!
//! These start real worker and publisher tasks against a temporary
//! directory, using short per-location interval overrides so a run takes
//! well under a second of wall-clock time.

#![allow(clippy::unwrap_used)]

use std::num::NonZeroU32;
use std::path::Path;
use std::time::Duration;

use futures::future::join_all;
use rand::SeedableRng;
use rand::rngs::StdRng;
use uwcrowd_core::config::IntervalOverride;
use uwcrowd_core::correction::percent_full;
use uwcrowd_core::{
    ConfiguredCounts, Engine, EngineConfig, LocationConfig, LocationRegistry, SnapshotStore,
};
use uwcrowd_types::{BaselineReport, Snapshot};

fn fast(mut location: LocationConfig) -> LocationConfig {
    location.interval = Some(IntervalOverride {
        min_seconds: 0.005,
        max_seconds: 0.02,
    });
    location
}

fn config_in(dir: &Path, locations: Vec<LocationConfig>) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.locations = locations;
    config.fluctuation.seed = Some(42);
    config.publisher.snapshot_path = dir.join("ui_fluctuator.json");
    config.publisher.baseline_path = Some(dir.join("baselines.json"));
    config.publisher.interval_ms = 10;
    config
}

fn build(config: &EngineConfig) -> (LocationRegistry, usize) {
    let mut rng = StdRng::seed_from_u64(7);
    let (registry, failures) = LocationRegistry::build(
        &config.locations,
        &config.fluctuation,
        &ConfiguredCounts,
        &mut rng,
    );
    (registry, failures.len())
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> T {
    let bytes = tokio::fs::read(path).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn shutdown_stops_writes_and_flushes_final_state() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(
        dir.path(),
        vec![
            fast(LocationConfig::new("CMH", 150.0, 0.0769, 600)),
            fast(LocationConfig::new("E7", 40.0, 1.0, 1550)),
            fast(LocationConfig::new("PAC", 120.0, 1.0, 200)),
        ],
    );
    let (registry, failures) = build(&config);
    assert_eq!(failures, 0);

    let engine = Engine::start(&registry, &config);
    assert_eq!(engine.worker_count(), 3);
    let store = engine.store().clone();

    tokio::time::sleep(Duration::from_millis(250)).await;
    let report = engine.shutdown().await;

    assert_eq!(report.workers.len(), 3);
    assert_eq!(report.failed_workers, 0);
    assert!(report.workers.iter().all(|w| w.updates >= 1));
    let publisher = report.publisher.unwrap();
    assert!(publisher.publishes >= 1);
    assert_eq!(publisher.failures, 0);

    // Nothing writes once shutdown has returned.
    let version = store.version();
    assert_eq!(version, report.total_updates());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(store.version(), version);

    // The published file holds exactly the final in-memory state.
    let published: Snapshot = read_json(&config.publisher.snapshot_path).await;
    assert_eq!(published, store.snapshot().await);
    for (id, state) in published.iter() {
        let capacity = registry.get(id.as_str()).unwrap().capacity;
        let expected = percent_full(f64::from(state.people), capacity);
        assert!((state.percent_full - expected).abs() < 1e-9);
    }

    let baselines: BaselineReport = read_json(config.publisher.baseline_path.as_ref().unwrap()).await;
    let cmh = baselines.get("CMH").unwrap();
    assert!((cmh.baseline.corrected_count - 150.0 / 0.0769).abs() < 1e-9);
    assert!((cmh.baseline.percent_full - 325.1).abs() < 1e-9);
}

#[tokio::test]
async fn rejected_location_never_appears() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(
        dir.path(),
        vec![
            fast(LocationConfig::new("DC", 85.0, 0.08, 1500)),
            fast(LocationConfig::new("BROKEN", 10.0, -1.0, 100)),
        ],
    );
    let (registry, failures) = build(&config);
    assert_eq!(failures, 1);

    let engine = Engine::start(&registry, &config);
    tokio::time::sleep(Duration::from_millis(60)).await;
    let report = engine.shutdown().await;
    assert_eq!(report.workers.len(), 1);

    let published: Snapshot = read_json(&config.publisher.snapshot_path).await;
    assert_eq!(published.len(), 1);
    assert!(published.get("DC").is_some());
    assert!(published.get("BROKEN").is_none());
}

#[tokio::test]
async fn publish_failures_never_stall_workers() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(
        dir.path(),
        vec![
            fast(LocationConfig::new("E7", 40.0, 1.0, 1550)),
            fast(LocationConfig::new("DC", 85.0, 0.08, 1500)),
        ],
    );
    config.publisher.snapshot_path = dir.path().join("missing").join("ui_fluctuator.json");
    config.publisher.baseline_path = None;
    let (registry, _) = build(&config);

    let engine = Engine::start(&registry, &config);
    let store = engine.store().clone();
    tokio::time::sleep(Duration::from_millis(200)).await;
    let report = engine.shutdown().await;

    assert_eq!(report.workers.len(), 2);
    assert!(report.workers.iter().all(|w| w.updates >= 2));
    assert_eq!(store.version(), report.total_updates());
    let publisher = report.publisher.unwrap();
    assert_eq!(publisher.publishes, 0);
    assert!(publisher.failures >= 1);
    assert!(!config.publisher.snapshot_path.exists());
}

#[tokio::test]
async fn empty_registry_publishes_empty_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), Vec::new());
    let (registry, _) = build(&config);

    let engine = Engine::start(&registry, &config);
    assert_eq!(engine.worker_count(), 0);
    let report = engine.shutdown().await;
    assert_eq!(report.total_updates(), 0);

    let published: Snapshot = read_json(&config.publisher.snapshot_path).await;
    assert!(published.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_never_interfere() {
    let capacity = 250_u32;
    let configs: Vec<LocationConfig> = (0..16)
        .map(|i| LocationConfig::new(format!("L{i:02}"), 100.0, 1.0, capacity))
        .collect();
    let config = EngineConfig {
        locations: configs,
        ..EngineConfig::default()
    };
    let (registry, _) = build(&config);
    let (store, writers) = SnapshotStore::from_registry(&registry);

    let tasks = writers.into_iter().enumerate().map(|(i, writer)| {
        tokio::spawn(async move {
            let offset = u32::try_from(i).unwrap();
            for n in 0..200_u32 {
                writer.write(offset * 1000 + n).await;
                tokio::task::yield_now().await;
            }
        })
    });
    for joined in join_all(tasks).await {
        joined.unwrap();
    }

    assert_eq!(store.version(), 16 * 200);
    let cap = NonZeroU32::new(capacity);
    for (i, (id, record)) in store.entries().await.into_iter().enumerate() {
        let offset = u32::try_from(i).unwrap();
        assert_eq!(record.updates, 200, "{id}");
        assert_eq!(record.display.people, offset * 1000 + 199, "{id}");
        let expected = percent_full(f64::from(record.display.people), cap);
        assert!((record.display.percent_full - expected).abs() < 1e-9);
    }
}
