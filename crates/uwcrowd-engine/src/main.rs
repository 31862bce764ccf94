//! UW Crowd occupancy engine binary.
//!
//! Wires configuration, the raw-count source, the location registry, the
//! fluctuation engine, and the optional observer API together, then runs
//! until interrupted.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `UWCROWD_CONFIG` or `uwcrowd-config.yaml`
//! 2. Initialize structured logging (tracing) from the `logging` section
//! 3. Read startup raw counts (scanner records, falling back to config)
//! 4. Build the location registry, reporting rejected locations
//! 5. Start one fluctuation worker per location plus the publisher
//! 6. Start the observer API when enabled
//! 7. Wait for Ctrl-C (or an observer failure), shut down in order, and
//!    log the run report

mod error;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uwcrowd_core::config::{LogFormat, LoggingConfig};
use uwcrowd_core::{
    ConfiguredCounts, Engine, EngineConfig, EngineReport, LocationRegistry, RawCountSource,
    RecordFileSource, WithConfigFallback,
};
use uwcrowd_observer::{AppState, ServerConfig, ServerError};

use crate::error::EngineError;

/// Config file used when `UWCROWD_CONFIG` is not set.
const DEFAULT_CONFIG_PATH: &str = "uwcrowd-config.yaml";

type ObserverHandle = JoinHandle<Result<(), ServerError>>;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration or the record document cannot be
/// loaded, or if the observer server fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration (before logging, which it configures).
    let (config, config_path) = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!("uwcrowd-engine starting");
    match &config_path {
        Some(path) => info!(path = %path.display(), "Configuration loaded"),
        None => info!("Config file not found, using defaults"),
    }
    info!(
        locations = config.locations.len(),
        noise_pct = config.fluctuation.noise_pct,
        snapshot_path = %config.publisher.snapshot_path.display(),
        observer_enabled = config.observer.enabled,
        "Engine configuration"
    );

    // 3. Raw-count source.
    let source = raw_count_source(&config)?;

    // 4. Registry.
    let mut rng = match config.fluctuation.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };
    let (registry, failures) = LocationRegistry::build(
        &config.locations,
        &config.fluctuation,
        source.as_ref(),
        &mut rng,
    );
    for failure in &failures {
        warn!(location = failure.id, error = %failure.error, "Location not registered");
    }
    if registry.is_empty() {
        warn!("No locations registered, the snapshot will stay empty");
    }
    info!(
        registered = registry.len(),
        rejected = failures.len(),
        "Location registry built"
    );

    // 5. Workers and publisher.
    let engine = Engine::start(&registry, &config);

    // 6. Observer.
    let mut observer: Option<ObserverHandle> = config.observer.enabled.then(|| {
        let state = Arc::new(AppState::new(
            engine.store().clone(),
            registry.baseline_report(),
            Duration::from_secs(config.observer.stale_after_seconds),
        ));
        let server_config = ServerConfig::from(&config.observer);
        let signal = engine.signal();
        tokio::spawn(async move {
            uwcrowd_observer::start_server(&server_config, state, signal).await
        })
    });

    // 7. Run until interrupted.
    let (outcome, observer_exited) = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            info!("Interrupt received");
            (signal.map_err(EngineError::from), false)
        }
        exited = observer_exit(observer.as_mut()) => {
            warn!("Observer exited before shutdown was requested");
            (flatten_observer(exited), true)
        }
    };
    if observer_exited {
        observer = None;
    }

    let report = engine.shutdown().await;
    log_report(&report);

    if let Some(handle) = observer {
        flatten_observer(handle.await)?;
    }
    outcome?;

    info!("uwcrowd-engine stopped");
    Ok(())
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    match logging.format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }
}

/// Load configuration from `UWCROWD_CONFIG`, or the default path.
///
/// Returns the path that was read, or `None` when the defaults were used.
fn load_config() -> Result<(EngineConfig, Option<PathBuf>), EngineError> {
    match std::env::var_os("UWCROWD_CONFIG") {
        Some(path) => load_config_from(Path::new(&path), true),
        None => load_config_from(Path::new(DEFAULT_CONFIG_PATH), false),
    }
}

/// Load configuration from `path`.
///
/// A missing file is an error only when the path was given explicitly;
/// otherwise the built-in defaults are used, still subject to
/// environment overrides.
fn load_config_from(
    path: &Path,
    explicit: bool,
) -> Result<(EngineConfig, Option<PathBuf>), EngineError> {
    if explicit || path.exists() {
        let config = EngineConfig::from_file(path)?;
        Ok((config, Some(path.to_path_buf())))
    } else {
        let mut config = EngineConfig::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok((config, None))
    }
}

/// Pick the raw-count source: scanner records when configured, falling
/// back to configured counts for unmatched locations.
fn raw_count_source(config: &EngineConfig) -> Result<Box<dyn RawCountSource>, EngineError> {
    match &config.source.records_path {
        Some(path) => {
            let records = RecordFileSource::load(path)?;
            Ok(Box::new(WithConfigFallback::new(records)))
        }
        None => Ok(Box::new(ConfiguredCounts)),
    }
}

/// Resolve when the observer task exits; never resolves without one.
async fn observer_exit(
    handle: Option<&mut ObserverHandle>,
) -> Result<Result<(), ServerError>, tokio::task::JoinError> {
    match handle {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

fn flatten_observer(
    exited: Result<Result<(), ServerError>, tokio::task::JoinError>,
) -> Result<(), EngineError> {
    exited??;
    Ok(())
}

fn log_report(report: &EngineReport) {
    for worker in &report.workers {
        info!(
            location = %worker.location,
            updates = worker.updates,
            "Worker finished"
        );
    }
    if let Some(publisher) = report.publisher {
        info!(
            publishes = publisher.publishes,
            failures = publisher.failures,
            "Publisher finished"
        );
    }
    info!(
        workers = report.workers.len(),
        failed_workers = report.failed_workers,
        total_updates = report.total_updates(),
        "Run complete"
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn missing_default_config_uses_builtin_locations() {
        let dir = tempfile::tempdir().unwrap();
        let (config, path) = load_config_from(&dir.path().join("absent.yaml"), false).unwrap();
        assert!(path.is_none());
        let ids: Vec<_> = config.locations.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, ["CMH", "PAC", "DC", "E7", "Dana_Porter"]);
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config_from(&dir.path().join("absent.yaml"), true);
        assert!(matches!(result, Err(EngineError::Config { .. })));
    }

    #[test]
    fn config_file_is_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "locations:\n  - id: MC\n    raw_count: 90\n    capacity: 300\nlogging:\n  format: json"
        )
        .unwrap();
        let (config, path) = load_config_from(file.path(), false).unwrap();
        assert_eq!(path.as_deref(), Some(file.path()));
        assert_eq!(config.locations.len(), 1);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn records_source_falls_back_to_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"data":[{{"id":"e7","name":"E7","shortName":"E7","currentOccupancy":52}}]}}"#
        )
        .unwrap();

        let mut config = EngineConfig::default();
        config.source.records_path = Some(file.path().to_path_buf());
        let source = raw_count_source(&config).unwrap();

        let e7 = config.locations.iter().find(|l| l.id == "E7").unwrap();
        let pac = config.locations.iter().find(|l| l.id == "PAC").unwrap();
        assert_eq!(source.raw_count(e7), Some(52.0));
        assert_eq!(source.raw_count(pac), Some(120.0));
    }

    #[test]
    fn unreadable_records_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EngineConfig::default();
        config.source.records_path = Some(dir.path().join("missing.json"));
        assert!(matches!(
            raw_count_source(&config),
            Err(EngineError::Source { .. })
        ));
    }
}
