//! Publishing the snapshot to its external surface.
//!
//! The [`Publisher`] runs as a single task. It wakes when any worker
//! writes (store change notification) and on a fixed retry cadence, copies
//! the store, serializes outside any lock, and replaces the surface file.
//! Writes go to a sibling temp file first and are renamed into place, so
//! readers polling the file never see a half-written document.
//!
//! A failed write is logged and retried on the next wake. Workers never
//! wait on the publisher and never learn about its failures.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uwcrowd_types::BaselineReport;

use crate::shutdown::ShutdownSignal;
use crate::snapshot::SnapshotStore;

/// Errors that can occur while writing a surface document.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The document could not be serialized.
    #[error("failed to serialize document: {source}")]
    Serialize {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// The surface file could not be written or moved into place.
    #[error("failed to write {path}: {source}")]
    Io {
        /// The file being written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// A JSON document on disk, replaced atomically on every write.
#[derive(Debug, Clone)]
pub struct JsonFileSurface {
    path: PathBuf,
    temp_path: PathBuf,
    pretty: bool,
}

impl JsonFileSurface {
    /// A surface at `path`, optionally pretty-printed.
    pub fn new(path: impl Into<PathBuf>, pretty: bool) -> Self {
        let path = path.into();
        let temp_path = temp_path_for(&path);
        Self {
            path,
            temp_path,
            pretty,
        }
    }

    /// Where readers find the document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize `doc` and replace the file with it.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Serialize`] if `doc` cannot be serialized
    /// and [`PublishError::Io`] if the file cannot be written.
    pub async fn write<T: Serialize + Sync>(&self, doc: &T) -> Result<(), PublishError> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(doc)?
        } else {
            serde_json::to_vec(doc)?
        };
        tokio::fs::write(&self.temp_path, &bytes)
            .await
            .map_err(|source| PublishError::Io {
                path: self.temp_path.clone(),
                source,
            })?;
        tokio::fs::rename(&self.temp_path, &self.path)
            .await
            .map_err(|source| PublishError::Io {
                path: self.path.clone(),
                source,
            })?;
        Ok(())
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map_or_else(|| OsString::from("snapshot"), OsString::from);
    name.push(".tmp");
    path.with_file_name(name)
}

/// Counters returned when the publisher stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherReport {
    /// Successful snapshot writes.
    pub publishes: u64,
    /// Failed snapshot or baseline writes.
    pub failures: u64,
}

#[derive(Debug)]
struct PendingBaseline {
    surface: JsonFileSurface,
    report: BaselineReport,
    written: bool,
}

/// Serializes the store to a [`JsonFileSurface`] until told to stop.
#[derive(Debug)]
pub struct Publisher {
    store: SnapshotStore,
    surface: JsonFileSurface,
    baseline: Option<PendingBaseline>,
    retry_interval: Duration,
    stop: ShutdownSignal,
    last_published: Option<u64>,
    report: PublisherReport,
}

impl Publisher {
    /// Create a publisher for `store`.
    ///
    /// `stop` should fire only after every worker has exited; the
    /// publisher performs one last write when it does.
    pub fn new(
        store: SnapshotStore,
        surface: JsonFileSurface,
        retry_interval: Duration,
        stop: ShutdownSignal,
    ) -> Self {
        Self {
            store,
            surface,
            baseline: None,
            retry_interval,
            stop,
            last_published: None,
            report: PublisherReport::default(),
        }
    }

    /// Also write `report` to `surface`, once, retrying until it succeeds.
    #[must_use]
    pub fn with_baseline(mut self, surface: JsonFileSurface, report: BaselineReport) -> Self {
        self.baseline = Some(PendingBaseline {
            surface,
            report,
            written: false,
        });
        self
    }

    /// Write the current snapshot if anything changed since the last
    /// successful write. Failures are logged and counted, never returned.
    pub async fn publish_if_changed(&mut self) {
        self.publish_baseline().await;

        let version = self.store.version();
        if self.last_published == Some(version) {
            return;
        }

        let snapshot = self.store.snapshot().await;
        match self.surface.write(&snapshot).await {
            Ok(()) => {
                self.last_published = Some(version);
                self.report.publishes = self.report.publishes.saturating_add(1);
                debug!(
                    path = %self.surface.path().display(),
                    version,
                    locations = snapshot.len(),
                    "Snapshot published"
                );
            }
            Err(e) => {
                self.report.failures = self.report.failures.saturating_add(1);
                warn!(error = %e, "Snapshot publish failed, will retry");
            }
        }
    }

    async fn publish_baseline(&mut self) {
        let Some(pending) = self.baseline.as_mut() else {
            return;
        };
        if pending.written {
            return;
        }
        match pending.surface.write(&pending.report).await {
            Ok(()) => {
                pending.written = true;
                info!(
                    path = %pending.surface.path().display(),
                    locations = pending.report.0.len(),
                    "Baseline report published"
                );
            }
            Err(e) => {
                self.report.failures = self.report.failures.saturating_add(1);
                warn!(error = %e, "Baseline publish failed, will retry");
            }
        }
    }

    /// Publish on every change and retry tick until stopped, then flush
    /// once more.
    pub async fn run(mut self) -> PublisherReport {
        let mut ticker = tokio::time::interval(self.retry_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let store = self.store.clone();
        let mut stop = self.stop.clone();

        info!(
            path = %self.surface.path().display(),
            retry_interval_ms = u64::try_from(self.retry_interval.as_millis()).unwrap_or(u64::MAX),
            "Publisher started"
        );

        loop {
            self.publish_if_changed().await;
            tokio::select! {
                () = store.changed() => {}
                _ = ticker.tick() => {}
                () = stop.wait() => break,
            }
        }

        self.publish_if_changed().await;
        info!(
            publishes = self.report.publishes,
            failures = self.report.failures,
            "Publisher stopped"
        );
        self.report
    }
}
