//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure that can stop the process, so
//! `main` can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: uwcrowd_core::ConfigError,
    },

    /// The occupancy-record document could not be loaded.
    #[error("raw-count source error: {source}")]
    Source {
        /// The underlying source error.
        #[from]
        source: uwcrowd_core::SourceError,
    },

    /// The observer server failed to bind or serve.
    #[error("observer error: {source}")]
    Observer {
        /// The underlying server error.
        #[from]
        source: uwcrowd_observer::ServerError,
    },

    /// The observer task panicked or was cancelled.
    #[error("observer task failed: {source}")]
    ObserverTask {
        /// The join error.
        #[from]
        source: tokio::task::JoinError,
    },

    /// Installing the Ctrl-C handler failed.
    #[error("failed to listen for shutdown signal: {source}")]
    Signal {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
