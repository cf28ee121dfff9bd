use thiserror::Error;

/// Result type used by the sink.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or running a sink.
///
/// Runtime I/O failures inside the drain loop never surface here; they are
/// reported as `tracing` events and the sink keeps running.
#[derive(Debug, Error)]
pub enum Error {
    /// The drain loop was already started.
    #[error("already started")]
    AlreadyStarted,

    /// Invalid sink configuration.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// IO operation failed.
    #[error("{0}: {1}")]
    Io(&'static str, #[source] std::io::Error),

    /// The drain loop must be started from within a Tokio runtime.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    /// Could not set global default subscriber.
    #[error("could not set global default subscriber: {0}")]
    SetTracing(#[from] tracing::dispatcher::SetGlobalDefaultError),
}
