//! Asynchronous rotating log sink.
//!
//! Producers hand the sink opaque byte records and return immediately; a
//! single background task appends them to the current file and swaps in a new
//! file when the configured limit (elapsed time, bytes, or record count) is
//! reached. Files are named `{base}-{yyyy_MM_dd}-{unique_id}{ext}`.
//!
//! ```no_run
//! # async fn run() -> logroll::Result<()> {
//! use logroll::{RotatingSink, SinkConfig};
//!
//! let config = SinkConfig::builder()
//!     .path("logs/app.log")
//!     .max_size_kb(1024)
//!     .build()?;
//!
//! let sink = RotatingSink::new(config);
//! sink.start()?;
//!
//! sink.put(b"hello\n");
//! sink.shutdown().await;
//! # Ok(())
//! # }
//! ```
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod buffer;
mod config;
mod drain;
mod error;
mod file;
mod policy;
mod sink;

pub use crate::buffer::{
    Buffer, BufferConfig, DEFAULT_COMPACT_THRESHOLD, DEFAULT_GROWTH_FACTOR,
    DEFAULT_GROWTH_THRESHOLD, DEFAULT_MIN_CAPACITY,
};
pub use crate::config::{OutputPath, SinkConfig, SinkConfigBuilder};
pub use crate::error::{Error, Result};
pub use crate::policy::{DEFAULT_ROTATION_INTERVAL, FileStats, RotationPolicy};
pub use crate::sink::RotatingSink;

use tracing_subscriber::{filter, fmt, layer::SubscriberExt, Layer};

/// Sets up a global tracing subscriber that writes formatted events into a
/// rotating sink, and to stderr.
///
/// Events emitted by this crate stay on stderr only, so a failing file
/// system is never reported into the sink that is failing.
///
/// # Errors
///
/// This function will return an error if it is not called from within a Tokio
/// runtime or if a global default subscriber is already set.
pub fn configure_logging_to_file(config: SinkConfig) -> Result<RotatingSink> {
    tokio::runtime::Handle::try_current()?;

    let sink = RotatingSink::new(config);

    let writer_layer = fmt::Layer::new()
        .with_ansi(false)
        .with_writer(sink.clone())
        .with_filter(filter::filter_fn(|metadata| {
            !metadata.target().starts_with(env!("CARGO_CRATE_NAME"))
        }));

    let subscriber = tracing_subscriber::registry()
        .with(filter::LevelFilter::INFO)
        .with(fmt::Layer::default().with_writer(std::io::stderr))
        .with(writer_layer);

    tracing::subscriber::set_global_default(subscriber)?;

    sink.start()?;

    Ok(sink)
}
