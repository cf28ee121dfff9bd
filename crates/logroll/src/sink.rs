//! The producer-facing handle.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;
use tracing_subscriber::fmt;

use crate::buffer::{Buffer, BufferConfig};
use crate::config::SinkConfig;
use crate::drain::DrainLoop;
use crate::error::{Error, Result};
use crate::file::FileLifecycle;

/// State shared by producers and the drain loop.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) buffer: Buffer,
    pub(crate) wake: Notify,
    started: AtomicBool,
}

impl Shared {
    pub(crate) fn new(buffer: BufferConfig) -> Self {
        Self {
            buffer: Buffer::new(buffer),
            wake: Notify::new(),
            started: AtomicBool::new(false),
        }
    }
}

/// Asynchronous rotating file sink.
///
/// Producers call [`put`](Self::put) (or use the sink as an [`io::Write`] or
/// a `tracing` writer); it copies the record into memory and returns at once.
/// A single background task started with [`start`](Self::start) writes the
/// records in order and rolls the file over according to the configured
/// [`RotationPolicy`](crate::RotationPolicy).
///
/// Cloning is cheap; all clones feed the same buffer.
#[derive(Debug, Clone)]
pub struct RotatingSink {
    config: Arc<SinkConfig>,
    shared: Arc<Shared>,
    shutdown_token: CancellationToken,
    task_tracker: TaskTracker,
}

impl RotatingSink {
    /// Create a sink. Nothing is written until [`start`](Self::start) is called.
    #[must_use]
    pub fn new(config: SinkConfig) -> Self {
        Self {
            shared: Arc::new(Shared::new(config.buffer)),
            config: Arc::new(config),
            shutdown_token: CancellationToken::new(),
            task_tracker: TaskTracker::new(),
        }
    }

    /// Spawn the drain loop on the current Tokio runtime.
    ///
    /// Records put before the call are written once the loop runs.
    ///
    /// # Errors
    ///
    /// This function will return an error if the sink was already started or
    /// if it is not called from within a Tokio runtime.
    pub fn start(&self) -> Result<JoinHandle<()>> {
        let runtime = tokio::runtime::Handle::try_current()?;

        // claimed once across all clones; a shut down sink stays stopped
        if self.shared.started.swap(true, Ordering::AcqRel) || self.task_tracker.is_closed() {
            return Err(Error::AlreadyStarted);
        }

        let files = FileLifecycle::new(self.config.output.clone(), self.config.mirror_stdout);
        let drain = DrainLoop::new(Arc::clone(&self.shared), files, self.config.rotation);

        let handle = self
            .task_tracker
            .spawn_on(drain.run(self.shutdown_token.clone()), &runtime);

        self.task_tracker.close();

        // pick up anything put before the loop existed
        self.shared.wake.notify_one();

        info!(
            dir = %self.config.output.dir().display(),
            rotation = ?self.config.rotation,
            "rotating sink started"
        );

        Ok(handle)
    }

    /// Enqueue a copy of `record` and wake the drain loop.
    ///
    /// Never blocks and always reports the full length. Records put after
    /// [`shutdown`](Self::shutdown) has begun are discarded.
    pub fn put(&self, record: &[u8]) -> usize {
        if self.shared.buffer.put(record) {
            self.shared.wake.notify_one();
        }

        record.len()
    }

    /// Number of records waiting to be written.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.buffer.len()
    }

    /// The configuration this sink was built with.
    #[must_use]
    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    /// Stop accepting records, write everything already accepted, and close
    /// the current file.
    pub async fn shutdown(&self) {
        info!("rotating sink shutting down...");

        self.shared.buffer.close();
        self.shutdown_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;

        info!("rotating sink shutdown complete.");
    }
}

impl io::Write for RotatingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.put(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Write for &RotatingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.put(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> fmt::MakeWriter<'a> for RotatingSink {
    type Writer = &'a Self;

    fn make_writer(&'a self) -> Self::Writer {
        self
    }
}
