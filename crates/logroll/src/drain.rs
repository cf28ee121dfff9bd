//! The background task that moves records from the buffer into files.

use std::sync::Arc;

use chrono::Local;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::file::FileLifecycle;
use crate::policy::RotationPolicy;
use crate::sink::Shared;

/// Sole consumer of a sink's buffer and sole owner of its output file.
pub(crate) struct DrainLoop {
    shared: Arc<Shared>,
    files: FileLifecycle,
    rotation: RotationPolicy,
}

impl DrainLoop {
    pub(crate) const fn new(
        shared: Arc<Shared>,
        files: FileLifecycle,
        rotation: RotationPolicy,
    ) -> Self {
        Self {
            shared,
            files,
            rotation,
        }
    }

    /// Sleep until woken, drain, repeat. On cancellation, drain what is left
    /// and close the file.
    pub(crate) async fn run(mut self, shutdown_token: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                () = self.shared.wake.notified() => {
                    self.drain().await;
                }
                () = shutdown_token.cancelled() => {
                    break;
                }
            }
        }

        self.drain().await;
        self.files.close().await;
    }

    /// Write every queued record, then flush.
    ///
    /// A wake-up that arrives while draining is kept as a `Notify` permit, so
    /// a record enqueued after the final empty `get` is picked up by the next
    /// pass instead of waiting for another producer.
    async fn drain(&mut self) {
        let mut drained = 0usize;

        while let Some(record) = self.shared.buffer.get() {
            self.files.ensure_open().await;

            // a file that has not been written to yet is already fresh
            let rotate = self.files.stats().is_some_and(|stats| {
                stats.lines_written > 0
                    && self.rotation.must_rotate(stats, record.len(), Local::now())
            });
            if rotate {
                self.files.rotate().await;
            }

            self.files.write(&record).await;
            drained += 1;
        }

        if drained > 0 {
            self.files.flush().await;
            debug!(drained, "buffer drained");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::{Path, PathBuf};

    use tempfile::tempdir;

    use crate::buffer::BufferConfig;
    use crate::config::OutputPath;

    fn drain_loop(dir: &Path, rotation: RotationPolicy) -> DrainLoop {
        let output = OutputPath::parse(dir.join("app.log")).unwrap();
        DrainLoop::new(
            Arc::new(Shared::new(BufferConfig::default())),
            FileLifecycle::new(output, false),
            rotation,
        )
    }

    fn files_in(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        // unique ids are increasing timestamps of equal width
        files.sort();
        files
    }

    #[tokio::test]
    async fn test_size_rotation_boundary() {
        let dir = tempdir().unwrap();
        let mut drain = drain_loop(dir.path(), RotationPolicy::Size(100));

        for fill in [b'a', b'b', b'c'] {
            drain.shared.buffer.put(&[fill; 40]);
        }
        drain.drain().await;
        drain.files.close().await;

        let files = files_in(dir.path());
        assert_eq!(files.len(), 2);

        let mut first = vec![b'a'; 40];
        first.extend_from_slice(&[b'b'; 40]);
        assert_eq!(std::fs::read(&files[0]).unwrap(), first);
        assert_eq!(std::fs::read(&files[1]).unwrap(), vec![b'c'; 40]);
    }

    #[tokio::test]
    async fn test_oversized_record_written_whole() {
        let dir = tempdir().unwrap();
        let mut drain = drain_loop(dir.path(), RotationPolicy::Size(10));

        drain.shared.buffer.put(b"small\n");
        drain.shared.buffer.put(&[b'x'; 64]);
        drain.drain().await;
        drain.files.close().await;

        let files = files_in(dir.path());
        assert_eq!(files.len(), 2);
        assert_eq!(std::fs::read(&files[0]).unwrap(), b"small\n");
        assert_eq!(std::fs::read(&files[1]).unwrap(), vec![b'x'; 64]);
    }

    #[tokio::test]
    async fn test_first_record_never_leaves_empty_file() {
        let dir = tempdir().unwrap();
        let mut drain = drain_loop(dir.path(), RotationPolicy::Size(10));

        drain.shared.buffer.put(&[b'x'; 64]);
        drain.drain().await;
        drain.files.close().await;

        let files = files_in(dir.path());
        assert_eq!(files.len(), 1);
        assert_eq!(std::fs::read(&files[0]).unwrap(), vec![b'x'; 64]);
    }

    #[tokio::test]
    async fn test_line_rotation_boundary() {
        let dir = tempdir().unwrap();
        let mut drain = drain_loop(dir.path(), RotationPolicy::MaxLines(1));

        drain.shared.buffer.put(b"one\n");
        drain.shared.buffer.put(b"two\n");
        drain.drain().await;
        drain.files.close().await;

        let files = files_in(dir.path());
        assert_eq!(files.len(), 2);
        assert_eq!(std::fs::read(&files[0]).unwrap(), b"one\n");
        assert_eq!(std::fs::read(&files[1]).unwrap(), b"two\n");
    }

    #[tokio::test]
    async fn test_time_rotation() {
        let dir = tempdir().unwrap();
        let mut drain = drain_loop(
            dir.path(),
            RotationPolicy::Time(std::time::Duration::from_millis(50)),
        );

        drain.shared.buffer.put(b"early\n");
        drain.shared.buffer.put(b"early too\n");
        drain.drain().await;

        tokio::time::sleep(std::time::Duration::from_millis(80)).await;

        drain.shared.buffer.put(b"late\n");
        drain.drain().await;
        drain.files.close().await;

        let files = files_in(dir.path());
        assert_eq!(files.len(), 2);
        assert_eq!(std::fs::read(&files[0]).unwrap(), b"early\nearly too\n");
        assert_eq!(std::fs::read(&files[1]).unwrap(), b"late\n");
    }

    #[tokio::test]
    async fn test_cancel_drains_remaining_records() {
        let dir = tempdir().unwrap();
        let drain = drain_loop(dir.path(), RotationPolicy::MaxLines(1_000));
        let shared = Arc::clone(&drain.shared);

        for i in 0..100 {
            shared.buffer.put(format!("{i}\n").as_bytes());
        }

        let token = CancellationToken::new();
        token.cancel();
        drain.run(token).await;

        let expected: String = (0..100).map(|i| format!("{i}\n")).collect();
        let files = files_in(dir.path());
        assert_eq!(files.len(), 1);
        assert_eq!(std::fs::read_to_string(&files[0]).unwrap(), expected);
    }
}
