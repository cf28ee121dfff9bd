//! Ownership of the current output handle and the close-old/open-new cycle.
//!
//! Only the drain loop holds a [`FileLifecycle`], so rotation never races a
//! write. Every failure here is reported as a `tracing` event and absorbed:
//! a file that cannot be closed is abandoned, and a file that cannot be opened
//! is replaced by standard output until the next rotation.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tracing::{debug, error, warn};

use crate::config::OutputPath;
use crate::policy::FileStats;

enum Output {
    File { file: File, path: PathBuf },
    Stdout(Stdout),
}

impl Output {
    fn writer(&mut self) -> &mut (dyn AsyncWrite + Unpin + Send) {
        match self {
            Self::File { file, .. } => file,
            Self::Stdout(stdout) => stdout,
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        match self {
            Self::File { file, .. } => file.shutdown().await,
            // the process keeps its stdout
            Self::Stdout(stdout) => stdout.flush().await,
        }
    }
}

struct FileState {
    output: Output,
    unique_id: i64,
    stats: FileStats,
}

type Mirror = Box<dyn AsyncWrite + Unpin + Send>;

/// The single open output of a sink and its counters.
pub(crate) struct FileLifecycle {
    output_path: OutputPath,
    mirror: Option<Mirror>,
    current: Option<FileState>,
    last_unique_id: i64,
}

impl FileLifecycle {
    pub(crate) fn new(output_path: OutputPath, mirror_stdout: bool) -> Self {
        let mirror = mirror_stdout.then(|| Box::new(tokio::io::stdout()) as Mirror);
        Self::with_mirror(output_path, mirror)
    }

    fn with_mirror(output_path: OutputPath, mirror: Option<Mirror>) -> Self {
        Self {
            output_path,
            mirror,
            current: None,
            last_unique_id: 0,
        }
    }

    /// Open the first output if nothing is open yet.
    pub(crate) async fn ensure_open(&mut self) {
        if self.current.is_none() {
            self.open().await;
        }
    }

    /// Close the current output and open a fresh file.
    pub(crate) async fn rotate(&mut self) {
        if let Some(state) = self.current.as_ref() {
            debug!(
                unique_id = state.unique_id,
                bytes_written = state.stats.bytes_written,
                lines_written = state.stats.lines_written,
                "rotating output file"
            );
        }

        self.close().await;
        self.open().await;
    }

    /// Write one record to the current output and bump the counters.
    ///
    /// Returns the number of bytes that reached the output.
    pub(crate) async fn write(&mut self, record: &[u8]) -> usize {
        self.ensure_open().await;
        let Some(state) = self.current.as_mut() else {
            return 0;
        };

        let (written, result) = write_counted(state.output.writer(), record).await;
        if let Err(e) = result {
            error!(
                unique_id = state.unique_id,
                written,
                len = record.len(),
                error = %e,
                "failed to write record"
            );
        }

        state.stats.bytes_written += written as u64;
        state.stats.lines_written += 1;

        if let (Some(mirror), Output::File { .. }) = (self.mirror.as_mut(), &state.output) {
            if let Err(e) = mirror.write_all(record).await {
                debug!(error = %e, "failed to mirror record to stdout");
            }
        }

        written
    }

    /// Push buffered bytes down to the output.
    pub(crate) async fn flush(&mut self) {
        if let Some(state) = self.current.as_mut() {
            if let Err(e) = state.output.writer().flush().await {
                warn!(unique_id = state.unique_id, error = %e, "failed to flush output");
            }
        }

        if let Some(mirror) = self.mirror.as_mut() {
            if let Err(e) = mirror.flush().await {
                debug!(error = %e, "failed to flush stdout mirror");
            }
        }
    }

    /// Close the current output, if any. Failures are reported and the handle
    /// is dropped regardless.
    pub(crate) async fn close(&mut self) {
        if let Some(mut state) = self.current.take() {
            if let Err(e) = state.output.close().await {
                warn!(unique_id = state.unique_id, error = %e, "failed to close output file");
            }
        }
    }

    /// Counters of the current output.
    pub(crate) fn stats(&self) -> Option<&FileStats> {
        self.current.as_ref().map(|state| &state.stats)
    }

    /// Path of the current output file, `None` when nothing is open or the
    /// output fell back to stdout.
    #[cfg(test)]
    fn current_path(&self) -> Option<&Path> {
        match self.current.as_ref().map(|state| &state.output) {
            Some(Output::File { path, .. }) => Some(path),
            _ => None,
        }
    }

    /// Whether writes currently go to stdout because a file could not be opened.
    #[cfg(test)]
    fn is_fallback(&self) -> bool {
        matches!(
            self.current.as_ref().map(|state| &state.output),
            Some(Output::Stdout(_))
        )
    }

    async fn open(&mut self) {
        let created_at = Local::now();
        let unique_id = self.next_unique_id(created_at);
        let path = self.output_path.file_path(created_at, unique_id);

        let output = match open_append(&path).await {
            Ok(file) => {
                debug!(path = %path.display(), "opened output file");
                Output::File { file, path }
            }
            Err(e) => {
                error!(
                    path = %path.display(),
                    error = %e,
                    "failed to open output file, writing to stdout"
                );
                Output::Stdout(tokio::io::stdout())
            }
        };

        self.current = Some(FileState {
            output,
            unique_id,
            stats: FileStats::new(created_at),
        });
    }

    /// Microsecond timestamp, bumped past the previous id when the clock has
    /// not moved on.
    fn next_unique_id(&mut self, now: DateTime<Local>) -> i64 {
        let unique_id = now.timestamp_micros().max(self.last_unique_id + 1);
        self.last_unique_id = unique_id;
        unique_id
    }
}

async fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
}

/// Write as much of `buf` as the writer accepts, reporting how far it got.
async fn write_counted<W>(writer: &mut W, buf: &[u8]) -> (usize, io::Result<()>)
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut written = 0;
    while written < buf.len() {
        match writer.write(&buf[written..]).await {
            Ok(0) => return (written, Err(io::ErrorKind::WriteZero.into())),
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return (written, Err(e)),
        }
    }
    (written, Ok(()))
}
