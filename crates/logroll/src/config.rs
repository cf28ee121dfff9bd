//! Sink configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::buffer::BufferConfig;
use crate::error::{Error, Result};
use crate::policy::RotationPolicy;

/// Date component of generated file names.
const DATE_FORMAT: &str = "%Y_%m_%d";

/// Where rotated files are written, split into directory, base name and extension.
///
/// Files are named `{dir}/{base_name}-{yyyy_MM_dd}-{unique_id}{extension}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPath {
    dir: PathBuf,
    base_name: String,
    extension: String,
}

impl OutputPath {
    /// Split `path` into its parts. `logs/app.log` becomes directory `logs`,
    /// base name `app` and extension `.log`; a bare `app` lives in `.` with no
    /// extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the path has no usable file name.
    pub fn parse(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                Error::Configuration(format!("invalid output file name: {}", path.display()))
            })?;

        let file_name = Path::new(file_name);
        let base_name = file_name
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .to_string();
        let extension = file_name
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        Ok(Self {
            dir,
            base_name,
            extension,
        })
    }

    /// Directory the files are created in.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name prefix.
    #[must_use]
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// File name suffix, including the leading dot (may be empty).
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Create the output directory and any missing parents.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be created.
    pub async fn create_dir_all(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::Io("error creating output directory", e))
    }

    /// Full path of the file created at `created_at` with `unique_id`.
    #[must_use]
    pub fn file_path(&self, created_at: DateTime<Local>, unique_id: i64) -> PathBuf {
        self.dir.join(format!(
            "{}-{}-{}{}",
            self.base_name,
            created_at.format(DATE_FORMAT),
            unique_id,
            self.extension
        ))
    }
}

impl Default for OutputPath {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            base_name: "output".to_string(),
            extension: ".log".to_string(),
        }
    }
}

/// Validated configuration for a [`RotatingSink`](crate::RotatingSink).
#[derive(Debug, Clone, Default)]
pub struct SinkConfig {
    /// Where files are written.
    pub output: OutputPath,
    /// When files are rotated.
    pub rotation: RotationPolicy,
    /// Also copy every record to standard output.
    pub mirror_stdout: bool,
    /// Sizing of the in-memory buffer.
    pub buffer: BufferConfig,
}

impl SinkConfig {
    /// Start building a configuration.
    #[must_use]
    pub fn builder() -> SinkConfigBuilder {
        SinkConfigBuilder::new()
    }
}

#[derive(Debug, Clone)]
enum Trigger {
    Every(Duration),
    SizeKb(u64),
    SizeBytes(u64),
    Lines(u64),
}

/// Builder for [`SinkConfig`].
#[derive(Debug, Clone, Default)]
pub struct SinkConfigBuilder {
    path: Option<PathBuf>,
    triggers: Vec<Trigger>,
    mirror_stdout: bool,
    buffer: BufferConfig,
}

impl SinkConfigBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output path, e.g. `logs/app.log`.
    #[must_use]
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Rotate files after they have been open for `interval`.
    #[must_use]
    pub fn rotate_every(mut self, interval: Duration) -> Self {
        self.triggers.push(Trigger::Every(interval));
        self
    }

    /// Rotate files before they exceed `kb` kilobytes (1 KB = 1024 bytes).
    #[must_use]
    pub fn max_size_kb(mut self, kb: u64) -> Self {
        self.triggers.push(Trigger::SizeKb(kb));
        self
    }

    /// Rotate files before they exceed `bytes` bytes.
    #[must_use]
    pub fn max_size_bytes(mut self, bytes: u64) -> Self {
        self.triggers.push(Trigger::SizeBytes(bytes));
        self
    }

    /// Rotate files once they hold `lines` records.
    #[must_use]
    pub fn max_lines(mut self, lines: u64) -> Self {
        self.triggers.push(Trigger::Lines(lines));
        self
    }

    /// Also copy every record to standard output.
    #[must_use]
    pub fn mirror_stdout(mut self, enabled: bool) -> Self {
        self.mirror_stdout = enabled;
        self
    }

    /// Override the buffer sizing.
    #[must_use]
    pub fn buffer(mut self, buffer: BufferConfig) -> Self {
        self.buffer = buffer;
        self
    }

    /// Validate and build the configuration.
    ///
    /// Without a rotation trigger, files rotate daily.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if more than one rotation trigger was
    /// set, a threshold is zero or overflows, the output path has no file
    /// name, or the buffer thresholds are inconsistent.
    pub fn build(self) -> Result<SinkConfig> {
        let rotation = match self.triggers.as_slice() {
            [] => RotationPolicy::default(),
            [trigger] => match *trigger {
                Trigger::Every(interval) => RotationPolicy::Time(interval),
                Trigger::SizeKb(kb) => RotationPolicy::Size(kb.checked_mul(1024).ok_or_else(
                    || Error::Configuration(format!("rotation size of {kb} KB overflows")),
                )?),
                Trigger::SizeBytes(bytes) => RotationPolicy::Size(bytes),
                Trigger::Lines(lines) => RotationPolicy::MaxLines(lines),
            },
            _ => {
                return Err(Error::Configuration(
                    "exactly one rotation trigger (time, size or lines) may be set".to_string(),
                ));
            }
        };
        rotation.validate()?;

        let output = match self.path {
            Some(path) => OutputPath::parse(path)?,
            None => OutputPath::default(),
        };

        self.buffer.validate()?;

        Ok(SinkConfig {
            output,
            rotation,
            mirror_stdout: self.mirror_stdout,
            buffer: self.buffer,
        })
    }
}
