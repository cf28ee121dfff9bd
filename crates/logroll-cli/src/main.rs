//! CLI binary that pipes standard input into a rotating log sink.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgGroup, Parser};
use logroll::{RotatingSink, SinkConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// CLI-specific error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Sink library error
    #[error(transparent)]
    Sink(#[from] logroll::Error),

    /// Reading standard input failed
    #[error("failed to read stdin: {0}")]
    Stdin(#[source] std::io::Error),
}

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
#[command(group(ArgGroup::new("rotation").args(["every", "max_size_kb", "max_lines"])))]
struct Args {
    /// Output path; files are named {base}-{yyyy_MM_dd}-{unique_id}{ext}
    #[arg(long, default_value = "logs/output.log", env = "LOGROLL_PATH")]
    path: PathBuf,

    /// Rotate after a file has been open this many seconds (default: daily)
    #[arg(long, env = "LOGROLL_EVERY")]
    every: Option<u64>,

    /// Rotate before a file grows past this many kilobytes
    #[arg(long, env = "LOGROLL_MAX_SIZE_KB")]
    max_size_kb: Option<u64>,

    /// Rotate once a file holds this many lines
    #[arg(long, env = "LOGROLL_MAX_LINES")]
    max_lines: Option<u64>,

    /// Also copy every line to standard output
    #[arg(long, env = "LOGROLL_STDOUT")]
    stdout: bool,
}

fn create_sink_config(args: &Args) -> Result<SinkConfig, Error> {
    let mut builder = SinkConfig::builder()
        .path(&args.path)
        .mirror_stdout(args.stdout);

    if let Some(secs) = args.every {
        builder = builder.rotate_every(Duration::from_secs(secs));
    }
    if let Some(kb) = args.max_size_kb {
        builder = builder.max_size_kb(kb);
    }
    if let Some(lines) = args.max_lines {
        builder = builder.max_lines(lines);
    }

    Ok(builder.build()?)
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                    _ = sigint.recv() => info!("Received SIGINT"),
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                error!("failed to install signal handlers: {e}");
            }
        }
    }

    // Fall back to just ctrl-c on non-unix platforms
    let _ = tokio::signal::ctrl_c().await;
    info!("Received interrupt signal");
}

/// Copy stdin into the sink, one record per line, until EOF or cancellation.
async fn pipe_stdin(sink: &RotatingSink, shutdown_token: CancellationToken) -> Result<u64, Error> {
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut line = Vec::with_capacity(1024);
    let mut records = 0;

    loop {
        line.clear();

        let read = tokio::select! {
            () = shutdown_token.cancelled() => break,
            read = reader.read_until(b'\n', &mut line) => read.map_err(Error::Stdin)?,
        };

        if read == 0 {
            break;
        }

        sink.put(&line);
        records += 1;
    }

    Ok(records)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Diagnostics go to stderr; stdout may carry records
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = create_sink_config(&args)?;

    config.output.create_dir_all().await?;

    let sink = RotatingSink::new(config);
    sink.start()?;

    let shutdown_token = CancellationToken::new();

    let signal_shutdown_token = shutdown_token.clone();
    tokio::spawn(async move {
        wait_for_signal().await;

        info!("Shutting down");
        signal_shutdown_token.cancel();
    });

    let result = pipe_stdin(&sink, shutdown_token).await;
    sink.shutdown().await;

    let records = result?;
    info!(records, "stdin closed");

    Ok(())
}
