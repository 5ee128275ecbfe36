//! Striped-block reconstruction node process.
//!
//! Wires the engine's adapters together, starts the `/metrics` exposition
//! server, and runs until interrupted. Reconstruction orders themselves
//! arrive from a command-dispatch layer that is out of scope for this
//! crate; this binary only stands up the engine that would run
//! them.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use couchestor::adapters::{LoggingCorruptionSink, StaticBlockTokenIssuer, TcpPeerConnectionFactory};
use couchestor::ec::reconstruction::{ReconstructionWorker, WorkerConfig};
use couchestor::metrics::{serve_metrics, Metrics, MetricsCorruptionSink};

/// Reconstruction node process.
#[derive(Parser, Debug)]
#[command(name = "couchestor", about = "Striped-block reconstruction node")]
struct Args {
    /// `reconstruction.striped-read.timeout-ms`, the per-slice read deadline
    /// before a reader is treated as a straggler and replaced.
    #[arg(long, env = "RECONSTRUCTION_STRIPED_READ_TIMEOUT_MS", default_value_t = 60_000)]
    striped_read_timeout_ms: u64,

    /// `reconstruction.striped-read.threads`, the Reader Pool max concurrent
    /// slice reads.
    #[arg(long, env = "RECONSTRUCTION_STRIPED_READ_THREADS", default_value_t = 16)]
    striped_read_threads: usize,

    /// `reconstruction.striped-read.buffer-size`, the raw per-window read
    /// buffer size in bytes, rounded down to a checksum-chunk multiple at
    /// runtime (`ec::geometry::slice_size`).
    #[arg(long, env = "RECONSTRUCTION_STRIPED_READ_BUFFER_SIZE", default_value_t = 1_048_576)]
    striped_read_buffer_size: u64,

    /// `reconstruction.striped-blk.threads`, the Task Pool max concurrent
    /// reconstruction tasks.
    #[arg(long, env = "RECONSTRUCTION_STRIPED_BLK_THREADS", default_value_t = 4)]
    striped_blk_threads: usize,

    /// Bind address for the Prometheus `/metrics` endpoint.
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:9898")]
    metrics_addr: SocketAddr,

    /// Log level filter (`trace`, `debug`, `info`, `warn`, `error`, or an
    /// `EnvFilter` directive string).
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit structured JSON log lines instead of the default human format.
    #[arg(long, env = "LOG_JSON", default_value_t = false)]
    log_json: bool,
}

fn init_tracing(args: &Args) {
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if args.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    tracing::info!(
        striped_read_timeout_ms = args.striped_read_timeout_ms,
        striped_read_threads = args.striped_read_threads,
        striped_read_buffer_size = args.striped_read_buffer_size,
        striped_blk_threads = args.striped_blk_threads,
        metrics_addr = %args.metrics_addr,
        "starting reconstruction node"
    );

    let connector = Arc::new(TcpPeerConnectionFactory::new(Duration::from_millis(
        args.striped_read_timeout_ms,
    )));
    let tokens = Arc::new(StaticBlockTokenIssuer);
    let metrics = Arc::new(Metrics::new()?);
    let corruption_sink = Arc::new(MetricsCorruptionSink::new(
        Arc::new(LoggingCorruptionSink),
        Arc::clone(&metrics),
    ));

    let worker = Arc::new(ReconstructionWorker::new(
        WorkerConfig {
            task_pool_threads: args.striped_blk_threads,
            reader_pool_threads: args.striped_read_threads,
            slice_read_timeout: Duration::from_millis(args.striped_read_timeout_ms),
            raw_buffer_size: args.striped_read_buffer_size,
        },
        connector,
        tokens,
        corruption_sink,
    ));

    let metrics_task = tokio::spawn(serve_metrics(args.metrics_addr, metrics, Arc::clone(&worker)));

    tokio::select! {
        res = metrics_task => {
            if let Ok(Err(e)) = res {
                tracing::error!(error = %e, "metrics server exited");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    worker.shutdown();
    Ok(())
}
