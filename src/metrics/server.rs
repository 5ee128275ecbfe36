//! `/metrics` HTTP exposition server (ambient Metrics stack).

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::ec::reconstruction::ReconstructionWorker;
use crate::metrics::registry::Metrics;

async fn handle(
    req: Request<Incoming>,
    metrics: Arc<Metrics>,
    worker: Arc<ReconstructionWorker>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    if req.uri().path() != "/metrics" {
        return Ok(Response::builder()
            .status(404)
            .body(Full::new(Bytes::from_static(b"not found")))
            .unwrap());
    }

    metrics.set_transmits_in_progress(worker.transmits_in_progress());
    metrics.set_task_pool_active(worker.task_pool_active());
    metrics.set_reader_pool_active(worker.reader_pool_active());

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(Full::new(Bytes::from(metrics.gather())))
        .unwrap())
}

/// Serves `/metrics` on `addr` until the process exits. Each connection is
/// handled on its own spawned task over a plain `http1::Builder`.
pub async fn serve_metrics(
    addr: SocketAddr,
    metrics: Arc<Metrics>,
    worker: Arc<ReconstructionWorker>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "metrics server listening");

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = Arc::clone(&metrics);
        let worker = Arc::clone(&worker);

        tokio::spawn(async move {
            let service = service_fn(move |req| handle(req, Arc::clone(&metrics), Arc::clone(&worker)));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                warn!(error = %e, "metrics connection error");
            }
        });
    }
}
