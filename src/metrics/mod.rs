//! Metrics: a Prometheus registry plus a `/metrics` HTTP exposition server.
//! Exposes the transmit-in-progress gauge, Task/Reader pool active-count
//! gauges, and a corruption-reports counter.

mod registry;
mod server;
mod sink;

pub use registry::Metrics;
pub use server::serve_metrics;
pub use sink::MetricsCorruptionSink;
