//! Prometheus registry for the reconstruction engine's live counters.

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

/// Holds the registered metric handles plus the registry they report
/// through. Gauges are refreshed from the worker's pools right before each
/// scrape rather than updated on every pool event, since the only consumer
/// is a pull-based `/metrics` endpoint.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    transmits_in_progress: IntGauge,
    task_pool_active: IntGauge,
    reader_pool_active: IntGauge,
    corrupt_reads_total: IntCounter,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let transmits_in_progress = IntGauge::new(
            "reconstruction_transmits_in_progress",
            "Reconstruction tasks currently streaming rebuilt bytes to a target node",
        )?;
        let task_pool_active = IntGauge::new(
            "reconstruction_task_pool_active",
            "Reconstruction tasks currently admitted onto the task pool",
        )?;
        let reader_pool_active = IntGauge::new(
            "reconstruction_reader_pool_active",
            "Slice reads currently holding a reader pool slot",
        )?;
        let corrupt_reads_total = IntCounter::new(
            "reconstruction_corrupt_reads_total",
            "Checksum mismatches observed reading from a source peer",
        )?;

        registry.register(Box::new(transmits_in_progress.clone()))?;
        registry.register(Box::new(task_pool_active.clone()))?;
        registry.register(Box::new(reader_pool_active.clone()))?;
        registry.register(Box::new(corrupt_reads_total.clone()))?;

        Ok(Self {
            registry,
            transmits_in_progress,
            task_pool_active,
            reader_pool_active,
            corrupt_reads_total,
        })
    }

    pub fn set_transmits_in_progress(&self, n: u64) {
        self.transmits_in_progress.set(n as i64);
    }

    pub fn set_task_pool_active(&self, n: usize) {
        self.task_pool_active.set(n as i64);
    }

    pub fn set_reader_pool_active(&self, n: usize) {
        self.reader_pool_active.set(n as i64);
    }

    pub fn record_corrupt_reads(&self, n: u64) {
        self.corrupt_reads_total.inc_by(n);
    }

    /// Renders the registry in Prometheus text exposition format.
    pub fn gather(&self) -> Vec<u8> {
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&metric_families, &mut buf)
            .expect("prometheus text encoding is infallible for well-formed metrics");
        buf
    }
}
