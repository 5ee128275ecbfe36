//! Corruption-reporting decorator that feeds the Prometheus counter.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::ports::{CorruptionReport, CorruptionSink};
use crate::error::Result;
use crate::metrics::registry::Metrics;

/// Wraps another `CorruptionSink`, incrementing the corrupt-reads counter
/// before delegating.
pub struct MetricsCorruptionSink {
    inner: Arc<dyn CorruptionSink>,
    metrics: Arc<Metrics>,
}

impl MetricsCorruptionSink {
    pub fn new(inner: Arc<dyn CorruptionSink>, metrics: Arc<Metrics>) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl CorruptionSink for MetricsCorruptionSink {
    async fn report(&self, reports: Vec<CorruptionReport>) -> Result<()> {
        self.metrics.record_corrupt_reads(reports.len() as u64);
        self.inner.report(reports).await
    }
}
