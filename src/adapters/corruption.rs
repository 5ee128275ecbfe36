//! Corruption Report Sink Adapters

use async_trait::async_trait;
use tracing::warn;

use crate::domain::ports::{CorruptionReport, CorruptionSink};
use crate::error::Result;

/// Default sink: logs at WARN and drops the report. A real deployment wires
/// a `CorruptionSink` that forwards to the cluster controller's RPC
/// endpoint; that endpoint is out of scope for this crate.
#[derive(Debug, Clone, Default)]
pub struct LoggingCorruptionSink;

#[async_trait]
impl CorruptionSink for LoggingCorruptionSink {
    async fn report(&self, reports: Vec<CorruptionReport>) -> Result<()> {
        for r in &reports {
            warn!(
                block_id = r.block_id,
                internal_index = r.internal_index,
                peer = %r.peer,
                "checksum mismatch reported to cluster controller"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::PeerAddress;

    #[tokio::test]
    async fn accepts_an_empty_report_batch() {
        let sink = LoggingCorruptionSink;
        assert!(sink.report(vec![]).await.is_ok());
    }

    #[tokio::test]
    async fn accepts_a_populated_report_batch() {
        let sink = LoggingCorruptionSink;
        let reports = vec![CorruptionReport {
            block_id: 7,
            internal_index: 2,
            peer: PeerAddress::new("10.0.0.9:9866"),
        }];
        assert!(sink.report(reports).await.is_ok());
    }
}
