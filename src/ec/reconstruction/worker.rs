//! Reconstruction Worker
//!
//! Owns the two pools a node's reconstruction traffic runs on: a Task Pool
//! that bounds how many reconstruction orders run concurrently, and a
//! shared Reader Pool that bounds concurrent slice reads
//! across every task the worker is running. `submit` never blocks the
//! caller; each admitted order runs on its own spawned task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

use crate::domain::ports::{BlockTokenIssuer, CorruptionSink, PeerConnectionFactory};
use crate::ec::reconstruction::order::ReconstructionOrder;
use crate::ec::reconstruction::reader_pool::ReaderPool;
use crate::ec::reconstruction::task::ReconstructionTask;

/// Tunables surfaced on the CLI: the two pool sizes, the
/// per-slice read timeout, and the configured raw read-buffer size that
/// `slice_size` rounds down from.
#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    pub task_pool_threads: usize,
    pub reader_pool_threads: usize,
    pub slice_read_timeout: Duration,
    pub raw_buffer_size: u64,
}

/// Runs reconstruction orders against the two pools described above. Cheap
/// to clone via `Arc<ReconstructionWorker>`, since every field is itself shared
/// or `Copy`.
pub struct ReconstructionWorker {
    task_semaphore: Arc<Semaphore>,
    reader_pool: Arc<ReaderPool>,
    connector: Arc<dyn PeerConnectionFactory>,
    tokens: Arc<dyn BlockTokenIssuer>,
    corruption_sink: Arc<dyn CorruptionSink>,
    config: WorkerConfig,
    transmits_in_progress: Arc<AtomicU64>,
}

impl ReconstructionWorker {
    pub fn new(
        config: WorkerConfig,
        connector: Arc<dyn PeerConnectionFactory>,
        tokens: Arc<dyn BlockTokenIssuer>,
        corruption_sink: Arc<dyn CorruptionSink>,
    ) -> Self {
        Self {
            task_semaphore: Arc::new(Semaphore::new(config.task_pool_threads.max(1))),
            reader_pool: Arc::new(ReaderPool::new(config.reader_pool_threads)),
            connector,
            tokens,
            corruption_sink,
            config,
            transmits_in_progress: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of reconstruction tasks currently past admission and actively
    /// running.
    pub fn transmits_in_progress(&self) -> u64 {
        self.transmits_in_progress.load(Ordering::Relaxed)
    }

    /// Reconstruction tasks currently admitted onto the task pool (Task Pool
    /// active-count gauge).
    pub fn task_pool_active(&self) -> usize {
        self.config.task_pool_threads.max(1) - self.task_semaphore.available_permits()
    }

    /// Slice reads currently holding a reader pool slot (Reader Pool
    /// active-count gauge).
    pub fn reader_pool_active(&self) -> usize {
        self.reader_pool.active()
    }

    /// Admits a batch of reconstruction orders. Each
    /// order is constructed into a task and spawned independently; a
    /// construction failure or a "no valid target" order is logged and
    /// dropped without affecting the rest of the batch.
    #[instrument(skip(self, orders), fields(batch_size = orders.len()))]
    pub fn submit(self: &Arc<Self>, orders: Vec<ReconstructionOrder>) {
        for order in orders {
            let worker = Arc::clone(self);
            tokio::spawn(async move {
                worker.run_one(order).await;
            });
        }
    }

    async fn run_one(self: Arc<Self>, order: ReconstructionOrder) {
        let block_id = order.extended_block.block_id;
        let task = match ReconstructionTask::new(
            order,
            Arc::clone(&self.connector),
            Arc::clone(&self.tokens),
            Arc::clone(&self.corruption_sink),
            Arc::clone(&self.reader_pool),
            self.config.slice_read_timeout,
            self.config.raw_buffer_size,
        ) {
            Ok(Some(task)) => task,
            Ok(None) => {
                warn!(block_id, "no valid target to reconstruct, dropping order");
                return;
            }
            Err(e) => {
                warn!(block_id, error = %e, "failed to construct reconstruction task, dropping order");
                return;
            }
        };

        let _permit = match self.task_semaphore.acquire().await {
            Ok(p) => p,
            Err(_) => return,
        };

        self.transmits_in_progress.fetch_add(1, Ordering::Relaxed);
        let result = task.run().await;
        self.transmits_in_progress.fetch_sub(1, Ordering::Relaxed);

        match result {
            Ok(()) => debug!(block_id, "reconstruction task completed"),
            Err(e) => warn!(block_id, error = %e, "reconstruction task failed"),
        }
    }

    /// Stops admitting new tasks onto the Task Pool. In-flight tasks are not
    /// forcibly cancelled; they run to their own completion.
    pub fn shutdown(&self) {
        self.task_semaphore.close();
    }
}
