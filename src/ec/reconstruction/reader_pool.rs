//! Reader Pool
//!
//! Shared across *all* reconstruction tasks on this Worker. Submissions try
//! to acquire a worker slot immediately (direct-handoff queue, there is no
//! backing queue to wait in); when no slot is free the read runs on the
//! submitter's own task instead of being queued or rejected.

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::Semaphore;

/// Bounded pool of worker slots for per-slice remote reads.
pub struct ReaderPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl ReaderPool {
    pub fn new(threads: usize) -> Self {
        let capacity = threads.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Slots currently held by an in-flight read.
    pub fn active(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    /// Submits `fut` for execution, returning a future that resolves to its
    /// output regardless of whether the job was actually spawned onto the
    /// pool or run inline. Spawning lets the caller keep racing other reads
    /// concurrently; running inline (pool saturated) blocks the caller for
    /// the duration of this one read, which is exactly the back-pressure
    /// the direct-handoff queue is meant to apply.
    pub async fn submit<F, T>(&self, fut: F) -> BoxFuture<'static, T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        match Arc::clone(&self.semaphore).try_acquire_owned() {
            Ok(permit) => {
                let handle = tokio::spawn(async move {
                    let _permit = permit;
                    fut.await
                });
                async move { handle.await.expect("reader pool task panicked") }.boxed()
            }
            Err(_) => {
                // Caller-runs: the read happens right here, synchronously,
                // before this function returns its (already-resolved) future.
                let result = fut.await;
                futures::future::ready(result).boxed()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn spawns_when_a_slot_is_free() {
        let pool = ReaderPool::new(4);
        let fut = pool.submit(async { 7u32 }).await;
        assert_eq!(fut.await, 7);
    }

    #[tokio::test]
    async fn saturated_pool_runs_inline_without_losing_work() {
        let pool = Arc::new(ReaderPool::new(1));
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));

        let mut jobs = Vec::new();
        for _ in 0..5 {
            let pool = Arc::clone(&pool);
            let concurrent = Arc::clone(&concurrent);
            let max_concurrent = Arc::clone(&max_concurrent);
            jobs.push(tokio::spawn(async move {
                let fut = pool
                    .submit(async move {
                        let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                        max_concurrent.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        concurrent.fetch_sub(1, Ordering::SeqCst);
                        1u32
                    })
                    .await;
                fut.await
            }));
        }

        let mut total = 0u32;
        for job in jobs {
            total += job.await.unwrap();
        }
        assert_eq!(total, 5);
        // Pool capacity is 1: at most 2 could ever overlap (the one holding
        // the slot plus, at worst, one caller-runs execution racing it),
        // and it must never hit the full fan-out of 5.
        assert!(max_concurrent.load(Ordering::SeqCst) < 5);
    }
}
