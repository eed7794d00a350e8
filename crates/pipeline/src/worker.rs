//! Dispatch workers
//!
//! One long-lived task per destination queue. A worker drains its queue in
//! batches and delivers them through a pooled connection; the backend wire
//! protocol itself lives behind the [`Transport`] trait, outside the
//! pipeline. Delivery is at-most-once: a batch that cannot be delivered is
//! counted and dropped, never re-queued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relay_pool::{BoxError, ConnPool, PoolConn};
use tokio_util::sync::CancellationToken;

use crate::queue::BoundedQueue;

/// Backend delivery capability
///
/// Implemented once per backend family by whatever client that family
/// speaks. The worker hands it a connection on loan from the family's pool;
/// an `Err` tells the worker the connection is no longer trustworthy.
#[async_trait]
pub trait Transport<R>: Send + Sync + 'static {
    /// Pooled connection type this transport writes through
    type Conn: PoolConn + 'static;

    /// Deliver one batch over the given connection.
    async fn deliver(
        &self,
        conn: &mut Self::Conn,
        batch: &[R],
    ) -> std::result::Result<(), BoxError>;
}

/// Worker tuning knobs
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum records drained per delivery
    pub batch: usize,
    /// Sleep when the queue is empty
    pub idle: Duration,
    /// Sleep after pool exhaustion or delivery failure
    pub backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch: 200,
            idle: Duration::from_millis(50),
            backoff: Duration::from_millis(200),
        }
    }
}

/// Per-worker delivery counters
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    sent: AtomicU64,
    failed: AtomicU64,
}

impl WorkerMetrics {
    /// Create a new metrics instance
    pub const fn new() -> Self {
        Self {
            sent: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    #[inline]
    fn record_sent(&self, count: u64) {
        self.sent.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    fn record_failed(&self, count: u64) {
        self.failed.fetch_add(count, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of worker counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerSnapshot {
    /// Records delivered
    pub sent: u64,
    /// Records dropped after a failed delivery or pool exhaustion
    pub failed: u64,
}

/// Drains one destination queue through one connection pool
pub struct DispatchWorker<R, T: Transport<R>> {
    name: String,
    queue: Arc<BoundedQueue<R>>,
    pool: Arc<ConnPool<T::Conn>>,
    transport: Arc<T>,
    config: WorkerConfig,
    metrics: Arc<WorkerMetrics>,
}

impl<R, T> DispatchWorker<R, T>
where
    R: Send + 'static,
    T: Transport<R>,
{
    /// Create a worker over one queue/pool pair.
    ///
    /// `name` identifies the destination in logs, e.g. `alert/alert-00`.
    pub fn new(
        name: impl Into<String>,
        queue: Arc<BoundedQueue<R>>,
        pool: Arc<ConnPool<T::Conn>>,
        transport: Arc<T>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            name: name.into(),
            queue,
            pool,
            transport,
            config,
            metrics: Arc::new(WorkerMetrics::new()),
        }
    }

    /// Counter handle, valid after the worker is consumed by `run`
    pub fn metrics(&self) -> Arc<WorkerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run until cancelled. Spawn this as a tokio task.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::debug!(worker = %self.name, "dispatch worker starting");

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let batch = self.queue.pop_batch(self.config.batch);
            if batch.is_empty() {
                if !self.pause(&cancel, self.config.idle).await {
                    break;
                }
                continue;
            }

            match self.pool.fetch() {
                Ok(mut conn) => match self.transport.deliver(&mut conn, &batch).await {
                    Ok(()) => {
                        self.metrics.record_sent(batch.len() as u64);
                        self.pool.release(conn);
                    }
                    Err(error) => {
                        // connection state is unknown after a failed call
                        self.metrics.record_failed(batch.len() as u64);
                        tracing::warn!(
                            worker = %self.name,
                            count = batch.len(),
                            error = %error,
                            "delivery failed, closing connection"
                        );
                        self.pool.force_close(conn);
                        if !self.pause(&cancel, self.config.backoff).await {
                            break;
                        }
                    }
                },
                Err(error) => {
                    self.metrics.record_failed(batch.len() as u64);
                    if error.is_exhausted() {
                        tracing::debug!(worker = %self.name, "connection pool exhausted, backing off");
                    } else {
                        tracing::warn!(worker = %self.name, error = %error, "connection unavailable");
                    }
                    if !self.pause(&cancel, self.config.backoff).await {
                        break;
                    }
                }
            }
        }

        let snapshot = self.metrics.snapshot();
        tracing::debug!(
            worker = %self.name,
            sent = snapshot.sent,
            failed = snapshot.failed,
            "dispatch worker stopping"
        );
    }

    /// Sleep unless cancelled first. Returns false on cancellation.
    async fn pause(&self, cancel: &CancellationToken, duration: Duration) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;

    struct TestConn {
        name: String,
        closed: bool,
    }

    impl PoolConn for TestConn {
        fn name(&self) -> &str {
            &self.name
        }
        fn closed(&self) -> bool {
            self.closed
        }
        fn close(&mut self) {
            self.closed = true;
        }
    }

    /// Records everything it delivers; fails while `broken` is set.
    struct TestTransport {
        delivered: Mutex<Vec<u64>>,
        broken: std::sync::atomic::AtomicBool,
    }

    impl TestTransport {
        fn new() -> Self {
            Self {
                delivered: Mutex::new(Vec::new()),
                broken: std::sync::atomic::AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl Transport<u64> for TestTransport {
        type Conn = TestConn;

        async fn deliver(
            &self,
            _conn: &mut TestConn,
            batch: &[u64],
        ) -> std::result::Result<(), BoxError> {
            if self.broken.load(Ordering::SeqCst) {
                return Err("backend unreachable".into());
            }
            self.delivered.lock().extend_from_slice(batch);
            Ok(())
        }
    }

    fn test_pool() -> Arc<ConnPool<TestConn>> {
        Arc::new(ConnPool::new(
            "test",
            "127.0.0.1:6080",
            2,
            2,
            Box::new(|name: &str| {
                Ok(TestConn {
                    name: name.to_string(),
                    closed: false,
                })
            }),
        ))
    }

    fn fast_config() -> WorkerConfig {
        WorkerConfig {
            batch: 10,
            idle: Duration::from_millis(5),
            backoff: Duration::from_millis(5),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_worker_drains_in_order() {
        let queue = Arc::new(BoundedQueue::new(100));
        for i in 0..25u64 {
            queue.push(i);
        }
        let transport = Arc::new(TestTransport::new());
        let worker = DispatchWorker::new(
            "test/worker",
            Arc::clone(&queue),
            test_pool(),
            Arc::clone(&transport),
            fast_config(),
        );
        let metrics = worker.metrics();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(cancel.clone()));

        // wait for the queue to drain
        for _ in 0..100 {
            if queue.is_empty() && metrics.snapshot().sent == 25 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancel.cancel();
        handle.await.unwrap();

        let delivered = transport.delivered.lock().clone();
        assert_eq!(delivered, (0..25u64).collect::<Vec<_>>());
        assert_eq!(metrics.snapshot().sent, 25);
        assert_eq!(metrics.snapshot().failed, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_worker_force_closes_on_failure() {
        let queue = Arc::new(BoundedQueue::new(100));
        queue.push(1u64);
        let transport = Arc::new(TestTransport::new());
        transport.broken.store(true, Ordering::SeqCst);
        let pool = test_pool();
        let worker = DispatchWorker::new(
            "test/worker",
            Arc::clone(&queue),
            Arc::clone(&pool),
            Arc::clone(&transport),
            fast_config(),
        );
        let metrics = worker.metrics();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(cancel.clone()));

        for _ in 0..100 {
            if metrics.snapshot().failed >= 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancel.cancel();
        handle.await.unwrap();

        // the broken connection was not returned to the idle list
        assert_eq!(pool.idle(), 0);
        assert_eq!(pool.active(), 0);
        assert!(metrics.snapshot().failed >= 1);
        assert!(transport.delivered.lock().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_worker_stops_on_cancel() {
        let queue: Arc<BoundedQueue<u64>> = Arc::new(BoundedQueue::new(10));
        let worker = DispatchWorker::new(
            "test/worker",
            queue,
            test_pool(),
            Arc::new(TestTransport::new()),
            fast_config(),
        );

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(worker.run(cancel.clone()));
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker did not stop on cancel")
            .unwrap();
    }
}
