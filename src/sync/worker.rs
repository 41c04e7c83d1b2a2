//! Kind worker: drains one queue in bounded batches.

use crate::error::{CacheError, CacheResult};
use crate::models::{CatalogObjectRef, ObjectKind};
use crate::sync::{KindQueue, SyncState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Receives each flushed batch. The detail fetcher in production.
#[async_trait]
pub trait BatchHandler: Send + Sync {
    async fn handle(&self, kind: ObjectKind, batch: &[CatalogObjectRef]) -> CacheResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerConfig {
    pub batch_size: usize,
    pub poll_interval: Duration,
    pub save_retries: u32,
}

/// What one worker did during a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReport {
    pub kind: ObjectKind,
    /// Objects handed to the handler.
    pub objects: usize,
    pub batches: usize,
    pub failed_batches: usize,
    /// Batches whose local save still failed after every retry.
    pub save_failures: usize,
    /// Batches that lost the remote connection. Any of these fails the cycle.
    pub connection_failures: usize,
}

impl WorkerReport {
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            objects: 0,
            batches: 0,
            failed_batches: 0,
            save_failures: 0,
            connection_failures: 0,
        }
    }
}

pub struct KindWorker {
    queue: Arc<KindQueue>,
    state: Arc<SyncState>,
    handler: Arc<dyn BatchHandler>,
    config: WorkerConfig,
    cancel: CancellationToken,
}

impl KindWorker {
    pub fn new(
        queue: Arc<KindQueue>,
        state: Arc<SyncState>,
        handler: Arc<dyn BatchHandler>,
        config: WorkerConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            queue,
            state,
            handler,
            config,
            cancel,
        }
    }

    /// Run the drain protocol until the lister is done and the queue is empty.
    ///
    /// The producer flag is read before each drain pass. A pass that starts after the
    /// lister stopped is therefore the final one, and it sees every enqueued item.
    pub async fn run(self) -> WorkerReport {
        let kind = self.queue.kind();
        let batch_size = self.config.batch_size.max(1);
        let mut report = WorkerReport::new(kind);
        let mut batch = Vec::with_capacity(batch_size);

        'drain: loop {
            let producer_done = !self.state.is_producing();

            while let Some(item) = self.queue.dequeue() {
                batch.push(item);
                if batch.len() >= batch_size {
                    self.flush(&mut batch, &mut report).await;
                    if self.cancel.is_cancelled() {
                        break 'drain;
                    }
                }
            }
            if !batch.is_empty() {
                self.flush(&mut batch, &mut report).await;
            }

            if producer_done || self.cancel.is_cancelled() {
                break;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        info!(
            kind = %kind,
            objects = report.objects,
            batches = report.batches,
            failed = report.failed_batches,
            component = "worker",
            "Worker finished"
        );
        report
    }

    async fn flush(&self, batch: &mut Vec<CatalogObjectRef>, report: &mut WorkerReport) {
        let kind = self.queue.kind();
        let items = std::mem::replace(batch, Vec::with_capacity(self.config.batch_size.max(1)));
        report.batches += 1;
        report.objects += items.len();

        debug!(
            kind = %kind,
            batch = report.batches,
            size = items.len(),
            component = "worker",
            "Flushing batch"
        );

        let mut attempt = 0;
        loop {
            let err = match self.handler.handle(kind, &items).await {
                Ok(()) => return,
                Err(err) => err,
            };

            match err {
                CacheError::Save { .. } if attempt < self.config.save_retries => {
                    attempt += 1;
                    warn!(
                        kind = %kind,
                        batch = report.batches,
                        attempt,
                        error = %err,
                        component = "worker",
                        "Save failed, retrying batch"
                    );
                }
                CacheError::Save { .. } => {
                    report.failed_batches += 1;
                    report.save_failures += 1;
                    error!(
                        kind = %kind,
                        batch = report.batches,
                        error = %err,
                        component = "worker",
                        "Save failed, batch dropped"
                    );
                    return;
                }
                err if err.is_connection_level() => {
                    report.failed_batches += 1;
                    report.connection_failures += 1;
                    error!(
                        kind = %kind,
                        batch = report.batches,
                        error = %err,
                        component = "worker",
                        "Remote connection lost, aborting cycle"
                    );
                    self.cancel.cancel();
                    return;
                }
                err => {
                    report.failed_batches += 1;
                    error!(
                        kind = %kind,
                        batch = report.batches,
                        error = %err,
                        component = "worker",
                        "Batch failed, skipped"
                    );
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Records batch sizes; optionally fails with scripted errors first.
    #[derive(Default)]
    struct Recorder {
        batches: Mutex<Vec<usize>>,
        failures: Mutex<VecDeque<CacheError>>,
    }

    impl Recorder {
        fn failing_with(errors: Vec<CacheError>) -> Self {
            Self {
                batches: Mutex::default(),
                failures: Mutex::new(errors.into()),
            }
        }

        fn sizes(&self) -> Vec<usize> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BatchHandler for Recorder {
        async fn handle(&self, _kind: ObjectKind, batch: &[CatalogObjectRef]) -> CacheResult<()> {
            self.batches.lock().unwrap().push(batch.len());
            match self.failures.lock().unwrap().pop_front() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    fn config(batch_size: usize) -> WorkerConfig {
        WorkerConfig {
            batch_size,
            poll_interval: Duration::from_millis(10),
            save_retries: 1,
        }
    }

    fn filled_queue(n: usize) -> Arc<KindQueue> {
        let queue = Arc::new(KindQueue::new(ObjectKind::Table));
        queue.enqueue_many(
            (0..n).map(|i| CatalogObjectRef::new("HR", format!("T{i}"), ObjectKind::Table, None)),
        );
        queue
    }

    #[tokio::test]
    async fn test_batches_of_thousand() {
        let queue = filled_queue(2500);
        let state = Arc::new(SyncState::new());
        let recorder = Arc::new(Recorder::default());

        let worker = KindWorker::new(
            queue,
            state,
            recorder.clone(),
            config(1000),
            CancellationToken::new(),
        );
        let report = worker.run().await;

        assert_eq!(recorder.sizes(), vec![1000, 1000, 500]);
        assert_eq!(report.batches, 3);
        assert_eq!(report.objects, 2500);
        assert_eq!(report.failed_batches, 0);
    }

    #[tokio::test]
    async fn test_final_drain_after_producer_finishes() {
        let queue = filled_queue(3);
        let state = Arc::new(SyncState::new());
        state.start_producing();
        let recorder = Arc::new(Recorder::default());

        let worker = KindWorker::new(
            queue.clone(),
            state.clone(),
            recorder.clone(),
            config(1000),
            CancellationToken::new(),
        );
        let handle = tokio::spawn(worker.run());

        // Items arrive after the first drain pass, then the producer stops.
        tokio::time::sleep(Duration::from_millis(25)).await;
        queue.enqueue_many(
            (0..4).map(|i| CatalogObjectRef::new("HR", format!("L{i}"), ObjectKind::Table, None)),
        );
        state.stop_producing();

        let report = handle.await.unwrap();
        assert_eq!(report.objects, 7);
        assert_eq!(recorder.sizes().iter().sum::<usize>(), 7);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_save_failure_retried_once() {
        let queue = filled_queue(10);
        let state = Arc::new(SyncState::new());
        let recorder = Arc::new(Recorder::failing_with(vec![CacheError::save("disk full")]));

        let report = KindWorker::new(
            queue,
            state,
            recorder.clone(),
            config(1000),
            CancellationToken::new(),
        )
        .run()
        .await;

        assert_eq!(recorder.sizes(), vec![10, 10]);
        assert_eq!(report.save_failures, 0);
        assert_eq!(report.failed_batches, 0);
    }

    #[tokio::test]
    async fn test_save_failure_after_retries_is_recorded() {
        let queue = filled_queue(10);
        let state = Arc::new(SyncState::new());
        let recorder = Arc::new(Recorder::failing_with(vec![
            CacheError::save("disk full"),
            CacheError::save("disk full"),
        ]));

        let report = KindWorker::new(
            queue,
            state,
            recorder,
            config(1000),
            CancellationToken::new(),
        )
        .run()
        .await;

        assert_eq!(report.save_failures, 1);
        assert_eq!(report.failed_batches, 1);
    }

    #[tokio::test]
    async fn test_remote_failure_skips_batch_and_continues() {
        let queue = filled_queue(25);
        let state = Arc::new(SyncState::new());
        let recorder = Arc::new(Recorder::failing_with(vec![CacheError::remote_query(
            "ORA-00942: table or view does not exist",
            None,
        )]));

        let report = KindWorker::new(
            queue,
            state,
            recorder.clone(),
            config(10),
            CancellationToken::new(),
        )
        .run()
        .await;

        assert_eq!(recorder.sizes(), vec![10, 10, 5]);
        assert_eq!(report.failed_batches, 1);
        assert_eq!(report.save_failures, 0);
    }

    #[tokio::test]
    async fn test_connection_failure_cancels_cycle() {
        let queue = filled_queue(25);
        let state = Arc::new(SyncState::new());
        let cancel = CancellationToken::new();
        let recorder = Arc::new(Recorder::failing_with(vec![CacheError::not_connected(
            "pool closed",
        )]));

        let report = KindWorker::new(queue, state, recorder.clone(), config(10), cancel.clone())
            .run()
            .await;

        assert!(cancel.is_cancelled());
        assert_eq!(report.connection_failures, 1);
        assert_eq!(recorder.sizes(), vec![10]);
    }

    #[tokio::test]
    async fn test_cancel_stops_polling() {
        let queue = Arc::new(KindQueue::new(ObjectKind::View));
        let state = Arc::new(SyncState::new());
        state.start_producing();
        let cancel = CancellationToken::new();

        let worker = KindWorker::new(
            queue,
            state,
            Arc::new(Recorder::default()),
            WorkerConfig {
                batch_size: 1000,
                poll_interval: Duration::from_secs(3600),
                save_retries: 1,
            },
            cancel.clone(),
        );
        let handle = tokio::spawn(worker.run());
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let report = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
        assert_eq!(report.kind, ObjectKind::View);
        assert_eq!(report.batches, 0);
    }
}
