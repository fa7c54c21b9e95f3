use std::{num::NonZeroUsize, sync::Arc, time::Instant};

use tokio::{
    sync::{
        Mutex,
        mpsc::{self, UnboundedReceiver},
    },
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::{
    barrier::{CompletionBarrier, WorkerSlot},
    context::ScanContext,
    error::{FetchError, ScanError},
    types::{BlockNumber, BlockRange, BlockResult, ScanResult, ScanStatus},
};

/// Receiving end of the bounded work queue, shared by all workers
type WorkQueue = Arc<Mutex<mpsc::Receiver<BlockNumber>>>;

/// Fans block numbers out to a fixed worker pool and folds the extra-data of every
/// fetched block into a histogram.
pub struct ExtraDataScanner {
    context: ScanContext,
}

impl ExtraDataScanner {
    pub fn new(context: ScanContext) -> Self {
        Self { context }
    }

    /// Scan every block in `range` with `workers` concurrent fetchers.
    ///
    /// Per-block fetch failures are counted under the error key and never abort the scan.
    /// Returns `ScanError::Cancelled` with the partial result when `cancel` fires before
    /// every block was processed. All workers have exited when this returns.
    pub async fn scan(
        &self,
        range: BlockRange,
        workers: NonZeroUsize,
        cancel: CancellationToken,
    ) -> Result<ScanResult, ScanError> {
        let started = Instant::now();
        let workers = workers.get();

        info!(
            start = range.start(),
            end = range.end(),
            workers,
            "🔍 Scanning blocks"
        );
        self.context.progress.status(ScanStatus::Idle);
        self.context.progress.status(ScanStatus::Running);
        self.context.progress.start(range.len());

        let (queue_tx, queue_rx) = mpsc::channel(workers);
        let queue: WorkQueue = Arc::new(Mutex::new(queue_rx));
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let barrier = Arc::new(CompletionBarrier::new(workers, results_tx));

        let mut pool = JoinSet::new();
        for worker_id in 0..workers {
            let slot = WorkerSlot::new(barrier.clone());
            pool.spawn(run_worker(
                worker_id,
                self.context.clone(),
                queue.clone(),
                slot,
                cancel.clone(),
            ));
        }
        drop(queue);

        let dispatcher = tokio::spawn(dispatch(range, queue_tx, cancel.clone()));

        let (result, cancel_observed) =
            aggregate(&self.context, &range, results_rx, &cancel).await;

        match dispatcher.await {
            Ok(dispatched) => debug!(dispatched, "Dispatcher finished"),
            Err(e) => error!("❌ Dispatcher task failed: {}", e),
        }
        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                error!("❌ Worker task failed: {}", e);
            }
        }
        debug_assert_eq!(barrier.live(), 0);

        let status = if cancel_observed && !result.is_complete() {
            ScanStatus::Cancelled
        } else {
            ScanStatus::Completed
        };
        if status == ScanStatus::Completed && !result.is_complete() {
            warn!(
                unaccounted = result.total_requested - result.total_processed,
                "⚠️ Scan completed with unaccounted blocks"
            );
        }

        let elapsed = started.elapsed();
        self.context
            .metrics
            .record_scan_finished(elapsed, result.total_processed, status);
        self.context.progress.status(status);

        info!(
            requested = result.total_requested,
            processed = result.total_processed,
            distinct = result.distinct(),
            failed = result.failed(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Scan {}",
            status.as_str()
        );

        match status {
            ScanStatus::Cancelled => Err(ScanError::Cancelled { partial: result }),
            _ => Ok(result),
        }
    }
}

/// Push every block number of the range, in order, into the work queue.
/// Dropping `queue` on return closes it.
async fn dispatch(
    range: BlockRange,
    queue: mpsc::Sender<BlockNumber>,
    cancel: CancellationToken,
) -> u64 {
    let mut dispatched = 0;
    for block_number in range.iter() {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!(next_block = block_number, dispatched, "Dispatcher cancelled");
                return dispatched;
            }

            sent = queue.send(block_number) => {
                if sent.is_err() {
                    warn!(next_block = block_number, "Work queue closed before range was dispatched");
                    return dispatched;
                }
            }
        }
        dispatched += 1;
    }
    dispatched
}

async fn run_worker(
    worker_id: usize,
    context: ScanContext,
    queue: WorkQueue,
    slot: WorkerSlot,
    cancel: CancellationToken,
) {
    let mut handled = 0u64;

    loop {
        let next = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!(worker_id, handled, "Worker cancelled while waiting for work");
                break;
            }

            next = async { queue.lock().await.recv().await } => next,
        };

        let Some(block_number) = next else {
            debug!(worker_id, handled, "Work queue drained, worker exiting");
            break;
        };

        // A block taken here but not fetched before cancellation is dropped
        let fetched = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!(worker_id, block = block_number, "Worker cancelled mid-fetch, dropping block");
                break;
            }

            fetched = context.source.fetch_block(&cancel, block_number) => fetched,
        };

        let result = match fetched {
            Ok(block) => {
                context.metrics.record_block_fetch_success();
                BlockResult::success(block_number, &block.extra_data)
            }
            // Only the scan's own cancellation drops a block, any other abort counts as a failure
            Err(FetchError::Cancelled) if cancel.is_cancelled() => {
                debug!(worker_id, block = block_number, "Fetch cancelled, dropping block");
                break;
            }
            Err(e) => {
                error!(block = block_number, error = %e, "❌ Error getting block");
                if let Some(reason) = e.failure_reason() {
                    context.metrics.record_block_fetch_failure(reason);
                }
                BlockResult::failure(block_number)
            }
        };

        if !slot.send(result) {
            warn!(worker_id, "Result stream closed, worker exiting");
            break;
        }
        handled += 1;
    }
}

/// Single consumer of the result stream and sole writer of the histogram.
///
/// After cancellation is observed it stops racing the signal and drains until the
/// completion barrier closes the stream. Returns whether cancellation was observed.
async fn aggregate(
    context: &ScanContext,
    range: &BlockRange,
    mut results: UnboundedReceiver<BlockResult>,
    cancel: &CancellationToken,
) -> (ScanResult, bool) {
    let mut scan_result = ScanResult::empty(range);
    let mut cancelled = false;

    loop {
        let next = if cancelled {
            results.recv().await
        } else {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("🛑 Cancellation received, waiting for workers to stop");
                    cancelled = true;
                    continue;
                }

                next = results.recv() => next,
            }
        };

        let Some(block) = next else {
            break;
        };

        debug_assert!(range.contains(block.block_number));
        debug!(block = block.block_number, extra_data = %block.extra_key, "Processed block");
        scan_result.total_processed += 1;
        scan_result.histogram.record(&block.extra_key);
        context
            .metrics
            .record_block_aggregated(scan_result.histogram.len());
        context.progress.increment(1);
    }

    (scan_result, cancelled)
}
