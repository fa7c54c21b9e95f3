use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::core::types::BlockResult;

/// Countdown of live workers that owns the result stream's original sender.
///
/// The arrival that brings the count to zero drops the sender. Once every worker's
/// clone is gone as well, the aggregator's receiver observes the stream as closed.
pub struct CompletionBarrier {
    live: AtomicUsize,
    results: Mutex<Option<UnboundedSender<BlockResult>>>,
}

impl CompletionBarrier {
    pub fn new(workers: usize, results: UnboundedSender<BlockResult>) -> Self {
        let results = if workers == 0 { None } else { Some(results) };
        Self {
            live: AtomicUsize::new(workers),
            results: Mutex::new(results),
        }
    }

    /// Workers that have not exited yet
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Sender clone for a new worker, `None` once the stream was closed
    fn sender(&self) -> Option<UnboundedSender<BlockResult>> {
        self.results
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().cloned())
    }

    fn arrive(&self) {
        let previous = self.live.fetch_sub(1, Ordering::AcqRel);
        if previous == 1 {
            if let Ok(mut slot) = self.results.lock() {
                slot.take();
            }
            debug!("All workers exited, result stream closed");
        }
    }
}

/// Per-worker handle on the result stream.
///
/// Dropping the slot releases the worker's sender and then arrives at the barrier, so a
/// worker that panics is still counted.
pub struct WorkerSlot {
    results: Option<UnboundedSender<BlockResult>>,
    barrier: Arc<CompletionBarrier>,
}

impl WorkerSlot {
    pub fn new(barrier: Arc<CompletionBarrier>) -> Self {
        Self {
            results: barrier.sender(),
            barrier,
        }
    }

    /// Emit a result. Returns false when the aggregator is gone.
    pub fn send(&self, result: BlockResult) -> bool {
        match &self.results {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        self.results.take();
        self.barrier.arrive();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn last_arrival_closes_the_stream() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let barrier = Arc::new(CompletionBarrier::new(3, tx));

        let slots: Vec<_> = (0..3).map(|_| WorkerSlot::new(barrier.clone())).collect();
        assert_eq!(barrier.live(), 3);

        for (i, slot) in slots.iter().enumerate() {
            assert!(slot.send(BlockResult::failure(i as u64)));
        }

        let mut slots = slots.into_iter();
        drop(slots.next());
        drop(slots.next());
        assert_eq!(barrier.live(), 1);
        assert!(rx.try_recv().is_ok());

        drop(slots.next());
        assert_eq!(barrier.live(), 0);

        let mut drained = 1;
        while let Some(_) = rx.recv().await {
            drained += 1;
        }
        assert_eq!(drained, 3);
    }

    #[tokio::test]
    async fn stream_stays_open_while_a_worker_lives() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let barrier = Arc::new(CompletionBarrier::new(2, tx));
        let first = WorkerSlot::new(barrier.clone());
        let second = WorkerSlot::new(barrier.clone());

        drop(first);
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Empty)
        ));

        assert!(second.send(BlockResult::failure(9)));
        drop(second);
        assert_eq!(rx.recv().await.map(|r| r.block_number), Some(9));
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn panicking_worker_still_arrives() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let barrier = Arc::new(CompletionBarrier::new(1, tx));
        let slot = WorkerSlot::new(barrier.clone());

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _slot = slot;
            panic!("worker blew up");
        }));

        assert!(outcome.is_err());
        assert_eq!(barrier.live(), 0);
    }

    #[test]
    fn send_fails_after_receiver_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let barrier = Arc::new(CompletionBarrier::new(1, tx));
        let slot = WorkerSlot::new(barrier);
        drop(rx);
        assert!(!slot.send(BlockResult::failure(1)));
    }
}
