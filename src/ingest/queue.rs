//! In-memory ingestion queue with a single consumer.
//!
//! Items go into an unbounded channel read by exactly one worker, so at most
//! one drain runs at any time and items are processed strictly in the order
//! they were enqueued. A batch is sent as one message and stays contiguous.
//!
//! The queue is not durable: items still pending when the process exits are
//! lost.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::error::IngestError;
use super::pipeline::{Outcome, Pipeline};
use crate::domain::QueueItem;

/// Result of one processed item, in processing order
#[derive(Debug)]
pub struct ItemReport {
    pub item: QueueItem,
    pub result: Result<Outcome, IngestError>,
}

/// Counters over everything a worker processed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub stored: usize,
    pub duplicates: usize,
    pub unusable: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl QueueStats {
    fn record(&mut self, result: &Result<Outcome, IngestError>) {
        match result {
            Ok(Outcome::Stored(_)) => self.stored += 1,
            Ok(Outcome::Duplicate(_)) => self.duplicates += 1,
            Ok(Outcome::Unusable) => self.unusable += 1,
            Ok(Outcome::Skipped) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }

    /// Total items processed
    pub fn total(&self) -> usize {
        self.stored + self.duplicates + self.unusable + self.skipped + self.failed
    }
}

/// Handle for submitting work to the ingestion worker
pub struct IngestQueue {
    tx: mpsc::UnboundedSender<Vec<QueueItem>>,
    pending: Arc<AtomicUsize>,
    worker: JoinHandle<QueueStats>,
}

impl IngestQueue {
    /// Start the worker. Must be called from within a Tokio runtime.
    pub fn spawn(pipeline: Pipeline) -> Self {
        Self::start(pipeline, None)
    }

    /// Start the worker and receive a report for every processed item
    pub fn spawn_with_reports(pipeline: Pipeline) -> (Self, mpsc::UnboundedReceiver<ItemReport>) {
        let (report_tx, report_rx) = mpsc::unbounded_channel();
        (Self::start(pipeline, Some(report_tx)), report_rx)
    }

    fn start(pipeline: Pipeline, reports: Option<mpsc::UnboundedSender<ItemReport>>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));

        let worker = tokio::task::spawn_blocking({
            let pending = Arc::clone(&pending);
            move || drain(pipeline, rx, pending, reports)
        });

        Self {
            tx,
            pending,
            worker,
        }
    }

    /// Append one item. Ownership of its staging file passes to the queue.
    pub fn enqueue(&self, item: QueueItem) -> Result<(), IngestError> {
        tracing::debug!(
            file = %item.original_name,
            temp = %item.temp_name,
            "Enqueued upload"
        );
        self.submit(vec![item])
    }

    /// Append several items, keeping their relative order and contiguity
    pub fn enqueue_batch(&self, items: impl IntoIterator<Item = QueueItem>) -> Result<usize, IngestError> {
        let batch: Vec<QueueItem> = items.into_iter().collect();
        let count = batch.len();
        if count == 0 {
            return Ok(0);
        }
        tracing::debug!("Enqueued batch of {} uploads", count);
        self.submit(batch)?;
        Ok(count)
    }

    fn submit(&self, batch: Vec<QueueItem>) -> Result<(), IngestError> {
        let count = batch.len();
        self.pending.fetch_add(count, Ordering::SeqCst);
        if self.tx.send(batch).is_err() {
            self.pending.fetch_sub(count, Ordering::SeqCst);
            return Err(IngestError::QueueClosed);
        }
        Ok(())
    }

    /// Items accepted but not yet finished
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Stop accepting items, finish everything already accepted, and return
    /// the worker's counters
    pub async fn shutdown(self) -> Result<QueueStats, IngestError> {
        drop(self.tx);
        self.worker
            .await
            .map_err(|e| IngestError::Worker(e.to_string()))
    }
}

/// Worker loop. Runs until every sender is gone and the channel is empty.
fn drain(
    mut pipeline: Pipeline,
    mut rx: mpsc::UnboundedReceiver<Vec<QueueItem>>,
    pending: Arc<AtomicUsize>,
    reports: Option<mpsc::UnboundedSender<ItemReport>>,
) -> QueueStats {
    let mut stats = QueueStats::default();

    while let Some(batch) = rx.blocking_recv() {
        for item in batch {
            tracing::debug!(
                file = %item.original_name,
                remaining = pending.load(Ordering::SeqCst),
                "Processing upload"
            );

            // One item must never take the worker down with it
            let result = panic::catch_unwind(AssertUnwindSafe(|| pipeline.process(&item)))
                .unwrap_or_else(|_| Err(IngestError::Worker("item processing panicked".to_string())));

            match &result {
                Ok(outcome) => tracing::debug!(
                    file = %item.original_name,
                    outcome = outcome.label(),
                    "Finished upload"
                ),
                Err(e) => tracing::error!(
                    file = %item.original_name,
                    temp = %item.temp_name,
                    step = %e.step().map(|s| s.to_string()).unwrap_or_else(|| "worker".to_string()),
                    "Ingestion failed: {}",
                    e
                ),
            }

            stats.record(&result);
            pending.fetch_sub(1, Ordering::SeqCst);

            if let Some(tx) = &reports {
                // Nobody listening is fine
                let _ = tx.send(ItemReport { item, result });
            }
        }
    }

    tracing::debug!("Ingestion worker stopped after {} items", stats.total());
    stats
}
