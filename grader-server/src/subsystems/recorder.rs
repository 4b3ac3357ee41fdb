//! Submission record logger
//!
//! Every accepted submission is stamped and handed to a bounded mpsc queue.
//! A single [`RecordLogger`] task drains that queue and appends one JSON line
//! per record to its sink (stdout by default). It is the only writer to the
//! sink.
//!
//! Backpressure: the request path only ever calls `try_send`. When the queue
//! is full the record moves to a deferred task that waits up to
//! `enqueue_timeout` for room, then drops the record and counts it. Response
//! latency never depends on the logger keeping up.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use grader_core::config::RecorderConfig;
use grader_core::SubmissionRecord;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{self, error::SendTimeoutError, error::TrySendError};

/// Counters shared between the producer handles and the logger task.
#[derive(Debug, Default)]
pub struct RecorderStats {
    pending: AtomicUsize,
    recorded: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

impl RecorderStats {
    /// Deferred enqueues still waiting for room in the queue.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    /// Records written to the sink.
    pub fn recorded(&self) -> u64 {
        self.recorded.load(Ordering::Relaxed)
    }

    /// Records that never reached the queue (timeout or logger gone).
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Records dequeued but not written (serialization or sink error).
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of the record queue, reported by `/health`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecorderSnapshot {
    pub queued: usize,
    pub capacity: usize,
    pub pending: usize,
    pub recorded: u64,
    pub dropped: u64,
    pub failed: u64,
}

/// Outcome of handing a record to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Queued,
    /// Queue was full; a background task is waiting for room.
    Deferred,
    /// The logger is gone; the record was discarded.
    Dropped,
}

/// Producer handle. Cheap to clone; one lives in the HTTP state.
#[derive(Debug, Clone)]
pub struct RecordQueue {
    tx: mpsc::Sender<SubmissionRecord>,
    enqueue_timeout: Duration,
    stats: Arc<RecorderStats>,
}

/// The single consumer. Owns the receiver and the sink.
pub struct RecordLogger<W> {
    rx: mpsc::Receiver<SubmissionRecord>,
    sink: W,
    stats: Arc<RecorderStats>,
}

/// Create the queue and its logger. A capacity of zero is raised to one.
pub fn record_channel<W>(
    capacity: usize,
    enqueue_timeout: Duration,
    sink: W,
) -> (RecordQueue, RecordLogger<W>)
where
    W: AsyncWrite + Unpin,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let stats = Arc::new(RecorderStats::default());
    (
        RecordQueue {
            tx,
            enqueue_timeout,
            stats: stats.clone(),
        },
        RecordLogger { rx, sink, stats },
    )
}

pub fn record_channel_from_config<W>(
    config: &RecorderConfig,
    sink: W,
) -> (RecordQueue, RecordLogger<W>)
where
    W: AsyncWrite + Unpin,
{
    record_channel(
        config.queue_capacity,
        Duration::from_millis(config.enqueue_timeout_ms),
        sink,
    )
}

/// Open the configured sink: `-` is stdout, anything else a file in append mode.
pub async fn open_sink(output: &str) -> std::io::Result<Box<dyn AsyncWrite + Send + Unpin>> {
    if output == "-" {
        return Ok(Box::new(tokio::io::stdout()));
    }

    let file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(output)
        .await?;
    tracing::info!(path = output, "Recording submissions to file");
    Ok(Box::new(file))
}

impl RecordQueue {
    /// Hand a record to the logger without waiting. Must be called from
    /// within a tokio runtime.
    pub fn submit(&self, record: SubmissionRecord) -> Enqueued {
        match self.tx.try_send(record) {
            Ok(()) => Enqueued::Queued,
            Err(TrySendError::Full(record)) => {
                self.spawn_deferred(record);
                Enqueued::Deferred
            }
            Err(TrySendError::Closed(record)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    identifier = %record.submission.identifier,
                    session = %record.submission.session,
                    "Record logger is gone, dropping submission record"
                );
                Enqueued::Dropped
            }
        }
    }

    fn spawn_deferred(&self, record: SubmissionRecord) {
        let tx = self.tx.clone();
        let stats = self.stats.clone();
        let timeout = self.enqueue_timeout;

        let pending = stats.pending.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(pending, "Record queue full, deferring enqueue");

        tokio::spawn(async move {
            let result = tx.send_timeout(record, timeout).await;
            stats.pending.fetch_sub(1, Ordering::Relaxed);

            match result {
                Ok(()) => {}
                Err(SendTimeoutError::Timeout(record)) => {
                    stats.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        identifier = %record.submission.identifier,
                        session = %record.submission.session,
                        timeout_ms = timeout.as_millis() as u64,
                        "Record queue stayed full, dropping submission record"
                    );
                }
                Err(SendTimeoutError::Closed(record)) => {
                    stats.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        identifier = %record.submission.identifier,
                        session = %record.submission.session,
                        "Record logger closed while enqueue was deferred"
                    );
                }
            }
        });
    }

    pub fn stats(&self) -> Arc<RecorderStats> {
        self.stats.clone()
    }

    pub fn snapshot(&self) -> RecorderSnapshot {
        let capacity = self.tx.max_capacity();
        RecorderSnapshot {
            queued: capacity - self.tx.capacity(),
            capacity,
            pending: self.stats.pending(),
            recorded: self.stats.recorded(),
            dropped: self.stats.dropped(),
            failed: self.stats.failed(),
        }
    }
}

impl<W> RecordLogger<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn stats(&self) -> Arc<RecorderStats> {
        self.stats.clone()
    }

    /// Drain the queue until every producer handle is dropped, then return
    /// the sink. A record that cannot be written is counted and skipped.
    pub async fn run(mut self) -> W {
        tracing::info!("Record logger started");

        while let Some(record) = self.rx.recv().await {
            self.write_record(&record).await;
        }

        if let Err(e) = self.sink.flush().await {
            tracing::error!(error = %e, "Failed to flush record sink on shutdown");
        }
        tracing::info!(
            recorded = self.stats.recorded(),
            dropped = self.stats.dropped(),
            failed = self.stats.failed(),
            "Record logger stopped"
        );
        self.sink
    }

    async fn write_record(&mut self, record: &SubmissionRecord) {
        let mut line = match serde_json::to_vec(record) {
            Ok(line) => line,
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    identifier = %record.submission.identifier,
                    error = %e,
                    "Failed to serialize submission record"
                );
                return;
            }
        };
        line.push(b'\n');

        let written = match self.sink.write_all(&line).await {
            Ok(()) => self.sink.flush().await,
            Err(e) => Err(e),
        };
        match written {
            Ok(()) => {
                self.stats.recorded.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    identifier = %record.submission.identifier,
                    error = %e,
                    "Failed to write submission record"
                );
            }
        }
    }
}
