//! Bounded candidate queue drained by one worker into the scheduler.
//!
//! Items are buffered and flushed when `flush_size` accumulate, when the
//! flush interval elapses, or when every sender is dropped.

use crate::scheduler::{ScheduleOutcome, Scheduler};
use fieldplan_core::{config::QueueConfig, error::PlanError, model::RawCandidate};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq)]
pub struct QueuedCandidate {
    pub owner_id: i64,
    pub field_id: i64,
    pub candidate: RawCandidate,
}

/// Totals reported by the worker when it exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub flushes: usize,
    pub created: usize,
    pub duplicates: usize,
    pub rejected: usize,
}

#[derive(Clone)]
pub struct CandidateQueue {
    tx: mpsc::Sender<QueuedCandidate>,
}

impl CandidateQueue {
    pub fn spawn(
        scheduler: Arc<Scheduler>,
        config: &QueueConfig,
    ) -> (Self, JoinHandle<WorkerStats>) {
        Self::with_settings(
            scheduler,
            config.capacity,
            config.flush_size,
            Duration::from_secs(config.flush_interval_secs),
        )
    }

    pub fn with_settings(
        scheduler: Arc<Scheduler>,
        capacity: usize,
        flush_size: usize,
        flush_interval: Duration,
    ) -> (Self, JoinHandle<WorkerStats>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::spawn(run_worker(
            scheduler,
            rx,
            flush_size.max(1),
            flush_interval.max(Duration::from_millis(1)),
        ));
        (Self { tx }, handle)
    }

    /// Enqueue one candidate, waiting for room when the queue is full.
    pub async fn submit(&self, item: QueuedCandidate) -> Result<(), PlanError> {
        self.tx
            .send(item)
            .await
            .map_err(|_| PlanError::Queue("candidate worker has stopped".into()))
    }
}

async fn run_worker(
    scheduler: Arc<Scheduler>,
    mut rx: mpsc::Receiver<QueuedCandidate>,
    flush_size: usize,
    flush_interval: Duration,
) -> WorkerStats {
    let mut stats = WorkerStats::default();
    let mut buffer: Vec<QueuedCandidate> = Vec::with_capacity(flush_size);
    let mut ticker = tokio::time::interval(flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately.
    ticker.tick().await;

    info!(
        "candidate worker started (flush at {flush_size} or every {}ms)",
        flush_interval.as_millis()
    );

    loop {
        tokio::select! {
            item = rx.recv() => match item {
                Some(item) => {
                    buffer.push(item);
                    if buffer.len() >= flush_size {
                        flush(&scheduler, &mut buffer, &mut stats).await;
                    }
                }
                None => break,
            },
            _ = ticker.tick() => {
                if !buffer.is_empty() {
                    flush(&scheduler, &mut buffer, &mut stats).await;
                }
            }
        }
    }

    if !buffer.is_empty() {
        flush(&scheduler, &mut buffer, &mut stats).await;
    }
    info!(
        "candidate worker stopped: {} flush(es), {} created, {} duplicate(s), {} rejected",
        stats.flushes, stats.created, stats.duplicates, stats.rejected
    );
    stats
}

async fn flush(scheduler: &Scheduler, buffer: &mut Vec<QueuedCandidate>, stats: &mut WorkerStats) {
    stats.flushes += 1;
    for item in buffer.drain(..) {
        match scheduler
            .schedule(item.owner_id, item.field_id, &item.candidate)
            .await
        {
            Ok(ScheduleOutcome::Created { .. }) => stats.created += 1,
            Ok(ScheduleOutcome::Duplicate { .. }) => stats.duplicates += 1,
            Err(e) => {
                error!(
                    "queued '{}' for field {}: {e}",
                    item.candidate.task_name, item.field_id
                );
                stats.rejected += 1;
            }
        }
    }
}
