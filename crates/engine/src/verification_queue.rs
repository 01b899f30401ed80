//! Hand-off between `submit` and verification.
//!
//! A bounded channel carries submission ids to a supervised worker that runs
//! `process_submission` with limited concurrency. A full queue is not an error for the
//! caller: the submission is already persisted and the verification sweep picks it up.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info};

use gigledger_core::SubmissionId;

use crate::pipeline::{ProcessOutcome, SubmissionPipeline};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("verification queue is full")]
    Full,
    #[error("verification queue is closed")]
    Closed,
}

/// Worker runtime statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct QueueStats {
    pub enqueued: u64,
    pub dropped: u64,
    pub processed: u64,
    pub approved: u64,
    pub rejected: u64,
    pub deferred: u64,
    pub failed: u64,
    pub current_running: usize,
    pub uptime_secs: u64,
}

type SharedStats = Arc<Mutex<QueueStats>>;

fn record(stats: &SharedStats, update: impl FnOnce(&mut QueueStats)) {
    if let Ok(mut s) = stats.lock() {
        update(&mut s);
    }
}

/// Sending side, held by the pipeline.
#[derive(Debug, Clone)]
pub struct VerificationQueue {
    tx: mpsc::Sender<SubmissionId>,
    stats: SharedStats,
}

/// Receiving side, consumed by [`VerificationWorker::spawn`].
#[derive(Debug)]
pub struct VerificationInbox {
    rx: mpsc::Receiver<SubmissionId>,
    stats: SharedStats,
}

pub fn channel(capacity: usize) -> (VerificationQueue, VerificationInbox) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let stats = SharedStats::default();
    (VerificationQueue { tx, stats: stats.clone() }, VerificationInbox { rx, stats })
}

impl VerificationQueue {
    pub fn enqueue(&self, id: SubmissionId) -> Result<(), QueueError> {
        match self.tx.try_send(id) {
            Ok(()) => {
                record(&self.stats, |s| s.enqueued += 1);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                record(&self.stats, |s| s.dropped += 1);
                Err(QueueError::Full)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                record(&self.stats, |s| s.dropped += 1);
                Err(QueueError::Closed)
            }
        }
    }

    pub fn stats(&self) -> QueueStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

/// Handle to a running worker.
#[derive(Debug)]
pub struct VerificationWorkerHandle {
    shutdown: watch::Sender<bool>,
    join: Option<JoinHandle<()>>,
    stats: SharedStats,
    started: Instant,
}

impl VerificationWorkerHandle {
    /// Stop taking new ids and wait for in-flight verifications to finish.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }

    pub fn stats(&self) -> QueueStats {
        let mut stats = self.stats.lock().map(|s| s.clone()).unwrap_or_default();
        stats.uptime_secs = self.started.elapsed().as_secs();
        stats
    }
}

pub struct VerificationWorker;

impl VerificationWorker {
    pub fn spawn(
        inbox: VerificationInbox,
        pipeline: Arc<SubmissionPipeline>,
        max_concurrent: usize,
    ) -> VerificationWorkerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = inbox.stats.clone();
        let join = tokio::spawn(worker_loop(inbox, pipeline, max_concurrent.max(1), shutdown_rx));
        VerificationWorkerHandle { shutdown: shutdown_tx, join: Some(join), stats, started: Instant::now() }
    }
}

async fn worker_loop(
    mut inbox: VerificationInbox,
    pipeline: Arc<SubmissionPipeline>,
    max_concurrent: usize,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(max_concurrent, "verification worker started");
    let permits = Arc::new(Semaphore::new(max_concurrent));
    let mut running = JoinSet::new();

    loop {
        while running.try_join_next().is_some() {}

        let next = tokio::select! {
            _ = shutdown.changed() => break,
            next = inbox.rx.recv() => next,
        };
        let Some(id) = next else { break };

        let Ok(permit) = permits.clone().acquire_owned().await else { break };
        let pipeline = pipeline.clone();
        let stats = inbox.stats.clone();
        record(&stats, |s| s.current_running += 1);
        running.spawn(async move {
            let _permit = permit;
            let result = pipeline.process_submission(id).await;
            record(&stats, |s| {
                s.current_running = s.current_running.saturating_sub(1);
                s.processed += 1;
                match &result {
                    Ok(ProcessOutcome::Approved | ProcessOutcome::AwaitingLedger) => s.approved += 1,
                    Ok(ProcessOutcome::Deferred(_)) => s.deferred += 1,
                    Ok(_) => s.rejected += 1,
                    Err(_) => s.failed += 1,
                }
            });
            match result {
                Ok(outcome) => debug!(submission_id = %id, ?outcome, "verification finished"),
                Err(e) => error!(submission_id = %id, error = %e, "verification failed"),
            }
        });
    }

    inbox.rx.close();
    while running.join_next().await.is_some() {}
    info!("verification worker stopped");
}
