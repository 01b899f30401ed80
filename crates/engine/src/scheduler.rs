//! Periodic sweep driver.
//!
//! One task per sweep kind, each on its own interval. A sweep run that is still going
//! when its next tick is due simply delays that tick, so runs of the same kind never
//! overlap.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use gigledger_infra::config::SchedulerConfig;

use crate::error::EngineResult;
use crate::lifecycle::JobLifecycleManager;
use crate::reconciler::{ChainReconciler, SweepReport};

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepStats {
    pub runs: u64,
    pub failures: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_report: Option<SweepReport>,
}

type SharedStats = Arc<Mutex<BTreeMap<&'static str, SweepStats>>>;

#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    stats: SharedStats,
}

impl SchedulerHandle {
    /// Stop all sweep loops after their current run.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
    }

    /// Per-sweep counters keyed by sweep name.
    pub fn stats(&self) -> BTreeMap<&'static str, SweepStats> {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

pub struct RetryScheduler {
    lifecycle: Arc<JobLifecycleManager>,
    reconciler: Arc<ChainReconciler>,
    config: SchedulerConfig,
}

impl RetryScheduler {
    pub fn new(lifecycle: Arc<JobLifecycleManager>, reconciler: Arc<ChainReconciler>, config: SchedulerConfig) -> Self {
        Self { lifecycle, reconciler, config }
    }

    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = SharedStats::default();

        let lifecycle = self.lifecycle;
        let reconciler = self.reconciler;
        let tasks = vec![
            {
                let lifecycle = lifecycle.clone();
                spawn_sweep("overdue", self.config.overdue_interval, shutdown_rx.clone(), stats.clone(), move || {
                    let lifecycle = lifecycle.clone();
                    async move { lifecycle.check_overdue(Utc::now()).await }
                })
            },
            {
                let reconciler = reconciler.clone();
                spawn_sweep("creation", self.config.creation_interval, shutdown_rx.clone(), stats.clone(), move || {
                    let reconciler = reconciler.clone();
                    async move { reconciler.retry_creation_checks(Utc::now()).await }
                })
            },
            {
                let reconciler = reconciler.clone();
                spawn_sweep(
                    "verification",
                    self.config.verification_interval,
                    shutdown_rx.clone(),
                    stats.clone(),
                    move || {
                        let reconciler = reconciler.clone();
                        async move { reconciler.retry_stuck_verifications(Utc::now()).await }
                    },
                )
            },
            spawn_sweep("approval", self.config.approval_interval, shutdown_rx, stats.clone(), move || {
                let reconciler = reconciler.clone();
                async move { reconciler.retry_stuck_approvals(Utc::now()).await }
            }),
        ];

        info!(
            overdue = ?self.config.overdue_interval,
            creation = ?self.config.creation_interval,
            verification = ?self.config.verification_interval,
            approval = ?self.config.approval_interval,
            "retry scheduler started"
        );
        SchedulerHandle { shutdown: shutdown_tx, tasks, stats }
    }
}

fn spawn_sweep<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    stats: SharedStats,
    run: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = EngineResult<SweepReport>> + Send + 'static,
{
    tokio::spawn(async move {
        let period = period.max(Duration::from_millis(10));
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    debug!(sweep = name, "sweep loop stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let result = run().await;
                    match &result {
                        Ok(report) if report.examined > 0 => info!(sweep = name, ?report, "sweep finished"),
                        Ok(_) => debug!(sweep = name, "sweep found nothing to do"),
                        Err(e) => error!(sweep = name, error = %e, "sweep failed"),
                    }
                    if let Ok(mut all) = stats.lock() {
                        let entry = all.entry(name).or_default();
                        entry.runs += 1;
                        entry.last_run_at = Some(Utc::now());
                        match result {
                            Ok(report) => entry.last_report = Some(report),
                            Err(_) => entry.failures += 1,
                        }
                    }
                }
            }
        }
    })
}
