//! Job marketplace lifecycle engine.
//!
//! Keeps the off-chain job and submission records consistent with the escrow ledger:
//! request-path operations in [`lifecycle`] and [`pipeline`], background repair in
//! [`reconciler`] driven by [`scheduler`], and verification handed off through
//! [`verification_queue`].

pub mod error;
pub mod id_allocator;
pub mod lifecycle;
pub mod pipeline;
pub mod profile;
pub mod queries;
pub mod reconciler;
pub mod scheduler;
pub mod trust;
pub mod verification_queue;

use std::sync::Arc;

use serde::Serialize;

use gigledger_infra::config::{
    LifecycleConfig, PipelineConfig, ReconcilerConfig, SchedulerConfig, TrustPolicy,
};
use gigledger_infra::{AppConfig, Datastore, LedgerClient, VerificationOracle};

pub use error::{EngineError, EngineResult, ErrorKind};
pub use id_allocator::{IdAllocator, IdSource, OsRandomIdSource};
pub use lifecycle::{ClaimStatus, JobLifecycleManager};
pub use pipeline::{ProcessOutcome, SubmissionPipeline};
pub use profile::UserProfiles;
pub use queries::{JobDetails, JobHistory, JobPage, JobQueries, SubmissionView};
pub use reconciler::{ChainReconciler, CreationCheck, CreationMismatch, SweepReport};
pub use scheduler::{RetryScheduler, SchedulerHandle, SweepStats};
pub use trust::TrustScoreLedger;
pub use verification_queue::{QueueError, QueueStats, VerificationWorker, VerificationWorkerHandle};

/// External collaborators.
#[derive(Clone)]
pub struct MarketplaceDeps {
    pub store: Arc<dyn Datastore>,
    pub ledger: Arc<dyn LedgerClient>,
    pub oracle: Arc<dyn VerificationOracle>,
    pub ids: Arc<dyn IdSource>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub trust: TrustPolicy,
    pub lifecycle: LifecycleConfig,
    pub pipeline: PipelineConfig,
    pub reconciler: ReconcilerConfig,
    pub scheduler: SchedulerConfig,
}

impl From<&AppConfig> for EngineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            trust: config.trust,
            lifecycle: config.lifecycle,
            pipeline: config.pipeline,
            reconciler: config.reconciler,
            scheduler: config.scheduler,
        }
    }
}

/// The wired-up engine. Request handlers use the services directly; [`Marketplace::start`]
/// launches the verification worker and the sweep scheduler.
pub struct Marketplace {
    pub lifecycle: Arc<JobLifecycleManager>,
    pub pipeline: Arc<SubmissionPipeline>,
    pub reconciler: Arc<ChainReconciler>,
    pub trust: Arc<TrustScoreLedger>,
    pub profiles: Arc<UserProfiles>,
    pub queries: Arc<JobQueries>,
    config: EngineConfig,
    inbox: Option<verification_queue::VerificationInbox>,
}

impl Marketplace {
    pub fn build(deps: MarketplaceDeps, config: EngineConfig) -> Self {
        let MarketplaceDeps { store, ledger, oracle, ids } = deps;

        let trust = Arc::new(TrustScoreLedger::new(store.clone(), config.trust));
        let (queue, inbox) = verification_queue::channel(config.pipeline.queue_capacity);
        let pipeline = Arc::new(SubmissionPipeline::new(
            store.clone(),
            ledger.clone(),
            oracle,
            trust.clone(),
            queue,
            config.pipeline,
        ));
        let reconciler = Arc::new(ChainReconciler::new(
            store.clone(),
            ledger.clone(),
            pipeline.clone(),
            config.reconciler,
        ));
        let allocator = IdAllocator::new(store.clone(), ids, config.lifecycle.id_allocation_attempts);
        let lifecycle = Arc::new(JobLifecycleManager::new(
            store.clone(),
            ledger,
            allocator,
            reconciler.clone(),
            config.lifecycle,
        ));

        Self {
            lifecycle,
            pipeline,
            reconciler,
            profiles: Arc::new(UserProfiles::new(store.clone(), trust.clone())),
            queries: Arc::new(JobQueries::new(store)),
            trust,
            config,
            inbox: Some(inbox),
        }
    }

    /// Start background processing. Only the first call starts anything.
    pub fn start(&mut self) -> EngineResult<MarketplaceRuntime> {
        let inbox = self
            .inbox
            .take()
            .ok_or_else(|| EngineError::conflict("marketplace background tasks already started"))?;
        let worker = VerificationWorker::spawn(
            inbox,
            self.pipeline.clone(),
            self.config.pipeline.max_concurrent_verifications,
        );
        let scheduler =
            RetryScheduler::new(self.lifecycle.clone(), self.reconciler.clone(), self.config.scheduler).spawn();
        Ok(MarketplaceRuntime { worker, scheduler })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RuntimeStatus {
    pub verification: QueueStats,
    pub sweeps: std::collections::BTreeMap<&'static str, SweepStats>,
}

/// Running background tasks.
#[derive(Debug)]
pub struct MarketplaceRuntime {
    worker: VerificationWorkerHandle,
    scheduler: SchedulerHandle,
}

impl MarketplaceRuntime {
    pub fn status(&self) -> RuntimeStatus {
        RuntimeStatus { verification: self.worker.stats(), sweeps: self.scheduler.stats() }
    }

    pub async fn shutdown(self) {
        self.scheduler.shutdown().await;
        self.worker.shutdown().await;
    }
}
