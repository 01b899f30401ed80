//! Job lifecycle operations driven by the requester and the worker.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use gigledger_core::{ContractJobId, JobId, WalletAddress};
use gigledger_infra::config::LifecycleConfig;
use gigledger_infra::{Datastore, JobFilter, LedgerClient};
use gigledger_marketplace::{ClaimBlock, Job, JobStatus, NewJob, assess_claim, feedback};

use crate::error::{EngineError, EngineResult};
use crate::id_allocator::IdAllocator;
use crate::reconciler::{ChainReconciler, SweepReport};

/// Answer to "can this caller claim the escrow now?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimStatus {
    pub job_id: JobId,
    pub claimable: bool,
    pub reason: Option<ClaimBlock>,
}

pub struct JobLifecycleManager {
    store: Arc<dyn Datastore>,
    ledger: Arc<dyn LedgerClient>,
    ids: IdAllocator,
    reconciler: Arc<ChainReconciler>,
    config: LifecycleConfig,
}

impl JobLifecycleManager {
    pub fn new(
        store: Arc<dyn Datastore>,
        ledger: Arc<dyn LedgerClient>,
        ids: IdAllocator,
        reconciler: Arc<ChainReconciler>,
        config: LifecycleConfig,
    ) -> Self {
        Self { store, ledger, ids, reconciler, config }
    }

    async fn load(&self, job_id: JobId) -> EngineResult<Job> {
        self.store
            .get_job(job_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("job {job_id}")))
    }

    /// Persist a job awaiting its ledger registration. The caller funds the escrow
    /// out of band using the returned contract job id.
    #[instrument(skip(self, input), fields(requester = %input.requester))]
    pub async fn prepare(&self, input: NewJob) -> EngineResult<Job> {
        let now = Utc::now();
        input.validate(now)?;
        let contract_job_id = self.ids.allocate().await?;
        let job = Job::prepare(input, contract_job_id, now)?;
        self.store.insert_job(&job).await?;
        info!(job_id = %job.id, %contract_job_id, "job prepared");
        self.schedule_creation_recheck(job.id);
        Ok(job)
    }

    fn schedule_creation_recheck(&self, job_id: JobId) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(%job_id, "no runtime for creation re-check; relying on the sweep");
            return;
        };
        let reconciler = self.reconciler.clone();
        let delay = self.config.creation_recheck_delay;
        runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            match reconciler.recheck_creation(job_id, Utc::now()).await {
                Ok(outcome) => debug!(%job_id, ?outcome, "creation re-check finished"),
                Err(e) => warn!(%job_id, error = %e, "creation re-check failed"),
            }
        });
    }

    /// Requester reports the ledger transaction as sent. Opens the job when the
    /// ledger agrees, fails it otherwise.
    #[instrument(skip_all, fields(contract_job_id = %contract_job_id, caller = %caller))]
    pub async fn confirm_create(&self, contract_job_id: &ContractJobId, caller: &WalletAddress) -> EngineResult<Job> {
        let job = self
            .store
            .get_job_by_contract_id(contract_job_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("contract job {contract_job_id}")))?;
        job.ensure_requester(caller)?;
        if job.status != JobStatus::WaitingOnchainCheck {
            return Err(EngineError::conflict(format!("job {} is {}, not awaiting confirmation", job.id, job.status)));
        }

        if !self.config.confirm_grace.is_zero() {
            tokio::time::sleep(self.config.confirm_grace).await;
        }

        let now = Utc::now();
        let check = self.reconciler.verify_on_chain(&job, Some(caller)).await;
        let mut next = job.clone();
        let target = if check.is_ok() { JobStatus::Open } else { JobStatus::Failed };
        next.transition_to(target, now)?;

        if !self.store.update_job_if(&next, JobStatus::WaitingOnchainCheck).await? {
            // A sweep resolved it meanwhile; report what it decided.
            let current = self.load(job.id).await?;
            return match current.status {
                JobStatus::Open => Ok(current),
                status => Err(EngineError::conflict(format!("job {} is {status}", job.id))),
            };
        }

        match check {
            Ok(()) => {
                info!(job_id = %job.id, "job open");
                Ok(next)
            }
            Err(mismatch) => {
                warn!(job_id = %job.id, reason = %mismatch, "ledger registration rejected");
                Err(EngineError::ExternalService(mismatch.to_string()))
            }
        }
    }

    /// Cancel an open or overdue job and reject its pending submissions.
    #[instrument(skip(self))]
    pub async fn cancel(&self, job_id: JobId, caller: &WalletAddress) -> EngineResult<Job> {
        let job = self.load(job_id).await?;
        job.ensure_requester(caller)?;
        if !job.status.is_cancellable() {
            return Err(EngineError::conflict(format!("job {job_id} is {} and cannot be cancelled", job.status)));
        }

        let now = Utc::now();
        let mut cancelled = job.clone();
        cancelled.transition_to(JobStatus::Cancelled, now)?;
        if !self.store.update_job_if(&cancelled, job.status).await? {
            return Err(EngineError::conflict(format!("job {job_id} changed while cancelling")));
        }
        let rejected = self
            .store
            .reject_pending_submissions(job_id, feedback::JOB_CANCELLED, now)
            .await?;
        info!(rejected, "job cancelled");
        Ok(cancelled)
    }

    /// Move open jobs past their deadline to `Overdue`.
    #[instrument(skip(self))]
    pub async fn check_overdue(&self, now: DateTime<Utc>) -> EngineResult<SweepReport> {
        let filter = JobFilter { deadline_before: Some(now), ..JobFilter::with_status(JobStatus::Open) };
        let mut report = SweepReport::default();
        for job in self.store.list_jobs(&filter).await? {
            report.examined += 1;
            match self.expire(&job, now).await {
                Ok(true) => report.resolved += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    warn!(job_id = %job.id, error = %e, "overdue transition failed");
                    report.errors += 1;
                }
            }
        }
        if report.resolved > 0 {
            info!(overdue = report.resolved, "jobs marked overdue");
        }
        Ok(report)
    }

    async fn expire(&self, job: &Job, now: DateTime<Utc>) -> EngineResult<bool> {
        let mut overdue = job.clone();
        overdue.transition_to(JobStatus::Overdue, now)?;
        if !self.store.update_job_if(&overdue, JobStatus::Open).await? {
            return Ok(false);
        }
        self.store
            .reject_pending_submissions(job.id, feedback::DEADLINE_PASSED, now)
            .await?;
        Ok(true)
    }

    /// Worker reports the escrow claimed.
    #[instrument(skip(self))]
    pub async fn confirm_claim(&self, job_id: JobId, caller: &WalletAddress) -> EngineResult<Job> {
        let job = self.load(job_id).await?;
        job.ensure_worker(caller)?;
        match job.status {
            JobStatus::Done => Ok(job),
            JobStatus::WaitForClaim => {
                let mut done = job.clone();
                done.transition_to(JobStatus::Done, Utc::now())?;
                if self.store.update_job_if(&done, JobStatus::WaitForClaim).await? {
                    info!("reward claimed");
                    return Ok(done);
                }
                let current = self.load(job_id).await?;
                if current.status == JobStatus::Done {
                    Ok(current)
                } else {
                    Err(EngineError::conflict(format!("job {job_id} is {}", current.status)))
                }
            }
            status => Err(EngineError::conflict(format!("job {job_id} is {status}, nothing to claim"))),
        }
    }

    /// Ask the ledger whether the caller can claim, syncing the record along a legal
    /// edge when the ledger is ahead of it.
    #[instrument(skip(self))]
    pub async fn check_claimable(&self, job_id: JobId, caller: &WalletAddress) -> EngineResult<ClaimStatus> {
        let job = self.load(job_id).await?;
        let on_chain = self.ledger.get_job(&job.contract_job_id).await?;
        let decision = assess_claim(&job, &on_chain, caller)?;

        if let Some(target) = decision.sync_to {
            if job.status.can_transition_to(target) {
                let mut synced = job.clone();
                synced.transition_to(target, Utc::now())?;
                if self.store.update_job_if(&synced, job.status).await? {
                    info!(from = %job.status, to = %target, "record synced to ledger");
                }
            } else {
                debug!(from = %job.status, to = %target, "ledger ahead but no direct edge; left as is");
            }
        }

        Ok(ClaimStatus { job_id, claimable: decision.claimable, reason: decision.reason })
    }
}
