//! Ledger reconciliation sweeps.
//!
//! Each sweep selects stale records, fences every write on the status it read, and
//! spends a bounded retry budget before giving up. A failure on one record is logged
//! and counted; it never aborts the rest of the sweep.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use gigledger_core::{JobId, WalletAddress};
use gigledger_infra::config::ReconcilerConfig;
use gigledger_infra::{Datastore, JobFilter, LedgerClient, SubmissionFilter};
use gigledger_marketplace::{Job, JobStatus, LedgerJobStatus, Submission, SubmissionStatus, feedback};

use crate::error::{EngineError, EngineResult};
use crate::pipeline::{ProcessOutcome, SubmissionPipeline};

/// Tally of one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: u32,
    /// Reached the intended status.
    pub resolved: u32,
    /// Still pending, budget left.
    pub retried: u32,
    /// Budget ran out.
    pub exhausted: u32,
    /// Another writer got there first, or nothing to do.
    pub skipped: u32,
    pub errors: u32,
}

/// Why a job's ledger registration does not match the off-chain record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CreationMismatch {
    #[error("job is not registered on the ledger")]
    NotRegistered,
    #[error("ledger requester {actual} does not match {expected}")]
    RequesterMismatch { expected: WalletAddress, actual: WalletAddress },
    #[error("ledger reward {actual} does not match {expected}")]
    RewardMismatch { expected: String, actual: String },
    #[error("ledger unavailable: {0}")]
    Ledger(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationCheck {
    Opened,
    Retrying,
    Failed,
    Skipped,
}

pub(crate) fn interval(d: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::zero())
}

pub struct ChainReconciler {
    store: Arc<dyn Datastore>,
    ledger: Arc<dyn LedgerClient>,
    pipeline: Arc<SubmissionPipeline>,
    config: ReconcilerConfig,
}

impl ChainReconciler {
    pub fn new(
        store: Arc<dyn Datastore>,
        ledger: Arc<dyn LedgerClient>,
        pipeline: Arc<SubmissionPipeline>,
        config: ReconcilerConfig,
    ) -> Self {
        Self { store, ledger, pipeline, config }
    }

    /// Compare the ledger's registration of `job` with the record. When `caller` is
    /// given it must also be the ledger requester. Rewards compare as exact integers.
    pub async fn verify_on_chain(&self, job: &Job, caller: Option<&WalletAddress>) -> Result<(), CreationMismatch> {
        let exists = self
            .ledger
            .job_exists(&job.contract_job_id)
            .await
            .map_err(|e| CreationMismatch::Ledger(e.to_string()))?;
        if !exists {
            return Err(CreationMismatch::NotRegistered);
        }
        let on_chain = self
            .ledger
            .get_job(&job.contract_job_id)
            .await
            .map_err(|e| CreationMismatch::Ledger(e.to_string()))?;

        for expected in std::iter::once(&job.requester).chain(caller) {
            if on_chain.requester != *expected {
                return Err(CreationMismatch::RequesterMismatch { expected: *expected, actual: on_chain.requester });
            }
        }
        if on_chain.reward != job.reward {
            return Err(CreationMismatch::RewardMismatch {
                expected: job.reward.to_string(),
                actual: on_chain.reward.to_string(),
            });
        }
        Ok(())
    }

    /// One-shot creation check for a single job, as scheduled by `prepare`.
    #[instrument(skip(self))]
    pub async fn recheck_creation(&self, job_id: JobId, now: DateTime<Utc>) -> EngineResult<CreationCheck> {
        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("job {job_id}")))?;
        if job.status != JobStatus::WaitingOnchainCheck {
            return Ok(CreationCheck::Skipped);
        }
        self.check_creation(job, now).await
    }

    async fn check_creation(&self, job: Job, now: DateTime<Utc>) -> EngineResult<CreationCheck> {
        let max = self.config.creation_max_retries;
        let mut next = job.clone();

        if job.retry_count >= max {
            next.transition_to(JobStatus::Failed, now)?;
            return self.write_creation(&next, CreationCheck::Failed).await;
        }

        match self.verify_on_chain(&job, None).await {
            Ok(()) => {
                next.transition_to(JobStatus::Open, now)?;
                info!(job_id = %job.id, "ledger registration confirmed");
                self.write_creation(&next, CreationCheck::Opened).await
            }
            Err(mismatch) => {
                next.record_failed_check(now);
                if next.retry_count >= max {
                    next.transition_to(JobStatus::Failed, now)?;
                    warn!(job_id = %job.id, reason = %mismatch, "creation check budget exhausted");
                    self.write_creation(&next, CreationCheck::Failed).await
                } else {
                    debug!(job_id = %job.id, attempt = next.retry_count, reason = %mismatch, "creation not confirmed yet");
                    self.write_creation(&next, CreationCheck::Retrying).await
                }
            }
        }
    }

    async fn write_creation(&self, job: &Job, outcome: CreationCheck) -> EngineResult<CreationCheck> {
        let written = self
            .store
            .update_job_if(job, JobStatus::WaitingOnchainCheck)
            .await?;
        Ok(if written { outcome } else { CreationCheck::Skipped })
    }

    /// Confirm or fail jobs still waiting for their ledger registration.
    #[instrument(skip(self))]
    pub async fn retry_creation_checks(&self, now: DateTime<Utc>) -> EngineResult<SweepReport> {
        let cutoff = now - interval(self.config.creation_retry_interval);
        let filter = JobFilter {
            created_before: Some(cutoff),
            check_due_before: Some(cutoff),
            ..JobFilter::with_status(JobStatus::WaitingOnchainCheck)
        };
        let mut report = SweepReport::default();
        for job in self.store.list_jobs(&filter).await? {
            report.examined += 1;
            let job_id = job.id;
            match self.check_creation(job, now).await {
                Ok(CreationCheck::Opened) => report.resolved += 1,
                Ok(CreationCheck::Retrying) => report.retried += 1,
                Ok(CreationCheck::Failed) => report.exhausted += 1,
                Ok(CreationCheck::Skipped) => report.skipped += 1,
                Err(e) => {
                    warn!(%job_id, error = %e, "creation check failed");
                    report.errors += 1;
                }
            }
        }
        Ok(report)
    }

    /// Re-run verification for submissions the queue never finished.
    #[instrument(skip(self))]
    pub async fn retry_stuck_verifications(&self, now: DateTime<Utc>) -> EngineResult<SweepReport> {
        let filter = SubmissionFilter {
            retry_due_before: Some(now - interval(self.config.verification_retry_interval)),
            ..SubmissionFilter::with_status(SubmissionStatus::PendingReview)
        };
        let mut report = SweepReport::default();
        for submission in self.store.list_submissions(&filter).await? {
            report.examined += 1;
            let id = submission.id;
            match self.retry_verification(submission, now).await {
                Ok(outcome) => tally(&mut report, outcome),
                Err(e) => {
                    warn!(submission_id = %id, error = %e, "verification retry failed");
                    report.errors += 1;
                }
            }
        }
        Ok(report)
    }

    async fn retry_verification(&self, submission: Submission, now: DateTime<Utc>) -> EngineResult<Attempt> {
        let mut next = submission.clone();
        if submission.retry_count >= self.config.verification_max_retries {
            next.resolve(
                SubmissionStatus::NotApproved,
                Some(feedback::VERIFICATION_EXHAUSTED.to_string()),
                now,
            )?;
            let written = self
                .store
                .update_submission_if(&next, SubmissionStatus::PendingReview)
                .await?;
            if written {
                info!(submission_id = %submission.id, "verification budget exhausted");
            }
            return Ok(if written { Attempt::Exhausted } else { Attempt::Skipped });
        }

        next.record_retry(now);
        if !self
            .store
            .update_submission_if(&next, SubmissionStatus::PendingReview)
            .await?
        {
            return Ok(Attempt::Skipped);
        }
        Ok(match self.pipeline.process_submission(submission.id).await? {
            ProcessOutcome::Deferred(_) => Attempt::Retried,
            ProcessOutcome::Skipped => Attempt::Skipped,
            _ => Attempt::Resolved,
        })
    }

    /// Re-send the ledger completion write for provisionally approved submissions.
    /// On exhaustion the submission fails and the job is reopened for other workers.
    #[instrument(skip(self))]
    pub async fn retry_stuck_approvals(&self, now: DateTime<Utc>) -> EngineResult<SweepReport> {
        let filter = SubmissionFilter {
            retry_due_before: Some(now - interval(self.config.approval_retry_interval)),
            ..SubmissionFilter::with_status(SubmissionStatus::WaitOnChainApprove)
        };
        let mut report = SweepReport::default();
        for submission in self.store.list_submissions(&filter).await? {
            report.examined += 1;
            let id = submission.id;
            match self.retry_approval(submission, now).await {
                Ok(outcome) => tally(&mut report, outcome),
                Err(e) => {
                    warn!(submission_id = %id, error = %e, "approval retry failed");
                    report.errors += 1;
                }
            }
        }

        // Jobs whose approval was abandoned but whose reopen never landed.
        for job in self
            .store
            .list_jobs(&JobFilter::with_status(JobStatus::WaitOnChainApprove))
            .await?
        {
            let job_id = job.id;
            match self.reopen_if_abandoned(job, now).await {
                Ok(false) => {}
                Ok(true) => {
                    report.examined += 1;
                    report.exhausted += 1;
                }
                Err(e) => {
                    warn!(%job_id, error = %e, "abandoned job not reopened");
                    report.errors += 1;
                }
            }
        }
        Ok(report)
    }

    async fn reopen_if_abandoned(&self, job: Job, now: DateTime<Utc>) -> EngineResult<bool> {
        let holder = match job.worker {
            Some(worker) => self.store.find_submission(job.id, &worker).await?,
            None => None,
        };
        let still_held = holder.is_some_and(|s| {
            matches!(s.status, SubmissionStatus::WaitOnChainApprove | SubmissionStatus::Approved)
        });
        if still_held {
            return Ok(false);
        }
        let mut reopened = job;
        reopened.reopen(now)?;
        let written = self
            .store
            .update_job_if(&reopened, JobStatus::WaitOnChainApprove)
            .await?;
        if written {
            info!(job_id = %reopened.id, "reopened job left behind by a failed approval");
        }
        Ok(written)
    }

    async fn retry_approval(&self, submission: Submission, now: DateTime<Utc>) -> EngineResult<Attempt> {
        let job_id = submission.job_id;
        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("job {job_id}")))?;
        if !job.is_worker(&submission.submitter) {
            // The job write of this approval never landed.
            warn!(submission_id = %submission.id, job_status = %job.status, "approval does not hold its job");
            let released = self.pipeline.release_provisional(&submission).await?;
            return Ok(if released { Attempt::Exhausted } else { Attempt::Skipped });
        }
        if matches!(job.status, JobStatus::WaitForClaim | JobStatus::Done) {
            // Settled; only the submission write was lost.
            let mut approved = submission.clone();
            approved.resolve(SubmissionStatus::Approved, None, now)?;
            let written = self
                .store
                .update_submission_if(&approved, SubmissionStatus::WaitOnChainApprove)
                .await?;
            return Ok(if written { Attempt::Resolved } else { Attempt::Skipped });
        }
        if job.status != JobStatus::WaitOnChainApprove {
            warn!(submission_id = %submission.id, job_status = %job.status, "approval does not match its job");
            return Ok(Attempt::Skipped);
        }

        let mut attempt = submission.clone();
        attempt.record_retry(now);
        if !self
            .store
            .update_submission_if(&attempt, SubmissionStatus::WaitOnChainApprove)
            .await?
        {
            return Ok(Attempt::Skipped);
        }

        // An earlier write may have landed without the record catching up.
        if let Ok(on_chain) = self.ledger.get_job(&job.contract_job_id).await {
            if on_chain.status == LedgerJobStatus::Done && on_chain.worker == Some(submission.submitter) {
                self.pipeline.finalize_settlement(&job, &attempt, None).await?;
                info!(%job_id, "ledger already settled; record caught up");
                return Ok(Attempt::Resolved);
            }
        }

        match self.ledger.mark_done(&job.contract_job_id, &submission.submitter).await {
            Ok(tx) => {
                self.pipeline.finalize_settlement(&job, &attempt, Some(tx)).await?;
                info!(%job_id, attempt = attempt.retry_count, "ledger write succeeded on retry");
                Ok(Attempt::Resolved)
            }
            Err(e) if attempt.retry_count >= self.config.approval_max_retries => {
                warn!(%job_id, error = %e, attempts = attempt.retry_count, "ledger write budget exhausted; reopening job");
                self.abandon_approval(job, attempt, now).await
            }
            Err(e) => {
                debug!(%job_id, error = %e, attempt = attempt.retry_count, "ledger write failed");
                Ok(Attempt::Retried)
            }
        }
    }

    async fn abandon_approval(&self, job: Job, submission: Submission, now: DateTime<Utc>) -> EngineResult<Attempt> {
        let mut failed = submission.clone();
        failed.resolve(
            SubmissionStatus::Failed,
            Some(feedback::ledger_write_exhausted(submission.retry_count)),
            now,
        )?;
        if !self
            .store
            .update_submission_if(&failed, SubmissionStatus::WaitOnChainApprove)
            .await?
        {
            return Ok(Attempt::Skipped);
        }
        let mut reopened = job;
        reopened.reopen(now)?;
        if !self
            .store
            .update_job_if(&reopened, JobStatus::WaitOnChainApprove)
            .await?
        {
            warn!(job_id = %reopened.id, "job changed before it could be reopened");
        }
        Ok(Attempt::Exhausted)
    }
}

enum Attempt {
    Resolved,
    Retried,
    Exhausted,
    Skipped,
}

fn tally(report: &mut SweepReport, attempt: Attempt) {
    match attempt {
        Attempt::Resolved => report.resolved += 1,
        Attempt::Retried => report.retried += 1,
        Attempt::Exhausted => report.exhausted += 1,
        Attempt::Skipped => report.skipped += 1,
    }
}
