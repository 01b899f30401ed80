//! Submission intake and verification.
//!
//! `submit` only records the submission and hands its id to the verification queue.
//! `process_submission` is the single place a verdict is applied; the queue worker and
//! the verification sweep both call it, and every write it makes is status-fenced so
//! running it twice for the same submission is harmless.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use gigledger_core::{JobId, SubmissionId, TransactionHash, WalletAddress};
use gigledger_infra::config::PipelineConfig;
use gigledger_infra::{Datastore, LedgerClient, VerificationOracle};
use gigledger_marketplace::{
    Job, JobStatus, Submission, SubmissionStatus, Verdict, VerdictOutcome, VerificationRequest,
    WorkResult, feedback,
};

use crate::error::{EngineError, EngineResult};
use crate::trust::TrustScoreLedger;
use crate::verification_queue::VerificationQueue;

/// What one `process_submission` run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ProcessOutcome {
    /// Not pending review any more, or another writer resolved it first.
    Skipped,
    /// The job left `Open` before the verdict could be applied.
    JobClosed,
    Cheated,
    Rejected,
    /// Ledger write confirmed; job awaits the claim.
    Approved,
    /// Provisionally approved; the ledger write failed and the approval sweep owns it.
    AwaitingLedger,
    /// Oracle unavailable; left pending for the verification sweep.
    Deferred(String),
}

pub struct SubmissionPipeline {
    store: Arc<dyn Datastore>,
    ledger: Arc<dyn LedgerClient>,
    oracle: Arc<dyn VerificationOracle>,
    trust: Arc<TrustScoreLedger>,
    queue: VerificationQueue,
    config: PipelineConfig,
}

impl SubmissionPipeline {
    pub fn new(
        store: Arc<dyn Datastore>,
        ledger: Arc<dyn LedgerClient>,
        oracle: Arc<dyn VerificationOracle>,
        trust: Arc<TrustScoreLedger>,
        queue: VerificationQueue,
        config: PipelineConfig,
    ) -> Self {
        Self { store, ledger, oracle, trust, queue, config }
    }

    /// Record a worker's result against an open job and queue it for verification.
    #[instrument(skip_all, fields(job_id = %job_id, submitter = %submitter))]
    pub async fn submit(
        &self,
        job_id: JobId,
        submitter: WalletAddress,
        result: WorkResult,
    ) -> EngineResult<Submission> {
        let now = Utc::now();
        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("job {job_id}")))?;

        if job.status != JobStatus::Open {
            return Err(EngineError::conflict(format!("job {job_id} is {}, not open", job.status)));
        }
        if job.is_past_deadline(now) {
            return Err(EngineError::conflict(format!("job {job_id} deadline has passed")));
        }
        if self.store.find_submission(job_id, &submitter).await?.is_some() {
            return Err(EngineError::conflict(format!("{submitter} already submitted to job {job_id}")));
        }

        let user = self.trust.find_or_create(&submitter).await?;
        if !user.trust_score.meets(job.min_trust_score) {
            return Err(EngineError::InsufficientTrustScore {
                required: job.min_trust_score.value(),
                actual: user.trust_score.value(),
            });
        }

        let submission = Submission::new(job_id, submitter, result, user.trust_score, now)?;
        self.store.insert_submission(&submission).await?;
        info!(submission_id = %submission.id, "submission recorded");

        if let Err(e) = self.queue.enqueue(submission.id) {
            warn!(submission_id = %submission.id, error = %e, "verification not queued; left for the sweep");
        }
        Ok(submission)
    }

    /// Ask the oracle about a pending submission and apply the verdict.
    #[instrument(skip(self), fields(submission_id = %id))]
    pub async fn process_submission(&self, id: SubmissionId) -> EngineResult<ProcessOutcome> {
        let submission = self
            .store
            .get_submission(id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("submission {id}")))?;
        if submission.status != SubmissionStatus::PendingReview {
            return Ok(ProcessOutcome::Skipped);
        }

        let job_id = submission.job_id;
        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("job {job_id}")))?;
        if job.status != JobStatus::Open {
            return self.close_out(submission).await;
        }

        let request = VerificationRequest {
            job_description: job.description.clone(),
            job_files: job.files.clone(),
            submission_text: submission.result.text.clone(),
            submission_files: submission.result.files.clone(),
        };
        let verdict = match tokio::time::timeout(self.config.verification_timeout, self.oracle.verify(&request)).await {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(e)) => {
                warn!(error = %e, "oracle unavailable; submission stays pending");
                return Ok(ProcessOutcome::Deferred(e.to_string()));
            }
            Err(_) => {
                warn!(timeout = ?self.config.verification_timeout, "oracle timed out");
                Verdict::timed_out()
            }
        };

        match verdict.outcome() {
            VerdictOutcome::Cheated => {
                let fenced = self
                    .resolve(submission.clone(), SubmissionStatus::Cheated, verdict.feedback)
                    .await?;
                if !fenced {
                    return Ok(ProcessOutcome::Skipped);
                }
                self.trust.penalize_cheating(&submission.submitter).await?;
                info!("submission flagged as cheating");
                Ok(ProcessOutcome::Cheated)
            }
            VerdictOutcome::NotApproved => {
                let fenced = self
                    .resolve(submission, SubmissionStatus::NotApproved, verdict.feedback)
                    .await?;
                Ok(if fenced { ProcessOutcome::Rejected } else { ProcessOutcome::Skipped })
            }
            VerdictOutcome::Approved => self.approve(submission, job, verdict.feedback).await,
        }
    }

    async fn approve(&self, submission: Submission, job: Job, feedback: String) -> EngineResult<ProcessOutcome> {
        let now = Utc::now();

        let mut provisional = submission.clone();
        provisional.resolve(SubmissionStatus::WaitOnChainApprove, Some(feedback), now)?;
        provisional.reset_retries();
        if !self
            .store
            .update_submission_if(&provisional, SubmissionStatus::PendingReview)
            .await?
        {
            return Ok(ProcessOutcome::Skipped);
        }

        let mut assigned = job.clone();
        assigned.assign(submission.submitter, submission.result.clone(), now)?;
        let claimed = match self.store.update_job_if(&assigned, JobStatus::Open).await {
            Ok(claimed) => claimed,
            Err(e) => {
                if let Err(undo) = self.release_provisional(&provisional).await {
                    error!(error = %undo, "provisional approval left for the approval sweep");
                }
                return Err(e.into());
            }
        };
        if !claimed {
            // Another submission won the job, or it was cancelled or went overdue.
            self.release_provisional(&provisional).await?;
            return Ok(ProcessOutcome::JobClosed);
        }

        if let Err(e) = self.trust.reward_approval(&submission.submitter).await {
            error!(error = %e, "approval bonus not applied");
        }

        match self.ledger.mark_done(&assigned.contract_job_id, &submission.submitter).await {
            Ok(tx) => {
                self.finalize_settlement(&assigned, &provisional, Some(tx)).await?;
                info!(job_id = %assigned.id, "submission approved and settled");
                Ok(ProcessOutcome::Approved)
            }
            Err(e) => {
                warn!(job_id = %assigned.id, error = %e, "ledger write failed; approval sweep will retry");
                Ok(ProcessOutcome::AwaitingLedger)
            }
        }
    }

    /// Move a provisionally approved pair to `WaitForClaim` / `Approved` once the
    /// ledger has recorded completion. Returns whether both writes landed.
    pub(crate) async fn finalize_settlement(
        &self,
        job: &Job,
        submission: &Submission,
        tx: Option<TransactionHash>,
    ) -> EngineResult<bool> {
        let now = Utc::now();
        let mut settled = job.clone();
        settled.settle(tx, now)?;
        let job_written = self
            .store
            .update_job_if(&settled, JobStatus::WaitOnChainApprove)
            .await?;
        if !job_written {
            warn!(job_id = %job.id, "job changed while settling");
        }

        let mut approved = submission.clone();
        approved.resolve(SubmissionStatus::Approved, None, now)?;
        let submission_written = self
            .store
            .update_submission_if(&approved, SubmissionStatus::WaitOnChainApprove)
            .await?;
        Ok(job_written && submission_written)
    }

    /// Close a provisional approval whose job was never assigned to it.
    pub(crate) async fn release_provisional(&self, provisional: &Submission) -> EngineResult<bool> {
        let mut closed = provisional.clone();
        closed.resolve(
            SubmissionStatus::NotApproved,
            Some(feedback::JOB_NO_LONGER_OPEN.to_string()),
            Utc::now(),
        )?;
        Ok(self
            .store
            .update_submission_if(&closed, SubmissionStatus::WaitOnChainApprove)
            .await?)
    }

    async fn close_out(&self, submission: Submission) -> EngineResult<ProcessOutcome> {
        let fenced = self
            .resolve(submission, SubmissionStatus::NotApproved, feedback::JOB_NO_LONGER_OPEN.to_string())
            .await?;
        Ok(if fenced { ProcessOutcome::JobClosed } else { ProcessOutcome::Skipped })
    }

    /// Fenced resolution out of `PendingReview`.
    async fn resolve(&self, mut submission: Submission, next: SubmissionStatus, feedback: String) -> EngineResult<bool> {
        submission.resolve(next, Some(feedback), Utc::now())?;
        Ok(self
            .store
            .update_submission_if(&submission, SubmissionStatus::PendingReview)
            .await?)
    }
}
