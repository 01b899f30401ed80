use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gigledger_core::{DomainError, DomainResult, JobId, SubmissionId, WalletAddress};

use crate::job::WorkResult;
use crate::user::TrustScore;

/// Feedback strings attached to submissions by the engine.
pub mod feedback {
    pub const JOB_CANCELLED: &str = "Job was cancelled";
    pub const DEADLINE_PASSED: &str = "Job deadline passed";
    pub const JOB_NO_LONGER_OPEN: &str = "Job is no longer open";
    pub const VERIFICATION_EXHAUSTED: &str =
        "Verification failed after maximum retries. Please submit again.";

    pub fn ledger_write_exhausted(attempts: u32) -> String {
        format!("Blockchain write failed after {attempts} attempts. Job has been reopened.")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    PendingReview,
    Cheated,
    NotApproved,
    Approved,
    #[serde(rename = "wait_onchain_approve")]
    WaitOnChainApprove,
    Failed,
}

impl SubmissionStatus {
    pub const ALL: [SubmissionStatus; 6] = [
        SubmissionStatus::PendingReview,
        SubmissionStatus::Cheated,
        SubmissionStatus::NotApproved,
        SubmissionStatus::Approved,
        SubmissionStatus::WaitOnChainApprove,
        SubmissionStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::PendingReview => "pending_review",
            SubmissionStatus::Cheated => "cheated",
            SubmissionStatus::NotApproved => "not_approved",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::WaitOnChainApprove => "wait_onchain_approve",
            SubmissionStatus::Failed => "failed",
        }
    }

    pub fn can_transition_to(self, next: SubmissionStatus) -> bool {
        use SubmissionStatus::*;
        matches!(
            (self, next),
            (PendingReview, Cheated)
                | (PendingReview, NotApproved)
                | (PendingReview, WaitOnChainApprove)
                | (WaitOnChainApprove, Approved)
                | (WaitOnChainApprove, Failed)
                | (WaitOnChainApprove, NotApproved)
        )
    }
}

impl core::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for SubmissionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SubmissionStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown submission status '{s}'")))
    }
}

/// A worker's attempt at a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub job_id: JobId,
    pub submitter: WalletAddress,
    pub result: WorkResult,
    pub status: SubmissionStatus,
    pub feedback: Option<String>,
    /// Submitter's trust score when the submission was made. Never updated.
    pub submitter_trust_score: TrustScore,
    /// Retry attempts consumed by whichever sweep owns the current status.
    pub retry_count: u32,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Submission {
    pub fn new(
        job_id: JobId,
        submitter: WalletAddress,
        result: WorkResult,
        submitter_trust_score: TrustScore,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if result.text.trim().is_empty() && result.files.is_empty() {
            return Err(DomainError::validation("submission needs a result text or files"));
        }
        Ok(Self {
            id: SubmissionId::new(),
            job_id,
            submitter,
            result,
            status: SubmissionStatus::PendingReview,
            feedback: None,
            submitter_trust_score,
            retry_count: 0,
            last_retry_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Move along a legal edge with optional feedback.
    pub fn resolve(
        &mut self,
        next: SubmissionStatus,
        feedback: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::conflict(format!(
                "submission {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        if feedback.is_some() {
            self.feedback = feedback;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Entering a new retry-owned status restarts the budget.
    pub fn reset_retries(&mut self) {
        self.retry_count = 0;
        self.last_retry_at = None;
    }

    pub fn record_retry(&mut self, now: DateTime<Utc>) {
        self.retry_count += 1;
        self.last_retry_at = Some(now);
        self.updated_at = now;
    }

    /// When a sweep last touched this submission: the last retry, or entry into the
    /// current status when no retry has happened since.
    pub fn last_attempt_at(&self) -> DateTime<Utc> {
        self.last_retry_at.unwrap_or(self.updated_at)
    }
}
