//! Record store for jobs, submissions and participants.
//!
//! Every status change goes through a conditional write (`update_*_if`) that only
//! succeeds when the stored status still equals the caller's expected status. This is
//! the fence that keeps concurrent request handlers and sweeps from applying the same
//! transition twice.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryDatastore;
pub use postgres::PostgresDatastore;

use chrono::{DateTime, Utc};

use gigledger_core::{ContractJobId, JobId, SubmissionId, WalletAddress};
use gigledger_marketplace::{Job, JobStatus, Submission, SubmissionStatus, TrustScore, User};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists: {0}")]
    AlreadyExists(String),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Creation order; what the sweeps use.
    #[default]
    Oldest,
    Newest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: u64,
    pub limit: u64,
}

impl Page {
    /// 1-based page number.
    pub fn number(page: u64, limit: u64) -> Self {
        Self { offset: page.saturating_sub(1) * limit, limit }
    }
}

/// Job query. Empty `statuses` means any status.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub statuses: Vec<JobStatus>,
    pub requester: Option<WalletAddress>,
    pub worker: Option<WalletAddress>,
    pub deadline_before: Option<DateTime<Utc>>,
    pub deadline_after: Option<DateTime<Utc>>,
    /// Only jobs whose minimum trust score is at most this value.
    pub trust_at_most: Option<TrustScore>,
    pub created_before: Option<DateTime<Utc>>,
    /// `last_check_at` is null or not later than this.
    pub check_due_before: Option<DateTime<Utc>>,
    pub order: SortOrder,
    pub page: Option<Page>,
}

impl JobFilter {
    pub fn with_status(status: JobStatus) -> Self {
        Self { statuses: vec![status], ..Self::default() }
    }

    pub fn matches(&self, job: &Job) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&job.status))
            && self.requester.is_none_or(|r| job.requester == r)
            && self.worker.is_none_or(|w| job.worker == Some(w))
            && self.deadline_before.is_none_or(|t| job.deadline < t)
            && self.deadline_after.is_none_or(|t| job.deadline > t)
            && self.trust_at_most.is_none_or(|s| job.min_trust_score <= s)
            && self.created_before.is_none_or(|t| job.created_at <= t)
            && self.check_due_before.is_none_or(|t| job.last_check_at.is_none_or(|at| at <= t))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SubmissionFilter {
    pub job_id: Option<JobId>,
    pub submitter: Option<WalletAddress>,
    pub statuses: Vec<SubmissionStatus>,
    /// `Submission::last_attempt_at` no later than this: the last retry, or entry
    /// into the current status when it has not been retried since.
    pub retry_due_before: Option<DateTime<Utc>>,
    pub order: SortOrder,
    pub page: Option<Page>,
}

impl SubmissionFilter {
    pub fn with_status(status: SubmissionStatus) -> Self {
        Self { statuses: vec![status], ..Self::default() }
    }

    pub fn for_job(job_id: JobId) -> Self {
        Self { job_id: Some(job_id), ..Self::default() }
    }

    pub fn matches(&self, submission: &Submission) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&submission.status))
            && self.job_id.is_none_or(|id| submission.job_id == id)
            && self.submitter.is_none_or(|s| submission.submitter == s)
            && self.retry_due_before.is_none_or(|t| submission.last_attempt_at() <= t)
    }
}

/// Persistence boundary for the marketplace records.
#[async_trait::async_trait]
pub trait Datastore: Send + Sync {
    /// Fails with `AlreadyExists` when the id or contract job id is taken.
    async fn insert_job(&self, job: &Job) -> StoreResult<()>;

    async fn get_job(&self, id: JobId) -> StoreResult<Option<Job>>;

    async fn get_job_by_contract_id(&self, contract_job_id: &ContractJobId) -> StoreResult<Option<Job>>;

    async fn list_jobs(&self, filter: &JobFilter) -> StoreResult<Vec<Job>>;

    /// Ignores `filter.page`.
    async fn count_jobs(&self, filter: &JobFilter) -> StoreResult<u64>;

    /// Overwrite the job only if its stored status is still `expected`.
    /// Returns `false` when another writer got there first.
    async fn update_job_if(&self, job: &Job, expected: JobStatus) -> StoreResult<bool>;

    /// Fails with `AlreadyExists` for a second submission by the same submitter.
    async fn insert_submission(&self, submission: &Submission) -> StoreResult<()>;

    async fn get_submission(&self, id: SubmissionId) -> StoreResult<Option<Submission>>;

    async fn find_submission(
        &self,
        job_id: JobId,
        submitter: &WalletAddress,
    ) -> StoreResult<Option<Submission>>;

    async fn list_submissions(&self, filter: &SubmissionFilter) -> StoreResult<Vec<Submission>>;

    async fn count_submissions(&self, filter: &SubmissionFilter) -> StoreResult<u64>;

    async fn update_submission_if(
        &self,
        submission: &Submission,
        expected: SubmissionStatus,
    ) -> StoreResult<bool>;

    /// Move every `PendingReview` submission of a job to `NotApproved` with `feedback`.
    async fn reject_pending_submissions(
        &self,
        job_id: JobId,
        feedback: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<u64>;

    async fn get_user(&self, address: &WalletAddress) -> StoreResult<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// Fails with `AlreadyExists` when the address is taken.
    async fn insert_user(&self, user: &User) -> StoreResult<()>;

    async fn update_user(&self, user: &User) -> StoreResult<()>;

    /// Atomically apply `clamp(score + delta, 0, 100)`. `None` if the user is unknown.
    async fn adjust_trust_score(
        &self,
        address: &WalletAddress,
        delta: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_numbers_are_one_based() {
        assert_eq!(Page::number(1, 20), Page { offset: 0, limit: 20 });
        assert_eq!(Page::number(3, 10), Page { offset: 20, limit: 10 });
        assert_eq!(Page::number(0, 10), Page { offset: 0, limit: 10 });
    }
}
