use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use gigledger_core::{ContractJobId, JobId, SubmissionId, WalletAddress};
use gigledger_marketplace::user::is_default_username;
use gigledger_marketplace::{Job, JobStatus, Submission, SubmissionStatus, User};

use super::{
    Datastore, JobFilter, Page, SortOrder, StoreError, StoreResult, SubmissionFilter,
};

#[derive(Debug, Default)]
struct Tables {
    jobs: HashMap<JobId, Job>,
    submissions: HashMap<SubmissionId, Submission>,
    users: HashMap<WalletAddress, User>,
}

/// In-memory datastore for tests/dev.
///
/// A single lock guards all tables, so each conditional update is atomic.
#[derive(Debug, Default)]
pub struct InMemoryDatastore {
    tables: RwLock<Tables>,
}

impl InMemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Storage("in-memory datastore lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::Storage("in-memory datastore lock poisoned".into()))
    }
}

fn sort_and_page<T, K: Ord>(
    mut rows: Vec<T>,
    key: impl Fn(&T) -> K,
    order: SortOrder,
    page: Option<Page>,
) -> Vec<T> {
    rows.sort_by_key(|row| key(row));
    if order == SortOrder::Newest {
        rows.reverse();
    }
    match page {
        Some(page) => rows
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect(),
        None => rows,
    }
}

#[async_trait::async_trait]
impl Datastore for InMemoryDatastore {
    async fn insert_job(&self, job: &Job) -> StoreResult<()> {
        let mut tables = self.write()?;
        if tables.jobs.contains_key(&job.id) {
            return Err(StoreError::AlreadyExists(format!("job {}", job.id)));
        }
        if tables.jobs.values().any(|j| j.contract_job_id == job.contract_job_id) {
            return Err(StoreError::AlreadyExists(format!(
                "contract job id {}",
                job.contract_job_id
            )));
        }
        tables.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get_job(&self, id: JobId) -> StoreResult<Option<Job>> {
        Ok(self.read()?.jobs.get(&id).cloned())
    }

    async fn get_job_by_contract_id(&self, contract_job_id: &ContractJobId) -> StoreResult<Option<Job>> {
        Ok(self
            .read()?
            .jobs
            .values()
            .find(|j| &j.contract_job_id == contract_job_id)
            .cloned())
    }

    async fn list_jobs(&self, filter: &JobFilter) -> StoreResult<Vec<Job>> {
        let rows: Vec<Job> = self
            .read()?
            .jobs
            .values()
            .filter(|j| filter.matches(j))
            .cloned()
            .collect();
        Ok(sort_and_page(rows, |j| (j.created_at, j.id), filter.order, filter.page))
    }

    async fn count_jobs(&self, filter: &JobFilter) -> StoreResult<u64> {
        Ok(self.read()?.jobs.values().filter(|j| filter.matches(j)).count() as u64)
    }

    async fn update_job_if(&self, job: &Job, expected: JobStatus) -> StoreResult<bool> {
        let mut tables = self.write()?;
        match tables.jobs.get_mut(&job.id) {
            Some(stored) if stored.status == expected => {
                *stored = job.clone();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound(format!("job {}", job.id))),
        }
    }

    async fn insert_submission(&self, submission: &Submission) -> StoreResult<()> {
        let mut tables = self.write()?;
        let duplicate = tables.submissions.values().any(|s| {
            s.id == submission.id
                || (s.job_id == submission.job_id && s.submitter == submission.submitter)
        });
        if duplicate {
            return Err(StoreError::AlreadyExists(format!(
                "submission by {} for job {}",
                submission.submitter, submission.job_id
            )));
        }
        tables.submissions.insert(submission.id, submission.clone());
        Ok(())
    }

    async fn get_submission(&self, id: SubmissionId) -> StoreResult<Option<Submission>> {
        Ok(self.read()?.submissions.get(&id).cloned())
    }

    async fn find_submission(
        &self,
        job_id: JobId,
        submitter: &WalletAddress,
    ) -> StoreResult<Option<Submission>> {
        Ok(self
            .read()?
            .submissions
            .values()
            .find(|s| s.job_id == job_id && &s.submitter == submitter)
            .cloned())
    }

    async fn list_submissions(&self, filter: &SubmissionFilter) -> StoreResult<Vec<Submission>> {
        let rows: Vec<Submission> = self
            .read()?
            .submissions
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        Ok(sort_and_page(rows, |s| (s.created_at, s.id), filter.order, filter.page))
    }

    async fn count_submissions(&self, filter: &SubmissionFilter) -> StoreResult<u64> {
        Ok(self
            .read()?
            .submissions
            .values()
            .filter(|s| filter.matches(s))
            .count() as u64)
    }

    async fn update_submission_if(
        &self,
        submission: &Submission,
        expected: SubmissionStatus,
    ) -> StoreResult<bool> {
        let mut tables = self.write()?;
        match tables.submissions.get_mut(&submission.id) {
            Some(stored) if stored.status == expected => {
                *stored = submission.clone();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound(format!("submission {}", submission.id))),
        }
    }

    async fn reject_pending_submissions(
        &self,
        job_id: JobId,
        feedback: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut tables = self.write()?;
        let mut rejected = 0;
        for submission in tables.submissions.values_mut() {
            if submission.job_id == job_id && submission.status == SubmissionStatus::PendingReview {
                submission.status = SubmissionStatus::NotApproved;
                submission.feedback = Some(feedback.to_string());
                submission.updated_at = now;
                rejected += 1;
            }
        }
        Ok(rejected)
    }

    async fn get_user(&self, address: &WalletAddress) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.get(address).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.write()?;
        if tables.users.contains_key(&user.address) {
            return Err(StoreError::AlreadyExists(format!("user {}", user.address)));
        }
        tables.users.insert(user.address, user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.write()?;
        if !is_default_username(&user.username)
            && tables
                .users
                .values()
                .any(|u| u.address != user.address && u.username == user.username)
        {
            return Err(StoreError::AlreadyExists(format!("username {}", user.username)));
        }
        // Profile fields only; the trust score moves through `adjust_trust_score`.
        match tables.users.get_mut(&user.address) {
            Some(stored) => {
                stored.username = user.username.clone();
                stored.avatar = user.avatar.clone();
                stored.updated_at = user.updated_at;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("user {}", user.address))),
        }
    }

    async fn adjust_trust_score(
        &self,
        address: &WalletAddress,
        delta: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        let mut tables = self.write()?;
        Ok(tables.users.get_mut(address).map(|user| {
            user.adjust_trust(delta, now);
            user.clone()
        }))
    }
}
