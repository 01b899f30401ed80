//! Read side: job listings, details with result visibility, and participant history.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use gigledger_core::{JobId, SubmissionId, WalletAddress};
use gigledger_infra::{Datastore, JobFilter, Page, SortOrder, SubmissionFilter};
use gigledger_marketplace::{Job, JobStatus, Submission, SubmissionStatus, TrustScore, WorkResult};

use crate::error::{EngineError, EngineResult};

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone, Serialize)]
pub struct JobPage {
    pub items: Vec<Job>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

/// Submission as shown to a particular viewer; `result` is withheld unless the viewer
/// may see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionView {
    pub id: SubmissionId,
    pub job_id: JobId,
    pub submitter: WalletAddress,
    pub status: SubmissionStatus,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub result: Option<WorkResult>,
}

impl SubmissionView {
    fn new(submission: Submission, show_result: bool) -> Self {
        Self {
            id: submission.id,
            job_id: submission.job_id,
            submitter: submission.submitter,
            status: submission.status,
            feedback: submission.feedback,
            created_at: submission.created_at,
            result: show_result.then_some(submission.result),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobDetails {
    pub job: Job,
    pub submissions: Vec<SubmissionView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobHistory {
    pub requested: Vec<Job>,
    /// Jobs the address was approved for.
    pub completed: Vec<Job>,
}

pub struct JobQueries {
    store: Arc<dyn Datastore>,
}

fn page_of(page: u64, limit: u64) -> (u64, u64, Page) {
    let page = page.max(1);
    let limit = if limit == 0 { DEFAULT_PAGE_SIZE } else { limit.min(MAX_PAGE_SIZE) };
    (page, limit, Page::number(page, limit))
}

impl JobQueries {
    pub fn new(store: Arc<dyn Datastore>) -> Self {
        Self { store }
    }

    /// Job with all its submissions. The requester sees every submission's result and,
    /// once the job is done, the job's result; a submitter sees its own result once
    /// approved.
    pub async fn get_job(&self, job_id: JobId, viewer: Option<&WalletAddress>) -> EngineResult<JobDetails> {
        let mut job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("job {job_id}")))?;

        let is_requester = viewer.is_some_and(|v| job.is_requester(v));
        if !(is_requester && job.status == JobStatus::Done) {
            job.result = None;
        }

        let submissions = self
            .store
            .list_submissions(&SubmissionFilter::for_job(job_id))
            .await?
            .into_iter()
            .map(|s| {
                let own_approved =
                    viewer == Some(&s.submitter) && s.status == SubmissionStatus::Approved;
                SubmissionView::new(s, is_requester || own_approved)
            })
            .collect();
        Ok(JobDetails { job, submissions })
    }

    /// Newest first. Empty `statuses` lists everything.
    pub async fn list_jobs(&self, statuses: Vec<JobStatus>, page: u64, limit: u64) -> EngineResult<JobPage> {
        let (page, limit, window) = page_of(page, limit);
        let mut filter = JobFilter { statuses, order: SortOrder::Newest, ..JobFilter::default() };
        let total = self.store.count_jobs(&filter).await?;
        filter.page = Some(window);
        let items = self.store.list_jobs(&filter).await?;
        Ok(JobPage { items, total, page, limit })
    }

    /// Open jobs still before their deadline that a participant with `trust` may take.
    pub async fn find_open_jobs(
        &self,
        trust: TrustScore,
        now: DateTime<Utc>,
        page: u64,
        limit: u64,
    ) -> EngineResult<JobPage> {
        let (page, limit, window) = page_of(page, limit);
        let mut filter = JobFilter {
            deadline_after: Some(now),
            trust_at_most: Some(trust),
            order: SortOrder::Newest,
            ..JobFilter::with_status(JobStatus::Open)
        };
        let total = self.store.count_jobs(&filter).await?;
        filter.page = Some(window);
        let items = self.store.list_jobs(&filter).await?;
        Ok(JobPage { items, total, page, limit })
    }

    pub async fn job_history(&self, address: &WalletAddress) -> EngineResult<JobHistory> {
        let requested = self
            .store
            .list_jobs(&JobFilter { requester: Some(*address), order: SortOrder::Newest, ..JobFilter::default() })
            .await?;
        let completed = self
            .store
            .list_jobs(&JobFilter {
                statuses: vec![JobStatus::WaitForClaim, JobStatus::Done],
                worker: Some(*address),
                order: SortOrder::Newest,
                ..JobFilter::default()
            })
            .await?;
        Ok(JobHistory { requested, completed })
    }

    /// Approved work product, for the requester or the worker once settled.
    pub async fn get_result(&self, job_id: JobId, caller: &WalletAddress) -> EngineResult<WorkResult> {
        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("job {job_id}")))?;
        if !job.is_requester(caller) && !job.is_worker(caller) {
            return Err(EngineError::Unauthorized("only the requester or worker can read the result".into()));
        }
        if !matches!(job.status, JobStatus::WaitForClaim | JobStatus::Done) {
            return Err(EngineError::conflict(format!("job {job_id} is {}, no settled result", job.status)));
        }
        job.result.ok_or_else(|| EngineError::not_found(format!("result of job {job_id}")))
    }
}
