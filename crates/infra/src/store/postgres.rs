//! Postgres-backed datastore.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `AlreadyExists` |
//! | Database (foreign key violation) | `23503` | `NotFound` |
//! | Database (other) | Any other | `Storage` |
//! | Decode / ColumnDecode | N/A | `Corrupt` |
//! | Other | N/A | `Storage` |
//!
//! Conditional updates are single `UPDATE ... WHERE id = $1 AND status = $2`
//! statements; the affected-row count tells the caller whether it won.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use gigledger_core::{ContractJobId, JobId, SubmissionId, TransactionHash, WalletAddress};
use gigledger_marketplace::{
    Job, JobStatus, Submission, SubmissionStatus, TrustScore, User, WorkResult,
};

use super::{Datastore, JobFilter, SortOrder, StoreError, StoreResult, SubmissionFilter};

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

const JOB_COLUMNS: &str = "id, contract_job_id, requester, worker, title, description, reward, \
     deadline, min_trust_score, status, files, result, retry_count, last_check_at, \
     settlement_tx, created_at, updated_at";

const SUBMISSION_COLUMNS: &str = "id, job_id, submitter, result_text, result_files, status, \
     feedback, submitter_trust_score, retry_count, last_retry_at, created_at, updated_at";

const USER_COLUMNS: &str = "address, username, avatar, trust_score, created_at, updated_at";

const JOB_FILTER: &str = "(cardinality($1::text[]) = 0 OR status = ANY($1))
    AND ($2::text IS NULL OR requester = $2)
    AND ($3::text IS NULL OR worker = $3)
    AND ($4::timestamptz IS NULL OR deadline < $4)
    AND ($5::timestamptz IS NULL OR deadline > $5)
    AND ($6::smallint IS NULL OR min_trust_score <= $6)
    AND ($7::timestamptz IS NULL OR created_at <= $7)
    AND ($8::timestamptz IS NULL OR last_check_at IS NULL OR last_check_at <= $8)";

const SUBMISSION_FILTER: &str = "(cardinality($1::text[]) = 0 OR status = ANY($1))
    AND ($2::uuid IS NULL OR job_id = $2)
    AND ($3::text IS NULL OR submitter = $3)
    AND ($4::timestamptz IS NULL OR COALESCE(last_retry_at, updated_at) <= $4)";

/// Datastore over a Postgres pool. `Send + Sync`; clone freely.
#[derive(Debug, Clone)]
pub struct PostgresDatastore {
    pool: Arc<PgPool>,
}

impl PostgresDatastore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if missing.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

fn order_sql(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Oldest => "ORDER BY created_at ASC, id ASC",
        SortOrder::Newest => "ORDER BY created_at DESC, id DESC",
    }
}

fn job_status_strings(statuses: &[JobStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

fn submission_status_strings(statuses: &[SubmissionStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[async_trait::async_trait]
impl Datastore for PostgresDatastore {
    #[instrument(skip(self, job), fields(job_id = %job.id, contract_job_id = %job.contract_job_id), err)]
    async fn insert_job(&self, job: &Job) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO jobs ({JOB_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)"
        ))
        .bind(job.id.as_uuid())
        .bind(job.contract_job_id.to_string())
        .bind(job.requester.to_string())
        .bind(job.worker.map(|w| w.to_string()))
        .bind(&job.title)
        .bind(&job.description)
        .bind(job.reward.to_string())
        .bind(job.deadline)
        .bind(i16::from(job.min_trust_score.value()))
        .bind(job.status.as_str())
        .bind(serde_json::json!(job.files))
        .bind(job.result.as_ref().map(|r| serde_json::json!(r)))
        .bind(to_i32(job.retry_count))
        .bind(job.last_check_at)
        .bind(job.settlement_tx.as_ref().map(|t| t.0.clone()))
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_job", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(job_id = %id), err)]
    async fn get_job(&self, id: JobId) -> StoreResult<Option<Job>> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_job", e))?;
        row.map(|r| decode_job(&r)).transpose()
    }

    #[instrument(skip(self), fields(contract_job_id = %contract_job_id), err)]
    async fn get_job_by_contract_id(&self, contract_job_id: &ContractJobId) -> StoreResult<Option<Job>> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE contract_job_id = $1"))
            .bind(contract_job_id.to_string())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_job_by_contract_id", e))?;
        row.map(|r| decode_job(&r)).transpose()
    }

    #[instrument(skip(self, filter), err)]
    async fn list_jobs(&self, filter: &JobFilter) -> StoreResult<Vec<Job>> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE {JOB_FILTER} {} LIMIT $9 OFFSET $10",
            order_sql(filter.order)
        );
        let rows = sqlx::query(&sql)
            .bind(job_status_strings(&filter.statuses))
            .bind(filter.requester.map(|a| a.to_string()))
            .bind(filter.worker.map(|a| a.to_string()))
            .bind(filter.deadline_before)
            .bind(filter.deadline_after)
            .bind(filter.trust_at_most.map(|s| i16::from(s.value())))
            .bind(filter.created_before)
            .bind(filter.check_due_before)
            .bind(filter.page.map(|p| p.limit as i64))
            .bind(filter.page.map(|p| p.offset as i64).unwrap_or(0))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_jobs", e))?;
        rows.iter().map(decode_job).collect()
    }

    #[instrument(skip(self, filter), err)]
    async fn count_jobs(&self, filter: &JobFilter) -> StoreResult<u64> {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS total FROM jobs WHERE {JOB_FILTER}"))
            .bind(job_status_strings(&filter.statuses))
            .bind(filter.requester.map(|a| a.to_string()))
            .bind(filter.worker.map(|a| a.to_string()))
            .bind(filter.deadline_before)
            .bind(filter.deadline_after)
            .bind(filter.trust_at_most.map(|s| i16::from(s.value())))
            .bind(filter.created_before)
            .bind(filter.check_due_before)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_jobs", e))?;
        let total: i64 = row.try_get("total").map_err(|e| map_sqlx_error("count_jobs", e))?;
        Ok(total.max(0) as u64)
    }

    #[instrument(skip(self, job), fields(job_id = %job.id, expected = %expected, next = %job.status), err)]
    async fn update_job_if(&self, job: &Job, expected: JobStatus) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET
                worker = $3,
                status = $4,
                result = $5,
                retry_count = $6,
                last_check_at = $7,
                settlement_tx = $8,
                updated_at = $9
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(job.id.as_uuid())
        .bind(expected.as_str())
        .bind(job.worker.map(|w| w.to_string()))
        .bind(job.status.as_str())
        .bind(job.result.as_ref().map(|r| serde_json::json!(r)))
        .bind(to_i32(job.retry_count))
        .bind(job.last_check_at)
        .bind(job.settlement_tx.as_ref().map(|t| t.0.clone()))
        .bind(job.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_job_if", e))?;
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self, submission), fields(submission_id = %submission.id, job_id = %submission.job_id), err)]
    async fn insert_submission(&self, submission: &Submission) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO submissions ({SUBMISSION_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        ))
        .bind(submission.id.as_uuid())
        .bind(submission.job_id.as_uuid())
        .bind(submission.submitter.to_string())
        .bind(&submission.result.text)
        .bind(serde_json::json!(submission.result.files))
        .bind(submission.status.as_str())
        .bind(&submission.feedback)
        .bind(i16::from(submission.submitter_trust_score.value()))
        .bind(to_i32(submission.retry_count))
        .bind(submission.last_retry_at)
        .bind(submission.created_at)
        .bind(submission.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_submission", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(submission_id = %id), err)]
    async fn get_submission(&self, id: SubmissionId) -> StoreResult<Option<Submission>> {
        let row = sqlx::query(&format!("SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_submission", e))?;
        row.map(|r| decode_submission(&r)).transpose()
    }

    #[instrument(skip(self), fields(job_id = %job_id, submitter = %submitter), err)]
    async fn find_submission(
        &self,
        job_id: JobId,
        submitter: &WalletAddress,
    ) -> StoreResult<Option<Submission>> {
        let row = sqlx::query(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE job_id = $1 AND submitter = $2"
        ))
        .bind(job_id.as_uuid())
        .bind(submitter.to_string())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_submission", e))?;
        row.map(|r| decode_submission(&r)).transpose()
    }

    #[instrument(skip(self, filter), err)]
    async fn list_submissions(&self, filter: &SubmissionFilter) -> StoreResult<Vec<Submission>> {
        let sql = format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE {SUBMISSION_FILTER} {} LIMIT $5 OFFSET $6",
            order_sql(filter.order)
        );
        let rows = sqlx::query(&sql)
            .bind(submission_status_strings(&filter.statuses))
            .bind(filter.job_id.map(Uuid::from))
            .bind(filter.submitter.map(|a| a.to_string()))
            .bind(filter.retry_due_before)
            .bind(filter.page.map(|p| p.limit as i64))
            .bind(filter.page.map(|p| p.offset as i64).unwrap_or(0))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_submissions", e))?;
        rows.iter().map(decode_submission).collect()
    }

    #[instrument(skip(self, filter), err)]
    async fn count_submissions(&self, filter: &SubmissionFilter) -> StoreResult<u64> {
        let row = sqlx::query(&format!(
            "SELECT COUNT(*) AS total FROM submissions WHERE {SUBMISSION_FILTER}"
        ))
        .bind(submission_status_strings(&filter.statuses))
        .bind(filter.job_id.map(Uuid::from))
        .bind(filter.submitter.map(|a| a.to_string()))
        .bind(filter.retry_due_before)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_submissions", e))?;
        let total: i64 = row
            .try_get("total")
            .map_err(|e| map_sqlx_error("count_submissions", e))?;
        Ok(total.max(0) as u64)
    }

    #[instrument(
        skip(self, submission),
        fields(submission_id = %submission.id, expected = %expected, next = %submission.status),
        err
    )]
    async fn update_submission_if(
        &self,
        submission: &Submission,
        expected: SubmissionStatus,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE submissions SET
                status = $3,
                feedback = $4,
                retry_count = $5,
                last_retry_at = $6,
                updated_at = $7
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(submission.id.as_uuid())
        .bind(expected.as_str())
        .bind(submission.status.as_str())
        .bind(&submission.feedback)
        .bind(to_i32(submission.retry_count))
        .bind(submission.last_retry_at)
        .bind(submission.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_submission_if", e))?;
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self, feedback), fields(job_id = %job_id), err)]
    async fn reject_pending_submissions(
        &self,
        job_id: JobId,
        feedback: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE submissions
            SET status = $2, feedback = $3, updated_at = $4
            WHERE job_id = $1 AND status = $5
            "#,
        )
        .bind(job_id.as_uuid())
        .bind(SubmissionStatus::NotApproved.as_str())
        .bind(feedback)
        .bind(now)
        .bind(SubmissionStatus::PendingReview.as_str())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("reject_pending_submissions", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self), fields(address = %address), err)]
    async fn get_user(&self, address: &WalletAddress) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE address = $1"))
            .bind(address.to_string())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user", e))?;
        row.map(|r| decode_user(&r)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1 LIMIT 1"))
            .bind(username)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_username", e))?;
        row.map(|r| decode_user(&r)).transpose()
    }

    #[instrument(skip(self, user), fields(address = %user.address), err)]
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"
        ))
        .bind(user.address.to_string())
        .bind(&user.username)
        .bind(&user.avatar)
        .bind(i16::from(user.trust_score.value()))
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(())
    }

    #[instrument(skip(self, user), fields(address = %user.address), err)]
    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE users SET username = $2, avatar = $3, updated_at = $4 WHERE address = $1",
        )
        .bind(user.address.to_string())
        .bind(&user.username)
        .bind(&user.avatar)
        .bind(user.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {}", user.address)));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(address = %address), err)]
    async fn adjust_trust_score(
        &self,
        address: &WalletAddress,
        delta: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!(
            "UPDATE users \
             SET trust_score = LEAST(100, GREATEST(0, trust_score + $2)), updated_at = $3 \
             WHERE address = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(address.to_string())
        .bind(delta)
        .bind(now)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("adjust_trust_score", e))?;
        row.map(|r| decode_user(&r)).transpose()
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::AlreadyExists(msg),
                Some("23503") => StoreError::NotFound(msg),
                _ => StoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Storage(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Corrupt(format!("decode error in {}: {}", operation, err))
        }
        _ => StoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn corrupt(what: &str, err: impl core::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{what}: {err}"))
}

// SQLx row types

#[derive(Debug)]
struct JobRow {
    id: Uuid,
    contract_job_id: String,
    requester: String,
    worker: Option<String>,
    title: String,
    description: String,
    reward: String,
    deadline: DateTime<Utc>,
    min_trust_score: i16,
    status: String,
    files: serde_json::Value,
    result: Option<serde_json::Value>,
    retry_count: i32,
    last_check_at: Option<DateTime<Utc>>,
    settlement_tx: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for JobRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(JobRow {
            id: row.try_get("id")?,
            contract_job_id: row.try_get("contract_job_id")?,
            requester: row.try_get("requester")?,
            worker: row.try_get("worker")?,
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            reward: row.try_get("reward")?,
            deadline: row.try_get("deadline")?,
            min_trust_score: row.try_get("min_trust_score")?,
            status: row.try_get("status")?,
            files: row.try_get("files")?,
            result: row.try_get("result")?,
            retry_count: row.try_get("retry_count")?,
            last_check_at: row.try_get("last_check_at")?,
            settlement_tx: row.try_get("settlement_tx")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Job {
            id: JobId::from_uuid(row.id),
            contract_job_id: row.contract_job_id.parse().map_err(|e| corrupt("contract_job_id", e))?,
            requester: row.requester.parse().map_err(|e| corrupt("requester", e))?,
            worker: row
                .worker
                .map(|w| w.parse::<WalletAddress>())
                .transpose()
                .map_err(|e| corrupt("worker", e))?,
            title: row.title,
            description: row.description,
            reward: row.reward.parse().map_err(|e| corrupt("reward", e))?,
            deadline: row.deadline,
            min_trust_score: TrustScore::new(row.min_trust_score.clamp(0, 100) as u8),
            status: row.status.parse().map_err(|e| corrupt("status", e))?,
            files: serde_json::from_value(row.files).map_err(|e| corrupt("files", e))?,
            result: row
                .result
                .map(serde_json::from_value::<WorkResult>)
                .transpose()
                .map_err(|e| corrupt("result", e))?,
            retry_count: row.retry_count.max(0) as u32,
            last_check_at: row.last_check_at,
            settlement_tx: row.settlement_tx.map(TransactionHash),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn decode_job(row: &PgRow) -> StoreResult<Job> {
    let row = JobRow::from_row(row).map_err(|e| map_sqlx_error("decode_job", e))?;
    Job::try_from(row)
}

#[derive(Debug)]
struct SubmissionRow {
    id: Uuid,
    job_id: Uuid,
    submitter: String,
    result_text: String,
    result_files: serde_json::Value,
    status: String,
    feedback: Option<String>,
    submitter_trust_score: i16,
    retry_count: i32,
    last_retry_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for SubmissionRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(SubmissionRow {
            id: row.try_get("id")?,
            job_id: row.try_get("job_id")?,
            submitter: row.try_get("submitter")?,
            result_text: row.try_get("result_text")?,
            result_files: row.try_get("result_files")?,
            status: row.try_get("status")?,
            feedback: row.try_get("feedback")?,
            submitter_trust_score: row.try_get("submitter_trust_score")?,
            retry_count: row.try_get("retry_count")?,
            last_retry_at: row.try_get("last_retry_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<SubmissionRow> for Submission {
    type Error = StoreError;

    fn try_from(row: SubmissionRow) -> Result<Self, Self::Error> {
        Ok(Submission {
            id: SubmissionId::from_uuid(row.id),
            job_id: JobId::from_uuid(row.job_id),
            submitter: row.submitter.parse().map_err(|e| corrupt("submitter", e))?,
            result: WorkResult {
                text: row.result_text,
                files: serde_json::from_value(row.result_files)
                    .map_err(|e| corrupt("result_files", e))?,
            },
            status: row.status.parse().map_err(|e| corrupt("status", e))?,
            feedback: row.feedback,
            submitter_trust_score: TrustScore::new(row.submitter_trust_score.clamp(0, 100) as u8),
            retry_count: row.retry_count.max(0) as u32,
            last_retry_at: row.last_retry_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn decode_submission(row: &PgRow) -> StoreResult<Submission> {
    let row = SubmissionRow::from_row(row).map_err(|e| map_sqlx_error("decode_submission", e))?;
    Submission::try_from(row)
}

fn decode_user(row: &PgRow) -> StoreResult<User> {
    let address: String = row.try_get("address").map_err(|e| map_sqlx_error("decode_user", e))?;
    let score: i16 = row.try_get("trust_score").map_err(|e| map_sqlx_error("decode_user", e))?;
    Ok(User {
        address: address.parse().map_err(|e| corrupt("address", e))?,
        username: row.try_get("username").map_err(|e| map_sqlx_error("decode_user", e))?,
        avatar: row.try_get("avatar").map_err(|e| map_sqlx_error("decode_user", e))?,
        trust_score: TrustScore::new(score.clamp(0, 100) as u8),
        created_at: row.try_get("created_at").map_err(|e| map_sqlx_error("decode_user", e))?,
        updated_at: row.try_get("updated_at").map_err(|e| map_sqlx_error("decode_user", e))?,
    })
}
