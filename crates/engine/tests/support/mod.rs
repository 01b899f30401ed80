#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use gigledger_core::{ContractJobId, JobId, SubmissionId, TokenAmount, WalletAddress};
use gigledger_engine::{EngineConfig, IdSource, Marketplace, MarketplaceDeps};
use gigledger_infra::{
    Datastore, InMemoryDatastore, InMemoryLedger, JobFilter, OracleError, StoreError, StoreResult,
    SubmissionFilter, VerificationOracle,
};
use gigledger_marketplace::{
    Job, JobStatus, NewJob, Submission, SubmissionStatus, User, Verdict, VerificationRequest, WorkResult,
};

pub enum Reply {
    Verdict(Verdict),
    Fail,
    Hang,
    /// Approve once the gate is notified.
    Held(Arc<tokio::sync::Notify>),
}

pub fn approve() -> Reply {
    Reply::Verdict(Verdict { approved: true, cheated: false, feedback: "Looks good.".into() })
}

pub fn reject() -> Reply {
    Reply::Verdict(Verdict { approved: false, cheated: false, feedback: "Incomplete.".into() })
}

pub fn cheat() -> Reply {
    Reply::Verdict(Verdict { approved: true, cheated: true, feedback: "Copied.".into() })
}

/// Answers from a queue of replies; approves once the queue is empty.
#[derive(Default)]
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<Reply>>,
    calls: AtomicU32,
}

impl ScriptedOracle {
    pub fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl VerificationOracle for ScriptedOracle {
    async fn verify(&self, _request: &VerificationRequest) -> Result<Verdict, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            None => Ok(Verdict { approved: true, cheated: false, feedback: "Looks good.".into() }),
            Some(Reply::Verdict(v)) => Ok(v),
            Some(Reply::Fail) => Err(OracleError::Status { status: 503 }),
            Some(Reply::Hang) => std::future::pending().await,
            Some(Reply::Held(gate)) => {
                gate.notified().await;
                Ok(Verdict { approved: true, cheated: false, feedback: "Looks good.".into() })
            }
        }
    }
}

/// Contract job ids 1, 2, 3, ...
#[derive(Default)]
pub struct SequentialIds(AtomicU64);

impl IdSource for SequentialIds {
    fn next_bytes(&self) -> Result<[u8; 32], String> {
        let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&n.to_be_bytes());
        Ok(bytes)
    }
}

pub struct Harness {
    pub store: Arc<InMemoryDatastore>,
    pub ledger: Arc<InMemoryLedger>,
    pub oracle: Arc<ScriptedOracle>,
    pub market: Marketplace,
    pub config: EngineConfig,
}

pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.lifecycle.confirm_grace = Duration::ZERO;
    config.lifecycle.creation_recheck_delay = Duration::from_secs(3600);
    config.pipeline.verification_timeout = Duration::from_millis(200);
    config
}

pub fn harness() -> Harness {
    harness_with(test_config())
}

pub fn harness_with(config: EngineConfig) -> Harness {
    let store = InMemoryDatastore::arc();
    build(store.clone(), store, config)
}

/// Harness whose engine writes through a store that can be told to fail job updates.
pub fn harness_with_flaky_jobs() -> (Harness, Arc<FlakyJobWrites>) {
    let store = InMemoryDatastore::arc();
    let flaky = Arc::new(FlakyJobWrites { inner: store.clone(), failing: AtomicBool::new(false) });
    (build(store, flaky.clone(), test_config()), flaky)
}

fn build(store: Arc<InMemoryDatastore>, engine_store: Arc<dyn Datastore>, config: EngineConfig) -> Harness {
    let ledger = InMemoryLedger::arc(address(0xee));
    let oracle = Arc::new(ScriptedOracle::default());
    let market = Marketplace::build(
        MarketplaceDeps {
            store: engine_store,
            ledger: ledger.clone(),
            oracle: oracle.clone(),
            ids: Arc::new(SequentialIds::default()),
        },
        config,
    );
    Harness { store, ledger, oracle, market, config }
}

/// Delegates to an in-memory store; `update_job_if` errors while `failing` is set.
pub struct FlakyJobWrites {
    inner: Arc<InMemoryDatastore>,
    pub failing: AtomicBool,
}

impl FlakyJobWrites {
    pub fn fail_job_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Datastore for FlakyJobWrites {
    async fn insert_job(&self, job: &Job) -> StoreResult<()> {
        self.inner.insert_job(job).await
    }

    async fn get_job(&self, id: JobId) -> StoreResult<Option<Job>> {
        self.inner.get_job(id).await
    }

    async fn get_job_by_contract_id(&self, contract_job_id: &ContractJobId) -> StoreResult<Option<Job>> {
        self.inner.get_job_by_contract_id(contract_job_id).await
    }

    async fn list_jobs(&self, filter: &JobFilter) -> StoreResult<Vec<Job>> {
        self.inner.list_jobs(filter).await
    }

    async fn count_jobs(&self, filter: &JobFilter) -> StoreResult<u64> {
        self.inner.count_jobs(filter).await
    }

    async fn update_job_if(&self, job: &Job, expected: JobStatus) -> StoreResult<bool> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Storage("connection reset".into()));
        }
        self.inner.update_job_if(job, expected).await
    }

    async fn insert_submission(&self, submission: &Submission) -> StoreResult<()> {
        self.inner.insert_submission(submission).await
    }

    async fn get_submission(&self, id: SubmissionId) -> StoreResult<Option<Submission>> {
        self.inner.get_submission(id).await
    }

    async fn find_submission(&self, job_id: JobId, submitter: &WalletAddress) -> StoreResult<Option<Submission>> {
        self.inner.find_submission(job_id, submitter).await
    }

    async fn list_submissions(&self, filter: &SubmissionFilter) -> StoreResult<Vec<Submission>> {
        self.inner.list_submissions(filter).await
    }

    async fn count_submissions(&self, filter: &SubmissionFilter) -> StoreResult<u64> {
        self.inner.count_submissions(filter).await
    }

    async fn update_submission_if(&self, submission: &Submission, expected: SubmissionStatus) -> StoreResult<bool> {
        self.inner.update_submission_if(submission, expected).await
    }

    async fn reject_pending_submissions(&self, job_id: JobId, feedback: &str, now: DateTime<Utc>) -> StoreResult<u64> {
        self.inner.reject_pending_submissions(job_id, feedback, now).await
    }

    async fn get_user(&self, address: &WalletAddress) -> StoreResult<Option<User>> {
        self.inner.get_user(address).await
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.inner.find_user_by_username(username).await
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        self.inner.insert_user(user).await
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        self.inner.update_user(user).await
    }

    async fn adjust_trust_score(&self, address: &WalletAddress, delta: i32, now: DateTime<Utc>) -> StoreResult<Option<User>> {
        self.inner.adjust_trust_score(address, delta, now).await
    }
}

pub fn address(last: u8) -> WalletAddress {
    format!("0x{}{last:02x}", "0".repeat(38)).parse().unwrap()
}

pub fn requester() -> WalletAddress {
    address(0x01)
}

pub fn worker(n: u8) -> WalletAddress {
    address(0x10 + n)
}

pub fn one_token() -> TokenAmount {
    "1000000000000000000".parse().unwrap()
}

pub fn new_job(min_trust_score: u8) -> NewJob {
    NewJob {
        requester: requester(),
        title: "Translate a README".into(),
        description: "Translate the project README into French.".into(),
        reward: one_token(),
        deadline: Utc::now() + chrono::Duration::days(7),
        min_trust_score,
        files: vec![],
    }
}

pub fn work() -> WorkResult {
    WorkResult { text: "Voici le README traduit.".into(), files: vec![] }
}

impl Harness {
    /// Prepare, fund on the ledger and confirm a job.
    pub async fn open_job(&self, min_trust_score: u8) -> Job {
        let job = self.market.lifecycle.prepare(new_job(min_trust_score)).await.unwrap();
        self.ledger.register(job.contract_job_id, job.requester, job.reward).unwrap();
        self.market.lifecycle.confirm_create(&job.contract_job_id, &requester()).await.unwrap()
    }
}
