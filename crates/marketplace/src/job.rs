use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gigledger_core::{
    ContractJobId, DomainError, DomainResult, JobId, TokenAmount, TransactionHash,
    WalletAddress,
};

use crate::user::TrustScore;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 10_000;

/// Job status lifecycle.
///
/// ```text
/// WaitingOnchainCheck -> Open | Failed
/// Open                -> Cancelled | Overdue | WaitOnChainApprove
/// Overdue             -> Cancelled
/// WaitOnChainApprove  -> WaitForClaim | Open
/// WaitForClaim        -> Done
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[serde(rename = "waiting_onchain_check")]
    WaitingOnchainCheck,
    Open,
    Cancelled,
    WaitForClaim,
    #[serde(rename = "wait_onchain_approve")]
    WaitOnChainApprove,
    Done,
    Overdue,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 8] = [
        JobStatus::WaitingOnchainCheck,
        JobStatus::Open,
        JobStatus::Cancelled,
        JobStatus::WaitForClaim,
        JobStatus::WaitOnChainApprove,
        JobStatus::Done,
        JobStatus::Overdue,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::WaitingOnchainCheck => "waiting_onchain_check",
            JobStatus::Open => "open",
            JobStatus::Cancelled => "cancelled",
            JobStatus::WaitForClaim => "wait_for_claim",
            JobStatus::WaitOnChainApprove => "wait_onchain_approve",
            JobStatus::Done => "done",
            JobStatus::Overdue => "overdue",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether `next` is a legal edge from `self`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (WaitingOnchainCheck, Open)
                | (WaitingOnchainCheck, Failed)
                | (Open, Cancelled)
                | (Open, Overdue)
                | (Open, WaitOnChainApprove)
                | (Overdue, Cancelled)
                | (WaitOnChainApprove, WaitForClaim)
                | (WaitOnChainApprove, Open)
                | (WaitForClaim, Done)
        )
    }

    /// No outgoing edge at all.
    pub fn is_terminal(self) -> bool {
        Self::ALL.iter().all(|next| !self.can_transition_to(*next))
    }

    pub fn is_cancellable(self) -> bool {
        self.can_transition_to(JobStatus::Cancelled)
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown job status '{s}'")))
    }
}

/// Work product attached to a submission (and copied onto the job once approved).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkResult {
    pub text: String,
    #[serde(default)]
    pub files: Vec<String>,
}

/// Input for preparing a new job, before an on-chain id is allocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewJob {
    pub requester: WalletAddress,
    pub title: String,
    pub description: String,
    pub reward: TokenAmount,
    pub deadline: DateTime<Utc>,
    pub min_trust_score: u8,
    #[serde(default)]
    pub files: Vec<String>,
}

impl NewJob {
    pub fn validate(&self, now: DateTime<Utc>) -> DomainResult<()> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(DomainError::validation("title is required"));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(DomainError::validation(format!(
                "title must be at most {MAX_TITLE_LEN} characters"
            )));
        }
        let description = self.description.trim();
        if description.is_empty() {
            return Err(DomainError::validation("description is required"));
        }
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(DomainError::validation(format!(
                "description must be at most {MAX_DESCRIPTION_LEN} characters"
            )));
        }
        if self.reward.is_zero() {
            return Err(DomainError::validation("reward must be greater than zero"));
        }
        if self.deadline <= now {
            return Err(DomainError::validation("deadline must be in the future"));
        }
        if self.min_trust_score > TrustScore::MAX.value() {
            return Err(DomainError::validation(format!(
                "minimum trust score must be between 0 and {}",
                TrustScore::MAX.value()
            )));
        }
        if self.requester.is_zero() {
            return Err(DomainError::validation("requester address must not be zero"));
        }
        Ok(())
    }
}

/// Off-chain projection of an escrowed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub contract_job_id: ContractJobId,
    pub requester: WalletAddress,
    /// Worker whose submission was approved (`doneBy`). Set only from provisional
    /// approval onward.
    pub worker: Option<WalletAddress>,
    pub title: String,
    pub description: String,
    pub reward: TokenAmount,
    pub deadline: DateTime<Utc>,
    pub min_trust_score: TrustScore,
    pub status: JobStatus,
    pub files: Vec<String>,
    pub result: Option<WorkResult>,
    /// Creation-check attempts consumed.
    pub retry_count: u32,
    pub last_check_at: Option<DateTime<Utc>>,
    pub settlement_tx: Option<TransactionHash>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Build a job awaiting on-chain confirmation.
    pub fn prepare(input: NewJob, contract_job_id: ContractJobId, now: DateTime<Utc>) -> DomainResult<Self> {
        input.validate(now)?;
        Ok(Self {
            id: JobId::new(),
            contract_job_id,
            requester: input.requester,
            worker: None,
            title: input.title.trim().to_string(),
            description: input.description.trim().to_string(),
            reward: input.reward,
            deadline: input.deadline,
            min_trust_score: TrustScore::new(input.min_trust_score),
            status: JobStatus::WaitingOnchainCheck,
            files: input.files,
            result: None,
            retry_count: 0,
            last_check_at: None,
            settlement_tx: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        self.deadline < now
    }

    pub fn is_requester(&self, address: &WalletAddress) -> bool {
        &self.requester == address
    }

    pub fn is_worker(&self, address: &WalletAddress) -> bool {
        self.worker.as_ref() == Some(address)
    }

    pub fn ensure_requester(&self, address: &WalletAddress) -> DomainResult<()> {
        if self.is_requester(address) {
            Ok(())
        } else {
            Err(DomainError::unauthorized("only the job requester may do this"))
        }
    }

    pub fn ensure_worker(&self, address: &WalletAddress) -> DomainResult<()> {
        if self.is_worker(address) {
            Ok(())
        } else {
            Err(DomainError::unauthorized("only the assigned worker may do this"))
        }
    }

    /// Move along a legal edge, or fail with a conflict.
    pub fn transition_to(&mut self, next: JobStatus, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::conflict(format!(
                "job {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    /// Provisional approval: record the worker and copy its result.
    pub fn assign(&mut self, worker: WalletAddress, result: WorkResult, now: DateTime<Utc>) -> DomainResult<()> {
        self.transition_to(JobStatus::WaitOnChainApprove, now)?;
        self.worker = Some(worker);
        self.result = Some(result);
        Ok(())
    }

    /// Ledger accepted the completion write. The hash is unknown when the write is
    /// only observed through a ledger read.
    pub fn settle(&mut self, tx: Option<TransactionHash>, now: DateTime<Utc>) -> DomainResult<()> {
        self.transition_to(JobStatus::WaitForClaim, now)?;
        self.settlement_tx = tx;
        Ok(())
    }

    /// Reverse a provisional approval. Worker, result and settlement hash are cleared
    /// together with the status change.
    pub fn reopen(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != JobStatus::WaitOnChainApprove {
            return Err(DomainError::conflict(format!(
                "job {} can only be reopened from {}",
                self.id,
                JobStatus::WaitOnChainApprove
            )));
        }
        self.transition_to(JobStatus::Open, now)?;
        self.worker = None;
        self.result = None;
        self.settlement_tx = None;
        Ok(())
    }

    /// Count one failed creation check.
    pub fn record_failed_check(&mut self, now: DateTime<Utc>) {
        self.retry_count += 1;
        self.last_check_at = Some(now);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn test_address(byte: u8) -> WalletAddress {
        format!("0x{}", format!("{byte:02x}").repeat(20)).parse().unwrap()
    }

    fn test_new_job(now: DateTime<Utc>) -> NewJob {
        NewJob {
            requester: test_address(0xaa),
            title: "Translate README".to_string(),
            description: "Translate the README into French".to_string(),
            reward: "1000000000000000000".parse().unwrap(),
            deadline: now + Duration::days(3),
            min_trust_score: 40,
            files: vec![],
        }
    }

    fn test_job(status: JobStatus) -> Job {
        let now = Utc::now();
        let mut job = Job::prepare(test_new_job(now), ContractJobId::from(7u64), now).unwrap();
        job.status = status;
        job
    }

    #[test]
    fn prepare_starts_waiting_for_chain_check() {
        let job = test_job(JobStatus::WaitingOnchainCheck);
        assert_eq!(job.status, JobStatus::WaitingOnchainCheck);
        assert_eq!(job.reward.to_string(), "1000000000000000000");
        assert!(job.worker.is_none());
        assert_eq!(job.retry_count, 0);
    }

    #[test]
    fn prepare_rejects_bad_input() {
        let now = Utc::now();

        let mut input = test_new_job(now);
        input.title = "   ".to_string();
        match Job::prepare(input, ContractJobId::from(1u64), now).unwrap_err() {
            DomainError::Validation(msg) if msg.contains("title") => {}
            other => panic!("unexpected error: {other:?}"),
        }

        let mut input = test_new_job(now);
        input.deadline = now - Duration::minutes(1);
        match Job::prepare(input, ContractJobId::from(1u64), now).unwrap_err() {
            DomainError::Validation(msg) if msg.contains("deadline") => {}
            other => panic!("unexpected error: {other:?}"),
        }

        let mut input = test_new_job(now);
        input.min_trust_score = 101;
        assert!(Job::prepare(input, ContractJobId::from(1u64), now).is_err());

        let mut input = test_new_job(now);
        input.reward = TokenAmount::ZERO;
        assert!(Job::prepare(input, ContractJobId::from(1u64), now).is_err());
    }

    #[test]
    fn status_strings_are_stable() {
        assert_eq!(
            serde_json::to_string(&JobStatus::WaitOnChainApprove).unwrap_or_default(),
            "\"wait_onchain_approve\""
        );
        for status in JobStatus::ALL {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
    }

    #[test]
    fn terminal_states_have_no_exit() {
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Overdue.is_terminal());
        assert!(JobStatus::Overdue.is_cancellable());
        assert!(!JobStatus::WaitForClaim.is_cancellable());
    }

    #[test]
    fn reopen_clears_worker_and_result_together() {
        let now = Utc::now();
        let mut job = test_job(JobStatus::Open);
        job.assign(test_address(0xbb), WorkResult { text: "done".into(), files: vec![] }, now)
            .unwrap();
        assert_eq!(job.status, JobStatus::WaitOnChainApprove);
        assert!(job.is_worker(&test_address(0xbb)));

        job.reopen(now).unwrap();
        assert_eq!(job.status, JobStatus::Open);
        assert!(job.worker.is_none());
        assert!(job.result.is_none());
    }

    #[test]
    fn settle_then_done() {
        let now = Utc::now();
        let mut job = test_job(JobStatus::WaitOnChainApprove);
        job.settle(Some(TransactionHash("0xabc".into())), now).unwrap();
        assert_eq!(job.status, JobStatus::WaitForClaim);
        job.transition_to(JobStatus::Done, now).unwrap();
        assert!(job.transition_to(JobStatus::Open, now).is_err());
    }

    #[test]
    fn requester_and_worker_checks() {
        let job = test_job(JobStatus::Open);
        assert!(job.ensure_requester(&test_address(0xaa)).is_ok());
        match job.ensure_requester(&test_address(0xbb)).unwrap_err() {
            DomainError::Unauthorized(_) => {}
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(job.ensure_worker(&test_address(0xaa)).is_err());
    }

    fn any_status() -> impl Strategy<Value = JobStatus> {
        prop::sample::select(JobStatus::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn transitions_follow_the_edge_table(from in any_status(), to in any_status()) {
            let mut job = test_job(from);
            let result = job.transition_to(to, Utc::now());
            prop_assert_eq!(result.is_ok(), from.can_transition_to(to));
            if result.is_err() {
                prop_assert_eq!(job.status, from);
            }
        }
    }
}
