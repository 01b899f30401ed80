//! Claimability decision over the ledger's view of a job.
//!
//! The ledger overloads its `Done` status: with a positive reward the escrow is
//! still held for the worker, with a zero reward it has already been claimed.

use serde::{Deserialize, Serialize};

use gigledger_core::{DomainError, DomainResult, TokenAmount, WalletAddress};

use crate::job::{Job, JobStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerJobStatus {
    Open,
    Cancelled,
    Done,
}

impl TryFrom<u8> for LedgerJobStatus {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(LedgerJobStatus::Open),
            1 => Ok(LedgerJobStatus::Cancelled),
            2 => Ok(LedgerJobStatus::Done),
            other => Err(DomainError::validation(format!("unknown ledger job status {other}"))),
        }
    }
}

/// Ledger snapshot of an escrowed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerJob {
    pub requester: WalletAddress,
    pub worker: Option<WalletAddress>,
    pub reward: TokenAmount,
    pub status: LedgerJobStatus,
}

impl LedgerJob {
    pub fn is_claimed(&self) -> bool {
        self.status == LedgerJobStatus::Done && self.reward.is_zero()
    }

    pub fn is_claimable(&self) -> bool {
        self.status == LedgerJobStatus::Done && !self.reward.is_zero()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimBlock {
    Cancelled,
    AlreadyClaimed,
    /// Ledger has not recorded completion yet.
    NotSettled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimDecision {
    pub claimable: bool,
    pub reason: Option<ClaimBlock>,
    /// Off-chain status the record should be brought to, if the ledger is ahead.
    #[serde(skip)]
    pub sync_to: Option<JobStatus>,
}

impl ClaimDecision {
    fn blocked(reason: ClaimBlock, sync_to: Option<JobStatus>) -> Self {
        Self { claimable: false, reason: Some(reason), sync_to }
    }
}

/// Decide whether `caller` can claim the escrow for `job` given the ledger's view.
///
/// Cancelled and already-claimed outcomes are reported to any caller; every other
/// outcome requires the caller to be the recorded worker.
pub fn assess_claim(job: &Job, ledger: &LedgerJob, caller: &WalletAddress) -> DomainResult<ClaimDecision> {
    match ledger.status {
        LedgerJobStatus::Cancelled => {
            let sync = (job.status != JobStatus::Cancelled).then_some(JobStatus::Cancelled);
            return Ok(ClaimDecision::blocked(ClaimBlock::Cancelled, sync));
        }
        LedgerJobStatus::Done if ledger.is_claimed() => {
            let sync = (job.status != JobStatus::Done).then_some(JobStatus::Done);
            return Ok(ClaimDecision::blocked(ClaimBlock::AlreadyClaimed, sync));
        }
        _ => {}
    }

    job.ensure_worker(caller)?;

    if ledger.is_claimable() {
        Ok(ClaimDecision { claimable: true, reason: None, sync_to: None })
    } else {
        Ok(ClaimDecision::blocked(ClaimBlock::NotSettled, None))
    }
}
