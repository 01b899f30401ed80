use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use gigledger_core::{ContractJobId, TokenAmount, TransactionHash, WalletAddress};
use gigledger_marketplace::{LedgerJob, LedgerJobStatus};

use super::{LedgerClient, LedgerError};

#[derive(Debug, Default)]
struct State {
    jobs: HashMap<ContractJobId, LedgerJob>,
    next_tx: u64,
    mark_done_failures: u32,
    mark_done_calls: u32,
    unavailable: bool,
}

impl State {
    fn tx(&mut self) -> TransactionHash {
        self.next_tx += 1;
        TransactionHash(format!("0x{:064x}", self.next_tx))
    }

    fn check_available(&self) -> Result<(), LedgerError> {
        if self.unavailable {
            return Err(LedgerError::CallFailed("ledger unavailable".into()));
        }
        Ok(())
    }
}

/// In-process escrow ledger for tests/dev, with fault injection.
#[derive(Debug)]
pub struct InMemoryLedger {
    signer: WalletAddress,
    state: Mutex<State>,
}

impl InMemoryLedger {
    /// `signer` is the account `create_job` is sent from.
    pub fn new(signer: WalletAddress) -> Self {
        Self { signer, state: Mutex::new(State::default()) }
    }

    pub fn arc(signer: WalletAddress) -> Arc<Self> {
        Arc::new(Self::new(signer))
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, LedgerError> {
        self.state
            .lock()
            .map_err(|_| LedgerError::CallFailed("in-memory ledger lock poisoned".into()))
    }

    /// Record a job as if the requester had funded it from their own wallet.
    pub fn register(&self, id: ContractJobId, requester: WalletAddress, reward: TokenAmount) -> Result<(), LedgerError> {
        let mut state = self.lock()?;
        state.jobs.insert(
            id,
            LedgerJob { requester, worker: None, reward, status: LedgerJobStatus::Open },
        );
        Ok(())
    }

    /// Make the next `times` completion writes fail.
    pub fn fail_mark_done(&self, times: u32) -> Result<(), LedgerError> {
        self.lock()?.mark_done_failures = times;
        Ok(())
    }

    /// Make every call fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) -> Result<(), LedgerError> {
        self.lock()?.unavailable = unavailable;
        Ok(())
    }

    /// Completion writes attempted so far, including failed ones.
    pub fn mark_done_calls(&self) -> u32 {
        self.lock().map(|s| s.mark_done_calls).unwrap_or_default()
    }

    pub fn job(&self, id: &ContractJobId) -> Option<LedgerJob> {
        self.lock().ok().and_then(|s| s.jobs.get(id).cloned())
    }
}

#[async_trait::async_trait]
impl LedgerClient for InMemoryLedger {
    async fn create_job(&self, id: &ContractJobId, deposit: &TokenAmount) -> Result<TransactionHash, LedgerError> {
        let mut state = self.lock()?;
        state.check_available()?;
        if state.jobs.contains_key(id) {
            return Err(LedgerError::TransactionFailed(format!("job {id} already registered")));
        }
        if deposit.is_zero() {
            return Err(LedgerError::TransactionFailed("deposit must be positive".into()));
        }
        state.jobs.insert(
            *id,
            LedgerJob { requester: self.signer, worker: None, reward: *deposit, status: LedgerJobStatus::Open },
        );
        Ok(state.tx())
    }

    async fn cancel_job(&self, id: &ContractJobId) -> Result<TransactionHash, LedgerError> {
        let mut state = self.lock()?;
        state.check_available()?;
        let job = state
            .jobs
            .get_mut(id)
            .ok_or_else(|| LedgerError::TransactionFailed(format!("job {id} not registered")))?;
        if job.status != LedgerJobStatus::Open {
            return Err(LedgerError::TransactionFailed(format!("job {id} is not open")));
        }
        job.status = LedgerJobStatus::Cancelled;
        Ok(state.tx())
    }

    async fn mark_done(&self, id: &ContractJobId, worker: &WalletAddress) -> Result<TransactionHash, LedgerError> {
        let mut state = self.lock()?;
        state.check_available()?;
        state.mark_done_calls += 1;
        if state.mark_done_failures > 0 {
            state.mark_done_failures -= 1;
            return Err(LedgerError::TransactionFailed("injected mark_done failure".into()));
        }
        let job = state
            .jobs
            .get_mut(id)
            .ok_or_else(|| LedgerError::TransactionFailed(format!("job {id} not registered")))?;
        if job.status != LedgerJobStatus::Open {
            return Err(LedgerError::TransactionFailed(format!("job {id} is not open")));
        }
        job.status = LedgerJobStatus::Done;
        job.worker = Some(*worker);
        Ok(state.tx())
    }

    async fn claim_reward(&self, id: &ContractJobId) -> Result<TransactionHash, LedgerError> {
        let mut state = self.lock()?;
        state.check_available()?;
        let job = state
            .jobs
            .get_mut(id)
            .ok_or_else(|| LedgerError::TransactionFailed(format!("job {id} not registered")))?;
        if !job.is_claimable() {
            return Err(LedgerError::TransactionFailed(format!("job {id} has nothing to claim")));
        }
        job.reward = TokenAmount::ZERO;
        Ok(state.tx())
    }

    async fn get_job(&self, id: &ContractJobId) -> Result<LedgerJob, LedgerError> {
        let state = self.lock()?;
        state.check_available()?;
        state
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::CallFailed(format!("job {id} not registered")))
    }

    async fn job_exists(&self, id: &ContractJobId) -> Result<bool, LedgerError> {
        let state = self.lock()?;
        state.check_available()?;
        Ok(state.jobs.contains_key(id))
    }
}
