//! Escrow ledger client boundary.
//!
//! The ledger holds the funds and is the source of truth for settlement. Calls are
//! slow and may fail or time out; the engine fences records before every write.

mod in_memory;
#[cfg(feature = "onchain")]
mod evm;

pub use in_memory::InMemoryLedger;
#[cfg(feature = "onchain")]
pub use evm::EvmLedger;

use gigledger_core::{ContractJobId, TokenAmount, TransactionHash, WalletAddress};
use gigledger_marketplace::LedgerJob;

#[derive(Debug, Clone, thiserror::Error)]
pub enum LedgerError {
    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    #[error("ledger call failed: {0}")]
    CallFailed(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

#[async_trait::async_trait]
pub trait LedgerClient: Send + Sync {
    /// Register and fund a job. Normally sent by the requester's wallet out of band.
    async fn create_job(&self, id: &ContractJobId, deposit: &TokenAmount) -> Result<TransactionHash, LedgerError>;

    async fn cancel_job(&self, id: &ContractJobId) -> Result<TransactionHash, LedgerError>;

    /// Record completion in favour of `worker`.
    async fn mark_done(&self, id: &ContractJobId, worker: &WalletAddress) -> Result<TransactionHash, LedgerError>;

    async fn claim_reward(&self, id: &ContractJobId) -> Result<TransactionHash, LedgerError>;

    async fn get_job(&self, id: &ContractJobId) -> Result<LedgerJob, LedgerError>;

    async fn job_exists(&self, id: &ContractJobId) -> Result<bool, LedgerError>;
}
