use std::str::FromStr;

use alloy::network::{EthereumWallet, ReceiptResponse};
use alloy::primitives::Address;
use alloy::providers::ProviderBuilder;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::transports::http::reqwest::Url;

use gigledger_core::{ContractJobId, TokenAmount, TransactionHash, WalletAddress};
use gigledger_marketplace::{LedgerJob, LedgerJobStatus};

use super::{LedgerClient, LedgerError};

sol! {
    #[sol(rpc)]
    contract JobEscrow {
        struct JobView {
            uint256 jobId;
            address requester;
            address doneBy;
            uint256 reward;
            uint8 status;
        }

        function createJob(uint256 jobId) external payable;
        function cancelJob(uint256 jobId) external;
        function setJobDone(uint256 jobId, address doneBy) external;
        function claimReward(uint256 jobId) external;
        function getJob(uint256 jobId) external view returns (JobView memory);
        function jobRegistered(uint256 jobId) external view returns (bool);
    }
}

/// Escrow contract client over JSON-RPC.
///
/// Writes are signed by the operator key and wait for the receipt.
pub struct EvmLedger {
    rpc_url: Url,
    contract_address: Address,
    signer: PrivateKeySigner,
}

impl EvmLedger {
    pub fn new(rpc_url: &str, contract_address: &str, private_key: &str) -> Result<Self, LedgerError> {
        let signer = PrivateKeySigner::from_str(private_key)
            .map_err(|e| LedgerError::InvalidConfig(e.to_string()))?;
        let rpc_url: Url = rpc_url
            .parse()
            .map_err(|e| LedgerError::InvalidConfig(format!("rpc url: {e}")))?;
        let contract_address: WalletAddress = contract_address
            .parse()
            .map_err(|e| LedgerError::InvalidConfig(format!("contract address: {e}")))?;
        Ok(Self { rpc_url, contract_address: contract_address.as_address(), signer })
    }

    pub fn operator(&self) -> WalletAddress {
        WalletAddress::from_address(self.signer.address())
    }
}

/// Build a provider and bind the contract; expands in place so the provider type
/// never has to be named.
macro_rules! escrow {
    ($self:ident) => {
        JobEscrow::new(
            $self.contract_address,
            ProviderBuilder::new()
                .wallet(EthereumWallet::from($self.signer.clone()))
                .connect_http($self.rpc_url.clone()),
        )
    };
}

macro_rules! send_and_confirm {
    ($call:expr) => {{
        let pending_tx = $call
            .send()
            .await
            .map_err(|e| LedgerError::TransactionFailed(e.to_string()))?;
        let receipt = pending_tx
            .get_receipt()
            .await
            .map_err(|e| LedgerError::TransactionFailed(e.to_string()))?;
        if !receipt.status() {
            return Err(LedgerError::TransactionFailed(format!(
                "transaction {} reverted",
                receipt.transaction_hash
            )));
        }
        Ok(TransactionHash(format!("{:#x}", receipt.transaction_hash)))
    }};
}

#[async_trait::async_trait]
impl LedgerClient for EvmLedger {
    async fn create_job(&self, id: &ContractJobId, deposit: &TokenAmount) -> Result<TransactionHash, LedgerError> {
        let contract = escrow!(self);
        send_and_confirm!(contract.createJob(id.as_u256()).value(deposit.as_u256()))
    }

    async fn cancel_job(&self, id: &ContractJobId) -> Result<TransactionHash, LedgerError> {
        let contract = escrow!(self);
        send_and_confirm!(contract.cancelJob(id.as_u256()))
    }

    async fn mark_done(&self, id: &ContractJobId, worker: &WalletAddress) -> Result<TransactionHash, LedgerError> {
        let contract = escrow!(self);
        send_and_confirm!(contract.setJobDone(id.as_u256(), worker.as_address()))
    }

    async fn claim_reward(&self, id: &ContractJobId) -> Result<TransactionHash, LedgerError> {
        let contract = escrow!(self);
        send_and_confirm!(contract.claimReward(id.as_u256()))
    }

    async fn get_job(&self, id: &ContractJobId) -> Result<LedgerJob, LedgerError> {
        let contract = escrow!(self);
        let view = contract
            .getJob(id.as_u256())
            .call()
            .await
            .map_err(|e| LedgerError::CallFailed(e.to_string()))?;
        let status = LedgerJobStatus::try_from(view.status)
            .map_err(|e| LedgerError::CallFailed(e.to_string()))?;
        let worker = (view.doneBy != Address::ZERO).then(|| WalletAddress::from_address(view.doneBy));
        Ok(LedgerJob {
            requester: WalletAddress::from_address(view.requester),
            worker,
            reward: TokenAmount::from_u256(view.reward),
            status,
        })
    }

    async fn job_exists(&self, id: &ContractJobId) -> Result<bool, LedgerError> {
        let contract = escrow!(self);
        contract
            .jobRegistered(id.as_u256())
            .call()
            .await
            .map_err(|e| LedgerError::CallFailed(e.to_string()))
    }
}
