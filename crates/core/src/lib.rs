//! Domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, wallet addresses, token amounts and the shared error model.

pub mod amount;
pub mod error;
pub mod id;

pub use amount::TokenAmount;
pub use error::{DomainError, DomainResult};
pub use id::{ContractJobId, JobId, SubmissionId, TransactionHash, WalletAddress};
