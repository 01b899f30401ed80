//! Verification oracle boundary.
//!
//! The engine owns the deadline: it wraps every `verify` call in a hard timeout and
//! turns timeouts into a neutral verdict. Implementations report transport failures as
//! errors and degrade malformed answers to [`Verdict::unparseable`] themselves.

mod gemini;

pub use gemini::{parse_verdict, GeminiOracle, DEFAULT_BASE_URL, DEFAULT_MODEL};

use gigledger_marketplace::{Verdict, VerificationRequest};

#[derive(Debug, Clone, thiserror::Error)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Request(String),

    #[error("oracle returned HTTP {status}")]
    Status { status: u16 },

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

#[async_trait::async_trait]
pub trait VerificationOracle: Send + Sync {
    async fn verify(&self, request: &VerificationRequest) -> Result<Verdict, OracleError>;
}
