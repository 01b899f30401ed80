//! Domain error model.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Failures decided by the marketplace rules alone, before any store or ledger is
/// involved. Missing records are reported by the layer that looked them up.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or out-of-range input.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The record's lifecycle status does not allow the operation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The caller is not the party entitled to act on the record.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("trust score too low: required {required}, actual {actual}")]
    InsufficientTrustScore { required: u8, actual: u8 },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Stable machine-readable kind, shared with the engine's error kinds.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::InvalidId(_) => "validation",
            Self::Conflict(_) => "state_conflict",
            Self::Unauthorized(_) => "authorization",
            Self::InsufficientTrustScore { .. } => "insufficient_trust_score",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(DomainError::invalid_id("0x").kind(), "validation");
        assert_eq!(
            DomainError::InsufficientTrustScore { required: 60, actual: 50 }.to_string(),
            "trust score too low: required 60, actual 50"
        );
        assert_eq!(DomainError::conflict("job is Done").kind(), "state_conflict");
    }
}
