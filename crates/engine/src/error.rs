//! Engine error model.
//!
//! Every public operation returns [`EngineError`]; [`EngineError::kind`] is the
//! stable, machine-readable classification callers map to responses.

use serde::Serialize;

use gigledger_core::DomainError;
use gigledger_infra::{LedgerError, OracleError, StoreError};

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The record is not in a status that allows the operation, or another writer won.
    #[error("state conflict: {0}")]
    StateConflict(String),

    #[error("trust score too low: required {required}, actual {actual}")]
    InsufficientTrustScore { required: u8, actual: u8 },

    /// Ledger or oracle failure.
    #[error("external service error: {0}")]
    ExternalService(String),

    /// A bounded retry budget ran out.
    #[error("exhausted: {0}")]
    Exhausted(String),

    #[error("storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authorization,
    NotFound,
    StateConflict,
    InsufficientTrustScore,
    ExternalService,
    Exhausted,
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Authorization => "authorization",
            ErrorKind::NotFound => "not_found",
            ErrorKind::StateConflict => "state_conflict",
            ErrorKind::InsufficientTrustScore => "insufficient_trust_score",
            ErrorKind::ExternalService => "external_service",
            ErrorKind::Exhausted => "exhausted",
            ErrorKind::Storage => "storage",
        }
    }
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::Unauthorized(_) => ErrorKind::Authorization,
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::StateConflict(_) => ErrorKind::StateConflict,
            EngineError::InsufficientTrustScore { .. } => ErrorKind::InsufficientTrustScore,
            EngineError::ExternalService(_) => ErrorKind::ExternalService,
            EngineError::Exhausted(_) => ErrorKind::Exhausted,
            EngineError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn not_found(what: impl core::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    pub(crate) fn conflict(msg: impl Into<String>) -> Self {
        Self::StateConflict(msg.into())
    }
}

impl From<DomainError> for EngineError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => EngineError::Validation(msg),
            DomainError::Conflict(msg) => EngineError::StateConflict(msg),
            DomainError::Unauthorized(msg) => EngineError::Unauthorized(msg),
            DomainError::InsufficientTrustScore { required, actual } => {
                EngineError::InsufficientTrustScore { required, actual }
            }
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists(msg) => EngineError::StateConflict(msg),
            StoreError::NotFound(msg) => EngineError::NotFound(msg),
            StoreError::Corrupt(msg) | StoreError::Storage(msg) => EngineError::Storage(msg),
        }
    }
}

impl From<LedgerError> for EngineError {
    fn from(err: LedgerError) -> Self {
        EngineError::ExternalService(err.to_string())
    }
}

impl From<OracleError> for EngineError {
    fn from(err: OracleError) -> Self {
        EngineError::ExternalService(err.to_string())
    }
}
