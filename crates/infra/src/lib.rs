//! Infrastructure layer: datastore, escrow ledger and verification oracle clients,
//! configuration.

pub mod config;
pub mod ledger;
pub mod oracle;
pub mod store;

pub use config::AppConfig;
pub use ledger::{InMemoryLedger, LedgerClient, LedgerError};
pub use oracle::{GeminiOracle, OracleError, VerificationOracle};
pub use store::{
    Datastore, InMemoryDatastore, JobFilter, Page, PostgresDatastore, SortOrder, StoreError,
    StoreResult, SubmissionFilter,
};
