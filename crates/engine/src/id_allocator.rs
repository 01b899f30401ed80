//! Contract job id allocation: random 256-bit values, never zero, never reused.

use std::sync::Arc;

use tracing::debug;

use gigledger_core::ContractJobId;
use gigledger_infra::Datastore;

use crate::error::{EngineError, EngineResult};

/// Source of raw id bytes. Swappable so tests can force collisions.
pub trait IdSource: Send + Sync {
    fn next_bytes(&self) -> Result<[u8; 32], String>;
}

/// OS entropy.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandomIdSource;

impl IdSource for OsRandomIdSource {
    fn next_bytes(&self) -> Result<[u8; 32], String> {
        use rand::RngCore;
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| format!("OsRng failed: {e}"))?;
        Ok(bytes)
    }
}

pub struct IdAllocator {
    store: Arc<dyn Datastore>,
    source: Arc<dyn IdSource>,
    max_attempts: u32,
}

impl IdAllocator {
    pub fn new(store: Arc<dyn Datastore>, source: Arc<dyn IdSource>, max_attempts: u32) -> Self {
        Self { store, source, max_attempts: max_attempts.max(1) }
    }

    /// Draw until an unused, non-zero id comes up.
    pub async fn allocate(&self) -> EngineResult<ContractJobId> {
        for attempt in 1..=self.max_attempts {
            let bytes = self.source.next_bytes().map_err(EngineError::ExternalService)?;
            let Some(candidate) = ContractJobId::from_be_bytes(bytes) else {
                debug!(attempt, "drew zero contract job id");
                continue;
            };
            if self.store.get_job_by_contract_id(&candidate).await?.is_some() {
                debug!(attempt, contract_job_id = %candidate, "contract job id already taken");
                continue;
            }
            return Ok(candidate);
        }
        Err(EngineError::Exhausted(format!(
            "no unused contract job id after {} attempts",
            self.max_attempts
        )))
    }
}
