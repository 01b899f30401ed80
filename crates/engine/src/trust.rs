//! Participant reputation.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use gigledger_core::WalletAddress;
use gigledger_infra::config::TrustPolicy;
use gigledger_infra::{Datastore, StoreError};
use gigledger_marketplace::{TrustScore, User};

use crate::error::{EngineError, EngineResult};

/// Reads and adjusts trust scores, creating participants on first contact.
pub struct TrustScoreLedger {
    store: Arc<dyn Datastore>,
    policy: TrustPolicy,
}

impl TrustScoreLedger {
    pub fn new(store: Arc<dyn Datastore>, policy: TrustPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn find_or_create(&self, address: &WalletAddress) -> EngineResult<User> {
        if let Some(user) = self.store.get_user(address).await? {
            return Ok(user);
        }
        let user = User::new(*address, TrustScore::new(self.policy.initial), Utc::now());
        match self.store.insert_user(&user).await {
            Ok(()) => {
                debug!(%address, "created participant");
                Ok(user)
            }
            // Lost a creation race; the other writer's record wins.
            Err(StoreError::AlreadyExists(_)) => self
                .store
                .get_user(address)
                .await?
                .ok_or_else(|| EngineError::not_found(format!("user {address}"))),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn score(&self, address: &WalletAddress) -> EngineResult<TrustScore> {
        Ok(self.find_or_create(address).await?.trust_score)
    }

    /// Apply a clamped delta atomically.
    pub async fn adjust(&self, address: &WalletAddress, delta: i32) -> EngineResult<User> {
        self.find_or_create(address).await?;
        let user = self
            .store
            .adjust_trust_score(address, delta, Utc::now())
            .await?
            .ok_or_else(|| EngineError::not_found(format!("user {address}")))?;
        info!(%address, delta, score = %user.trust_score, "trust score adjusted");
        Ok(user)
    }

    pub async fn reward_approval(&self, address: &WalletAddress) -> EngineResult<User> {
        self.adjust(address, self.policy.on_approved).await
    }

    pub async fn penalize_cheating(&self, address: &WalletAddress) -> EngineResult<User> {
        self.adjust(address, self.policy.on_cheated).await
    }
}
