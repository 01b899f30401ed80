//! Username and avatar updates.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use gigledger_core::WalletAddress;
use gigledger_infra::{Datastore, StoreError};
use gigledger_marketplace::User;
use gigledger_marketplace::user::validate_username;

use crate::error::{EngineError, EngineResult};
use crate::trust::TrustScoreLedger;

pub struct UserProfiles {
    store: Arc<dyn Datastore>,
    trust: Arc<TrustScoreLedger>,
}

impl UserProfiles {
    pub fn new(store: Arc<dyn Datastore>, trust: Arc<TrustScoreLedger>) -> Self {
        Self { store, trust }
    }

    pub async fn get(&self, address: &WalletAddress) -> EngineResult<User> {
        self.trust.find_or_create(address).await
    }

    pub async fn update_username(&self, address: &WalletAddress, username: &str) -> EngineResult<User> {
        let username = username.trim();
        validate_username(username)?;
        if let Some(owner) = self.store.find_user_by_username(username).await? {
            if owner.address != *address {
                return Err(EngineError::conflict(format!("username '{username}' is taken")));
            }
            return Ok(owner);
        }
        let mut user = self.trust.find_or_create(address).await?;
        user.rename(username, Utc::now())?;
        // A concurrent rename can still take the name between the check and the write.
        self.store.update_user(&user).await.map_err(|e| match e {
            StoreError::AlreadyExists(_) => EngineError::conflict(format!("username '{username}' is taken")),
            other => other.into(),
        })?;
        info!(%address, username, "username updated");
        Ok(user)
    }

    pub async fn update_avatar(&self, address: &WalletAddress, avatar: Option<String>) -> EngineResult<User> {
        let mut user = self.trust.find_or_create(address).await?;
        user.set_avatar(avatar, Utc::now());
        self.store.update_user(&user).await?;
        Ok(user)
    }
}
