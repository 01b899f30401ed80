use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gigledger_core::{DomainError, DomainResult, WalletAddress};

pub const MAX_USERNAME_LEN: usize = 20;

/// Bounded reputation score in `[0, 100]`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrustScore(u8);

impl TrustScore {
    pub const MIN: TrustScore = TrustScore(0);
    pub const MAX: TrustScore = TrustScore(100);

    /// Values above the maximum are clamped.
    pub fn new(value: u8) -> Self {
        Self(value.min(Self::MAX.0))
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// `clamp(score + delta, MIN, MAX)`.
    pub fn apply(self, delta: i32) -> Self {
        let next = i64::from(self.0) + i64::from(delta);
        let clamped = next.clamp(i64::from(Self::MIN.0), i64::from(Self::MAX.0));
        Self(clamped as u8)
    }

    pub fn meets(&self, required: TrustScore) -> bool {
        self.0 >= required.0
    }
}

impl core::fmt::Display for TrustScore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Marketplace participant, keyed by wallet address. Created lazily.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub address: WalletAddress,
    pub username: String,
    pub avatar: Option<String>,
    pub trust_score: TrustScore,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(address: WalletAddress, initial_score: TrustScore, now: DateTime<Utc>) -> Self {
        Self {
            username: default_username(&address),
            address,
            avatar: None,
            trust_score: initial_score,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn adjust_trust(&mut self, delta: i32, now: DateTime<Utc>) {
        self.trust_score = self.trust_score.apply(delta);
        self.updated_at = now;
    }

    pub fn rename(&mut self, username: &str, now: DateTime<Utc>) -> DomainResult<()> {
        validate_username(username)?;
        self.username = username.to_string();
        self.updated_at = now;
        Ok(())
    }

    pub fn set_avatar(&mut self, avatar: Option<String>, now: DateTime<Utc>) {
        self.avatar = avatar.filter(|a| !a.trim().is_empty());
        self.updated_at = now;
    }
}

/// `user-` followed by the first eight hex digits of the address.
pub fn default_username(address: &WalletAddress) -> String {
    let hex = address.to_string();
    format!("user-{}", &hex[2..10])
}

/// Generated names may repeat across addresses; chosen names are alphanumeric and
/// unique.
pub fn is_default_username(username: &str) -> bool {
    username.starts_with("user-")
}

pub fn validate_username(username: &str) -> DomainResult<()> {
    if username.is_empty() {
        return Err(DomainError::validation("username is required"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(DomainError::validation(format!(
            "username must be at most {MAX_USERNAME_LEN} characters"
        )));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(DomainError::validation("username must be alphanumeric"));
    }
    Ok(())
}
