//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;

use alloy_primitives::{hex, Address, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a job record (off-chain primary key).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

/// Identifier of a submission record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(Uuid);

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered), so ids sort in creation order.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

impl_uuid_newtype!(JobId, "JobId");
impl_uuid_newtype!(SubmissionId, "SubmissionId");

/// 256-bit identifier shared with the escrow ledger.
///
/// Never zero. Rendered as a base-10 string everywhere it leaves the process.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContractJobId(U256);

impl ContractJobId {
    /// Build from 32 big-endian bytes. Returns `None` for the all-zero value.
    pub fn from_be_bytes(bytes: [u8; 32]) -> Option<Self> {
        let value = U256::from_be_bytes(bytes);
        if value.is_zero() { None } else { Some(Self(value)) }
    }

    pub fn from_u256(value: U256) -> Result<Self, DomainError> {
        if value.is_zero() {
            return Err(DomainError::invalid_id("ContractJobId: zero is reserved"));
        }
        Ok(Self(value))
    }

    pub fn as_u256(&self) -> U256 {
        self.0
    }
}

impl From<u64> for ContractJobId {
    /// Zero maps to one, matching the allocator's "never zero" rule.
    fn from(value: u64) -> Self {
        Self(U256::from(value.max(1)))
    }
}

impl core::fmt::Display for ContractJobId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for ContractJobId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = parse_decimal_u256(s)
            .map_err(|e| DomainError::invalid_id(format!("ContractJobId: {e}")))?;
        Self::from_u256(value)
    }
}

impl Serialize for ContractJobId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContractJobId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Parse a strictly decimal (digits only) 256-bit unsigned integer.
pub(crate) fn parse_decimal_u256(s: &str) -> Result<U256, String> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("'{s}' is not a decimal integer"));
    }
    U256::from_str_radix(s, 10).map_err(|e| e.to_string())
}

/// Wallet address of a participant.
///
/// Parsing is case-insensitive; the canonical form is lower-case `0x`-prefixed hex,
/// so equality never depends on checksum casing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WalletAddress(Address);

impl WalletAddress {
    pub fn from_address(address: Address) -> Self {
        Self(address)
    }

    pub fn as_address(&self) -> Address {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == Address::ZERO
    }
}

impl core::fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0.as_slice()))
    }
}

impl FromStr for WalletAddress {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let body = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| DomainError::validation(format!("address '{s}' must start with 0x")))?;
        if body.len() != 40 || !body.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(DomainError::validation(format!(
                "address '{s}' must be 40 hex characters"
            )));
        }
        let bytes = hex::decode(body.to_ascii_lowercase())
            .map_err(|e| DomainError::validation(format!("address '{s}': {e}")))?;
        Ok(Self(Address::from_slice(&bytes)))
    }
}

impl Serialize for WalletAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WalletAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Hash of a submitted ledger transaction, as reported by the ledger client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionHash(pub String);

impl core::fmt::Display for TransactionHash {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_parsing_is_case_insensitive() {
        let lower: WalletAddress = "0xabcdef0123456789abcdef0123456789abcdef01".parse().unwrap();
        let mixed: WalletAddress = "0xABCDEF0123456789abcdef0123456789ABCDEF01".parse().unwrap();
        assert_eq!(lower, mixed);
        assert_eq!(mixed.to_string(), "0xabcdef0123456789abcdef0123456789abcdef01");
    }

    #[test]
    fn address_rejects_malformed_input() {
        assert!("abcdef0123456789abcdef0123456789abcdef01".parse::<WalletAddress>().is_err());
        assert!("0x1234".parse::<WalletAddress>().is_err());
        assert!("0xzzcdef0123456789abcdef0123456789abcdef01".parse::<WalletAddress>().is_err());
    }

    #[test]
    fn contract_job_id_round_trips_as_decimal_string() {
        let id: ContractJobId =
            "115792089237316195423570985008687907853269984665640564039457584007913129639935"
                .parse()
                .unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(
            json,
            "\"115792089237316195423570985008687907853269984665640564039457584007913129639935\""
        );
        let back: ContractJobId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn contract_job_id_rejects_zero_and_hex() {
        assert!("0".parse::<ContractJobId>().is_err());
        assert!("0x10".parse::<ContractJobId>().is_err());
        assert!(ContractJobId::from_be_bytes([0u8; 32]).is_none());
        assert_eq!(ContractJobId::from(0u64).to_string(), "1");
    }
}
