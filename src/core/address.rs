//! EVM Addresses
//!
//! 20-byte account identifiers as seen by the game contract.
//! Always rendered lowercase so they can be used directly as store keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// On-chain room identifier.
pub type RoomId = u64;

/// On-chain day counter within a room.
pub type DayCount = u64;

/// 20-byte account address.
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; 20]);

/// Address parsing errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AddressError {
    /// Not valid hex.
    #[error("address is not valid hex: {0}")]
    InvalidHex(String),
    /// Wrong byte length.
    #[error("address must be 20 bytes, got {0}")]
    InvalidLength(usize),
}

impl Address {
    /// The zero address (used by the contract as "unset").
    pub const ZERO: Address = Address([0; 20]);

    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Take the trailing 20 bytes of a 32-byte ABI word.
    pub fn from_word(word: &[u8; 32]) -> Self {
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&word[12..]);
        Self(bytes)
    }

    /// Left-pad into a 32-byte ABI word.
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// True for the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 20]
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes = hex::decode(digits).map_err(|_| AddressError::InvalidHex(s.to_string()))?;
        if bytes.len() != 20 {
            return Err(AddressError::InvalidLength(bytes.len()));
        }
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        let upper: Address = "0xABCDEF0123456789ABCDEF0123456789ABCDEF01".parse().unwrap();
        let lower: Address = "abcdef0123456789abcdef0123456789abcdef01".parse().unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.to_string(), "0xabcdef0123456789abcdef0123456789abcdef01");
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!("0x1234".parse::<Address>(), Err(AddressError::InvalidLength(2))));
        assert!(matches!("0xzz".parse::<Address>(), Err(AddressError::InvalidHex(_))));
    }

    #[test]
    fn test_word_conversion() {
        let addr = Address::new([7; 20]);
        let word = addr.to_word();
        assert_eq!(&word[..12], &[0u8; 12]);
        assert_eq!(Address::from_word(&word), addr);
    }

    #[test]
    fn test_serde_lowercases() {
        let addr: Address = "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA".parse().unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
