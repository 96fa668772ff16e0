use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A 20-byte account or contract address.
///
/// Parsed from `0x` followed by 40 hex digits. Comparison is on the raw
/// bytes, so checksummed and lower-case spellings are equal. Displays
/// lower-case with the `0x` prefix.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 20]);

/// Errors produced when parsing an [`Address`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("address {0:?} is missing the 0x prefix")]
    MissingPrefix(String),

    #[error("address {value:?} has {len} hex digits, expected 40")]
    WrongLength { value: String, len: usize },

    #[error("address {0:?} is not valid hex")]
    InvalidHex(String),
}

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Abbreviated form used in headers: `0x1234...abcd`.
    pub fn short(&self) -> String {
        let full = self.to_string();
        format!("{}...{}", &full[..6], &full[full.len() - 4..])
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| AddressError::MissingPrefix(s.to_owned()))?;

        if digits.len() != 40 {
            return Err(AddressError::WrongLength {
                value: s.to_owned(),
                len: digits.len(),
            });
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|_| AddressError::InvalidHex(s.to_owned()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}
