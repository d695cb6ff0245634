//! Pool and prediction identifiers
//!
//! Identifiers are 16 raw bytes on the ledger and UUID-shaped hex strings
//! everywhere else.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

use crate::error::{ClientError, Result};

pub const IDENTIFIER_LEN: usize = 16;

const SEPARATOR: char = '-';

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, BorshSerialize, BorshDeserialize)]
pub struct Identifier([u8; IDENTIFIER_LEN]);

impl Identifier {
    /// Parse a hex identifier, ignoring separators
    pub fn encode(input: &str) -> Result<Self> {
        let cleaned: String = input.chars().filter(|c| *c != SEPARATOR).collect();
        let bytes = hex::decode(&cleaned).map_err(|e| ClientError::MalformedIdentifier {
            input: input.to_string(),
            reason: e.to_string(),
        })?;

        let bytes: [u8; IDENTIFIER_LEN] =
            bytes
                .as_slice()
                .try_into()
                .map_err(|_| ClientError::MalformedIdentifier {
                    input: input.to_string(),
                    reason: format!(
                        "expected {} bytes, got {}",
                        IDENTIFIER_LEN,
                        bytes.len()
                    ),
                })?;

        Ok(Self(bytes))
    }

    /// Canonical hyphenated form, e.g. `b9cdc74e-c59a-4dbc-8006-c3e326040815`
    pub fn decode(&self) -> String {
        let hex = hex::encode(self.0);
        format!(
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        )
    }

    /// Hex form without separators
    pub fn simple(&self) -> String {
        hex::encode(self.0)
    }

    /// Fresh random identifier for a new pool or prediction
    pub fn generate() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    pub const fn from_bytes(bytes: [u8; IDENTIFIER_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; IDENTIFIER_LEN] {
        &self.0
    }

    pub fn to_bytes(self) -> [u8; IDENTIFIER_LEN] {
        self.0
    }
}

impl FromStr for Identifier {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        Self::encode(s)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.decode())
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self.decode())
    }
}

impl From<[u8; IDENTIFIER_LEN]> for Identifier {
    fn from(bytes: [u8; IDENTIFIER_LEN]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Identifier {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Identifier {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.decode())
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = <String as Deserialize>::deserialize(deserializer)?;
        Identifier::encode(&s).map_err(serde::de::Error::custom)
    }
}
