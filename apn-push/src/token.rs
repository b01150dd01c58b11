//! Device token parsing.

use std::fmt;
use std::str::FromStr;

use crate::{PushError, Result};

/// Length of a device token in raw bytes.
pub const TOKEN_LEN: usize = 32;

/// A validated 32-byte device token.
///
/// Tokens arrive as 64 hex digits, often in the `<2589b1aa 363d23d8 ...>`
/// form iOS prints them in. Everything that is not a hex digit is stripped
/// before decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceToken([u8; TOKEN_LEN]);

impl DeviceToken {
    /// Parse a token from its hex representation.
    pub fn parse(input: &str) -> Result<Self> {
        let hex_digits = normalize(input);
        let decoded = hex::decode(&hex_digits)
            .map_err(|e| PushError::InvalidToken(format!("{input:?}: {e}")))?;

        let bytes: [u8; TOKEN_LEN] = decoded.try_into().map_err(|raw: Vec<u8>| {
            PushError::InvalidToken(format!(
                "{input:?}: expected {TOKEN_LEN} bytes, got {}",
                raw.len()
            ))
        })?;

        Ok(Self(bytes))
    }

    /// Build a token from raw bytes.
    pub fn from_bytes(bytes: [u8; TOKEN_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw token bytes as written to the wire.
    pub fn as_bytes(&self) -> &[u8; TOKEN_LEN] {
        &self.0
    }

    /// Lowercase hex representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for DeviceToken {
    type Err = PushError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for DeviceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Strip separators and lowercase a token string.
pub fn normalize(input: &str) -> String {
    input
        .chars()
        .filter(char::is_ascii_hexdigit)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
