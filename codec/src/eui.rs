//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! 64-bit Extended Unique Identifier

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// An 8-byte big-endian identifier used for basestations and endnodes.
///
/// On the wire an EUI64 travels as an unsigned 64-bit integer. For display and
/// configuration it is written as 16 lowercase hex digits.
///
/// # Example
///
/// ```
/// use bssci_codec::Eui64;
///
/// let eui: Eui64 = "70b3d59cd0000022".parse().unwrap();
/// assert_eq!(eui.as_u64(), 0x70b3_d59c_d000_0022);
/// assert_eq!(eui.to_string(), "70b3d59cd0000022");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Eui64([u8; 8]);

impl Eui64 {
    /// Create an EUI64 from its big-endian bytes
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Create an EUI64 from its integer representation
    pub const fn from_u64(value: u64) -> Self {
        Self(value.to_be_bytes())
    }

    /// Get the integer representation
    pub const fn as_u64(&self) -> u64 {
        u64::from_be_bytes(self.0)
    }

    /// Get the big-endian bytes
    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Render as 16 lowercase hex digits
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<u64> for Eui64 {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl From<Eui64> for u64 {
    fn from(value: Eui64) -> Self {
        value.as_u64()
    }
}

impl From<[u8; 8]> for Eui64 {
    fn from(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }
}

/// Error returned when parsing an EUI64 from text fails
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid EUI64 '{input}': {reason}")]
pub struct ParseEuiError {
    input: String,
    reason: &'static str,
}

impl FromStr for Eui64 {
    type Err = ParseEuiError;

    /// Accepts 16 hex digits, optionally grouped with `-` or `:` separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s.chars().filter(|c| *c != '-' && *c != ':').collect();
        if digits.len() != 16 {
            return Err(ParseEuiError {
                input: s.to_string(),
                reason: "expected 16 hex digits",
            });
        }
        let mut bytes = [0u8; 8];
        hex::decode_to_slice(&digits, &mut bytes).map_err(|_| ParseEuiError {
            input: s.to_string(),
            reason: "not a hex string",
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Eui64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Eui64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Eui64({})", self.to_hex())
    }
}

impl fmt::LowerHex for Eui64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.as_u64(), f)
    }
}

impl Serialize for Eui64 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.as_u64())
    }
}

impl<'de> Deserialize<'de> for Eui64 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u64::deserialize(deserializer).map(Self::from_u64)
    }
}
