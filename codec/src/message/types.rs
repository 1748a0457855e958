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

//! Field types shared by several messages

use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of a network session key in bytes
pub const NWK_SESSION_KEY_LEN: usize = 16;

/// Per-subpacket reception diagnostics of a telegram split radio burst.
///
/// All vectors are indexed by subpacket number and have equal length.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Subpackets {
    /// Signal to noise ratio per subpacket in dB
    pub snr: Vec<f64>,
    /// Signal strength per subpacket in dBm
    pub rssi: Vec<f64>,
    /// Frequency offset per subpacket in Hz
    pub frequency: Vec<i64>,
}

impl Subpackets {
    /// Number of subpackets described
    pub fn len(&self) -> usize {
        self.snr.len()
    }

    /// Check if no subpackets are described
    pub fn is_empty(&self) -> bool {
        self.snr.is_empty()
    }
}

/// Geographic position of a basestation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoLocation {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
    /// Altitude in meters
    pub alt: f64,
}

/// Outcome of a queued downlink as reported by the basestation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownlinkResultCode {
    /// Transmitted to the endnode
    #[default]
    Sent,
    /// Dropped because its transmission window passed
    Expired,
    /// Rejected as not transmittable
    Invalid,
}

impl DownlinkResultCode {
    /// Get the wire name
    pub fn as_str(self) -> &'static str {
        match self {
            DownlinkResultCode::Sent => "sent",
            DownlinkResultCode::Expired => "expired",
            DownlinkResultCode::Invalid => "invalid",
        }
    }
}

impl fmt::Display for DownlinkResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
