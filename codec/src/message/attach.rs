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

//! Endnode attachment: over-the-air attach/detach and their propagated forms

use super::types::{NWK_SESSION_KEY_LEN, Subpackets};
use crate::Eui64;
use bytes::Bytes;

bssci_message! {
    /// Over-the-air attachment request of an endnode
    pub struct Attach = "att" {
        /// Endnode identity
        ep_eui: Eui64 = "epEui",
        /// Reception time in ns since the epoch
        rx_time: u64 = "rxTime",
        /// Endnode attachment counter
        attach_cnt: u32 = "attachCnt",
        /// Signal to noise ratio in dB
        snr: f64 = "snr",
        /// Signal strength in dBm
        rssi: f64 = "rssi",
        /// Attachment nonce
        nonce: Bytes = "nonce",
        /// Attachment signature
        sign: Bytes = "sign",
        /// Endnode uses dual channel mode
        dual_chan: bool = "dualChan",
        /// Endnode uses DL repetition
        repetition: bool = "repetition",
        /// Endnode uses wide carrier offset
        wide_carr_off: bool = "wideCarrOff",
        /// Endnode uses long block distance
        long_blk_dist: bool = "longBlkDist",
    }
    optional {
        /// Reception duration in ns
        rx_duration: u64 = "rxDuration",
        /// Equivalent signal to noise ratio in dB
        eq_snr: f64 = "eqSnr",
        /// Per-subpacket diagnostics
        subpackets: Subpackets = "subpackets",
        /// Radio profile name
        profile: String = "profile",
        /// Short address the endnode asked for
        sh_addr: u16 = "shAddr",
    }
}

bssci_message! {
    /// Attachment response, produced upstream after verifying the request
    pub struct AttachRsp = "attRsp" {
        /// Network session key, always 16 bytes
        nwk_session_key: Bytes = "nwkSessionKey",
        /// Assigned short address
        sh_addr: u16 = "shAddr",
    }
}

bssci_message! {
    /// Attachment complete
    pub struct AttachCmp = "attCmp" {}
}

bssci_message! {
    /// Over-the-air detachment request of an endnode
    pub struct Detach = "det" {
        /// Endnode identity
        ep_eui: Eui64 = "epEui",
        /// Detachment signature
        sign: Bytes = "sign",
    }
}

bssci_message! {
    /// Detachment response
    pub struct DetachRsp = "detRsp" {
        /// Response signature
        sign: Bytes = "sign",
    }
}

bssci_message! {
    /// Detachment complete
    pub struct DetachCmp = "detCmp" {}
}

bssci_message! {
    /// Attachment propagated by the service center, attaches an endnode
    /// without an over-the-air exchange.
    pub struct AttachPropagate = "attPrp" {
        /// Endnode identity
        ep_eui: Eui64 = "epEui",
        /// Endnode supports downlink
        bidi: bool = "bidi",
        /// Network session key, always 16 bytes
        nwk_session_key: Bytes = "nwkSessionKey",
        /// Short address
        sh_addr: u16 = "shAddr",
        /// Last known uplink packet counter
        last_packet_cnt: u32 = "lastPacketCnt",
        /// Endnode uses dual channel mode
        dual_chan: bool = "dualChan",
        /// Endnode uses DL repetition
        repetition: bool = "repetition",
        /// Endnode uses wide carrier offset
        wide_carr_off: bool = "wideCarrOff",
        /// Endnode uses long block distance
        long_blk_dist: bool = "longBlkDist",
    }
}

bssci_message! {
    /// Attachment propagate response
    pub struct AttachPropagateRsp = "attPrpRsp" {}
}

bssci_message! {
    /// Attachment propagate complete
    pub struct AttachPropagateCmp = "attPrpCmp" {}
}

bssci_message! {
    /// Detachment propagated by the service center
    pub struct DetachPropagate = "detPrp" {
        /// Endnode identity
        ep_eui: Eui64 = "epEui",
    }
}

bssci_message! {
    /// Detachment propagate response
    pub struct DetachPropagateRsp = "detPrpRsp" {}
}

bssci_message! {
    /// Detachment propagate complete
    pub struct DetachPropagateCmp = "detPrpCmp" {}
}

server_issued!(AttachPropagate, DetachPropagate);

pub(crate) fn check_session_key(key: &Bytes) -> Result<(), String> {
    if key.len() != NWK_SESSION_KEY_LEN {
        return Err(format!(
            "nwkSessionKey must be {} bytes, got {}",
            NWK_SESSION_KEY_LEN,
            key.len()
        ));
    }
    Ok(())
}

impl AttachRsp {
    pub(crate) fn validate(&self) -> Result<(), String> {
        check_session_key(&self.nwk_session_key)
    }
}

impl AttachPropagate {
    pub(crate) fn validate(&self) -> Result<(), String> {
        check_session_key(&self.nwk_session_key)
    }
}
