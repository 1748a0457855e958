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

//! Endnode uplink data and downlink reception reports

use super::types::Subpackets;
use crate::Eui64;
use bytes::Bytes;

bssci_message! {
    /// Uplink data received from an endnode
    pub struct UplinkData = "ulData" {
        /// Endnode identity
        ep_eui: Eui64 = "epEui",
        /// Reception time in ns since the epoch
        rx_time: u64 = "rxTime",
        /// Endnode packet counter
        packet_cnt: u32 = "packetCnt",
        /// Signal to noise ratio in dB
        snr: f64 = "snr",
        /// Signal strength in dBm
        rssi: f64 = "rssi",
        /// Decrypted application payload
        user_data: Bytes = "userData",
        /// A downlink window is open after this uplink
        dl_open: bool = "dlOpen",
        /// Endnode expects a response in the downlink window
        response_exp: bool = "responseExp",
        /// Endnode acknowledges the last downlink
        dl_ack: bool = "dlAck",
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
        /// Payload format indicator
        format: u8 = "format",
    }
}

bssci_message! {
    /// Uplink data response
    pub struct UplinkDataRsp = "ulDataRsp" {}
}

bssci_message! {
    /// Uplink data complete
    pub struct UplinkDataCmp = "ulDataCmp" {}
}

bssci_message! {
    /// Reception quality of a downlink as reported back by the endnode
    pub struct DownlinkRxStatus = "dlRxStat" {
        /// Endnode identity
        ep_eui: Eui64 = "epEui",
        /// Reception time in ns since the epoch
        rx_time: u64 = "rxTime",
        /// Endnode packet counter
        packet_cnt: u32 = "packetCnt",
        /// Downlink signal strength seen by the endnode in dBm
        dl_rx_rssi: f64 = "dlRxRssi",
        /// Downlink signal to noise ratio seen by the endnode in dB
        dl_rx_snr: f64 = "dlRxSnr",
    }
}

bssci_message! {
    /// Downlink reception status response
    pub struct DownlinkRxStatusRsp = "dlRxStatRsp" {}
}

bssci_message! {
    /// Downlink reception status complete
    pub struct DownlinkRxStatusCmp = "dlRxStatCmp" {}
}
