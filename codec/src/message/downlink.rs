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

//! Downlink queueing, revocation and result reporting

use super::types::DownlinkResultCode;
use crate::Eui64;
use bytes::Bytes;

bssci_message! {
    /// Queue a downlink for an endnode
    pub struct DownlinkQueue = "dlDataQue" {
        /// Endnode identity
        ep_eui: Eui64 = "epEui",
        /// Queue id chosen by the service center
        que_id: u64 = "queId",
        /// Payload depends on the endnode packet counter
        cnt_depend: bool = "cntDepend",
        /// Payloads, one per packet counter when `cnt_depend` is set
        user_data: Vec<Bytes> = "userData",
    }
    optional {
        /// Packet counters matching `user_data`
        packet_cnt: Vec<u32> = "packetCnt",
        /// Payload format indicator
        format: u8 = "format",
        /// Priority, higher is more urgent
        prio: f64 = "prio",
        /// A response from the endnode is expected
        response_exp: bool = "responseExp",
        /// Request an additional downlink window
        dl_wind_req: bool = "dlWindReq",
        /// Only transmit if the endnode expects a response
        exp_only: bool = "expOnly",
    }
}

bssci_message! {
    /// Downlink queue response
    pub struct DownlinkQueueRsp = "dlDataQueRsp" {}
}

bssci_message! {
    /// Downlink queue complete
    pub struct DownlinkQueueCmp = "dlDataQueCmp" {}
}

bssci_message! {
    /// Revoke a queued downlink
    pub struct DownlinkRevoke = "dlDataRev" {
        /// Endnode identity
        ep_eui: Eui64 = "epEui",
        /// Queue id of the downlink to revoke
        que_id: u64 = "queId",
    }
}

bssci_message! {
    /// Downlink revoke response
    pub struct DownlinkRevokeRsp = "dlDataRevRsp" {}
}

bssci_message! {
    /// Downlink revoke complete
    pub struct DownlinkRevokeCmp = "dlDataRevCmp" {}
}

bssci_message! {
    /// Final outcome of a queued downlink.
    ///
    /// A `sent` result carries the transmission time and the packet counter
    /// used, `expired` and `invalid` results carry neither.
    pub struct DownlinkResult = "dlDataRes" {
        /// Endnode identity
        ep_eui: Eui64 = "epEui",
        /// Queue id of the downlink
        que_id: u64 = "queId",
        /// Outcome
        result: DownlinkResultCode = "result",
    }
    optional {
        /// Transmission time in ns since the epoch
        tx_time: u64 = "txTime",
        /// Packet counter the downlink was sent with
        packet_cnt: u32 = "packetCnt",
    }
}

bssci_message! {
    /// Downlink result response
    pub struct DownlinkResultRsp = "dlDataResRsp" {}
}

bssci_message! {
    /// Downlink result complete
    pub struct DownlinkResultCmp = "dlDataResCmp" {}
}

server_issued!(DownlinkQueue, DownlinkRevoke);

impl DownlinkResult {
    pub(crate) fn validate(&self) -> Result<(), String> {
        let has_tx_time = self.tx_time.is_some();
        let has_packet_cnt = self.packet_cnt.is_some();
        match self.result {
            DownlinkResultCode::Sent if !(has_tx_time && has_packet_cnt) => {
                Err("result 'sent' requires txTime and packetCnt".to_string())
            }
            DownlinkResultCode::Expired | DownlinkResultCode::Invalid
                if has_tx_time || has_packet_cnt =>
            {
                Err(format!(
                    "result '{}' must not carry txTime or packetCnt",
                    self.result
                ))
            }
            _ => Ok(()),
        }
    }
}
