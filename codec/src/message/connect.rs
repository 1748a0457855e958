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

//! Session level messages: connect, ping and protocol errors

use super::types::GeoLocation;
use crate::Eui64;
use uuid::Uuid;

bssci_message! {
    /// Connection request, the first frame a basestation sends on a new socket.
    pub struct Connect = "con" {
        /// Protocol version spoken by the basestation
        version: String = "version",
        /// Basestation identity
        bs_eui: Eui64 = "bsEui",
        /// Basestation supports downlink
        bidi: bool = "bidi",
    }
    optional {
        /// Basestation vendor
        vendor: String = "vendor",
        /// Basestation model
        model: String = "model",
        /// Basestation name
        name: String = "name",
        /// Basestation software version
        sw_version: String = "swVersion",
        /// Basestation position
        geo_location: GeoLocation = "geoLocation",
        /// Basestation session UUID
        sn_bs_uuid: Uuid = "snBsUuid",
        /// Service center session UUID the basestation last knew
        sn_sc_uuid: Uuid = "snScUuid",
        /// Last service center operation id the basestation saw
        sn_sc_op_id: i64 = "snScOpId",
    }
}

bssci_message! {
    /// Connection response
    pub struct ConnectRsp = "conRsp" {
        /// Protocol version spoken by the service center
        version: String = "version",
        /// Previous session is resumed
        sn_resume: bool = "snResume",
        /// Service center session UUID
        sn_sc_uuid: Uuid = "snScUuid",
    }
}

bssci_message! {
    /// Connection complete
    pub struct ConnectCmp = "conCmp" {}
}

bssci_message! {
    /// Keep alive request, sent by either side
    pub struct Ping = "ping" {}
}

bssci_message! {
    /// Keep alive response
    pub struct PingRsp = "pingRsp" {}
}

bssci_message! {
    /// Keep alive complete
    pub struct PingCmp = "pingCmp" {}
}

bssci_message! {
    /// Protocol error report, answers an operation that could not be carried out.
    pub struct ProtocolError = "error" {
        /// Error code
        code: u32 = "code",
        /// Human readable description
        message: String = "message",
    }
}

bssci_message! {
    /// Protocol error acknowledge
    pub struct ErrorAck = "errorAck" {}
}

server_issued!(Ping, ProtocolError);

impl ProtocolError {
    /// Create an error report answering the operation `op_id`
    pub fn new(op_id: i64, code: u32, message: impl Into<String>) -> Self {
        Self {
            op_id,
            code,
            message: message.into(),
        }
    }
}
