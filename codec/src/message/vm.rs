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

//! Variable MAC message family

use super::types::Subpackets;
use bytes::Bytes;

bssci_message! {
    /// Activate a variable MAC type on the basestation
    pub struct VmActivate = "vm.activate" {
        /// MAC type to activate
        mac_type: i64 = "macType",
    }
}

bssci_message! {
    /// Variable MAC activate response
    pub struct VmActivateRsp = "vm.activateRsp" {}
}

bssci_message! {
    /// Variable MAC activate complete
    pub struct VmActivateCmp = "vm.activateCmp" {}
}

bssci_message! {
    /// Deactivate a variable MAC type on the basestation
    pub struct VmDeactivate = "vm.deactivate" {
        /// MAC type to deactivate
        mac_type: i64 = "macType",
    }
}

bssci_message! {
    /// Variable MAC deactivate response
    pub struct VmDeactivateRsp = "vm.deactivateRsp" {}
}

bssci_message! {
    /// Variable MAC deactivate complete
    pub struct VmDeactivateCmp = "vm.deactivateCmp" {}
}

bssci_message! {
    /// Query the active variable MAC types
    pub struct VmStatus = "vm.status" {}
}

bssci_message! {
    /// Variable MAC status response
    pub struct VmStatusRsp = "vm.statusRsp" {
        /// Currently active MAC types
        mac_types: Vec<i64> = "macTypes",
    }
}

bssci_message! {
    /// Variable MAC status complete
    pub struct VmStatusCmp = "vm.statusCmp" {}
}

bssci_message! {
    /// Variable MAC uplink data, passed through without endnode context
    pub struct VmUplinkData = "vm.ulData" {
        /// MAC type of the received burst
        mac_type: i64 = "macType",
        /// Raw payload
        user_data: Bytes = "userData",
        /// Transceiver time of reception in ns
        trx_time: u64 = "trxTime",
        /// Basestation system time of reception in ns since the epoch
        sys_time: u64 = "sysTime",
        /// Frequency offset in Hz
        freq_off: f64 = "freqOff",
        /// Signal to noise ratio in dB
        snr: f64 = "snr",
        /// Signal strength in dBm
        rssi: f64 = "rssi",
    }
    optional {
        /// Equivalent signal to noise ratio in dB
        eq_snr: f64 = "eqSnr",
        /// Per-subpacket diagnostics
        subpackets: Subpackets = "subpackets",
    }
}

bssci_message! {
    /// Variable MAC uplink response
    pub struct VmUplinkDataRsp = "vm.ulDataRsp" {}
}

bssci_message! {
    /// Variable MAC uplink complete
    pub struct VmUplinkDataCmp = "vm.ulDataCmp" {}
}

server_issued!(VmActivate, VmDeactivate, VmStatus);
