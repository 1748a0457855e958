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

//! Basestation status polling

use super::types::GeoLocation;

bssci_message! {
    /// Status request
    pub struct Status = "status" {}
}

bssci_message! {
    /// Status report of the basestation
    pub struct StatusRsp = "statusRsp" {
        /// Status code, zero when healthy
        code: u32 = "code",
        /// Status description
        message: String = "message",
        /// Basestation time in ns since the epoch
        time: u64 = "time",
        /// Transmit duty cycle usage, 0.0 to 1.0
        duty_cycle: f64 = "dutyCycle",
        /// Uptime in seconds
        uptime: u64 = "uptime",
    }
    optional {
        /// Basestation position
        geo_location: GeoLocation = "geoLocation",
        /// Temperature in degrees Celsius
        temp: f64 = "temp",
        /// CPU load, 0.0 to 1.0
        cpu_load: f64 = "cpuLoad",
        /// Memory load, 0.0 to 1.0
        mem_load: f64 = "memLoad",
    }
}

bssci_message! {
    /// Status complete
    pub struct StatusCmp = "statusCmp" {}
}

server_issued!(Status);
