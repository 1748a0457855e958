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

//! Event sink writing every event to the log

use async_trait::async_trait;
use bssci_codec::{BasestationEvent, EndnodeEvent, Eui64, Message};
use bssci_service::{EventSink, SinkError};
use tracing::info;

/// Accepts every event and logs it
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSink;

#[async_trait]
impl EventSink for LoggingSink {
    fn on_subscription(&self, subscribe: bool, bs_eui: Eui64) {
        if subscribe {
            info!(bs_eui = %bs_eui, "Basestation subscribed");
        } else {
            info!(bs_eui = %bs_eui, "Basestation unsubscribed");
        }
    }

    async fn basestation_event(&self, event: BasestationEvent) -> Result<(), SinkError> {
        info!(
            bs_eui = %event.bs_eui,
            event_type = %event.event_type,
            op_id = event.op_id,
            "Basestation event"
        );
        Ok(())
    }

    async fn endnode_event(&self, event: EndnodeEvent) -> Result<(), SinkError> {
        info!(
            bs_eui = %event.bs_eui,
            ep_eui = %event.ep_eui,
            event_type = %event.event_type,
            op_id = event.op_id,
            payload = %payload_hex(&event.message),
            "Endnode event"
        );
        Ok(())
    }
}

/// Hex dump of the user data an event carries, empty if none
fn payload_hex(message: &Message) -> String {
    match message {
        Message::UplinkData(uplink) => hex::encode(&uplink.user_data),
        Message::VmUplinkData(uplink) => hex::encode(&uplink.user_data),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bssci_codec::{Attach, IntoEvent, UplinkData};
    use bytes::Bytes;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn test_uplink_is_logged_with_payload() {
        let event = UplinkData {
            op_id: 3,
            ep_eui: Eui64::from_u64(0x10),
            user_data: Bytes::from_static(&[0xde, 0xad]),
            ..Default::default()
        }
        .into_event(Eui64::from_u64(1));

        assert_eq!(LoggingSink.event(event).await, Ok(()));
        assert!(logs_contain("Endnode event"));
        assert!(logs_contain("dead"));
    }

    #[tokio::test]
    async fn test_attach_has_no_payload() {
        let event = Attach {
            op_id: 4,
            ep_eui: Eui64::from_u64(0x11),
            ..Default::default()
        }
        .into_event(Eui64::from_u64(1));

        match event {
            bssci_codec::Event::Endnode(event) => assert_eq!(payload_hex(&event.message), ""),
            other => panic!("unexpected {:?}", other),
        }
    }
}
