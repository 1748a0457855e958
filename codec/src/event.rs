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

//! Upstream events
//!
//! Inbound traffic is handed to the integration layer as events keyed by the
//! basestation EUI (and, for endnode traffic, the endnode EUI) plus a short
//! event type tag the integration can route on.

use crate::message::{
    Attach, Connect, Detach, DownlinkResult, DownlinkRxStatus, StatusRsp, UplinkData,
    VmActivateRsp, VmDeactivateRsp, VmStatusRsp, VmUplinkData,
};
use crate::{Eui64, Message};
use std::fmt;
use std::time::SystemTime;

/// Kind of an endnode-scoped event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndnodeEventType {
    /// Over-the-air attachment request
    Attach,
    /// Over-the-air detachment request
    Detach,
    /// Uplink data
    Uplink,
    /// Downlink reception status
    DownlinkRxStatus,
    /// Final downlink result
    DownlinkResult,
    /// A queued downlink was accepted by the basestation
    DownlinkQueued,
    /// A downlink revocation was accepted by the basestation
    DownlinkRevoked,
    /// A propagated attachment was accepted by the basestation
    AttachPropagated,
    /// A propagated detachment was accepted by the basestation
    DetachPropagated,
}

impl EndnodeEventType {
    /// Routing tag of the event type
    pub fn as_str(self) -> &'static str {
        match self {
            EndnodeEventType::Attach => "att",
            EndnodeEventType::Detach => "det",
            EndnodeEventType::Uplink => "ul",
            EndnodeEventType::DownlinkRxStatus => "dlRxStat",
            EndnodeEventType::DownlinkResult => "dlRes",
            EndnodeEventType::DownlinkQueued => "dlQue",
            EndnodeEventType::DownlinkRevoked => "dlRev",
            EndnodeEventType::AttachPropagated => "attPrp",
            EndnodeEventType::DetachPropagated => "detPrp",
        }
    }
}

impl fmt::Display for EndnodeEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a basestation-scoped event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasestationEventType {
    /// The basestation connected
    Connect,
    /// Status report
    Status,
    /// Variable MAC activation acknowledged
    VmActivate,
    /// Variable MAC deactivation acknowledged
    VmDeactivate,
    /// Variable MAC status report
    VmStatus,
    /// Variable MAC uplink data
    VmUplink,
}

impl BasestationEventType {
    /// Routing tag of the event type
    pub fn as_str(self) -> &'static str {
        match self {
            BasestationEventType::Connect => "con",
            BasestationEventType::Status => "status",
            BasestationEventType::VmActivate => "vmActivate",
            BasestationEventType::VmDeactivate => "vmDeactivate",
            BasestationEventType::VmStatus => "vmStatus",
            BasestationEventType::VmUplink => "vmUl",
        }
    }
}

impl fmt::Display for BasestationEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Traffic concerning a single endnode
#[derive(Debug, Clone, PartialEq)]
pub struct EndnodeEvent {
    /// Basestation the traffic passed through
    pub bs_eui: Eui64,
    /// Endnode concerned
    pub ep_eui: Eui64,
    /// Routing tag
    pub event_type: EndnodeEventType,
    /// Operation id of the originating message
    pub op_id: i64,
    /// When the message was received
    pub received_at: SystemTime,
    /// The originating message
    pub message: Message,
}

impl EndnodeEvent {
    /// Build the event for the response to a server-issued operation.
    ///
    /// Those responses do not name the endnode, so the caller supplies the
    /// EUI it recorded when the operation was sent. Returns `None` for
    /// messages that are not such responses.
    pub fn correlated(bs_eui: Eui64, ep_eui: Eui64, message: Message) -> Option<EndnodeEvent> {
        let event_type = match &message {
            Message::DownlinkQueueRsp(_) => EndnodeEventType::DownlinkQueued,
            Message::DownlinkRevokeRsp(_) => EndnodeEventType::DownlinkRevoked,
            Message::AttachPropagateRsp(_) => EndnodeEventType::AttachPropagated,
            Message::DetachPropagateRsp(_) => EndnodeEventType::DetachPropagated,
            _ => return None,
        };
        Some(EndnodeEvent {
            bs_eui,
            ep_eui,
            event_type,
            op_id: message.op_id(),
            received_at: SystemTime::now(),
            message,
        })
    }
}

/// Traffic concerning the basestation itself
#[derive(Debug, Clone, PartialEq)]
pub struct BasestationEvent {
    /// Basestation concerned
    pub bs_eui: Eui64,
    /// Routing tag
    pub event_type: BasestationEventType,
    /// Operation id of the originating message
    pub op_id: i64,
    /// When the message was received
    pub received_at: SystemTime,
    /// The originating message
    pub message: Message,
}

/// An upstream event of either scope
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Basestation-scoped event
    Basestation(BasestationEvent),
    /// Endnode-scoped event
    Endnode(EndnodeEvent),
}

impl Event {
    /// Routing tag of the event
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::Basestation(event) => event.event_type.as_str(),
            Event::Endnode(event) => event.event_type.as_str(),
        }
    }

    /// Basestation the event came from
    pub fn bs_eui(&self) -> Eui64 {
        match self {
            Event::Basestation(event) => event.bs_eui,
            Event::Endnode(event) => event.bs_eui,
        }
    }
}

/// Conversion of a received message into an upstream event
pub trait IntoEvent {
    /// Wrap the message as an event received through `bs_eui`
    fn into_event(self, bs_eui: Eui64) -> Event;
}

macro_rules! endnode_event {
    ($($ty:ident => $kind:ident),* $(,)?) => {
        $(
            impl IntoEvent for $ty {
                fn into_event(self, bs_eui: Eui64) -> Event {
                    Event::Endnode(EndnodeEvent {
                        bs_eui,
                        ep_eui: self.ep_eui,
                        event_type: EndnodeEventType::$kind,
                        op_id: self.op_id,
                        received_at: SystemTime::now(),
                        message: Message::from(self),
                    })
                }
            }
        )*
    };
}

macro_rules! basestation_event {
    ($($ty:ident => $kind:ident),* $(,)?) => {
        $(
            impl IntoEvent for $ty {
                fn into_event(self, bs_eui: Eui64) -> Event {
                    Event::Basestation(BasestationEvent {
                        bs_eui,
                        event_type: BasestationEventType::$kind,
                        op_id: self.op_id,
                        received_at: SystemTime::now(),
                        message: Message::from(self),
                    })
                }
            }
        )*
    };
}

endnode_event! {
    Attach => Attach,
    Detach => Detach,
    UplinkData => Uplink,
    DownlinkRxStatus => DownlinkRxStatus,
    DownlinkResult => DownlinkResult,
}

basestation_event! {
    Connect => Connect,
    StatusRsp => Status,
    VmActivateRsp => VmActivate,
    VmDeactivateRsp => VmDeactivate,
    VmStatusRsp => VmStatus,
    VmUplinkData => VmUplink,
}

impl Message {
    /// Convert a message that is forwarded upstream on its own into an event.
    ///
    /// Responses to server-issued endnode operations are not covered, see
    /// [`EndnodeEvent::correlated`].
    pub fn into_event(self, bs_eui: Eui64) -> Option<Event> {
        match self {
            Message::Attach(inner) => Some(inner.into_event(bs_eui)),
            Message::Detach(inner) => Some(inner.into_event(bs_eui)),
            Message::UplinkData(inner) => Some(inner.into_event(bs_eui)),
            Message::DownlinkRxStatus(inner) => Some(inner.into_event(bs_eui)),
            Message::DownlinkResult(inner) => Some(inner.into_event(bs_eui)),
            Message::Connect(inner) => Some(inner.into_event(bs_eui)),
            Message::StatusRsp(inner) => Some(inner.into_event(bs_eui)),
            Message::VmActivateRsp(inner) => Some(inner.into_event(bs_eui)),
            Message::VmDeactivateRsp(inner) => Some(inner.into_event(bs_eui)),
            Message::VmStatusRsp(inner) => Some(inner.into_event(bs_eui)),
            Message::VmUplinkData(inner) => Some(inner.into_event(bs_eui)),
            _ => None,
        }
    }
}
