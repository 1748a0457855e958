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

//! BSSCI Message Model
//!
//! Every protocol command has its own struct, and [`Message`] is the closed sum
//! over all of them. Decoding goes through a single entry point keyed by the
//! command tag, [`Message::decode`], which tells an unknown tag apart from a
//! known tag with a broken body.

#[macro_use]
mod macros;

mod attach;
mod connect;
mod downlink;
mod status;
mod types;
mod uplink;
mod vm;

pub use self::attach::{
    Attach, AttachCmp, AttachPropagate, AttachPropagateCmp, AttachPropagateRsp, AttachRsp, Detach,
    DetachCmp, DetachPropagate, DetachPropagateCmp, DetachPropagateRsp, DetachRsp,
};
pub use self::connect::{
    Connect, ConnectCmp, ConnectRsp, ErrorAck, Ping, PingCmp, PingRsp, ProtocolError,
};
pub use self::downlink::{
    DownlinkQueue, DownlinkQueueCmp, DownlinkQueueRsp, DownlinkResult, DownlinkResultCmp,
    DownlinkResultRsp, DownlinkRevoke, DownlinkRevokeCmp, DownlinkRevokeRsp,
};
pub use self::status::{Status, StatusCmp, StatusRsp};
pub use self::types::{DownlinkResultCode, GeoLocation, NWK_SESSION_KEY_LEN, Subpackets};
pub use self::uplink::{
    DownlinkRxStatus, DownlinkRxStatusCmp, DownlinkRxStatusRsp, UplinkData, UplinkDataCmp,
    UplinkDataRsp,
};
pub use self::vm::{
    VmActivate, VmActivateCmp, VmActivateRsp, VmDeactivate, VmDeactivateCmp, VmDeactivateRsp,
    VmStatus, VmStatusCmp, VmStatusRsp, VmUplinkData, VmUplinkDataCmp, VmUplinkDataRsp,
};

use crate::MessageError;
use serde::{Serialize, Serializer};

/// Protocol version announced in the connect response
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// Protocol error code: the command is not supported
pub const ERROR_UNSUPPORTED_COMMAND: u32 = 1;
/// Protocol error code: the message does not match its command's structure
pub const ERROR_MALFORMED_MESSAGE: u32 = 2;
/// Protocol error code: the command is not expected in this direction or state
pub const ERROR_UNEXPECTED_COMMAND: u32 = 3;
/// Protocol error code: the service center cannot handle the message
pub const ERROR_UNABLE_TO_HANDLE: u32 = 4;

/// A concrete BSSCI message type.
pub trait Command {
    /// The command tag carried on the wire
    const COMMAND: &'static str;

    /// The operation id of this message
    fn op_id(&self) -> i64;
}

/// A message the service center originates and stamps with its own opId.
pub trait ServerIssued {
    /// Replace the operation id
    fn set_op_id(&mut self, op_id: i64);
}

macro_rules! messages {
    ($($variant:ident),* $(,)?) => {
        /// Any BSSCI message
        #[derive(Debug, Clone, PartialEq)]
        pub enum Message {
            $(
                #[allow(missing_docs)]
                $variant($variant),
            )*
        }

        impl Message {
            /// Get the command tag
            pub fn command(&self) -> &'static str {
                match self {
                    $(Message::$variant(_) => <$variant as Command>::COMMAND,)*
                }
            }

            /// Get the operation id
            pub fn op_id(&self) -> i64 {
                match self {
                    $(Message::$variant(inner) => inner.op_id,)*
                }
            }

            /// Check if `command` is a tag of the protocol
            pub fn is_known_command(command: &str) -> bool {
                [$(<$variant as Command>::COMMAND),*].contains(&command)
            }

            fn decode_body(
                command: &str,
                payload: &[u8],
            ) -> Option<Result<Message, rmp_serde::decode::Error>> {
                $(
                    if command == <$variant as Command>::COMMAND {
                        return Some(rmp_serde::from_slice::<$variant>(payload).map(Message::$variant));
                    }
                )*
                None
            }
        }

        impl Serialize for Message {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                match self {
                    $(Message::$variant(inner) => inner.serialize(serializer),)*
                }
            }
        }

        $(
            impl From<$variant> for Message {
                fn from(message: $variant) -> Self {
                    Message::$variant(message)
                }
            }
        )*
    };
}

messages! {
    Connect, ConnectRsp, ConnectCmp,
    Ping, PingRsp, PingCmp,
    ProtocolError, ErrorAck,
    Attach, AttachRsp, AttachCmp,
    Detach, DetachRsp, DetachCmp,
    UplinkData, UplinkDataRsp, UplinkDataCmp,
    DownlinkRxStatus, DownlinkRxStatusRsp, DownlinkRxStatusCmp,
    DownlinkQueue, DownlinkQueueRsp, DownlinkQueueCmp,
    DownlinkRevoke, DownlinkRevokeRsp, DownlinkRevokeCmp,
    DownlinkResult, DownlinkResultRsp, DownlinkResultCmp,
    AttachPropagate, AttachPropagateRsp, AttachPropagateCmp,
    DetachPropagate, DetachPropagateRsp, DetachPropagateCmp,
    Status, StatusRsp, StatusCmp,
    VmActivate, VmActivateRsp, VmActivateCmp,
    VmDeactivate, VmDeactivateRsp, VmDeactivateCmp,
    VmStatus, VmStatusRsp, VmStatusCmp,
    VmUplinkData, VmUplinkDataRsp, VmUplinkDataCmp,
}

impl Message {
    /// Decode the payload of a frame whose header announced `command` and `op_id`.
    ///
    /// Unknown tags fail with [`MessageError::UnknownCommand`]. A known tag whose
    /// body does not deserialize, or violates a field rule, fails with
    /// [`MessageError::Malformed`].
    pub fn decode(command: &str, op_id: i64, payload: &[u8]) -> Result<Message, MessageError> {
        let message = match Self::decode_body(command, payload) {
            None => {
                return Err(MessageError::UnknownCommand {
                    command: command.to_string(),
                    op_id,
                });
            }
            Some(Err(err)) => {
                return Err(MessageError::Malformed {
                    command: command.to_string(),
                    op_id,
                    reason: err.to_string(),
                });
            }
            Some(Ok(message)) => message,
        };
        message
            .validate()
            .map_err(|reason| MessageError::Malformed {
                command: command.to_string(),
                op_id,
                reason,
            })?;
        Ok(message)
    }

    /// Check field rules serde cannot express
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Message::DownlinkResult(inner) => inner.validate(),
            Message::AttachRsp(inner) => inner.validate(),
            Message::AttachPropagate(inner) => inner.validate(),
            _ => Ok(()),
        }
    }

    fn server_issued_mut(&mut self) -> Option<&mut dyn ServerIssued> {
        match self {
            Message::Ping(inner) => Some(inner),
            Message::ProtocolError(inner) => Some(inner),
            Message::Status(inner) => Some(inner),
            Message::DownlinkQueue(inner) => Some(inner),
            Message::DownlinkRevoke(inner) => Some(inner),
            Message::AttachPropagate(inner) => Some(inner),
            Message::DetachPropagate(inner) => Some(inner),
            Message::VmActivate(inner) => Some(inner),
            Message::VmDeactivate(inner) => Some(inner),
            Message::VmStatus(inner) => Some(inner),
            _ => None,
        }
    }

    /// Check if the service center may originate this message
    pub fn is_server_issued(&self) -> bool {
        matches!(
            self,
            Message::Ping(_)
                | Message::ProtocolError(_)
                | Message::Status(_)
                | Message::DownlinkQueue(_)
                | Message::DownlinkRevoke(_)
                | Message::AttachPropagate(_)
                | Message::DetachPropagate(_)
                | Message::VmActivate(_)
                | Message::VmDeactivate(_)
                | Message::VmStatus(_)
        )
    }

    /// Stamp a server-issued message with `op_id`.
    ///
    /// Returns `false`, leaving the message untouched, for messages the service
    /// center does not originate.
    pub fn set_op_id(&mut self, op_id: i64) -> bool {
        match self.server_issued_mut() {
            Some(inner) => {
                inner.set_op_id(op_id);
                true
            }
            None => false,
        }
    }

    /// Endnode a message refers to, if any
    pub fn ep_eui(&self) -> Option<crate::Eui64> {
        match self {
            Message::Attach(inner) => Some(inner.ep_eui),
            Message::Detach(inner) => Some(inner.ep_eui),
            Message::UplinkData(inner) => Some(inner.ep_eui),
            Message::DownlinkRxStatus(inner) => Some(inner.ep_eui),
            Message::DownlinkQueue(inner) => Some(inner.ep_eui),
            Message::DownlinkRevoke(inner) => Some(inner.ep_eui),
            Message::DownlinkResult(inner) => Some(inner.ep_eui),
            Message::AttachPropagate(inner) => Some(inner.ep_eui),
            Message::DetachPropagate(inner) => Some(inner.ep_eui),
            _ => None,
        }
    }
}
