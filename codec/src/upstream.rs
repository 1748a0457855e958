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

//! Outbound envelopes pushed in by the integration layer
//!
//! A [`ServerCommand`] starts a new server-issued operation on a basestation,
//! a [`ServerResponse`] answers an operation the basestation started (attach,
//! detach). Both are validated while being turned into a [`Message`].

use crate::message::{
    AttachPropagate, AttachRsp, DetachPropagate, DetachRsp, DownlinkQueue, DownlinkRevoke,
    NWK_SESSION_KEY_LEN, ProtocolError, Status, VmActivate, VmDeactivate, VmStatus,
};
use crate::{EnvelopeError, Eui64, Message};
use bytes::Bytes;

/// Downlink to enqueue on a basestation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DownlinkRequest {
    /// Endnode identity
    pub ep_eui: Eui64,
    /// Queue id chosen by the caller, used to revoke and to match the result
    pub que_id: u64,
    /// Payloads, one per packet counter when `packet_cnt` is given
    pub user_data: Vec<Bytes>,
    /// Packet counters the payloads depend on
    pub packet_cnt: Option<Vec<u32>>,
    /// Payload format indicator
    pub format: Option<u8>,
    /// Priority
    pub prio: Option<f64>,
    /// A response from the endnode is expected
    pub response_exp: Option<bool>,
    /// Request an additional downlink window
    pub dl_wind_req: Option<bool>,
    /// Only transmit if the endnode expects a response
    pub exp_only: Option<bool>,
}

/// Endnode attachment to propagate to a basestation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttachPropagation {
    /// Endnode identity
    pub ep_eui: Eui64,
    /// Endnode supports downlink
    pub bidi: bool,
    /// Network session key, must be 16 bytes
    pub nwk_session_key: Bytes,
    /// Short address
    pub sh_addr: u16,
    /// Last known uplink packet counter
    pub last_packet_cnt: u32,
    /// Endnode uses dual channel mode
    pub dual_chan: bool,
    /// Endnode uses DL repetition
    pub repetition: bool,
    /// Endnode uses wide carrier offset
    pub wide_carr_off: bool,
    /// Endnode uses long block distance
    pub long_blk_dist: bool,
}

/// Body of a [`ServerCommand`]
#[derive(Debug, Clone, PartialEq)]
pub enum ServerCommandKind {
    /// Queue a downlink
    EnqueueDownlink(DownlinkRequest),
    /// Revoke a queued downlink
    RevokeDownlink {
        /// Endnode identity
        ep_eui: Eui64,
        /// Queue id of the downlink
        que_id: u64,
    },
    /// Propagate an attachment
    AttachPropagate(AttachPropagation),
    /// Propagate a detachment
    DetachPropagate {
        /// Endnode identity
        ep_eui: Eui64,
    },
    /// Request a status report
    RequestStatus,
    /// Activate a variable MAC type
    VmActivate {
        /// MAC type
        mac_type: i64,
    },
    /// Deactivate a variable MAC type
    VmDeactivate {
        /// MAC type
        mac_type: i64,
    },
    /// Request the active variable MAC types
    VmStatus,
}

/// Command for a basestation, issued by the integration layer
#[derive(Debug, Clone, PartialEq)]
pub struct ServerCommand {
    /// Target basestation
    pub bs_eui: Eui64,
    /// Command body
    pub command: Option<ServerCommandKind>,
}

impl ServerCommand {
    /// Create a command envelope
    pub fn new(bs_eui: Eui64, command: ServerCommandKind) -> Self {
        Self {
            bs_eui,
            command: Some(command),
        }
    }

    /// Convert into the wire message.
    ///
    /// The opId is left at zero, it is assigned by the connection when sent.
    pub fn to_message(&self) -> Result<Message, EnvelopeError> {
        let command = self
            .command
            .as_ref()
            .ok_or(EnvelopeError::MissingPayload("server command"))?;
        let message = match command {
            ServerCommandKind::EnqueueDownlink(request) => {
                if request.user_data.is_empty() {
                    return Err(EnvelopeError::Empty("userData"));
                }
                if let Some(packet_cnt) = &request.packet_cnt
                    && packet_cnt.len() != request.user_data.len()
                {
                    return Err(EnvelopeError::LengthMismatch {
                        field: "packetCnt",
                        expected: request.user_data.len(),
                        actual: packet_cnt.len(),
                    });
                }
                Message::from(DownlinkQueue {
                    op_id: 0,
                    ep_eui: request.ep_eui,
                    que_id: request.que_id,
                    cnt_depend: request.packet_cnt.is_some(),
                    user_data: request.user_data.clone(),
                    packet_cnt: request.packet_cnt.clone(),
                    format: request.format,
                    prio: request.prio,
                    response_exp: request.response_exp,
                    dl_wind_req: request.dl_wind_req,
                    exp_only: request.exp_only,
                })
            }
            ServerCommandKind::RevokeDownlink { ep_eui, que_id } => Message::from(DownlinkRevoke {
                op_id: 0,
                ep_eui: *ep_eui,
                que_id: *que_id,
            }),
            ServerCommandKind::AttachPropagate(attach) => {
                check_key_length(&attach.nwk_session_key)?;
                Message::from(AttachPropagate {
                    op_id: 0,
                    ep_eui: attach.ep_eui,
                    bidi: attach.bidi,
                    nwk_session_key: attach.nwk_session_key.clone(),
                    sh_addr: attach.sh_addr,
                    last_packet_cnt: attach.last_packet_cnt,
                    dual_chan: attach.dual_chan,
                    repetition: attach.repetition,
                    wide_carr_off: attach.wide_carr_off,
                    long_blk_dist: attach.long_blk_dist,
                })
            }
            ServerCommandKind::DetachPropagate { ep_eui } => Message::from(DetachPropagate {
                op_id: 0,
                ep_eui: *ep_eui,
            }),
            ServerCommandKind::RequestStatus => Message::from(Status { op_id: 0 }),
            ServerCommandKind::VmActivate { mac_type } => Message::from(VmActivate {
                op_id: 0,
                mac_type: *mac_type,
            }),
            ServerCommandKind::VmDeactivate { mac_type } => Message::from(VmDeactivate {
                op_id: 0,
                mac_type: *mac_type,
            }),
            ServerCommandKind::VmStatus => Message::from(VmStatus { op_id: 0 }),
        };
        Ok(message)
    }
}

/// Body of a [`ServerResponse`]
#[derive(Debug, Clone, PartialEq)]
pub enum ServerResponseKind {
    /// Accept an over-the-air attachment
    Attach {
        /// Network session key, must be 16 bytes
        nwk_session_key: Bytes,
        /// Assigned short address
        sh_addr: u16,
    },
    /// Accept an over-the-air detachment
    Detach {
        /// Response signature
        sign: Bytes,
    },
    /// Reject the operation
    Error {
        /// Error code
        code: u32,
        /// Description
        message: String,
    },
}

/// Response to an operation a basestation started
#[derive(Debug, Clone, PartialEq)]
pub struct ServerResponse {
    /// Target basestation
    pub bs_eui: Eui64,
    /// Operation id of the basestation request being answered
    pub op_id: i64,
    /// Response body
    pub response: Option<ServerResponseKind>,
}

impl ServerResponse {
    /// Create a response envelope
    pub fn new(bs_eui: Eui64, op_id: i64, response: ServerResponseKind) -> Self {
        Self {
            bs_eui,
            op_id,
            response: Some(response),
        }
    }

    /// Convert into the wire message, keeping the request's opId
    pub fn to_message(&self) -> Result<Message, EnvelopeError> {
        let response = self
            .response
            .as_ref()
            .ok_or(EnvelopeError::MissingPayload("server response"))?;
        let message = match response {
            ServerResponseKind::Attach {
                nwk_session_key,
                sh_addr,
            } => {
                check_key_length(nwk_session_key)?;
                Message::from(AttachRsp {
                    op_id: self.op_id,
                    nwk_session_key: nwk_session_key.clone(),
                    sh_addr: *sh_addr,
                })
            }
            ServerResponseKind::Detach { sign } => {
                if sign.is_empty() {
                    return Err(EnvelopeError::Empty("sign"));
                }
                Message::from(DetachRsp {
                    op_id: self.op_id,
                    sign: sign.clone(),
                })
            }
            ServerResponseKind::Error { code, message } => {
                Message::from(ProtocolError::new(self.op_id, *code, message.clone()))
            }
        };
        Ok(message)
    }
}

fn check_key_length(key: &Bytes) -> Result<(), EnvelopeError> {
    if key.len() != NWK_SESSION_KEY_LEN {
        return Err(EnvelopeError::InvalidKeyLength {
            field: "nwkSessionKey",
            expected: NWK_SESSION_KEY_LEN,
            actual: key.len(),
        });
    }
    Ok(())
}
