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

//! # BSSCI Protocol Codec
//!
//! Encoding and decoding of the mioty basestation to service center interface.
//!
//! ## Overview
//!
//! Every BSSCI frame is a fixed 12-byte envelope followed by a MessagePack map:
//!
//! ```text
//! offset 0..7   : ASCII magic "MIOTYB01"
//! offset 8..11  : little-endian u32 payload length L
//! offset 12..   : L bytes of MessagePack, starting with {command, opId}
//! ```
//!
//! ## Core Components
//!
//! ### [`BssciCodec`]
//!
//! Implements [`Decoder`] and [`Encoder`] from `tokio_util::codec`. The decoder
//! produces a [`Frame`] holding the header and the raw payload; turning that
//! into a [`Message`] is a separate step so a bad payload never poisons the
//! stream.
//!
//! ### [`Message`]
//!
//! The closed set of protocol commands, one struct per command.
//!
//! ### [`Event`]
//!
//! Inbound messages as seen by the upstream integration, keyed by EUI.
//!
//! ### [`ServerCommand`] / [`ServerResponse`]
//!
//! Validated outbound envelopes coming from the integration.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use bssci_codec::{BssciCodec, Message};
//! use futures_util::StreamExt;
//! use tokio::net::TcpStream;
//! use tokio_util::codec::FramedRead;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let stream = TcpStream::connect("127.0.0.1:5005").await?;
//! let mut frames = FramedRead::new(stream, BssciCodec::new());
//! while let Some(frame) = frames.next().await {
//!     let frame = frame?;
//!     match frame.decode_message() {
//!         Ok(message) => println!("{} {}", message.command(), message.op_id()),
//!         Err(err) => println!("undecodable payload: {}", err),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`Decoder`]: tokio_util::codec::Decoder
//! [`Encoder`]: tokio_util::codec::Encoder

#![warn(missing_docs)]

mod codec;
mod eui;
mod event;
pub mod message;
mod result;
mod upstream;

pub use self::codec::{
    BssciCodec, DEFAULT_MAX_PAYLOAD_LEN, Frame, HEADER_LEN, MAGIC, decode_frame, encode_frame,
};
pub use self::eui::{Eui64, ParseEuiError};
pub use self::event::{
    BasestationEvent, BasestationEventType, EndnodeEvent, EndnodeEventType, Event, IntoEvent,
};
pub use self::message::*;
pub use self::result::{CodecError, CodecResult, EnvelopeError, FramingError, MessageError};
pub use self::upstream::{
    AttachPropagation, DownlinkRequest, ServerCommand, ServerCommandKind, ServerResponse,
    ServerResponseKind,
};
