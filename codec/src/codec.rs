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

use crate::{CodecError, CodecResult, FramingError, Message, MessageError};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::Deserialize;
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

/// Magic identifier opening every frame
pub const MAGIC: &[u8; 8] = b"MIOTYB01";

/// Size of the fixed frame header: magic plus little-endian payload length
pub const HEADER_LEN: usize = 12;

/// Default upper bound for a single payload
pub const DEFAULT_MAX_PAYLOAD_LEN: usize = 1 << 20;

/// A complete frame whose payload header has been read.
///
/// The body is kept as raw bytes so that a payload that does not decode as
/// its announced command can still be answered using `command` and `op_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Command tag from the payload header
    pub command: String,
    /// Operation id from the payload header
    pub op_id: i64,
    /// The complete MessagePack payload, header entries included
    pub payload: Bytes,
}

impl Frame {
    /// Decode the payload into a [`Message`]
    pub fn decode_message(&self) -> Result<Message, MessageError> {
        Message::decode(&self.command, self.op_id, &self.payload)
    }
}

#[derive(Deserialize)]
struct PayloadHeader {
    command: String,
    #[serde(rename = "opId")]
    op_id: i64,
}

/// A codec for the BSSCI transport envelope.
///
/// Decoding yields a [`Frame`] once the magic, the length prefix and the full
/// payload are buffered and the payload starts with a valid `{command, opId}`
/// header. Only envelope problems surface as decoder errors, so a stream keeps
/// going after a payload that is well framed but not a valid message.
///
/// Encoding serializes a [`Message`] first to learn its length, then writes
/// magic, length and payload.
///
/// # Example
/// ```
/// use bssci_codec::{BssciCodec, Message, Ping};
/// use bytes::BytesMut;
/// use tokio_util::codec::{Decoder, Encoder};
///
/// let mut codec = BssciCodec::new();
/// let mut buffer = BytesMut::new();
/// codec.encode(Message::from(Ping { op_id: 5 }), &mut buffer).unwrap();
///
/// let frame = codec.decode(&mut buffer).unwrap().unwrap();
/// assert_eq!(frame.command, "ping");
/// assert_eq!(frame.op_id, 5);
/// ```
#[derive(Debug, Clone)]
pub struct BssciCodec {
    max_payload_len: usize,
}

impl BssciCodec {
    /// Creates a codec with the default payload limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a codec rejecting payloads longer than `max_payload_len`
    pub fn with_max_payload_len(max_payload_len: usize) -> Self {
        Self { max_payload_len }
    }

    /// Get the payload limit
    pub fn max_payload_len(&self) -> usize {
        self.max_payload_len
    }
}

impl Default for BssciCodec {
    fn default() -> Self {
        Self {
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
        }
    }
}

impl Decoder for BssciCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Reject a foreign stream as soon as the magic diverges
        let magic_len = src.len().min(MAGIC.len());
        if src[..magic_len] != MAGIC[..magic_len] {
            return Err(FramingError::BadMagic {
                found: src[..magic_len].to_vec(),
            }
            .into());
        }

        if src.len() < HEADER_LEN {
            src.reserve(HEADER_LEN - src.len());
            return Ok(None);
        }

        let mut length_bytes = [0u8; 4];
        length_bytes.copy_from_slice(&src[MAGIC.len()..HEADER_LEN]);
        let length = u32::from_le_bytes(length_bytes) as usize;
        if length > self.max_payload_len {
            return Err(FramingError::PayloadTooLarge {
                length,
                limit: self.max_payload_len,
            }
            .into());
        }

        if src.len() < HEADER_LEN + length {
            src.reserve(HEADER_LEN + length - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let payload = src.split_to(length).freeze();
        let header: PayloadHeader = rmp_serde::from_slice(&payload)
            .map_err(|err| FramingError::InvalidHeader(err.to_string()))?;

        trace!(
            command = %header.command,
            op_id = header.op_id,
            length,
            "Decoded frame"
        );

        Ok(Some(Frame {
            command: header.command,
            op_id: header.op_id,
            payload,
        }))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None if buf.is_empty() => Ok(None),
            None if buf.len() < HEADER_LEN => Err(FramingError::TruncatedHeader {
                available: buf.len(),
            }
            .into()),
            None => {
                let mut length_bytes = [0u8; 4];
                length_bytes.copy_from_slice(&buf[MAGIC.len()..HEADER_LEN]);
                Err(FramingError::TruncatedPayload {
                    expected: u32::from_le_bytes(length_bytes) as usize,
                    available: buf.len() - HEADER_LEN,
                }
                .into())
            }
        }
    }
}

impl Encoder<Message> for BssciCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        <Self as Encoder<&Message>>::encode(self, &item, dst)
    }
}

impl Encoder<&Message> for BssciCodec {
    type Error = CodecError;

    fn encode(&mut self, item: &Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = rmp_serde::to_vec_named(item)?;
        if payload.len() > self.max_payload_len || payload.len() > u32::MAX as usize {
            return Err(FramingError::PayloadTooLarge {
                length: payload.len(),
                limit: self.max_payload_len,
            }
            .into());
        }
        dst.reserve(HEADER_LEN + payload.len());
        dst.put_slice(MAGIC);
        dst.put_u32_le(payload.len() as u32);
        dst.put_slice(&payload);
        trace!(
            command = item.command(),
            op_id = item.op_id(),
            length = payload.len(),
            "Encoded frame"
        );
        Ok(())
    }
}

/// Encode a single message into a standalone frame
pub fn encode_frame(message: &Message) -> CodecResult<BytesMut> {
    let mut buffer = BytesMut::new();
    <BssciCodec as Encoder<&Message>>::encode(&mut BssciCodec::new(), message, &mut buffer)?;
    Ok(buffer)
}

/// Decode exactly one frame from `bytes` into a message.
///
/// Missing bytes are reported as framing errors, never as a partial result.
pub fn decode_frame(bytes: &[u8]) -> CodecResult<Message> {
    let mut buffer = BytesMut::from(bytes);
    match BssciCodec::new().decode_eof(&mut buffer)? {
        Some(frame) => Ok(frame.decode_message()?),
        None => Err(FramingError::TruncatedHeader { available: 0 }.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Eui64, Ping, ProtocolError, UplinkData};
    use futures_util::StreamExt;
    use tokio_util::codec::FramedRead;

    fn frame_with_payload(payload: &[u8]) -> BytesMut {
        let mut buffer = BytesMut::new();
        buffer.put_slice(MAGIC);
        buffer.put_u32_le(payload.len() as u32);
        buffer.put_slice(payload);
        buffer
    }

    #[test]
    fn test_encode_layout() {
        let buffer = encode_frame(&Message::from(Ping { op_id: 1 })).unwrap();
        assert_eq!(&buffer[..8], b"MIOTYB01");
        let length = u32::from_le_bytes([buffer[8], buffer[9], buffer[10], buffer[11]]) as usize;
        assert_eq!(length, buffer.len() - HEADER_LEN);
    }

    #[test]
    fn test_decode_waits_for_complete_frame() {
        let full = encode_frame(&Message::from(Ping { op_id: 2 })).unwrap();
        let mut codec = BssciCodec::new();

        let mut partial = BytesMut::from(&full[..5]);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        let mut partial = BytesMut::from(&full[..full.len() - 1]);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        let mut complete = full.clone();
        let frame = codec.decode(&mut complete).unwrap().unwrap();
        assert_eq!(frame.command, "ping");
        assert!(complete.is_empty());
    }

    #[test]
    fn test_bad_magic() {
        let mut buffer = BytesMut::from(&b"MIOTYB02\x00\x00\x00\x00"[..]);
        let err = BssciCodec::new().decode(&mut buffer).unwrap_err();
        assert!(matches!(err, CodecError::Framing(FramingError::BadMagic { .. })));
    }

    #[test]
    fn test_payload_limit() {
        let mut buffer = BytesMut::new();
        buffer.put_slice(MAGIC);
        buffer.put_u32_le(1025);
        let err = BssciCodec::with_max_payload_len(1024)
            .decode(&mut buffer)
            .unwrap_err();
        assert!(matches!(
            err,
            CodecError::Framing(FramingError::PayloadTooLarge { length: 1025, limit: 1024 })
        ));
    }

    #[test]
    fn test_truncation_at_eof() {
        let full = encode_frame(&Message::from(Ping { op_id: 2 })).unwrap();

        let err = decode_frame(&full[..7]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Framing(FramingError::TruncatedHeader { available: 7 })
        ));

        let err = decode_frame(&full[..HEADER_LEN + 3]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Framing(FramingError::TruncatedPayload { available: 3, .. })
        ));
    }

    #[test]
    fn test_header_must_carry_command_and_op_id() {
        let payload = rmp_serde::to_vec_named(&wire::OnlyCommand { command: "ping" }).unwrap();
        let mut buffer = frame_with_payload(&payload);
        let err = BssciCodec::new().decode(&mut buffer).unwrap_err();
        assert!(matches!(err, CodecError::Framing(FramingError::InvalidHeader(_))));
    }

    #[test]
    fn test_unknown_command_is_not_framing_error() {
        let payload = rmp_serde::to_vec_named(&wire::Header {
            command: "vm.teleport",
            op_id: 11,
        })
        .unwrap();
        let mut buffer = frame_with_payload(&payload);
        let frame = BssciCodec::new().decode(&mut buffer).unwrap().unwrap();
        assert_eq!(frame.op_id, 11);
        assert!(matches!(
            frame.decode_message(),
            Err(MessageError::UnknownCommand { .. })
        ));
    }

    #[tokio::test]
    async fn test_framed_read_stream() {
        let mut wire = BytesMut::new();
        let mut codec = BssciCodec::new();
        codec.encode(Message::from(Ping { op_id: 1 }), &mut wire).unwrap();
        codec
            .encode(
                Message::from(UplinkData {
                    op_id: 2,
                    ep_eui: Eui64::from_u64(0xabc),
                    ..Default::default()
                }),
                &mut wire,
            )
            .unwrap();
        codec
            .encode(Message::from(ProtocolError::new(3, 1, "nope")), &mut wire)
            .unwrap();

        let reader = std::io::Cursor::new(wire.to_vec());
        let frames: Vec<_> = FramedRead::new(reader, BssciCodec::new())
            .map(|frame| frame.unwrap().command)
            .collect()
            .await;
        assert_eq!(frames, vec!["ping", "ulData", "error"]);
    }

    mod wire {
        #[derive(serde::Serialize)]
        pub struct OnlyCommand {
            pub command: &'static str,
        }

        #[derive(serde::Serialize)]
        pub struct Header {
            pub command: &'static str,
            #[serde(rename = "opId")]
            pub op_id: i64,
        }
    }
}
