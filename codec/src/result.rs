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

/// Result Type for Codec Operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while framing, decoding or encoding BSSCI traffic.
///
/// The split matters to callers: a [`FramingError`] means the byte stream can no
/// longer be trusted and the connection has to go, while a [`MessageError`]
/// concerns a single well-framed payload and can be answered on the wire.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The transport envelope is broken
    #[error(transparent)]
    Framing(#[from] FramingError),

    /// A complete payload could not be turned into a message
    #[error(transparent)]
    Message(#[from] MessageError),

    /// A message could not be serialized
    #[error("encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// An I/O error occurred while reading from or writing to the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    /// Check if the error leaves the byte stream in an unknown state
    pub fn is_framing(&self) -> bool {
        matches!(self, CodecError::Framing(_) | CodecError::Io(_))
    }
}

/// Malformed transport envelope (magic, length prefix or header).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramingError {
    /// The first eight bytes are not the protocol magic
    #[error("bad frame magic {found:02x?}")]
    BadMagic {
        /// The bytes found where the magic was expected
        found: Vec<u8>,
    },

    /// The stream ended inside the 12-byte frame header
    #[error("truncated frame header ({available} of 12 bytes)")]
    TruncatedHeader {
        /// Number of header bytes available
        available: usize,
    },

    /// The stream ended before the declared payload length was read
    #[error("truncated payload ({available} of {expected} bytes)")]
    TruncatedPayload {
        /// Declared payload length
        expected: usize,
        /// Number of payload bytes available
        available: usize,
    },

    /// The declared payload length exceeds the configured limit
    #[error("payload length {length} exceeds limit {limit}")]
    PayloadTooLarge {
        /// Declared payload length
        length: usize,
        /// Configured limit
        limit: usize,
    },

    /// The payload does not start with a `{command, opId}` header
    #[error("invalid payload header: {0}")]
    InvalidHeader(String),
}

/// A well-framed payload that does not decode as a known message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    /// The command tag is not part of the protocol
    #[error("unsupported command '{command}' (opId {op_id})")]
    UnknownCommand {
        /// The command tag found in the header
        command: String,
        /// The operation id found in the header
        op_id: i64,
    },

    /// The command is known but its fields do not match its structure
    #[error("malformed '{command}' message (opId {op_id}): {reason}")]
    Malformed {
        /// The command tag found in the header
        command: String,
        /// The operation id found in the header
        op_id: i64,
        /// What was wrong with the payload
        reason: String,
    },
}

impl MessageError {
    /// Get the command tag the error refers to
    pub fn command(&self) -> &str {
        match self {
            MessageError::UnknownCommand { command, .. } => command,
            MessageError::Malformed { command, .. } => command,
        }
    }

    /// Get the operation id the error refers to
    pub fn op_id(&self) -> i64 {
        match self {
            MessageError::UnknownCommand { op_id, .. } => *op_id,
            MessageError::Malformed { op_id, .. } => *op_id,
        }
    }
}

/// Rejected upstream command or response envelope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    /// The envelope carries no command/response body
    #[error("envelope for {0} carries no payload")]
    MissingPayload(&'static str),

    /// Key material does not have the mandated size
    #[error("{field} must be {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Name of the offending field
        field: &'static str,
        /// Mandated length
        expected: usize,
        /// Length received
        actual: usize,
    },

    /// A required field is empty
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// Two parallel lists differ in length
    #[error("{field} has {actual} entries, expected {expected}")]
    LengthMismatch {
        /// Name of the offending field
        field: &'static str,
        /// Length of the list it must match
        expected: usize,
        /// Length received
        actual: usize,
    },
}
