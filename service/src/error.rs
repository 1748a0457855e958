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

//! Error types for the BSSCI service center

use crate::SinkError;
use bssci_codec::{CodecError, EnvelopeError, Eui64, FramingError, MessageError};
use std::time::Duration;
use thiserror::Error;

/// Result type for operations
pub type Result<T> = std::result::Result<T, BssciError>;

/// Coarse classification of a [`BssciError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Broken transport envelope
    Framing,
    /// Recognised command with a malformed body
    Decode,
    /// Command tag not part of the protocol
    UnrecognizedCommand,
    /// First frame on a socket was not a connect
    HandshakeViolation,
    /// Target basestation is not connected
    Routing,
    /// No upstream handler accepted the event
    UpstreamUnavailable,
    /// Socket or TLS I/O failure
    Io,
    /// A deadline passed
    Timeout,
    /// Bad configuration or certificate material
    Config,
    /// Rejected outbound envelope
    InvalidEnvelope,
    /// Server or connection lifecycle misuse
    Lifecycle,
}

/// BSSCI service center error types
#[derive(Debug, Error)]
pub enum BssciError {
    /// I/O error from the underlying stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte stream no longer carries valid frames
    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    /// A recognised command whose payload does not match its structure
    #[error("Decode error: {0}")]
    Decode(MessageError),

    /// A command tag outside the protocol
    #[error("Unrecognized command '{command}' (opId {op_id})")]
    UnrecognizedCommand {
        /// The command tag received
        command: String,
        /// The operation id received
        op_id: i64,
    },

    /// The first frame on a new socket was not a connect
    #[error("Handshake violation: expected 'con', got '{command}'")]
    HandshakeViolation {
        /// The command received instead
        command: String,
    },

    /// The basestation is not in the registry
    #[error("Basestation {0} not connected")]
    NotConnected(Eui64),

    /// The upstream sink did not take the event
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(#[from] SinkError),

    /// A message could not be encoded
    #[error("Encode error: {0}")]
    Encode(CodecError),

    /// A write did not complete within its deadline
    #[error("Write timed out after {0:?}")]
    WriteTimeout(Duration),

    /// The connect handshake did not complete within its deadline
    #[error("Handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    /// TLS setup or handshake failure
    #[error("TLS error: {0}")]
    Tls(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// An outbound envelope was rejected
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(#[from] EnvelopeError),

    /// Connection has been closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// Server is not running
    #[error("Server not running")]
    ServerNotRunning,

    /// Server was already started
    #[error("Server already running")]
    AlreadyRunning,
}

impl From<CodecError> for BssciError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Framing(err) => BssciError::Framing(err),
            CodecError::Io(err) => BssciError::Io(err),
            CodecError::Message(err) => BssciError::from(err),
            err @ CodecError::Encode(_) => BssciError::Encode(err),
        }
    }
}

impl From<MessageError> for BssciError {
    fn from(err: MessageError) -> Self {
        match err {
            MessageError::UnknownCommand { command, op_id } => {
                BssciError::UnrecognizedCommand { command, op_id }
            }
            err @ MessageError::Malformed { .. } => BssciError::Decode(err),
        }
    }
}

impl BssciError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            BssciError::Io(_) | BssciError::ConnectionClosed => ErrorKind::Io,
            BssciError::Framing(_) => ErrorKind::Framing,
            BssciError::Decode(_) | BssciError::Encode(_) => ErrorKind::Decode,
            BssciError::UnrecognizedCommand { .. } => ErrorKind::UnrecognizedCommand,
            BssciError::HandshakeViolation { .. } => ErrorKind::HandshakeViolation,
            BssciError::NotConnected(_) => ErrorKind::Routing,
            BssciError::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            BssciError::WriteTimeout(_) | BssciError::HandshakeTimeout(_) => ErrorKind::Timeout,
            BssciError::Tls(_) | BssciError::Config(_) => ErrorKind::Config,
            BssciError::InvalidEnvelope(_) => ErrorKind::InvalidEnvelope,
            BssciError::ServerNotRunning | BssciError::AlreadyRunning => ErrorKind::Lifecycle,
        }
    }

    /// Check if the error ends the connection it occurred on
    ///
    /// Malformed or unknown messages are answered on the wire and the
    /// connection continues; anything that leaves the byte stream or the
    /// socket in an unknown state does not.
    pub fn is_fatal_for_connection(&self) -> bool {
        matches!(
            self,
            BssciError::Io(_)
                | BssciError::Framing(_)
                | BssciError::WriteTimeout(_)
                | BssciError::HandshakeTimeout(_)
                | BssciError::HandshakeViolation { .. }
                | BssciError::Tls(_)
                | BssciError::ConnectionClosed
        )
    }

    /// Check if the error is answered with a protocol error frame
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            BssciError::Decode(_)
                | BssciError::UnrecognizedCommand { .. }
                | BssciError::UpstreamUnavailable(_)
        )
    }
}
