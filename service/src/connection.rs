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

//! Basestation connection
//!
//! The connection owns the write half of the socket. The read half is handed
//! to the [`ConnectionWorker`](crate::ConnectionWorker) as a [`FrameReader`],
//! so reads never contend with writes.

use crate::{
    BssciError, ConnectionId, ConnectionInfo, ConnectionState, PendingOperation, Result, Session,
};
use bssci_codec::{BssciCodec, CodecError, Eui64, Message};
use futures_util::SinkExt;
use metrics::{counter, histogram};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, trace, warn};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Any byte stream a basestation can be served over
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Type-erased transport (TLS over TCP in production, in-memory in tests)
pub type BoxedTransport = Box<dyn Transport>;

/// Read side of a basestation socket
pub type FrameReader = FramedRead<ReadHalf<BoxedTransport>, BssciCodec>;

/// Write side of a basestation socket
pub type FrameWriter = FramedWrite<WriteHalf<BoxedTransport>, BssciCodec>;

/// Split a transport into framed halves
pub fn split_transport<T: Transport>(stream: T, codec: BssciCodec) -> (FrameReader, FrameWriter) {
    let (read, write) = tokio::io::split(Box::new(stream) as BoxedTransport);
    (
        FramedRead::new(read, codec.clone()),
        FramedWrite::new(write, codec),
    )
}

/// A live basestation connection
///
/// Cloning is cheap; all clones share the socket, the session and the
/// counters. Writes are serialized by a single lock so frames never
/// interleave on the wire.
#[derive(Clone)]
pub struct BasestationConnection {
    // Core I/O
    writer: Arc<Mutex<FrameWriter>>,
    session: Arc<Session>,
    cancel: CancellationToken,

    // Metadata (lock-free access)
    id: ConnectionId,
    bs_eui: Eui64,
    peer_addr: SocketAddr,
    created_at: Instant,
    state: Arc<AtomicU8>,

    // Metrics (lock-free)
    messages_sent: Arc<AtomicU64>,
    messages_received: Arc<AtomicU64>,
}

impl BasestationConnection {
    /// Wrap the write half of a handshaked socket
    pub fn new(
        id: ConnectionId,
        bs_eui: Eui64,
        peer_addr: SocketAddr,
        writer: FrameWriter,
        session: Arc<Session>,
    ) -> Self {
        debug!(
            connection_id = %id,
            bs_eui = %bs_eui,
            peer_addr = %peer_addr,
            "Creating basestation connection"
        );

        Self {
            writer: Arc::new(Mutex::new(writer)),
            session,
            cancel: CancellationToken::new(),
            id,
            bs_eui,
            peer_addr,
            created_at: Instant::now(),
            state: Arc::new(AtomicU8::new(ConnectionState::Connecting.as_u8())),
            messages_sent: Arc::new(AtomicU64::new(0)),
            messages_received: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Get the connection ID
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Get the basestation EUI
    pub fn bs_eui(&self) -> Eui64 {
        self.bs_eui
    }

    /// Get the peer address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Get when the connection was created
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Get the session this connection serves
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Get the current state
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Mark the handshake as complete
    pub fn mark_active(&self) {
        // Never resurrect a closed connection
        let _ = self.state.compare_exchange(
            ConnectionState::Connecting.as_u8(),
            ConnectionState::Active.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Get frames sent
    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    /// Get frames received
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    /// Count a frame read by the worker
    pub(crate) fn record_received(&self, command: &str) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        counter!(
            "bssci.messages.received",
            "bs_eui" => self.bs_eui.to_string(),
            "command" => command.to_string()
        )
        .increment(1);
    }

    /// Token cancelled when the connection must stop
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Check if the connection has been told to stop
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Take the next server-issued operation id
    pub fn next_op_id(&self) -> i64 {
        self.session.next_op_id()
    }

    /// Send a message
    ///
    /// `timeout` covers waiting for the write lock as well as the write itself.
    /// Socket failures and timeouts cancel the connection.
    #[instrument(
        skip(self, message),
        fields(
            connection_id = %self.id,
            bs_eui = %self.bs_eui,
            command = message.command(),
            op_id = message.op_id()
        )
    )]
    pub async fn write(&self, message: &Message, timeout: Duration) -> Result<()> {
        if self.state().is_terminal() || self.cancel.is_cancelled() {
            return Err(BssciError::ConnectionClosed);
        }

        trace!("Sending message");
        let start = Instant::now();

        let result = tokio::time::timeout(timeout, async {
            let mut writer = self.writer.lock().await;
            writer.send(message).await
        })
        .await;

        match result {
            Ok(Ok(())) => {
                self.messages_sent.fetch_add(1, Ordering::Relaxed);

                // Metrics
                counter!(
                    "bssci.messages.sent",
                    "bs_eui" => self.bs_eui.to_string(),
                    "command" => message.command()
                )
                .increment(1);
                histogram!("bssci.message.send_duration").record(start.elapsed().as_secs_f64());

                trace!("Message sent successfully");
                Ok(())
            }
            Ok(Err(CodecError::Io(e))) => {
                counter!("bssci.errors.send").increment(1);
                error!(error = %e, "Failed to send message");
                self.cancel.cancel();
                Err(BssciError::Io(e))
            }
            Ok(Err(e)) => {
                // Encoding failed before anything reached the socket
                counter!("bssci.errors.encode").increment(1);
                warn!(error = %e, "Failed to encode message");
                Err(BssciError::Encode(e))
            }
            Err(_) => {
                counter!("bssci.errors.send_timeout").increment(1);
                error!(?timeout, "Write timed out");
                self.cancel.cancel();
                Err(BssciError::WriteTimeout(timeout))
            }
        }
    }

    /// Remember a server-issued operation until its response arrives
    ///
    /// The table lives in the session, so a resumed basestation can still
    /// answer operations issued on an earlier socket.
    pub fn track_operation(&self, op_id: i64, message: &Message) {
        if let Some((evicted, op)) = self.session.track_operation(op_id, message) {
            warn!(
                connection_id = %self.id,
                bs_eui = %self.bs_eui,
                evicted_op_id = evicted,
                command = op.command,
                "Pending operation table full"
            );
        }
    }

    /// Drop a pending operation, returning what it was
    pub fn complete_operation(&self, op_id: i64) -> Option<PendingOperation> {
        self.session.complete_operation(op_id)
    }

    /// Number of unanswered server-issued operations
    pub fn pending_operations(&self) -> usize {
        self.session.pending_operations()
    }

    /// Signal the worker to stop without touching the socket
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Close the connection
    ///
    /// Cancels the worker and shuts down the write half. Safe to call more
    /// than once.
    pub async fn close(&self) {
        let previous = self
            .state
            .swap(ConnectionState::Closed.as_u8(), Ordering::AcqRel);
        self.cancel.cancel();
        if ConnectionState::from_u8(previous).is_terminal() {
            return;
        }

        let shutdown = async {
            let mut writer = self.writer.lock().await;
            writer.get_mut().shutdown().await
        };
        match tokio::time::timeout(CLOSE_TIMEOUT, shutdown).await {
            Ok(Ok(())) => debug!(connection_id = %self.id, "Connection shut down"),
            Ok(Err(e)) => debug!(connection_id = %self.id, error = %e, "Shutdown failed"),
            Err(_) => debug!(connection_id = %self.id, "Shutdown timed out"),
        }
    }

    /// Get a connection info snapshot
    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            id: self.id,
            bs_eui: self.bs_eui,
            state: self.state(),
            peer_addr: self.peer_addr,
            created_at: self.created_at,
            messages_sent: self.messages_sent(),
            messages_received: self.messages_received(),
            pending_operations: self.pending_operations(),
        }
    }
}

impl std::fmt::Debug for BasestationConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasestationConnection")
            .field("id", &self.id)
            .field("bs_eui", &self.bs_eui)
            .field("peer_addr", &self.peer_addr)
            .field("state", &self.state())
            .finish()
    }
}
