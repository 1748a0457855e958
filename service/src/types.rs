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

//! Identifiers and read-only views shared across the service center

use bssci_codec::Eui64;
use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Handle for one accepted socket
///
/// Allocated from a process-wide counter. A basestation that reconnects
/// gets a fresh id, which lets the registry tell a stale connection
/// apart from the one that replaced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Lifecycle of a basestation connection
///
/// `Connecting -> Active -> Closed`. The value lives in an `AtomicU8`
/// inside [`BasestationConnection`](crate::BasestationConnection).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// `con` received, `conRsp` not yet written
    Connecting = 0,
    /// `conRsp` written; a later `conCmp` is a silent completion
    Active = 1,
    Closed = 2,
}

impl ConnectionState {
    /// Unknown discriminants decode as `Closed`
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Active,
            _ => Self::Closed,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// No transition leaves this state
    pub fn is_terminal(self) -> bool {
        self == Self::Closed
    }

    fn label(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Point-in-time view of one basestation connection
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub bs_eui: Eui64,
    pub state: ConnectionState,
    pub peer_addr: SocketAddr,
    pub created_at: Instant,
    /// Frames written to the basestation
    pub messages_sent: u64,
    /// Frames read from the basestation
    pub messages_received: u64,
    /// Server-issued operations still waiting for their response
    pub pending_operations: usize,
}

impl ConnectionInfo {
    /// Time since the socket was accepted
    pub fn duration(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// Point-in-time view of the listener
#[derive(Debug, Clone)]
pub struct ServerSnapshot {
    /// Open sockets, including those still in the handshake
    pub active_connections: u64,
    /// Basestations currently reachable through the registry
    pub registered_basestations: usize,
    /// Sockets accepted since start
    pub total_connections: u64,
    pub bind_address: SocketAddr,
    pub uptime: Duration,
    pub started_at: Instant,
}

impl fmt::Display for ServerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} basestations, {} open / {} accepted, up {}s)",
            self.bind_address,
            self.registered_basestations,
            self.active_connections,
            self.total_connections,
            self.uptime.as_secs()
        )
    }
}
