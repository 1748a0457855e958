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

//! Per-basestation session state
//!
//! A [`Session`] holds the two session UUIDs, the cursor for server-issued
//! operation ids and the operations still waiting for their response.
//! Sessions are kept by the registry independently of sockets, so a
//! basestation that reconnects after its previous socket was torn down can
//! still resume and answer operations issued before the drop.

use bssci_codec::{Eui64, Message};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// First operation id handed out for server-issued messages
pub const FIRST_SERVER_OP_ID: i64 = -1;

/// Upper bound on unanswered server-issued operations per session
pub const MAX_PENDING_OPERATIONS: usize = 4096;

/// Age after which an unanswered operation is dropped on resume
pub const PENDING_OPERATION_TTL: Duration = Duration::from_secs(600);

/// A server-issued operation awaiting its response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    /// Command tag of the request
    pub command: &'static str,
    /// Endnode the request targeted, if any
    pub ep_eui: Option<Eui64>,
    /// When the request was written
    pub issued_at: Instant,
}

#[derive(Debug)]
struct SessionState {
    sn_bs_uuid: Option<Uuid>,
    sn_sc_uuid: Uuid,
    next_op_id: i64,
    // Server ids count down, so the last key is the earliest issued
    pending: BTreeMap<i64, PendingOperation>,
}

/// Outcome of a connect handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeOutcome {
    /// The previous session continues
    pub resumed: bool,
    /// Service center session UUID to report in `conRsp`
    pub sn_sc_uuid: Uuid,
}

/// Session state of one basestation
#[derive(Debug)]
pub struct Session {
    state: Mutex<SessionState>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create a fresh session with no basestation UUID recorded
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SessionState {
                sn_bs_uuid: None,
                sn_sc_uuid: Uuid::new_v4(),
                next_op_id: FIRST_SERVER_OP_ID,
                pending: BTreeMap::new(),
            }),
        }
    }

    /// Run the resume decision for an incoming `con`.
    ///
    /// The session resumes only when the basestation presents the same
    /// session UUID as last time. On resume the service center UUID is kept
    /// and, if the basestation reports the last server opId it saw, the
    /// cursor continues below it. Otherwise a new service center UUID is
    /// generated and the cursor restarts at -1.
    ///
    /// Pending operations follow the same decision: a resumed session keeps
    /// those younger than [`PENDING_OPERATION_TTL`], a new one forgets all.
    pub fn handshake(&self, sn_bs_uuid: Option<Uuid>, sn_sc_op_id: Option<i64>) -> HandshakeOutcome {
        let mut state = self.state.lock();

        let resumed = sn_bs_uuid.is_some() && sn_bs_uuid == state.sn_bs_uuid;
        if resumed {
            state.next_op_id = match sn_sc_op_id {
                Some(last) => last.min(0).saturating_sub(1),
                None => FIRST_SERVER_OP_ID,
            };
            state
                .pending
                .retain(|_, op| op.issued_at.elapsed() < PENDING_OPERATION_TTL);
        } else {
            state.sn_bs_uuid = sn_bs_uuid;
            state.sn_sc_uuid = Uuid::new_v4();
            state.next_op_id = FIRST_SERVER_OP_ID;
            state.pending.clear();
        }

        HandshakeOutcome {
            resumed,
            sn_sc_uuid: state.sn_sc_uuid,
        }
    }

    /// Take the next server-issued operation id (get-and-decrement)
    pub fn next_op_id(&self) -> i64 {
        let mut state = self.state.lock();
        let op_id = state.next_op_id;
        state.next_op_id = op_id.saturating_sub(1);
        op_id
    }

    /// Remember a server-issued operation until its response arrives
    ///
    /// At [`MAX_PENDING_OPERATIONS`] the earliest issued entry is evicted
    /// and returned.
    pub fn track_operation(&self, op_id: i64, message: &Message) -> Option<(i64, PendingOperation)> {
        let mut state = self.state.lock();
        let evicted = if state.pending.len() >= MAX_PENDING_OPERATIONS
            && !state.pending.contains_key(&op_id)
        {
            state.pending.pop_last()
        } else {
            None
        };
        state.pending.insert(
            op_id,
            PendingOperation {
                command: message.command(),
                ep_eui: message.ep_eui(),
                issued_at: Instant::now(),
            },
        );
        evicted
    }

    /// Drop a pending operation, returning what it was
    pub fn complete_operation(&self, op_id: i64) -> Option<PendingOperation> {
        self.state.lock().pending.remove(&op_id)
    }

    /// Number of unanswered server-issued operations
    pub fn pending_operations(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Basestation session UUID recorded at the last handshake
    pub fn sn_bs_uuid(&self) -> Option<Uuid> {
        self.state.lock().sn_bs_uuid
    }

    /// Current service center session UUID
    pub fn sn_sc_uuid(&self) -> Uuid {
        self.state.lock().sn_sc_uuid
    }
}
