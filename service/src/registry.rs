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

//! Basestation registry
//!
//! The registry is responsible for:
//! - Mapping each basestation EUI to its one live connection
//! - Keeping session state across reconnects
//! - Telling the upstream sink when basestations come and go

use crate::{BasestationConnection, ConnectionId, ConnectionInfo, EventSink, Session};
use bssci_codec::Eui64;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use metrics::gauge;
use std::sync::Arc;
use tracing::{debug, info};

/// Concurrent map of connected basestations
pub struct BasestationRegistry {
    /// Live connections (lock-free concurrent map)
    connections: DashMap<Eui64, BasestationConnection>,
    /// Session state, kept after disconnects
    sessions: DashMap<Eui64, Arc<Session>>,
    /// Subscription listener
    sink: Arc<dyn EventSink>,
}

impl BasestationRegistry {
    /// Create an empty registry notifying `sink`
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            connections: DashMap::new(),
            sessions: DashMap::new(),
            sink,
        }
    }

    /// Get the connection of a basestation
    pub fn get(&self, bs_eui: Eui64) -> Option<BasestationConnection> {
        self.connections.get(&bs_eui).map(|entry| entry.value().clone())
    }

    /// Register a connection, replacing any previous one
    ///
    /// Fires a subscribe notification and returns the superseded connection,
    /// which the caller is expected to close. Notifications are sent while
    /// the entry is locked, so the sink must not call back into the registry.
    pub fn set(&self, connection: BasestationConnection) -> Option<BasestationConnection> {
        let bs_eui = connection.bs_eui();
        let id = connection.id();
        let previous = match self.connections.entry(bs_eui) {
            Entry::Occupied(mut entry) => {
                let old = entry.insert(connection);
                self.sink.on_subscription(true, bs_eui);
                Some(old)
            }
            Entry::Vacant(entry) => {
                entry.insert(connection);
                self.sink.on_subscription(true, bs_eui);
                None
            }
        };
        gauge!("bssci.basestations.registered").set(self.connections.len() as f64);

        match &previous {
            Some(old) => info!(
                bs_eui = %bs_eui,
                connection_id = %id,
                superseded = %old.id(),
                "Basestation re-registered"
            ),
            None => info!(bs_eui = %bs_eui, connection_id = %id, "Basestation registered"),
        }
        previous
    }

    /// Remove a basestation unconditionally
    ///
    /// Fires an unsubscribe notification before the entry is deleted.
    pub fn remove(&self, bs_eui: Eui64) -> Option<BasestationConnection> {
        self.remove_matching(bs_eui, |_| true)
    }

    /// Remove a basestation only if `id` still owns the entry
    ///
    /// A connection that was superseded must not unregister its successor.
    pub fn remove_if(&self, bs_eui: Eui64, id: ConnectionId) -> bool {
        let removed = self.remove_matching(bs_eui, |conn| conn.id() == id).is_some();
        debug!(bs_eui = %bs_eui, connection_id = %id, removed, "Basestation unregistered");
        removed
    }

    // Ownership check, unsubscribe and delete happen under one entry lock
    fn remove_matching(
        &self,
        bs_eui: Eui64,
        owns: impl FnOnce(&BasestationConnection) -> bool,
    ) -> Option<BasestationConnection> {
        let removed = match self.connections.entry(bs_eui) {
            Entry::Occupied(entry) if owns(entry.get()) => {
                self.sink.on_subscription(false, bs_eui);
                Some(entry.remove())
            }
            _ => None,
        };
        if removed.is_some() {
            gauge!("bssci.basestations.registered").set(self.connections.len() as f64);
        }
        removed
    }

    /// Get or create the session of a basestation
    pub fn session(&self, bs_eui: Eui64) -> Arc<Session> {
        self.sessions
            .entry(bs_eui)
            .or_insert_with(|| Arc::new(Session::new()))
            .clone()
    }

    /// Number of registered basestations
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Check if no basestation is registered
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Check if a basestation is registered
    pub fn contains(&self, bs_eui: Eui64) -> bool {
        self.connections.contains_key(&bs_eui)
    }

    /// EUIs of all registered basestations
    pub fn basestations(&self) -> Vec<Eui64> {
        self.connections.iter().map(|entry| *entry.key()).collect()
    }

    /// All registered connections
    pub fn connections(&self) -> Vec<BasestationConnection> {
        self.connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Info snapshots of all registered connections
    pub fn connection_infos(&self) -> Vec<ConnectionInfo> {
        self.connections
            .iter()
            .map(|entry| entry.value().info())
            .collect()
    }

    /// Close every registered connection
    pub async fn close_all(&self) {
        for connection in self.connections() {
            connection.close().await;
        }
    }
}

impl std::fmt::Debug for BasestationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasestationRegistry")
            .field("connections", &self.connections.len())
            .field("sessions", &self.sessions.len())
            .finish()
    }
}
