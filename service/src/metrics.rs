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

//! In-process counters for the service center
//!
//! [`ServerMetrics`] backs [`BssciServer::metrics`](crate::BssciServer::metrics)
//! and is cheap enough to bump on every frame. Figures labelled per
//! basestation go through the `metrics` facade instead.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic relaxed counter
#[derive(Debug, Default)]
struct Counter(AtomicU64);

impl Counter {
    fn add(&self, value: u64) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    fn incr(&self) {
        self.add(1);
    }

    fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Process-wide counters shared by the accept loop and every worker
///
/// Each field is updated independently, so a [`MetricsSnapshot`] taken
/// under load may mix values from slightly different instants.
#[derive(Debug)]
pub struct ServerMetrics {
    accepted: Counter,
    open: AtomicU64,
    closed: Counter,
    lifetime_ns: Counter,

    handshakes: Counter,
    resumed: Counter,

    frames_out: Counter,
    frames_in: Counter,
    events: Counter,

    connection_errors: Counter,
    handshake_failures: Counter,
    protocol_errors: Counter,
    timeouts: Counter,

    started_at: Instant,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            accepted: Counter::default(),
            open: AtomicU64::new(0),
            closed: Counter::default(),
            lifetime_ns: Counter::default(),
            handshakes: Counter::default(),
            resumed: Counter::default(),
            frames_out: Counter::default(),
            frames_in: Counter::default(),
            events: Counter::default(),
            connection_errors: Counter::default(),
            handshake_failures: Counter::default(),
            protocol_errors: Counter::default(),
            timeouts: Counter::default(),
            started_at: Instant::now(),
        }
    }

    /// A socket was accepted
    pub fn connection_opened(&self) {
        self.accepted.incr();
        self.open.fetch_add(1, Ordering::Relaxed);
    }

    /// A socket went away after `lifetime`
    pub fn connection_closed(&self, lifetime: Duration) {
        self.open.fetch_sub(1, Ordering::Relaxed);
        self.closed.incr();
        self.lifetime_ns
            .add(u64::try_from(lifetime.as_nanos()).unwrap_or(u64::MAX));
    }

    /// `conRsp` was written; `resumed` mirrors its `snResume` flag
    pub fn handshake_completed(&self, resumed: bool) {
        self.handshakes.incr();
        if resumed {
            self.resumed.incr();
        }
    }

    /// Sockets currently open, handshaked or not
    pub fn active_connections(&self) -> u64 {
        self.open.load(Ordering::Relaxed)
    }

    pub fn total_connections(&self) -> u64 {
        self.accepted.get()
    }

    pub fn message_sent(&self) {
        self.frames_out.incr();
    }

    pub fn message_received(&self) {
        self.frames_in.incr();
    }

    /// An event was accepted by the upstream sink
    pub fn event_forwarded(&self) {
        self.events.incr();
    }

    /// A connection ended on an I/O or framing failure, or was refused
    pub fn connection_error(&self) {
        self.connection_errors.incr();
    }

    /// TLS setup or the `con` exchange failed
    pub fn handshake_failure(&self) {
        self.handshake_failures.incr();
    }

    /// An `error` frame was sent to a basestation
    pub fn protocol_error(&self) {
        self.protocol_errors.incr();
    }

    pub fn timeout_error(&self) {
        self.timeouts.incr();
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let closed = self.closed.get();
        let avg_connection_duration = match closed {
            0 => Duration::ZERO,
            n => Duration::from_nanos(self.lifetime_ns.get() / n),
        };
        MetricsSnapshot {
            total_connections: self.accepted.get(),
            active_connections: self.active_connections(),
            handshakes_completed: self.handshakes.get(),
            sessions_resumed: self.resumed.get(),
            messages_sent: self.frames_out.get(),
            messages_received: self.frames_in.get(),
            events_forwarded: self.events.get(),
            connection_errors: self.connection_errors.get(),
            handshake_failures: self.handshake_failures.get(),
            protocol_errors: self.protocol_errors.get(),
            timeout_errors: self.timeouts.get(),
            uptime: self.started_at.elapsed(),
            avg_connection_duration,
        }
    }
}

/// Copy of [`ServerMetrics`] at one moment
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Sockets accepted since start
    pub total_connections: u64,
    /// Sockets currently open
    pub active_connections: u64,
    pub handshakes_completed: u64,
    /// Handshakes answered with `snResume = true`
    pub sessions_resumed: u64,
    /// Frames written to basestations
    pub messages_sent: u64,
    /// Frames read from basestations
    pub messages_received: u64,
    pub events_forwarded: u64,
    pub connection_errors: u64,
    pub handshake_failures: u64,
    /// `error` frames sent
    pub protocol_errors: u64,
    pub timeout_errors: u64,
    pub uptime: Duration,
    /// Mean lifetime of sockets that have closed
    pub avg_connection_duration: Duration,
}

impl MetricsSnapshot {
    /// Sum of every error class
    pub fn total_errors(&self) -> u64 {
        self.connection_errors + self.handshake_failures + self.protocol_errors + self.timeout_errors
    }
}
