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

//! BSSCI Service Center
//!
//! This crate terminates BSSCI sessions from mioty basestations and exposes the
//! decoded traffic to an upstream integration through an [`EventSink`]:
//!
//! - TLS listener, with mutual TLS when a client CA is configured
//! - Connect handshake with session resumption
//! - Server-issued pings and status requests with decreasing opIds
//! - Per-command dispatch with completions, acknowledgements and error frames
//! - Outbound routing of upstream commands to the right basestation
//! - Lock-free metrics and monitoring
//!
//! # Architecture
//!
//! ```text
//! BssciServer ──→ BasestationRegistry ←── OutboundRouter
//!     ↓
//! ConnectionWorker → Dispatcher → EventSink
//!     ↓
//! BasestationConnection
//! ```
//!
//! # Example
//!
//! ```no_run
//! use bssci_service::{BssciServer, EventSink, ServerConfig, SinkError};
//! use bssci_codec::{BasestationEvent, EndnodeEvent, Eui64};
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct MySink;
//!
//! #[async_trait]
//! impl EventSink for MySink {
//!     fn on_subscription(&self, subscribe: bool, bs_eui: Eui64) {
//!         println!("{bs_eui} subscribed: {subscribe}");
//!     }
//!
//!     async fn basestation_event(&self, event: BasestationEvent) -> Result<(), SinkError> {
//!         println!("{} from {}", event.event_type, event.bs_eui);
//!         Ok(())
//!     }
//!
//!     async fn endnode_event(&self, event: EndnodeEvent) -> Result<(), SinkError> {
//!         println!("{} from {}", event.event_type, event.ep_eui);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let server = BssciServer::new(config, Arc::new(MySink)).await?;
//!     server.start().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod connection;
mod dispatch;
mod error;
mod handler;
mod metrics;
mod registry;
mod router;
mod server;
mod session;
mod tls;
mod types;
mod worker;

pub use config::{DEFAULT_PORT, ServerConfig, TlsSettings};
pub use connection::{
    BasestationConnection, BoxedTransport, FrameReader, FrameWriter, Transport, split_transport,
};
pub use dispatch::Dispatcher;
pub use error::{BssciError, ErrorKind, Result};
pub use handler::{CallbackSink, ChannelSink, EventSink, NoopSink, SinkError, SinkMessage};
pub use metrics::{MetricsSnapshot, ServerMetrics};
pub use registry::BasestationRegistry;
pub use router::OutboundRouter;
pub use server::BssciServer;
pub use session::{
    FIRST_SERVER_OP_ID, HandshakeOutcome, MAX_PENDING_OPERATIONS, PENDING_OPERATION_TTL,
    PendingOperation, Session,
};
pub use tls::{SELF_SIGNED_NAMES, build_acceptor, self_signed};
pub use types::{ConnectionId, ConnectionInfo, ConnectionState, ServerSnapshot};
pub use worker::{ConnectionWorker, WorkerConfig};
