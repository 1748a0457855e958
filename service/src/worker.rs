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

//! Connection worker implementation
//!
//! The ConnectionWorker is responsible for managing the lifecycle of a single
//! handshaked basestation, including:
//! - The inbound read loop
//! - The ping and status tickers
//! - Registry cleanup once the socket is done

use crate::{
    BasestationConnection, BasestationRegistry, BssciError, Dispatcher, FrameReader, Result,
    ServerConfig, ServerMetrics,
};
use bssci_codec::{Message, Ping, Status};
use futures_util::StreamExt;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

/// Worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Period of server-issued pings
    pub ping_interval: Duration,
    /// Period of server-issued status requests
    pub status_interval: Duration,
    /// Deadline for each frame write
    pub write_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(60),
            status_interval: Duration::from_secs(300),
            write_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&ServerConfig> for WorkerConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            ping_interval: config.ping_interval,
            status_interval: config.status_interval,
            write_timeout: config.write_timeout,
        }
    }
}

/// Connection worker that manages a single basestation's lifecycle
pub struct ConnectionWorker {
    connection: BasestationConnection,
    reader: FrameReader,
    dispatcher: Dispatcher,
    registry: Arc<BasestationRegistry>,
    metrics: Arc<ServerMetrics>,
    config: WorkerConfig,
}

impl ConnectionWorker {
    /// Create a new connection worker
    pub fn new(
        connection: BasestationConnection,
        reader: FrameReader,
        dispatcher: Dispatcher,
        registry: Arc<BasestationRegistry>,
        metrics: Arc<ServerMetrics>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            connection,
            reader,
            dispatcher,
            registry,
            metrics,
            config,
        }
    }

    /// Run the worker until the socket closes or the connection is cancelled
    ///
    /// On return the tickers are stopped, the registry entry is removed if it
    /// still belongs to this connection, and the socket is shut down.
    pub async fn run(mut self) {
        let bs_eui = self.connection.bs_eui();
        let id = self.connection.id();

        let ping = spawn_ticker(
            self.connection.clone(),
            self.metrics.clone(),
            self.config.ping_interval,
            self.config.write_timeout,
            || Ping { op_id: 0 }.into(),
        );
        let status = spawn_ticker(
            self.connection.clone(),
            self.metrics.clone(),
            self.config.status_interval,
            self.config.write_timeout,
            || Status { op_id: 0 }.into(),
        );

        match self.read_loop().await {
            Ok(()) => info!(bs_eui = %bs_eui, connection_id = %id, "Basestation disconnected"),
            Err(e) => {
                self.metrics.connection_error();
                warn!(
                    bs_eui = %bs_eui,
                    connection_id = %id,
                    error = %e,
                    "Basestation connection failed"
                );
            }
        }

        // Cleanup
        self.connection.cancel();
        let _ = ping.await;
        let _ = status.await;
        self.registry.remove_if(bs_eui, id);
        self.connection.close().await;
        counter!("bssci.connections.closed").increment(1);
        debug!(
            bs_eui = %bs_eui,
            connection_id = %id,
            duration = ?self.connection.created_at().elapsed(),
            "Connection worker finished"
        );
    }

    /// Main read loop
    async fn read_loop(&mut self) -> Result<()> {
        let cancel = self.connection.cancellation_token();
        loop {
            let next = select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                next = self.reader.next() => next,
            };

            let frame = match next {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(()),
            };
            self.connection.record_received(&frame.command);
            self.metrics.message_received();

            let Some(reply) = self.dispatcher.dispatch(&self.connection, frame).await else {
                continue;
            };
            match self.connection.write(&reply, self.config.write_timeout).await {
                Ok(()) => self.metrics.message_sent(),
                Err(e) if e.is_fatal_for_connection() => {
                    if matches!(e, BssciError::WriteTimeout(_)) {
                        self.metrics.timeout_error();
                    }
                    return Err(e);
                }
                Err(e) => warn!(
                    bs_eui = %self.connection.bs_eui(),
                    command = reply.command(),
                    error = %e,
                    "Reply not sent"
                ),
            }
        }
    }
}

impl std::fmt::Debug for ConnectionWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionWorker")
            .field("connection", &self.connection)
            .field("config", &self.config)
            .finish()
    }
}

/// Periodically send a server-issued message until the connection stops
fn spawn_ticker<F>(
    connection: BasestationConnection,
    metrics: Arc<ServerMetrics>,
    period: Duration,
    write_timeout: Duration,
    make: F,
) -> JoinHandle<()>
where
    F: Fn() -> Message + Send + 'static,
{
    tokio::spawn(async move {
        let cancel = connection.cancellation_token();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let mut message = make();
                    let op_id = connection.next_op_id();
                    message.set_op_id(op_id);
                    // Track first so a fast response always finds its entry
                    connection.track_operation(op_id, &message);

                    match connection.write(&message, write_timeout).await {
                        Ok(()) => metrics.message_sent(),
                        Err(e) => {
                            connection.complete_operation(op_id);
                            warn!(
                                bs_eui = %connection.bs_eui(),
                                command = message.command(),
                                op_id,
                                error = %e,
                                "Scheduled request failed"
                            );
                            if e.is_fatal_for_connection() {
                                break;
                            }
                        }
                    }
                }
            }
        }
    })
}
