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

//! BSSCI server implementation
//!
//! The BssciServer is the main entry point of the service center. It owns the
//! TLS listener, accepts basestation sockets, drives the connect handshake and
//! hands every handshaked basestation to a [`ConnectionWorker`].

use crate::{
    BasestationConnection, BasestationRegistry, BssciError, ConnectionId, ConnectionWorker,
    Dispatcher, EventSink, FrameReader, OutboundRouter, Result, ServerConfig, ServerMetrics,
    ServerSnapshot, Transport, WorkerConfig, build_acceptor, split_transport,
};
use bssci_codec::{
    BssciCodec, Command, Connect, ConnectRsp, IntoEvent, Message, PROTOCOL_VERSION,
    ServerCommand, ServerResponse,
};
use futures_util::StreamExt;
use metrics::{counter, gauge};
use socket2::{SockRef, TcpKeepalive};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, instrument, warn};

/// How long shutdown waits for the accept loop to stop
const ACCEPT_LOOP_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Back off after a failed accept
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// BSSCI service center server
///
/// # Example
///
/// ```no_run
/// use bssci_service::{BssciServer, NoopSink, ServerConfig};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ServerConfig::default();
///     let server = BssciServer::new(config, Arc::new(NoopSink)).await?;
///
///     server.start().await?;
///
///     // Server is now running, wait for shutdown signal
///     // tokio::signal::ctrl_c().await?;
///     server.shutdown(true).await?;
///
///     Ok(())
/// }
/// ```
pub struct BssciServer {
    /// State shared with the accept loop and connection tasks
    shared: Arc<Shared>,
    /// TCP listener
    listener: Arc<TcpListener>,
    /// TLS acceptor wrapping every accepted socket
    acceptor: TlsAcceptor,
    /// Actual bind address
    bind_address: SocketAddr,
    /// Server start time
    started_at: Instant,
    /// Running flag
    running: Arc<AtomicBool>,
    /// Shutdown notification
    shutdown_notify: Arc<Notify>,
    /// Accept loop task handle
    accept_handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl BssciServer {
    /// Create a new server with the given configuration
    ///
    /// This validates the configuration, prepares TLS and binds the listener,
    /// but does not start accepting connections. Call `start()` for that.
    pub async fn new(config: ServerConfig, sink: Arc<dyn EventSink>) -> Result<Self> {
        config.validate().map_err(BssciError::Config)?;
        let acceptor = build_acceptor(&config.tls).await?;

        let listener = TcpListener::bind(config.bind_address).await?;
        let bind_address = listener.local_addr()?;

        let metrics = Arc::new(ServerMetrics::new());
        let registry = Arc::new(BasestationRegistry::new(sink.clone()));
        let shared = Arc::new(Shared {
            worker_config: WorkerConfig::from(&config),
            dispatcher: Dispatcher::new(sink, metrics.clone()),
            router: OutboundRouter::new(registry.clone(), metrics.clone(), config.write_timeout),
            registry,
            metrics,
            config,
            next_connection_id: AtomicU64::new(1),
        });

        info!(bind_address = %bind_address, "BSSCI server bound");

        Ok(Self {
            shared,
            listener: Arc::new(listener),
            acceptor,
            bind_address,
            started_at: Instant::now(),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_notify: Arc::new(Notify::new()),
            accept_handle: tokio::sync::Mutex::new(None),
        })
    }

    /// Start accepting basestations
    pub async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(BssciError::AlreadyRunning);
        }

        info!(bind_address = %self.bind_address, "Starting BSSCI server");

        let handle = self.spawn_accept_loop();
        *self.accept_handle.lock().await = Some(handle);
        Ok(())
    }

    /// Spawn the accept loop task
    fn spawn_accept_loop(&self) -> JoinHandle<()> {
        let listener = self.listener.clone();
        let acceptor = self.acceptor.clone();
        let shared = self.shared.clone();
        let running = self.running.clone();
        let shutdown_notify = self.shutdown_notify.clone();

        tokio::spawn(async move {
            loop {
                if !running.load(Ordering::SeqCst) {
                    break;
                }

                let accept_result = tokio::select! {
                    result = listener.accept() => result,
                    _ = shutdown_notify.notified() => break,
                };

                match accept_result {
                    Ok((socket, peer_addr)) => {
                        debug!(peer_addr = %peer_addr, "Accepted connection");

                        let max = shared.config.max_connections;
                        if shared.metrics.active_connections() >= max as u64 {
                            warn!(
                                peer_addr = %peer_addr,
                                max_connections = max,
                                "Connection limit reached, rejecting connection"
                            );
                            shared.metrics.connection_error();
                            drop(socket);
                            continue;
                        }

                        if let Some(keepalive) = shared.config.keepalive
                            && let Err(e) = set_keepalive(&socket, keepalive)
                        {
                            warn!(peer_addr = %peer_addr, error = %e, "Failed to enable TCP keepalive");
                        }

                        let guard = ActiveConnection::open(shared.metrics.clone());
                        let shared = shared.clone();
                        let acceptor = acceptor.clone();
                        tokio::spawn(async move {
                            let _guard = guard;
                            if let Err(e) = shared.accept_tls(acceptor, socket, peer_addr).await {
                                debug!(peer_addr = %peer_addr, error = %e, "Connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                        shared.metrics.connection_error();
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                }
            }

            info!("Accept loop terminated");
        })
    }

    /// Serve one basestation over an already secured stream
    ///
    /// Runs the connect handshake and the connection worker to completion.
    /// The listener uses this for every TLS socket; it is public so other
    /// transports can be plugged in.
    pub async fn serve_stream<T: Transport>(&self, stream: T, peer_addr: SocketAddr) -> Result<()> {
        let _guard = ActiveConnection::open(self.shared.metrics.clone());
        self.shared.serve(stream, peer_addr).await
    }

    /// Shutdown the server
    ///
    /// This stops accepting new sockets. Handshaked basestations keep running
    /// until their sockets close unless `close_connections` is set, in which
    /// case every registered connection is closed as well.
    pub async fn shutdown(&self, close_connections: bool) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(BssciError::ServerNotRunning);
        }

        info!("Shutting down BSSCI server");

        self.shutdown_notify.notify_one();

        if let Some(handle) = self.accept_handle.lock().await.take() {
            let _ = tokio::time::timeout(ACCEPT_LOOP_SHUTDOWN_TIMEOUT, handle).await;
        }

        if close_connections {
            self.shared.registry.close_all().await;
        }

        info!("BSSCI server shutdown complete");
        Ok(())
    }

    /// Send a service center command to its basestation, returning the opId used
    pub async fn handle_server_command(&self, command: ServerCommand) -> Result<i64> {
        self.shared.router.handle_server_command(command).await
    }

    /// Send an upstream answer to a basestation-initiated operation
    pub async fn handle_server_response(&self, response: ServerResponse) -> Result<()> {
        self.shared.router.handle_server_response(response).await
    }

    /// Cloneable handle for outbound traffic
    pub fn router(&self) -> OutboundRouter {
        self.shared.router.clone()
    }

    /// Check if the server is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the server's bind address
    pub fn local_addr(&self) -> SocketAddr {
        self.bind_address
    }

    /// Get a snapshot of the server state
    pub fn snapshot(&self) -> ServerSnapshot {
        ServerSnapshot {
            active_connections: self.shared.metrics.active_connections(),
            registered_basestations: self.shared.registry.len(),
            total_connections: self.shared.metrics.total_connections(),
            bind_address: self.bind_address,
            uptime: self.started_at.elapsed(),
            started_at: self.started_at,
        }
    }

    /// Get the server metrics
    pub fn metrics(&self) -> Arc<ServerMetrics> {
        self.shared.metrics.clone()
    }

    /// Get the basestation registry
    pub fn registry(&self) -> Arc<BasestationRegistry> {
        self.shared.registry.clone()
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.shared.config
    }
}

impl std::fmt::Debug for BssciServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BssciServer")
            .field("bind_address", &self.bind_address)
            .field("running", &self.is_running())
            .field("basestations", &self.shared.registry.len())
            .field("uptime", &self.started_at.elapsed())
            .finish()
    }
}

impl Drop for BssciServer {
    fn drop(&mut self) {
        if self.running.load(Ordering::SeqCst) {
            warn!("BssciServer dropped while still running");
            self.running.store(false, Ordering::SeqCst);
            self.shutdown_notify.notify_one();
        }
    }
}

/// State shared by the accept loop and every connection task
struct Shared {
    config: ServerConfig,
    worker_config: WorkerConfig,
    registry: Arc<BasestationRegistry>,
    metrics: Arc<ServerMetrics>,
    dispatcher: Dispatcher,
    router: OutboundRouter,
    next_connection_id: AtomicU64,
}

impl Shared {
    /// Finish the TLS handshake, then serve the basestation
    async fn accept_tls(
        &self,
        acceptor: TlsAcceptor,
        socket: TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<()> {
        let timeout = self.config.handshake_timeout;
        let stream = match tokio::time::timeout(timeout, acceptor.accept(socket)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                self.metrics.handshake_failure();
                warn!(peer_addr = %peer_addr, error = %e, "TLS handshake failed");
                return Err(BssciError::Tls(e.to_string()));
            }
            Err(_) => {
                self.metrics.handshake_failure();
                self.metrics.timeout_error();
                warn!(peer_addr = %peer_addr, "TLS handshake timed out");
                return Err(BssciError::HandshakeTimeout(timeout));
            }
        };
        self.serve(stream, peer_addr).await
    }

    /// Run the connect handshake and then the worker
    #[instrument(skip_all, fields(peer_addr = %peer_addr))]
    async fn serve<T: Transport>(&self, stream: T, peer_addr: SocketAddr) -> Result<()> {
        let codec = BssciCodec::with_max_payload_len(self.config.max_payload_len);
        let (mut reader, writer) = split_transport(stream, codec);

        let connect = match self.read_connect(&mut reader).await {
            Ok(connect) => connect,
            Err(e) => {
                self.metrics.handshake_failure();
                if matches!(e, BssciError::HandshakeTimeout(_)) {
                    self.metrics.timeout_error();
                }
                if e.is_protocol_error() {
                    self.metrics.protocol_error();
                }
                counter!("bssci.handshakes.failed").increment(1);
                warn!(error = %e, "Connect handshake failed, closing socket");
                return Err(e);
            }
        };

        let bs_eui = connect.bs_eui;
        let session = self.registry.session(bs_eui);
        let outcome = session.handshake(connect.sn_bs_uuid, connect.sn_sc_op_id);

        let id = ConnectionId::new(self.next_connection_id.fetch_add(1, Ordering::Relaxed));
        let connection = BasestationConnection::new(id, bs_eui, peer_addr, writer, session);
        if let Some(previous) = self.registry.set(connection.clone()) {
            info!(
                bs_eui = %bs_eui,
                superseded = %previous.id(),
                "Closing superseded connection"
            );
            previous.close().await;
        }

        info!(
            bs_eui = %bs_eui,
            connection_id = %id,
            resumed = outcome.resumed,
            sn_sc_uuid = %outcome.sn_sc_uuid,
            vendor = connect.vendor.as_deref().unwrap_or("-"),
            model = connect.model.as_deref().unwrap_or("-"),
            "Basestation connected"
        );

        let op_id = connect.op_id;
        if let Err(e) = self.dispatcher.forward(connect.into_event(bs_eui)).await {
            warn!(bs_eui = %bs_eui, error = %e, "Connect event not forwarded");
        }

        let response = Message::from(ConnectRsp {
            op_id,
            version: PROTOCOL_VERSION.to_string(),
            sn_resume: outcome.resumed,
            sn_sc_uuid: outcome.sn_sc_uuid,
        });
        if let Err(e) = connection.write(&response, self.config.write_timeout).await {
            warn!(bs_eui = %bs_eui, error = %e, "Connect response not sent");
            self.metrics.handshake_failure();
            self.registry.remove_if(bs_eui, id);
            connection.close().await;
            return Err(e);
        }
        self.metrics.message_sent();

        connection.mark_active();
        self.metrics.handshake_completed(outcome.resumed);
        counter!("bssci.handshakes.completed", "resumed" => outcome.resumed.to_string())
            .increment(1);

        ConnectionWorker::new(
            connection,
            reader,
            self.dispatcher.clone(),
            self.registry.clone(),
            self.metrics.clone(),
            self.worker_config.clone(),
        )
        .run()
        .await;
        Ok(())
    }

    /// Read the first frame, which must be a connect
    async fn read_connect(&self, reader: &mut FrameReader) -> Result<Connect> {
        let timeout = self.config.handshake_timeout;
        let frame = match tokio::time::timeout(timeout, reader.next()).await {
            Ok(Some(frame)) => frame?,
            Ok(None) => return Err(BssciError::ConnectionClosed),
            Err(_) => return Err(BssciError::HandshakeTimeout(timeout)),
        };
        self.metrics.message_received();

        if frame.command != Connect::COMMAND {
            return Err(BssciError::HandshakeViolation {
                command: frame.command,
            });
        }
        match frame.decode_message()? {
            Message::Connect(connect) => Ok(connect),
            other => Err(BssciError::HandshakeViolation {
                command: other.command().to_string(),
            }),
        }
    }
}

/// Counts a socket as active for as long as it is held
struct ActiveConnection {
    metrics: Arc<ServerMetrics>,
    opened_at: Instant,
}

impl ActiveConnection {
    fn open(metrics: Arc<ServerMetrics>) -> Self {
        metrics.connection_opened();
        gauge!("bssci.connections.active").increment(1.0);
        Self {
            metrics,
            opened_at: Instant::now(),
        }
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        self.metrics.connection_closed(self.opened_at.elapsed());
        gauge!("bssci.connections.active").decrement(1.0);
    }
}

fn set_keepalive(socket: &TcpStream, time: Duration) -> std::io::Result<()> {
    SockRef::from(socket).set_tcp_keepalive(&TcpKeepalive::new().with_time(time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FrameWriter, NoopSink};
    use bssci_codec::{Eui64, Ping, PingRsp};
    use futures_util::SinkExt;
    use uuid::Uuid;

    fn local_config() -> ServerConfig {
        ServerConfig::new("127.0.0.1:0".parse().unwrap())
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn connect(bs_eui: Eui64, sn_bs_uuid: Uuid) -> Message {
        Message::from(Connect {
            op_id: 0,
            version: PROTOCOL_VERSION.to_string(),
            bs_eui,
            bidi: true,
            sn_bs_uuid: Some(sn_bs_uuid),
            ..Default::default()
        })
    }

    fn duplex_peer() -> (tokio::io::DuplexStream, FrameReader, FrameWriter) {
        let (local, remote) = tokio::io::duplex(64 * 1024);
        let (reader, writer) = split_transport(remote, BssciCodec::new());
        (local, reader, writer)
    }

    #[tokio::test]
    async fn test_server_lifecycle() {
        let server = BssciServer::new(local_config(), Arc::new(NoopSink)).await.unwrap();
        assert!(!server.is_running());

        server.start().await.unwrap();
        assert!(server.is_running());

        tokio::time::sleep(Duration::from_millis(50)).await;

        server.shutdown(true).await.unwrap();
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn test_server_snapshot() {
        let server = BssciServer::new(local_config(), Arc::new(NoopSink)).await.unwrap();
        let snapshot = server.snapshot();

        assert_eq!(snapshot.active_connections, 0);
        assert_eq!(snapshot.registered_basestations, 0);
        assert_eq!(snapshot.total_connections, 0);
        assert_ne!(snapshot.bind_address.port(), 0);
    }

    #[tokio::test]
    async fn test_server_double_start() {
        let server = BssciServer::new(local_config(), Arc::new(NoopSink)).await.unwrap();
        server.start().await.unwrap();

        assert!(matches!(server.start().await, Err(BssciError::AlreadyRunning)));

        server.shutdown(false).await.unwrap();
        assert!(matches!(server.shutdown(false).await, Err(BssciError::ServerNotRunning)));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = local_config().with_ping_interval(Duration::ZERO);
        let result = BssciServer::new(config, Arc::new(NoopSink)).await;
        assert!(matches!(result, Err(BssciError::Config(_))));
    }

    #[tokio::test]
    async fn test_handshake_over_stream() {
        let server = Arc::new(BssciServer::new(local_config(), Arc::new(NoopSink)).await.unwrap());
        let (local, mut reader, mut writer) = duplex_peer();
        let bs_eui = Eui64::from_u64(0xbeef);

        let task = tokio::spawn({
            let server = server.clone();
            async move { server.serve_stream(local, peer()).await }
        });

        writer.send(connect(bs_eui, Uuid::new_v4())).await.unwrap();
        let reply = reader.next().await.unwrap().unwrap().decode_message().unwrap();
        match reply {
            Message::ConnectRsp(rsp) => {
                assert_eq!(rsp.op_id, 0);
                assert_eq!(rsp.version, PROTOCOL_VERSION);
                assert!(!rsp.sn_resume);
            }
            other => panic!("unexpected {:?}", other),
        }
        let connection = server.registry().get(bs_eui).unwrap();
        assert_eq!(connection.state(), crate::ConnectionState::Active);

        // No conCmp is sent; traffic is served regardless
        writer.send(Message::from(Ping { op_id: 9 })).await.unwrap();
        let reply = reader.next().await.unwrap().unwrap().decode_message().unwrap();
        assert_eq!(reply, Message::from(PingRsp { op_id: 9 }));

        drop(writer);
        drop(reader);
        task.await.unwrap().unwrap();

        assert!(!server.registry().contains(bs_eui));
        assert_eq!(connection.state(), crate::ConnectionState::Closed);
        let metrics = server.metrics().snapshot();
        assert_eq!(metrics.handshakes_completed, 1);
        assert_eq!(metrics.active_connections, 0);
    }

    #[tokio::test]
    async fn test_first_frame_must_be_connect() {
        let server = BssciServer::new(local_config(), Arc::new(NoopSink)).await.unwrap();
        let (local, mut reader, mut writer) = duplex_peer();

        writer.send(Message::from(Ping { op_id: 1 })).await.unwrap();
        let result = server.serve_stream(local, peer()).await;

        assert!(matches!(
            result,
            Err(BssciError::HandshakeViolation { ref command }) if command == "ping"
        ));
        // Socket closed without a reply
        assert!(reader.next().await.is_none());
        assert_eq!(server.metrics().snapshot().handshake_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_timeout() {
        let config = local_config().with_handshake_timeout(Duration::from_secs(2));
        let server = BssciServer::new(config, Arc::new(NoopSink)).await.unwrap();
        let (local, _reader, _writer) = duplex_peer();

        let result = server.serve_stream(local, peer()).await;
        assert!(matches!(result, Err(BssciError::HandshakeTimeout(_))));
    }
}
