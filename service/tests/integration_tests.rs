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

//! Integration tests for the bssci-service crate over real TLS sockets

use bssci_codec::{
    BssciCodec, Connect, ConnectRsp, Eui64, Message, PROTOCOL_VERSION, Ping, PingRsp,
    ServerCommand, ServerCommandKind,
};
use bssci_service::{
    BssciError, BssciServer, FrameReader, FrameWriter, NoopSink, ServerConfig, split_transport,
};
use futures_util::{SinkExt, StreamExt};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::time::{Duration, sleep, timeout};
use tokio_rustls::TlsConnector;
use uuid::Uuid;

/// The server presents a self-signed certificate in these tests
#[derive(Debug)]
struct AcceptAnyServerCert(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

/// Helper to build a TLS connector trusting any server
fn connector() -> TlsConnector {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .unwrap()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert(provider)))
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
}

/// Helper to open a framed TLS session to the server
async fn dial(addr: SocketAddr) -> std::io::Result<(FrameReader, FrameWriter)> {
    let tcp = TcpStream::connect(addr).await?;
    let server_name = ServerName::try_from("localhost").unwrap();
    let tls = connector().connect(server_name, tcp).await?;
    Ok(split_transport(tls, BssciCodec::new()))
}

/// Helper to start a server on an ephemeral port
async fn start_server(config: ServerConfig) -> BssciServer {
    let server = BssciServer::new(config, Arc::new(NoopSink)).await.unwrap();
    server.start().await.unwrap();
    server
}

fn local_config() -> ServerConfig {
    ServerConfig::new("127.0.0.1:0".parse().unwrap())
}

fn connect(bs_eui: Eui64, sn_bs_uuid: Uuid, sn_sc_op_id: Option<i64>) -> Message {
    Message::from(Connect {
        op_id: 0,
        version: PROTOCOL_VERSION.to_string(),
        bs_eui,
        bidi: true,
        vendor: Some("Acme".to_string()),
        sn_bs_uuid: Some(sn_bs_uuid),
        sn_sc_op_id,
        ..Default::default()
    })
}

/// Helper to run the connect handshake, returning the connect response
async fn handshake(
    reader: &mut FrameReader,
    writer: &mut FrameWriter,
    connect: Message,
) -> ConnectRsp {
    writer.send(connect).await.unwrap();
    let frame = timeout(Duration::from_secs(5), reader.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    match frame.decode_message().unwrap() {
        Message::ConnectRsp(rsp) => rsp,
        other => panic!("expected conRsp, got {:?}", other),
    }
}

/// Helper to wait until the registry reaches an expected state
async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_end_to_end_over_tls() {
    let server = start_server(local_config()).await;
    let registry = server.registry();
    let bs_eui = Eui64::from_u64(0x70b3_d59c_d000_0001);

    let (mut reader, mut writer) = dial(server.local_addr()).await.unwrap();

    let rsp = handshake(&mut reader, &mut writer, connect(bs_eui, Uuid::new_v4(), None)).await;
    assert_eq!(rsp.op_id, 0);
    assert!(!rsp.sn_resume);
    assert_eq!(rsp.version, PROTOCOL_VERSION);
    assert!(registry.contains(bs_eui));

    writer.send(Message::from(Ping { op_id: 5 })).await.unwrap();
    let reply = reader.next().await.unwrap().unwrap().decode_message().unwrap();
    assert_eq!(reply, Message::from(PingRsp { op_id: 5 }));

    // Socket drops
    drop(writer);
    drop(reader);
    wait_for(|| !registry.contains(bs_eui)).await;

    let metrics = server.metrics().snapshot();
    assert_eq!(metrics.handshakes_completed, 1);
    assert!(metrics.messages_received >= 2);

    server.shutdown(true).await.unwrap();
}

#[tokio::test]
async fn test_server_command_reaches_basestation() {
    let server = start_server(local_config()).await;
    let bs_eui = Eui64::from_u64(0x10);

    let (mut reader, mut writer) = dial(server.local_addr()).await.unwrap();
    handshake(&mut reader, &mut writer, connect(bs_eui, Uuid::new_v4(), None)).await;

    let op_id = server
        .handle_server_command(ServerCommand::new(bs_eui, ServerCommandKind::RequestStatus))
        .await
        .unwrap();
    assert_eq!(op_id, -1);

    let frame = reader.next().await.unwrap().unwrap();
    assert_eq!(frame.command, "status");
    assert_eq!(frame.op_id, -1);

    let err = server
        .handle_server_command(ServerCommand::new(
            Eui64::from_u64(0x11),
            ServerCommandKind::RequestStatus,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, BssciError::NotConnected(_)));

    server.shutdown(true).await.unwrap();
}

#[tokio::test]
async fn test_session_resume_across_reconnect() {
    let server = start_server(local_config()).await;
    let registry = server.registry();
    let router = server.router();
    let bs_eui = Eui64::from_u64(0x20);
    let sn_bs_uuid = Uuid::new_v4();

    let (mut reader, mut writer) = dial(server.local_addr()).await.unwrap();
    let first = handshake(&mut reader, &mut writer, connect(bs_eui, sn_bs_uuid, None)).await;
    assert!(!first.sn_resume);

    for expected in [-1, -2] {
        let op_id = router
            .handle_server_command(ServerCommand::new(bs_eui, ServerCommandKind::RequestStatus))
            .await
            .unwrap();
        assert_eq!(op_id, expected);
    }

    drop(writer);
    drop(reader);
    wait_for(|| !registry.contains(bs_eui)).await;

    // Same basestation session, last seen opId -2
    let (mut reader, mut writer) = dial(server.local_addr()).await.unwrap();
    let resumed = handshake(&mut reader, &mut writer, connect(bs_eui, sn_bs_uuid, Some(-2))).await;
    assert!(resumed.sn_resume);
    assert_eq!(resumed.sn_sc_uuid, first.sn_sc_uuid);

    let op_id = router
        .handle_server_command(ServerCommand::new(bs_eui, ServerCommandKind::RequestStatus))
        .await
        .unwrap();
    assert_eq!(op_id, -3);

    drop(writer);
    drop(reader);
    wait_for(|| !registry.contains(bs_eui)).await;

    // A new basestation session starts over
    let (mut reader, mut writer) = dial(server.local_addr()).await.unwrap();
    let fresh = handshake(&mut reader, &mut writer, connect(bs_eui, Uuid::new_v4(), Some(-3))).await;
    assert!(!fresh.sn_resume);
    assert_ne!(fresh.sn_sc_uuid, first.sn_sc_uuid);

    let op_id = router
        .handle_server_command(ServerCommand::new(bs_eui, ServerCommandKind::RequestStatus))
        .await
        .unwrap();
    assert_eq!(op_id, -1);

    assert_eq!(server.metrics().snapshot().sessions_resumed, 1);
    server.shutdown(true).await.unwrap();
}

#[tokio::test]
async fn test_reconnect_supersedes_stale_connection() {
    let server = start_server(local_config()).await;
    let registry = server.registry();
    let bs_eui = Eui64::from_u64(0x30);

    let (mut old_reader, mut old_writer) = dial(server.local_addr()).await.unwrap();
    handshake(&mut old_reader, &mut old_writer, connect(bs_eui, Uuid::new_v4(), None)).await;
    let old_id = registry.get(bs_eui).unwrap().id();

    let (mut reader, mut writer) = dial(server.local_addr()).await.unwrap();
    handshake(&mut reader, &mut writer, connect(bs_eui, Uuid::new_v4(), None)).await;
    let new_id = registry.get(bs_eui).unwrap().id();
    assert_ne!(old_id, new_id);

    // The stale socket is closed by the server
    let next = timeout(Duration::from_secs(5), old_reader.next()).await.unwrap();
    assert!(!matches!(next, Some(Ok(_))));

    // Its teardown must not unregister the successor
    sleep(Duration::from_millis(100)).await;
    assert_eq!(registry.get(bs_eui).unwrap().id(), new_id);

    writer.send(Message::from(Ping { op_id: 1 })).await.unwrap();
    let reply = reader.next().await.unwrap().unwrap();
    assert_eq!(reply.command, "pingRsp");

    server.shutdown(true).await.unwrap();
}

#[tokio::test]
async fn test_connection_limit() {
    let server = start_server(local_config().with_max_connections(1)).await;
    let bs_eui = Eui64::from_u64(0x40);

    let (mut reader, mut writer) = dial(server.local_addr()).await.unwrap();
    handshake(&mut reader, &mut writer, connect(bs_eui, Uuid::new_v4(), None)).await;

    // The second socket is dropped before TLS completes
    assert!(dial(server.local_addr()).await.is_err());
    assert_eq!(server.snapshot().active_connections, 1);
    assert!(server.metrics().snapshot().connection_errors >= 1);

    server.shutdown(true).await.unwrap();
}

#[tokio::test]
async fn test_shutdown_closes_basestations() {
    let server = start_server(local_config()).await;
    let registry = server.registry();
    let bs_eui = Eui64::from_u64(0x50);

    let (mut reader, mut writer) = dial(server.local_addr()).await.unwrap();
    handshake(&mut reader, &mut writer, connect(bs_eui, Uuid::new_v4(), None)).await;

    server.shutdown(true).await.unwrap();

    let next = timeout(Duration::from_secs(5), reader.next()).await.unwrap();
    assert!(!matches!(next, Some(Ok(_))));
    wait_for(|| registry.is_empty()).await;
    assert!(!server.is_running());
}
