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

//! Inbound message dispatch
//!
//! Maps every frame a basestation sends to at most one reply:
//!
//! | Inbound                                   | Behaviour                         |
//! |-------------------------------------------|-----------------------------------|
//! | `ping`, `pingRsp`, `error`                | reply only                        |
//! | `att`, `det`                              | forward, reply comes from upstream|
//! | `ulData`, `dlRxStat`, `dlDataRes`, `vm.ulData` | forward, then `*Rsp`         |
//! | responses to server-issued requests       | forward, then `*Cmp`              |
//! | completions and `errorAck`                | nothing                           |
//! | anything else                             | `error` frame                     |

use crate::{BasestationConnection, BssciError, EventSink, Result, ServerMetrics};
use bssci_codec::{
    AttachPropagateCmp, DetachPropagateCmp, DownlinkQueueCmp, DownlinkResultRsp,
    DownlinkRevokeCmp, DownlinkRxStatusRsp, ERROR_MALFORMED_MESSAGE, ERROR_UNABLE_TO_HANDLE,
    ERROR_UNEXPECTED_COMMAND, ERROR_UNSUPPORTED_COMMAND, EndnodeEvent, ErrorAck, Event, Frame,
    Message, MessageError, PingCmp, PingRsp, ProtocolError, StatusCmp, UplinkDataRsp,
    VmActivateCmp, VmDeactivateCmp, VmStatusCmp, VmUplinkDataRsp,
};
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Decides how to answer inbound frames
#[derive(Clone)]
pub struct Dispatcher {
    sink: Arc<dyn EventSink>,
    metrics: Arc<ServerMetrics>,
}

impl Dispatcher {
    /// Create a dispatcher forwarding to `sink`
    pub fn new(sink: Arc<dyn EventSink>, metrics: Arc<ServerMetrics>) -> Self {
        Self { sink, metrics }
    }

    /// Handle one inbound frame, returning the reply to send, if any
    pub async fn dispatch(
        &self,
        connection: &BasestationConnection,
        frame: Frame,
    ) -> Option<Message> {
        match frame.decode_message() {
            Ok(message) => self.handle(connection, message).await,
            Err(MessageError::UnknownCommand { command, op_id }) => {
                warn!(
                    bs_eui = %connection.bs_eui(),
                    command = %command,
                    op_id,
                    "Unsupported command"
                );
                Some(self.protocol_error(
                    connection,
                    op_id,
                    ERROR_UNSUPPORTED_COMMAND,
                    format!("unsupported command '{}'", command),
                ))
            }
            Err(MessageError::Malformed {
                command,
                op_id,
                reason,
            }) => {
                warn!(
                    bs_eui = %connection.bs_eui(),
                    command = %command,
                    op_id,
                    reason = %reason,
                    "Malformed message"
                );
                Some(self.protocol_error(
                    connection,
                    op_id,
                    ERROR_MALFORMED_MESSAGE,
                    format!("malformed '{}': {}", command, reason),
                ))
            }
        }
    }

    /// Handle one decoded message, returning the reply to send, if any
    pub async fn handle(
        &self,
        connection: &BasestationConnection,
        message: Message,
    ) -> Option<Message> {
        let bs_eui = connection.bs_eui();
        let op_id = message.op_id();
        trace!(bs_eui = %bs_eui, command = message.command(), op_id, "Dispatching");

        match message {
            Message::Ping(_) => Some(PingRsp { op_id }.into()),
            Message::PingRsp(_) => {
                connection.complete_operation(op_id);
                Some(PingCmp { op_id }.into())
            }
            Message::ProtocolError(report) => {
                warn!(
                    bs_eui = %bs_eui,
                    op_id,
                    code = report.code,
                    message = %report.message,
                    "Basestation reported an error"
                );
                Some(ErrorAck { op_id }.into())
            }

            // Upstream answers these through the outbound router
            message @ (Message::Attach(_) | Message::Detach(_)) => {
                self.forward_message(connection, message).await.err()
            }

            message @ Message::UplinkData(_) => {
                self.forward_then(connection, message, UplinkDataRsp { op_id }.into())
                    .await
            }
            message @ Message::DownlinkRxStatus(_) => {
                self.forward_then(connection, message, DownlinkRxStatusRsp { op_id }.into())
                    .await
            }
            message @ Message::DownlinkResult(_) => {
                self.forward_then(connection, message, DownlinkResultRsp { op_id }.into())
                    .await
            }
            message @ Message::VmUplinkData(_) => {
                self.forward_then(connection, message, VmUplinkDataRsp { op_id }.into())
                    .await
            }

            // Responses to server-issued basestation requests
            message @ Message::StatusRsp(_) => {
                connection.complete_operation(op_id);
                self.forward_then(connection, message, StatusCmp { op_id }.into())
                    .await
            }
            message @ Message::VmActivateRsp(_) => {
                connection.complete_operation(op_id);
                self.forward_then(connection, message, VmActivateCmp { op_id }.into())
                    .await
            }
            message @ Message::VmDeactivateRsp(_) => {
                connection.complete_operation(op_id);
                self.forward_then(connection, message, VmDeactivateCmp { op_id }.into())
                    .await
            }
            message @ Message::VmStatusRsp(_) => {
                connection.complete_operation(op_id);
                self.forward_then(connection, message, VmStatusCmp { op_id }.into())
                    .await
            }

            // Responses to server-issued endnode requests
            message @ Message::DownlinkQueueRsp(_) => {
                self.correlate_then(connection, message, DownlinkQueueCmp { op_id }.into())
                    .await
            }
            message @ Message::DownlinkRevokeRsp(_) => {
                self.correlate_then(connection, message, DownlinkRevokeCmp { op_id }.into())
                    .await
            }
            message @ Message::AttachPropagateRsp(_) => {
                self.correlate_then(connection, message, AttachPropagateCmp { op_id }.into())
                    .await
            }
            message @ Message::DetachPropagateRsp(_) => {
                self.correlate_then(connection, message, DetachPropagateCmp { op_id }.into())
                    .await
            }

            Message::ErrorAck(_) => {
                connection.complete_operation(op_id);
                None
            }
            Message::ConnectCmp(_)
            | Message::PingCmp(_)
            | Message::AttachCmp(_)
            | Message::DetachCmp(_)
            | Message::UplinkDataCmp(_)
            | Message::DownlinkRxStatusCmp(_)
            | Message::DownlinkResultCmp(_)
            | Message::VmUplinkDataCmp(_) => {
                trace!(bs_eui = %bs_eui, op_id, "Operation completed");
                None
            }

            // Service center commands, or a second `con`
            other => {
                warn!(
                    bs_eui = %bs_eui,
                    command = other.command(),
                    op_id,
                    "Unexpected command from basestation"
                );
                Some(self.protocol_error(
                    connection,
                    op_id,
                    ERROR_UNEXPECTED_COMMAND,
                    format!("unexpected command '{}'", other.command()),
                ))
            }
        }
    }

    /// Hand an event to the sink
    ///
    /// A sink failure comes back as [`BssciError::UpstreamUnavailable`].
    pub async fn forward(&self, event: Event) -> Result<()> {
        let event_type = event.event_type();
        let bs_eui = event.bs_eui();
        self.sink.event(event).await?;
        self.metrics.event_forwarded();
        counter!("bssci.events.forwarded", "event_type" => event_type).increment(1);
        debug!(bs_eui = %bs_eui, event_type, "Event forwarded");
        Ok(())
    }

    /// Forward a message; on failure return the error frame to send
    async fn forward_message(
        &self,
        connection: &BasestationConnection,
        message: Message,
    ) -> std::result::Result<(), Message> {
        let op_id = message.op_id();
        let command = message.command();
        let Some(event) = message.into_event(connection.bs_eui()) else {
            return Ok(());
        };
        self.forward(event)
            .await
            .map_err(|err| self.unable_to_handle(connection, op_id, command, err))
    }

    async fn forward_then(
        &self,
        connection: &BasestationConnection,
        message: Message,
        reply: Message,
    ) -> Option<Message> {
        match self.forward_message(connection, message).await {
            Ok(()) => Some(reply),
            Err(error) => Some(error),
        }
    }

    async fn correlate_then(
        &self,
        connection: &BasestationConnection,
        message: Message,
        reply: Message,
    ) -> Option<Message> {
        let op_id = message.op_id();
        let command = message.command();
        let bs_eui = connection.bs_eui();

        let Some(ep_eui) = connection
            .complete_operation(op_id)
            .and_then(|pending| pending.ep_eui)
        else {
            warn!(bs_eui = %bs_eui, command, op_id, "No pending operation for response, dropping event");
            return Some(reply);
        };

        let Some(event) = EndnodeEvent::correlated(bs_eui, ep_eui, message) else {
            return Some(reply);
        };
        match self.forward(Event::Endnode(event)).await {
            Ok(()) => Some(reply),
            Err(err) => Some(self.unable_to_handle(connection, op_id, command, err)),
        }
    }

    fn unable_to_handle(
        &self,
        connection: &BasestationConnection,
        op_id: i64,
        command: &'static str,
        err: BssciError,
    ) -> Message {
        warn!(
            bs_eui = %connection.bs_eui(),
            command,
            op_id,
            kind = ?err.kind(),
            error = %err,
            "Upstream did not take event"
        );
        self.protocol_error(
            connection,
            op_id,
            ERROR_UNABLE_TO_HANDLE,
            format!("service center unable to handle '{}': {}", command, err),
        )
    }

    fn protocol_error(
        &self,
        connection: &BasestationConnection,
        op_id: i64,
        code: u32,
        message: String,
    ) -> Message {
        self.metrics.protocol_error();
        counter!(
            "bssci.errors.protocol",
            "bs_eui" => connection.bs_eui().to_string(),
            "code" => code.to_string()
        )
        .increment(1);
        ProtocolError::new(op_id, code, message).into()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        BasestationConnection, ChannelSink, ConnectionId, NoopSink, Session, SinkError,
        SinkMessage, split_transport,
    };
    use bssci_codec::{
        Attach, BssciCodec, Connect, DownlinkQueue, DownlinkQueueRsp, Eui64, IntoEvent, Ping,
        Status, StatusRsp, UplinkData,
    };
    use bytes::Bytes;
    use tracing_test::traced_test;

    fn connection() -> BasestationConnection {
        connection_on(1, Arc::new(Session::new()))
    }

    fn connection_on(id: u64, session: Arc<Session>) -> BasestationConnection {
        let (local, _remote) = tokio::io::duplex(1024);
        let (_, writer) = split_transport(local, BssciCodec::new());
        BasestationConnection::new(
            ConnectionId::new(id),
            Eui64::from_u64(0xb5),
            "127.0.0.1:1".parse().unwrap(),
            writer,
            session,
        )
    }

    fn dispatcher(sink: impl EventSink) -> Dispatcher {
        Dispatcher::new(Arc::new(sink), Arc::new(ServerMetrics::new()))
    }

    fn error_code(reply: Option<Message>) -> u32 {
        match reply {
            Some(Message::ProtocolError(report)) => report.code,
            other => panic!("expected error frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ping_is_answered() {
        let reply = dispatcher(NoopSink)
            .handle(&connection(), Ping { op_id: 5 }.into())
            .await;
        assert_eq!(reply, Some(PingRsp { op_id: 5 }.into()));
    }

    #[tokio::test]
    async fn test_uplink_forwarded_then_acknowledged() {
        let (sink, mut rx) = ChannelSink::new();
        let uplink = UplinkData {
            op_id: 9,
            ep_eui: Eui64::from_u64(0xe1),
            user_data: Bytes::from_static(b"x"),
            ..Default::default()
        };

        let reply = dispatcher(sink)
            .handle(&connection(), uplink.clone().into())
            .await;
        assert_eq!(reply, Some(UplinkDataRsp { op_id: 9 }.into()));

        match rx.recv().await {
            Some(SinkMessage::Event(Event::Endnode(event))) => {
                assert_eq!(event.ep_eui, Eui64::from_u64(0xe1));
                assert_eq!(event.bs_eui, Eui64::from_u64(0xb5));
                assert_eq!(event.message, Message::from(uplink));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_attach_has_no_direct_reply() {
        let reply = dispatcher(NoopSink)
            .handle(&connection(), Attach::default().into())
            .await;
        assert_eq!(reply, None);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_missing_handler_yields_error_frame() {
        struct BareSink;
        #[async_trait::async_trait]
        impl EventSink for BareSink {}

        let dispatcher = dispatcher(BareSink);
        let conn = connection();

        let reply = dispatcher.handle(&conn, Attach { op_id: 3, ..Default::default() }.into()).await;
        assert_eq!(error_code(reply.clone()), ERROR_UNABLE_TO_HANDLE);
        assert_eq!(reply.unwrap().op_id(), 3);

        let reply = dispatcher.handle(&conn, StatusRsp::default().into()).await;
        assert_eq!(error_code(reply), ERROR_UNABLE_TO_HANDLE);
        assert!(logs_contain("Upstream did not take event"));

        let event = UplinkData::default().into_event(conn.bs_eui());
        assert!(matches!(
            dispatcher.forward(event).await,
            Err(BssciError::UpstreamUnavailable(SinkError::HandlerNotSet))
        ));
    }

    #[tokio::test]
    async fn test_server_commands_are_unexpected() {
        let dispatcher = dispatcher(NoopSink);
        let conn = connection();

        for message in [
            Message::from(Status { op_id: 1 }),
            Message::from(Connect::default()),
            Message::from(DownlinkQueue::default()),
        ] {
            let reply = dispatcher.handle(&conn, message).await;
            assert_eq!(error_code(reply), ERROR_UNEXPECTED_COMMAND);
        }
    }

    #[tokio::test]
    async fn test_correlated_response_uses_pending_operation() {
        let (sink, mut rx) = ChannelSink::new();
        let dispatcher = dispatcher(sink);
        let conn = connection();

        let queued = Message::from(DownlinkQueue {
            op_id: -3,
            ep_eui: Eui64::from_u64(0xe2),
            ..Default::default()
        });
        conn.track_operation(-3, &queued);

        let reply = dispatcher
            .handle(&conn, DownlinkQueueRsp { op_id: -3 }.into())
            .await;
        assert_eq!(reply, Some(DownlinkQueueCmp { op_id: -3 }.into()));
        assert_eq!(conn.pending_operations(), 0);

        match rx.recv().await {
            Some(SinkMessage::Event(Event::Endnode(event))) => {
                assert_eq!(event.ep_eui, Eui64::from_u64(0xe2));
                assert_eq!(event.op_id, -3);
            }
            other => panic!("unexpected {:?}", other),
        }

        // Unknown opId: completion still sent, nothing forwarded
        let reply = dispatcher
            .handle(&conn, DownlinkQueueRsp { op_id: -99 }.into())
            .await;
        assert_eq!(reply, Some(DownlinkQueueCmp { op_id: -99 }.into()));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_response_correlates_across_resumed_socket() {
        let (sink, mut rx) = ChannelSink::new();
        let dispatcher = dispatcher(sink);
        let session = Arc::new(Session::new());
        let bs_uuid = uuid::Uuid::from_u128(0x5e55);
        session.handshake(Some(bs_uuid), None);

        let old = connection_on(1, session.clone());
        let op_id = session.next_op_id();
        old.track_operation(
            op_id,
            &DownlinkQueue {
                op_id,
                ep_eui: Eui64::from_u64(0xe3),
                ..Default::default()
            }
            .into(),
        );
        drop(old);

        assert!(session.handshake(Some(bs_uuid), Some(op_id)).resumed);
        let new = connection_on(2, session);
        let reply = dispatcher
            .handle(&new, DownlinkQueueRsp { op_id }.into())
            .await;
        assert_eq!(reply, Some(DownlinkQueueCmp { op_id }.into()));

        match rx.recv().await {
            Some(SinkMessage::Event(Event::Endnode(event))) => {
                assert_eq!(event.ep_eui, Eui64::from_u64(0xe3));
                assert_eq!(event.op_id, op_id);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
