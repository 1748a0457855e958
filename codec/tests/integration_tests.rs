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

//! Integration tests for the BSSCI codec
//!
//! These tests drive whole frames through the public API the way a
//! connection does: encode, split arbitrarily, decode, then decode the message.

use bssci_codec::{
    Attach, BssciCodec, CodecError, Connect, ConnectRsp, DownlinkQueue, DownlinkResult,
    DownlinkResultCode, Eui64, FramingError, GeoLocation, HEADER_LEN, MAGIC, Message,
    MessageError, StatusRsp, Subpackets, UplinkData, VmUplinkData, decode_frame, encode_frame,
};
use bytes::{BufMut, Bytes, BytesMut};
use proptest::prelude::*;
use tokio_util::codec::{Decoder, Encoder};
use uuid::Uuid;

// ============================================================================
// Helper Functions
// ============================================================================

fn sample_messages() -> Vec<Message> {
    vec![
        Message::from(Connect {
            op_id: 0,
            version: "1.0.0".to_string(),
            bs_eui: Eui64::from_u64(0x70b3_d59c_d000_0022),
            bidi: true,
            vendor: Some("Acme".to_string()),
            model: Some("BS-1".to_string()),
            geo_location: Some(GeoLocation {
                lat: 49.5,
                lon: 11.0,
                alt: 300.0,
            }),
            sn_bs_uuid: Some(Uuid::from_u128(0x1234)),
            sn_sc_op_id: Some(-17),
            ..Default::default()
        }),
        Message::from(ConnectRsp {
            op_id: 0,
            version: "1.0.0".to_string(),
            sn_resume: true,
            sn_sc_uuid: Uuid::from_u128(0xfeed),
        }),
        Message::from(Attach {
            op_id: 3,
            ep_eui: Eui64::from_u64(0x0102_0304_0506_0708),
            rx_time: 1_700_000_000_000_000_000,
            attach_cnt: 4,
            snr: 10.5,
            rssi: -101.25,
            nonce: Bytes::from_static(&[1, 2, 3, 4]),
            sign: Bytes::from_static(&[9, 8, 7, 6]),
            dual_chan: true,
            subpackets: Some(Subpackets {
                snr: vec![10.0, 11.0],
                rssi: vec![-100.0, -102.0],
                frequency: vec![-20, 35],
            }),
            ..Default::default()
        }),
        Message::from(UplinkData {
            op_id: 4,
            ep_eui: Eui64::from_u64(0x0102_0304_0506_0708),
            rx_time: 1_700_000_000_000_000_001,
            packet_cnt: 88,
            snr: 7.0,
            rssi: -120.0,
            user_data: Bytes::from_static(b"hello mioty"),
            dl_open: true,
            format: Some(1),
            ..Default::default()
        }),
        Message::from(DownlinkQueue {
            op_id: -2,
            ep_eui: Eui64::from_u64(5),
            que_id: 100,
            cnt_depend: true,
            user_data: vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")],
            packet_cnt: Some(vec![89, 90]),
            prio: Some(1.5),
            ..Default::default()
        }),
        Message::from(DownlinkResult {
            op_id: 6,
            ep_eui: Eui64::from_u64(5),
            que_id: 100,
            result: DownlinkResultCode::Sent,
            tx_time: Some(1_700_000_000_500_000_000),
            packet_cnt: Some(89),
        }),
        Message::from(StatusRsp {
            op_id: -1,
            code: 0,
            message: "ok".to_string(),
            time: 1_700_000_000_000_000_000,
            duty_cycle: 0.01,
            uptime: 3600,
            temp: Some(41.5),
            ..Default::default()
        }),
        Message::from(VmUplinkData {
            op_id: 12,
            mac_type: 3,
            user_data: Bytes::from_static(&[0xde, 0xad]),
            trx_time: 10,
            sys_time: 20,
            freq_off: -1.5,
            snr: 2.0,
            rssi: -110.0,
            ..Default::default()
        }),
    ]
}

/// One instance of every command in the catalogue
fn every_command() -> Vec<Message> {
    use bssci_codec::{
        AttachCmp, AttachPropagate, AttachPropagateCmp, AttachPropagateRsp, AttachRsp,
        ConnectCmp, Detach, DetachCmp, DetachPropagate, DetachPropagateCmp, DetachPropagateRsp,
        DetachRsp, DownlinkQueueCmp, DownlinkQueueRsp, DownlinkResultCmp, DownlinkResultRsp,
        DownlinkRevoke, DownlinkRevokeCmp, DownlinkRevokeRsp, DownlinkRxStatus,
        DownlinkRxStatusCmp, DownlinkRxStatusRsp, ErrorAck, Ping, PingCmp, PingRsp,
        ProtocolError, Status, StatusCmp, UplinkDataCmp, UplinkDataRsp, VmActivate,
        VmActivateCmp, VmActivateRsp, VmDeactivate, VmDeactivateCmp, VmDeactivateRsp, VmStatus,
        VmStatusCmp, VmStatusRsp, VmUplinkDataCmp, VmUplinkDataRsp,
    };

    let key = Bytes::from_static(&[0x5a; 16]);
    let ep_eui = Eui64::from_u64(0x0a0b);
    let mut messages = sample_messages();
    messages.extend([
        Message::from(ConnectCmp { op_id: 0 }),
        Message::from(Ping { op_id: 1 }),
        Message::from(PingRsp { op_id: 1 }),
        Message::from(PingCmp { op_id: 1 }),
        Message::from(ProtocolError::new(2, 1, "unsupported command 'x'")),
        Message::from(ErrorAck { op_id: 2 }),
        Message::from(AttachRsp { op_id: 3, nwk_session_key: key.clone(), sh_addr: 0x77 }),
        Message::from(AttachCmp { op_id: 3 }),
        Message::from(Detach { op_id: 5, ep_eui, ..Default::default() }),
        Message::from(DetachRsp { op_id: 5, sign: Bytes::from_static(&[4, 3, 2, 1]) }),
        Message::from(DetachCmp { op_id: 5 }),
        Message::from(UplinkDataRsp { op_id: 4 }),
        Message::from(UplinkDataCmp { op_id: 4 }),
        Message::from(DownlinkRxStatus { op_id: 7, ep_eui, ..Default::default() }),
        Message::from(DownlinkRxStatusRsp { op_id: 7 }),
        Message::from(DownlinkRxStatusCmp { op_id: 7 }),
        Message::from(DownlinkQueueRsp { op_id: -2 }),
        Message::from(DownlinkQueueCmp { op_id: -2 }),
        Message::from(DownlinkRevoke { op_id: -3, ep_eui, que_id: 100 }),
        Message::from(DownlinkRevokeRsp { op_id: -3 }),
        Message::from(DownlinkRevokeCmp { op_id: -3 }),
        Message::from(DownlinkResultRsp { op_id: 6 }),
        Message::from(DownlinkResultCmp { op_id: 6 }),
        Message::from(AttachPropagate {
            op_id: -4,
            ep_eui,
            nwk_session_key: key,
            ..Default::default()
        }),
        Message::from(AttachPropagateRsp { op_id: -4 }),
        Message::from(AttachPropagateCmp { op_id: -4 }),
        Message::from(DetachPropagate { op_id: -5, ep_eui }),
        Message::from(DetachPropagateRsp { op_id: -5 }),
        Message::from(DetachPropagateCmp { op_id: -5 }),
        Message::from(Status { op_id: -1 }),
        Message::from(StatusCmp { op_id: -1 }),
        Message::from(VmActivate { op_id: -6, mac_type: 3 }),
        Message::from(VmActivateRsp { op_id: -6 }),
        Message::from(VmActivateCmp { op_id: -6 }),
        Message::from(VmDeactivate { op_id: -7, mac_type: 3 }),
        Message::from(VmDeactivateRsp { op_id: -7 }),
        Message::from(VmDeactivateCmp { op_id: -7 }),
        Message::from(VmStatus { op_id: -8 }),
        Message::from(VmStatusRsp { op_id: -8, mac_types: vec![3, 4] }),
        Message::from(VmStatusCmp { op_id: -8 }),
        Message::from(VmUplinkDataRsp { op_id: 12 }),
        Message::from(VmUplinkDataCmp { op_id: 12 }),
    ]);
    messages
}

fn encode_all(messages: &[Message]) -> BytesMut {
    let mut codec = BssciCodec::new();
    let mut buffer = BytesMut::new();
    for message in messages {
        codec.encode(message, &mut buffer).unwrap();
    }
    buffer
}

// ============================================================================
// Round Trip Tests
// ============================================================================

#[test]
fn representative_messages_survive_roundtrip() {
    for message in sample_messages() {
        let buffer = encode_frame(&message).unwrap();
        let decoded = decode_frame(&buffer).unwrap();
        assert_eq!(decoded, message, "roundtrip of {}", message.command());
    }
}

#[test]
fn every_command_survives_roundtrip() {
    let messages = every_command();
    let commands: std::collections::HashSet<&str> =
        messages.iter().map(|message| message.command()).collect();
    assert_eq!(commands.len(), 50);

    for message in &messages {
        let buffer = encode_frame(message).unwrap();
        let decoded = decode_frame(&buffer).unwrap();
        assert_eq!(&decoded, message, "roundtrip of {}", message.command());
    }

    // The same catalogue as one continuous stream
    let mut wire = encode_all(&messages);
    let mut codec = BssciCodec::new();
    let mut decoded = Vec::new();
    while let Some(frame) = codec.decode(&mut wire).unwrap() {
        decoded.push(frame.decode_message().unwrap());
    }
    assert_eq!(decoded, messages);
}

#[test]
fn byte_by_byte_delivery_yields_every_frame() {
    let messages = sample_messages();
    let wire = encode_all(&messages);

    let mut codec = BssciCodec::new();
    let mut buffer = BytesMut::new();
    let mut decoded = Vec::new();
    for byte in wire.iter() {
        buffer.put_u8(*byte);
        while let Some(frame) = codec.decode(&mut buffer).unwrap() {
            decoded.push(frame.decode_message().unwrap());
        }
    }
    assert_eq!(decoded, messages);
    assert!(buffer.is_empty());
}

// ============================================================================
// Failure Class Tests
// ============================================================================

#[test]
fn malformed_payload_keeps_stream_usable() {
    // A uplink header with a body that is not an uplink, followed by a good frame
    let mut wire = BytesMut::new();
    let bogus = rmp_serde::to_vec_named(&BogusUplink {
        command: "ulData",
        op_id: 8,
        ep_eui: "not a number",
    })
    .unwrap();
    wire.put_slice(MAGIC);
    wire.put_u32_le(bogus.len() as u32);
    wire.put_slice(&bogus);
    wire.extend_from_slice(&encode_all(&sample_messages()[..1]));

    let mut codec = BssciCodec::new();
    let first = codec.decode(&mut wire).unwrap().unwrap();
    assert_eq!(first.command, "ulData");
    assert_eq!(first.op_id, 8);
    assert!(matches!(
        first.decode_message(),
        Err(MessageError::Malformed { op_id: 8, .. })
    ));

    let second = codec.decode(&mut wire).unwrap().unwrap();
    assert_eq!(second.command, "con");
}

#[test]
fn decode_frame_reports_message_errors() {
    let result = Message::from(DownlinkResult {
        op_id: 6,
        ep_eui: Eui64::from_u64(5),
        que_id: 100,
        result: DownlinkResultCode::Expired,
        tx_time: Some(1),
        packet_cnt: None,
    });
    // Encoding does not validate, decoding does
    let buffer = encode_frame(&result).unwrap();
    let err = decode_frame(&buffer).unwrap_err();
    assert!(matches!(err, CodecError::Message(MessageError::Malformed { .. })));
    assert!(!err.is_framing());
}

#[derive(serde::Serialize)]
struct BogusUplink {
    command: &'static str,
    #[serde(rename = "opId")]
    op_id: i64,
    #[serde(rename = "epEui")]
    ep_eui: &'static str,
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #[test]
    fn foreign_magic_is_always_rejected(
        magic in any::<[u8; 8]>().prop_filter("not the magic", |m| m != MAGIC),
        rest in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        let mut buffer = BytesMut::new();
        buffer.put_slice(&magic);
        buffer.put_slice(&rest);
        let err = BssciCodec::new().decode(&mut buffer).unwrap_err();
        prop_assert!(
            matches!(err, CodecError::Framing(FramingError::BadMagic { .. })),
            "unexpected error {:?}",
            err
        );
    }

    #[test]
    fn truncated_frames_fail_with_framing_errors(
        index in 0usize..8,
        cut in any::<prop::sample::Index>(),
    ) {
        let messages = sample_messages();
        let full = encode_frame(&messages[index]).unwrap();
        let cut = cut.index(full.len() - 1) + 1;
        let truncated = &full[..cut];
        let err = decode_frame(truncated).unwrap_err();
        prop_assert!(err.is_framing(), "unexpected error {:?}", err);
        if cut < HEADER_LEN {
            let is_truncated_header =
                matches!(err, CodecError::Framing(FramingError::TruncatedHeader { .. }));
            prop_assert!(is_truncated_header);
        }
    }

    #[test]
    fn arbitrary_input_never_panics(
        bytes in prop::collection::vec(any::<u8>(), 0..256),
        keep_magic in any::<bool>(),
    ) {
        let mut buffer = BytesMut::new();
        if keep_magic {
            buffer.put_slice(MAGIC);
            buffer.put_u32_le(bytes.len() as u32);
        }
        buffer.put_slice(&bytes);
        let mut codec = BssciCodec::new();
        if let Ok(Some(frame)) = codec.decode_eof(&mut buffer) {
            let _ = frame.decode_message();
        }
    }
}
