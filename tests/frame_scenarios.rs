//! End-to-end scenarios (spec section 8) exercised against the public API of
//! `radar-decode` and `radar-data`, from raw wire bytes through to the
//! rendered JSON a sink receives.

use std::sync::{Arc, Mutex};

use byteorder::{ByteOrder, LittleEndian};
use radar_data::{DataHandler, RecordFraming};
use radar_decode::header::{HEADER_SIZE, MAGIC};
use radar_serial::Handler;
use radar_sink::FrameSink;

#[derive(Clone, Default)]
struct RecordingSink(Arc<Mutex<Vec<u8>>>);

impl FrameSink for RecordingSink {
    fn write(&self, bytes: &[u8]) {
        self.0.lock().unwrap().extend_from_slice(bytes);
    }
}

impl RecordingSink {
    fn records(&self) -> Vec<serde_json::Value> {
        let text = String::from_utf8(self.0.lock().unwrap().clone()).unwrap();
        text.lines().map(|line| serde_json::from_str(line).unwrap()).collect()
    }
}

fn u32_field(value: u32) -> [u8; 4] {
    let mut field = [0u8; 4];
    LittleEndian::write_u32(&mut field, value);
    field
}

fn frame_with_tlvs(frame_number: u32, tlv_count: u32, tlvs: &[u8]) -> Vec<u8> {
    let packet_length = (HEADER_SIZE + tlvs.len()) as u32;
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&MAGIC);
    for value in [3, packet_length, 22, frame_number, 1_000 + frame_number, 0, tlv_count] {
        bytes.extend_from_slice(&u32_field(value));
    }
    bytes.extend_from_slice(tlvs);
    bytes
}

fn statistics_tlv() -> Vec<u8> {
    let mut tlv = Vec::new();
    tlv.extend_from_slice(&u32_field(6)); // Statistics
    tlv.extend_from_slice(&u32_field(24));
    for value in [10u32, 20, 30, 40, 50, 60] {
        tlv.extend_from_slice(&u32_field(value));
    }
    tlv
}

fn detected_points_tlv(points: &[(f32, f32, f32, f32)]) -> Vec<u8> {
    let mut payload = Vec::new();
    for &(x, y, z, velocity) in points {
        payload.extend_from_slice(&x.to_le_bytes());
        payload.extend_from_slice(&y.to_le_bytes());
        payload.extend_from_slice(&z.to_le_bytes());
        payload.extend_from_slice(&velocity.to_le_bytes());
    }
    let mut tlv = Vec::new();
    tlv.extend_from_slice(&u32_field(1)); // DetectedPoints
    tlv.extend_from_slice(&u32_field(payload.len() as u32));
    tlv.extend_from_slice(&payload);
    tlv
}

/// S1: a single well-formed frame delivered in one read produces exactly one
/// JSON record whose header fields and TLV survive the round trip intact.
#[test]
fn s1_single_frame_round_trips_header_and_tlv_fields() {
    let sink = RecordingSink::default();
    let handler = DataHandler::new(Arc::new(sink.clone()));

    handler.on_read(&frame_with_tlvs(7, 1, &statistics_tlv()));

    let records = sink.records();
    assert_eq!(records.len(), 1);
    let header = &records[0]["Header"];
    assert_eq!(header["frameNumber"], 7);
    assert_eq!(header["tlvCount"], 1);
    assert_eq!(records[0]["TLVs"][0]["Type"], "Statistics");
    assert_eq!(records[0]["TLVs"][0]["Data"]["interFrameProcessingTime"], 10);
}

/// S2: leading garbage ahead of the magic sequence is discarded and does not
/// prevent the frame that follows it from decoding.
#[test]
fn s2_resync_skips_leading_garbage_bytes() {
    let sink = RecordingSink::default();
    let handler = DataHandler::new(Arc::new(sink.clone()));

    let mut input = vec![0x55; 17];
    input.extend_from_slice(&frame_with_tlvs(1, 1, &statistics_tlv()));
    handler.on_read(&input);

    assert_eq!(sink.records().len(), 1);
}

/// S3: a frame delivered one byte at a time across many `on_read` calls still
/// decodes once the last byte arrives, and only then.
#[test]
fn s3_byte_at_a_time_delivery_decodes_exactly_once() {
    let sink = RecordingSink::default();
    let handler = DataHandler::new(Arc::new(sink.clone()));

    let frame = frame_with_tlvs(2, 1, &statistics_tlv());
    for (index, byte) in frame.iter().enumerate() {
        handler.on_read(&[*byte]);
        if index + 1 < frame.len() {
            assert!(sink.records().is_empty(), "frame decoded before its last byte arrived");
        }
    }

    assert_eq!(sink.records().len(), 1);
}

/// S4: a frame whose TLV declares more payload than actually follows it is
/// dropped outright rather than emitted with truncated data, and resync
/// continues.
#[test]
fn s4_truncated_tlv_drops_the_frame_without_crashing() {
    let sink = RecordingSink::default();
    let handler = DataHandler::new(Arc::new(sink.clone()));

    let mut truncated_tlv = Vec::new();
    truncated_tlv.extend_from_slice(&u32_field(6));
    truncated_tlv.extend_from_slice(&u32_field(24));
    truncated_tlv.extend_from_slice(&[0u8; 4]); // 4 of the declared 24 bytes
    let bad_frame = frame_with_tlvs(3, 1, &truncated_tlv);

    handler.on_read(&bad_frame);
    assert!(sink.records().is_empty());

    handler.on_read(&frame_with_tlvs(4, 1, &statistics_tlv()));
    assert_eq!(sink.records().len(), 1);
}

/// S5: a frame carrying more than one TLV type renders every one of them, in
/// order, under a single header.
#[test]
fn s5_multiple_tlv_types_in_one_frame_all_render() {
    let sink = RecordingSink::default();
    let handler = DataHandler::new(Arc::new(sink.clone()));

    let mut tlvs = statistics_tlv();
    tlvs.extend_from_slice(&detected_points_tlv(&[(1.0, 2.0, 0.0, -0.5)]));
    handler.on_read(&frame_with_tlvs(5, 2, &tlvs));

    let records = sink.records();
    assert_eq!(records.len(), 1);
    let rendered = &records[0]["TLVs"];
    assert_eq!(rendered.as_array().unwrap().len(), 2);
    assert_eq!(rendered[0]["Type"], "Statistics");
    assert_eq!(rendered[1]["Type"], "DetectedPoints");
    assert_eq!(rendered[1]["Data"][0]["x"], 1.0);
}

/// S6: consecutive frames arriving back to back in a single read each
/// produce their own record, in frame order.
#[test]
fn s6_back_to_back_frames_in_one_read_both_decode_in_order() {
    let sink = RecordingSink::default();
    let handler = DataHandler::new(Arc::new(sink.clone()));

    let mut input = frame_with_tlvs(10, 1, &statistics_tlv());
    input.extend_from_slice(&frame_with_tlvs(11, 1, &statistics_tlv()));
    handler.on_read(&input);

    let records = sink.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["Header"]["frameNumber"], 10);
    assert_eq!(records[1]["Header"]["frameNumber"], 11);
}

/// Comma-separated framing (the reference implementation's default) renders
/// without a trailing newline between records.
#[test]
fn comma_separated_framing_joins_records_without_newlines() {
    let sink = RecordingSink::default();
    let handler = DataHandler::with_options(Arc::new(sink.clone()), RecordFraming::CommaSeparated, false);

    handler.on_read(&frame_with_tlvs(1, 1, &statistics_tlv()));
    handler.on_read(&frame_with_tlvs(2, 1, &statistics_tlv()));

    let text = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
    assert!(!text.contains('\n'));
    assert!(text.contains("}, {"));
}
