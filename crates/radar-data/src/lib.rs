#![deny(
    trivial_numeric_casts,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    unused_results
)]
#![warn(rust_2021_compatibility, unreachable_pub)]

//! The data-port handler (spec section 4.E): a serial endpoint wired to the
//! radar's telemetry port at 921,600 baud that accumulates inbound bytes,
//! resynchronizes on the 8-byte frame magic, hands complete frames to
//! [`radar_decode`], and forwards the rendered JSON to a [`radar_sink::FrameSink`].

use std::sync::{Arc, Mutex};

use byteorder::{ByteOrder, LittleEndian};
use radar_decode::header::{self, MAGIC};
use radar_reactor::Endpoint;
use radar_serial::{Handler, SerialEndpoint};
use radar_signal::SignalReceiver;
use radar_sink::FrameSink;

pub use radar_serial::Error;

/// Baud rate the radar's telemetry port is wired to (spec section 6).
pub const BAUD_RATE: u32 = 921_600;

/// How consecutive JSON records are framed when handed to the sink.
///
/// spec section 4.F notes the reference implementation emits records
/// separated by `", "`, suitable for wrapping the whole stream in `[ ... ]`,
/// but explicitly allows newline-delimited JSON (NDJSON) "as an acceptable
/// variation, provided the choice is documented" — this implementation
/// defaults to NDJSON (see `DESIGN.md`) and keeps the legacy framing
/// available for compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFraming {
    /// Each record is followed by `\n`.
    Ndjson,
    /// Each record is followed by `, `, matching the reference
    /// implementation's concatenated-array style.
    CommaSeparated,
}

impl RecordFraming {
    fn separator(self) -> &'static str {
        match self {
            RecordFraming::Ndjson => "\n",
            RecordFraming::CommaSeparated => ", ",
        }
    }
}

/// A serial endpoint that resynchronizes the telemetry byte stream onto
/// frame boundaries and decodes each complete frame it finds.
pub struct DataHandler {
    serial: SerialEndpoint,
    accumulator: Mutex<Vec<u8>>,
    sink: Arc<dyn FrameSink>,
    framing: RecordFraming,
    /// When set, reproduces the reference implementation's "clear the whole
    /// accumulator after every decoded frame" behavior (spec section 9 open
    /// question) instead of the corrected "erase only `packetLength` bytes"
    /// behavior this implementation defaults to.
    clear_whole_buffer_on_decode: bool,
}

impl DataHandler {
    /// Creates a handler that renders NDJSON and only ever drops the bytes
    /// of the frame it just decoded, leaving any already-arrived bytes of
    /// the next frame in the accumulator.
    pub fn new(sink: Arc<dyn FrameSink>) -> Arc<Self> {
        Self::with_options(sink, RecordFraming::Ndjson, false)
    }

    /// Creates a handler with explicit framing and accumulator-clearing
    /// behavior.
    pub fn with_options(sink: Arc<dyn FrameSink>, framing: RecordFraming, clear_whole_buffer_on_decode: bool) -> Arc<Self> {
        Arc::new(Self {
            serial: SerialEndpoint::new(),
            accumulator: Mutex::new(Vec::new()),
            sink,
            framing,
            clear_whole_buffer_on_decode,
        })
    }

    /// Opens `port_name` at [`BAUD_RATE`] and starts resynchronizing its
    /// inbound bytes onto frame boundaries.
    pub fn initialize(self: &Arc<Self>, port_name: &str, signal: SignalReceiver) -> Result<(), Error> {
        self.serial.initialize(port_name, BAUD_RATE, Arc::clone(self), signal)
    }

    fn emit(&self, frame: &radar_decode::Frame) {
        let mut record = frame.to_json();
        record.push_str(self.framing.separator());
        self.sink.write(record.as_bytes());
    }
}

impl Endpoint for DataHandler {
    fn name(&self) -> &str {
        "data"
    }
}

impl Handler for DataHandler {
    fn on_read(&self, bytes: &[u8]) {
        let mut accumulator = self.accumulator.lock().expect("data accumulator lock poisoned");
        accumulator.extend_from_slice(bytes);

        loop {
            if accumulator.len() < header::HEADER_SIZE {
                return;
            }

            let search_end = accumulator.len() - header::HEADER_SIZE + 1;
            let magic_offset = accumulator.windows(MAGIC.len()).take(search_end).position(|window| window == MAGIC);

            let Some(offset) = magic_offset else {
                tracing::debug!(
                    discarded = accumulator.len(),
                    "no frame magic found in accumulator, discarding"
                );
                accumulator.clear();
                return;
            };

            if offset > 0 {
                let _ = accumulator.drain(0..offset);
            }

            let packet_length = LittleEndian::read_u32(&accumulator[12..16]) as usize;
            if packet_length < header::HEADER_SIZE {
                // Implausible: this magic is a false positive inside garbage
                // bytes. Advance past it and re-scan (spec section 4.E
                // resync policy).
                tracing::debug!(packet_length, "implausible packetLength, advancing past false-positive magic");
                let _ = accumulator.drain(0..1);
                continue;
            }

            if accumulator.len() < packet_length {
                // Wait for the rest of the frame to arrive.
                return;
            }

            match radar_decode::decode_frame(&accumulator[..packet_length]) {
                Ok((frame, _consumed)) => self.emit(&frame),
                Err(error) => {
                    tracing::error!(%error, packet_length, "frame decode failed, dropping frame");
                }
            }

            if self.clear_whole_buffer_on_decode {
                accumulator.clear();
                return;
            }

            let _ = accumulator.drain(0..packet_length);
            // Loop again: a second complete frame may already be sitting in
            // the accumulator from the same `on_read` delivery.
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, Mutex};

    use radar_decode::header::{HEADER_SIZE, MAGIC};

    use super::*;

    #[derive(Clone, Default)]
    struct VecSink(Arc<Mutex<Vec<u8>>>);

    impl FrameSink for VecSink {
        fn write(&self, bytes: &[u8]) {
            self.0.lock().unwrap().extend_from_slice(bytes);
        }
    }

    fn statistics_frame() -> Vec<u8> {
        let tlv_payload_len = 24usize;
        let packet_length = HEADER_SIZE + 8 + tlv_payload_len;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&MAGIC);
        for value in [3u32, packet_length as u32, 22, 1, 1000, 0, 1] {
            let mut field = [0u8; 4];
            LittleEndian::write_u32(&mut field, value);
            bytes.extend_from_slice(&field);
        }
        let mut tlv_header = [0u8; 8];
        LittleEndian::write_u32(&mut tlv_header[0..4], 6);
        LittleEndian::write_u32(&mut tlv_header[4..8], tlv_payload_len as u32);
        bytes.extend_from_slice(&tlv_header);
        bytes.extend_from_slice(&[10u32, 20, 30, 40, 50, 60].iter().flat_map(|v| v.to_le_bytes()).collect::<Vec<u8>>());
        bytes
    }

    #[test]
    fn s1_single_statistics_frame_decodes() {
        let sink = VecSink::default();
        let handler = DataHandler::new(Arc::new(sink.clone()));
        handler.on_read(&statistics_frame());

        let output = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("\"Type\":\"Statistics\"") || output.contains("\"Type\": \"Statistics\"") || output.contains("6"));
        assert!(output.ends_with('\n'));
    }

    #[test]
    fn s2_resync_with_leading_garbage() {
        let sink = VecSink::default();
        let handler = DataHandler::new(Arc::new(sink.clone()));
        let mut input = vec![0xDE, 0xAD, 0xBE, 0xEF];
        input.extend_from_slice(&statistics_frame());
        handler.on_read(&input);

        assert_eq!(sink.0.lock().unwrap().iter().filter(|&&b| b == b'\n').count(), 1);
    }

    #[test]
    fn s3_split_delivery_one_byte_at_a_time() {
        let sink = VecSink::default();
        let handler = DataHandler::new(Arc::new(sink.clone()));
        for byte in statistics_frame() {
            handler.on_read(&[byte]);
        }
        assert_eq!(sink.0.lock().unwrap().iter().filter(|&&b| b == b'\n').count(), 1);
    }

    #[test]
    fn no_magic_at_all_clears_the_accumulator() {
        let sink = VecSink::default();
        let handler = DataHandler::new(Arc::new(sink.clone()));
        handler.on_read(&[0u8; 64]);
        assert!(sink.0.lock().unwrap().is_empty());
        assert!(handler.accumulator.lock().unwrap().is_empty());
    }

    #[test]
    fn trailing_bytes_of_a_second_frame_survive_when_not_legacy() {
        let sink = VecSink::default();
        let handler = DataHandler::new(Arc::new(sink.clone()));
        let mut input = statistics_frame();
        input.extend_from_slice(&MAGIC);
        handler.on_read(&input);

        let remaining = handler.accumulator.lock().unwrap();
        assert_eq!(&remaining[..], &MAGIC);
    }

    #[test]
    fn legacy_mode_drops_trailing_bytes() {
        let sink = VecSink::default();
        let handler = DataHandler::with_options(Arc::new(sink.clone()), RecordFraming::Ndjson, true);
        let mut input = statistics_frame();
        input.extend_from_slice(&MAGIC);
        handler.on_read(&input);

        assert!(handler.accumulator.lock().unwrap().is_empty());
    }
}
