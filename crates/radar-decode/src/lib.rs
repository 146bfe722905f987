#![deny(
    trivial_numeric_casts,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates
)]
#![warn(rust_2021_compatibility, unreachable_pub)]

//! Decodes the IWR1443's framed TLV telemetry stream (spec section 3/4.F)
//! and renders each frame as a JSON object.
//!
//! [`decode_frame`] expects to be handed a byte slice that already starts
//! with [`header::MAGIC`] and spans at least one full frame; resynchronizing
//! the incoming byte stream onto that boundary is `radar-data`'s job, not
//! this crate's.

pub mod header;
pub mod payload;
pub mod tlv;

use header::FrameHeader;
use tlv::Tlv;

/// Errors that can occur while decoding a single frame.
///
/// Every variant here causes the whole frame to be dropped; spec section 7
/// requires resynchronization to resume from the next magic sequence rather
/// than attempt partial recovery within a frame.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum DecodeError {
    /// `bytes` was shorter than the fixed frame header.
    #[error("buffer too short for frame header: need {need}, have {have}")]
    ShortHeader { need: usize, have: usize },

    /// `bytes` did not start with the magic sequence.
    #[error("buffer does not start with the frame magic sequence")]
    BadMagic,

    /// The header's `packetLength` is smaller than the header itself, which
    /// cannot encode any valid frame.
    #[error("packetLength {packet_length} is smaller than the frame header ({header_size} bytes)")]
    ImplausiblePacketLength { packet_length: u32, header_size: usize },

    /// A TLV or its payload ran past the declared frame length.
    #[error("truncated {what}: need at least {need} bytes, have {have}")]
    TruncatedPayload {
        what: &'static str,
        need: usize,
        have: usize,
    },
}

/// A fully decoded frame: its header plus every TLV record that followed it.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Frame {
    #[serde(rename = "Header")]
    pub header: FrameHeader,
    #[serde(rename = "TLVs")]
    pub tlvs: Vec<Tlv>,
}

impl Frame {
    /// Renders this frame as the `{"Header": {...}, "TLVs": [...]}` JSON
    /// object spec section 4.F requires.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("Frame serializes infallibly")
    }
}

/// Decodes one frame from the start of `bytes`.
///
/// `bytes` must begin with [`header::MAGIC`]; the caller is expected to have
/// already resynchronized onto a magic boundary. Returns the decoded frame
/// and the number of bytes it consumed, so the caller can advance past it
/// (which may be fewer bytes than `bytes.len()` if more frames follow).
pub fn decode_frame(bytes: &[u8]) -> Result<(Frame, usize), DecodeError> {
    if bytes.len() < header::HEADER_SIZE {
        return Err(DecodeError::ShortHeader { need: header::HEADER_SIZE, have: bytes.len() });
    }
    if bytes[0..8] != header::MAGIC {
        return Err(DecodeError::BadMagic);
    }

    let header = FrameHeader::parse(bytes);
    if (header.packet_length as usize) < header::HEADER_SIZE {
        return Err(DecodeError::ImplausiblePacketLength {
            packet_length: header.packet_length,
            header_size: header::HEADER_SIZE,
        });
    }

    let (tlvs, consumed) = tlv::parse_tlvs(&bytes[header::HEADER_SIZE..], header.tlv_count)?;

    tracing::trace!(
        frame_number = header.frame_number,
        tlv_count = header.tlv_count,
        "frame decoded"
    );

    Ok((Frame { header, tlvs }, header::HEADER_SIZE + consumed))
}

#[cfg(test)]
mod test {
    use byteorder::{ByteOrder, LittleEndian};

    use super::*;

    fn frame_bytes(tlv_count: u32, tlv_payload: &[u8]) -> Vec<u8> {
        let packet_length = (header::HEADER_SIZE + tlv_payload.len()) as u32;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&header::MAGIC);
        let mut field = [0u8; 4];
        for value in [3, packet_length, 22, 1, 1000, 0, tlv_count] {
            LittleEndian::write_u32(&mut field, value);
            bytes.extend_from_slice(&field);
        }
        bytes.extend_from_slice(tlv_payload);
        bytes
    }

    #[test]
    fn decodes_a_single_statistics_frame() {
        let mut tlv = vec![0u8; 8];
        LittleEndian::write_u32(&mut tlv[0..4], 6);
        LittleEndian::write_u32(&mut tlv[4..8], 24);
        tlv.extend_from_slice(&[0u8; 24]);

        let bytes = frame_bytes(1, &tlv);
        let (frame, consumed) = decode_frame(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(frame.tlvs.len(), 1);
        assert_eq!(frame.tlvs[0].tlv_type, tlv::TlvType::Statistics);

        let json = frame.to_json();
        assert!(json.starts_with("{\"Header\":"));
        assert!(json.contains("\"TLVs\":["));
        assert!(json.contains("\"Type\":\"Statistics\""));
    }

    #[test]
    fn rejects_buffer_without_magic() {
        let bytes = vec![0u8; header::HEADER_SIZE];
        assert!(matches!(decode_frame(&bytes), Err(DecodeError::BadMagic)));
    }

    #[test]
    fn rejects_short_buffer() {
        let bytes = vec![0u8; 4];
        assert!(matches!(decode_frame(&bytes), Err(DecodeError::ShortHeader { .. })));
    }

    #[test]
    fn rejects_implausible_packet_length() {
        let mut bytes = frame_bytes(0, &[]);
        LittleEndian::write_u32(&mut bytes[12..16], 4); // smaller than HEADER_SIZE
        assert!(matches!(
            decode_frame(&bytes),
            Err(DecodeError::ImplausiblePacketLength { .. })
        ));
    }

    #[test]
    fn leaves_trailing_bytes_for_the_next_frame() {
        let mut tlv = vec![0u8; 8];
        LittleEndian::write_u32(&mut tlv[0..4], 6);
        LittleEndian::write_u32(&mut tlv[4..8], 24);
        tlv.extend_from_slice(&[0u8; 24]);

        let mut bytes = frame_bytes(1, &tlv);
        bytes.extend_from_slice(&[0xFF, 0xFF, 0xFF]);
        let (_frame, consumed) = decode_frame(&bytes).unwrap();
        assert_eq!(consumed, bytes.len() - 3);
    }
}
