//! The frame header that precedes every TLV stream (spec section 3/6).

use byteorder::{ByteOrder, LittleEndian};

/// The 8-byte magic sequence marking the start of a frame.
pub const MAGIC: [u8; 8] = [0x02, 0x01, 0x04, 0x03, 0x06, 0x05, 0x08, 0x07];

/// Size, in bytes, of [`FrameHeader`] on the wire: the 8-byte magic plus
/// seven little-endian `u32` fields (`version`, `packetLength`, `platform`,
/// `frameNumber`, `time`, `detectedObjectCount`, `tlvCount`).
///
/// spec section 6 additionally describes the header as "32 bytes", which
/// undercounts its own seven enumerated `u32` fields by one word; this
/// implementation follows the enumerated field list (36 bytes), since the
/// emitted JSON's `Header` object requires all seven fields to be present on
/// the wire to render. See DESIGN.md.
pub const HEADER_SIZE: usize = 36;

/// The fixed-size frame header that precedes every TLV stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct FrameHeader {
    /// Protocol version of the emitting firmware.
    pub version: u32,
    /// Total byte length of the frame, magic inclusive.
    #[serde(rename = "packetLength")]
    pub packet_length: u32,
    /// Platform identifier.
    pub platform: u32,
    /// Monotonic frame counter.
    #[serde(rename = "frameNumber")]
    pub frame_number: u32,
    /// Device-reported timestamp.
    pub time: u32,
    /// Number of objects the device detected this frame.
    #[serde(rename = "detectedObjectCount")]
    pub detected_object_count: u32,
    /// Number of TLV records that follow the header.
    #[serde(rename = "tlvCount")]
    pub tlv_count: u32,
}

impl FrameHeader {
    /// Parses a header from the first [`HEADER_SIZE`] bytes of `bytes`.
    ///
    /// `bytes` must already have been verified to start with [`MAGIC`] and
    /// to be at least [`HEADER_SIZE`] bytes long.
    pub fn parse(bytes: &[u8]) -> FrameHeader {
        debug_assert!(bytes.len() >= HEADER_SIZE);
        debug_assert_eq!(&bytes[0..8], &MAGIC);

        FrameHeader {
            version: LittleEndian::read_u32(&bytes[8..12]),
            packet_length: LittleEndian::read_u32(&bytes[12..16]),
            platform: LittleEndian::read_u32(&bytes[16..20]),
            frame_number: LittleEndian::read_u32(&bytes[20..24]),
            time: LittleEndian::read_u32(&bytes[24..28]),
            detected_object_count: LittleEndian::read_u32(&bytes[28..32]),
            tlv_count: LittleEndian::read_u32(&bytes[32..36]),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_field_offsets_in_order() {
        let mut bytes = vec![0u8; HEADER_SIZE];
        bytes[0..8].copy_from_slice(&MAGIC);
        LittleEndian::write_u32(&mut bytes[8..12], 3);
        LittleEndian::write_u32(&mut bytes[12..16], 68);
        LittleEndian::write_u32(&mut bytes[16..20], 22);
        LittleEndian::write_u32(&mut bytes[20..24], 1);
        LittleEndian::write_u32(&mut bytes[24..28], 1000);
        LittleEndian::write_u32(&mut bytes[28..32], 0);
        LittleEndian::write_u32(&mut bytes[32..36], 1);

        let header = FrameHeader::parse(&bytes);
        assert_eq!(header.version, 3);
        assert_eq!(header.packet_length, 68);
        assert_eq!(header.platform, 22);
        assert_eq!(header.frame_number, 1);
        assert_eq!(header.time, 1000);
        assert_eq!(header.detected_object_count, 0);
        assert_eq!(header.tlv_count, 1);
    }
}
