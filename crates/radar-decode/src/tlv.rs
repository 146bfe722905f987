//! TLV type codes and the per-frame TLV walk (spec section 3/6).

use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;
use serde_json::Value;

use crate::payload;
use crate::DecodeError;

const TLV_HEADER_SIZE: usize = 8;

/// The known TLV type codes the IWR1443 emits, plus a tolerant fallback for
/// anything this implementation does not recognise (spec section 3:
/// "Unknown TLV types MUST be tolerated").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum TlvType {
    DetectedPoints,
    RangeProfile,
    NoiseFloorProfile,
    AzimuthStaticHeatmap,
    RangeDopplerHeatmap,
    Statistics,
    DetectedPointsSideInfo,
    AzimuthElevationStaticHeatmap,
    TemperatureStatistics,
    SphericalCoordinates,
    TargetList,
    TargetIndex,
    SphericalCompressedPointCloud,
    PresenceDetection,
    OccupancyStateMachineOutput,
    /// A type code this implementation does not decode the payload of.
    Other(u32),
}

impl TlvType {
    fn from_code(code: u32) -> TlvType {
        match code {
            1 => TlvType::DetectedPoints,
            2 => TlvType::RangeProfile,
            3 => TlvType::NoiseFloorProfile,
            4 => TlvType::AzimuthStaticHeatmap,
            5 => TlvType::RangeDopplerHeatmap,
            6 => TlvType::Statistics,
            7 => TlvType::DetectedPointsSideInfo,
            8 => TlvType::AzimuthElevationStaticHeatmap,
            9 => TlvType::TemperatureStatistics,
            1000 => TlvType::SphericalCoordinates,
            1010 => TlvType::TargetList,
            1011 => TlvType::TargetIndex,
            1020 => TlvType::SphericalCompressedPointCloud,
            1021 => TlvType::PresenceDetection,
            1030 => TlvType::OccupancyStateMachineOutput,
            other => TlvType::Other(other),
        }
    }

    /// The numeric wire code for this type.
    pub fn code(self) -> u32 {
        match self {
            TlvType::DetectedPoints => 1,
            TlvType::RangeProfile => 2,
            TlvType::NoiseFloorProfile => 3,
            TlvType::AzimuthStaticHeatmap => 4,
            TlvType::RangeDopplerHeatmap => 5,
            TlvType::Statistics => 6,
            TlvType::DetectedPointsSideInfo => 7,
            TlvType::AzimuthElevationStaticHeatmap => 8,
            TlvType::TemperatureStatistics => 9,
            TlvType::SphericalCoordinates => 1000,
            TlvType::TargetList => 1010,
            TlvType::TargetIndex => 1011,
            TlvType::SphericalCompressedPointCloud => 1020,
            TlvType::PresenceDetection => 1021,
            TlvType::OccupancyStateMachineOutput => 1030,
            TlvType::Other(code) => code,
        }
    }

    /// The name spec section 6's type-code table renders into the `"Type"`
    /// field for a known type; an unknown type renders its numeric code as a
    /// string instead (spec section 4.F: "Unknown types render their numeric
    /// value as a string is acceptable").
    pub fn name(self) -> String {
        match self {
            TlvType::DetectedPoints => "DetectedPoints".to_string(),
            TlvType::RangeProfile => "RangeProfile".to_string(),
            TlvType::NoiseFloorProfile => "NoiseFloorProfile".to_string(),
            TlvType::AzimuthStaticHeatmap => "AzimuthStaticHeatmap".to_string(),
            TlvType::RangeDopplerHeatmap => "RangeDopplerHeatmap".to_string(),
            TlvType::Statistics => "Statistics".to_string(),
            TlvType::DetectedPointsSideInfo => "DetectedPointsSideInfo".to_string(),
            TlvType::AzimuthElevationStaticHeatmap => "AzimuthElevationStaticHeatmap".to_string(),
            TlvType::TemperatureStatistics => "TemperatureStatistics".to_string(),
            TlvType::SphericalCoordinates => "SphericalCoordinates".to_string(),
            TlvType::TargetList => "TargetList".to_string(),
            TlvType::TargetIndex => "TargetIndex".to_string(),
            TlvType::SphericalCompressedPointCloud => "SphericalCompressedPointCloud".to_string(),
            TlvType::PresenceDetection => "PresenceDetection".to_string(),
            TlvType::OccupancyStateMachineOutput => "OccupancyStateMachineOutput".to_string(),
            TlvType::Other(code) => code.to_string(),
        }
    }
}

/// A single decoded TLV record, ready to be rendered to JSON.
#[derive(Debug, Clone, Serialize)]
pub struct Tlv {
    /// The numeric wire type code (not itself rendered; [`Tlv::tlv_type`]'s
    /// [`TlvType::name`] is what ends up in the `"Type"` field below).
    #[serde(skip)]
    pub tlv_type: TlvType,
    #[serde(rename = "Type")]
    type_name: String,
    #[serde(rename = "Data", skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Walks exactly `tlv_count` TLV records starting at `bytes`, returning the
/// decoded records and the total number of bytes consumed.
///
/// A TLV whose declared length would run past the end of `bytes` is a fatal,
/// frame-dropping error (spec section 4.E/7); a TLV of a type this
/// implementation does not decode the payload of is tolerated and its `Data`
/// is omitted.
pub fn parse_tlvs(bytes: &[u8], tlv_count: u32) -> Result<(Vec<Tlv>, usize), DecodeError> {
    let mut offset = 0usize;
    let mut tlvs = Vec::with_capacity(tlv_count as usize);

    for _ in 0..tlv_count {
        if bytes.len() - offset < TLV_HEADER_SIZE {
            return Err(DecodeError::TruncatedPayload {
                what: "TLV header",
                need: TLV_HEADER_SIZE,
                have: bytes.len() - offset,
            });
        }

        let type_code = LittleEndian::read_u32(&bytes[offset..offset + 4]);
        let length = LittleEndian::read_u32(&bytes[offset + 4..offset + 8]) as usize;
        offset += TLV_HEADER_SIZE;

        if bytes.len() - offset < length {
            return Err(DecodeError::TruncatedPayload {
                what: "TLV payload",
                need: length,
                have: bytes.len() - offset,
            });
        }
        let payload_bytes = &bytes[offset..offset + length];
        offset += length;

        let tlv_type = TlvType::from_code(type_code);
        let data = decode_payload(tlv_type, payload_bytes)?;
        tlvs.push(Tlv { tlv_type, type_name: tlv_type.name(), data });
    }

    Ok((tlvs, offset))
}

fn decode_payload(tlv_type: TlvType, bytes: &[u8]) -> Result<Option<Value>, DecodeError> {
    let value = match tlv_type {
        TlvType::DetectedPoints => serde_json::to_value(payload::parse_detected_points(bytes)?),
        TlvType::RangeProfile => {
            let samples: Vec<String> =
                payload::parse_range_profile(bytes)?.iter().map(ToString::to_string).collect();
            serde_json::to_value(samples)
        }
        TlvType::Statistics => serde_json::to_value(payload::parse_statistics(bytes)?),
        TlvType::DetectedPointsSideInfo => serde_json::to_value(payload::parse_side_info(bytes)?),
        TlvType::TemperatureStatistics => {
            serde_json::to_value(payload::parse_temperature_statistics(bytes)?)
        }
        TlvType::SphericalCoordinates => {
            serde_json::to_value(payload::parse_spherical_coordinates(bytes)?)
        }
        TlvType::TargetList => serde_json::to_value(payload::parse_target_list(bytes)?),
        TlvType::TargetIndex => serde_json::to_value(payload::parse_target_index(bytes)),
        TlvType::SphericalCompressedPointCloud => {
            serde_json::to_value(payload::parse_compressed_point_cloud(bytes)?)
        }
        TlvType::NoiseFloorProfile
        | TlvType::AzimuthStaticHeatmap
        | TlvType::RangeDopplerHeatmap
        | TlvType::AzimuthElevationStaticHeatmap
        | TlvType::PresenceDetection
        | TlvType::OccupancyStateMachineOutput
        | TlvType::Other(_) => {
            tracing::debug!(tlv_type = tlv_type.code(), "TLV type not decoded, passing through untyped");
            return Ok(None);
        }
    };

    Ok(Some(value.expect("payload structs serialize infallibly")))
}

#[cfg(test)]
mod test {
    use super::*;

    fn tlv_header(type_code: u32, length: u32) -> Vec<u8> {
        let mut bytes = vec![0u8; 8];
        LittleEndian::write_u32(&mut bytes[0..4], type_code);
        LittleEndian::write_u32(&mut bytes[4..8], length);
        bytes
    }

    #[test]
    fn unknown_type_is_tolerated_without_data() {
        let mut bytes = tlv_header(4242, 3);
        bytes.extend_from_slice(&[0xAA, 0xBB, 0xCC]);

        let (tlvs, consumed) = parse_tlvs(&bytes, 1).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(tlvs.len(), 1);
        assert_eq!(tlvs[0].tlv_type, TlvType::Other(4242));
        assert_eq!(serde_json::to_value(&tlvs[0]).unwrap()["Type"], "4242");
        assert!(tlvs[0].data.is_none());
    }

    #[test]
    fn truncated_payload_is_fatal() {
        let mut bytes = tlv_header(6, 24);
        bytes.extend_from_slice(&[0u8; 10]); // only 10 of the declared 24 bytes
        assert!(parse_tlvs(&bytes, 1).is_err());
    }

    #[test]
    fn statistics_round_trips_through_json() {
        let mut bytes = tlv_header(6, 24);
        bytes.extend_from_slice(&[0u8; 24]);
        let (tlvs, _) = parse_tlvs(&bytes, 1).unwrap();
        assert_eq!(tlvs[0].tlv_type, TlvType::Statistics);
        assert_eq!(serde_json::to_value(&tlvs[0]).unwrap()["Type"], "Statistics");
        assert!(tlvs[0].data.as_ref().unwrap().get("interFrameProcessingTime").is_some());
    }
}
