//! TLV payload variants (spec section 3/6).
//!
//! Every `from_bytes` function receives exactly the TLV's declared payload
//! slice (header-exclusive) and is expected to consume it fully; the caller
//! (`tlv::parse_tlvs`) is responsible for the length bookkeeping and for
//! treating a truncated slice as a fatal, frame-dropping error.

use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;

use crate::DecodeError;

/// A single 3D detected point (TLV type 1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectedPoint {
    x: f32,
    y: f32,
    z: f32,
    doppler: f32,
}

const DETECTED_POINT_SIZE: usize = 16;

/// A Q9.5 fixed-point range-profile sample (TLV type 2).
///
/// Bit layout, little-endian 16-bit word: bit 0 is the sign, bits 1-9 are
/// the integer magnitude, bits 10-14 are the fractional magnitude, bit 15 is
/// unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Q9Real(u16);

impl Q9Real {
    fn from_raw(raw: u16) -> Self {
        Q9Real(raw)
    }

    fn sign(self) -> bool {
        self.0 & 0x1 != 0
    }

    fn integer_part(self) -> u16 {
        (self.0 >> 1) & 0x1FF
    }

    /// The raw 5-bit fractional field, unscaled.
    ///
    /// spec section 9 flags this rendering as "likely incorrect for a true
    /// Q9.5 representation" since the true fractional value is
    /// `fraction / 32`, available via [`Q9Real::fraction_scaled`]. The raw
    /// rendering is kept as the default to match the reference behaviour
    /// bit-for-bit; see DESIGN.md for the resolution.
    fn fraction_raw(self) -> u16 {
        (self.0 >> 10) & 0x1F
    }

    /// The fractional field scaled into `[0, 1)`, i.e. the mathematically
    /// correct Q9.5 interpretation.
    pub fn fraction_scaled(self) -> f64 {
        f64::from(self.fraction_raw()) / 32.0
    }
}

impl std::fmt::Display for Q9Real {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.sign() {
            write!(f, "-{}.{}", self.integer_part(), self.fraction_raw())
        } else {
            write!(f, "{}.{}", self.integer_part(), self.fraction_raw())
        }
    }
}

impl Serialize for Q9Real {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Frame-level processing statistics (TLV type 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Statistics {
    #[serde(rename = "interFrameProcessingTime")]
    inter_frame_processing_time: u32,
    #[serde(rename = "transmitOutputTime")]
    transmit_output_time: u32,
    #[serde(rename = "interFrameProcessingMargin")]
    inter_frame_processing_margin: u32,
    #[serde(rename = "interChirpProcessingMargin")]
    inter_chirp_processing_margin: u32,
    #[serde(rename = "activeFrameCPULoad")]
    active_frame_cpu_load: u32,
    #[serde(rename = "interFrameCPULoad")]
    inter_frame_cpu_load: u32,
}

const STATISTICS_SIZE: usize = 24;

/// Per-point side information (TLV type 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SideInfo {
    snr: u16,
    noise: u16,
}

const SIDE_INFO_SIZE: usize = 4;

/// Sensor temperature readings (TLV type 9).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemperatureStatistics {
    #[serde(rename = "tempReportValid")]
    temp_report_valid: u32,
    time: u32,
    #[serde(rename = "tempSensors")]
    sensors: [u16; 10],
}

const TEMPERATURE_STATISTICS_SIZE: usize = 4 + 4 + 10 * 2;

/// A point in spherical coordinates (TLV type 1000).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SphericalPoint {
    range: f32,
    azimuth: f32,
    elevation: f32,
    doppler: f32,
}

const SPHERICAL_POINT_SIZE: usize = 16;

/// A tracked 3D target (TLV type 1010).
///
/// spec section 6 declares a 112-byte record but enumerates only the 21
/// `f32` fields below (84 bytes). This implementation decodes those 21
/// fields and skips the remaining 28 reserved bytes of each record so that
/// record boundaries stay aligned with the declared stride; the reserved
/// bytes are not rendered. See DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tracked3DTarget {
    #[serde(rename = "trackID")]
    track_id: f32,
    position: Vec3,
    velocity: Vec3,
    acceleration: Vec3,
    #[serde(rename = "errorCovariance")]
    error_covariance: [[f32; 3]; 3],
    #[serde(rename = "gatingFunctionGain")]
    gating_function_gain: f32,
    #[serde(rename = "confidenceLevel")]
    confidence_level: f32,
}

/// An (x, y, z) triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Vec3 {
    x: f32,
    y: f32,
    z: f32,
}

const TRACKED_3D_TARGET_DECODED_SIZE: usize = 21 * 4;
const TRACKED_3D_TARGET_STRIDE: usize = 112;

/// The 20-byte unit-conversion header of a compressed point cloud (TLV type
/// 1020).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompressedPointCloudHeader {
    #[serde(rename = "elevationUnit")]
    elevation_unit: f32,
    #[serde(rename = "azimuthUnit")]
    azimuth_unit: f32,
    #[serde(rename = "dopplerUnit")]
    doppler_unit: f32,
    #[serde(rename = "rangeUnit")]
    range_unit: f32,
    #[serde(rename = "snrUnit")]
    snr_unit: f32,
}

const COMPRESSED_HEADER_SIZE: usize = 5 * 4;

/// One compressed spherical point (part of TLV type 1020).
///
/// spec section 3 declares a 10-byte record but enumerates fields summing to
/// 8 bytes (`i8 + i8 + i16 + u16 + u16`); the remaining 2 bytes of each
/// record are skipped as reserved. See DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompressedPoint {
    elevation: i8,
    azimuth: i8,
    doppler: i16,
    range: u16,
    snr: u16,
}

const COMPRESSED_POINT_DECODED_SIZE: usize = 1 + 1 + 2 + 2 + 2;
const COMPRESSED_POINT_STRIDE: usize = 10;

/// A full compressed point cloud payload (TLV type 1020).
#[derive(Debug, Clone, Serialize)]
pub struct CompressedPointCloud {
    #[serde(flatten)]
    pub header: CompressedPointCloudHeader,
    pub points: Vec<CompressedPoint>,
}

fn require(bytes: &[u8], len: usize, what: &'static str) -> Result<(), DecodeError> {
    if bytes.len() < len {
        return Err(DecodeError::TruncatedPayload { what, need: len, have: bytes.len() });
    }
    Ok(())
}

impl DetectedPoint {
    fn from_bytes(bytes: &[u8]) -> DetectedPoint {
        DetectedPoint {
            x: LittleEndian::read_f32(&bytes[0..4]),
            y: LittleEndian::read_f32(&bytes[4..8]),
            z: LittleEndian::read_f32(&bytes[8..12]),
            doppler: LittleEndian::read_f32(&bytes[12..16]),
        }
    }
}

pub(crate) fn parse_detected_points(bytes: &[u8]) -> Result<Vec<DetectedPoint>, DecodeError> {
    parse_array(bytes, DETECTED_POINT_SIZE, "DetectedPoints", DetectedPoint::from_bytes)
}

pub(crate) fn parse_range_profile(bytes: &[u8]) -> Result<Vec<Q9Real>, DecodeError> {
    parse_array(bytes, 2, "RangeProfile", |chunk| {
        Q9Real::from_raw(LittleEndian::read_u16(chunk))
    })
}

pub(crate) fn parse_statistics(bytes: &[u8]) -> Result<Statistics, DecodeError> {
    require(bytes, STATISTICS_SIZE, "Statistics")?;
    Ok(Statistics {
        inter_frame_processing_time: LittleEndian::read_u32(&bytes[0..4]),
        transmit_output_time: LittleEndian::read_u32(&bytes[4..8]),
        inter_frame_processing_margin: LittleEndian::read_u32(&bytes[8..12]),
        inter_chirp_processing_margin: LittleEndian::read_u32(&bytes[12..16]),
        active_frame_cpu_load: LittleEndian::read_u32(&bytes[16..20]),
        inter_frame_cpu_load: LittleEndian::read_u32(&bytes[20..24]),
    })
}

pub(crate) fn parse_side_info(bytes: &[u8]) -> Result<Vec<SideInfo>, DecodeError> {
    parse_array(bytes, SIDE_INFO_SIZE, "DetectedPointsSideInfo", |chunk| SideInfo {
        snr: LittleEndian::read_u16(&chunk[0..2]),
        noise: LittleEndian::read_u16(&chunk[2..4]),
    })
}

pub(crate) fn parse_temperature_statistics(bytes: &[u8]) -> Result<TemperatureStatistics, DecodeError> {
    require(bytes, TEMPERATURE_STATISTICS_SIZE, "TemperatureStatistics")?;
    let mut sensors = [0u16; 10];
    for (i, sensor) in sensors.iter_mut().enumerate() {
        let offset = 8 + i * 2;
        *sensor = LittleEndian::read_u16(&bytes[offset..offset + 2]);
    }
    Ok(TemperatureStatistics {
        temp_report_valid: LittleEndian::read_u32(&bytes[0..4]),
        time: LittleEndian::read_u32(&bytes[4..8]),
        sensors,
    })
}

pub(crate) fn parse_spherical_coordinates(bytes: &[u8]) -> Result<Vec<SphericalPoint>, DecodeError> {
    parse_array(bytes, SPHERICAL_POINT_SIZE, "SphericalCoordinates", |chunk| SphericalPoint {
        range: LittleEndian::read_f32(&chunk[0..4]),
        azimuth: LittleEndian::read_f32(&chunk[4..8]),
        elevation: LittleEndian::read_f32(&chunk[8..12]),
        doppler: LittleEndian::read_f32(&chunk[12..16]),
    })
}

pub(crate) fn parse_target_list(bytes: &[u8]) -> Result<Vec<Tracked3DTarget>, DecodeError> {
    parse_array(bytes, TRACKED_3D_TARGET_STRIDE, "TargetList", |chunk| {
        debug_assert!(chunk.len() >= TRACKED_3D_TARGET_DECODED_SIZE);
        let f = |offset: usize| LittleEndian::read_f32(&chunk[offset..offset + 4]);
        Tracked3DTarget {
            track_id: f(0),
            position: Vec3 { x: f(4), y: f(8), z: f(12) },
            velocity: Vec3 { x: f(16), y: f(20), z: f(24) },
            acceleration: Vec3 { x: f(28), y: f(32), z: f(36) },
            error_covariance: [
                [f(40), f(44), f(48)],
                [f(52), f(56), f(60)],
                [f(64), f(68), f(72)],
            ],
            gating_function_gain: f(76),
            confidence_level: f(80),
        }
    })
}

pub(crate) fn parse_target_index(bytes: &[u8]) -> Vec<u8> {
    bytes.to_vec()
}

pub(crate) fn parse_compressed_point_cloud(bytes: &[u8]) -> Result<CompressedPointCloud, DecodeError> {
    require(bytes, COMPRESSED_HEADER_SIZE, "SphericalCompressedPointCloud header")?;
    let header = CompressedPointCloudHeader {
        elevation_unit: LittleEndian::read_f32(&bytes[0..4]),
        azimuth_unit: LittleEndian::read_f32(&bytes[4..8]),
        doppler_unit: LittleEndian::read_f32(&bytes[8..12]),
        range_unit: LittleEndian::read_f32(&bytes[12..16]),
        snr_unit: LittleEndian::read_f32(&bytes[16..20]),
    };

    let points = parse_array(
        &bytes[COMPRESSED_HEADER_SIZE..],
        COMPRESSED_POINT_STRIDE,
        "SphericalCompressedPointCloud point",
        |chunk| {
            debug_assert!(chunk.len() >= COMPRESSED_POINT_DECODED_SIZE);
            CompressedPoint {
                elevation: chunk[0] as i8,
                azimuth: chunk[1] as i8,
                doppler: LittleEndian::read_i16(&chunk[2..4]),
                range: LittleEndian::read_u16(&chunk[4..6]),
                snr: LittleEndian::read_u16(&chunk[6..8]),
            }
        },
    )?;

    Ok(CompressedPointCloud { header, points })
}

/// Splits `bytes` into `stride`-sized chunks and maps each one, erroring if
/// the payload length is not a whole multiple of `stride`.
fn parse_array<T>(
    bytes: &[u8],
    stride: usize,
    what: &'static str,
    mut from_chunk: impl FnMut(&[u8]) -> T,
) -> Result<Vec<T>, DecodeError> {
    if bytes.len() % stride != 0 {
        return Err(DecodeError::TruncatedPayload {
            what,
            need: stride,
            have: bytes.len() % stride,
        });
    }
    Ok(bytes.chunks_exact(stride).map(|chunk| from_chunk(chunk)).collect())
}
