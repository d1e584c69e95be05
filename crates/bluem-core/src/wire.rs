//! Bluem wire format: the manufacturer-specific advertisement payload.
//!
//! These types ARE the protocol. Every field, every offset, every reserved
//! bit is part of the format that other Bluem devices already parse. Changing
//! anything here breaks interoperability with deployed beacons.
//!
//! Layout (11 bytes, all multi-byte fields little-endian):
//!
//! | Offset | Size | Field                                             |
//! |--------|------|---------------------------------------------------|
//! | 0      | 1    | protocol marker (`PROTOCOL_MARKER`)               |
//! | 1      | 1    | blood group (bits 0-3), has-phone (bit 4)         |
//! | 2      | 2    | latitude × 100, i16                               |
//! | 4      | 2    | longitude × 100, i16                              |
//! | 6      | 4    | phone suffix digits, i32                          |
//! | 10     | 1    | sequence byte                                     |
//!
//! There is no checksum and no length prefix. The payload has to fit in a
//! legacy advertisement alongside the manufacturer identifier.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use static_assertions::assert_eq_size;
use zerocopy::byteorder::{LittleEndian, I16, I32};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

use crate::profile::ProfileSnapshot;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Manufacturer identifier the payload is advertised under.
/// Scanners filter exclusively on this value.
pub const MANUFACTURER_ID: u16 = 0x06E0;

/// First byte of the manufacturer data for a profile ping.
/// Other vendors reusing the same manufacturer identifier carry a different byte here.
pub const PROTOCOL_MARKER: u8 = 0x01;

/// Service UUID advertised alongside the payload for generic BLE tooling.
/// Scanning never filters on it.
pub const SERVICE_UUID: &str = "a6cb59ee-1ef5-4c5e-bc36-dda3ec7d53d5";

/// Bytes following the protocol marker.
pub const PING_BODY_LEN: usize = 10;

/// Full manufacturer data length, marker included.
pub const PAYLOAD_LEN: usize = 1 + PING_BODY_LEN;

/// Bits 0-3 of the flags byte.
pub const BLOOD_GROUP_MASK: u8 = 0x0F;

/// Bit 4 of the flags byte.
pub const HAS_PHONE_FLAG: u8 = 0x10;

/// Bits 5-7 of the flags byte. Always zero on encode.
pub const RESERVED_MASK: u8 = 0xE0;

/// Fixed-point scale applied to latitude and longitude.
pub const COORDINATE_SCALE: f64 = 100.0;

// ── Wire structs ──────────────────────────────────────────────────────────────

/// The 10 bytes that follow the protocol marker.
///
/// Wire size: 10 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C, packed)]
pub struct PingBody {
    /// Bits 0-3: blood group index. Bit 4: has-phone. Bits 5-7: reserved.
    pub blood_and_flags: u8,

    /// Latitude in hundredths of a degree. 9100 means "no location".
    pub latitude: I16<LittleEndian>,

    /// Longitude in hundredths of a degree. 18100 means "no location".
    pub longitude: I16<LittleEndian>,

    /// Up to the last 7 decimal digits of the phone number. 0 when absent.
    pub phone_suffix: I32<LittleEndian>,

    /// Rolling counter. Only "changed since last seen" is meaningful.
    pub sequence: u8,
}

assert_eq_size!(PingBody, [u8; PING_BODY_LEN]);

/// Complete manufacturer data for a profile ping.
///
/// Wire size: 11 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C, packed)]
pub struct PingFrame {
    /// Always `PROTOCOL_MARKER` for frames this crate produces.
    pub marker: u8,
    pub body: PingBody,
}

// Compile-time size guard. If this fails, the wire format has silently changed.
assert_eq_size!(PingFrame, [u8; PAYLOAD_LEN]);

// ── Encoded payload ───────────────────────────────────────────────────────────

/// An encoded advertisement payload. Always exactly `PAYLOAD_LEN` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedPayload([u8; PAYLOAD_LEN]);

impl EncodedPayload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> [u8; PAYLOAD_LEN] {
        self.0
    }
}

impl AsRef<[u8]> for EncodedPayload {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

// ── Decoded ping ──────────────────────────────────────────────────────────────

/// A profile ping as read off the wire.
///
/// No range checking is done here. Coordinates outside ±90/±180 and blood
/// group indices above 8 are passed through; use [`DecodedPing::location`]
/// and `display::BloodGroup` to interpret them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecodedPing {
    pub blood_group_index: u8,
    pub has_phone: bool,
    pub latitude: f64,
    pub longitude: f64,
    pub phone_suffix: u32,
    pub sequence: u8,
}

impl DecodedPing {
    /// Coordinates, if both are valid degrees.
    /// The "unset" values 91.0 / 181.0 fall outside the range and yield None.
    pub fn location(&self) -> Option<(f64, f64)> {
        let lat_ok = (-90.0..=90.0).contains(&self.latitude);
        let lon_ok = (-180.0..=180.0).contains(&self.longitude);
        (lat_ok && lon_ok).then_some((self.latitude, self.longitude))
    }

    /// Last four digits of the phone suffix, when the sender flagged one.
    pub fn phone_hint(&self) -> Option<String> {
        if !self.has_phone || self.phone_suffix == 0 {
            return None;
        }
        let digits = self.phone_suffix.to_string();
        let start = digits.len().saturating_sub(4);
        Some(digits[start..].to_string())
    }
}

impl From<&PingBody> for DecodedPing {
    fn from(body: &PingBody) -> Self {
        // Copy packed fields to locals before use.
        let flags = body.blood_and_flags;
        let latitude = body.latitude.get();
        let longitude = body.longitude.get();
        let phone_suffix = body.phone_suffix.get();

        Self {
            blood_group_index: flags & BLOOD_GROUP_MASK,
            has_phone: flags & HAS_PHONE_FLAG != 0,
            latitude: f64::from(latitude) / COORDINATE_SCALE,
            longitude: f64::from(longitude) / COORDINATE_SCALE,
            phone_suffix: phone_suffix as u32,
            sequence: body.sequence,
        }
    }
}

// ── Encode ────────────────────────────────────────────────────────────────────

/// Encode a profile snapshot into an advertisement payload.
///
/// `sequence` supplies byte 10; see [`wall_clock_sequence`]. A blood group
/// index above 15 is masked to its low 4 bits rather than rejected, which is
/// what deployed beacons do.
pub fn encode(profile: &ProfileSnapshot, sequence: impl FnOnce() -> u8) -> EncodedPayload {
    let mut flags = profile.blood_group_index & BLOOD_GROUP_MASK;
    if profile.has_phone_suffix {
        flags |= HAS_PHONE_FLAG;
    }

    let frame = PingFrame {
        marker: PROTOCOL_MARKER,
        body: PingBody {
            blood_and_flags: flags,
            latitude: I16::new(scale_coordinate(profile.latitude)),
            longitude: I16::new(scale_coordinate(profile.longitude)),
            phone_suffix: I32::new(profile.phone_suffix_digits as i32),
            sequence: sequence(),
        },
    };

    let mut out = [0u8; PAYLOAD_LEN];
    out.copy_from_slice(frame.as_bytes());
    EncodedPayload(out)
}

/// Degrees to hundredths, rounding half up, wrapping into i16.
///
/// The sentinel 91.0 becomes 9100 and 181.0 becomes 18100; both fit.
fn scale_coordinate(degrees: f64) -> i16 {
    (degrees * COORDINATE_SCALE + 0.5).floor() as i32 as i16
}

/// Sequence byte derived from wall-clock seconds, modulo 256.
pub fn wall_clock_sequence() -> u8 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| (d.as_secs() % 256) as u8)
        .unwrap_or(0)
}

// ── Decode ────────────────────────────────────────────────────────────────────

/// Decode the bytes following the protocol marker.
///
/// The caller has already stripped and checked the marker. Only the first
/// `PING_BODY_LEN` bytes are read; anything after them is ignored.
pub fn decode(after_marker: &[u8]) -> Result<DecodedPing, DecodeError> {
    let body = PingBody::read_from_prefix(after_marker).ok_or(DecodeError::TooShort {
        len: after_marker.len(),
    })?;
    Ok(DecodedPing::from(&body))
}

/// Decode complete manufacturer data: check the marker, then the body.
pub fn decode_manufacturer_data(data: &[u8]) -> Result<DecodedPing, DecodeError> {
    match data.split_first() {
        None => Err(DecodeError::Empty),
        Some((&PROTOCOL_MARKER, rest)) => decode(rest),
        Some((&other, _)) => Err(DecodeError::UnrecognizedMarker(other)),
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Reasons manufacturer data does not yield a profile ping.
///
/// None of these are fatal. The sighting still counts for presence.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("ping body is {len} bytes, need at least {}", PING_BODY_LEN)]
    TooShort { len: usize },

    #[error("unrecognized protocol marker: 0x{0:02x}")]
    UnrecognizedMarker(u8),

    #[error("manufacturer data is empty")]
    Empty,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
