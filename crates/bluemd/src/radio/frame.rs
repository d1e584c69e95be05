//! Frame layout of the emulated advertising channel.
//!
//! One datagram stands in for one BLE advertisement:
//!
//! ```text
//!   manufacturer_id  u16 LE
//!   name_len         u8
//!   data_len         u8
//!   name             name_len bytes, UTF-8
//!   data             data_len bytes, manufacturer-specific data
//! ```

use zerocopy::byteorder::{LittleEndian, U16};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

pub const FRAME_HEADER_LEN: usize = 4;

/// Longest local name carried in a frame, as in a legacy BLE advertisement.
pub const MAX_NAME_LEN: usize = 29;

#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C, packed)]
pub struct FrameHeader {
    pub manufacturer_id: U16<LittleEndian>,
    pub name_len: u8,
    pub data_len: u8,
}

static_assertions::assert_eq_size!(FrameHeader, [u8; FRAME_HEADER_LEN]);

/// A parsed frame, borrowing from the receive buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<'a> {
    pub manufacturer_id: u16,
    pub name: Option<&'a str>,
    pub data: &'a [u8],
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("frame is {0} bytes, shorter than its header")]
    Truncated(usize),
    #[error("frame declares {declared} payload bytes but carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("manufacturer data is {0} bytes, limit is 255")]
    DataTooLong(usize),
}

/// Build a frame. Names longer than [`MAX_NAME_LEN`] are cut at a char
/// boundary.
pub fn build(manufacturer_id: u16, name: Option<&str>, data: &[u8]) -> Result<Vec<u8>, FrameError> {
    let data_len = u8::try_from(data.len()).map_err(|_| FrameError::DataTooLong(data.len()))?;
    let name = name.map(truncate_name).unwrap_or_default();

    let header = FrameHeader {
        manufacturer_id: U16::new(manufacturer_id),
        name_len: name.len() as u8,
        data_len,
    };

    let mut out = Vec::with_capacity(FRAME_HEADER_LEN + name.len() + data.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(data);
    Ok(out)
}

/// Parse a received datagram. Trailing bytes after the data are ignored.
/// A name that is not valid UTF-8 is dropped.
pub fn parse(buf: &[u8]) -> Result<Frame<'_>, FrameError> {
    let header = FrameHeader::read_from_prefix(buf).ok_or(FrameError::Truncated(buf.len()))?;
    let rest = &buf[FRAME_HEADER_LEN..];

    let name_len = header.name_len as usize;
    let data_len = header.data_len as usize;
    if rest.len() < name_len + data_len {
        return Err(FrameError::LengthMismatch {
            declared: name_len + data_len,
            actual: rest.len(),
        });
    }

    let (name, rest) = rest.split_at(name_len);
    let name = std::str::from_utf8(name).ok().filter(|n| !n.is_empty());

    Ok(Frame {
        manufacturer_id: header.manufacturer_id.get(),
        name,
        data: &rest[..data_len],
    })
}

fn truncate_name(name: &str) -> &str {
    if name.len() <= MAX_NAME_LEN {
        return name;
    }
    let mut end = MAX_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}
