//! Data container — an object body with optional typed embedded frames.
//!
//! When embedding is opted in, the body is framed as a sequence of
//! `{ size: u64 BE, kind: u32 BE, flags: u32 BE, bytes[size] }` records.
//! Recognized kinds are TIMESTAMP (16-byte body: seconds, nanoseconds)
//! and DATA (the payload). Unknown kinds are skipped on unpack so newer
//! writers stay readable. Without embedding the payload bytes are the
//! object body verbatim, no frame header.

use bytes::{BufMut, Bytes, BytesMut};
use static_assertions::assert_eq_size;
use zerocopy::byteorder::{BigEndian, U32, U64};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::error::Error;

/// Embedded timestamp frame.
pub const FRAME_TIMESTAMP: u32 = 1;
/// Payload frame.
pub const FRAME_DATA: u32 = 2;

/// Size of an on-wire frame header in bytes.
pub const FRAME_HEADER_SIZE: usize = 16;

/// On-wire frame header. All fields big-endian.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
pub struct FrameHeader {
    pub size: U64<BigEndian>,
    pub kind: U32<BigEndian>,
    pub flags: U32<BigEndian>,
}

assert_eq_size!(FrameHeader, [u8; FRAME_HEADER_SIZE]);

/// Body of a TIMESTAMP frame.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes)]
#[repr(C)]
struct TimestampFrame {
    sec: U64<BigEndian>,
    nsec: U64<BigEndian>,
}

assert_eq_size!(TimestampFrame, [u8; 16]);

/// Embedded object timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp {
    pub sec: u64,
    pub nsec: u64,
}

impl Timestamp {
    pub fn zero() -> Self {
        Self::default()
    }
}

/// An object body plus its recognized embedded fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataContainer {
    pub data: Bytes,
    pub timestamp: Option<Timestamp>,
}

impl DataContainer {
    /// A container holding a bare payload, no embedded fields.
    pub fn plain(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            timestamp: None,
        }
    }

    /// A container with an embedded timestamp.
    pub fn with_timestamp(data: impl Into<Bytes>, ts: Timestamp) -> Self {
        Self {
            data: data.into(),
            timestamp: Some(ts),
        }
    }

    /// Serialize for upload. Embedded fields present → framed; otherwise
    /// the payload bytes verbatim.
    pub fn pack(&self) -> Bytes {
        let ts = match self.timestamp {
            Some(ts) => ts,
            None => return self.data.clone(),
        };

        let mut out =
            BytesMut::with_capacity(2 * FRAME_HEADER_SIZE + 16 + self.data.len());

        let ts_header = FrameHeader {
            size: U64::new(16),
            kind: U32::new(FRAME_TIMESTAMP),
            flags: U32::new(0),
        };
        let ts_body = TimestampFrame {
            sec: U64::new(ts.sec),
            nsec: U64::new(ts.nsec),
        };
        out.put_slice(ts_header.as_bytes());
        out.put_slice(ts_body.as_bytes());

        let data_header = FrameHeader {
            size: U64::new(self.data.len() as u64),
            kind: U32::new(FRAME_DATA),
            flags: U32::new(0),
        };
        out.put_slice(data_header.as_bytes());
        out.put_slice(&self.data);

        out.freeze()
    }

    /// Parse a framed body back into a container.
    ///
    /// Scans frames until the bytes are exhausted. A frame whose declared
    /// size exceeds the remaining bytes, or a truncated header, is a
    /// `Corrupt` error. Unknown frame kinds are skipped.
    pub fn unpack(buf: Bytes) -> Result<Self, Error> {
        let mut data = None;
        let mut timestamp = None;
        let mut pos = 0usize;

        while pos < buf.len() {
            let header =
                FrameHeader::read_from_prefix(&buf[pos..]).ok_or_else(|| Error::Corrupt {
                    reason: format!("truncated frame header at byte {pos}"),
                })?;
            pos += FRAME_HEADER_SIZE;

            let remaining = (buf.len() - pos) as u64;
            if header.size.get() > remaining {
                return Err(Error::Corrupt {
                    reason: format!(
                        "frame declares {} bytes, {} remaining",
                        header.size.get(),
                        remaining
                    ),
                });
            }
            let size = header.size.get() as usize;
            let body = buf.slice(pos..pos + size);
            pos += size;

            match header.kind.get() {
                FRAME_TIMESTAMP => {
                    let frame =
                        TimestampFrame::read_from(&body[..]).ok_or_else(|| Error::Corrupt {
                            reason: format!("timestamp frame body is {size} bytes, want 16"),
                        })?;
                    timestamp = Some(Timestamp {
                        sec: frame.sec.get(),
                        nsec: frame.nsec.get(),
                    });
                }
                FRAME_DATA => data = Some(body),
                _ => {} // unknown kind, skip
            }
        }

        Ok(Self {
            data: data.unwrap_or_else(Bytes::new),
            timestamp,
        })
    }
}
