//! Compression envelope for trace-log entries.
//!
//! An entry is `[tag: u8][payload]`. The tag is never compressed.
//! - `none` (0): payload is the raw trace-sequence encoding.
//! - `zlib` (1): payload is `[len: u32 LE][zlib stream of len bytes]`. The
//!   explicit length makes any bytes after the stream inert padding.

use crate::error::{Error, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Size of the zlib length prefix.
pub const ZLIB_LEN_PREFIX: usize = 4;

/// Largest trace-sequence encoding a `zlib` entry may inflate to.
pub const MAX_INFLATED_LEN: usize = 64 << 20;

/// Per-entry compression codec.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    /// Stored as-is.
    None = 0,
    /// zlib (deflate) stream with a length prefix.
    #[default]
    Zlib = 1,
}

impl CompressionType {
    /// The on-disk tag byte.
    #[inline]
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for CompressionType {
    type Error = Error;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::None),
            1 => Ok(Self::Zlib),
            t => Err(Error::CorruptLog(format!("unknown compression tag {t}"))),
        }
    }
}

impl std::fmt::Display for CompressionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Zlib => "zlib",
        })
    }
}

impl std::str::FromStr for CompressionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "zlib" => Ok(Self::Zlib),
            other => Err(format!("unknown compression {other} (expected none|zlib)")),
        }
    }
}

/// Wrap `plain` into the payload form for `ct` (without the tag byte).
pub fn encode_payload(ct: CompressionType, plain: &[u8]) -> Result<Vec<u8>> {
    match ct {
        CompressionType::None => Ok(plain.to_vec()),
        CompressionType::Zlib => {
            if plain.len() > MAX_INFLATED_LEN {
                return Err(Error::UnsupportedOperation(format!(
                    "entry of {} bytes exceeds the {MAX_INFLATED_LEN} byte zlib limit",
                    plain.len()
                )));
            }
            let mut enc = ZlibEncoder::new(Vec::with_capacity(plain.len() / 2 + 16), Compression::default());
            enc.write_all(plain)?;
            let stream = enc.finish()?;
            let len = u32::try_from(stream.len()).map_err(|_| {
                Error::UnsupportedOperation(format!("compressed entry too large ({} bytes)", stream.len()))
            })?;
            let mut out = Vec::with_capacity(ZLIB_LEN_PREFIX + stream.len());
            out.extend_from_slice(&len.to_le_bytes());
            out.extend_from_slice(&stream);
            Ok(out)
        }
    }
}

/// Recover the plain trace-sequence bytes from a payload.
///
/// For `none` the payload is borrowed as-is (padding included); for `zlib`
/// only the declared stream is inflated.
pub fn decode_payload(ct: CompressionType, payload: &[u8]) -> Result<std::borrow::Cow<'_, [u8]>> {
    match ct {
        CompressionType::None => Ok(std::borrow::Cow::Borrowed(payload)),
        CompressionType::Zlib => {
            inflate_bounded(zlib_stream(payload)?, MAX_INFLATED_LEN).map(std::borrow::Cow::Owned)
        }
    }
}

/// Inflate `stream`, failing with `CorruptLog` once more than `limit` bytes
/// come out.
fn inflate_bounded(stream: &[u8], limit: usize) -> Result<Vec<u8>> {
    let mut plain = Vec::with_capacity(stream.len().saturating_mul(3).min(limit));
    ZlibDecoder::new(stream)
        .take(limit as u64 + 1)
        .read_to_end(&mut plain)
        .map_err(|e| Error::CorruptLog(format!("zlib decompression failed: {e}")))?;
    if plain.len() > limit {
        return Err(Error::CorruptLog(format!(
            "zlib stream inflates past the {limit} byte limit"
        )));
    }
    Ok(plain)
}

/// The zlib stream inside a `zlib` payload, bounded by its length prefix.
fn zlib_stream(payload: &[u8]) -> Result<&[u8]> {
    let prefix: [u8; ZLIB_LEN_PREFIX] = payload
        .get(..ZLIB_LEN_PREFIX)
        .and_then(|p| p.try_into().ok())
        .ok_or_else(|| Error::CorruptLog("zlib payload shorter than its length prefix".into()))?;
    let len = u32::from_le_bytes(prefix) as usize;
    payload
        .get(ZLIB_LEN_PREFIX..ZLIB_LEN_PREFIX + len)
        .ok_or_else(|| {
            Error::CorruptLog(format!(
                "zlib stream length {len} exceeds payload of {} bytes",
                payload.len() - ZLIB_LEN_PREFIX
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zlib_payload_ignores_trailing_padding() {
        let plain = b"trace trace trace trace trace".repeat(8);
        let mut payload = encode_payload(CompressionType::Zlib, &plain).unwrap();
        assert!(payload.len() < plain.len());
        payload.extend_from_slice(&[0u8; 17]);
        assert_eq!(&*decode_payload(CompressionType::Zlib, &payload).unwrap(), &plain[..]);
    }

    #[test]
    fn none_payload_is_identity() {
        let payload = encode_payload(CompressionType::None, b"abc").unwrap();
        assert_eq!(payload, b"abc");
    }

    #[test]
    fn bad_tags_and_streams_are_corrupt() {
        assert!(CompressionType::try_from(9).unwrap_err().is_corrupt());
        assert!(decode_payload(CompressionType::Zlib, &[1, 0]).unwrap_err().is_corrupt());
        assert!(decode_payload(CompressionType::Zlib, &[200, 0, 0, 0, 1, 2])
            .unwrap_err()
            .is_corrupt());
        assert!(decode_payload(CompressionType::Zlib, &[3, 0, 0, 0, 1, 2, 3])
            .unwrap_err()
            .is_corrupt());
    }

    #[test]
    fn inflation_is_capped() {
        let payload = encode_payload(CompressionType::Zlib, &[0u8; 4096]).unwrap();
        let stream = zlib_stream(&payload).unwrap();
        assert_eq!(inflate_bounded(stream, 4096).unwrap().len(), 4096);
        assert!(inflate_bounded(stream, 4095).unwrap_err().is_corrupt());
    }

    #[test]
    fn parse_and_display() {
        assert_eq!("ZLIB".parse::<CompressionType>().unwrap(), CompressionType::Zlib);
        assert_eq!(CompressionType::None.to_string(), "none");
        assert!("lz4".parse::<CompressionType>().is_err());
    }
}
