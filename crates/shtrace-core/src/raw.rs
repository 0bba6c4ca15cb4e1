//! Raw binary encoding used inside trace-log entries.
//!
//! The layout is deliberately plain so that byte offsets can be recovered by
//! replaying a decode:
//! - fixed-width integers are little-endian,
//! - sequence lengths and variant tags are LEB128 `varuint32`,
//! - optionals are a `u8` presence flag (`0`/`1`) followed by the value,
//! - byte strings and UTF-8 strings are length-prefixed.
//!
//! [`Reader`] is a bounds-checked cursor; every failure surfaces as
//! [`Error::CorruptLog`].

use crate::error::{Error, Result};

/// Types with a raw encoding.
pub trait Pack {
    /// Append the encoding of `self` to `out`.
    fn pack(&self, out: &mut Vec<u8>);
}

/// Types that can be decoded from a raw encoding.
pub trait Unpack: Sized {
    /// Decode one value, advancing the reader.
    fn unpack(r: &mut Reader<'_>) -> Result<Self>;
}

/// Encode a value into a fresh buffer.
#[must_use]
pub fn to_vec<T: Pack + ?Sized>(value: &T) -> Vec<u8> {
    let mut out = Vec::new();
    value.pack(&mut out);
    out
}

/// Decode a value from the front of `bytes`. Trailing bytes are ignored.
pub fn from_slice<T: Unpack>(bytes: &[u8]) -> Result<T> {
    T::unpack(&mut Reader::new(bytes))
}

/// Bounds-checked read cursor over a byte slice.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Start reading at offset 0.
    #[must_use]
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current offset into the underlying slice.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Borrow the next `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(Error::corrupt(format!(
                "truncated record: need {n} bytes at offset {}, {} left",
                self.pos,
                self.remaining()
            )));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut a = [0u8; N];
        a.copy_from_slice(self.take(N)?);
        Ok(a)
    }

    /// Read a LEB128 `varuint32`.
    pub fn varuint32(&mut self) -> Result<u32> {
        let mut value: u64 = 0;
        let mut shift = 0u32;
        loop {
            let [b] = self.array::<1>()?;
            value |= u64::from(b & 0x7f) << shift;
            if b & 0x80 == 0 {
                break;
            }
            shift += 7;
            if shift >= 35 {
                return Err(Error::corrupt(format!(
                    "varuint32 overflow at offset {}",
                    self.pos
                )));
            }
        }
        u32::try_from(value)
            .map_err(|_| Error::corrupt(format!("varuint32 out of range at offset {}", self.pos)))
    }

    /// Read a sequence length, rejecting lengths that cannot possibly fit in
    /// the remaining input (every element takes at least one byte).
    pub fn seq_len(&mut self) -> Result<usize> {
        let n = self.varuint32()? as usize;
        if n > self.remaining() {
            return Err(Error::corrupt(format!(
                "sequence length {n} exceeds remaining {} bytes at offset {}",
                self.remaining(),
                self.pos
            )));
        }
        Ok(n)
    }
}

/// Append a LEB128 `varuint32`.
pub fn pack_varuint32(mut v: u32, out: &mut Vec<u8>) {
    loop {
        let mut b = (v & 0x7f) as u8;
        v >>= 7;
        if v != 0 {
            b |= 0x80;
        }
        out.push(b);
        if v == 0 {
            break;
        }
    }
}

fn pack_len(n: usize, out: &mut Vec<u8>) {
    // Lengths are bounded by what a single log entry can hold.
    pack_varuint32(u32::try_from(n).unwrap_or(u32::MAX), out);
}

/// `u32` that is encoded as a `varuint32`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct VarUint32(pub u32);

impl Pack for VarUint32 {
    fn pack(&self, out: &mut Vec<u8>) {
        pack_varuint32(self.0, out);
    }
}

impl Unpack for VarUint32 {
    fn unpack(r: &mut Reader<'_>) -> Result<Self> {
        r.varuint32().map(Self)
    }
}

macro_rules! impl_le_int {
    ($($t:ty),*) => {$(
        impl Pack for $t {
            #[inline]
            fn pack(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }
        }

        impl Unpack for $t {
            #[inline]
            fn unpack(r: &mut Reader<'_>) -> Result<Self> {
                Ok(<$t>::from_le_bytes(r.array()?))
            }
        }
    )*};
}

impl_le_int!(u8, u16, u32, u64, i64);

impl Pack for bool {
    fn pack(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }
}

impl Unpack for bool {
    fn unpack(r: &mut Reader<'_>) -> Result<Self> {
        match u8::unpack(r)? {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(Error::corrupt(format!("invalid bool byte {b:#04x}"))),
        }
    }
}

impl<const N: usize> Pack for [u8; N] {
    fn pack(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }
}

impl<const N: usize> Unpack for [u8; N] {
    fn unpack(r: &mut Reader<'_>) -> Result<Self> {
        r.array()
    }
}

impl<T: Pack> Pack for Vec<T> {
    fn pack(&self, out: &mut Vec<u8>) {
        pack_len(self.len(), out);
        for item in self {
            item.pack(out);
        }
    }
}

impl<T: Unpack> Unpack for Vec<T> {
    fn unpack(r: &mut Reader<'_>) -> Result<Self> {
        let n = r.seq_len()?;
        let mut v = Vec::with_capacity(n);
        for _ in 0..n {
            v.push(T::unpack(r)?);
        }
        Ok(v)
    }
}

impl<T: Pack> Pack for Option<T> {
    fn pack(&self, out: &mut Vec<u8>) {
        match self {
            None => out.push(0),
            Some(v) => {
                out.push(1);
                v.pack(out);
            }
        }
    }
}

impl<T: Unpack> Unpack for Option<T> {
    fn unpack(r: &mut Reader<'_>) -> Result<Self> {
        if bool::unpack(r)? {
            T::unpack(r).map(Some)
        } else {
            Ok(None)
        }
    }
}

impl<T: Pack> Pack for Box<T> {
    fn pack(&self, out: &mut Vec<u8>) {
        (**self).pack(out);
    }
}

impl<T: Unpack> Unpack for Box<T> {
    fn unpack(r: &mut Reader<'_>) -> Result<Self> {
        T::unpack(r).map(Box::new)
    }
}

impl Pack for String {
    fn pack(&self, out: &mut Vec<u8>) {
        pack_len(self.len(), out);
        out.extend_from_slice(self.as_bytes());
    }
}

impl Unpack for String {
    fn unpack(r: &mut Reader<'_>) -> Result<Self> {
        let n = r.seq_len()?;
        let raw = r.take(n)?;
        String::from_utf8(raw.to_vec())
            .map_err(|e| Error::corrupt(format!("invalid utf-8 string: {e}")))
    }
}

/// Length-prefixed opaque byte string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Bytes(pub Vec<u8>);

impl Bytes {
    /// Number of bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the byte string is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(v: Vec<u8>) -> Self {
        Self(v)
    }
}

impl From<&[u8]> for Bytes {
    fn from(v: &[u8]) -> Self {
        Self(v.to_vec())
    }
}

impl AsRef<[u8]> for Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Pack for Bytes {
    fn pack(&self, out: &mut Vec<u8>) {
        pack_len(self.0.len(), out);
        out.extend_from_slice(&self.0);
    }
}

impl Unpack for Bytes {
    fn unpack(r: &mut Reader<'_>) -> Result<Self> {
        let n = r.seq_len()?;
        Ok(Self(r.take(n)?.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varuint32_boundaries() {
        for v in [0u32, 1, 127, 128, 16_383, 16_384, u32::MAX] {
            let mut out = Vec::new();
            pack_varuint32(v, &mut out);
            let mut r = Reader::new(&out);
            assert_eq!(r.varuint32().unwrap(), v);
            assert_eq!(r.remaining(), 0, "leftover bytes for {v}");
        }
        assert_eq!(to_vec(&VarUint32(0)), vec![0]);
        assert_eq!(to_vec(&VarUint32(300)), vec![0xac, 0x02]);
    }

    #[test]
    fn varuint32_rejects_overlong() {
        let bad = [0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
        assert!(Reader::new(&bad).varuint32().unwrap_err().is_corrupt());
    }

    #[test]
    fn truncated_input_is_corrupt() {
        let bytes = to_vec(&vec![Bytes(vec![1, 2, 3])]);
        let err = from_slice::<Vec<Bytes>>(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn oversized_length_rejected_before_alloc() {
        // Claims ~268M elements with only two bytes of payload.
        let bytes = [0xff, 0xff, 0xff, 0x7f, 0x00, 0x00];
        assert!(from_slice::<Vec<u64>>(&bytes).unwrap_err().is_corrupt());
    }

    #[test]
    fn empty_sequence_is_one_byte() {
        assert_eq!(to_vec(&Vec::<Bytes>::new()), vec![0]);
    }

    #[test]
    fn option_and_bool_flags() {
        assert_eq!(to_vec(&Some(7u8)), vec![1, 7]);
        assert_eq!(to_vec(&None::<u8>), vec![0]);
        assert!(from_slice::<bool>(&[2]).unwrap_err().is_corrupt());
    }
}
