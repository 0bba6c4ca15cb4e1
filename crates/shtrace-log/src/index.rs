//! Position index: block number → byte range of its entry in the log file.
//!
//! On disk the index is a flat array of fixed-size little-endian records:
//!
//! ```text
//! block_num: u32 | offset: u64 | length: u64      (20 bytes)
//! ```
//!
//! Records are strictly increasing in block number and in offset. Each
//! entry in the log is preceded by an [`EntryHeader`], so `offset` always
//! points [`HEADER_SIZE`] bytes past the start of its frame.

use shtrace_core::{Error, Result};

/// Bytes per index record.
pub const RECORD_SIZE: usize = 20;

/// Bytes per entry frame header in the log file.
pub const HEADER_SIZE: u64 = 12;

/// Location of one stored entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexRecord {
    /// Block the entry belongs to.
    pub block_num: u32,
    /// Offset of the entry bytes (past its frame header).
    pub offset: u64,
    /// Entry length in bytes.
    pub length: u64,
}

impl IndexRecord {
    /// Offset just past the entry.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.offset + self.length
    }

    /// Offset of the frame header.
    #[inline]
    #[must_use]
    pub const fn frame_start(&self) -> u64 {
        self.offset - HEADER_SIZE
    }

    /// Fixed-size on-disk form.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut out = [0u8; RECORD_SIZE];
        out[..4].copy_from_slice(&self.block_num.to_le_bytes());
        out[4..12].copy_from_slice(&self.offset.to_le_bytes());
        out[12..].copy_from_slice(&self.length.to_le_bytes());
        out
    }

    /// Parse one on-disk record.
    #[must_use]
    pub fn from_bytes(b: &[u8; RECORD_SIZE]) -> Self {
        let mut u32b = [0u8; 4];
        let mut u64b = [0u8; 8];
        u32b.copy_from_slice(&b[..4]);
        let block_num = u32::from_le_bytes(u32b);
        u64b.copy_from_slice(&b[4..12]);
        let offset = u64::from_le_bytes(u64b);
        u64b.copy_from_slice(&b[12..]);
        let length = u64::from_le_bytes(u64b);
        Self {
            block_num,
            offset,
            length,
        }
    }
}

/// Frame header written in front of every entry in the log file. It lets
/// the index be rebuilt from the log alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryHeader {
    /// Block the entry belongs to.
    pub block_num: u32,
    /// Entry length in bytes.
    pub length: u64,
}

impl EntryHeader {
    /// On-disk form.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE as usize] {
        let mut out = [0u8; HEADER_SIZE as usize];
        out[..4].copy_from_slice(&self.block_num.to_le_bytes());
        out[4..].copy_from_slice(&self.length.to_le_bytes());
        out
    }

    /// Parse an on-disk header.
    #[must_use]
    pub fn from_bytes(b: &[u8; HEADER_SIZE as usize]) -> Self {
        let mut u32b = [0u8; 4];
        let mut u64b = [0u8; 8];
        u32b.copy_from_slice(&b[..4]);
        u64b.copy_from_slice(&b[4..]);
        Self {
            block_num: u32::from_le_bytes(u32b),
            length: u64::from_le_bytes(u64b),
        }
    }
}

/// In-memory copy of the index, sorted by block number.
#[derive(Clone, Debug, Default)]
pub struct PositionIndex {
    records: Vec<IndexRecord>,
}

impl PositionIndex {
    /// Decode the whole index file.
    ///
    /// Returns the index and the number of trailing bytes that do not form a
    /// whole record (an interrupted append). Out-of-order records are
    /// [`Error::CorruptLog`].
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize)> {
        let chunks = bytes.chunks_exact(RECORD_SIZE);
        let partial = chunks.remainder().len();
        let mut index = Self {
            records: Vec::with_capacity(bytes.len() / RECORD_SIZE),
        };
        for chunk in chunks {
            let mut rec = [0u8; RECORD_SIZE];
            rec.copy_from_slice(chunk);
            index.push(IndexRecord::from_bytes(&rec))?;
        }
        Ok((index, partial))
    }

    /// Append a record, enforcing monotonicity.
    pub fn push(&mut self, rec: IndexRecord) -> Result<()> {
        let (min_block, min_offset) = match self.records.last() {
            Some(last) => (last.block_num.checked_add(1), last.end().saturating_add(HEADER_SIZE)),
            None => (Some(0), HEADER_SIZE),
        };
        let in_order = min_block.is_some_and(|b| rec.block_num >= b);
        if !in_order || rec.offset < min_offset || rec.offset.checked_add(rec.length).is_none() {
            return Err(Error::CorruptLog(format!(
                "index record for block {} at offset {} breaks ordering (previous: {:?})",
                rec.block_num,
                rec.offset,
                self.records.last()
            )));
        }
        self.records.push(rec);
        Ok(())
    }

    /// Drop every record from position `keep` on.
    pub fn truncate(&mut self, keep: usize) {
        self.records.truncate(keep);
    }

    /// Record for `block_num`, if stored.
    #[must_use]
    pub fn get(&self, block_num: u32) -> Option<&IndexRecord> {
        self.records
            .binary_search_by_key(&block_num, |r| r.block_num)
            .ok()
            .map(|i| &self.records[i])
    }

    /// Lowest stored block.
    #[must_use]
    pub fn first(&self) -> Option<&IndexRecord> {
        self.records.first()
    }

    /// Highest stored block.
    #[must_use]
    pub fn last(&self) -> Option<&IndexRecord> {
        self.records.last()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no entries are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in block order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexRecord> + '_ {
        self.records.iter()
    }

    /// Encode every record (used when the index file is rewritten).
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        self.records.iter().flat_map(IndexRecord::to_bytes).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(block_num: u32, offset: u64, length: u64) -> IndexRecord {
        IndexRecord {
            block_num,
            offset,
            length,
        }
    }

    #[test]
    fn record_bytes_are_little_endian() {
        let r = rec(0x0102_0304, 12, 5);
        let b = r.to_bytes();
        assert_eq!(&b[..4], &[4, 3, 2, 1]);
        assert_eq!(IndexRecord::from_bytes(&b), r);
        let h = EntryHeader {
            block_num: 9,
            length: 300,
        };
        assert_eq!(EntryHeader::from_bytes(&h.to_bytes()), h);
    }

    #[test]
    fn decode_reports_partial_tail() {
        let mut idx = PositionIndex::default();
        idx.push(rec(1, 12, 10)).unwrap();
        idx.push(rec(3, 34, 10)).unwrap();
        let mut bytes = idx.encode();
        bytes.extend_from_slice(&[0xff; 7]);
        let (back, partial) = PositionIndex::decode(&bytes).unwrap();
        assert_eq!(partial, 7);
        assert_eq!(back.len(), 2);
        assert_eq!(back.get(3).unwrap().offset, 34);
        assert!(back.get(2).is_none());
    }

    #[test]
    fn out_of_order_is_corrupt() {
        let mut idx = PositionIndex::default();
        idx.push(rec(5, 12, 10)).unwrap();
        assert!(idx.push(rec(5, 34, 1)).unwrap_err().is_corrupt());
        assert!(idx.push(rec(4, 34, 1)).unwrap_err().is_corrupt());
        // Overlaps the previous frame.
        assert!(idx.push(rec(6, 30, 1)).unwrap_err().is_corrupt());
        assert!(PositionIndex::default().push(rec(1, 0, 1)).is_err());
    }
}
