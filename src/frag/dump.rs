//! # Record Dumps
//!
//! A dump is a byte stream of records, each made of three checksummed fields in
//! their stored form: the fixed record, the encoded sequence blob and the packed
//! source blob. Blobs are never decoded, so a dump reloads bit-exactly.
//!
//! ```text
//! +---------+---------+-------+-----------+-------+-----------+-------+-----------+
//! | fixed   | ~~~,~~~ | seq   | ~~~,~~~   | src   | ~~~.~~~   | next record ...   |
//! +---------+---------+-------+-----------+-------+-----------+-------+-----------+
//!
//! field := [len: u32][crc32: u32][len bytes]
//! ```

use std::io::{ErrorKind, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use super::partition::PackedOffset;
use super::record::{ShortFragRecord, FIXED_RECORD_SIZE};
use super::store::FragmentStore;
use crate::error::{DumpError, Result, StoreError};

/// Written between the fields of a record
pub const FIELD_SEPARATOR: &[u8; 7] = b"~~~,~~~";

/// Written after the last field of a record
pub const RECORD_TERMINATOR: &[u8; 7] = b"~~~.~~~";

/// One record as read back from a dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpedRecord {
    pub fixed: ShortFragRecord,
    /// Encoded sequence/quality blob
    pub sequence: Vec<u8>,
    /// Packed source blob
    pub source: Vec<u8>,
}

fn write_field<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    let len = u32::try_from(bytes.len()).map_err(|_| StoreError::RecordTooLarge(bytes.len()))?;
    writer.write_u32::<LittleEndian>(len)?;
    writer.write_u32::<LittleEndian>(crc32fast::hash(bytes))?;
    writer.write_all(bytes)?;
    Ok(())
}

impl FragmentStore {
    /// Writes the read at `index` to `writer` in dump form.
    pub fn dump_record<W: Write>(&mut self, index: u64, writer: &mut W) -> Result<()> {
        self.ensure_active()?;
        let fixed = self.read_fixed(index)?;
        let mut sequence = Vec::new();
        let mut source = Vec::new();
        let at = PackedOffset::from_raw(fixed.sequence_offset);
        let slot = self.check_partition(at.partition())?;
        self.partitions[slot]
            .sequence
            .get_vec(at.offset(), &mut sequence)?;
        let at = PackedOffset::from_raw(fixed.source_offset);
        let slot = self.check_partition(at.partition())?;
        self.partitions[slot].source.get_vec(at.offset(), &mut source)?;

        write_field(writer, &fixed.to_bytes())?;
        writer.write_all(FIELD_SEPARATOR)?;
        write_field(writer, &sequence)?;
        writer.write_all(FIELD_SEPARATOR)?;
        write_field(writer, &source)?;
        writer.write_all(RECORD_TERMINATOR)?;
        Ok(())
    }

    /// Dumps every read in index order, returning how many were written.
    pub fn dump<W: Write>(&mut self, writer: &mut W) -> Result<u64> {
        self.ensure_active()?;
        let (first, last) = (self.first_index(), self.last_index());
        for index in first..=last {
            self.dump_record(index, writer)?;
        }
        Ok(self.len())
    }

    /// Appends a dumped read to partition 0 without re-encoding its blobs.
    ///
    /// The same contiguity rule as [`append`](Self::append) applies to the dumped
    /// read index.
    pub fn append_dump(&mut self, record: &DumpedRecord) -> Result<()> {
        self.ensure_active()?;
        let expected = self.last_index() + 1;
        if record.fixed.read_index != expected {
            return Err(StoreError::NonContiguousAppend {
                expected,
                got: record.fixed.read_index,
            }
            .into());
        }
        if self.is_read_only() {
            return Err(StoreError::ReadOnly.into());
        }
        let blobs = &mut self.partitions[0];
        let sequence_offset = PackedOffset::new(0, blobs.sequence.end_offset())?;
        let source_offset = PackedOffset::new(0, blobs.source.end_offset())?;
        blobs.sequence.append(&record.sequence)?;
        blobs.source.append(&record.source)?;

        let fixed = ShortFragRecord {
            sequence_offset: sequence_offset.raw(),
            source_offset: source_offset.raw(),
            ..record.fixed
        };
        self.append_fixed(expected, 0, &fixed)
    }
}

/// Reads records back from a dump, verifying every field checksum
pub struct DumpReader<R: Read> {
    reader: R,
}
impl<R: Read> DumpReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Returns the inner reader
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Reads the next record, or `None` at a clean end of input.
    ///
    /// # Errors
    ///
    /// * [`DumpError::ChecksumMismatch`] if a field fails its CRC32 check
    /// * [`DumpError::Malformed`] for truncated input or misplaced separators
    pub fn next_record(&mut self) -> Result<Option<DumpedRecord>> {
        let Some(fixed) = self.read_field("fixed", true)? else {
            return Ok(None);
        };
        self.expect_marker(FIELD_SEPARATOR)?;
        let sequence = self.require_field("sequence")?;
        self.expect_marker(FIELD_SEPARATOR)?;
        let source = self.require_field("source")?;
        self.expect_marker(RECORD_TERMINATOR)?;

        let Ok(fixed) = <&[u8; FIXED_RECORD_SIZE]>::try_from(fixed.as_slice()) else {
            return Err(DumpError::Malformed("fixed record has the wrong size").into());
        };
        Ok(Some(DumpedRecord {
            fixed: ShortFragRecord::from_bytes(fixed)?,
            sequence,
            source,
        }))
    }

    fn require_field(&mut self, field: &'static str) -> Result<Vec<u8>> {
        match self.read_field(field, false)? {
            Some(bytes) => Ok(bytes),
            None => Err(DumpError::Malformed("truncated record").into()),
        }
    }

    fn read_field(&mut self, field: &'static str, at_record_start: bool) -> Result<Option<Vec<u8>>> {
        let mut prefix = [0u8; 8];
        let mut filled = 0;
        while filled < prefix.len() {
            match self.reader.read(&mut prefix[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        if filled == 0 && at_record_start {
            return Ok(None);
        }
        if filled < prefix.len() {
            return Err(DumpError::Malformed("truncated field header").into());
        }
        let mut header = &prefix[..];
        let len = header.read_u32::<LittleEndian>()?;
        let expected = header.read_u32::<LittleEndian>()?;

        // grows with the bytes actually present, not with the declared length
        let mut bytes = Vec::new();
        (&mut self.reader)
            .take(u64::from(len))
            .read_to_end(&mut bytes)?;
        if bytes.len() < len as usize {
            return Err(DumpError::Malformed("truncated field").into());
        }
        let found = crc32fast::hash(&bytes);
        if found != expected {
            return Err(DumpError::ChecksumMismatch {
                field,
                expected,
                found,
            }
            .into());
        }
        Ok(Some(bytes))
    }

    fn expect_marker(&mut self, marker: &[u8; 7]) -> Result<()> {
        let mut buf = [0u8; 7];
        self.reader.read_exact(&mut buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => DumpError::Malformed("truncated separator").into(),
            _ => crate::error::Error::from(e),
        })?;
        if &buf != marker {
            return Err(DumpError::Malformed("unexpected separator").into());
        }
        Ok(())
    }
}
impl<R: Read> Iterator for DumpReader<R> {
    type Item = Result<DumpedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
