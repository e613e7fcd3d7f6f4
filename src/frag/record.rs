//! # Fixed Fragment Record
//!
//! Every read is described by an 80-byte [`ShortFragRecord`] held in the fragment
//! index store. All integers are little-endian.
//!
//! ```text
//! offset  size  field
//! 0       1     flags (see below)
//! 1       1     read type code
//! 2       2     screen match count
//! 4       4     reserved
//! 8       32    clear ranges: original, ovl, cns, cgw (start u32, end u32 each)
//! 40      8     accession (UID)
//! 48      8     read index (IID)
//! 56      8     sequence offset (partition offset)
//! 64      8     source offset (partition offset)
//! 72      8     entry time (unix seconds)
//! ```
//!
//! Flag bits: `0` deleted, `1` has quality, `2` ovl clear range set,
//! `3` cns clear range set, `4` cgw clear range set.

use byteorder::{ByteOrder, LittleEndian};

use super::clear::{ClearRange, ClearRanges, ClearStage};
use crate::error::{FragError, Result};
use crate::store::DELETED_FLAG;

/// Size of a [`ShortFragRecord`] on disk
pub const FIXED_RECORD_SIZE: usize = 80;

/// Size of a [`ScreenMatch`] inside a source blob
pub const SCREEN_MATCH_SIZE: usize = 28;

const FLAG_DELETED: u8 = DELETED_FLAG;
const FLAG_QUALITY: u8 = 0x02;
const FLAG_OVL: u8 = 0x04;
const FLAG_CNS: u8 = 0x08;
const FLAG_CGW: u8 = 0x10;

/// Origin of a read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReadType {
    /// Sequencing read
    #[default]
    Read,
    /// Read from an external source
    ExternalRead,
    /// Read from a transposon library
    TransposonRead,
    /// BAC end read
    EndOfBac,
    /// Lightly shotgunned BAC
    LightBac,
    /// Shredded unfinished BAC
    UnfinishedBac,
    /// Shredded finished BAC
    FinishedBac,
    /// Sequence tagged site
    Sts,
    /// BAC contig
    BacTig,
    /// Fully sequenced BAC
    FullBac,
    /// BglII library read
    BglIIRead,
}
impl ReadType {
    /// One-byte code stored in the fixed record
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Read => b'R',
            Self::ExternalRead => b'X',
            Self::TransposonRead => b'T',
            Self::EndOfBac => b'E',
            Self::LightBac => b'L',
            Self::UnfinishedBac => b'U',
            Self::FinishedBac => b'F',
            Self::Sts => b'S',
            Self::BacTig => b'B',
            Self::FullBac => b'C',
            Self::BglIIRead => b'G',
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        Ok(match code {
            b'R' => Self::Read,
            b'X' => Self::ExternalRead,
            b'T' => Self::TransposonRead,
            b'E' => Self::EndOfBac,
            b'L' => Self::LightBac,
            b'U' => Self::UnfinishedBac,
            b'F' => Self::FinishedBac,
            b'S' => Self::Sts,
            b'B' => Self::BacTig,
            b'C' => Self::FullBac,
            b'G' => Self::BglIIRead,
            x => return Err(FragError::InvalidReadType(x).into()),
        })
    }

    /// How much locale information this read type carries in its source blob
    #[must_use]
    pub fn locale_layout(self) -> LocaleLayout {
        match self {
            Self::Read | Self::ExternalRead | Self::TransposonRead | Self::BglIIRead => {
                LocaleLayout::None
            }
            Self::UnfinishedBac | Self::FinishedBac => LocaleLayout::IdAndPosition,
            _ => LocaleLayout::Id,
        }
    }
}

/// Locale information carried by a read type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocaleLayout {
    None,
    /// Locale id only
    Id,
    /// Locale id and the read's position within the locale
    IdAndPosition,
}
impl LocaleLayout {
    /// Bytes occupied at the end of the source blob
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            Self::None => 0,
            Self::Id => 8,
            Self::IdAndPosition => 16,
        }
    }
}

/// Link from a read back to the clone it was sampled from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Locale {
    pub id: u64,
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchDirection {
    #[default]
    Forward,
    Reverse,
}

/// A stretch of a read matching a known repeat or contaminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenMatch {
    /// Matching interval on the read
    pub range_start: u32,
    pub range_end: u32,
    /// Identifier of the screened element
    pub repeat_id: u32,
    pub relevance: u32,
    /// Matching interval on the screened element
    pub portion_start: u32,
    pub portion_end: u32,
    pub direction: MatchDirection,
}
impl ScreenMatch {
    #[must_use]
    pub fn to_bytes(&self) -> [u8; SCREEN_MATCH_SIZE] {
        let mut buffer = [0u8; SCREEN_MATCH_SIZE];
        LittleEndian::write_u32(&mut buffer[0..4], self.range_start);
        LittleEndian::write_u32(&mut buffer[4..8], self.range_end);
        LittleEndian::write_u32(&mut buffer[8..12], self.repeat_id);
        LittleEndian::write_u32(&mut buffer[12..16], self.relevance);
        LittleEndian::write_u32(&mut buffer[16..20], self.portion_start);
        LittleEndian::write_u32(&mut buffer[20..24], self.portion_end);
        buffer[24] = u8::from(self.direction == MatchDirection::Reverse);
        buffer
    }

    /// Parses a screen match from the first [`SCREEN_MATCH_SIZE`] bytes of `buffer`
    #[must_use]
    pub fn from_bytes(buffer: &[u8]) -> Self {
        Self {
            range_start: LittleEndian::read_u32(&buffer[0..4]),
            range_end: LittleEndian::read_u32(&buffer[4..8]),
            repeat_id: LittleEndian::read_u32(&buffer[8..12]),
            relevance: LittleEndian::read_u32(&buffer[12..16]),
            portion_start: LittleEndian::read_u32(&buffer[16..20]),
            portion_end: LittleEndian::read_u32(&buffer[20..24]),
            direction: if buffer[24] == 0 {
                MatchDirection::Forward
            } else {
                MatchDirection::Reverse
            },
        }
    }
}

/// The fixed, persisted part of a read
///
/// The sequence and source offsets are assigned by the store on append and are
/// never changed afterwards, so they are only readable from outside the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShortFragRecord {
    pub deleted: bool,
    pub read_type: ReadType,
    pub has_quality: bool,
    pub screen_match_count: u16,
    pub clear: ClearRanges,
    pub accession: u64,
    pub read_index: u64,
    pub(crate) sequence_offset: u64,
    pub(crate) source_offset: u64,
    pub entry_time: u64,
}
impl ShortFragRecord {
    /// Packed partition offset of the sequence blob
    #[must_use]
    pub fn sequence_offset(&self) -> u64 {
        self.sequence_offset
    }

    /// Packed partition offset of the source blob
    #[must_use]
    pub fn source_offset(&self) -> u64 {
        self.source_offset
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; FIXED_RECORD_SIZE] {
        let mut buffer = [0u8; FIXED_RECORD_SIZE];
        let mut flags = 0;
        if self.deleted {
            flags |= FLAG_DELETED;
        }
        if self.has_quality {
            flags |= FLAG_QUALITY;
        }
        if self.clear.is_set(ClearStage::Ovl) {
            flags |= FLAG_OVL;
        }
        if self.clear.is_set(ClearStage::Cns) {
            flags |= FLAG_CNS;
        }
        if self.clear.is_set(ClearStage::Cgw) {
            flags |= FLAG_CGW;
        }
        buffer[0] = flags;
        buffer[1] = self.read_type.code();
        LittleEndian::write_u16(&mut buffer[2..4], self.screen_match_count);
        for (slot, range) in self.clear.raw_ranges().iter().enumerate() {
            let at = 8 + slot * 8;
            LittleEndian::write_u32(&mut buffer[at..at + 4], range.start);
            LittleEndian::write_u32(&mut buffer[at + 4..at + 8], range.end);
        }
        LittleEndian::write_u64(&mut buffer[40..48], self.accession);
        LittleEndian::write_u64(&mut buffer[48..56], self.read_index);
        LittleEndian::write_u64(&mut buffer[56..64], self.sequence_offset);
        LittleEndian::write_u64(&mut buffer[64..72], self.source_offset);
        LittleEndian::write_u64(&mut buffer[72..80], self.entry_time);
        buffer
    }

    /// Parses a fixed record
    ///
    /// # Errors
    ///
    /// Returns [`FragError::InvalidReadType`] for an unknown read type code.
    pub fn from_bytes(buffer: &[u8; FIXED_RECORD_SIZE]) -> Result<Self> {
        let flags = buffer[0];
        let mut ranges = [ClearRange::default(); 4];
        for (slot, range) in ranges.iter_mut().enumerate() {
            let at = 8 + slot * 8;
            range.start = LittleEndian::read_u32(&buffer[at..at + 4]);
            range.end = LittleEndian::read_u32(&buffer[at + 4..at + 8]);
        }
        let explicit = [
            flags & FLAG_OVL != 0,
            flags & FLAG_CNS != 0,
            flags & FLAG_CGW != 0,
        ];
        Ok(Self {
            deleted: flags & FLAG_DELETED != 0,
            read_type: ReadType::from_code(buffer[1])?,
            has_quality: flags & FLAG_QUALITY != 0,
            screen_match_count: LittleEndian::read_u16(&buffer[2..4]),
            clear: ClearRanges::from_raw(ranges, explicit),
            accession: LittleEndian::read_u64(&buffer[40..48]),
            read_index: LittleEndian::read_u64(&buffer[48..56]),
            sequence_offset: LittleEndian::read_u64(&buffer[56..64]),
            source_offset: LittleEndian::read_u64(&buffer[64..72]),
            entry_time: LittleEndian::read_u64(&buffer[72..80]),
        })
    }
}
