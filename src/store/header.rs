//! # Store Header
//!
//! Every store, file-backed or memory-backed, carries a fixed 64-byte header.
//! For file-backed stores it occupies the first bytes of the file and is rewritten
//! on every commit. The data region starts immediately after it.
//!
//! ```text
//! offset  size  field
//! 0       4     magic ("FRGS")
//! 4       1     kind (1 = index, 2 = variable-length)
//! 5       1     deleted flag
//! 6       2     reserved
//! 8       4     version
//! 12      4     element size (index stores only)
//! 16      8     first index
//! 24      8     last index
//! 32      8     created at (unix seconds)
//! 40      8     updated at (unix seconds)
//! 48      8     type label (NUL padded)
//! 56      8     reserved
//! ```
//!
//! All integers are little-endian.

use std::io::Read;
use std::time::{SystemTime, UNIX_EPOCH};

use byteorder::{ByteOrder, LittleEndian};
use tracing::warn;

use crate::error::{HeaderError, Result};

/// Magic number for store identification: "FRGS" in ASCII (little-endian)
#[allow(clippy::unreadable_literal)]
pub const MAGIC: u32 = 0x53475246;

/// Size of the header in bytes
pub const SIZE_HEADER: usize = 64;

/// Length of the informational type label
pub const LABEL_LEN: usize = 8;

/// Reserved bytes at the end of the header
pub const RESERVED: [u8; 8] = [42; 8];

/// Record discipline implemented over a store's byte space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Fixed-size elements addressed by logical index
    Index,
    /// Length-prefixed blobs addressed by byte offset
    VariableLength,
}
impl StoreKind {
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Index => 1,
            Self::VariableLength => 2,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            1 => Ok(Self::Index),
            2 => Ok(Self::VariableLength),
            x => Err(HeaderError::InvalidStoreKind(x).into()),
        }
    }
}

/// Header structure shared by index and variable-length stores
///
/// For index stores `first_index..=last_index` is the logical record range and an
/// empty store has `last_index == first_index - 1`.
/// For variable-length stores `first_index` is the byte offset of the first byte held
/// and `last_index` is the exclusive end offset, i.e. the cumulative length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreHeader {
    pub magic: u32,
    pub kind: StoreKind,
    pub deleted: bool,
    pub version: u32,
    pub element_size: u32,
    pub first_index: u64,
    pub last_index: u64,
    pub created_at: u64,
    pub updated_at: u64,
    pub label: [u8; LABEL_LEN],
    pub reserved: [u8; 8],
}
impl StoreHeader {
    /// Creates a fresh header stamped with the current time
    ///
    /// # Arguments
    ///
    /// * `kind` - The record discipline of the store
    /// * `label` - Informational type label, truncated to 8 bytes
    /// * `element_size` - Size of one element (ignored for variable-length stores)
    /// * `version` - The version this store is written with
    /// * `first_index` - First logical index (index stores) or base offset (variable-length stores)
    #[must_use]
    pub fn new(
        kind: StoreKind,
        label: &str,
        element_size: u32,
        version: u32,
        first_index: u64,
    ) -> Self {
        let now = unix_now();
        let last_index = match kind {
            StoreKind::Index => first_index.saturating_sub(1),
            StoreKind::VariableLength => first_index,
        };
        Self {
            magic: MAGIC,
            kind,
            deleted: false,
            version,
            element_size: match kind {
                StoreKind::Index => element_size,
                StoreKind::VariableLength => 0,
            },
            first_index,
            last_index,
            created_at: now,
            updated_at: now,
            label: encode_label(label),
            reserved: RESERVED,
        }
    }

    /// The type label with its NUL padding stripped
    #[must_use]
    pub fn label(&self) -> &[u8] {
        let end = self
            .label
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(LABEL_LEN);
        &self.label[..end]
    }

    /// Number of bytes held in the data region described by this header
    ///
    /// Saturates at `u64::MAX` for ranges that [`from_bytes`](Self::from_bytes) rejects.
    #[must_use]
    pub fn data_len(&self) -> u64 {
        self.checked_data_len().unwrap_or(u64::MAX)
    }

    fn checked_data_len(&self) -> Option<u64> {
        match self.kind {
            StoreKind::Index => self
                .last_index
                .checked_add(1)?
                .checked_sub(self.first_index)?
                .checked_mul(u64::from(self.element_size)),
            StoreKind::VariableLength => self.last_index.checked_sub(self.first_index),
        }
    }

    /// Stamps the header with the current time
    pub fn touch(&mut self) {
        self.updated_at = unix_now();
    }

    /// Checks the stored version against the version the caller expects
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::VersionMismatch`] if the versions differ.
    pub fn check_version(&self, expected: u32) -> Result<()> {
        if self.version != expected {
            warn!(
                expected,
                found = self.version,
                "refusing store with mismatched version"
            );
            return Err(HeaderError::VersionMismatch {
                expected,
                found: self.version,
            }
            .into());
        }
        Ok(())
    }

    /// Parses a header from a fixed-size byte array
    ///
    /// # Errors
    ///
    /// Returns an error if the magic number or the kind byte is invalid, or if the
    /// index range does not describe a data region that fits in a `u64`.
    pub fn from_bytes(buffer: &[u8; SIZE_HEADER]) -> Result<Self> {
        let magic = LittleEndian::read_u32(&buffer[0..4]);
        if magic != MAGIC {
            return Err(HeaderError::InvalidMagicNumber(magic).into());
        }
        let kind = StoreKind::from_code(buffer[4])?;
        let mut label = [0u8; LABEL_LEN];
        label.copy_from_slice(&buffer[48..56]);
        let mut reserved = [0u8; 8];
        reserved.copy_from_slice(&buffer[56..64]);
        let header = Self {
            magic,
            kind,
            deleted: buffer[5] != 0,
            version: LittleEndian::read_u32(&buffer[8..12]),
            element_size: LittleEndian::read_u32(&buffer[12..16]),
            first_index: LittleEndian::read_u64(&buffer[16..24]),
            last_index: LittleEndian::read_u64(&buffer[24..32]),
            created_at: LittleEndian::read_u64(&buffer[32..40]),
            updated_at: LittleEndian::read_u64(&buffer[40..48]),
            label,
            reserved,
        };
        if header.checked_data_len().is_none() {
            return Err(HeaderError::InvalidRange {
                first: header.first_index,
                last: header.last_index,
            }
            .into());
        }
        Ok(header)
    }

    /// Parses a header from the beginning of an arbitrarily sized buffer
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is smaller than [`SIZE_HEADER`] or the header is invalid.
    pub fn from_buffer(buffer: &[u8]) -> Result<Self> {
        if buffer.len() < SIZE_HEADER {
            return Err(HeaderError::InvalidSize(buffer.len(), SIZE_HEADER).into());
        }
        let mut bytes = [0u8; SIZE_HEADER];
        bytes.copy_from_slice(&buffer[..SIZE_HEADER]);
        Self::from_bytes(&bytes)
    }

    /// Serializes the header into its fixed binary representation
    #[must_use]
    pub fn to_bytes(&self) -> [u8; SIZE_HEADER] {
        let mut buffer = [0u8; SIZE_HEADER];
        LittleEndian::write_u32(&mut buffer[0..4], self.magic);
        buffer[4] = self.kind.code();
        buffer[5] = u8::from(self.deleted);
        LittleEndian::write_u32(&mut buffer[8..12], self.version);
        LittleEndian::write_u32(&mut buffer[12..16], self.element_size);
        LittleEndian::write_u64(&mut buffer[16..24], self.first_index);
        LittleEndian::write_u64(&mut buffer[24..32], self.last_index);
        LittleEndian::write_u64(&mut buffer[32..40], self.created_at);
        LittleEndian::write_u64(&mut buffer[40..48], self.updated_at);
        buffer[48..56].copy_from_slice(&self.label);
        buffer[56..64].copy_from_slice(&self.reserved);
        buffer
    }

    /// Reads exactly [`SIZE_HEADER`] bytes from a reader and parses them
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buffer = [0u8; SIZE_HEADER];
        reader.read_exact(&mut buffer)?;
        Self::from_bytes(&buffer)
    }
}

fn encode_label(label: &str) -> [u8; LABEL_LEN] {
    let mut buffer = [0u8; LABEL_LEN];
    let bytes = label.as_bytes();
    let len = bytes.len().min(LABEL_LEN);
    buffer[..len].copy_from_slice(&bytes[..len]);
    buffer
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_header_layout() -> Result<()> {
        let header = StoreHeader::new(StoreKind::Index, "frg", 80, 5, 1);
        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..4], b"FRGS");
        assert_eq!(bytes[4], 1);
        assert_eq!(LittleEndian::read_u32(&bytes[12..16]), 80);
        assert_eq!(&bytes[56..64], &RESERVED);

        let parsed = StoreHeader::from_bytes(&bytes)?;
        assert_eq!(parsed, header);
        assert_eq!(parsed.label(), b"frg");
        Ok(())
    }

    #[test]
    fn test_empty_ranges() {
        let index = StoreHeader::new(StoreKind::Index, "frg", 80, 5, 10);
        assert_eq!(index.last_index, 9);
        assert_eq!(index.data_len(), 0);

        let vlr = StoreHeader::new(StoreKind::VariableLength, "seq", 80, 5, 0);
        assert_eq!(vlr.element_size, 0);
        assert_eq!(vlr.data_len(), 0);
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = StoreHeader::new(StoreKind::Index, "frg", 80, 5, 1).to_bytes();
        bytes[0] = b'X';
        assert!(matches!(
            StoreHeader::from_bytes(&bytes),
            Err(Error::HeaderError(HeaderError::InvalidMagicNumber(_)))
        ));
    }

    #[test]
    fn test_corrupt_range() {
        let header = StoreHeader::new(StoreKind::Index, "frg", 80, 5, 4);
        for last_index in [u64::MAX, 1, u64::MAX / 2] {
            let bytes = StoreHeader {
                last_index,
                ..header
            }
            .to_bytes();
            assert!(matches!(
                StoreHeader::from_bytes(&bytes),
                Err(Error::HeaderError(HeaderError::InvalidRange { first: 4, .. }))
            ));
        }

        let vlr = StoreHeader::new(StoreKind::VariableLength, "seq", 0, 5, 100);
        let bytes = StoreHeader { last_index: 99, ..vlr }.to_bytes();
        assert!(matches!(
            StoreHeader::from_bytes(&bytes),
            Err(Error::HeaderError(HeaderError::InvalidRange { first: 100, last: 99 }))
        ));
        let corrupt = StoreHeader { last_index: 99, ..vlr };
        assert_eq!(corrupt.data_len(), u64::MAX);
    }

    #[test]
    fn test_short_buffer() {
        assert!(matches!(
            StoreHeader::from_buffer(&[0u8; 12]),
            Err(Error::HeaderError(HeaderError::InvalidSize(12, SIZE_HEADER)))
        ));
    }

    #[test]
    fn test_version_gate() {
        let header = StoreHeader::new(StoreKind::VariableLength, "src", 0, 4, 0);
        assert!(header.check_version(4).is_ok());
        assert!(matches!(
            header.check_version(5),
            Err(Error::HeaderError(HeaderError::VersionMismatch {
                expected: 5,
                found: 4
            }))
        ));
    }

    #[test]
    fn test_label_truncation() {
        let header = StoreHeader::new(StoreKind::Index, "fragments", 8, 1, 1);
        assert_eq!(header.label(), b"fragment");
    }
}
