//! # Partition Offsets
//!
//! Blob references in the fixed record are single 64-bit values that name both the
//! partition holding the blob and the blob's byte offset inside that partition's
//! store:
//!
//! ```text
//!  63        56 55                                              0
//! +------------+-------------------------------------------------+
//! | partition  | byte offset                                     |
//! +------------+-------------------------------------------------+
//! ```
//!
//! This layout is shared with any external tool that splits or rebuilds partitions.
//! Unpartitioned stores always use partition 0, so their packed offsets equal the
//! raw byte offsets.

use crate::error::{PartitionError, Result};

/// Width of the partition id field
pub const PARTITION_BITS: u32 = 8;

/// Width of the byte offset field
pub const OFFSET_BITS: u32 = 64 - PARTITION_BITS;

/// Number of addressable partitions
pub const MAX_PARTITIONS: u32 = 1 << PARTITION_BITS;

/// Largest addressable byte offset
pub const MAX_OFFSET: u64 = (1 << OFFSET_BITS) - 1;

/// A packed `(partition, byte offset)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PackedOffset(u64);
impl PackedOffset {
    /// Packs a partition id and byte offset.
    ///
    /// # Errors
    ///
    /// Returns [`PartitionError::PartitionOverflow`] if `partition` does not fit in
    /// [`PARTITION_BITS`], or [`PartitionError::OffsetOverflow`] if `offset` exceeds
    /// [`MAX_OFFSET`].
    pub fn new(partition: u32, offset: u64) -> Result<Self> {
        if partition >= MAX_PARTITIONS {
            return Err(PartitionError::PartitionOverflow(partition).into());
        }
        if offset > MAX_OFFSET {
            return Err(PartitionError::OffsetOverflow(offset).into());
        }
        Ok(Self((u64::from(partition) << OFFSET_BITS) | offset))
    }

    /// Wraps a value read from a fixed record.
    #[must_use]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn partition(self) -> u32 {
        (self.0 >> OFFSET_BITS) as u32
    }

    #[must_use]
    pub fn offset(self) -> u64 {
        self.0 & MAX_OFFSET
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_field_boundaries() -> Result<()> {
        let pairs = [
            (0, 0),
            (0, MAX_OFFSET),
            (1, 1),
            (MAX_PARTITIONS - 1, 0),
            (MAX_PARTITIONS - 1, MAX_OFFSET),
            (17, 0x00AB_CDEF_0123_4567),
        ];
        for (partition, offset) in pairs {
            let packed = PackedOffset::new(partition, offset)?;
            assert_eq!(packed.partition(), partition);
            assert_eq!(packed.offset(), offset);
            assert_eq!(PackedOffset::from_raw(packed.raw()), packed);
        }
        Ok(())
    }

    #[test]
    fn test_unpartitioned_is_raw_offset() -> Result<()> {
        assert_eq!(PackedOffset::new(0, 12_345)?.raw(), 12_345);
        assert_eq!(PackedOffset::new(2, 1)?.raw(), (2 << OFFSET_BITS) | 1);
        Ok(())
    }

    #[test]
    fn test_overflow() {
        assert!(matches!(
            PackedOffset::new(0, MAX_OFFSET + 1),
            Err(Error::PartitionError(PartitionError::OffsetOverflow(_)))
        ));
        assert!(matches!(
            PackedOffset::new(MAX_PARTITIONS, 0),
            Err(Error::PartitionError(PartitionError::PartitionOverflow(256)))
        ));
    }
}
