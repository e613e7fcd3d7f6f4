use std::ops::RangeInclusive;
use std::path::Path;

use super::base::{Location, OpenMode, Store};
use super::config::StoreConfig;
use super::header::{StoreHeader, StoreKind};
use super::stream::IndexStream;
use crate::error::{Result, StoreError};

/// Bit of an element's first byte that marks the element as deleted
pub const DELETED_FLAG: u8 = 0x01;

/// A store of fixed-size elements addressed by a logical index
///
/// Indices run from `first_index` (at least 1) to `last_index`; an empty store has
/// `last_index == first_index - 1`. Elements are only ever appended at `last_index + 1`.
pub struct IndexStore {
    store: Store,
}
impl IndexStore {
    /// Creates an empty index store with the default [`StoreConfig`]
    ///
    /// # Arguments
    ///
    /// * `location` - File path or memory
    /// * `label` - Informational type label written into the header
    /// * `element_size` - Size in bytes of every element
    /// * `version` - Version stamped into the header and checked on open
    /// * `first_index` - Index of the first element to be appended (at least 1)
    pub fn create(
        location: &Location,
        label: &str,
        element_size: usize,
        version: u32,
        first_index: u64,
    ) -> Result<Self> {
        Self::create_with(
            location,
            label,
            element_size,
            version,
            first_index,
            &StoreConfig::default(),
        )
    }

    pub fn create_with(
        location: &Location,
        label: &str,
        element_size: usize,
        version: u32,
        first_index: u64,
        config: &StoreConfig,
    ) -> Result<Self> {
        if first_index == 0 {
            return Err(StoreError::InvalidFirstIndex(first_index).into());
        }
        let Ok(element_size) = u32::try_from(element_size) else {
            return Err(StoreError::RecordTooLarge(element_size).into());
        };
        let header = StoreHeader::new(StoreKind::Index, label, element_size, version, first_index);
        let store = Store::create(location, header, config)?;
        Ok(Self { store })
    }

    /// Opens an index store file.
    ///
    /// # Errors
    ///
    /// Fails with a version mismatch before touching any data if the stored version
    /// differs from `version`.
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode, version: u32) -> Result<Self> {
        Self::open_with(path, mode, version, &StoreConfig::default())
    }

    pub fn open_with<P: AsRef<Path>>(
        path: P,
        mode: OpenMode,
        version: u32,
        config: &StoreConfig,
    ) -> Result<Self> {
        let store = Store::open(path.as_ref(), mode, StoreKind::Index, version, config)?;
        Ok(Self { store })
    }

    /// Copies an index store file, or the elements in `range`, into memory.
    ///
    /// Loading a sub-range produces a read-only store whose first and last
    /// indices are the bounds of `range`.
    pub fn load_into_memory<P: AsRef<Path>>(
        path: P,
        version: u32,
        range: Option<RangeInclusive<u64>>,
    ) -> Result<Self> {
        let store = Store::load(path.as_ref(), StoreKind::Index, version, |on_disk| {
            let (first, last) = match range {
                Some(range) => {
                    let (first, last) = (*range.start(), *range.end());
                    check_window(on_disk, first, last)?;
                    (first, last)
                }
                None => (on_disk.first_index, on_disk.last_index),
            };
            let size = u64::from(on_disk.element_size);
            let window =
                (first - on_disk.first_index) * size..(last + 1 - on_disk.first_index) * size;
            let mode = if first == on_disk.first_index && last == on_disk.last_index {
                OpenMode::ReadWrite
            } else {
                OpenMode::ReadOnly
            };
            let mut header = *on_disk;
            header.first_index = first;
            header.last_index = last;
            Ok((header, window, mode))
        })?;
        Ok(Self { store })
    }

    #[must_use]
    pub fn header(&self) -> &StoreHeader {
        self.store.header()
    }

    #[must_use]
    pub fn first_index(&self) -> u64 {
        self.store.header().first_index
    }

    #[must_use]
    pub fn last_index(&self) -> u64 {
        self.store.header().last_index
    }

    /// Number of elements held
    #[must_use]
    pub fn len(&self) -> u64 {
        self.last_index() + 1 - self.first_index()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn element_size(&self) -> usize {
        self.store.header().element_size as usize
    }

    #[must_use]
    pub fn is_memory(&self) -> bool {
        self.store.is_memory()
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.store.is_read_only()
    }

    /// Appends an element at `last_index + 1` and returns its index.
    pub fn append(&mut self, element: &[u8]) -> Result<u64> {
        let index = self.last_index() + 1;
        self.append_at(index, element)?;
        Ok(index)
    }

    /// Appends an element, requiring that `index` is exactly `last_index + 1`.
    ///
    /// On an empty store that is the declared first index.
    pub fn append_at(&mut self, index: u64, element: &[u8]) -> Result<()> {
        self.check_element(element.len())?;
        let expected = self.last_index() + 1;
        if index != expected {
            return Err(StoreError::NonContiguousAppend {
                expected,
                got: index,
            }
            .into());
        }
        self.store.write(self.position(index), element)?;
        self.store.header_mut().last_index = index;
        Ok(())
    }

    /// Copies the element at `index` into `buf`.
    pub fn get(&mut self, index: u64, buf: &mut [u8]) -> Result<()> {
        self.check_range(index)?;
        self.check_element(buf.len())?;
        self.store.read(self.position(index), buf)
    }

    /// Overwrites the element at `index` in place.
    pub fn set(&mut self, index: u64, element: &[u8]) -> Result<()> {
        self.check_range(index)?;
        self.check_element(element.len())?;
        self.store.write(self.position(index), element)
    }

    /// Sets [`DELETED_FLAG`] in the first byte of the element at `index`, leaving every other bit intact.
    pub fn mark_deleted(&mut self, index: u64) -> Result<()> {
        self.check_range(index)?;
        self.store.ensure_writable()?;
        let pos = self.position(index);
        let mut flags = [0u8; 1];
        self.store.read(pos, &mut flags)?;
        flags[0] |= DELETED_FLAG;
        self.store.write(pos, &flags)
    }

    /// Removes every element and restarts numbering at `first_index`.
    pub fn reset(&mut self, first_index: u64) -> Result<()> {
        if first_index == 0 {
            return Err(StoreError::InvalidFirstIndex(first_index).into());
        }
        self.store.truncate(0)?;
        let header = self.store.header_mut();
        header.first_index = first_index;
        header.last_index = first_index - 1;
        Ok(())
    }

    /// Streams every element in index order.
    pub fn stream(&mut self) -> IndexStream<'_> {
        IndexStream::new(self)
    }

    /// Rewrites the header and flushes buffered writes.
    pub fn commit(&mut self) -> Result<()> {
        self.store.commit()
    }

    /// Commits and releases the store.
    pub fn close(mut self) -> Result<()> {
        self.commit()
    }

    pub(crate) fn check_range(&self, index: u64) -> Result<()> {
        let (first, last) = (self.first_index(), self.last_index());
        if index < first || index > last {
            return Err(StoreError::IndexOutOfRange { index, first, last }.into());
        }
        Ok(())
    }

    fn check_element(&self, len: usize) -> Result<()> {
        if len != self.element_size() {
            return Err(StoreError::ElementSizeMismatch {
                expected: self.element_size(),
                got: len,
            }
            .into());
        }
        Ok(())
    }

    fn position(&self, index: u64) -> u64 {
        (index - self.first_index()) * self.element_size() as u64
    }
}

fn check_window(on_disk: &StoreHeader, first: u64, last: u64) -> Result<()> {
    let bad = if first < on_disk.first_index || first > on_disk.last_index {
        Some(first)
    } else if last < first || last > on_disk.last_index {
        Some(last)
    } else {
        None
    };
    match bad {
        Some(index) => Err(StoreError::IndexOutOfRange {
            index,
            first: on_disk.first_index,
            last: on_disk.last_index,
        }
        .into()),
        None => Ok(()),
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::error::{Error, HeaderError};

    const VERSION: u32 = 3;

    fn element(tag: u8) -> [u8; 8] {
        [0, tag, tag, tag, tag, tag, tag, tag]
    }

    #[test]
    fn test_append_get_set() -> Result<()> {
        let mut store = IndexStore::create(&Location::Memory, "test", 8, VERSION, 1)?;
        assert!(store.is_empty());
        assert_eq!(store.append(&element(1))?, 1);
        assert_eq!(store.append(&element(2))?, 2);
        store.append_at(3, &element(3))?;
        assert_eq!(store.len(), 3);

        let mut buf = [0u8; 8];
        store.get(2, &mut buf)?;
        assert_eq!(buf, element(2));

        store.set(2, &element(9))?;
        store.get(2, &mut buf)?;
        assert_eq!(buf, element(9));
        assert_eq!(store.last_index(), 3);
        Ok(())
    }

    #[test]
    fn test_non_contiguous_append() -> Result<()> {
        let mut store = IndexStore::create(&Location::Memory, "test", 8, VERSION, 5)?;

        // the first append must land on the declared first index
        assert!(matches!(
            store.append_at(1, &element(1)),
            Err(Error::StoreError(StoreError::NonContiguousAppend {
                expected: 5,
                got: 1
            }))
        ));
        store.append_at(5, &element(5))?;
        assert!(matches!(
            store.append_at(7, &element(7)),
            Err(Error::StoreError(StoreError::NonContiguousAppend {
                expected: 6,
                got: 7
            }))
        ));
        assert_eq!(store.last_index(), 5);
        Ok(())
    }

    #[test]
    fn test_out_of_range() -> Result<()> {
        let mut store = IndexStore::create(&Location::Memory, "test", 8, VERSION, 1)?;
        store.append(&element(1))?;
        let mut buf = [0u8; 8];
        assert!(matches!(
            store.get(2, &mut buf),
            Err(Error::StoreError(StoreError::IndexOutOfRange {
                index: 2,
                first: 1,
                last: 1
            }))
        ));
        assert!(store.set(0, &element(0)).is_err());
        assert!(store.mark_deleted(2).is_err());
        assert!(matches!(
            store.append(&[0u8; 4]),
            Err(Error::StoreError(StoreError::ElementSizeMismatch { .. }))
        ));
        Ok(())
    }

    #[test]
    fn test_mark_deleted() -> Result<()> {
        let mut store = IndexStore::create(&Location::Memory, "test", 8, VERSION, 1)?;
        store.append(&[0b1000_0010, 7, 7, 7, 7, 7, 7, 7])?;
        store.mark_deleted(1)?;

        let mut buf = [0u8; 8];
        store.get(1, &mut buf)?;
        assert_eq!(buf, [0b1000_0011, 7, 7, 7, 7, 7, 7, 7]);
        Ok(())
    }

    #[test]
    fn test_file_roundtrip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("db.idx");

        // Create a file-backed store and fill it
        let mut store = IndexStore::create(&Location::file(&path), "test", 8, VERSION, 1)?;
        for tag in 1..=10 {
            store.append(&element(tag))?;
        }
        store.close()?;

        // Reopen read-write and keep appending
        let mut store = IndexStore::open(&path, OpenMode::ReadWrite, VERSION)?;
        assert_eq!(store.last_index(), 10);
        store.append(&element(11))?;
        store.commit()?;
        drop(store);

        let mut store = IndexStore::open(&path, OpenMode::ReadOnly, VERSION)?;
        assert_eq!(store.len(), 11);
        let mut buf = [0u8; 8];
        store.get(11, &mut buf)?;
        assert_eq!(buf, element(11));
        assert!(matches!(
            store.append(&element(12)),
            Err(Error::StoreError(StoreError::ReadOnly))
        ));
        Ok(())
    }

    #[test]
    fn test_version_mismatch() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("db.idx");
        IndexStore::create(&Location::file(&path), "test", 8, VERSION, 1)?.close()?;

        assert!(matches!(
            IndexStore::open(&path, OpenMode::ReadOnly, VERSION + 1),
            Err(Error::HeaderError(HeaderError::VersionMismatch { .. }))
        ));
        assert!(matches!(
            IndexStore::load_into_memory(&path, VERSION + 1, None),
            Err(Error::HeaderError(HeaderError::VersionMismatch { .. }))
        ));
        Ok(())
    }

    #[test]
    fn test_load_into_memory() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("db.idx");
        let mut store = IndexStore::create(&Location::file(&path), "test", 8, VERSION, 1)?;
        for tag in 1..=6 {
            store.append(&element(tag))?;
        }
        store.close()?;

        // Whole store stays writable
        let mut whole = IndexStore::load_into_memory(&path, VERSION, None)?;
        assert!(whole.is_memory());
        assert!(!whole.is_read_only());
        whole.append(&element(7))?;

        // Sub-range is read-only and keeps its indices
        let mut part = IndexStore::load_into_memory(&path, VERSION, Some(2..=4))?;
        assert!(part.is_read_only());
        assert_eq!((part.first_index(), part.last_index()), (2, 4));
        let mut buf = [0u8; 8];
        for tag in 2..=4 {
            part.get(u64::from(tag), &mut buf)?;
            assert_eq!(buf, element(tag));
        }
        assert!(part.get(5, &mut buf).is_err());

        assert!(IndexStore::load_into_memory(&path, VERSION, Some(5..=9)).is_err());
        Ok(())
    }

    #[test]
    fn test_load_empty() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("db.idx");
        IndexStore::create(&Location::file(&path), "test", 8, VERSION, 4)?.close()?;

        let mut store = IndexStore::load_into_memory(&path, VERSION, None)?;
        assert!(store.is_empty());
        assert_eq!(store.append(&element(4))?, 4);
        Ok(())
    }

    #[test]
    fn test_reset() -> Result<()> {
        let mut store = IndexStore::create(&Location::Memory, "test", 8, VERSION, 1)?;
        store.append(&element(1))?;
        store.reset(20)?;
        assert!(store.is_empty());
        assert_eq!(store.append(&element(20))?, 20);
        assert!(store.reset(0).is_err());
        Ok(())
    }
}
