use std::ops::Range;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian};

use super::base::{Location, OpenMode, Store};
use super::config::StoreConfig;
use super::header::{StoreHeader, StoreKind};
use super::stream::VlrStream;
use crate::error::{Result, StoreError};

/// Size of the length prefix in front of every blob
pub const LENGTH_PREFIX: usize = 4;

/// Chunk size used when copying raw bytes between stores: 1MB
const COPY_CHUNK: usize = 1024 * 1024;

/// An append-only store of length-prefixed blobs
///
/// Every blob is addressed by the byte offset returned from [`VlrStore::append`].
/// Offsets are cumulative: a fresh store hands out offsets starting at 0 and the
/// end offset equals the total number of bytes appended.
pub struct VlrStore {
    store: Store,
}
impl VlrStore {
    pub fn create(location: &Location, label: &str, version: u32) -> Result<Self> {
        Self::create_with(location, label, version, &StoreConfig::default())
    }

    pub fn create_with(
        location: &Location,
        label: &str,
        version: u32,
        config: &StoreConfig,
    ) -> Result<Self> {
        let header = StoreHeader::new(StoreKind::VariableLength, label, 0, version, 0);
        let store = Store::create(location, header, config)?;
        Ok(Self { store })
    }

    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode, version: u32) -> Result<Self> {
        Self::open_with(path, mode, version, &StoreConfig::default())
    }

    pub fn open_with<P: AsRef<Path>>(
        path: P,
        mode: OpenMode,
        version: u32,
        config: &StoreConfig,
    ) -> Result<Self> {
        let store = Store::open(
            path.as_ref(),
            mode,
            StoreKind::VariableLength,
            version,
            config,
        )?;
        Ok(Self { store })
    }

    /// Copies a store file, or the byte window `window` of it, into memory.
    ///
    /// The window must start on a blob boundary. Offsets inside the loaded store stay
    /// identical to the on-disk offsets. Partial windows are read-only.
    pub fn load_into_memory<P: AsRef<Path>>(
        path: P,
        version: u32,
        window: Option<Range<u64>>,
    ) -> Result<Self> {
        let store = Store::load(
            path.as_ref(),
            StoreKind::VariableLength,
            version,
            |on_disk| {
                let (start, end) = match window {
                    Some(window) => (window.start, window.end),
                    None => (on_disk.first_index, on_disk.last_index),
                };
                for offset in [start, end] {
                    if offset < on_disk.first_index || offset > on_disk.last_index {
                        return Err(StoreError::OffsetOutOfRange {
                            offset,
                            first: on_disk.first_index,
                            end: on_disk.last_index,
                        }
                        .into());
                    }
                }
                if end < start {
                    return Err(StoreError::OffsetOutOfRange {
                        offset: end,
                        first: start,
                        end: on_disk.last_index,
                    }
                    .into());
                }
                let mode = if start == on_disk.first_index && end == on_disk.last_index {
                    OpenMode::ReadWrite
                } else {
                    OpenMode::ReadOnly
                };
                let mut header = *on_disk;
                header.first_index = start;
                header.last_index = end;
                let base = on_disk.first_index;
                Ok((header, start - base..end - base, mode))
            },
        )?;
        Ok(Self { store })
    }

    #[must_use]
    pub fn header(&self) -> &StoreHeader {
        self.store.header()
    }

    /// Offset of the first byte held by this store
    #[must_use]
    pub fn first_offset(&self) -> u64 {
        self.store.header().first_index
    }

    /// Offset one past the last byte held, i.e. where the next blob will be appended
    #[must_use]
    pub fn end_offset(&self) -> u64 {
        self.store.header().last_index
    }

    /// Number of bytes held, including length prefixes
    #[must_use]
    pub fn len_bytes(&self) -> u64 {
        self.end_offset() - self.first_offset()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len_bytes() == 0
    }

    #[must_use]
    pub fn is_memory(&self) -> bool {
        self.store.is_memory()
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.store.is_read_only()
    }

    /// Appends a blob and returns the offset it can be fetched from.
    pub fn append(&mut self, blob: &[u8]) -> Result<u64> {
        let Ok(len) = u32::try_from(blob.len()) else {
            return Err(StoreError::RecordTooLarge(blob.len()).into());
        };
        let offset = self.end_offset();
        let pos = offset - self.first_offset();
        let mut prefix = [0u8; LENGTH_PREFIX];
        LittleEndian::write_u32(&mut prefix, len);
        self.store.write(pos, &prefix)?;
        self.store.write(pos + LENGTH_PREFIX as u64, blob)?;
        self.store.header_mut().last_index = offset + (LENGTH_PREFIX + blob.len()) as u64;
        Ok(offset)
    }

    /// Reads the length prefix of the blob at `offset`.
    pub fn record_len(&mut self, offset: u64) -> Result<usize> {
        let (first, end) = (self.first_offset(), self.end_offset());
        if offset < first || offset + LENGTH_PREFIX as u64 > end {
            return Err(StoreError::OffsetOutOfRange { offset, first, end }.into());
        }
        let mut prefix = [0u8; LENGTH_PREFIX];
        self.store.read(offset - first, &mut prefix)?;
        let len = LittleEndian::read_u32(&prefix) as usize;
        if offset + (LENGTH_PREFIX + len) as u64 > end {
            return Err(StoreError::OffsetOutOfRange { offset, first, end }.into());
        }
        Ok(len)
    }

    /// Copies the blob at `offset` into the front of `buf` and returns its length.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BufferTooSmall`] carrying the required length if `buf`
    /// cannot hold the blob. Nothing is copied in that case.
    pub fn get(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let len = self.record_len(offset)?;
        if len > buf.len() {
            return Err(StoreError::BufferTooSmall {
                required: len,
                available: buf.len(),
            }
            .into());
        }
        let pos = offset - self.first_offset() + LENGTH_PREFIX as u64;
        self.store.read(pos, &mut buf[..len])?;
        Ok(len)
    }

    /// Replaces the contents of `buf` with the blob at `offset` and returns its length.
    pub fn get_vec(&mut self, offset: u64, buf: &mut Vec<u8>) -> Result<usize> {
        let len = self.record_len(offset)?;
        buf.clear();
        buf.resize(len, 0);
        let pos = offset - self.first_offset() + LENGTH_PREFIX as u64;
        self.store.read(pos, buf)?;
        Ok(len)
    }

    /// Appends the raw contents of `other` to this store.
    ///
    /// Returns the offset at which `other`'s first byte now lives: a blob found at
    /// offset `o` in `other` is found at `o - other.first_offset() + returned` here.
    pub fn concat(&mut self, other: &mut VlrStore) -> Result<u64> {
        self.store.ensure_writable()?;
        let base = self.end_offset();
        let mut pos = base - self.first_offset();
        let total = other.len_bytes();
        let mut chunk = vec![0u8; COPY_CHUNK.min(total as usize)];
        let mut copied = 0u64;
        while copied < total {
            let n = (total - copied).min(chunk.len() as u64) as usize;
            other.store.read(copied, &mut chunk[..n])?;
            self.store.write(pos, &chunk[..n])?;
            copied += n as u64;
            pos += n as u64;
        }
        self.store.header_mut().last_index = base + total;
        Ok(base)
    }

    /// Removes every blob. Subsequent appends start at offset 0.
    pub fn reset(&mut self) -> Result<()> {
        self.store.truncate(0)?;
        let header = self.store.header_mut();
        header.first_index = 0;
        header.last_index = 0;
        Ok(())
    }

    /// Streams every blob in offset order.
    pub fn stream(&mut self) -> VlrStream<'_> {
        VlrStream::new(self)
    }

    /// Rewrites the header and flushes buffered writes.
    pub fn commit(&mut self) -> Result<()> {
        self.store.commit()
    }

    /// Commits and releases the store.
    pub fn close(mut self) -> Result<()> {
        self.commit()
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::error::Error;

    const VERSION: u32 = 3;

    #[test]
    fn test_append_get() -> Result<()> {
        let mut store = VlrStore::create(&Location::Memory, "seq", VERSION)?;
        let a = store.append(b"ACGT")?;
        let b = store.append(b"")?;
        let c = store.append(b"TTTTTTTT")?;
        assert_eq!((a, b, c), (0, 8, 12));
        assert_eq!(store.end_offset(), 24);

        let mut buf = [0u8; 16];
        assert_eq!(store.get(a, &mut buf)?, 4);
        assert_eq!(&buf[..4], b"ACGT");
        assert_eq!(store.get(b, &mut buf)?, 0);
        assert_eq!(store.get(c, &mut buf)?, 8);
        assert_eq!(&buf[..8], b"TTTTTTTT");
        Ok(())
    }

    #[test]
    fn test_buffer_too_small() -> Result<()> {
        let mut store = VlrStore::create(&Location::Memory, "seq", VERSION)?;
        let offset = store.append(b"ACGTACGTAC")?;

        let mut small = [0u8; 4];
        let err = store.get(offset, &mut small).unwrap_err();
        assert!(matches!(
            err,
            Error::StoreError(StoreError::BufferTooSmall {
                required: 10,
                available: 4
            })
        ));

        // resize to the reported length and retry
        let mut buf = vec![0u8; err.required_len().unwrap_or_default()];
        assert_eq!(store.get(offset, &mut buf)?, 10);
        assert_eq!(buf, b"ACGTACGTAC");
        Ok(())
    }

    #[test]
    fn test_offset_out_of_range() -> Result<()> {
        let mut store = VlrStore::create(&Location::Memory, "seq", VERSION)?;
        store.append(b"ACGT")?;
        let mut buf = Vec::new();
        assert!(matches!(
            store.get_vec(8, &mut buf),
            Err(Error::StoreError(StoreError::OffsetOutOfRange { .. }))
        ));
        // an offset inside a payload reads a bogus length that overruns the store
        assert!(store.get_vec(2, &mut buf).is_err());
        Ok(())
    }

    #[test]
    fn test_concat() -> Result<()> {
        let mut target = VlrStore::create(&Location::Memory, "seq", VERSION)?;
        target.append(b"AAAA")?;
        let mut source = VlrStore::create(&Location::Memory, "seq", VERSION)?;
        let first = source.append(b"CC")?;
        let second = source.append(b"GGG")?;

        let base = target.concat(&mut source)?;
        assert_eq!(base, 8);
        assert_eq!(target.end_offset(), 8 + source.len_bytes());

        let mut buf = Vec::new();
        target.get_vec(first + base, &mut buf)?;
        assert_eq!(buf, b"CC");
        target.get_vec(second + base, &mut buf)?;
        assert_eq!(buf, b"GGG");
        Ok(())
    }

    #[test]
    fn test_file_and_window_load() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("db.seq");
        let config = StoreConfig::default().write_buffer(8);
        let mut store = VlrStore::create_with(&Location::file(&path), "seq", VERSION, &config)?;
        let offsets = [b"A".as_slice(), b"CC", b"GGG", b"TTTT"]
            .iter()
            .map(|blob| store.append(blob))
            .collect::<Result<Vec<_>>>()?;
        store.close()?;

        let mut reopened = VlrStore::open(&path, OpenMode::ReadOnly, VERSION)?;
        assert_eq!(reopened.end_offset(), 4 * 4 + 10);
        let mut buf = Vec::new();
        reopened.get_vec(offsets[3], &mut buf)?;
        assert_eq!(buf, b"TTTT");

        // window covering the 2nd and 3rd blobs keeps their offsets
        let mut window = VlrStore::load_into_memory(&path, VERSION, Some(offsets[1]..offsets[3]))?;
        assert!(window.is_read_only());
        window.get_vec(offsets[2], &mut buf)?;
        assert_eq!(buf, b"GGG");
        assert!(window.get_vec(offsets[0], &mut buf).is_err());
        assert!(window.get_vec(offsets[3], &mut buf).is_err());
        assert!(window.append(b"N").is_err());
        Ok(())
    }

    #[test]
    fn test_reset() -> Result<()> {
        let mut store = VlrStore::create(&Location::Memory, "src", VERSION)?;
        store.append(b"abc")?;
        store.reset()?;
        assert!(store.is_empty());
        assert_eq!(store.append(b"xyz")?, 0);
        Ok(())
    }
}
