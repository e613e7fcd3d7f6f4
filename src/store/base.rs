use std::fs::{File, OpenOptions};
use std::ops::Range;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::{debug, warn};

use super::backing::Backing;
use super::config::StoreConfig;
use super::header::{StoreHeader, StoreKind, SIZE_HEADER};
use crate::error::{Result, StoreError};

/// Where a newly created store keeps its bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// A file at the given path, truncated on creation
    File(PathBuf),
    /// A growable in-memory buffer
    Memory,
}
impl Location {
    pub fn file<P: AsRef<Path>>(path: P) -> Self {
        Self::File(path.as_ref().to_path_buf())
    }
}

/// Access mode of an opened store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    ReadOnly,
    #[default]
    ReadWrite,
}

/// Header plus byte space shared by both record disciplines
pub(crate) struct Store {
    header: StoreHeader,
    backing: Backing,
    mode: OpenMode,
    dirty: bool,
}
impl Store {
    pub fn create(location: &Location, header: StoreHeader, config: &StoreConfig) -> Result<Self> {
        let backing = match location {
            Location::Memory => Backing::memory(config.initial_allocation_size()),
            Location::File(path) => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(path)?;
                Backing::file(file, config.write_buffer_size())
            }
        };
        let mut store = Self {
            header,
            backing,
            mode: OpenMode::ReadWrite,
            dirty: false,
        };
        store.commit()?;
        debug!(
            kind = ?store.header.kind,
            label = %String::from_utf8_lossy(store.header.label()),
            first = store.header.first_index,
            memory = store.is_memory(),
            "created store"
        );
        Ok(store)
    }

    /// Opens a file-backed store, validating magic, version and kind before any data access.
    pub fn open(
        path: &Path,
        mode: OpenMode,
        kind: StoreKind,
        version: u32,
        config: &StoreConfig,
    ) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(mode == OpenMode::ReadWrite)
            .open(path)?;
        if !file.metadata()?.is_file() {
            return Err(StoreError::IncompatibleFile.into());
        }
        let header = StoreHeader::from_reader(&mut file)?;
        header.check_version(version)?;
        check_kind(&header, kind)?;

        let found = file.metadata()?.len().saturating_sub(SIZE_HEADER as u64);
        if found < header.data_len() {
            return Err(StoreError::Truncated {
                expected: header.data_len(),
                found,
            }
            .into());
        }
        debug!(
            path = %path.display(),
            kind = ?header.kind,
            first = header.first_index,
            last = header.last_index,
            ?mode,
            "opened store"
        );
        Ok(Self {
            header,
            backing: Backing::file(file, config.write_buffer_size()),
            mode,
            dirty: false,
        })
    }

    /// Copies a window of a file-backed store into a new memory-backed store.
    ///
    /// `select` receives the on-disk header and returns the header of the loaded
    /// store, the data range to copy, and the mode the loaded store is handed out with.
    pub fn load<F>(path: &Path, kind: StoreKind, version: u32, select: F) -> Result<Self>
    where
        F: FnOnce(&StoreHeader) -> Result<(StoreHeader, Range<u64>, OpenMode)>,
    {
        let file = File::open(path)?;
        if !file.metadata()?.is_file() {
            return Err(StoreError::IncompatibleFile.into());
        }

        // Safety: the file is opened read-only and is not modified while mapped
        let mmap = unsafe { Mmap::map(&file)? };
        let on_disk = StoreHeader::from_buffer(&mmap)?;
        on_disk.check_version(version)?;
        check_kind(&on_disk, kind)?;

        let available = (mmap.len() - SIZE_HEADER) as u64;
        if available < on_disk.data_len() {
            return Err(StoreError::Truncated {
                expected: on_disk.data_len(),
                found: available,
            }
            .into());
        }

        let (header, window, mode) = select(&on_disk)?;
        let start = SIZE_HEADER + window.start as usize;
        let end = SIZE_HEADER + window.end as usize;
        let data = mmap[start..end].to_vec();
        debug!(
            path = %path.display(),
            kind = ?header.kind,
            first = header.first_index,
            last = header.last_index,
            bytes = data.len(),
            "loaded store into memory"
        );
        Ok(Self {
            header,
            backing: Backing::Memory(data),
            mode,
            dirty: false,
        })
    }

    pub fn header(&self) -> &StoreHeader {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut StoreHeader {
        &mut self.header
    }

    pub fn is_memory(&self) -> bool {
        self.backing.is_memory()
    }

    pub fn is_read_only(&self) -> bool {
        self.mode == OpenMode::ReadOnly
    }

    pub fn ensure_writable(&self) -> Result<()> {
        if self.is_read_only() {
            return Err(StoreError::ReadOnly.into());
        }
        Ok(())
    }

    pub fn read(&mut self, pos: u64, buf: &mut [u8]) -> Result<()> {
        self.backing.read_at(pos, buf)
    }

    pub fn write(&mut self, pos: u64, data: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        self.backing.write_at(pos, data)?;
        self.dirty = true;
        Ok(())
    }

    pub fn truncate(&mut self, len: u64) -> Result<()> {
        self.ensure_writable()?;
        self.backing.truncate(len)?;
        self.dirty = true;
        Ok(())
    }

    /// Rewrites the header and flushes buffered bytes. Read-only stores are left untouched.
    pub fn commit(&mut self) -> Result<()> {
        if self.is_read_only() {
            return Ok(());
        }
        self.header.touch();
        self.backing.commit(&self.header)?;
        self.dirty = false;
        Ok(())
    }
}
impl Drop for Store {
    fn drop(&mut self) {
        if self.dirty && !self.is_memory() {
            if let Err(e) = self.commit() {
                warn!(error = %e, "failed to commit store on drop");
            }
        }
    }
}

fn check_kind(header: &StoreHeader, kind: StoreKind) -> Result<()> {
    if header.kind != kind {
        return Err(StoreError::KindMismatch {
            expected: kind.code(),
            found: header.kind.code(),
        }
        .into());
    }
    Ok(())
}
