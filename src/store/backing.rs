//! Byte space underneath a store.
//!
//! Positions handed to a [`Backing`] are relative to the start of the data region:
//! memory buffers hold only data, files hold the header in front of it.

use std::fs::File;
use std::io::Write;
#[cfg(not(unix))]
use std::io::{Seek, SeekFrom};
#[cfg(unix)]
use std::os::unix::fs::FileExt;

use super::header::{StoreHeader, SIZE_HEADER};
use crate::error::Result;

pub(crate) enum Backing {
    Memory(Vec<u8>),
    File(FileBacking),
}

/// A file handle with a write-behind buffer for sequential appends.
pub(crate) struct FileBacking {
    file: File,
    pending: Vec<u8>,
    pending_at: u64,
    capacity: usize,
}

impl Backing {
    pub fn memory(initial_allocation: usize) -> Self {
        Self::Memory(Vec::with_capacity(initial_allocation))
    }

    pub fn file(file: File, write_buffer: usize) -> Self {
        Self::File(FileBacking {
            file,
            pending: Vec::with_capacity(write_buffer),
            pending_at: 0,
            capacity: write_buffer,
        })
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, Self::Memory(_))
    }

    /// Fills `buf` with the bytes starting at `pos`.
    pub fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<()> {
        match self {
            Self::Memory(data) => {
                let start = pos as usize;
                let end = start + buf.len();
                if end > data.len() {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "read past the end of a memory store",
                    )
                    .into());
                }
                buf.copy_from_slice(&data[start..end]);
                Ok(())
            }
            Self::File(backing) => backing.read_at(pos, buf),
        }
    }

    /// Writes `data` at `pos`, growing memory buffers geometrically.
    pub fn write_at(&mut self, pos: u64, data: &[u8]) -> Result<()> {
        match self {
            Self::Memory(buffer) => {
                let start = pos as usize;
                let end = start + data.len();
                grow(buffer, end);
                buffer[start..end].copy_from_slice(data);
                Ok(())
            }
            Self::File(backing) => backing.write_at(pos, data),
        }
    }

    /// Persists the header and every buffered byte.
    pub fn commit(&mut self, header: &StoreHeader) -> Result<()> {
        match self {
            Self::Memory(_) => Ok(()),
            Self::File(backing) => backing.commit(header),
        }
    }

    /// Discards everything past `len` bytes of data.
    pub fn truncate(&mut self, len: u64) -> Result<()> {
        match self {
            Self::Memory(buffer) => {
                buffer.truncate(len as usize);
                Ok(())
            }
            Self::File(backing) => {
                backing.flush_pending()?;
                backing.file.set_len(SIZE_HEADER as u64 + len)?;
                Ok(())
            }
        }
    }
}

impl FileBacking {
    fn read_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<()> {
        self.flush_pending()?;
        read_exact_at(&mut self.file, SIZE_HEADER as u64 + pos, buf)
    }

    fn write_at(&mut self, pos: u64, data: &[u8]) -> Result<()> {
        let pending_end = self.pending_at + self.pending.len() as u64;
        if !self.pending.is_empty() && pos == pending_end {
            self.pending.extend_from_slice(data);
        } else {
            self.flush_pending()?;
            if data.len() >= self.capacity {
                return write_all_at(&mut self.file, SIZE_HEADER as u64 + pos, data);
            }
            self.pending_at = pos;
            self.pending.extend_from_slice(data);
        }
        if self.pending.len() >= self.capacity {
            self.flush_pending()?;
        }
        Ok(())
    }

    fn flush_pending(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        write_all_at(
            &mut self.file,
            SIZE_HEADER as u64 + self.pending_at,
            &self.pending,
        )?;
        self.pending.clear();
        Ok(())
    }

    fn commit(&mut self, header: &StoreHeader) -> Result<()> {
        self.flush_pending()?;
        write_all_at(&mut self.file, 0, &header.to_bytes())?;
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }
}

fn grow(buffer: &mut Vec<u8>, needed: usize) {
    if needed > buffer.capacity() {
        let target = needed.max(buffer.capacity() * 2);
        buffer.reserve_exact(target - buffer.len());
    }
    if buffer.len() < needed {
        buffer.resize(needed, 0);
    }
}

#[cfg(unix)]
fn read_exact_at(file: &mut File, offset: u64, buf: &mut [u8]) -> Result<()> {
    file.read_exact_at(buf, offset)?;
    Ok(())
}

#[cfg(unix)]
fn write_all_at(file: &mut File, offset: u64, data: &[u8]) -> Result<()> {
    file.write_all_at(data, offset)?;
    Ok(())
}

#[cfg(not(unix))]
fn read_exact_at(file: &mut File, offset: u64, buf: &mut [u8]) -> Result<()> {
    use std::io::Read;
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(buf)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_all_at(file: &mut File, offset: u64, data: &[u8]) -> Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(data)?;
    Ok(())
}
