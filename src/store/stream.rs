//! Sequential cursors over a store's logical range.

use super::index::IndexStore;
use super::vlr::{VlrStore, LENGTH_PREFIX};
use crate::error::{Result, StoreError};

/// A cursor over the elements `[start, end]` of an [`IndexStore`]
///
/// Yields `(index, element)` pairs in index order.
pub struct IndexStream<'a> {
    store: &'a mut IndexStore,
    next: u64,
    end: u64,
    done: bool,
}
impl<'a> IndexStream<'a> {
    pub(crate) fn new(store: &'a mut IndexStore) -> Self {
        let (next, end) = (store.first_index(), store.last_index());
        Self {
            store,
            next,
            end,
            done: next > end,
        }
    }

    /// Restricts the stream to `[start, end]`. An inverted range yields nothing.
    pub fn reset(&mut self, start: u64, end: u64) -> Result<()> {
        if start <= end {
            self.store.check_range(start)?;
            self.store.check_range(end)?;
        }
        self.next = start;
        self.end = end;
        self.done = start > end;
        Ok(())
    }

    /// Index of the element the next call will produce
    #[must_use]
    pub fn position(&self) -> u64 {
        self.next
    }

    /// Reads the next element into `buf`, returning its index, or `None` at the end of the range.
    pub fn next_into(&mut self, buf: &mut [u8]) -> Result<Option<u64>> {
        if self.done {
            return Ok(None);
        }
        let index = self.next;
        if let Err(e) = self.store.get(index, buf) {
            self.done = true;
            return Err(e);
        }
        if index == self.end {
            self.done = true;
        } else {
            self.next += 1;
        }
        Ok(Some(index))
    }
}
impl Iterator for IndexStream<'_> {
    type Item = Result<(u64, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = vec![0u8; self.store.element_size()];
        match self.next_into(&mut buf) {
            Ok(Some(index)) => Some(Ok((index, buf))),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// A cursor over the blobs of a [`VlrStore`] between two offsets
///
/// Yields `(offset, blob)` pairs in offset order.
pub struct VlrStream<'a> {
    store: &'a mut VlrStore,
    next: u64,
    end: u64,
}
impl<'a> VlrStream<'a> {
    pub(crate) fn new(store: &'a mut VlrStore) -> Self {
        let (next, end) = (store.first_offset(), store.end_offset());
        Self { store, next, end }
    }

    /// Restricts the stream to blobs starting in `[start, end)`.
    ///
    /// `start` must fall on a blob boundary.
    pub fn reset(&mut self, start: u64, end: u64) -> Result<()> {
        let (first, store_end) = (self.store.first_offset(), self.store.end_offset());
        for offset in [start, end] {
            if offset < first || offset > store_end {
                return Err(StoreError::OffsetOutOfRange {
                    offset,
                    first,
                    end: store_end,
                }
                .into());
            }
        }
        self.next = start;
        self.end = end;
        Ok(())
    }

    /// Offset of the blob the next call will produce
    #[must_use]
    pub fn position(&self) -> u64 {
        self.next
    }

    /// Replaces `buf` with the next blob and returns its offset, or `None` at the end of the range.
    pub fn next_into(&mut self, buf: &mut Vec<u8>) -> Result<Option<u64>> {
        if self.next >= self.end {
            return Ok(None);
        }
        let offset = self.next;
        match self.store.get_vec(offset, buf) {
            Ok(len) => {
                self.next = offset + (LENGTH_PREFIX + len) as u64;
                Ok(Some(offset))
            }
            Err(e) => {
                self.next = self.end;
                Err(e)
            }
        }
    }
}
impl Iterator for VlrStream<'_> {
    type Item = Result<(u64, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = Vec::new();
        self.next_into(&mut buf)
            .transpose()
            .map(|res| res.map(|offset| (offset, buf)))
    }
}
