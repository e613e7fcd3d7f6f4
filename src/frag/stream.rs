use super::partition::PackedOffset;
use super::read::FragRecord;
use super::store::{FetchFlags, FragmentStore};
use crate::error::Result;

/// A sequential cursor over the reads `[start, end]` of a [`FragmentStore`]
///
/// Besides the index cursor, the stream tracks for every partition the offset just
/// past the last sequence and source blob it has read, so a reader knows how far
/// into each blob store it has progressed. A source blob also counts as read when
/// only its screen matches or locale were needed.
pub struct FragStream<'a> {
    store: &'a mut FragmentStore,
    flags: FetchFlags,
    start: u64,
    next: u64,
    end: u64,
    done: bool,
    sequence_cursor: Vec<u64>,
    source_cursor: Vec<u64>,
}
impl<'a> FragStream<'a> {
    pub(crate) fn new(store: &'a mut FragmentStore, flags: FetchFlags) -> Self {
        let (start, end) = (store.first_index(), store.last_index());
        let sequence_cursor = store
            .partitions
            .iter()
            .map(|p| p.sequence.first_offset())
            .collect();
        let source_cursor = store
            .partitions
            .iter()
            .map(|p| p.source.first_offset())
            .collect();
        Self {
            store,
            flags,
            start,
            next: start,
            end,
            done: start > end,
            sequence_cursor,
            source_cursor,
        }
    }

    /// Restricts the stream to `[start, end]`. An inverted range yields nothing.
    ///
    /// Blob cursors are positioned at the blobs of the read at `start`.
    pub fn reset(&mut self, start: u64, end: u64) -> Result<()> {
        if start <= end {
            self.store.index.check_range(start)?;
            self.store.index.check_range(end)?;
            let fixed = self.store.read_fixed(start)?;
            let sequence = PackedOffset::from_raw(fixed.sequence_offset);
            let source = PackedOffset::from_raw(fixed.source_offset);
            let slot = self.store.check_partition(sequence.partition())?;
            self.sequence_cursor[slot] = sequence.offset();
            let slot = self.store.check_partition(source.partition())?;
            self.source_cursor[slot] = source.offset();
        }
        self.start = start;
        self.next = start;
        self.end = end;
        self.done = start > end;
        Ok(())
    }

    /// First index of the streamed range
    #[must_use]
    pub fn start_index(&self) -> u64 {
        self.start
    }

    /// Index of the read the next call will produce
    #[must_use]
    pub fn position(&self) -> u64 {
        self.next
    }

    /// Offset just past the last sequence blob read from `partition`
    #[must_use]
    pub fn sequence_cursor(&self, partition: u32) -> Option<u64> {
        self.sequence_cursor.get(partition as usize).copied()
    }

    /// Offset just past the last source blob read from `partition`
    #[must_use]
    pub fn source_cursor(&self, partition: u32) -> Option<u64> {
        self.source_cursor.get(partition as usize).copied()
    }

    /// Reads the next read into `record`. Returns `false` once the range is exhausted.
    pub fn next_into(&mut self, record: &mut FragRecord) -> Result<bool> {
        if self.done {
            return Ok(false);
        }
        let index = self.next;
        let extents = match self.store.get_extents(index, self.flags, record) {
            Ok(extents) => extents,
            Err(e) => {
                self.done = true;
                return Err(e);
            }
        };
        if let Some((slot, end)) = extents.sequence {
            self.sequence_cursor[slot] = end;
        }
        if let Some((slot, end)) = extents.source {
            self.source_cursor[slot] = end;
        }
        if index == self.end {
            self.done = true;
        } else {
            self.next += 1;
        }
        Ok(true)
    }

    /// Skips `count` reads, then reads the one after them into `record`.
    pub fn skip_next(&mut self, count: u64, record: &mut FragRecord) -> Result<bool> {
        if self.done {
            return Ok(false);
        }
        match self.next.checked_add(count) {
            Some(next) if next <= self.end => {
                self.next = next;
                self.next_into(record)
            }
            _ => {
                self.done = true;
                Ok(false)
            }
        }
    }
}
impl Iterator for FragStream<'_> {
    type Item = Result<FragRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut record = FragRecord::new();
        match self.next_into(&mut record) {
            Ok(true) => Some(Ok(record)),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl FragmentStore {
    /// Streams every read in index order
    pub fn stream(&mut self, flags: FetchFlags) -> Result<FragStream<'_>> {
        self.ensure_active()?;
        Ok(FragStream::new(self, flags))
    }

    /// Streams the reads `[start, end]`
    pub fn stream_range(&mut self, start: u64, end: u64, flags: FetchFlags) -> Result<FragStream<'_>> {
        let mut stream = self.stream(flags)?;
        stream.reset(start, end)?;
        Ok(stream)
    }
}
