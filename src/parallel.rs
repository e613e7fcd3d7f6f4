use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::error::{FragError, Result, StoreError};
use crate::frag::{FetchFlags, FragRecord, FragmentStore};
use crate::store::{OpenMode, StoreConfig};

/// Number of records handed to a processor between calls to
/// [`ParallelProcessor::on_batch_complete`]
pub const BATCH_SIZE: u64 = 1024;

/// Trait for store readers that can process records in parallel
///
/// This is implemented by the **reader** not by the **processor**.
/// For the **processor**, see the [`ParallelProcessor`] trait.
pub trait ParallelReader {
    fn process_parallel<P: ParallelProcessor + Clone + 'static>(
        self,
        processor: P,
        num_threads: usize,
    ) -> Result<()>;

    fn process_parallel_range<P: ParallelProcessor + Clone + 'static>(
        self,
        processor: P,
        num_threads: usize,
        range: RangeInclusive<u64>,
    ) -> Result<()>;
}

/// Trait for types that can process records in parallel.
///
/// This is implemented by the **processor** not by the **reader**.
/// For the **reader**, see the [`ParallelReader`] trait.
pub trait ParallelProcessor: Send + Clone {
    /// Process a single record
    fn process_record(&mut self, record: &FragRecord) -> Result<()>;

    /// Called when a thread finishes processing its batch
    /// Default implementation does nothing
    fn on_batch_complete(&mut self) -> Result<()> {
        Ok(())
    }

    /// Set the thread ID for this processor
    ///
    /// Each thread should call this method with its own unique ID.
    fn set_tid(&mut self, _tid: usize) {}

    /// Get the thread ID for this processor
    fn get_tid(&self) -> Option<usize> {
        None
    }
}

/// Reads a file-backed [`FragmentStore`] from several threads
///
/// Each worker opens its own read-only handle and streams a contiguous slice of the
/// index range, so the store must not be written to while it is being processed.
#[derive(Debug, Clone)]
pub struct FragReader {
    path: PathBuf,
    flags: FetchFlags,
    config: StoreConfig,
    first_index: u64,
    last_index: u64,
}
impl FragReader {
    /// Opens the store in `path` once to learn its index range
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let store = FragmentStore::open(&path, OpenMode::ReadOnly)?;
        Ok(Self {
            path,
            flags: FetchFlags::ALL,
            config: StoreConfig::default(),
            first_index: store.first_index(),
            last_index: store.last_index(),
        })
    }

    /// Selects the parts of each record handed to processors
    #[must_use]
    pub fn with_flags(mut self, flags: FetchFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn first_index(&self) -> u64 {
        self.first_index
    }

    #[must_use]
    pub fn last_index(&self) -> u64 {
        self.last_index
    }

    #[must_use]
    pub fn num_records(&self) -> u64 {
        self.last_index + 1 - self.first_index
    }

    fn process_slice<P: ParallelProcessor>(&self, processor: &mut P, start: u64, end: u64) -> Result<()> {
        let mut store = FragmentStore::open_with(&self.path, OpenMode::ReadOnly, &self.config)?;
        let mut stream = store.stream_range(start, end, self.flags)?;
        let mut record = FragRecord::new();
        let mut in_batch = 0;
        while stream.next_into(&mut record)? {
            processor.process_record(&record)?;
            in_batch += 1;
            if in_batch == BATCH_SIZE {
                processor.on_batch_complete()?;
                in_batch = 0;
            }
        }
        if in_batch > 0 {
            processor.on_batch_complete()?;
        }
        Ok(())
    }
}
impl ParallelReader for FragReader {
    fn process_parallel<P: ParallelProcessor + Clone + 'static>(
        self,
        processor: P,
        num_threads: usize,
    ) -> Result<()> {
        let range = self.first_index..=self.last_index;
        self.process_parallel_range(processor, num_threads, range)
    }

    fn process_parallel_range<P: ParallelProcessor + Clone + 'static>(
        self,
        processor: P,
        num_threads: usize,
        range: RangeInclusive<u64>,
    ) -> Result<()> {
        // Calculate the number of threads to use
        let num_threads = if num_threads == 0 {
            num_cpus::get()
        } else {
            num_threads.min(num_cpus::get())
        };

        let (start, end) = (*range.start(), *range.end());
        if start > end {
            return Ok(());
        }
        for index in [start, end] {
            if index < self.first_index || index > self.last_index {
                return Err(StoreError::IndexOutOfRange {
                    index,
                    first: self.first_index,
                    last: self.last_index,
                }
                .into());
            }
        }

        let range_size = end - start + 1;
        let records_per_thread = range_size.div_ceil(num_threads as u64);
        debug!(start, end, num_threads, records_per_thread, "processing store in parallel");

        let reader = Arc::new(self);
        let mut handles = Vec::new();
        for tid in 0..num_threads {
            let mut processor = processor.clone();
            let reader = reader.clone();
            processor.set_tid(tid);

            let handle = std::thread::spawn(move || -> Result<()> {
                let slice_start = start + tid as u64 * records_per_thread;
                if slice_start > end {
                    return Ok(()); // No records for this thread
                }
                let slice_end = (slice_start + records_per_thread - 1).min(end);
                reader.process_slice(&mut processor, slice_start, slice_end)
            });
            handles.push(handle);
        }

        for (tid, handle) in handles.into_iter().enumerate() {
            handle
                .join()
                .map_err(|_| FragError::WorkerPanicked(tid))??;
        }
        Ok(())
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::store::Location;
    use parking_lot::Mutex;

    #[derive(Clone, Default)]
    struct Collector {
        tid: Option<usize>,
        local: Vec<u64>,
        bases: u64,
        seen: Arc<Mutex<Vec<u64>>>,
        total_bases: Arc<Mutex<u64>>,
    }
    impl ParallelProcessor for Collector {
        fn process_record(&mut self, record: &FragRecord) -> Result<()> {
            self.local.push(record.read_index());
            self.bases += record.sequence().len() as u64;
            Ok(())
        }

        fn on_batch_complete(&mut self) -> Result<()> {
            self.seen.lock().append(&mut self.local);
            *self.total_bases.lock() += self.bases;
            self.bases = 0;
            Ok(())
        }

        fn set_tid(&mut self, tid: usize) {
            self.tid = Some(tid);
        }

        fn get_tid(&self) -> Option<usize> {
            self.tid
        }
    }

    fn write_store(path: &Path, count: u64) -> Result<()> {
        let mut store = FragmentStore::create(Location::file(path), 1)?;
        for index in 1..=count {
            let mut rec = FragRecord::new();
            rec.set_read_index(index);
            rec.set_sequence(b"ACGTACGTAC", None);
            store.append(&mut rec)?;
        }
        store.close()
    }

    #[test]
    fn test_process_parallel() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("parallel");
        write_store(&path, 2500)?;

        let collector = Collector::default();
        FragReader::new(&path)?.process_parallel(collector.clone(), 4)?;

        let mut seen = collector.seen.lock().clone();
        seen.sort_unstable();
        assert_eq!(seen, (1..=2500).collect::<Vec<_>>());
        assert_eq!(*collector.total_bases.lock(), 25_000);
        Ok(())
    }

    #[test]
    fn test_process_parallel_range() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("range");
        write_store(&path, 40)?;

        let collector = Collector::default();
        FragReader::new(&path)?
            .with_flags(FetchFlags::FIXED)
            .process_parallel_range(collector.clone(), 3, 11..=20)?;

        let mut seen = collector.seen.lock().clone();
        seen.sort_unstable();
        assert_eq!(seen, (11..=20).collect::<Vec<_>>());
        assert_eq!(*collector.total_bases.lock(), 0);

        assert!(FragReader::new(&path)?
            .process_parallel_range(Collector::default(), 2, 30..=41)
            .is_err());
        Ok(())
    }
}
