use std::fs;
use std::io::ErrorKind;
use std::ops::BitOr;
use std::path::{Path, PathBuf};

use rand::{rngs::SmallRng, SeedableRng};
use tracing::{info, trace};

use super::builder::FragStoreBuilder;
use super::codec::{self, is_encodable};
use super::partition::{PackedOffset, MAX_PARTITIONS};
use super::read::FragRecord;
use super::record::{LocaleLayout, ShortFragRecord, FIXED_RECORD_SIZE};
use crate::error::{FragError, Result, StoreError};
use crate::policy::{Policy, RNG_SEED};
use crate::store::{
    unix_now, IndexStore, Location, OpenMode, StoreConfig, VlrStore, LENGTH_PREFIX,
};

/// Version written into, and required from, every constituent store
pub const FRAGSTORE_VERSION: u32 = 5;

/// File holding the fixed records
pub const INDEX_FILE: &str = "db.frg";
/// File holding the packed sequence/quality blobs
pub const SEQUENCE_FILE: &str = "db.seq";
/// File holding the source blobs
pub const SOURCE_FILE: &str = "db.src";
/// Sidecar recording the partition count of a partitioned store
pub const PARTITION_FILE: &str = "db.par";

const INDEX_LABEL: &str = "frg";
const SEQUENCE_LABEL: &str = "seq";
const SOURCE_LABEL: &str = "src";

/// Selects the parts of a record filled in by a fetch
///
/// The fixed record is always read. Screen matches and locale travel in the source
/// blob, so they are decoded whenever the record has any, even without [`FetchFlags::SOURCE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchFlags(u8);
impl FetchFlags {
    pub const FIXED: Self = Self(0x01);
    pub const SOURCE: Self = Self(0x02);
    pub const SEQUENCE: Self = Self(0x04);
    pub const ALL: Self = Self(0x07);

    #[must_use]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}
impl Default for FetchFlags {
    fn default() -> Self {
        Self::ALL
    }
}
impl BitOr for FetchFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Lifecycle of a [`FragmentStore`] handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    Active,
    Closed,
}

/// What a directory holds, as reported by [`FragmentStore::exists`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreExistence {
    /// None of the constituent files are present
    Absent,
    /// Every constituent file is present
    Complete,
    /// Some, but not all, constituent files are present
    Partial,
}

/// Blob stores of one partition
pub(crate) struct Partition {
    pub(crate) sequence: VlrStore,
    pub(crate) source: VlrStore,
}

/// Partition slot and end offset of each blob read by a fetch
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct BlobExtents {
    pub(crate) sequence: Option<(usize, u64)>,
    pub(crate) source: Option<(usize, u64)>,
}

fn blob_end(at: PackedOffset, payload: usize) -> u64 {
    at.offset() + (LENGTH_PREFIX + payload) as u64
}

#[derive(Default)]
struct Scratch {
    encoded: Vec<u8>,
    blob: Vec<u8>,
    corrected: Vec<u8>,
}

/// Persistent store of sequencing reads
///
/// A fragment store is composed of one index store holding an 80-byte
/// [`ShortFragRecord`] per read, plus a sequence store and a source store per
/// partition holding the variable-length blobs those records point to.
///
/// ```text
/// dir/db.frg            fixed records (authoritative)
/// dir/db.seq, db.src    blobs (unpartitioned)
/// dir/db.par            partition count (partitioned only)
/// dir/db.frg.N          fixed records routed to partition N
/// dir/db.seq.N, db.src.N
/// ```
///
/// Reads are numbered contiguously from the store's first index. Appends must supply
/// exactly the next index, blobs are written before the fixed record that references
/// them, and nothing is durable until [`commit`](Self::commit) or [`close`](Self::close).
pub struct FragmentStore {
    name: String,
    path: Option<PathBuf>,
    status: StoreStatus,
    pub(crate) index: IndexStore,
    mirrors: Vec<IndexStore>,
    pub(crate) partitions: Vec<Partition>,
    policy: Policy,
    rng: SmallRng,
    scratch: Scratch,
}
impl FragmentStore {
    /// Starts configuring a new store
    #[must_use]
    pub fn builder() -> FragStoreBuilder {
        FragStoreBuilder::default()
    }

    /// Creates an unpartitioned store numbered from `first_index` with default settings
    pub fn create(location: Location, first_index: u64) -> Result<Self> {
        Self::builder().first_index(first_index).create(location)
    }

    pub(crate) fn create_with(
        location: &Location,
        name: String,
        first_index: u64,
        num_partitions: u32,
        policy: Policy,
        config: &StoreConfig,
    ) -> Result<Self> {
        check_partition_count(num_partitions)?;
        let partitioned = num_partitions > 1;
        let path = match location {
            Location::File(dir) => {
                Self::remove(dir)?;
                fs::create_dir_all(dir)?;
                if partitioned {
                    let mut buffer = itoa::Buffer::new();
                    fs::write(dir.join(PARTITION_FILE), buffer.format(num_partitions))?;
                }
                Some(dir.clone())
            }
            Location::Memory => None,
        };
        let at = |file: PathBuf| match &path {
            Some(_) => Location::File(file),
            None => Location::Memory,
        };
        let dir = path.clone().unwrap_or_default();

        let index = IndexStore::create_with(
            &at(dir.join(INDEX_FILE)),
            INDEX_LABEL,
            FIXED_RECORD_SIZE,
            FRAGSTORE_VERSION,
            first_index,
            config,
        )?;
        let mut mirrors = Vec::new();
        let mut partitions = Vec::with_capacity(num_partitions as usize);
        for partition in 0..num_partitions {
            if partitioned {
                mirrors.push(IndexStore::create_with(
                    &at(partition_file(&dir, INDEX_FILE, partition, num_partitions)),
                    INDEX_LABEL,
                    FIXED_RECORD_SIZE,
                    FRAGSTORE_VERSION,
                    1,
                    config,
                )?);
            }
            partitions.push(Partition {
                sequence: VlrStore::create_with(
                    &at(partition_file(&dir, SEQUENCE_FILE, partition, num_partitions)),
                    SEQUENCE_LABEL,
                    FRAGSTORE_VERSION,
                    config,
                )?,
                source: VlrStore::create_with(
                    &at(partition_file(&dir, SOURCE_FILE, partition, num_partitions)),
                    SOURCE_LABEL,
                    FRAGSTORE_VERSION,
                    config,
                )?,
            });
        }
        info!(
            name = %name,
            path = ?path,
            first_index,
            partitions = num_partitions,
            "created fragment store"
        );
        Ok(Self::assemble(name, path, index, mirrors, partitions, policy))
    }

    /// Opens the store in `path` with the default [`StoreConfig`]
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode) -> Result<Self> {
        Self::open_with(path, mode, &StoreConfig::default())
    }

    /// Opens the store in `path`.
    ///
    /// # Errors
    ///
    /// * [`FragError::MissingConstituentFile`] naming the first missing file
    /// * [`HeaderError::VersionMismatch`](crate::error::HeaderError::VersionMismatch)
    ///   if any constituent was written by another version
    pub fn open_with<P: AsRef<Path>>(path: P, mode: OpenMode, config: &StoreConfig) -> Result<Self> {
        let dir = path.as_ref();
        let num_partitions = read_partition_count(dir)?;
        check_constituents(dir, num_partitions)?;

        let index = IndexStore::open_with(dir.join(INDEX_FILE), mode, FRAGSTORE_VERSION, config)?;
        let partitioned = num_partitions > 1;
        let mut mirrors = Vec::new();
        let mut partitions = Vec::with_capacity(num_partitions as usize);
        for partition in 0..num_partitions {
            if partitioned {
                mirrors.push(IndexStore::open_with(
                    partition_file(dir, INDEX_FILE, partition, num_partitions),
                    mode,
                    FRAGSTORE_VERSION,
                    config,
                )?);
            }
            partitions.push(Partition {
                sequence: VlrStore::open_with(
                    partition_file(dir, SEQUENCE_FILE, partition, num_partitions),
                    mode,
                    FRAGSTORE_VERSION,
                    config,
                )?,
                source: VlrStore::open_with(
                    partition_file(dir, SOURCE_FILE, partition, num_partitions),
                    mode,
                    FRAGSTORE_VERSION,
                    config,
                )?,
            });
        }
        let store = Self::assemble(
            dir_name(dir),
            Some(dir.to_path_buf()),
            index,
            mirrors,
            partitions,
            Policy::default(),
        );
        info!(
            name = %store.name,
            path = %dir.display(),
            first_index = store.first_index(),
            last_index = store.last_index(),
            partitions = num_partitions,
            ?mode,
            "opened fragment store"
        );
        Ok(store)
    }

    /// Copies the whole store in `path` into memory
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_range(path.as_ref(), None)
    }

    /// Copies the reads `[first, last]` of the store in `path` into memory.
    ///
    /// Only the blob bytes referenced by those reads are loaded; stored offsets stay
    /// valid because the loaded blob stores keep their on-disk offsets. Unless the
    /// range covers the whole store, the result is read-only.
    pub fn load_partial<P: AsRef<Path>>(path: P, first: u64, last: u64) -> Result<Self> {
        Self::load_range(path.as_ref(), Some((first, last)))
    }

    fn load_range(dir: &Path, range: Option<(u64, u64)>) -> Result<Self> {
        let num_partitions = read_partition_count(dir)?;
        check_constituents(dir, num_partitions)?;
        let partitioned = num_partitions > 1;

        let windows = match range {
            None => None,
            Some((first, last)) => {
                if partitioned {
                    return Err(FragError::PartitionedStore("load_partial").into());
                }
                Some(blob_windows(dir, first, last)?)
            }
        };

        let index = IndexStore::load_into_memory(
            dir.join(INDEX_FILE),
            FRAGSTORE_VERSION,
            range.map(|(first, last)| first..=last),
        )?;
        let mut mirrors = Vec::new();
        let mut partitions = Vec::with_capacity(num_partitions as usize);
        for partition in 0..num_partitions {
            if partitioned {
                mirrors.push(IndexStore::load_into_memory(
                    partition_file(dir, INDEX_FILE, partition, num_partitions),
                    FRAGSTORE_VERSION,
                    None,
                )?);
            }
            let (sequence_window, source_window) = match &windows {
                Some((sequence, source)) => (Some(sequence.clone()), Some(source.clone())),
                None => (None, None),
            };
            partitions.push(Partition {
                sequence: VlrStore::load_into_memory(
                    partition_file(dir, SEQUENCE_FILE, partition, num_partitions),
                    FRAGSTORE_VERSION,
                    sequence_window,
                )?,
                source: VlrStore::load_into_memory(
                    partition_file(dir, SOURCE_FILE, partition, num_partitions),
                    FRAGSTORE_VERSION,
                    source_window,
                )?,
            });
        }
        let store = Self::assemble(dir_name(dir), None, index, mirrors, partitions, Policy::default());
        info!(
            name = %store.name,
            path = %dir.display(),
            first_index = store.first_index(),
            last_index = store.last_index(),
            read_only = store.is_read_only(),
            "loaded fragment store into memory"
        );
        Ok(store)
    }

    fn assemble(
        name: String,
        path: Option<PathBuf>,
        index: IndexStore,
        mirrors: Vec<IndexStore>,
        partitions: Vec<Partition>,
        policy: Policy,
    ) -> Self {
        Self {
            name,
            path,
            status: StoreStatus::Active,
            index,
            mirrors,
            partitions,
            policy,
            rng: SmallRng::seed_from_u64(RNG_SEED),
            scratch: Scratch::default(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory of a file-backed store, `None` in memory
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn status(&self) -> StoreStatus {
        self.status
    }

    #[must_use]
    pub fn first_index(&self) -> u64 {
        self.index.first_index()
    }

    /// Last stored index; `first_index() - 1` while empty
    #[must_use]
    pub fn last_index(&self) -> u64 {
        self.index.last_index()
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[must_use]
    pub fn num_partitions(&self) -> u32 {
        self.partitions.len() as u32
    }

    #[must_use]
    pub fn is_partitioned(&self) -> bool {
        self.partitions.len() > 1
    }

    #[must_use]
    pub fn is_memory(&self) -> bool {
        self.path.is_none()
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.index.is_read_only()
    }

    #[must_use]
    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Sets how non-`ACGTN` sequence bytes are handled by later appends
    pub fn set_policy(&mut self, policy: Policy) {
        self.policy = policy;
    }

    pub(crate) fn ensure_active(&self) -> Result<()> {
        match self.status {
            StoreStatus::Active => Ok(()),
            StoreStatus::Closed => Err(FragError::Inactive.into()),
        }
    }

    pub(crate) fn check_partition(&self, partition: u32) -> Result<usize> {
        if partition >= self.num_partitions() {
            return Err(FragError::InvalidPartition {
                partition,
                num_partitions: self.num_partitions(),
            }
            .into());
        }
        Ok(partition as usize)
    }

    /// Appends a read to partition 0.
    ///
    /// See [`append_to_partition`](Self::append_to_partition).
    pub fn append(&mut self, record: &mut FragRecord) -> Result<()> {
        self.append_to_partition(record, 0)
    }

    /// Appends a read, writing its blobs to `partition`.
    ///
    /// The record's read index must be exactly `last_index() + 1`. On success the
    /// record's blob offsets are updated to where the blobs were written and a zero
    /// entry time is replaced with the current time.
    ///
    /// # Errors
    ///
    /// * [`StoreError::NonContiguousAppend`] for any other read index; nothing is written
    /// * [`CodecError`](crate::error::CodecError) if the sequence or quality cannot be
    ///   encoded under the store's [`Policy`]; nothing is written
    pub fn append_to_partition(&mut self, record: &mut FragRecord, partition: u32) -> Result<()> {
        self.ensure_active()?;
        let slot = self.check_partition(partition)?;
        let expected = self.index.last_index() + 1;
        if record.fixed.read_index != expected {
            return Err(StoreError::NonContiguousAppend {
                expected,
                got: record.fixed.read_index,
            }
            .into());
        }
        if self.index.is_read_only() {
            return Err(StoreError::ReadOnly.into());
        }

        let sequence = if record.sequence.iter().all(|&b| is_encodable(b)) {
            &record.sequence
        } else {
            self.policy
                .handle(&record.sequence, &mut self.scratch.corrected, &mut self.rng)?;
            &self.scratch.corrected
        };
        let quality = record
            .fixed
            .has_quality
            .then_some(record.quality.as_slice());
        self.scratch.encoded.clear();
        codec::encode_sequence(sequence, quality, &mut self.scratch.encoded)?;

        record.fixed.screen_match_count = record.screen_matches.len() as u16;
        codec::pack_source(
            &record.source,
            &record.screen_matches,
            record.locale.as_ref(),
            record.fixed.read_type.locale_layout(),
            &mut self.scratch.blob,
        );

        let blobs = &mut self.partitions[slot];
        let sequence_offset = PackedOffset::new(partition, blobs.sequence.end_offset())?;
        let source_offset = PackedOffset::new(partition, blobs.source.end_offset())?;
        blobs.sequence.append(&self.scratch.encoded)?;
        blobs.source.append(&self.scratch.blob)?;

        record.fixed.sequence_offset = sequence_offset.raw();
        record.fixed.source_offset = source_offset.raw();
        if record.fixed.entry_time == 0 {
            record.fixed.entry_time = unix_now();
        }
        self.append_fixed(expected, slot, &record.fixed)?;
        trace!(index = expected, partition, "appended read");
        Ok(())
    }

    /// Writes a fixed record to the index and to the mirror of partition `slot`.
    pub(crate) fn append_fixed(&mut self, index: u64, slot: usize, fixed: &ShortFragRecord) -> Result<()> {
        let bytes = fixed.to_bytes();
        self.index.append_at(index, &bytes)?;
        if let Some(mirror) = self.mirrors.get_mut(slot) {
            mirror.append(&bytes)?;
        }
        Ok(())
    }

    /// Fills `record` with the read at `index`.
    ///
    /// Parts not selected by `flags` are left empty.
    pub fn get(&mut self, index: u64, flags: FetchFlags, record: &mut FragRecord) -> Result<()> {
        self.get_extents(index, flags, record)?;
        Ok(())
    }

    /// Like [`get`](Self::get), also reporting where each blob that was read ends
    pub(crate) fn get_extents(
        &mut self,
        index: u64,
        flags: FetchFlags,
        record: &mut FragRecord,
    ) -> Result<BlobExtents> {
        self.ensure_active()?;
        record.fixed = self.read_fixed(index)?;
        self.unload_blobs(flags, record)
    }

    /// Returns a freshly allocated copy of the read at `index`
    pub fn fetch(&mut self, index: u64, flags: FetchFlags) -> Result<FragRecord> {
        let mut record = FragRecord::new();
        self.get(index, flags, &mut record)?;
        Ok(record)
    }

    pub(crate) fn read_fixed(&mut self, index: u64) -> Result<ShortFragRecord> {
        let mut buf = [0u8; FIXED_RECORD_SIZE];
        self.index.get(index, &mut buf)?;
        ShortFragRecord::from_bytes(&buf)
    }

    fn unload_blobs(&mut self, flags: FetchFlags, record: &mut FragRecord) -> Result<BlobExtents> {
        let mut extents = BlobExtents::default();
        let layout = record.fixed.read_type.locale_layout();
        let num_matches = usize::from(record.fixed.screen_match_count);
        record.source.clear();
        record.screen_matches.clear();
        record.locale = None;
        if flags.contains(FetchFlags::SOURCE) || num_matches > 0 || layout != LocaleLayout::None {
            let at = PackedOffset::from_raw(record.fixed.source_offset);
            let slot = self.check_partition(at.partition())?;
            self.partitions[slot]
                .source
                .get_vec(at.offset(), &mut self.scratch.blob)?;
            extents.source = Some((slot, blob_end(at, self.scratch.blob.len())));
            let parts = codec::unpack_source(&self.scratch.blob, num_matches, layout)?;
            if flags.contains(FetchFlags::SOURCE) {
                record.source.extend_from_slice(parts.text);
            }
            record.screen_matches = parts.matches;
            record.locale = parts.locale;
        }

        if flags.contains(FetchFlags::SEQUENCE) {
            let at = PackedOffset::from_raw(record.fixed.sequence_offset);
            let slot = self.check_partition(at.partition())?;
            self.partitions[slot]
                .sequence
                .get_vec(at.offset(), &mut self.scratch.encoded)?;
            extents.sequence = Some((slot, blob_end(at, self.scratch.encoded.len())));
            codec::decode_sequence(
                &self.scratch.encoded,
                record.fixed.has_quality,
                &mut record.sequence,
                &mut record.quality,
            )?;
        } else {
            record.sequence.clear();
            record.quality.clear();
        }
        Ok(extents)
    }

    /// Overwrites the fixed record at `index`.
    ///
    /// Blobs are never rewritten: the stored read index, blob offsets, read type,
    /// quality flag and screen match count are kept, and only the deleted flag,
    /// clear ranges, accession and entry time are taken from `record`.
    pub fn set(&mut self, index: u64, record: &FragRecord) -> Result<()> {
        self.ensure_active()?;
        let stored = self.read_fixed(index)?;
        let fixed = ShortFragRecord {
            deleted: record.fixed.deleted,
            clear: record.fixed.clear,
            accession: record.fixed.accession,
            entry_time: record.fixed.entry_time,
            ..stored
        };
        self.index.set(index, &fixed.to_bytes())
    }

    /// Marks the read at `index` deleted. Its blobs stay in place.
    pub fn delete(&mut self, index: u64) -> Result<()> {
        self.ensure_active()?;
        self.index.mark_deleted(index)
    }

    /// Appends every read of `source` to this store.
    ///
    /// Blob bytes are copied in bulk and each fixed record's offsets are shifted to
    /// where its blobs landed. `source` must start at `last_index() + 1`.
    ///
    /// # Errors
    ///
    /// * [`FragError::PartitionedStore`] if either store is partitioned
    /// * [`StoreError::NonContiguousAppend`] if the index ranges do not join up
    pub fn concat(&mut self, source: &mut FragmentStore) -> Result<()> {
        self.ensure_active()?;
        source.ensure_active()?;
        if self.is_partitioned() || source.is_partitioned() {
            return Err(FragError::PartitionedStore("concat").into());
        }
        if source.is_empty() {
            return Ok(());
        }
        let expected = self.index.last_index() + 1;
        if source.first_index() != expected {
            return Err(StoreError::NonContiguousAppend {
                expected,
                got: source.first_index(),
            }
            .into());
        }
        if self.is_read_only() {
            return Err(StoreError::ReadOnly.into());
        }

        let (target, blobs) = (&mut self.partitions[0], &mut source.partitions[0]);
        let sequence_first = blobs.sequence.first_offset();
        let source_first = blobs.source.first_offset();
        let sequence_base = target.sequence.concat(&mut blobs.sequence)?;
        let source_base = target.source.concat(&mut blobs.source)?;

        let mut buf = [0u8; FIXED_RECORD_SIZE];
        let mut stream = source.index.stream();
        while let Some(index) = stream.next_into(&mut buf)? {
            let mut fixed = ShortFragRecord::from_bytes(&buf)?;
            let sequence = PackedOffset::from_raw(fixed.sequence_offset).offset();
            let blob = PackedOffset::from_raw(fixed.source_offset).offset();
            fixed.sequence_offset =
                PackedOffset::new(0, sequence - sequence_first + sequence_base)?.raw();
            fixed.source_offset = PackedOffset::new(0, blob - source_first + source_base)?.raw();
            self.index.append_at(index, &fixed.to_bytes())?;
        }
        info!(
            name = %self.name,
            from = %source.name,
            last_index = self.last_index(),
            "concatenated fragment stores"
        );
        Ok(())
    }

    /// Writes this store to `path` as a new unpartitioned file store.
    pub fn save_to<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.ensure_active()?;
        if self.is_partitioned() {
            return Err(FragError::PartitionedStore("save_to").into());
        }
        let mut target = Self::builder()
            .name(self.name.clone())
            .first_index(self.first_index())
            .policy(self.policy)
            .create(Location::file(path))?;
        target.concat(self)?;
        target.close()
    }

    /// Empties an unpartitioned store and restarts numbering at `first_index`.
    pub fn reset(&mut self, first_index: u64) -> Result<()> {
        self.ensure_active()?;
        if self.is_partitioned() {
            return Err(FragError::PartitionedStore("reset").into());
        }
        self.index.reset(first_index)?;
        let blobs = &mut self.partitions[0];
        blobs.sequence.reset()?;
        blobs.source.reset()
    }

    /// Makes every write so far durable.
    pub fn commit(&mut self) -> Result<()> {
        self.ensure_active()?;
        self.index.commit()?;
        for mirror in &mut self.mirrors {
            mirror.commit()?;
        }
        for blobs in &mut self.partitions {
            blobs.sequence.commit()?;
            blobs.source.commit()?;
        }
        Ok(())
    }

    /// Commits and deactivates the handle; later operations fail with [`FragError::Inactive`].
    pub fn close(&mut self) -> Result<()> {
        self.commit()?;
        self.status = StoreStatus::Closed;
        info!(name = %self.name, last_index = self.last_index(), "closed fragment store");
        Ok(())
    }

    /// Reports which constituent files of a store are present in `path`
    #[must_use]
    pub fn exists<P: AsRef<Path>>(path: P) -> StoreExistence {
        let dir = path.as_ref();
        if !dir.is_dir() {
            return StoreExistence::Absent;
        }
        let Ok(num_partitions) = read_partition_count(dir) else {
            return StoreExistence::Partial;
        };
        let files = constituent_files(dir, num_partitions);
        let present = files.iter().filter(|file| file.is_file()).count();
        if present == files.len() {
            StoreExistence::Complete
        } else if present == 0 {
            StoreExistence::Absent
        } else {
            StoreExistence::Partial
        }
    }

    /// Deletes every store file in `path`, then the directory itself if it is left empty.
    pub fn remove<P: AsRef<Path>>(path: P) -> Result<()> {
        let dir = path.as_ref();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            if is_store_file(&entry.file_name().to_string_lossy()) {
                fs::remove_file(entry.path())?;
            }
        }
        // Only succeeds for an empty directory
        let _ = fs::remove_dir(dir);
        Ok(())
    }

    /// Copies, or with `move_files` renames, the store in `source` into `target`.
    ///
    /// Store files already in `target` are replaced. Open handles should be committed first.
    pub fn copy<P: AsRef<Path>, Q: AsRef<Path>>(source: P, target: Q, move_files: bool) -> Result<()> {
        let (source, target) = (source.as_ref(), target.as_ref());
        let num_partitions = read_partition_count(source)?;
        check_constituents(source, num_partitions)?;
        Self::remove(target)?;
        fs::create_dir_all(target)?;
        for file in constituent_files(source, num_partitions) {
            let Some(name) = file.file_name() else {
                continue;
            };
            let destination = target.join(name);
            if move_files {
                fs::rename(&file, &destination)?;
            } else {
                fs::copy(&file, &destination)?;
            }
        }
        if move_files {
            let _ = fs::remove_dir(source);
        }
        info!(
            from = %source.display(),
            to = %target.display(),
            move_files,
            "copied fragment store"
        );
        Ok(())
    }
}

fn check_partition_count(num_partitions: u32) -> Result<()> {
    if num_partitions == 0 || num_partitions > MAX_PARTITIONS {
        return Err(FragError::InvalidPartitionCount(num_partitions.to_string()).into());
    }
    Ok(())
}

fn read_partition_count(dir: &Path) -> Result<u32> {
    match fs::read_to_string(dir.join(PARTITION_FILE)) {
        Ok(text) => {
            let text = text.trim();
            let count = text
                .parse::<u32>()
                .map_err(|_| FragError::InvalidPartitionCount(text.to_string()))?;
            check_partition_count(count)?;
            Ok(count)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(1),
        Err(e) => Err(e.into()),
    }
}

/// Path of a per-partition file; unpartitioned stores use the bare name
fn partition_file(dir: &Path, base: &str, partition: u32, num_partitions: u32) -> PathBuf {
    if num_partitions == 1 {
        return dir.join(base);
    }
    let mut buffer = itoa::Buffer::new();
    let suffix = buffer.format(partition);
    let mut name = String::with_capacity(base.len() + 1 + suffix.len());
    name.push_str(base);
    name.push('.');
    name.push_str(suffix);
    dir.join(name)
}

fn constituent_files(dir: &Path, num_partitions: u32) -> Vec<PathBuf> {
    let mut files = vec![dir.join(INDEX_FILE)];
    if num_partitions > 1 {
        files.push(dir.join(PARTITION_FILE));
    }
    for partition in 0..num_partitions {
        if num_partitions > 1 {
            files.push(partition_file(dir, INDEX_FILE, partition, num_partitions));
        }
        files.push(partition_file(dir, SEQUENCE_FILE, partition, num_partitions));
        files.push(partition_file(dir, SOURCE_FILE, partition, num_partitions));
    }
    files
}

fn check_constituents(dir: &Path, num_partitions: u32) -> Result<()> {
    match constituent_files(dir, num_partitions)
        .into_iter()
        .find(|file| !file.is_file())
    {
        Some(missing) => Err(FragError::MissingConstituentFile(missing).into()),
        None => Ok(()),
    }
}

fn is_store_file(name: &str) -> bool {
    name == PARTITION_FILE
        || [INDEX_FILE, SEQUENCE_FILE, SOURCE_FILE].iter().any(|base| {
            name == *base
                || name
                    .strip_prefix(base)
                    .and_then(|rest| rest.strip_prefix('.'))
                    .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        })
}

pub(crate) fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map_or_else(|| dir.display().to_string(), |n| n.to_string_lossy().into_owned())
}

type Window = std::ops::Range<u64>;

/// Byte windows of the sequence and source stores covering the reads `[first, last]`
fn blob_windows(dir: &Path, first: u64, last: u64) -> Result<(Window, Window)> {
    let mut index = IndexStore::open(dir.join(INDEX_FILE), OpenMode::ReadOnly, FRAGSTORE_VERSION)?;
    index.check_range(first)?;
    index.check_range(last)?;
    if last < first {
        return Err(StoreError::IndexOutOfRange {
            index: last,
            first,
            last: index.last_index(),
        }
        .into());
    }
    let mut buf = [0u8; FIXED_RECORD_SIZE];
    index.get(first, &mut buf)?;
    let start = ShortFragRecord::from_bytes(&buf)?;
    let (sequence_end, source_end) = if last == index.last_index() {
        let sequence = VlrStore::open(dir.join(SEQUENCE_FILE), OpenMode::ReadOnly, FRAGSTORE_VERSION)?;
        let source = VlrStore::open(dir.join(SOURCE_FILE), OpenMode::ReadOnly, FRAGSTORE_VERSION)?;
        (sequence.end_offset(), source.end_offset())
    } else {
        index.get(last + 1, &mut buf)?;
        let next = ShortFragRecord::from_bytes(&buf)?;
        (
            PackedOffset::from_raw(next.sequence_offset).offset(),
            PackedOffset::from_raw(next.source_offset).offset(),
        )
    };
    Ok((
        PackedOffset::from_raw(start.sequence_offset).offset()..sequence_end,
        PackedOffset::from_raw(start.source_offset).offset()..source_end,
    ))
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::error::{CodecError, Error};
    use crate::frag::{ClearStage, Locale, ReadType, ScreenMatch};

    fn read(index: u64, sequence: &[u8]) -> FragRecord {
        let mut rec = FragRecord::new();
        rec.set_read_index(index);
        rec.set_accession(1000 + index);
        rec.set_sequence(sequence, None);
        rec.set_source(format!("read {index}").as_bytes());
        rec
    }

    #[test]
    fn test_file_store_reopen() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("reads");
        let mut store = FragmentStore::create(Location::file(&path), 1)?;
        let mut rec = read(1, b"ACGTN");
        rec.set_sequence(b"ACGTN", Some(b"9:;<0".as_slice()));
        rec.set_clear_region(ClearStage::Original, 0, 4)?;
        store.append(&mut rec)?;
        store.append(&mut read(2, b"TTTT"))?;
        store.close()?;
        assert_eq!(FragmentStore::exists(&path), StoreExistence::Complete);

        let mut store = FragmentStore::open(&path, OpenMode::ReadOnly)?;
        assert_eq!((store.first_index(), store.last_index()), (1, 2));
        assert_eq!(store.name(), "reads");
        let first = store.fetch(1, FetchFlags::ALL)?;
        assert_eq!(first.sequence(), b"ACGTN");
        assert_eq!(first.quality(), b"9:;<0");
        assert_eq!(first.source(), b"read 1");
        assert_eq!(first.clear_region(ClearStage::Cgw).end, 4);
        assert_eq!(first.accession(), 1001);
        assert!(first.entry_time() > 0);
        Ok(())
    }

    #[test]
    fn test_fetch_flags() -> Result<()> {
        let mut store = FragmentStore::create(Location::Memory, 1)?;
        store.append(&mut read(1, b"GATTACA"))?;

        let mut rec = FragRecord::new();
        store.get(1, FetchFlags::FIXED, &mut rec)?;
        assert_eq!(rec.accession(), 1001);
        assert!(rec.sequence().is_empty());
        assert!(rec.source().is_empty());

        store.get(1, FetchFlags::FIXED | FetchFlags::SEQUENCE, &mut rec)?;
        assert_eq!(rec.sequence(), b"GATTACA");
        assert!(rec.source().is_empty());
        Ok(())
    }

    #[test]
    fn test_locale_and_screen_matches() -> Result<()> {
        let mut store = FragmentStore::create(Location::Memory, 1)?;
        let mut rec = read(1, b"ACGT");
        rec.set_read_type(ReadType::FinishedBac);
        rec.set_locale(Some(Locale {
            id: 77,
            start: 100,
            end: 104,
        }));
        rec.set_screen_matches(&[ScreenMatch {
            range_start: 1,
            range_end: 3,
            repeat_id: 9,
            ..Default::default()
        }]);
        store.append(&mut rec)?;

        let got = store.fetch(1, FetchFlags::FIXED)?;
        assert_eq!(got.locale().map(|l| (l.id, l.start, l.end)), Some((77, 100, 104)));
        assert_eq!(got.screen_matches()[0].repeat_id, 9);
        assert!(got.source().is_empty());
        Ok(())
    }

    #[test]
    fn test_non_contiguous_append_writes_nothing() -> Result<()> {
        let mut store = FragmentStore::create(Location::Memory, 5)?;
        let result = store.append(&mut read(6, b"ACGT"));
        assert!(matches!(
            result,
            Err(Error::StoreError(StoreError::NonContiguousAppend {
                expected: 5,
                got: 6
            }))
        ));
        assert!(store.is_empty());
        assert!(store.partitions[0].sequence.is_empty());
        assert!(store.partitions[0].source.is_empty());
        Ok(())
    }

    #[test]
    fn test_invalid_base_policy() -> Result<()> {
        let mut store = FragmentStore::create(Location::Memory, 1)?;
        assert!(matches!(
            store.append(&mut read(1, b"ACXT")),
            Err(Error::CodecError(CodecError::InvalidNucleotide(b'X')))
        ));
        assert!(store.is_empty());

        store.set_policy(Policy::SetToN);
        store.append(&mut read(1, b"ACXT"))?;
        assert_eq!(store.fetch(1, FetchFlags::ALL)?.sequence(), b"ACNT");
        Ok(())
    }

    #[test]
    fn test_set_keeps_blob_layout() -> Result<()> {
        let mut store = FragmentStore::create(Location::Memory, 1)?;
        store.append(&mut read(1, b"ACGT"))?;

        let mut rec = store.fetch(1, FetchFlags::ALL)?;
        rec.set_accession(42);
        rec.set_read_index(99);
        rec.set_read_type(ReadType::FinishedBac);
        rec.set_clear_region(ClearStage::Ovl, 1, 3)?;
        store.set(1, &rec)?;

        let got = store.fetch(1, FetchFlags::ALL)?;
        assert_eq!(got.accession(), 42);
        assert_eq!(got.read_index(), 1);
        assert_eq!(got.read_type(), ReadType::Read);
        assert_eq!(got.clear_region(ClearStage::Latest).start, 1);
        assert_eq!(got.sequence(), b"ACGT");
        assert_eq!(got.source(), b"read 1");
        Ok(())
    }

    #[test]
    fn test_partitioned_store() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("parts");
        let mut store = FragmentStore::builder()
            .partitions(3)
            .create(Location::file(&path))?;
        store.append_to_partition(&mut read(1, b"AAAA"), 2)?;
        store.append_to_partition(&mut read(2, b"CCCC"), 0)?;
        store.append_to_partition(&mut read(3, b"GGGG"), 2)?;
        assert!(matches!(
            store.append_to_partition(&mut read(4, b"TTTT"), 3),
            Err(Error::FragError(FragError::InvalidPartition {
                partition: 3,
                num_partitions: 3
            }))
        ));
        store.close()?;

        let mut store = FragmentStore::open(&path, OpenMode::ReadWrite)?;
        assert_eq!(store.num_partitions(), 3);
        let third = store.fetch(3, FetchFlags::ALL)?;
        assert_eq!(PackedOffset::from_raw(third.sequence_offset()).partition(), 2);
        assert_eq!(third.sequence(), b"GGGG");
        assert_eq!(store.fetch(2, FetchFlags::ALL)?.sequence(), b"CCCC");
        assert_eq!(store.mirrors[2].len(), 2);
        assert_eq!(store.mirrors[1].len(), 0);
        assert!(matches!(
            store.reset(1),
            Err(Error::FragError(FragError::PartitionedStore("reset")))
        ));
        store.close()?;

        fs::remove_file(path.join("db.seq.1"))?;
        assert_eq!(FragmentStore::exists(&path), StoreExistence::Partial);
        match FragmentStore::open(&path, OpenMode::ReadOnly) {
            Err(Error::FragError(FragError::MissingConstituentFile(missing))) => {
                assert_eq!(missing, path.join("db.seq.1"));
            }
            _ => panic!("expected a missing constituent file"),
        }
        Ok(())
    }

    #[test]
    fn test_missing_store() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nothing");
        assert_eq!(FragmentStore::exists(&path), StoreExistence::Absent);
        assert!(matches!(
            FragmentStore::open(&path, OpenMode::ReadOnly),
            Err(Error::FragError(FragError::MissingConstituentFile(_)))
        ));
        Ok(())
    }

    #[test]
    fn test_copy_move_remove() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let (a, b, c) = (dir.path().join("a"), dir.path().join("b"), dir.path().join("c"));
        let mut store = FragmentStore::create(Location::file(&a), 1)?;
        store.append(&mut read(1, b"ACGT"))?;
        store.close()?;

        FragmentStore::copy(&a, &b, false)?;
        assert_eq!(FragmentStore::exists(&a), StoreExistence::Complete);
        FragmentStore::copy(&b, &c, true)?;
        assert_eq!(FragmentStore::exists(&b), StoreExistence::Absent);

        let mut moved = FragmentStore::open(&c, OpenMode::ReadOnly)?;
        assert_eq!(moved.fetch(1, FetchFlags::ALL)?.sequence(), b"ACGT");

        FragmentStore::remove(&a)?;
        assert_eq!(FragmentStore::exists(&a), StoreExistence::Absent);
        assert!(!a.exists());
        Ok(())
    }

    #[test]
    fn test_reset_and_closed() -> Result<()> {
        let mut store = FragmentStore::create(Location::Memory, 1)?;
        store.append(&mut read(1, b"ACGT"))?;
        store.reset(10)?;
        assert!(store.is_empty());
        assert_eq!(store.first_index(), 10);
        store.append(&mut read(10, b"CC"))?;
        assert_eq!(store.fetch(10, FetchFlags::ALL)?.sequence(), b"CC");

        store.close()?;
        assert_eq!(store.status(), StoreStatus::Closed);
        assert!(matches!(
            store.fetch(10, FetchFlags::ALL),
            Err(Error::FragError(FragError::Inactive))
        ));
        Ok(())
    }

    #[test]
    fn test_store_file_names() {
        assert!(is_store_file("db.frg"));
        assert!(is_store_file("db.seq.12"));
        assert!(is_store_file("db.par"));
        assert!(!is_store_file("db.seq.x"));
        assert!(!is_store_file("notes.txt"));
        assert_eq!(
            partition_file(Path::new("d"), SOURCE_FILE, 7, 8),
            Path::new("d").join("db.src.7")
        );
    }
}
