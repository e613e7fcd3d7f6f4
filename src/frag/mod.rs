//! # Fragment Store
//!
//! The domain layer: sequencing reads stored as an 80-byte fixed record in an
//! [`IndexStore`](crate::store::IndexStore) plus two variable-length blobs per read.
//!
//! ## Records
//!
//! * fixed: flags, read type, clear ranges, accession, read index, blob offsets and
//!   entry time, see [`ShortFragRecord`]
//! * blob offsets: partition id and byte offset packed in a `u64`, see [`PackedOffset`]
//!
//! ## Blobs
//!
//! * sequence: one byte per base, see [`codec`]
//! * source: source text, screen matches and locale, see [`codec`]
//!
//! Blobs are written before the fixed record that references them and are never
//! rewritten: [`FragmentStore::set`] and [`FragmentStore::delete`] only touch the
//! fixed record.
//!
//! ## Example
//!
//! ```
//! use fragstore::{ClearStage, FetchFlags, FragRecord, FragmentStore, Location};
//!
//! # fn main() -> fragstore::Result<()> {
//! let mut store = FragmentStore::create(Location::Memory, 1)?;
//!
//! let mut read = FragRecord::new();
//! read.set_read_index(1);
//! read.set_sequence(b"ACGTN", Some(b"<<<;0".as_slice()));
//! read.set_source(b"plate 4, well A1");
//! read.set_clear_region(ClearStage::Original, 0, 4)?;
//! store.append(&mut read)?;
//!
//! let fetched = store.fetch(1, FetchFlags::ALL)?;
//! assert_eq!(fetched.sequence(), b"ACGTN");
//! assert_eq!(fetched.clear_region(ClearStage::Latest).end, 4);
//! # Ok(())
//! # }
//! ```

mod builder;
mod clear;
pub mod codec;
mod dump;
mod partition;
mod read;
mod record;
mod stats;
mod store;
mod stream;

pub use builder::FragStoreBuilder;
pub use clear::{ClearRange, ClearRanges, ClearStage};
pub use codec::is_encodable;
pub use dump::{DumpReader, DumpedRecord, FIELD_SEPARATOR, RECORD_TERMINATOR};
pub use partition::{PackedOffset, MAX_OFFSET, MAX_PARTITIONS, OFFSET_BITS, PARTITION_BITS};
pub use read::FragRecord;
pub use record::{
    Locale, LocaleLayout, MatchDirection, ReadType, ScreenMatch, ShortFragRecord,
    FIXED_RECORD_SIZE, SCREEN_MATCH_SIZE,
};
pub use stats::FragStoreStats;
pub use store::{
    FetchFlags, FragmentStore, StoreExistence, StoreStatus, FRAGSTORE_VERSION, INDEX_FILE,
    PARTITION_FILE, SEQUENCE_FILE, SOURCE_FILE,
};
pub use stream::FragStream;
