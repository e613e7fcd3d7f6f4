//! # fragstore
//!
//! A persistent store for sequencing reads ("fragments") used by a genome assembler.
//!
//! The crate is built in two layers:
//!
//! * [`store`] - a generic storage engine: fixed-size element stores addressed by a
//!   contiguous logical index, and variable-length blob stores addressed by byte
//!   offset, each backed by a file or by memory.
//! * [`frag`] - the [`FragmentStore`]: one fixed record per read plus a sequence blob
//!   and a source blob, optionally spread over several partitions.
//!
//! ```
//! use fragstore::{FetchFlags, FragRecord, FragmentStore, Location};
//!
//! # fn main() -> fragstore::Result<()> {
//! let mut store = FragmentStore::create(Location::Memory, 1)?;
//! for (index, bases) in [(1, b"ACGT".as_slice()), (2, b"GGNC".as_slice())] {
//!     let mut read = FragRecord::new();
//!     read.set_read_index(index);
//!     read.set_sequence(bases, None);
//!     store.append(&mut read)?;
//! }
//!
//! let mut stream = store.stream(FetchFlags::SEQUENCE)?;
//! let mut read = FragRecord::new();
//! while stream.next_into(&mut read)? {
//!     assert_eq!(read.sequence().len(), 4);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Stores are single-writer. Read-only handles on the same files may be used from
//! several threads at once, see [`FragReader`].

pub mod error;
pub mod frag;
mod parallel;
mod policy;
pub mod prelude;
pub mod store;

pub use error::{
    CodecError, DumpError, Error, FragError, HeaderError, PartitionError, Result, StoreError,
};
pub use frag::{
    ClearRange, ClearStage, DumpReader, DumpedRecord, FetchFlags, FragRecord, FragStoreBuilder,
    FragStoreStats, FragStream, FragmentStore, Locale, PackedOffset, ReadType, ScreenMatch,
    StoreExistence, FRAGSTORE_VERSION,
};
pub use parallel::{FragReader, ParallelProcessor, ParallelReader, BATCH_SIZE};
pub use policy::{Policy, RNG_SEED};
pub use store::{IndexStore, Location, OpenMode, StoreConfig, VlrStore};
