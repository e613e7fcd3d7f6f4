use std::path::PathBuf;

/// Custom Result type for fragment store operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the fragstore library, encompassing all possible error cases
/// that can occur while creating, reading, or mutating a store.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// Errors related to store header processing
    HeaderError(#[from] HeaderError),
    /// Errors raised by the generic index and variable-length stores
    StoreError(#[from] StoreError),
    /// Errors raised by the fragment layer
    FragError(#[from] FragError),
    /// Errors from the sequence/quality and source blob codecs
    CodecError(#[from] CodecError),
    /// Errors from partition offset packing
    PartitionError(#[from] PartitionError),
    /// Errors while writing or reloading a dump
    DumpError(#[from] DumpError),
    /// Standard I/O errors from the Rust standard library
    IoError(#[from] std::io::Error),
    /// Generic errors that can occur in any part of the system
    AnyhowError(#[from] anyhow::Error),
}
impl Error {
    /// Returns the buffer length required by a failed variable-length read, if this error is one.
    ///
    /// Callers use this to resize their buffer and retry.
    #[must_use]
    pub fn required_len(&self) -> Option<usize> {
        match self {
            Self::StoreError(StoreError::BufferTooSmall { required, .. }) => Some(*required),
            _ => None,
        }
    }
}

/// Errors specific to processing and validating store headers
#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    /// The magic number in the header does not match the expected value
    ///
    /// # Arguments
    /// * `u32` - The invalid magic number that was found
    #[error("Invalid magic number: {0:#010x}")]
    InvalidMagicNumber(u32),

    /// The version stored in the header differs from the version this code was built for.
    ///
    /// This is a hard compatibility gate: the store must be rebuilt.
    #[error("Store version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    /// The kind byte in the header is not a known store kind
    #[error("Invalid store kind: {0}")]
    InvalidStoreKind(u8),

    /// The index range does not describe a data region that fits in a `u64`
    #[error("Invalid index range in header: first {first}, last {last}")]
    InvalidRange { first: u64, last: u64 },

    /// The size of the data does not match what was specified in the header
    ///
    /// # Arguments
    /// * First `usize` - The actual number of bytes provided
    /// * Second `usize` - The expected number of bytes according to the header
    #[error("Invalid number of bytes provided: {0}. Expected: {1}")]
    InvalidSize(usize, usize),
}

/// Errors raised by the generic store engine
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// An append did not target the slot immediately after the last element
    #[error("Non-contiguous append: expected index {expected}, got {got}")]
    NonContiguousAppend { expected: u64, got: u64 },

    /// Attempted to access an index outside of `[first, last]`
    #[error("Index {index} is out of range [{first}, {last}]")]
    IndexOutOfRange { index: u64, first: u64, last: u64 },

    /// Attempted to access a byte offset outside of a variable-length store
    #[error("Offset {offset} is out of range [{first}, {end})")]
    OffsetOutOfRange { offset: u64, first: u64, end: u64 },

    /// The caller-supplied buffer cannot hold the requested record
    #[error("Buffer too small: record requires {required} bytes, buffer holds {available}")]
    BufferTooSmall { required: usize, available: usize },

    /// Attempted to mutate a store opened (or loaded) read-only
    #[error("Store is read-only")]
    ReadOnly,

    /// The file holds a different kind of store than was requested
    #[error("Store kind mismatch: expected {expected}, found {found}")]
    KindMismatch { expected: u8, found: u8 },

    /// An element of the wrong size was supplied to an index store
    #[error("Element size mismatch: expected {expected} bytes, got {got}")]
    ElementSizeMismatch { expected: usize, got: usize },

    /// Index stores number their elements from one or higher
    #[error("Invalid first index: {0}")]
    InvalidFirstIndex(u64),

    /// The file is shorter than its header declares
    #[error("Store data is truncated: header declares {expected} bytes, found {found}")]
    Truncated { expected: u64, found: u64 },

    /// The path is not a regular file
    #[error("File is not regular")]
    IncompatibleFile,

    /// A blob is larger than the length prefix can describe
    #[error("Record of {0} bytes exceeds the maximum record length")]
    RecordTooLarge(usize),
}

/// Errors raised by the fragment layer
#[derive(thiserror::Error, Debug)]
pub enum FragError {
    /// One of the files making up a store is absent
    #[error("Missing constituent file: {}", .0.display())]
    MissingConstituentFile(PathBuf),

    /// The resolved "latest" clear range cannot be written directly
    #[error("The latest clear range is a resolved view and cannot be set")]
    InvalidStageForSet,

    /// The store handle has been closed
    #[error("Fragment store is not active")]
    Inactive,

    /// A partition id beyond the store's partition count was requested
    #[error("Invalid partition {partition}: store has {num_partitions} partition(s)")]
    InvalidPartition { partition: u32, num_partitions: u32 },

    /// The operation is only defined for unpartitioned stores
    #[error("Operation `{0}` is not supported on partitioned stores")]
    PartitionedStore(&'static str),

    /// An unknown read type code was found
    #[error("Invalid read type code: {0:#04x}")]
    InvalidReadType(u8),

    /// A partition count of zero, above the addressable maximum, or unparsable
    #[error("Invalid partition count: {0}")]
    InvalidPartitionCount(String),

    /// A parallel worker thread panicked
    #[error("Worker thread {0} panicked")]
    WorkerPanicked(usize),
}

/// Errors from the sequence/quality and source blob codecs
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    /// A sequence byte is not one of `A`, `C`, `G`, `T` or `N`
    #[error("Invalid nucleotide: {:?}", char::from(*.0))]
    InvalidNucleotide(u8),

    /// A quality character falls outside of the encodable range
    #[error("Invalid quality character: {:?}", char::from(*.0))]
    InvalidQuality(u8),

    /// An encoded byte carries a quality value that is neither in range nor the no-call sentinel
    #[error("Invalid encoded symbol: {0:#04x}")]
    InvalidSymbol(u8),

    /// Sequence and quality strings have different lengths
    #[error("Sequence length ({sequence}) does not match quality length ({quality})")]
    LengthMismatch { sequence: usize, quality: usize },

    /// A source blob is shorter than its declared annotations or lacks its terminator
    #[error("Corrupt source blob: {0}")]
    CorruptSource(&'static str),
}

/// Errors from partition offset packing
#[derive(thiserror::Error, Debug)]
pub enum PartitionError {
    /// The partition id does not fit in the high bit-field
    #[error("Partition id {0} exceeds the partition field width")]
    PartitionOverflow(u32),

    /// The byte offset does not fit in the low bit-field
    #[error("Byte offset {0} exceeds the offset field width")]
    OffsetOverflow(u64),
}

/// Errors while writing or reloading a dump
#[derive(thiserror::Error, Debug)]
pub enum DumpError {
    /// A field's checksum does not match its bytes
    #[error("Checksum mismatch in {field} field: expected {expected:#010x}, computed {found:#010x}")]
    ChecksumMismatch {
        field: &'static str,
        expected: u32,
        found: u32,
    },

    /// The dump stream does not follow the expected framing
    #[error("Malformed dump: {0}")]
    Malformed(&'static str),
}
