/// Default size of the write-behind buffer of file-backed stores: 64KB
pub const DEFAULT_WRITE_BUFFER: usize = 64 * 1024;

/// Default initial capacity of memory-backed stores: 4KB
pub const DEFAULT_INITIAL_ALLOCATION: usize = 4 * 1024;

/// Tuning knobs shared by every store
///
/// ```
/// use fragstore::StoreConfig;
///
/// let config = StoreConfig::default()
///     .write_buffer(1 << 20)
///     .initial_allocation(1 << 16);
/// assert_eq!(config.write_buffer_size(), 1 << 20);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    write_buffer: usize,
    initial_allocation: usize,
}
impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            write_buffer: DEFAULT_WRITE_BUFFER,
            initial_allocation: DEFAULT_INITIAL_ALLOCATION,
        }
    }
}
impl StoreConfig {
    /// Sets the number of bytes appended to a file-backed store before they are written out.
    ///
    /// A value of zero writes every append straight through.
    #[must_use]
    pub fn write_buffer(mut self, bytes: usize) -> Self {
        self.write_buffer = bytes;
        self
    }

    /// Sets the initial capacity of memory-backed stores (grown by doubling).
    #[must_use]
    pub fn initial_allocation(mut self, bytes: usize) -> Self {
        self.initial_allocation = bytes;
        self
    }

    #[must_use]
    pub fn write_buffer_size(&self) -> usize {
        self.write_buffer
    }

    #[must_use]
    pub fn initial_allocation_size(&self) -> usize {
        self.initial_allocation
    }
}
