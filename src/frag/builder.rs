use super::store::{dir_name, FragmentStore};
use crate::error::Result;
use crate::policy::Policy;
use crate::store::{Location, StoreConfig};

/// A builder for creating a new [`FragmentStore`]
///
/// ```
/// use fragstore::{FragmentStore, Location, Policy};
///
/// # fn main() -> fragstore::Result<()> {
/// let store = FragmentStore::builder()
///     .name("run-7")
///     .first_index(1)
///     .policy(Policy::SetToN)
///     .create(Location::Memory)?;
/// assert!(store.is_empty());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FragStoreBuilder {
    name: Option<String>,
    first_index: u64,
    partitions: u32,
    policy: Policy,
    config: StoreConfig,
}
impl Default for FragStoreBuilder {
    fn default() -> Self {
        Self {
            name: None,
            first_index: 1,
            partitions: 1,
            policy: Policy::default(),
            config: StoreConfig::default(),
        }
    }
}
impl FragStoreBuilder {
    /// Informational name; defaults to the directory name, or `memory`
    #[must_use]
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Index assigned to the first read (must be at least 1)
    #[must_use]
    pub fn first_index(mut self, first_index: u64) -> Self {
        self.first_index = first_index;
        self
    }

    /// Number of blob partitions, `1..=256`
    #[must_use]
    pub fn partitions(mut self, partitions: u32) -> Self {
        self.partitions = partitions;
        self
    }

    #[must_use]
    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Creates the store, replacing any store files already at `location`.
    pub fn create(self, location: Location) -> Result<FragmentStore> {
        let name = self.name.unwrap_or_else(|| match &location {
            Location::File(dir) => dir_name(dir),
            Location::Memory => "memory".to_string(),
        });
        FragmentStore::create_with(
            &location,
            name,
            self.first_index,
            self.partitions,
            self.policy,
            &self.config,
        )
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::error::{Error, FragError, StoreError};

    #[test]
    fn test_defaults() -> Result<()> {
        let store = FragStoreBuilder::default().create(Location::Memory)?;
        assert_eq!(store.name(), "memory");
        assert_eq!(store.first_index(), 1);
        assert_eq!(store.last_index(), 0);
        assert_eq!(store.num_partitions(), 1);
        assert_eq!(store.policy(), Policy::BreakOnInvalid);
        assert!(store.is_memory());
        Ok(())
    }

    #[test]
    fn test_file_name_default() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FragStoreBuilder::default()
            .config(StoreConfig::default().write_buffer(0))
            .create(Location::file(dir.path().join("assembly")))?;
        assert_eq!(store.name(), "assembly");
        assert_eq!(store.path(), Some(dir.path().join("assembly").as_path()));
        Ok(())
    }

    #[test]
    fn test_invalid_settings() {
        assert!(matches!(
            FragStoreBuilder::default()
                .partitions(0)
                .create(Location::Memory),
            Err(Error::FragError(FragError::InvalidPartitionCount(_)))
        ));
        assert!(matches!(
            FragStoreBuilder::default()
                .partitions(257)
                .create(Location::Memory),
            Err(Error::FragError(FragError::InvalidPartitionCount(_)))
        ));
        assert!(matches!(
            FragStoreBuilder::default()
                .first_index(0)
                .create(Location::Memory),
            Err(Error::StoreError(StoreError::InvalidFirstIndex(0)))
        ));
    }
}
