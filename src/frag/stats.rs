use std::fmt;

use super::store::FragmentStore;
use crate::error::Result;

/// Summary of a [`FragmentStore`]'s contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragStoreStats {
    pub name: String,
    pub first_index: u64,
    pub last_index: u64,
    pub num_records: u64,
    pub num_partitions: u32,
    /// Bytes held by each partition's sequence store
    pub sequence_bytes: Vec<u64>,
    /// Bytes held by each partition's source store
    pub source_bytes: Vec<u64>,
}
impl FragStoreStats {
    #[must_use]
    pub fn total_sequence_bytes(&self) -> u64 {
        self.sequence_bytes.iter().sum()
    }

    #[must_use]
    pub fn total_source_bytes(&self) -> u64 {
        self.source_bytes.iter().sum()
    }
}
impl fmt::Display for FragStoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "store:       {}", self.name)?;
        writeln!(f, "reads:       {}", self.num_records)?;
        if self.num_records > 0 {
            writeln!(f, "index range: {}..={}", self.first_index, self.last_index)?;
        }
        writeln!(f, "partitions:  {}", self.num_partitions)?;
        writeln!(f, "sequence:    {} bytes", self.total_sequence_bytes())?;
        write!(f, "source:      {} bytes", self.total_source_bytes())?;
        if self.num_partitions > 1 {
            for (partition, (sequence, source)) in
                self.sequence_bytes.iter().zip(&self.source_bytes).enumerate()
            {
                write!(f, "\n  [{partition}] sequence {sequence}, source {source}")?;
            }
        }
        Ok(())
    }
}

impl FragmentStore {
    /// Collects index and blob sizes
    pub fn stats(&self) -> Result<FragStoreStats> {
        self.ensure_active()?;
        Ok(FragStoreStats {
            name: self.name().to_string(),
            first_index: self.first_index(),
            last_index: self.last_index(),
            num_records: self.len(),
            num_partitions: self.num_partitions(),
            sequence_bytes: self
                .partitions
                .iter()
                .map(|p| p.sequence.len_bytes())
                .collect(),
            source_bytes: self.partitions.iter().map(|p| p.source.len_bytes()).collect(),
        })
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::frag::FragRecord;
    use crate::store::{Location, LENGTH_PREFIX};

    #[test]
    fn test_stats() -> Result<()> {
        let mut store = FragmentStore::builder()
            .name("stats")
            .first_index(3)
            .create(Location::Memory)?;
        let mut rec = FragRecord::new();
        rec.set_read_index(3);
        rec.set_sequence(b"ACGTACGT", None);
        rec.set_source(b"abc");
        store.append(&mut rec)?;

        let stats = store.stats()?;
        assert_eq!(stats.num_records, 1);
        assert_eq!((stats.first_index, stats.last_index), (3, 3));
        assert_eq!(stats.total_sequence_bytes(), (LENGTH_PREFIX + 8) as u64);
        assert_eq!(stats.total_source_bytes(), (LENGTH_PREFIX + 4) as u64);

        let text = stats.to_string();
        assert!(text.contains("store:       stats"));
        assert!(text.contains("index range: 3..=3"));
        Ok(())
    }
}
