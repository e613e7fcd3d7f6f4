use super::clear::{ClearRange, ClearStage};
use super::record::{Locale, ReadType, ScreenMatch, ShortFragRecord};
use crate::error::Result;

/// A caller-owned, reusable view of one read
///
/// A `FragRecord` carries everything stored about a read: its fixed record, the
/// decoded sequence and quality, the source text, screen matches and locale.
/// Records are copied in and out of a [`FragmentStore`](crate::FragmentStore);
/// the store never hands out references into its own buffers, so one record can be
/// reused across many fetches without reallocating.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragRecord {
    pub(crate) fixed: ShortFragRecord,
    pub(crate) sequence: Vec<u8>,
    pub(crate) quality: Vec<u8>,
    pub(crate) source: Vec<u8>,
    pub(crate) screen_matches: Vec<ScreenMatch>,
    pub(crate) locale: Option<Locale>,
}
impl FragRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets every field while keeping allocated buffers
    pub fn clear(&mut self) {
        self.fixed = ShortFragRecord::default();
        self.sequence.clear();
        self.quality.clear();
        self.source.clear();
        self.screen_matches.clear();
        self.locale = None;
    }

    #[must_use]
    pub fn fixed(&self) -> &ShortFragRecord {
        &self.fixed
    }

    #[must_use]
    pub fn read_index(&self) -> u64 {
        self.fixed.read_index
    }

    pub fn set_read_index(&mut self, index: u64) {
        self.fixed.read_index = index;
    }

    #[must_use]
    pub fn accession(&self) -> u64 {
        self.fixed.accession
    }

    pub fn set_accession(&mut self, accession: u64) {
        self.fixed.accession = accession;
    }

    #[must_use]
    pub fn read_type(&self) -> ReadType {
        self.fixed.read_type
    }

    pub fn set_read_type(&mut self, read_type: ReadType) {
        self.fixed.read_type = read_type;
    }

    #[must_use]
    pub fn entry_time(&self) -> u64 {
        self.fixed.entry_time
    }

    pub fn set_entry_time(&mut self, time: u64) {
        self.fixed.entry_time = time;
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.fixed.deleted
    }

    #[must_use]
    pub fn has_quality(&self) -> bool {
        self.fixed.has_quality
    }

    /// Sets the sequence and, optionally, its quality string.
    ///
    /// Lengths are checked when the record is appended.
    pub fn set_sequence(&mut self, sequence: &[u8], quality: Option<&[u8]>) {
        self.sequence.clear();
        self.sequence.extend_from_slice(sequence);
        self.quality.clear();
        if let Some(quality) = quality {
            self.quality.extend_from_slice(quality);
        }
        self.fixed.has_quality = quality.is_some();
    }

    #[must_use]
    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    /// Quality characters, empty for reads stored without quality
    #[must_use]
    pub fn quality(&self) -> &[u8] {
        &self.quality
    }

    pub fn set_source(&mut self, source: &[u8]) {
        self.source.clear();
        self.source.extend_from_slice(source);
    }

    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Replaces the screen matches and updates the stored match count.
    ///
    /// Counts beyond `u16::MAX` are truncated.
    pub fn set_screen_matches(&mut self, matches: &[ScreenMatch]) {
        let count = matches.len().min(usize::from(u16::MAX));
        self.screen_matches.clear();
        self.screen_matches.extend_from_slice(&matches[..count]);
        self.fixed.screen_match_count = count as u16;
    }

    #[must_use]
    pub fn screen_matches(&self) -> &[ScreenMatch] {
        &self.screen_matches
    }

    /// Walks the screen matches as a chain, pairing each with its successor
    pub fn screen_match_chain(
        &self,
    ) -> impl Iterator<Item = (&ScreenMatch, Option<&ScreenMatch>)> + '_ {
        self.screen_matches
            .iter()
            .enumerate()
            .map(|(i, screen)| (screen, self.screen_matches.get(i + 1)))
    }

    /// Sets the locale. Only read types with a locale layout persist it.
    pub fn set_locale(&mut self, locale: Option<Locale>) {
        self.locale = locale;
    }

    #[must_use]
    pub fn locale(&self) -> Option<&Locale> {
        self.locale.as_ref()
    }

    /// Writes the clear range of `stage`; see [`ClearRanges`](super::ClearRanges)
    pub fn set_clear_region(&mut self, stage: ClearStage, start: u32, end: u32) -> Result<()> {
        self.fixed.clear.set(stage, ClearRange::new(start, end))
    }

    #[must_use]
    pub fn clear_region(&self, stage: ClearStage) -> ClearRange {
        self.fixed.clear.get(stage)
    }

    /// Packed partition offset of the stored sequence blob
    #[must_use]
    pub fn sequence_offset(&self) -> u64 {
        self.fixed.sequence_offset
    }

    /// Packed partition offset of the stored source blob
    #[must_use]
    pub fn source_offset(&self) -> u64 {
        self.fixed.source_offset
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_accessors() -> Result<()> {
        let mut rec = FragRecord::new();
        rec.set_read_index(3);
        rec.set_accession(9_000_001);
        rec.set_read_type(ReadType::Sts);
        rec.set_sequence(b"ACGT", Some(b"5566".as_slice()));
        rec.set_source(b"sts marker");
        rec.set_clear_region(ClearStage::Original, 0, 4)?;

        assert_eq!(rec.read_index(), 3);
        assert_eq!(rec.accession(), 9_000_001);
        assert_eq!(rec.read_type(), ReadType::Sts);
        assert!(rec.has_quality());
        assert_eq!(rec.quality(), b"5566");
        assert_eq!(rec.clear_region(ClearStage::Latest), ClearRange::new(0, 4));

        rec.set_sequence(b"AC", None);
        assert!(!rec.has_quality());
        assert!(rec.quality().is_empty());

        rec.clear();
        assert_eq!(rec, FragRecord::new());
        Ok(())
    }

    #[test]
    fn test_screen_match_chain() {
        let mut rec = FragRecord::new();
        let matches = [1, 2, 3].map(|id| ScreenMatch {
            repeat_id: id,
            ..Default::default()
        });
        rec.set_screen_matches(&matches);
        assert_eq!(rec.fixed().screen_match_count, 3);

        let links = rec
            .screen_match_chain()
            .map(|(screen, next)| (screen.repeat_id, next.map(|n| n.repeat_id)))
            .collect::<Vec<_>>();
        assert_eq!(links, vec![(1, Some(2)), (2, Some(3)), (3, None)]);
    }
}
