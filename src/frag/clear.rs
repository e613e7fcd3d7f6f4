use crate::error::{FragError, Result};

/// Trimming stage of a clear range, in increasing order of precedence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ClearStage {
    /// The range supplied with the read
    Original,
    /// Set by overlap-based trimming
    Ovl,
    /// Set by consensus
    Cns,
    /// Set by scaffolding
    Cgw,
    /// Resolves to the highest stage that has been set; read-only
    Latest,
}
impl ClearStage {
    const SETTABLE: [Self; 4] = [Self::Original, Self::Ovl, Self::Cns, Self::Cgw];

    fn slot(self) -> Option<usize> {
        match self {
            Self::Original => Some(0),
            Self::Ovl => Some(1),
            Self::Cns => Some(2),
            Self::Cgw => Some(3),
            Self::Latest => None,
        }
    }
}

/// Half-open interval `[start, end)` of usable sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClearRange {
    pub start: u32,
    pub end: u32,
}
impl ClearRange {
    #[must_use]
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The four clear ranges of a read
///
/// Writing the original range copies it into every later stage that has not been
/// set explicitly. Writing a later stage stores only that stage's value and marks
/// it, and every later stage below it, as set. The original range never has an
/// explicit flag and is never overwritten by later stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClearRanges {
    ranges: [ClearRange; 4],
    /// Explicit flags of Ovl, Cns and Cgw
    explicit: [bool; 3],
}
impl ClearRanges {
    pub(crate) fn from_raw(ranges: [ClearRange; 4], explicit: [bool; 3]) -> Self {
        Self { ranges, explicit }
    }

    pub(crate) fn raw_ranges(&self) -> &[ClearRange; 4] {
        &self.ranges
    }

    /// Returns the range of `stage`, resolving [`ClearStage::Latest`].
    #[must_use]
    pub fn get(&self, stage: ClearStage) -> ClearRange {
        let stage = if stage == ClearStage::Latest {
            self.latest_stage()
        } else {
            stage
        };
        stage.slot().map_or(self.ranges[0], |slot| self.ranges[slot])
    }

    /// Writes the range of `stage`.
    ///
    /// # Errors
    ///
    /// Returns [`FragError::InvalidStageForSet`] for [`ClearStage::Latest`].
    pub fn set(&mut self, stage: ClearStage, range: ClearRange) -> Result<()> {
        let Some(slot) = stage.slot() else {
            return Err(FragError::InvalidStageForSet.into());
        };
        self.ranges[slot] = range;
        if slot == 0 {
            for later in 1..4 {
                if !self.explicit[later - 1] {
                    self.ranges[later] = range;
                }
            }
        } else {
            self.explicit[..slot].fill(true);
        }
        Ok(())
    }

    /// Returns true if `stage` has been written explicitly. The original stage never is.
    #[must_use]
    pub fn is_set(&self, stage: ClearStage) -> bool {
        match stage.slot() {
            Some(slot) if slot > 0 => self.explicit[slot - 1],
            _ => false,
        }
    }

    /// The highest stage written explicitly, or [`ClearStage::Original`]
    #[must_use]
    pub fn latest_stage(&self) -> ClearStage {
        ClearStage::SETTABLE
            .into_iter()
            .rev()
            .find(|&stage| self.is_set(stage))
            .unwrap_or(ClearStage::Original)
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_original_cascades() -> Result<()> {
        let mut clear = ClearRanges::default();
        clear.set(ClearStage::Original, ClearRange::new(10, 90))?;
        for stage in ClearStage::SETTABLE {
            assert_eq!(clear.get(stage), ClearRange::new(10, 90));
        }
        assert_eq!(clear.latest_stage(), ClearStage::Original);
        assert_eq!(clear.get(ClearStage::Latest), ClearRange::new(10, 90));
        Ok(())
    }

    #[test]
    fn test_latest_resolves_highest_set_stage() -> Result<()> {
        let mut clear = ClearRanges::default();
        clear.set(ClearStage::Original, ClearRange::new(0, 100))?;

        clear.set(ClearStage::Cns, ClearRange::new(20, 80))?;
        assert_eq!(clear.latest_stage(), ClearStage::Cns);
        assert_eq!(clear.get(ClearStage::Latest), ClearRange::new(20, 80));
        // only the written stage changes, lower stages are marked as set
        assert_eq!(clear.get(ClearStage::Cgw), ClearRange::new(0, 100));
        assert_eq!(clear.get(ClearStage::Ovl), ClearRange::new(0, 100));
        assert!(clear.is_set(ClearStage::Ovl));
        assert!(!clear.is_set(ClearStage::Cgw));

        // a lower stage written later does not outrank a higher one
        clear.set(ClearStage::Ovl, ClearRange::new(5, 95))?;
        assert_eq!(clear.get(ClearStage::Latest), ClearRange::new(20, 80));
        assert_eq!(clear.get(ClearStage::Cns), ClearRange::new(20, 80));

        clear.set(ClearStage::Cgw, ClearRange::new(30, 70))?;
        assert_eq!(clear.latest_stage(), ClearStage::Cgw);
        assert_eq!(clear.get(ClearStage::Latest), ClearRange::new(30, 70));
        Ok(())
    }

    #[test]
    fn test_later_stages_keep_the_original_default() -> Result<()> {
        let mut clear = ClearRanges::default();
        clear.set(ClearStage::Original, ClearRange::new(0, 100))?;
        clear.set(ClearStage::Ovl, ClearRange::new(5, 95))?;

        assert_eq!(clear.get(ClearStage::Ovl), ClearRange::new(5, 95));
        assert_eq!(clear.get(ClearStage::Cns), ClearRange::new(0, 100));
        assert_eq!(clear.get(ClearStage::Cgw), ClearRange::new(0, 100));
        assert_eq!(clear.get(ClearStage::Latest), ClearRange::new(5, 95));

        // the original no longer reaches the set stage, but still reaches unset ones
        clear.set(ClearStage::Original, ClearRange::new(10, 90))?;
        assert_eq!(clear.get(ClearStage::Ovl), ClearRange::new(5, 95));
        assert_eq!(clear.get(ClearStage::Cns), ClearRange::new(10, 90));
        assert_eq!(clear.get(ClearStage::Latest), ClearRange::new(5, 95));
        Ok(())
    }

    #[test]
    fn test_original_is_invariant() -> Result<()> {
        let mut clear = ClearRanges::default();
        clear.set(ClearStage::Original, ClearRange::new(1, 50))?;
        for stage in [ClearStage::Ovl, ClearStage::Cns, ClearStage::Cgw] {
            clear.set(stage, ClearRange::new(2, 40))?;
            assert_eq!(clear.get(ClearStage::Original), ClearRange::new(1, 50));
        }

        // rewriting the original keeps explicitly set stages
        clear.set(ClearStage::Original, ClearRange::new(0, 60))?;
        assert_eq!(clear.get(ClearStage::Original), ClearRange::new(0, 60));
        assert_eq!(clear.get(ClearStage::Ovl), ClearRange::new(2, 40));
        Ok(())
    }

    #[test]
    fn test_latest_is_not_settable() {
        let mut clear = ClearRanges::default();
        assert!(matches!(
            clear.set(ClearStage::Latest, ClearRange::new(0, 1)),
            Err(Error::FragError(FragError::InvalidStageForSet))
        ));
        assert_eq!(clear, ClearRanges::default());
    }
}
