use rand::Rng;

use crate::error::{CodecError, Result};
use crate::frag::is_encodable;

/// Seed of the random generator used by [`Policy::RandomDraw`]
pub const RNG_SEED: u64 = 42;

/// Policy for handling sequence bytes the codec cannot encode
///
/// `A`, `C`, `G`, `T` and `N` are always stored as given; the policy decides what
/// happens to anything else when a read is appended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Policy {
    /// Reject the read
    #[default]
    BreakOnInvalid,
    /// Store the base as a no-call
    SetToN,
    /// Replace the base with a random nucleotide
    RandomDraw,
    SetToA,
    SetToC,
    SetToG,
    SetToT,
}
impl Policy {
    fn fill_with_known(sequence: &[u8], val: u8, ibuf: &mut Vec<u8>) {
        for &n in sequence {
            ibuf.push(if is_encodable(n) { n } else { val });
        }
    }

    fn fill_with_random<R: Rng>(sequence: &[u8], rng: &mut R, ibuf: &mut Vec<u8>) {
        for &n in sequence {
            ibuf.push(if is_encodable(n) {
                n
            } else {
                match rng.random_range(0..4) {
                    0 => b'A',
                    1 => b'C',
                    2 => b'G',
                    _ => b'T',
                }
            });
        }
    }

    /// Convert the sequence according to the policy
    ///
    /// First clears the input buffer to ensure that it is empty.
    ///
    /// # Arguments
    /// * `sequence` - The sequence to be converted
    /// * `ibuf` - The buffer to store the converted sequence
    /// * `rng` - The random number generator
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidNucleotide`] with the first offending byte under
    /// [`Policy::BreakOnInvalid`].
    pub fn handle<R: Rng>(&self, sequence: &[u8], ibuf: &mut Vec<u8>, rng: &mut R) -> Result<()> {
        ibuf.clear();
        match self {
            Self::BreakOnInvalid => {
                let bad = sequence
                    .iter()
                    .copied()
                    .find(|&n| !is_encodable(n))
                    .unwrap_or_default();
                Err(CodecError::InvalidNucleotide(bad).into())
            }
            Self::SetToN => {
                Self::fill_with_known(sequence, b'N', ibuf);
                Ok(())
            }
            Self::RandomDraw => {
                Self::fill_with_random(sequence, rng, ibuf);
                Ok(())
            }
            Self::SetToA => {
                Self::fill_with_known(sequence, b'A', ibuf);
                Ok(())
            }
            Self::SetToC => {
                Self::fill_with_known(sequence, b'C', ibuf);
                Ok(())
            }
            Self::SetToG => {
                Self::fill_with_known(sequence, b'G', ibuf);
                Ok(())
            }
            Self::SetToT => {
                Self::fill_with_known(sequence, b'T', ibuf);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::error::Error;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn test_policies() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(RNG_SEED);
        let mut ibuf = Vec::new();

        Policy::SetToN.handle(b"ACRYGT", &mut ibuf, &mut rng)?;
        assert_eq!(ibuf, b"ACNNGT");

        Policy::SetToG.handle(b"nACGTN", &mut ibuf, &mut rng)?;
        assert_eq!(ibuf, b"GACGTN");

        Policy::RandomDraw.handle(b"A-*T", &mut ibuf, &mut rng)?;
        assert_eq!(ibuf.len(), 4);
        assert!(ibuf.iter().all(|b| b"ACGT".contains(b)));
        assert_eq!((ibuf[0], ibuf[3]), (b'A', b'T'));
        Ok(())
    }

    #[test]
    fn test_break_on_invalid() {
        let mut rng = SmallRng::seed_from_u64(RNG_SEED);
        let mut ibuf = b"stale".to_vec();
        assert!(matches!(
            Policy::default().handle(b"ACGUT", &mut ibuf, &mut rng),
            Err(Error::CodecError(CodecError::InvalidNucleotide(b'U')))
        ));
        assert!(ibuf.is_empty());
    }
}
