//! # Record Codecs
//!
//! ## Sequence/quality byte
//!
//! Every base and its quality value pack into a single byte:
//!
//! ```text
//!  7   6   5   4   3   2   1   0
//! +-------+-----------------------+
//! | base  | quality value         |
//! +-------+-----------------------+
//! ```
//!
//! * bits 7-6: base, `A = 0`, `C = 1`, `T = 2`, `G = 3`
//! * bits 5-0: quality value in `0..=60`, or [`NO_CALL`] (`63`) for an `N`
//!
//! Quality characters are `'0' + qv`. A no-call decodes to `N` with quality `'0'`;
//! the quality character given for an `N` is validated but not stored.
//! Reads stored without quality encode every called base with quality value 0 and
//! decode to an empty quality string.
//!
//! ## Source blob
//!
//! ```text
//! +-------------+-----+---------------------------+------------------------+
//! | source text | NUL | screen matches (28B each) | locale (0, 8 or 16 B)  |
//! +-------------+-----+---------------------------+------------------------+
//! ```
//!
//! The number of screen matches lives in the fixed record, and the locale layout
//! is determined by the read type, so both sections are sized without markers.

use byteorder::{ByteOrder, LittleEndian};

use super::record::{Locale, LocaleLayout, ScreenMatch, SCREEN_MATCH_SIZE};
use crate::error::{CodecError, Result};

/// Width of the quality field
pub const QUALITY_BITS: u32 = 6;

/// Highest encodable quality value
pub const MAX_QUALITY: u8 = 60;

/// Quality value reserved for a base without a call
pub const NO_CALL: u8 = 0x3F;

/// ASCII offset of quality characters
pub const QUALITY_OFFSET: u8 = b'0';

const QUALITY_MASK: u8 = (1 << QUALITY_BITS) - 1;

/// Symbols in encoding order
const SYMBOLS: [u8; 4] = [b'A', b'C', b'T', b'G'];

#[inline]
fn symbol_code(base: u8) -> Option<u8> {
    match base {
        b'A' => Some(0),
        b'C' => Some(1),
        b'T' => Some(2),
        b'G' => Some(3),
        _ => None,
    }
}

/// Returns true if `base` can be encoded without applying a policy
#[inline]
#[must_use]
pub fn is_encodable(base: u8) -> bool {
    base == b'N' || symbol_code(base).is_some()
}

/// Packs one base and its quality value into a byte.
///
/// `N` ignores `qv` and encodes as the no-call sentinel.
pub fn encode_base(base: u8, qv: u8) -> Result<u8> {
    if base == b'N' {
        return Ok(NO_CALL);
    }
    let Some(code) = symbol_code(base) else {
        return Err(CodecError::InvalidNucleotide(base).into());
    };
    if qv > MAX_QUALITY {
        return Err(CodecError::InvalidQuality(qv.saturating_add(QUALITY_OFFSET)).into());
    }
    Ok((code << QUALITY_BITS) | qv)
}

/// Unpacks a byte into its base and quality value.
pub fn decode_base(byte: u8) -> Result<(u8, u8)> {
    let qv = byte & QUALITY_MASK;
    if qv == NO_CALL {
        // the symbol field of a no-call is always zero
        if byte != NO_CALL {
            return Err(CodecError::InvalidSymbol(byte).into());
        }
        return Ok((b'N', 0));
    }
    if qv > MAX_QUALITY {
        return Err(CodecError::InvalidSymbol(byte).into());
    }
    Ok((SYMBOLS[(byte >> QUALITY_BITS) as usize], qv))
}

/// Encodes a sequence and optional quality string, appending one byte per base to `out`.
///
/// # Errors
///
/// * [`CodecError::LengthMismatch`] if the quality string has a different length
/// * [`CodecError::InvalidNucleotide`] for bytes other than `A`, `C`, `G`, `T`, `N`
/// * [`CodecError::InvalidQuality`] for quality characters outside `'0'..='0' + 60`
///
/// An `N` always encodes as [`NO_CALL`], so its quality character is lost and
/// decodes as `'0'`.
pub fn encode_sequence(sequence: &[u8], quality: Option<&[u8]>, out: &mut Vec<u8>) -> Result<()> {
    out.reserve(sequence.len());
    match quality {
        Some(quality) => {
            if quality.len() != sequence.len() {
                return Err(CodecError::LengthMismatch {
                    sequence: sequence.len(),
                    quality: quality.len(),
                }
                .into());
            }
            for (&base, &q) in sequence.iter().zip(quality) {
                let Some(qv) = q.checked_sub(QUALITY_OFFSET) else {
                    return Err(CodecError::InvalidQuality(q).into());
                };
                if qv > MAX_QUALITY {
                    return Err(CodecError::InvalidQuality(q).into());
                }
                out.push(encode_base(base, qv)?);
            }
        }
        None => {
            for &base in sequence {
                out.push(encode_base(base, 0)?);
            }
        }
    }
    Ok(())
}

/// Decodes a packed sequence into ASCII bases and, if `with_quality`, quality characters.
///
/// Both output buffers are cleared first; `quality` stays empty without quality.
pub fn decode_sequence(
    encoded: &[u8],
    with_quality: bool,
    sequence: &mut Vec<u8>,
    quality: &mut Vec<u8>,
) -> Result<()> {
    sequence.clear();
    quality.clear();
    sequence.reserve(encoded.len());
    if with_quality {
        quality.reserve(encoded.len());
    }
    for &byte in encoded {
        let (base, qv) = decode_base(byte)?;
        sequence.push(base);
        if with_quality {
            quality.push(qv + QUALITY_OFFSET);
        }
    }
    Ok(())
}

/// Size of the blob [`pack_source`] builds for a text of `text_len` bytes
#[must_use]
pub fn source_blob_len(text_len: usize, num_matches: usize, layout: LocaleLayout) -> usize {
    text_len + 1 + num_matches * SCREEN_MATCH_SIZE + layout.size()
}

/// Builds a source blob into `out` (cleared first).
pub fn pack_source(
    text: &[u8],
    matches: &[ScreenMatch],
    locale: Option<&Locale>,
    layout: LocaleLayout,
    out: &mut Vec<u8>,
) {
    out.clear();
    out.reserve(source_blob_len(text.len(), matches.len(), layout));
    out.extend_from_slice(text);
    out.push(0);
    for screen in matches {
        out.extend_from_slice(&screen.to_bytes());
    }
    if layout == LocaleLayout::None {
        return;
    }
    let locale = locale.copied().unwrap_or_default();
    let mut buf = [0u8; 8];
    LittleEndian::write_u64(&mut buf, locale.id);
    out.extend_from_slice(&buf);
    if layout == LocaleLayout::IdAndPosition {
        LittleEndian::write_u32(&mut buf[..4], locale.start);
        LittleEndian::write_u32(&mut buf[4..], locale.end);
        out.extend_from_slice(&buf);
    }
}

/// The parts of an unpacked source blob
pub struct SourceParts<'a> {
    pub text: &'a [u8],
    pub matches: Vec<ScreenMatch>,
    pub locale: Option<Locale>,
}

/// Splits a source blob back into text, screen matches and locale.
pub fn unpack_source(blob: &[u8], num_matches: usize, layout: LocaleLayout) -> Result<SourceParts<'_>> {
    let trailer = num_matches * SCREEN_MATCH_SIZE + layout.size();
    if blob.len() < trailer + 1 {
        return Err(CodecError::CorruptSource("blob shorter than its annotations").into());
    }
    let text_end = blob.len() - trailer - 1;
    if blob[text_end] != 0 {
        return Err(CodecError::CorruptSource("missing text terminator").into());
    }
    let text = &blob[..text_end];
    let mut cursor = text_end + 1;

    let matches = (0..num_matches)
        .map(|i| {
            let start = cursor + i * SCREEN_MATCH_SIZE;
            ScreenMatch::from_bytes(&blob[start..start + SCREEN_MATCH_SIZE])
        })
        .collect();
    cursor += num_matches * SCREEN_MATCH_SIZE;

    let locale = match layout {
        LocaleLayout::None => None,
        LocaleLayout::Id => Some(Locale {
            id: LittleEndian::read_u64(&blob[cursor..cursor + 8]),
            start: 0,
            end: 0,
        }),
        LocaleLayout::IdAndPosition => Some(Locale {
            id: LittleEndian::read_u64(&blob[cursor..cursor + 8]),
            start: LittleEndian::read_u32(&blob[cursor + 8..cursor + 12]),
            end: LittleEndian::read_u32(&blob[cursor + 12..cursor + 16]),
        }),
    };
    Ok(SourceParts {
        text,
        matches,
        locale,
    })
}
