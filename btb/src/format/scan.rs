//! First pass: locate record boundaries
//!
//! Walks the buffer header by header without interpreting anything beyond the
//! type tag and the length. The walk ends cleanly in exactly two ways:
//!
//! - the offset lands exactly on the end of the buffer, or
//! - a record declares a length of 0 (end-of-data sentinel; whatever follows
//!   is not looked at).
//!
//! Any other ending means the buffer is cut off or corrupt, and since a wrong
//! record boundary shifts every following offset, that is fatal.

use btb_common::{HEADER_WORDS, MIN_RECORD_WORDS};
use log::debug;

use crate::domain::DecodeError;

/// A located but not yet decoded record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord {
    /// Ordinal of the record in scan order
    pub index: usize,
    /// Word offset of the type tag
    pub offset: usize,
    /// Raw type tag (word 0)
    pub tag: u64,
    /// Total length in words, header included (word 1)
    pub length: usize,
}

/// Split `words` into records
///
/// Never reads past the end of `words`.
///
/// # Errors
/// Returns [`DecodeError::TruncatedBuffer`] if the buffer ends inside a record,
/// and [`DecodeError::MalformedRecord`] for a record shorter than the minimum
/// record size.
pub fn scan(words: &[u64]) -> Result<Vec<RawRecord>, DecodeError> {
    let mut records = Vec::new();
    let mut offset = 0;

    while offset < words.len() {
        let index = records.len();
        let remaining = words.len() - offset;
        let truncated = |needed: usize| DecodeError::TruncatedBuffer { offset, index, needed, remaining };

        if remaining < HEADER_WORDS {
            return Err(truncated(HEADER_WORDS));
        }

        let tag = words[offset];
        let length = usize::try_from(words[offset + 1]).unwrap_or(usize::MAX);
        if length == 0 {
            debug!(
                "End-of-data marker at word {offset}, ignoring {} trailing words",
                remaining - HEADER_WORDS
            );
            return Ok(records);
        }
        if remaining < MIN_RECORD_WORDS {
            return Err(truncated(length.max(MIN_RECORD_WORDS)));
        }
        if length < MIN_RECORD_WORDS {
            return Err(DecodeError::MalformedRecord {
                offset,
                index,
                reason: format!(
                    "declared length {length} is below the minimum of {MIN_RECORD_WORDS} words \
                     (first words {tag:016x} {:016x} {:016x} {:016x})",
                    words[offset + 1],
                    words[offset + 2],
                    words[offset + 3],
                ),
            });
        }
        if length > remaining {
            return Err(truncated(length));
        }

        records.push(RawRecord { index, offset, tag, length });
        offset += length;
    }

    Ok(records)
}
