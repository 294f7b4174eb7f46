//! Self-describing record schema
//!
//! The kernel does not hard-code the attribute layout of its records. Instead,
//! the first `BTE_INFO` record of every buffer lists, per record type, the
//! names of the attribute words that follow each record header:
//!
//! ```text
//! word  0      1       2         [3]       3+p        4+p .. 4+p+N   ...
//!     ┌─────┬────────┬─────────┬─────────┬──────────┬──────────────┬──────────────┐
//!     │ tag │ length │ version │ padding │ type cnt │ N lengths    │ name blocks  │
//!     └─────┴────────┴─────────┴─────────┴──────────┴──────────────┴──────────────┘
//!                               (only for version 2, p = 1)
//! ```
//!
//! Each length counts attribute names for record type `1 << i`; each name takes
//! two words of NUL-padded ASCII. A length of zero means the producer has no
//! descriptor for that type yet.

use std::collections::BTreeMap;

use btb_common::{
    is_attribute_name_char, RecordType, ENTRY_TYPE_ATTRIBUTE, HEADER_WORDS,
    LEGACY_SCHEMA_VERSION, RECORD_TYPE_COUNT, WORDS_PER_ATTRIBUTE_NAME,
};
use log::debug;

use crate::domain::DecodeError;

/// Decode a NUL-terminated name stored in `words`
///
/// The name must be non-empty, every byte before the terminator must pass
/// `is_valid`, and the terminator must lie within the words. `offset` is the
/// buffer word offset of `words`, used for error reporting.
///
/// # Errors
/// Returns [`DecodeError::Format`] when any of the above does not hold.
pub fn decode_name(
    words: &[u64],
    offset: usize,
    is_valid: fn(u8) -> bool,
) -> Result<String, DecodeError> {
    let bytes: Vec<u8> = words.iter().flat_map(|word| word.to_le_bytes()).collect();
    let format_error = |reason: String| DecodeError::Format { offset, reason };

    for (j, &c) in bytes.iter().enumerate() {
        if c == 0 {
            if j == 0 {
                return Err(format_error("name is empty".to_string()));
            }
            // every byte before j passed is_valid, so this is plain ASCII
            return Ok(bytes[..j].iter().map(|&b| char::from(b)).collect());
        }
        if !is_valid(c) {
            return Err(format_error(format!(
                "encountered char {:?} ({c}) as byte {j} of {} in name, first word {:016x}",
                char::from(c),
                bytes.len(),
                words.first().copied().unwrap_or_default(),
            )));
        }
    }

    Err(format_error(format!("name is not NUL-terminated within {} bytes", bytes.len())))
}

/// Ordered attribute names for one record type
///
/// Position 0 is the implicit `entry_type` and is not stored here; `names()[0]`
/// describes the first word after the record header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSchema {
    names: Vec<String>,
}

impl AttributeSchema {
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    fn decode(words: &[u64], offset: usize) -> Result<Self, DecodeError> {
        let names = words
            .chunks_exact(WORDS_PER_ATTRIBUTE_NAME)
            .enumerate()
            .map(|(i, chunk)| {
                let name_offset = offset + i * WORDS_PER_ATTRIBUTE_NAME;
                let name = decode_name(chunk, name_offset, is_attribute_name_char)?;
                if name == ENTRY_TYPE_ATTRIBUTE {
                    return Err(DecodeError::Format {
                        offset: name_offset,
                        reason: format!("'{ENTRY_TYPE_ATTRIBUTE}' is implicit and must not be stored"),
                    });
                }
                Ok(name)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { names })
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of stored attribute words
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

/// Attribute layout of every record type in one buffer
///
/// Built exactly once from the first `BTE_INFO` record, immutable afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntrySchema {
    version: u64,
    schemas: BTreeMap<RecordType, AttributeSchema>,
}

impl EntrySchema {
    /// Build a schema directly, e.g. for tests or synthetic buffers
    #[must_use]
    pub fn from_parts(version: u64, schemas: BTreeMap<RecordType, AttributeSchema>) -> Self {
        Self { version, schemas }
    }

    /// Decode the schema from the complete words of an INFO record
    ///
    /// `offset` is the word offset of the record in the buffer.
    ///
    /// # Errors
    /// Returns [`DecodeError::Format`] if the layout overruns the record or a
    /// name is badly encoded.
    pub fn decode(record: &[u64], offset: usize) -> Result<Self, DecodeError> {
        let body = record.get(HEADER_WORDS..).unwrap_or_default();
        let body_offset = offset + HEADER_WORDS;
        let overrun = |at: usize, what: &str| DecodeError::Format {
            offset: body_offset + at,
            reason: format!("{what} continue after the end of the {}-word INFO record", record.len()),
        };

        let mut cursor = 0;
        let version = *body.get(cursor).ok_or_else(|| overrun(cursor, "schema version would"))?;
        cursor += 1;

        let type_count = *body.get(cursor).ok_or_else(|| overrun(cursor, "type count would"))?;
        let type_count = usize::try_from(type_count)
            .ok()
            .filter(|&n| n <= RECORD_TYPE_COUNT)
            .ok_or_else(|| DecodeError::Format {
                offset: body_offset + cursor,
                reason: format!(
                    "type count {type_count} exceeds the {RECORD_TYPE_COUNT} known record types"
                ),
            })?;
        cursor += 1;
        if version == LEGACY_SCHEMA_VERSION {
            // one padding word between the type count and the lengths
            cursor += 1;
        }

        let lengths = body
            .get(cursor..cursor + type_count)
            .ok_or_else(|| overrun(cursor, "descriptor lengths"))?;
        cursor += type_count;

        let mut schemas = BTreeMap::new();
        for (i, &length) in lengths.iter().enumerate() {
            if length == 0 {
                // no descriptor yet for this record type
                continue;
            }
            let Some(record_type) = RecordType::from_bit_index(i) else { continue };

            let words = usize::try_from(length)
                .ok()
                .and_then(|n| n.checked_mul(WORDS_PER_ATTRIBUTE_NAME))
                .and_then(|n| Some(cursor..cursor.checked_add(n)?))
                .and_then(|range| body.get(range))
                .ok_or_else(|| overrun(cursor, "descriptor names"))?;

            let schema = AttributeSchema::decode(words, body_offset + cursor)?;
            debug!("{record_type} has attributes {:?}", schema.names());
            cursor += words.len();
            schemas.insert(record_type, schema);
        }

        Ok(Self { version, schemas })
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn get(&self, record_type: RecordType) -> Option<&AttributeSchema> {
        self.schemas.get(&record_type)
    }

    /// Record types that have a descriptor, in bit order
    pub fn record_types(&self) -> impl Iterator<Item = RecordType> + '_ {
        self.schemas.keys().copied()
    }
}
