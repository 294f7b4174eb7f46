//! Second pass: schema discovery and record decode
//!
//! ```text
//!   words ──scan──► [RawRecord] ──first INFO──► EntrySchema
//!                        │                          │
//!                        └────────── decode ◄───────┘
//!                                      │
//!                           MAPPING ───┼──► MappingRegistry (immediately)
//!                                      ▼
//!                         [Entry] sorted by tsc_time
//! ```

use btb_common::RecordType;
use log::{debug, info};

use super::buffer::TraceBuffer;
use super::entry::Entry;
use super::scan::{scan, RawRecord};
use super::schema::EntrySchema;
use crate::domain::DecodeError;
use crate::symbolization::MappingRegistry;

/// All decoded records of one buffer, in time order
#[derive(Debug, Clone, Default)]
pub struct EntryArray {
    schema: EntrySchema,
    entries: Vec<Entry>,
}

impl EntryArray {
    /// Decode every record of `buffer`
    ///
    /// MAPPING records are registered into `mappings` as they are decoded, so
    /// the registry is complete once this returns.
    ///
    /// # Errors
    /// Any structural problem of the buffer is returned as a [`DecodeError`];
    /// nothing is decoded past the first error.
    pub fn decode(buffer: &TraceBuffer, mappings: &mut MappingRegistry) -> Result<Self, DecodeError> {
        let records = scan(buffer.words())?;
        debug!("Found {} records in {} words", records.len(), buffer.len());

        let schema = discover_schema(buffer, &records)?;
        let decode_info = schema.get(RecordType::Info).is_some();

        let mut entries = Vec::with_capacity(records.len());
        for raw in &records {
            let record_type = RecordType::from_tag(raw.tag);
            if record_type == Some(RecordType::Info) && !decode_info {
                continue;
            }

            let unknown = || DecodeError::UnknownRecordType {
                tag: raw.tag,
                offset: raw.offset,
                index: raw.index,
            };
            let record_type = record_type.ok_or_else(unknown)?;
            let attributes = schema.get(record_type).ok_or_else(unknown)?;

            let entry = Entry::decode(raw, record_type, record_words(buffer, raw)?, attributes)?;
            if record_type == RecordType::Mapping {
                mappings.append(&entry)?;
            }
            entries.push(entry);
        }

        // stable: records with equal timestamps keep buffer order
        entries.sort_by_key(Entry::sort_key);

        info!("Decoded {} entries (schema version {})", entries.len(), schema.version());
        Ok(Self { schema, entries })
    }

    #[must_use]
    pub fn schema(&self) -> &EntrySchema {
        &self.schema
    }

    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a EntryArray {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn record_words<'a>(buffer: &'a TraceBuffer, raw: &RawRecord) -> Result<&'a [u64], DecodeError> {
    buffer.record(raw.offset, raw.length).ok_or(DecodeError::TruncatedBuffer {
        offset: raw.offset,
        index: raw.index,
        needed: raw.length,
        remaining: buffer.len().saturating_sub(raw.offset),
    })
}

fn discover_schema(buffer: &TraceBuffer, records: &[RawRecord]) -> Result<EntrySchema, DecodeError> {
    let info = records
        .iter()
        .find(|raw| raw.tag == RecordType::Info.tag())
        .ok_or(DecodeError::SchemaMissing)?;
    EntrySchema::decode(record_words(buffer, info)?, info.offset)
}
