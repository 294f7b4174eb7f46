//! Decoded records
//!
//! An [`Entry`] is one record after schema-driven decoding. The attribute words
//! the kernel declared are filed into typed slots of the variant for the
//! record's type ([`EntryBody`]); declared names without a slot are kept in
//! schema order as extra attributes. Generic renderers can still ask for any
//! attribute by its declared name through [`Entry::attribute`], which goes
//! through each variant's name table.

use btb_common::{RecordType, ENTRY_TYPE_ATTRIBUTE, HEADER_WORDS};

use super::scan::RawRecord;
use super::schema::AttributeSchema;
use crate::domain::{CpuId, DecodeError, TaskId, Timestamp};

/// Declares a set of optional, named attribute slots together with the
/// name→slot table used for lookups by declared name
macro_rules! attribute_set {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$field_meta:meta])* $field:ident),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
        pub struct $name {
            $($(#[$field_meta])* pub $field: Option<u64>,)+
        }

        impl $name {
            /// Attribute names that have a typed slot, in declaration order
            pub const NAMES: &'static [&'static str] = &[$(stringify!($field)),+];

            fn get(&self, name: &str) -> Option<u64> {
                match name {
                    $(stringify!($field) => self.$field,)+
                    _ => None,
                }
            }

            fn set(&mut self, name: &str, value: u64) -> bool {
                match name {
                    $(stringify!($field) => {
                        self.$field = Some(value);
                        true
                    })+
                    _ => false,
                }
            }

            fn present(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
                Self::NAMES.iter().filter_map(move |&name| self.get(name).map(|v| (name, v)))
            }
        }
    };
}

attribute_set! {
    /// Attributes every record type may carry
    CommonAttributes {
        /// CPU the record was captured on
        cpu_id,
        /// Start of the record in ns
        tsc_time,
        /// Duration covered by the record in ns
        tsc_duration,
    }
}

attribute_set! {
    /// `BTE_STACK` attributes
    StackAttributes {
        /// Address space the return addresses belong to
        task_id,
        /// First logical payload word when the payload is a ring buffer
        start_index,
        timer_step,
        stack_depth,
    }
}

attribute_set! {
    /// `BTE_MAPPING` attributes
    MappingAttributes {
        mapping_base,
        mapping_task_id,
    }
}

attribute_set! {
    /// `BTE_INFO` attributes
    InfoAttributes {
        version,
        type_count,
    }
}

attribute_set! {
    /// `BTE_STATS` attributes
    StatsAttributes {
        hist_bin_count,
        hist_bin_size,
    }
}

/// Type-specific part of an entry, one variant per record type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryBody {
    Stack(StackAttributes),
    Mapping(MappingAttributes),
    Info(InfoAttributes),
    Control,
    Stats(StatsAttributes),
}

impl EntryBody {
    fn new(record_type: RecordType) -> Self {
        match record_type {
            RecordType::Stack => Self::Stack(StackAttributes::default()),
            RecordType::Mapping => Self::Mapping(MappingAttributes::default()),
            RecordType::Info => Self::Info(InfoAttributes::default()),
            RecordType::Control => Self::Control,
            RecordType::Stats => Self::Stats(StatsAttributes::default()),
        }
    }

    #[must_use]
    pub fn record_type(&self) -> RecordType {
        match self {
            Self::Stack(_) => RecordType::Stack,
            Self::Mapping(_) => RecordType::Mapping,
            Self::Info(_) => RecordType::Info,
            Self::Control => RecordType::Control,
            Self::Stats(_) => RecordType::Stats,
        }
    }

    fn get(&self, name: &str) -> Option<u64> {
        match self {
            Self::Stack(attrs) => attrs.get(name),
            Self::Mapping(attrs) => attrs.get(name),
            Self::Info(attrs) => attrs.get(name),
            Self::Control => None,
            Self::Stats(attrs) => attrs.get(name),
        }
    }

    fn set(&mut self, name: &str, value: u64) -> bool {
        match self {
            Self::Stack(attrs) => attrs.set(name, value),
            Self::Mapping(attrs) => attrs.set(name, value),
            Self::Info(attrs) => attrs.set(name, value),
            Self::Control => false,
            Self::Stats(attrs) => attrs.set(name, value),
        }
    }

    fn present(&self) -> Vec<(&'static str, u64)> {
        match self {
            Self::Stack(attrs) => attrs.present().collect(),
            Self::Mapping(attrs) => attrs.present().collect(),
            Self::Info(attrs) => attrs.present().collect(),
            Self::Control => Vec::new(),
            Self::Stats(attrs) => attrs.present().collect(),
        }
    }
}

/// One decoded record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    index: usize,
    offset: usize,
    length: usize,
    attribute_count: usize,
    common: CommonAttributes,
    body: EntryBody,
    /// Declared attributes without a typed slot, in schema order
    extra: Vec<(String, u64)>,
    payload: Vec<u64>,
}

impl Entry {
    /// Decode one record
    ///
    /// `words` are the complete words of `raw` (header included); `schema` is
    /// the attribute schema for `record_type`.
    ///
    /// # Errors
    /// Returns [`DecodeError::MalformedRecord`] if the record is too short for
    /// its schema.
    pub fn decode(
        raw: &RawRecord,
        record_type: RecordType,
        words: &[u64],
        schema: &AttributeSchema,
    ) -> Result<Self, DecodeError> {
        let attributes_end = HEADER_WORDS + schema.len();
        if words.len() < attributes_end || words.len() != raw.length {
            return Err(DecodeError::MalformedRecord {
                offset: raw.offset,
                index: raw.index,
                reason: format!(
                    "{record_type} record of {} words cannot hold its {} attributes",
                    words.len(),
                    schema.len()
                ),
            });
        }

        let mut entry = Self {
            index: raw.index,
            offset: raw.offset,
            length: raw.length,
            attribute_count: schema.len(),
            common: CommonAttributes::default(),
            body: EntryBody::new(record_type),
            extra: Vec::new(),
            payload: Vec::new(),
        };

        // schema order is authoritative: the i-th name describes the i-th word
        for (name, &value) in schema.names().iter().zip(&words[HEADER_WORDS..attributes_end]) {
            entry.assign(name, value);
        }

        let physical = &words[attributes_end..];
        entry.payload = match &entry.body {
            EntryBody::Stack(StackAttributes { start_index: Some(start), .. })
                if !physical.is_empty() =>
            {
                let len = physical.len();
                // start % len < len, so this fits in usize
                let shift = usize::try_from(*start % len as u64).unwrap_or_default();
                (0..len).map(|i| physical[(i + shift) % len]).collect()
            }
            _ => physical.to_vec(),
        };

        Ok(entry)
    }

    fn assign(&mut self, name: &str, value: u64) {
        if self.common.set(name, value) || self.body.set(name, value) {
            return;
        }
        match self.extra.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = value,
            None => self.extra.push((name.to_string(), value)),
        }
    }

    #[must_use]
    pub fn record_type(&self) -> RecordType {
        self.body.record_type()
    }

    #[must_use]
    pub fn body(&self) -> &EntryBody {
        &self.body
    }

    #[must_use]
    pub fn common(&self) -> &CommonAttributes {
        &self.common
    }

    /// Ordinal of the record in the buffer
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Word offset of the record in the buffer
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Total length in words, header included
    #[must_use]
    pub fn length(&self) -> usize {
        self.length
    }

    /// Number of attribute words, `entry_type` not included
    #[must_use]
    pub fn attribute_count(&self) -> usize {
        self.attribute_count
    }

    /// Payload in logical order (ring-buffer payloads already un-rotated)
    #[must_use]
    pub fn payload(&self) -> &[u64] {
        &self.payload
    }

    /// Check whether `name` can be looked up
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Look up an attribute by its declared name
    ///
    /// `cpu_id` on an INFO record defaults to 0: INFO records predate per-CPU
    /// tagging and are attributed to CPU 0.
    ///
    /// # Errors
    /// Returns [`DecodeError::AttributeNotFound`] for a name the record does
    /// not carry.
    pub fn attribute(&self, name: &str) -> Result<u64, DecodeError> {
        self.lookup(name).ok_or_else(|| DecodeError::AttributeNotFound {
            attribute: name.to_string(),
            record_type: self.record_type(),
            timestamp: self.common.tsc_time,
            offset: self.offset,
        })
    }

    fn lookup(&self, name: &str) -> Option<u64> {
        if name == ENTRY_TYPE_ATTRIBUTE {
            return Some(self.record_type().tag());
        }
        self.common
            .get(name)
            .or_else(|| self.body.get(name))
            .or_else(|| self.extra.iter().find(|(n, _)| n == name).map(|&(_, v)| v))
            .or_else(|| (self.record_type() == RecordType::Info && name == "cpu_id").then_some(0))
    }

    /// All attributes the record carries, `entry_type` first
    #[must_use]
    pub fn attributes(&self) -> Vec<(&str, u64)> {
        let mut attributes: Vec<(&str, u64)> = vec![(ENTRY_TYPE_ATTRIBUTE, self.record_type().tag())];
        attributes.extend(self.common.present().map(|(n, v)| (n as &str, v)));
        attributes.extend(self.body.present().into_iter().map(|(n, v)| (n as &str, v)));
        attributes.extend(self.extra.iter().map(|(n, v)| (n.as_str(), *v)));
        attributes
    }

    /// # Errors
    /// Returns [`DecodeError::AttributeNotFound`] if the record has no CPU id.
    pub fn cpu_id(&self) -> Result<CpuId, DecodeError> {
        self.attribute("cpu_id").map(CpuId)
    }

    /// # Errors
    /// Returns [`DecodeError::AttributeNotFound`] if the record has no timestamp.
    pub fn tsc_time(&self) -> Result<Timestamp, DecodeError> {
        self.attribute("tsc_time").map(Timestamp)
    }

    /// # Errors
    /// Returns [`DecodeError::AttributeNotFound`] if the record has no duration.
    pub fn tsc_duration(&self) -> Result<u64, DecodeError> {
        self.attribute("tsc_duration")
    }

    /// # Errors
    /// Returns [`DecodeError::AttributeNotFound`] if the record has no task id.
    pub fn task_id(&self) -> Result<TaskId, DecodeError> {
        self.attribute("task_id").map(TaskId)
    }

    /// Same as [`Entry::tsc_time`], in ns
    ///
    /// # Errors
    /// Returns [`DecodeError::AttributeNotFound`] if the record has no timestamp.
    pub fn start_time_ns(&self) -> Result<u64, DecodeError> {
        self.attribute("tsc_time")
    }

    /// `tsc_time + tsc_duration`, in ns
    ///
    /// # Errors
    /// Returns [`DecodeError::AttributeNotFound`] if either attribute is missing.
    pub fn end_time_ns(&self) -> Result<u64, DecodeError> {
        Ok(self.start_time_ns()?.saturating_add(self.tsc_duration()?))
    }

    /// Key for the global time order; records without a timestamp sort first
    #[must_use]
    pub fn sort_key(&self) -> u64 {
        self.common.tsc_time.unwrap_or_default()
    }
}
