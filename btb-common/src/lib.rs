//! # Backtrace Buffer Wire Format (Kernel ↔ Userspace)
//!
//! Defines the constants and tag types shared between the kernel-side backtrace
//! buffer (BTB) producer and the userspace interpreter. Everything here describes
//! the on-disk/in-memory layout; nothing here interprets it.
//!
//! ## Record Layout
//!
//! A buffer is a flat array of little-endian 64-bit words holding consecutive
//! records:
//!
//! ```text
//! ┌──────────┬────────────┬──────────────────────┬───────────────────┐
//! │ type tag │ length (w) │ attributes (schema)  │ payload ...       │
//! └──────────┴────────────┴──────────────────────┴───────────────────┘
//!   word 0      word 1      N words                length - 2 - N
//! ```
//!
//! The attribute names for every record type are themselves stored in the buffer,
//! inside the first [`RecordType::Info`] record.
//!
//! ## Key Types
//!
//! - [`RecordType`] - One bit of the record-type bitset
//! - [`is_attribute_name_char`] / [`is_mapping_name_char`] - Name charsets

#![no_std]

use core::fmt;

// ============================================================================
// Layout Constants
// ============================================================================

/// Words every record starts with: type tag and total length.
pub const HEADER_WORDS: usize = 2;

/// Shortest legal record, in words.
///
/// Every record carries its header plus two producer-defined words.
pub const MIN_RECORD_WORDS: usize = 4;

/// Words used to store one attribute name (16 bytes, NUL-padded).
pub const WORDS_PER_ATTRIBUTE_NAME: usize = 2;

/// Bytes available to one attribute name, terminator included.
pub const ATTRIBUTE_NAME_BYTES: usize = WORDS_PER_ATTRIBUTE_NAME * 8;

/// Schema version written by an early producer that inserted one padding word
/// between the type count and the descriptor lengths.
pub const LEGACY_SCHEMA_VERSION: u64 = 2;

/// Number of record types the bitset can describe.
pub const RECORD_TYPE_COUNT: usize = 5;

/// Name of the implicit attribute at schema position 0.
pub const ENTRY_TYPE_ATTRIBUTE: &str = "entry_type";

// ============================================================================
// Record Types
// ============================================================================

/// Record type tag, one bit of a fixed bitset
///
/// The numeric value is what the producer writes into word 0 of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u64)]
pub enum RecordType {
    /// Stack sample (payload: return addresses, leaf first)
    Stack = 1 << 0,
    /// Library load event (payload: NUL-terminated binary name)
    Mapping = 1 << 1,
    /// Buffer description, holds the attribute schema of all other types
    Info = 1 << 2,
    /// Start/stop/reset marker
    Control = 1 << 3,
    /// Histogram of time by stack depth
    Stats = 1 << 4,
}

impl RecordType {
    /// All record types in bit order.
    pub const ALL: [RecordType; RECORD_TYPE_COUNT] =
        [Self::Stack, Self::Mapping, Self::Info, Self::Control, Self::Stats];

    /// Map a raw tag to a record type. Returns `None` for anything that is not
    /// exactly one known bit.
    #[must_use]
    pub fn from_tag(tag: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.tag() == tag)
    }

    /// Record type for bit position `index` (`1 << index`).
    #[must_use]
    pub fn from_bit_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Raw tag as written by the producer.
    #[must_use]
    pub const fn tag(self) -> u64 {
        self as u64
    }

    /// Producer-side name (`BTE_STACK`, ...).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Stack => "BTE_STACK",
            Self::Mapping => "BTE_MAPPING",
            Self::Info => "BTE_INFO",
            Self::Control => "BTE_CONTROL",
            Self::Stats => "BTE_STATS",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}]", self.tag(), self.name())
    }
}

// ============================================================================
// Name Charsets
// ============================================================================

/// Strict identifier charset for attribute names: `[a-z0-9_]`.
#[must_use]
pub const fn is_attribute_name_char(c: u8) -> bool {
    matches!(c, b'_' | b'a'..=b'z' | b'0'..=b'9')
}

/// Extended charset for binary names in mapping payloads: `[a-z0-9_./+-]`.
#[must_use]
pub const fn is_mapping_name_char(c: u8) -> bool {
    is_attribute_name_char(c) || matches!(c, b'.' | b'/' | b'-' | b'+')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_type_tags() {
        assert_eq!(RecordType::Stack.tag(), 1);
        assert_eq!(RecordType::Mapping.tag(), 2);
        assert_eq!(RecordType::Info.tag(), 4);
        assert_eq!(RecordType::Control.tag(), 8);
        assert_eq!(RecordType::Stats.tag(), 16);
    }

    #[test]
    fn test_from_tag_rejects_combined_bits() {
        assert_eq!(RecordType::from_tag(4), Some(RecordType::Info));
        assert_eq!(RecordType::from_tag(3), None);
        assert_eq!(RecordType::from_tag(0), None);
        assert_eq!(RecordType::from_tag(1 << 5), None);
    }

    #[test]
    fn test_from_bit_index() {
        assert_eq!(RecordType::from_bit_index(1), Some(RecordType::Mapping));
        assert_eq!(RecordType::from_bit_index(5), None);
    }

    #[test]
    fn test_charsets() {
        assert!(is_attribute_name_char(b'a'));
        assert!(is_attribute_name_char(b'_'));
        assert!(!is_attribute_name_char(b'A'));
        assert!(!is_attribute_name_char(b'.'));
        assert!(is_mapping_name_char(b'.'));
        assert!(is_mapping_name_char(b'+'));
        assert!(!is_mapping_name_char(b' '));
        assert!(!is_mapping_name_char(0));
    }
}
