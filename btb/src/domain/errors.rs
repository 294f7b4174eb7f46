//! Structured error types for btb
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Every buffer-level error carries the word offset it was detected at and,
//! where known, the ordinal of the record, so a broken buffer can be located
//! without a hex editor.

use std::path::PathBuf;

use btb_common::RecordType;
use thiserror::Error;

use super::types::TaskId;

/// Errors while scanning and decoding a trace buffer
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("bad name encoding at word {offset}: {reason}")]
    Format { offset: usize, reason: String },

    #[error(
        "buffer does not end on a record boundary: record {index} at word {offset} \
         needs {needed} words but only {remaining} remain"
    )]
    TruncatedBuffer { offset: usize, index: usize, needed: usize, remaining: usize },

    #[error("malformed record {index} at word {offset}: {reason}")]
    MalformedRecord { offset: usize, index: usize, reason: String },

    #[error("no BTE_INFO record in buffer, no record type can be decoded without its schema")]
    SchemaMissing,

    #[error("record {index} at word {offset} has type tag {tag:#x}, which has no schema")]
    UnknownRecordType { tag: u64, offset: usize, index: usize },

    #[error(
        "access to attribute '{attribute}' in record of type {record_type} \
         with timestamp {} at word {offset} is invalid",
        .timestamp.map_or_else(|| "<none>".to_string(), |t| t.to_string())
    )]
    AttributeNotFound {
        attribute: String,
        record_type: RecordType,
        timestamp: Option<u64>,
        offset: usize,
    },
}

/// Errors while resolving an address to a symbol
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(
        "both '{first_binary}' and '{second_binary}' map {address:016x} in {task} \
         ({first_label} and {second_label})"
    )]
    AmbiguousMapping {
        task: TaskId,
        address: u64,
        first_binary: String,
        first_label: String,
        second_binary: String,
        second_label: String,
    },
}

/// Errors reading external resources: buffer files, ELF files, symbol caches
/// and the binary manifest
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("failed to access '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse ELF file '{}': {reason}", .path.display())]
    Elf { path: PathBuf, reason: String },

    #[error("{}:{line}: {reason}", .path.display())]
    InvalidLine { path: PathBuf, line: usize, reason: String },

    #[error(
        "binary '{name}' is listed with path '{first}' and also with path '{second}'"
    )]
    ConflictingBinary { name: String, first: String, second: String },

    #[error("trace buffer '{}' is {len} bytes, {reason}", .path.display())]
    BufferSize { path: PathBuf, len: usize, reason: &'static str },

    #[error("output file '{}' does not end in {expected}", .path.display())]
    OutputName { path: PathBuf, expected: String },
}

impl ResourceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// Errors while rendering decoded entries
#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "cannot render {record_type} record {index} at word {offset} with timestamp {}",
        .timestamp.map_or_else(|| "<none>".to_string(), |t| t.to_string())
    )]
    Entry {
        record_type: RecordType,
        index: usize,
        offset: usize,
        timestamp: Option<u64>,
        #[source]
        source: Box<RenderError>,
    },
}

impl RenderError {
    /// Innermost error, below any record context
    #[must_use]
    pub fn root(&self) -> &RenderError {
        match self {
            Self::Entry { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_not_found_display() {
        let err = DecodeError::AttributeNotFound {
            attribute: "task_id".to_string(),
            record_type: RecordType::Stack,
            timestamp: Some(100),
            offset: 12,
        };
        let msg = err.to_string();
        assert!(msg.contains("'task_id'"));
        assert!(msg.contains("[1 BTE_STACK]"));
        assert!(msg.contains("timestamp 100"));
        assert!(msg.contains("word 12"));
    }

    #[test]
    fn test_attribute_not_found_without_timestamp() {
        let err = DecodeError::AttributeNotFound {
            attribute: "cpu_id".to_string(),
            record_type: RecordType::Mapping,
            timestamp: None,
            offset: 0,
        };
        assert!(err.to_string().contains("timestamp <none>"));
    }

    #[test]
    fn test_ambiguous_mapping_display() {
        let err = ResolveError::AmbiguousMapping {
            task: TaskId(1),
            address: 0x1010,
            first_binary: "liba".to_string(),
            first_label: "liba`f".to_string(),
            second_binary: "libb".to_string(),
            second_label: "libb`g".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'liba'"));
        assert!(msg.contains("'libb'"));
        assert!(msg.contains("0000000000001010"));
        assert!(msg.contains("task 1"));
    }

    #[test]
    fn test_render_error_is_transparent() {
        let err: RenderError = DecodeError::SchemaMissing.into();
        assert_eq!(err.to_string(), DecodeError::SchemaMissing.to_string());
    }

    #[test]
    fn test_render_error_names_record() {
        let err = RenderError::Entry {
            record_type: RecordType::Stack,
            index: 4,
            offset: 31,
            timestamp: Some(200),
            source: Box::new(DecodeError::SchemaMissing.into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("record 4 at word 31"));
        assert!(msg.contains("timestamp 200"));
        assert!(matches!(err.root(), RenderError::Decode(DecodeError::SchemaMissing)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
