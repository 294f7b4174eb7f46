//! Read-only trace buffer
//!
//! The buffer is loaded once (read from a file, or handed over as words) and never mutated afterwards. Records are only ever accessed through
//! checked sub-slices.

use std::fs;
use std::path::Path;

use log::info;

use crate::domain::ResourceError;

const WORD_BYTES: usize = std::mem::size_of::<u64>();

/// A flat sequence of 64-bit words as produced by the kernel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceBuffer {
    words: Vec<u64>,
}

impl TraceBuffer {
    /// Wrap words that are already in memory
    #[must_use]
    pub fn from_words(words: Vec<u64>) -> Self {
        Self { words }
    }

    /// Decode little-endian words from raw bytes
    ///
    /// Returns `None` if the byte count is not a multiple of the word size.
    #[must_use]
    pub fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() % WORD_BYTES != 0 {
            return None;
        }
        let words = bytes
            .chunks_exact(WORD_BYTES)
            .map(|chunk| {
                let mut word = [0u8; WORD_BYTES];
                word.copy_from_slice(chunk);
                u64::from_le_bytes(word)
            })
            .collect();
        Some(Self { words })
    }

    /// Read a buffer file and decode its words
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is empty, or
    /// its size is not a multiple of 8 bytes.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ResourceError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| ResourceError::io(path, e))?;
        let len = bytes.len();

        if len == 0 {
            return Err(ResourceError::BufferSize {
                path: path.to_path_buf(),
                len,
                reason: "the buffer is empty",
            });
        }

        let buffer = Self::from_le_bytes(&bytes).ok_or_else(|| ResourceError::BufferSize {
            path: path.to_path_buf(),
            len,
            reason: "not a multiple of the 8-byte word size",
        })?;

        info!("Read {} words from '{}'", buffer.len(), path.display());
        Ok(buffer)
    }

    #[must_use]
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// The `length` words starting at `offset`, or `None` if that would reach
    /// past the end of the buffer
    #[must_use]
    pub fn record(&self, offset: usize, length: usize) -> Option<&[u64]> {
        let end = offset.checked_add(length)?;
        self.words.get(offset..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_le_bytes() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0x0102_0304_0506_0708u64.to_le_bytes());
        bytes.extend_from_slice(&42u64.to_le_bytes());

        let buffer = TraceBuffer::from_le_bytes(&bytes).unwrap();
        assert_eq!(buffer.words(), &[0x0102_0304_0506_0708, 42]);
    }

    #[test]
    fn test_from_le_bytes_rejects_partial_words() {
        assert!(TraceBuffer::from_le_bytes(&[0u8; 12]).is_none());
        assert!(TraceBuffer::from_le_bytes(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_record_is_bounds_checked() {
        let buffer = TraceBuffer::from_words(vec![1, 2, 3, 4]);
        assert_eq!(buffer.record(1, 2), Some(&[2u64, 3][..]));
        assert_eq!(buffer.record(0, 4).map(<[u64]>::len), Some(4));
        assert_eq!(buffer.record(2, 3), None);
        assert_eq!(buffer.record(usize::MAX, 2), None);
    }

    #[test]
    fn test_open_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&7u64.to_le_bytes()).unwrap();
        file.write_all(&9u64.to_le_bytes()).unwrap();
        file.flush().unwrap();

        let buffer = TraceBuffer::open(file.path()).unwrap();
        assert_eq!(buffer.words(), &[7, 9]);
    }

    #[test]
    fn test_open_rejects_unaligned_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[1, 2, 3]).unwrap();
        file.flush().unwrap();

        let err = TraceBuffer::open(file.path()).unwrap_err();
        assert!(matches!(err, ResourceError::BufferSize { len: 3, .. }));
    }

    #[test]
    fn test_open_rejects_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = TraceBuffer::open(file.path()).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_open_missing_file() {
        let err = TraceBuffer::open("/nonexistent/trace.btb").unwrap_err();
        assert!(matches!(err, ResourceError::Io { .. }));
    }
}
