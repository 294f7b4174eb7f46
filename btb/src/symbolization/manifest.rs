//! Binary manifest
//!
//! Lists the binaries whose symbols can appear in a trace, one `name: path`
//! pair per line:
//!
//! ```text
//! KERNEL:        build/kernel.elf
//! libfoo.so:     build/lib/libfoo.so
//! ```
//!
//! The name is what MAPPING records carry; the path is the ELF file to read
//! symbols from.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::domain::ResourceError;

/// A binary named in the manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryEntry {
    pub name: String,
    pub path: PathBuf,
}

/// Parsed binary manifest, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinaryManifest {
    binaries: Vec<BinaryEntry>,
}

impl BinaryManifest {
    /// Parse manifest text; `path` is only used to locate errors
    ///
    /// # Errors
    /// Returns [`ResourceError::InvalidLine`] for a line that is not a
    /// `name: path` pair, and [`ResourceError::ConflictingBinary`] when a name
    /// is listed twice with different paths.
    pub fn parse(text: &str, path: &Path) -> Result<Self, ResourceError> {
        let mut manifest = Self::default();

        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let invalid = |reason: &str| ResourceError::InvalidLine {
                path: path.to_path_buf(),
                line: i + 1,
                reason: reason.to_string(),
            };

            let (name, binary_path) =
                line.split_once(':').ok_or_else(|| invalid("expected 'name: path'"))?;
            let (name, binary_path) = (name.trim(), binary_path.trim());
            if name.is_empty() {
                return Err(invalid("binary name is empty"));
            }
            if binary_path.is_empty() {
                return Err(invalid("binary path is empty"));
            }

            match manifest.get(name) {
                Some(known) if known.path == Path::new(binary_path) => {
                    debug!("{}:{}: '{name}' listed again", path.display(), i + 1);
                }
                Some(known) => {
                    return Err(ResourceError::ConflictingBinary {
                        name: name.to_string(),
                        first: known.path.display().to_string(),
                        second: binary_path.to_string(),
                    });
                }
                None => manifest.binaries.push(BinaryEntry {
                    name: name.to_string(),
                    path: PathBuf::from(binary_path),
                }),
            }
        }

        Ok(manifest)
    }

    /// # Errors
    /// Returns [`ResourceError::Io`] if the file cannot be read, otherwise the
    /// errors of [`BinaryManifest::parse`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ResourceError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| ResourceError::io(path, e))?;
        Self::parse(&text, path)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BinaryEntry> {
        self.binaries.iter().find(|binary| binary.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BinaryEntry> {
        self.binaries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.binaries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.binaries.is_empty()
    }
}
