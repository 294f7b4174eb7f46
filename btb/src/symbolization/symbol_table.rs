//! Page-bucketed symbol index
//!
//! A binary's symbols are filed under every 4 KiB page their address range
//! overlaps, so a lookup only scans the handful of symbols sharing the page of
//! the address:
//!
//! ```text
//!   page 0x1000 ─► [ foo [0x1000,0x1040) , bar [0x1040,0x2100) ]
//!   page 0x2000 ─► [ bar [0x1040,0x2100) , baz [0x2100,0x2200) ]
//! ```
//!
//! Tables are built once per binary, from ELF symbols or from a cache file
//! written by a previous run, and never modified afterwards.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::debug;

use super::symbolizer::demangle_symbol;
use crate::domain::{Range, ResourceError};

/// Bucket granularity of the index
pub const PAGE_SIZE: u64 = 0x1000;

/// A symbol as read from an ELF symbol table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElfSymbol {
    pub name: String,
    pub value: u64,
    pub size: u64,
}

/// One symbol of one binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// Mangled name, as stored in the binary
    pub name: String,
    /// Owning binary
    pub binary: String,
    pub range: Range,
    label: String,
}

impl Symbol {
    #[must_use]
    pub fn new(binary: &str, name: &str, range: Range) -> Self {
        let label = format!("{binary}`{}", demangle_symbol(name));
        Self { name: name.to_string(), binary: binary.to_string(), range, label }
    }

    /// `` binary`demangled_name ``
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Address → symbol index for one binary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    binary: String,
    pages: BTreeMap<u64, Vec<Symbol>>,
    symbol_count: usize,
}

impl SymbolTable {
    #[must_use]
    pub fn new(binary: &str) -> Self {
        Self { binary: binary.to_string(), ..Self::default() }
    }

    /// Build the table from ELF symbols; symbols of size 0 are dropped
    ///
    /// Symbols are filed in address order, which is also the order
    /// [`SymbolTable::export`] writes them in.
    #[must_use]
    pub fn from_elf_symbols<I>(binary: &str, symbols: I) -> Self
    where
        I: IntoIterator<Item = ElfSymbol>,
    {
        let mut symbols: Vec<ElfSymbol> = symbols.into_iter().filter(|s| s.size > 0).collect();
        symbols.sort_by_key(|s| s.value);

        let mut table = Self::new(binary);
        for symbol in symbols {
            table.insert(Symbol::new(binary, &symbol.name, Range::with_length(symbol.value, symbol.size)));
        }
        debug!("{binary}: indexed {} symbols in {} pages", table.symbol_count, table.pages.len());
        table
    }

    fn insert(&mut self, symbol: Symbol) {
        for page in symbol.range.steps(PAGE_SIZE) {
            self.pages.entry(page).or_default().push(symbol.clone());
        }
        self.symbol_count += 1;
    }

    #[must_use]
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Number of distinct symbols (not page entries)
    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.symbol_count
    }

    /// First symbol of the address's page bucket that contains the address
    #[must_use]
    pub fn find_symbol(&self, address: u64) -> Option<&Symbol> {
        let page = (address / PAGE_SIZE) * PAGE_SIZE;
        self.pages.get(&page)?.iter().find(|symbol| symbol.range.contains(address))
    }

    /// Write the table as cache lines
    ///
    /// Every symbol is written once, from the bucket of the page its range
    /// starts in, so reading the lines back rebuilds the same buckets in the
    /// same order.
    ///
    /// # Errors
    /// Propagates write errors.
    pub fn export<W: Write>(&self, mut writer: W) -> io::Result<()> {
        for (&page, symbols) in &self.pages {
            for symbol in symbols.iter().filter(|s| (s.range.start / PAGE_SIZE) * PAGE_SIZE == page) {
                writeln!(
                    writer,
                    "{}\t{:016x}\t{:016x}\t{}",
                    self.binary, symbol.range.start, symbol.range.end, symbol.name
                )?;
            }
        }
        writer.flush()
    }

    /// # Errors
    /// Returns [`ResourceError::Io`] if the file cannot be written.
    pub fn export_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ResourceError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| ResourceError::io(path, e))?;
        self.export(BufWriter::new(file)).map_err(|e| ResourceError::io(path, e))?;
        debug!("Wrote {} symbols of {} to '{}'", self.symbol_count, self.binary, path.display());
        Ok(())
    }

    /// Rebuild a table from cache lines
    ///
    /// `path` is only used to locate errors.
    ///
    /// # Errors
    /// Returns [`ResourceError::InvalidLine`] for a line that has the wrong
    /// number of columns, bad hex, or names a different binary.
    pub fn import<R: BufRead>(binary: &str, reader: R, path: &Path) -> Result<Self, ResourceError> {
        let mut table = Self::new(binary);
        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| ResourceError::io(path, e))?;
            if line.is_empty() {
                continue;
            }
            let invalid = |reason: String| ResourceError::InvalidLine {
                path: path.to_path_buf(),
                line: i + 1,
                reason,
            };

            let columns: Vec<&str> = line.splitn(4, '\t').collect();
            let [owner, start, end, name] = columns[..] else {
                return Err(invalid(format!("expected 4 tab-separated columns, got {}", columns.len())));
            };
            if owner != binary {
                return Err(invalid(format!("symbol of '{owner}' in the cache of '{binary}'")));
            }
            let parse = |text: &str| {
                u64::from_str_radix(text, 16).map_err(|e| invalid(format!("bad address '{text}': {e}")))
            };
            let range = Range::with_end(parse(start)?, parse(end)?);

            table.insert(Symbol::new(binary, name, range));
        }
        Ok(table)
    }

    /// # Errors
    /// Same as [`SymbolTable::import`], plus I/O errors opening the file.
    pub fn import_from_file<P: AsRef<Path>>(binary: &str, path: P) -> Result<Self, ResourceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| ResourceError::io(path, e))?;
        let table = Self::import(binary, BufReader::new(file), path)?;
        debug!("Read {} symbols of {binary} from '{}'", table.symbol_count, path.display());
        Ok(table)
    }
}

/// Symbol tables of every known binary, keyed by binary name
#[derive(Debug, Clone, Default)]
pub struct SymbolTables {
    tables: HashMap<String, SymbolTable>,
}

impl SymbolTables {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table, replacing any earlier table of the same binary
    pub fn insert(&mut self, table: SymbolTable) {
        self.tables.insert(table.binary.clone(), table);
    }

    #[must_use]
    pub fn get(&self, binary: &str) -> Option<&SymbolTable> {
        self.tables.get(binary)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl FromIterator<SymbolTable> for SymbolTables {
    fn from_iter<I: IntoIterator<Item = SymbolTable>>(iter: I) -> Self {
        let mut tables = Self::new();
        for table in iter {
            tables.insert(table);
        }
        tables
    }
}
