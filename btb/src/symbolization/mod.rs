//! # Symbol Resolution
//!
//! Turns the raw return addresses of stack records into `` binary`symbol ``
//! labels. Resolution needs three pieces of state:
//!
//! - **Which binaries exist**: the [`BinaryManifest`] names every binary and
//!   the ELF file holding its symbols.
//! - **Where each binary's symbols are**: one [`SymbolTable`] per binary,
//!   read from the ELF symbol table or from a cache file of an earlier run.
//! - **Where and when each binary was loaded**: the [`MappingRegistry`], fed
//!   by the MAPPING records of the trace.
//!
//! ## Address Translation Flow
//!
//! ```text
//! 1. Stack record of task 7 at t=150 holds address 0x1010
//!
//! 2. Binaries of task 7 in load order, alive at t=150:
//!      KERNEL  base 0x0     [0, ∞)
//!      libfoo  base 0x1000  [100, ∞)
//!
//! 3. Query each binary's table at address - base
//!      KERNEL @ 0x1010  → no symbol
//!      libfoo @ 0x10    → foo_run [0x10, 0x30)
//!
//! 4. Exactly one hit: "libfoo`foo_run"
//!    No hit:          "7/0000000000001010"
//!    Two binaries:    AmbiguousMapping error
//! ```
//!
//! ## Module Structure
//!
//! - **`symbol_table`**: page-bucketed address index and its cache format
//! - **`symbolizer`**: ELF symbol reading, demangling, cache management
//! - **`mappings`**: per-task load history and time-aware lookup
//! - **`manifest`**: the `name: path` binary list

pub mod manifest;
pub mod mappings;
pub mod symbol_table;
pub mod symbolizer;

pub use manifest::{BinaryEntry, BinaryManifest};
pub use mappings::{Mapping, MappingRegistry, KERNEL_BINARY};
pub use symbol_table::{ElfSymbol, Symbol, SymbolTable, SymbolTables, PAGE_SIZE};
pub use symbolizer::{cache_file_name, demangle_symbol, load_symbol_table, load_symbol_tables, read_elf_symbols};
