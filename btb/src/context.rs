//! Per-trace resolution state
//!
//! A [`TraceContext`] owns everything symbol resolution needs: the symbol
//! tables (fixed before decoding starts) and the mapping registry (filled while
//! decoding). It is passed mutably to the decoder and shared read-only with the
//! renderer afterwards.

use crate::domain::{DecodeError, ResolveError, TaskId};
use crate::format::{EntryArray, TraceBuffer};
use crate::symbolization::{MappingRegistry, SymbolTables};

#[derive(Debug, Clone, Default)]
pub struct TraceContext {
    pub mappings: MappingRegistry,
    pub symbols: SymbolTables,
}

impl TraceContext {
    #[must_use]
    pub fn new(symbols: SymbolTables) -> Self {
        Self { mappings: MappingRegistry::new(), symbols }
    }

    /// Decode `buffer`, registering its mappings into this context
    ///
    /// # Errors
    /// See [`EntryArray::decode`].
    pub fn decode(&mut self, buffer: &TraceBuffer) -> Result<EntryArray, DecodeError> {
        EntryArray::decode(buffer, &mut self.mappings)
    }

    /// Label of `address` in `task` at `time`
    ///
    /// # Errors
    /// Returns [`ResolveError::AmbiguousMapping`] if two binaries claim the
    /// address.
    pub fn lookup_symbol(&self, task: TaskId, address: u64, time: u64) -> Result<String, ResolveError> {
        self.mappings.lookup_symbol(&self.symbols, task, address, time)
    }

    /// Binaries loaded into `task`, for dumps
    #[must_use]
    pub fn task_binaries(&self, task: TaskId) -> String {
        self.mappings.task_binaries(task)
    }
}
