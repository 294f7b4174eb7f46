//! Time-aware address space model
//!
//! MAPPING records announce that a binary was loaded into a task at some base
//! address from some point in time on. The registry keeps, per task, the
//! binaries in load order, so a stack address captured at time `t` can be
//! matched against exactly the binaries that were present at `t`:
//!
//! ```text
//!   task 7:  KERNEL   base 0        [0,   ∞)
//!            libfoo   base 0x1000   [100, ∞)
//!            libbar   base 0x8000   [250, ∞)
//!
//!   (7, 0x1010, t=150)  →  libfoo table @ 0x10
//! ```
//!
//! Every task implicitly has the kernel mapped at base 0 for its whole life.
//! Unloads are not recorded, so lifetimes never end.

use std::collections::{BTreeMap, HashMap};

use btb_common::{is_mapping_name_char, RecordType};
use log::{debug, warn};

use super::symbol_table::{Symbol, SymbolTables};
use crate::domain::{DecodeError, Range, ResolveError, TaskId};
use crate::format::{decode_name, Entry};

/// Name of the synthetic mapping every task starts with
pub const KERNEL_BINARY: &str = "KERNEL";

/// A binary loaded into a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub binary: String,
    pub base: u64,
    pub task: TaskId,
    pub lifetime: Range,
}

impl Mapping {
    fn kernel(task: TaskId) -> Self {
        Self { binary: KERNEL_BINARY.to_string(), base: 0, task, lifetime: Range::open_end(0) }
    }
}

/// Every mapping seen in a trace, indexed by task
#[derive(Debug, Clone, Default)]
pub struct MappingRegistry {
    mappings: Vec<Mapping>,
    by_binary: HashMap<(TaskId, String), usize>,
    load_order: BTreeMap<TaskId, Vec<String>>,
}

impl MappingRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the mapping a MAPPING entry describes
    ///
    /// # Errors
    /// Returns [`DecodeError::Format`] for a badly encoded binary name and
    /// [`DecodeError::AttributeNotFound`] if the base or task is missing.
    pub fn append(&mut self, entry: &Entry) -> Result<(), DecodeError> {
        debug_assert_eq!(entry.record_type(), RecordType::Mapping);

        // the name starts right after the attribute words
        let payload_offset = entry.offset() + entry.length() - entry.payload().len();
        let binary = decode_name(entry.payload(), payload_offset, is_mapping_name_char)?;
        let base = entry.attribute("mapping_base")?;
        let task = TaskId(entry.attribute("mapping_task_id")?);
        let start = entry.tsc_time().map(|t| t.0).unwrap_or_default();

        self.insert(Mapping { binary, base, task, lifetime: Range::open_end(start) });
        Ok(())
    }

    /// Register a mapping directly
    ///
    /// Mapping a binary into a task a second time replaces the earlier
    /// mapping.
    pub fn insert(&mut self, mapping: Mapping) {
        self.ensure_task(mapping.task);

        debug!("{} mapped {} at {:x} during {}", mapping.task, mapping.binary, mapping.base, mapping.lifetime);
        let key = (mapping.task, mapping.binary.clone());
        let position = self.mappings.len();
        if let Some(previous) = self.by_binary.insert(key, position) {
            let previous = &self.mappings[previous];
            warn!(
                "{} maps {} again at {:x} (previously at {:x} from {}), using the latest mapping",
                mapping.task, mapping.binary, mapping.base, previous.base, previous.lifetime.start
            );
        } else {
            self.load_order.entry(mapping.task).or_default().push(mapping.binary.clone());
        }
        self.mappings.push(mapping);
    }

    fn ensure_task(&mut self, task: TaskId) {
        if self.load_order.contains_key(&task) {
            return;
        }
        let kernel = Mapping::kernel(task);
        self.by_binary.insert((task, kernel.binary.clone()), self.mappings.len());
        self.load_order.insert(task, vec![kernel.binary.clone()]);
        self.mappings.push(kernel);
    }

    /// Current mapping of `binary` in `task`
    #[must_use]
    pub fn get(&self, task: TaskId, binary: &str) -> Option<&Mapping> {
        let &position = self.by_binary.get(&(task, binary.to_string()))?;
        self.mappings.get(position)
    }

    /// Every mapping ever registered, replaced ones included, in arrival order
    #[must_use]
    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    /// Binaries of `task` in load order
    ///
    /// A task that was never referenced has only the kernel.
    #[must_use]
    pub fn binaries(&self, task: TaskId) -> Vec<&str> {
        self.load_order
            .get(&task)
            .map_or_else(|| vec![KERNEL_BINARY], |names| names.iter().map(String::as_str).collect())
    }

    /// Comma separated binaries of a task, for dumps
    #[must_use]
    pub fn task_binaries(&self, task: TaskId) -> String {
        match self.load_order.get(&task) {
            Some(names) => names.join(", "),
            None => format!("<task {:x} has no binaries>", task.0),
        }
    }

    /// Resolve `address` in `task` at `time` to a symbol
    ///
    /// Only mappings alive at `time` are considered; each is asked for the
    /// symbol at `address - base` in its binary's table. Binaries without a
    /// table never match.
    ///
    /// # Errors
    /// Returns [`ResolveError::AmbiguousMapping`] if two binaries claim the
    /// address.
    pub fn find_symbol<'a>(
        &self,
        symbols: &'a SymbolTables,
        task: TaskId,
        address: u64,
        time: u64,
    ) -> Result<Option<&'a Symbol>, ResolveError> {
        let mut found: Option<&Symbol> = None;

        for binary in self.binaries(task) {
            let kernel;
            let mapping = match self.get(task, binary) {
                Some(mapping) => mapping,
                // an unreferenced task has no registered kernel mapping
                None => {
                    kernel = Mapping::kernel(task);
                    &kernel
                }
            };
            if !mapping.lifetime.contains(time) {
                continue;
            }
            let Some(table) = symbols.get(binary) else { continue };
            let Some(symbol) = table.find_symbol(address.wrapping_sub(mapping.base)) else { continue };

            match found {
                Some(first) if first.binary != symbol.binary => {
                    return Err(ResolveError::AmbiguousMapping {
                        task,
                        address,
                        first_binary: first.binary.clone(),
                        first_label: first.label().to_string(),
                        second_binary: symbol.binary.clone(),
                        second_label: symbol.label().to_string(),
                    });
                }
                Some(_) => {}
                None => found = Some(symbol),
            }
        }

        Ok(found)
    }

    /// Label of the symbol at `address`, or `task/address` in hex if no
    /// binary claims it
    ///
    /// # Errors
    /// Same as [`MappingRegistry::find_symbol`].
    pub fn lookup_symbol(
        &self,
        symbols: &SymbolTables,
        task: TaskId,
        address: u64,
        time: u64,
    ) -> Result<String, ResolveError> {
        Ok(match self.find_symbol(symbols, task, address, time)? {
            Some(symbol) => symbol.label().to_string(),
            None => format!("{:x}/{address:016x}", task.0),
        })
    }
}
