//! Synthetic trace buffers for integration tests

#![allow(dead_code)]

use btb::format::TraceBuffer;
use btb::symbolization::{ElfSymbol, SymbolTable};
use btb_common::{RecordType, LEGACY_SCHEMA_VERSION};

/// NUL-terminated name padded to whole words; at least `min_words` long
pub fn name_words(name: &str, min_words: usize) -> Vec<u64> {
    let mut bytes = name.as_bytes().to_vec();
    bytes.push(0);
    let words = bytes.len().div_ceil(8).max(min_words);
    bytes.resize(words * 8, 0);
    bytes
        .chunks_exact(8)
        .map(|chunk| u64::from_le_bytes(chunk.try_into().unwrap()))
        .collect()
}

/// Builds a buffer record by record
#[derive(Debug, Default)]
pub struct BufferBuilder {
    words: Vec<u64>,
}

impl BufferBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// INFO record; `descriptors[i]` names the attributes of record type `1 << i`
    pub fn info(mut self, version: u64, descriptors: &[&[&str]]) -> Self {
        let mut body = vec![version, descriptors.len() as u64];
        if version == LEGACY_SCHEMA_VERSION {
            body.push(0);
        }
        body.extend(descriptors.iter().map(|names| names.len() as u64));
        for name in descriptors.iter().flat_map(|names| names.iter()) {
            body.extend(name_words(name, 2));
        }
        self.push(RecordType::Info.tag(), &body);
        self
    }

    /// Record with attribute words (in schema order) followed by the payload
    pub fn record(mut self, record_type: RecordType, attributes: &[u64], payload: &[u64]) -> Self {
        let body: Vec<u64> = attributes.iter().chain(payload).copied().collect();
        self.push(record_type.tag(), &body);
        self
    }

    pub fn mapping(self, attributes: &[u64], binary: &str) -> Self {
        self.record(RecordType::Mapping, attributes, &name_words(binary, 1))
    }

    /// Append words verbatim
    pub fn raw(mut self, words: &[u64]) -> Self {
        self.words.extend_from_slice(words);
        self
    }

    fn push(&mut self, tag: u64, body: &[u64]) {
        self.words.push(tag);
        self.words.push(2 + body.len() as u64);
        self.words.extend_from_slice(body);
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    pub fn build(self) -> TraceBuffer {
        TraceBuffer::from_words(self.words)
    }
}

pub fn symbol_table(binary: &str, symbols: &[(&str, u64, u64)]) -> SymbolTable {
    SymbolTable::from_elf_symbols(
        binary,
        symbols.iter().map(|&(name, value, size)| ElfSymbol { name: name.to_string(), value, size }),
    )
}

pub const STACK_ATTRIBUTES: &[&str] = &["cpu_id", "tsc_time", "tsc_duration", "task_id"];
pub const MAPPING_ATTRIBUTES: &[&str] = &["tsc_time", "mapping_base", "mapping_task_id"];
pub const STATS_ATTRIBUTES: &[&str] = &["cpu_id", "tsc_time", "hist_bin_count", "hist_bin_size"];
