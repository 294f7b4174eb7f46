//! # btb - Backtrace Buffer Interpreter
//!
//! btb turns a trace buffer captured by the kernel's backtrace facility into
//! symbolized, time-ordered text: attribute dumps, folded stacks for flame
//! graphs, stack depth histograms and duration tables.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 trace buffer (flat u64 words)                   │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ read once
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       btb (This Crate)                          │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │    scan      │──▶│   schema     │──▶│   decode     │         │
//! │  │ (boundaries) │   │ (first INFO) │   │  (entries)   │         │
//! │  └──────────────┘   └──────────────┘   └──────┬───────┘         │
//! │                                               │ MAPPING records │
//! │                                               ▼                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │   Renderer   │──▶│   Mapping    │──▶│ Symbol Table │         │
//! │  │  (5 modes)   │   │  Registry    │   │ (ELF/cache)  │         │
//! │  └──────────────┘   └──────────────┘   └──────────────┘         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`format`]: buffer access, record scan, schema discovery and decode
//! - [`symbolization`]: symbol tables, the binary manifest and the time-aware
//!   mapping registry
//! - [`context`]: the per-trace state shared by decoder and renderer
//! - [`export`]: output modes, output files and rendering
//! - [`cli`]: command-line argument parsing
//! - [`domain`]: ranges, id newtypes and the error taxonomy
//!
//! The wire-format constants shared with the kernel producer live in the
//! `btb-common` crate.
//!
//! ## Typical Usage
//!
//! ```bash
//! # Flame graph input, symbols from data/binaries.list
//! btb trace.btb trace.folded
//!
//! # Full dump, split per CPU, with a symbol cache
//! btb trace.btb trace.interpreted --per-cpu --symbol-cache .symbols
//! ```

pub mod cli;
pub mod context;
pub mod domain;
pub mod export;
pub mod format;
pub mod symbolization;
