//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "btb",
    about = "Interpret kernel backtrace buffers",
    after_help = "\
OUTPUT MODES (chosen by the output file ending):
    .interpreted    attribute dump with symbolized stacks
    .btb_lines      hex dump of every record
    .folded         folded stacks for flame graphs
    .histogram      CSV of stack depth histograms
    .durations      CSV of sample durations

EXAMPLES:
    btb trace.btb trace.folded                         Flame graph input
    btb trace.btb trace.interpreted --per-cpu          Dump, plus one file per CPU
    btb trace.btb out.histogram --binaries bins.list   Custom binary list"
)]
pub struct Args {
    /// Trace buffer file (little-endian 64-bit words)
    #[arg(value_name = "BUFFER")]
    pub input: PathBuf,

    /// Output file; its ending selects the output mode
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Binary manifest with one `name: path` line per binary
    #[arg(short, long, value_name = "FILE", default_value = "data/binaries.list")]
    pub binaries: PathBuf,

    /// Directory for symbol table caches (read if present, written otherwise)
    #[arg(long, value_name = "DIR")]
    pub symbol_cache: Option<PathBuf>,

    /// Also write one output file per CPU (`<base>-<cpu>.<ending>`)
    #[arg(long)]
    pub per_cpu: bool,

    /// Weigh every folded stack 1 instead of by the time since the previous sample
    #[arg(long)]
    pub unit_weights: bool,

    /// Skip records that fail to render instead of aborting
    #[arg(long)]
    pub lenient: bool,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}
