//! # btb - Main Entry Point
//!
//! Loads the symbol tables named in the binary manifest, decodes the trace
//! buffer and renders it into the output file (plus per-CPU files on request).

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use btb::cli::Args;
use btb::context::TraceContext;
use btb::export::{OutputStreams, RenderOptions, Renderer};
use btb::format::TraceBuffer;
use btb::symbolization::{load_symbol_tables, BinaryManifest};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    env_logger::init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { EXIT_USAGE } else { EXIT_SUCCESS };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    std::process::exit(match run(&args) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_ERROR
        }
    });
}

fn run(args: &Args) -> Result<()> {
    // fail on a bad output name before doing any work
    let mut output = OutputStreams::create(&args.output, args.per_cpu)?;

    let manifest = BinaryManifest::from_file(&args.binaries).context("Failed to load binary manifest")?;
    let symbols = load_symbol_tables(&manifest, args.symbol_cache.as_deref())
        .context("Failed to load symbol tables")?;

    let buffer = TraceBuffer::open(&args.input)?;
    let mut context = TraceContext::new(symbols);
    let entries = context
        .decode(&buffer)
        .with_context(|| format!("Failed to interpret '{}'", args.input.display()))?;
    info!("Successfully read raw data");

    let options = RenderOptions { lenient: args.lenient, unit_weights: args.unit_weights };
    let stats = Renderer::new(&context, &buffer, output.mode(), options)
        .render(&entries, &mut output)
        .with_context(|| format!("Failed to render '{}'", args.input.display()))?;

    if !args.quiet {
        println!("btb v{}", env!("CARGO_PKG_VERSION"));
        println!("input: {} ({} words, {} entries)", args.input.display(), buffer.len(), entries.len());
        println!("output: {} ({} lines)", args.output.display(), stats.lines);
        if stats.skipped > 0 {
            println!("skipped: {} entries", stats.skipped);
        }
    }
    Ok(())
}
