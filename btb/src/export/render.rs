//! Text rendering of decoded entries
//!
//! Each mode turns every relevant entry into zero or more lines. An entry's
//! lines are built completely before any of them is written, so an entry that
//! fails to render leaves no partial output behind; in lenient mode such an
//! entry is logged and skipped, otherwise the error ends the run.

// time conversions lose precision for display only
#![allow(clippy::cast_precision_loss)]

use std::fmt::Write as _;

use btb_common::RecordType;
use log::{info, warn};

use super::output::{LineSink, OutputMode};
use crate::context::TraceContext;
use crate::domain::{CpuId, DecodeError, RenderError, TaskId, Timestamp};
use crate::format::{Entry, EntryArray, TraceBuffer};

pub const HISTOGRAM_HEADER: &str = "bin_index,depth_min,depth_max,count,average_time_ns";
pub const DURATIONS_HEADER: &str = "timer_step,stack_depth,duration_ns,interval_ns";

/// Rendering switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Skip entries that fail to render instead of aborting
    pub lenient: bool,
    /// Weigh every folded stack 1 instead of by the time since the previous one
    pub unit_weights: bool,
}

/// Outcome of a render run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Entries that produced output
    pub rendered: usize,
    /// Entries skipped in lenient mode
    pub skipped: usize,
    /// Lines written, headers included
    pub lines: usize,
}

/// A line and the CPU it belongs to, if it goes to per-CPU outputs
type Line = (String, Option<CpuId>);

pub struct Renderer<'a> {
    context: &'a TraceContext,
    buffer: &'a TraceBuffer,
    mode: OutputMode,
    options: RenderOptions,
}

impl<'a> Renderer<'a> {
    /// `buffer` must be the buffer the entries were decoded from
    #[must_use]
    pub fn new(context: &'a TraceContext, buffer: &'a TraceBuffer, mode: OutputMode, options: RenderOptions) -> Self {
        Self { context, buffer, mode, options }
    }

    /// Render every entry, in order, into `sink`
    ///
    /// # Errors
    /// Returns the first render error (unless lenient) and any write error.
    pub fn render<S: LineSink + ?Sized>(&self, entries: &EntryArray, sink: &mut S) -> Result<RenderStats, RenderError> {
        let mut stats = RenderStats::default();
        let mut previous_stack: Option<&Entry> = None;
        let mut header_written = false;

        for entry in entries {
            let lines = match self.render_entry(entry, previous_stack, sink.splits_per_cpu()) {
                Ok(lines) => lines,
                Err(e) if self.options.lenient => {
                    warn!("Skipping record {} at word {}: {e}", entry.index(), entry.offset());
                    stats.skipped += 1;
                    continue;
                }
                Err(e) => {
                    return Err(RenderError::Entry {
                        record_type: entry.record_type(),
                        index: entry.index(),
                        offset: entry.offset(),
                        timestamp: entry.tsc_time().ok().map(|t| t.0),
                        source: Box::new(e),
                    });
                }
            };
            if entry.record_type() == RecordType::Stack {
                previous_stack = Some(entry);
            }
            if lines.is_empty() {
                continue;
            }

            if !header_written {
                if let Some(header) = self.header() {
                    sink.header(header)?;
                    stats.lines += 1;
                }
                header_written = true;
            }
            for (text, cpu) in &lines {
                sink.line(text, *cpu)?;
            }
            stats.lines += lines.len();
            stats.rendered += 1;
        }
        sink.flush()?;

        if stats.skipped > 0 {
            warn!("Skipped {} of {} entries", stats.skipped, entries.len());
        }
        info!("Rendered {} entries as {} ({} lines)", stats.rendered, self.mode, stats.lines);
        Ok(stats)
    }

    fn header(&self) -> Option<&'static str> {
        match self.mode {
            OutputMode::Histogram => Some(HISTOGRAM_HEADER),
            OutputMode::Durations => Some(DURATIONS_HEADER),
            OutputMode::Raw | OutputMode::BtbLines | OutputMode::Folded => None,
        }
    }

    fn render_entry(&self, entry: &Entry, previous_stack: Option<&Entry>, split: bool) -> Result<Vec<Line>, RenderError> {
        let is_stack = entry.record_type() == RecordType::Stack;
        // cpu_id is only required when lines are split by CPU
        let cpu = |wanted: bool| -> Result<Option<CpuId>, DecodeError> {
            if split && wanted {
                entry.cpu_id().map(Some)
            } else {
                Ok(None)
            }
        };

        match self.mode {
            OutputMode::Raw => Ok(vec![(self.raw(entry)?, cpu(is_stack)?)]),
            OutputMode::BtbLines => Ok(vec![(self.btb_line(entry)?, cpu(is_stack)?)]),
            OutputMode::Folded if is_stack => {
                Ok(vec![(self.folded(entry, previous_stack, split)?, cpu(true)?)])
            }
            OutputMode::Histogram if entry.record_type() == RecordType::Stats => {
                let cpu = cpu(true)?;
                Ok(histogram(entry)?.into_iter().map(|line| (line, cpu)).collect())
            }
            OutputMode::Durations if is_stack => Ok(vec![(durations(entry, previous_stack)?, cpu(true)?)]),
            OutputMode::Folded | OutputMode::Histogram | OutputMode::Durations => Ok(Vec::new()),
        }
    }

    /// `read entry:` block with one line per attribute and payload word
    fn raw(&self, entry: &Entry) -> Result<String, RenderError> {
        let mut out = String::from("read entry: ");

        for (name, value) in entry.attributes() {
            let _ = write!(out, "\n  {name:16}: {value:16x}");
            match name {
                "task_id" => {
                    let _ = write!(out, " {}", self.context.task_binaries(TaskId(value)));
                }
                "tsc_time" => {
                    let _ = write!(out, " {:13.9} s", Timestamp(value).as_seconds());
                }
                "tsc_duration" => {
                    let _ = write!(out, " {:13.3} µs", Timestamp(value).as_micros());
                }
                _ if value >= 10 => {
                    let _ = write!(out, " {value}");
                }
                _ => {}
            }
        }

        let ascii_from = match entry.record_type() {
            RecordType::Mapping => Some(0),
            // the words after the type lengths hold attribute names
            RecordType::Info => {
                Some(entry.attribute("type_count").ok().and_then(|n| usize::try_from(n).ok()).unwrap_or(0))
            }
            _ => None,
        };
        for (i, &word) in entry.payload().iter().enumerate() {
            let _ = write!(out, "\n  {i:15} : {word:16x}");
            if entry.record_type() == RecordType::Stack {
                let symbol = self.symbol(entry, word)?;
                let _ = write!(out, " {symbol}");
            } else if ascii_from.is_some_and(|from| i >= from) {
                let _ = write!(out, " {}", word_ascii(word));
            }
        }

        Ok(out)
    }

    /// `btb @offset: w0 w1 ...` straight from the buffer
    fn btb_line(&self, entry: &Entry) -> Result<String, DecodeError> {
        let words = self.buffer.record(entry.offset(), entry.length()).ok_or(DecodeError::TruncatedBuffer {
            offset: entry.offset(),
            index: entry.index(),
            needed: entry.length(),
            remaining: self.buffer.len().saturating_sub(entry.offset()),
        })?;

        let mut out = format!("btb @{:16x}:", entry.offset());
        for word in words {
            let _ = write!(out, " {word:016x}");
        }
        Ok(out)
    }

    /// `[cpu_N;]root;...;leaf weight`
    fn folded(&self, entry: &Entry, previous_stack: Option<&Entry>, with_cpu: bool) -> Result<String, RenderError> {
        let mut frames = Vec::with_capacity(entry.payload().len() + 1);
        if with_cpu {
            frames.push(entry.cpu_id()?.to_string());
        }
        // payload is leaf first
        for &address in entry.payload().iter().rev() {
            frames.push(self.symbol(entry, address)?);
        }

        let weight = match previous_stack {
            _ if self.options.unit_weights => 1,
            Some(previous) => entry.start_time_ns()?.saturating_sub(previous.end_time_ns()?),
            None => 1,
        };
        Ok(format!("{} {weight}", frames.join(";")))
    }

    fn symbol(&self, entry: &Entry, address: u64) -> Result<String, RenderError> {
        let task = entry.task_id()?;
        let time = entry.start_time_ns()?;
        Ok(self.context.lookup_symbol(task, address, time)?)
    }
}

/// One CSV line per histogram bin; the payload holds all counts, then all times
fn histogram(entry: &Entry) -> Result<Vec<String>, DecodeError> {
    let bin_count = entry.attribute("hist_bin_count")?;
    let bin_size = entry.attribute("hist_bin_size")?;
    let payload = entry.payload();

    let bins = usize::try_from(bin_count)
        .ok()
        .filter(|&n| n.checked_mul(2).is_some_and(|words| words <= payload.len()))
        .ok_or_else(|| DecodeError::MalformedRecord {
            offset: entry.offset(),
            index: entry.index(),
            reason: format!("{bin_count} histogram bins need twice as many payload words, got {}", payload.len()),
        })?;
    let (counts, times) = payload.split_at(bins);

    Ok(counts
        .iter()
        .zip(times)
        .zip(0u64..)
        .map(|((&count, &time), bin)| {
            let average = if count == 0 { 0.0 } else { time as f64 / count as f64 };
            format!(
                "{bin},{},{},{count},{average:.6}",
                bin.saturating_mul(bin_size),
                (bin + 1).saturating_mul(bin_size)
            )
        })
        .collect())
}

fn durations(entry: &Entry, previous_stack: Option<&Entry>) -> Result<String, DecodeError> {
    let interval = match previous_stack {
        Some(previous) => entry.start_time_ns()?.saturating_sub(previous.start_time_ns()?),
        None => 0,
    };
    Ok(format!(
        "{},{},{},{interval}",
        entry.attribute("timer_step")?,
        entry.attribute("stack_depth")?,
        entry.tsc_duration()?
    ))
}

/// Printable prefix of a word's bytes, up to the first NUL
fn word_ascii(word: u64) -> String {
    word.to_le_bytes()
        .iter()
        .take_while(|&&b| b != 0)
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { char::from(b) } else { '.' })
        .collect()
}
