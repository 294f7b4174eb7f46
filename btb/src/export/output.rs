//! Output files
//!
//! The output mode is chosen by the ending of the output file name. With
//! per-CPU splitting every line may additionally go to `<base>-<cpu>.<ending>`
//! next to the main file; those files are created on their first line.

use std::collections::{btree_map, BTreeMap};
use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::debug;

use crate::domain::{CpuId, ResourceError};

/// What the renderer produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputMode {
    /// Attribute dump, one `read entry:` block per record
    Raw,
    /// Hex dump of every record's words
    BtbLines,
    /// Folded stacks for flame graph tools
    Folded,
    /// CSV of the STATS histograms
    Histogram,
    /// CSV of stack sample durations
    Durations,
}

impl OutputMode {
    pub const ALL: [OutputMode; 5] =
        [Self::Raw, Self::BtbLines, Self::Folded, Self::Histogram, Self::Durations];

    /// File name ending selecting this mode
    #[must_use]
    pub const fn ending(self) -> &'static str {
        match self {
            Self::Raw => "interpreted",
            Self::BtbLines => "btb_lines",
            Self::Folded => "folded",
            Self::Histogram => "histogram",
            Self::Durations => "durations",
        }
    }

    /// `.interpreted, .btb_lines, ...` for messages
    #[must_use]
    pub fn endings() -> String {
        Self::ALL.iter().map(|mode| format!(".{}", mode.ending())).collect::<Vec<_>>().join(", ")
    }

    /// Split an output path into the path without its ending and the mode
    ///
    /// # Errors
    /// Returns [`ResourceError::OutputName`] if the file name has no known
    /// ending or nothing before it.
    pub fn from_path(path: &Path) -> Result<(PathBuf, Self), ResourceError> {
        let mode = path
            .extension()
            .and_then(|ending| ending.to_str())
            .and_then(|ending| ending.parse().ok())
            .ok_or_else(|| ResourceError::OutputName {
                path: path.to_path_buf(),
                expected: Self::endings(),
            })?;
        Ok((path.with_extension(""), mode))
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ending = s.strip_prefix('.').unwrap_or(s);
        Self::ALL
            .into_iter()
            .find(|mode| mode.ending() == ending)
            .ok_or_else(|| format!("unknown output mode '{s}', expected one of {}", Self::endings()))
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ending())
    }
}

/// Destination of rendered lines
pub trait LineSink {
    /// Whether lines tagged with a CPU also go to that CPU's own output
    fn splits_per_cpu(&self) -> bool;

    /// Set the header line; it is written to every output, including per-CPU
    /// outputs created later
    ///
    /// # Errors
    /// Propagates write errors.
    fn header(&mut self, text: &str) -> io::Result<()>;

    /// Write one line to the main output and, if `cpu` is given and lines are
    /// split, to that CPU's output
    ///
    /// # Errors
    /// Propagates write errors.
    fn line(&mut self, text: &str, cpu: Option<CpuId>) -> io::Result<()>;

    /// # Errors
    /// Propagates write errors.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// File-backed [`LineSink`]
pub struct OutputStreams {
    base: PathBuf,
    mode: OutputMode,
    split: bool,
    header: Option<String>,
    common: BufWriter<File>,
    per_cpu: BTreeMap<CpuId, BufWriter<File>>,
}

impl OutputStreams {
    /// Create the main output file; its ending selects the mode
    ///
    /// # Errors
    /// Returns an error for an unknown ending or if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, split: bool) -> Result<Self, ResourceError> {
        let path = path.as_ref();
        let (base, mode) = OutputMode::from_path(path)?;
        let common = create_file(path)?;
        Ok(Self { base, mode, split, header: None, common, per_cpu: BTreeMap::new() })
    }

    #[must_use]
    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// `<base>-<cpu>.<ending>`
    #[must_use]
    pub fn cpu_path(&self, cpu: CpuId) -> PathBuf {
        cpu_path(&self.base, self.mode, cpu)
    }

    fn cpu_stream(&mut self, cpu: CpuId) -> io::Result<&mut BufWriter<File>> {
        match self.per_cpu.entry(cpu) {
            btree_map::Entry::Occupied(stream) => Ok(stream.into_mut()),
            btree_map::Entry::Vacant(slot) => {
                let path = cpu_path(&self.base, self.mode, cpu);
                debug!("Opening per-CPU output '{}'", path.display());
                let mut stream = BufWriter::new(File::create(&path)?);
                if let Some(header) = &self.header {
                    writeln!(stream, "{header}")?;
                }
                Ok(slot.insert(stream))
            }
        }
    }
}

fn cpu_path(base: &Path, mode: OutputMode, cpu: CpuId) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(format!("-{}.{}", cpu.0, mode.ending()));
    PathBuf::from(name)
}

fn create_file(path: &Path) -> Result<BufWriter<File>, ResourceError> {
    File::create(path).map(BufWriter::new).map_err(|e| ResourceError::io(path, e))
}

impl LineSink for OutputStreams {
    fn splits_per_cpu(&self) -> bool {
        self.split
    }

    fn header(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.common, "{text}")?;
        for stream in self.per_cpu.values_mut() {
            writeln!(stream, "{text}")?;
        }
        self.header = Some(text.to_string());
        Ok(())
    }

    fn line(&mut self, text: &str, cpu: Option<CpuId>) -> io::Result<()> {
        writeln!(self.common, "{text}")?;
        if let Some(cpu) = cpu.filter(|_| self.split) {
            writeln!(self.cpu_stream(cpu)?, "{text}")?;
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.common.flush()?;
        for stream in self.per_cpu.values_mut() {
            stream.flush()?;
        }
        Ok(())
    }
}

/// In-memory [`LineSink`], mostly for tests and for piping into other tools
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySink {
    split: bool,
    header: Option<String>,
    pub common: Vec<String>,
    pub per_cpu: BTreeMap<CpuId, Vec<String>>,
}

impl MemorySink {
    #[must_use]
    pub fn new(split: bool) -> Self {
        Self { split, ..Self::default() }
    }
}

impl LineSink for MemorySink {
    fn splits_per_cpu(&self) -> bool {
        self.split
    }

    fn header(&mut self, text: &str) -> io::Result<()> {
        self.common.push(text.to_string());
        for lines in self.per_cpu.values_mut() {
            lines.push(text.to_string());
        }
        self.header = Some(text.to_string());
        Ok(())
    }

    fn line(&mut self, text: &str, cpu: Option<CpuId>) -> io::Result<()> {
        self.common.push(text.to_string());
        if let Some(cpu) = cpu.filter(|_| self.split) {
            let header = self.header.clone();
            self.per_cpu.entry(cpu).or_insert_with(|| header.into_iter().collect()).push(text.to_string());
        }
        Ok(())
    }
}
