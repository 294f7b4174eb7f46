//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers prevent passing a CPU id where a task id is expected,
//! and make resolver signatures read like the question they answer.

use std::fmt;

/// Task id as written by the kernel into stack and mapping records
///
/// Identifies an address space. Not a thread id: all threads of one task share
/// the same mappings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task {:x}", self.0)
    }
}

/// CPU id
///
/// Represents the CPU a record was captured on (0, 1, 2, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CpuId(pub u64);

impl fmt::Display for CpuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cpu_{}", self.0)
    }
}

/// Timestamp in nanoseconds
///
/// Derived from the time-stamp counter; only meaningful relative to other
/// timestamps of the same buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Convert to seconds (f64)
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn as_seconds(self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }

    /// Convert to microseconds (f64)
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn as_micros(self) -> f64 {
        self.0 as f64 / 1_000.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.9}s", self.as_seconds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_display() {
        assert_eq!(TaskId(0x1f).to_string(), "task 1f");
    }

    #[test]
    fn test_cpu_id_display() {
        assert_eq!(CpuId(3).to_string(), "cpu_3");
    }

    #[test]
    fn test_timestamp_conversions() {
        let ts = Timestamp(1_500_000_000);
        assert_eq!(ts.as_seconds(), 1.5);
        assert_eq!(ts.as_micros(), 1_500_000.0);
        assert_eq!(ts.to_string(), "1.500000000s");
    }
}
