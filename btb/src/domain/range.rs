//! Half-open numeric intervals
//!
//! Used for symbol address ranges (`[value, value + size)`) and for mapping
//! lifetimes (`[load time, ∞)`). Page rounding turns a symbol's address range
//! into the set of page buckets it has to be filed under.

use std::fmt;

/// Half-open interval `[start, end)` over `u64`
///
/// An `end` of `u64::MAX` is treated as open, i.e. unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    pub start: u64,
    pub end: u64,
}

impl Range {
    /// `[start, start + length)`, saturating at the open end
    #[must_use]
    pub fn with_length(start: u64, length: u64) -> Self {
        Self { start, end: start.saturating_add(length) }
    }

    /// `[start, end)`; an `end` below `start` yields an empty range at `start`
    #[must_use]
    pub fn with_end(start: u64, end: u64) -> Self {
        Self { start, end: end.max(start) }
    }

    /// `[start, ∞)`
    #[must_use]
    pub fn open_end(start: u64) -> Self {
        Self { start, end: u64::MAX }
    }

    #[must_use]
    pub fn is_open_ended(&self) -> bool {
        self.end == u64::MAX
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Check if a value falls within this range
    #[must_use]
    pub fn contains(&self, value: u64) -> bool {
        value >= self.start && value < self.end
    }

    /// Widen the range to multiples of `factor` (start rounded down, end up)
    ///
    /// # Panics
    /// Panics if `factor` is zero.
    #[must_use]
    pub fn rounded(&self, factor: u64) -> Self {
        assert!(factor > 0, "cannot round a range to a zero factor");
        let start = (self.start / factor) * factor;
        if self.is_empty() {
            return Self { start, end: start };
        }
        let end = ((self.end - 1) / factor).saturating_add(1).saturating_mul(factor);
        Self { start, end }
    }

    /// Every `step`-aligned value from the rounded start up to the end
    ///
    /// # Panics
    /// Panics if `step` is zero.
    pub fn steps(&self, step: u64) -> impl Iterator<Item = u64> {
        let rounded = self.rounded(step);
        let count = rounded.len().div_ceil(step);
        (0..count).map(move |i| rounded.start + i * step)
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_open_ended() {
            write!(f, "[{:x}, ∞)", self.start)
        } else {
            write!(f, "[{:x}, {:x})", self.start, self.end)
        }
    }
}
