//! VectorAverager: the overflow-safe arithmetic mean of an `i32` vector.
//!
//! # Algorithm
//!
//! 1. An empty vector averages to `0` (with a journal warning).
//! 2. Elements are summed in an `i64`.  A vector on the wire holds at most
//!    10⁹ elements, and 10⁹ × 2³¹ is far below `i64::MAX`, so the sum cannot
//!    overflow.
//! 3. The sum is divided by the element count with Rust's `/`, which
//!    truncates toward zero (`-7 / 2 == -3`), not toward negative infinity.
//! 4. A quotient outside the `i32` range is clamped to `i32::MAX` or
//!    `i32::MIN` (with a journal warning).
//!
//! No input makes this panic or return an error.

use std::sync::Arc;

use crate::domain::journal::Journal;

/// What the mean computation produced, before it is reduced to an `i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeanOutcome {
    /// The vector had no elements.
    Empty,
    /// The mean fits in an `i32`.
    Exact(i32),
    /// The mean exceeded `i32::MAX`.
    ClampedHigh,
    /// The mean was below `i32::MIN`.
    ClampedLow,
}

impl MeanOutcome {
    /// The value sent to the client for this outcome.
    pub fn value(self) -> i32 {
        match self {
            MeanOutcome::Empty => 0,
            MeanOutcome::Exact(v) => v,
            MeanOutcome::ClampedHigh => i32::MAX,
            MeanOutcome::ClampedLow => i32::MIN,
        }
    }
}

/// Computes the truncating mean of `values` without any side effects.
pub fn mean(values: &[i32]) -> MeanOutcome {
    if values.is_empty() {
        return MeanOutcome::Empty;
    }

    let sum: i64 = values.iter().map(|&v| i64::from(v)).sum();
    let quotient = sum / values.len() as i64;

    match i32::try_from(quotient) {
        Ok(v) => MeanOutcome::Exact(v),
        Err(_) if quotient > 0 => MeanOutcome::ClampedHigh,
        Err(_) => MeanOutcome::ClampedLow,
    }
}

/// Averages vectors and journals the edge cases.
#[derive(Clone)]
pub struct VectorAverager {
    journal: Arc<dyn Journal>,
}

impl VectorAverager {
    pub fn new(journal: Arc<dyn Journal>) -> Self {
        Self { journal }
    }

    /// Returns the clamped, truncating mean of `values`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use vcalc_core::{MemoryJournal, VectorAverager};
    ///
    /// let averager = VectorAverager::new(Arc::new(MemoryJournal::new()));
    /// assert_eq!(averager.average(&[10, 20, 30, 40, 50]), 30);
    /// assert_eq!(averager.average(&[i32::MAX, 1]), 1_073_741_824);
    /// ```
    pub fn average(&self, values: &[i32]) -> i32 {
        let outcome = mean(values);
        match outcome {
            MeanOutcome::Empty => self.journal.error("Vector is empty", false),
            MeanOutcome::ClampedHigh => self.journal.error("Overflow detected (upwards)", false),
            MeanOutcome::ClampedLow => self.journal.error("Overflow detected (downwards)", false),
            MeanOutcome::Exact(_) => {}
        }
        outcome.value()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
