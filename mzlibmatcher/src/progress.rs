//! Run counters, shared progress and cancellation

use std::ops::{Add, AddAssign};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts accumulated while matching a batch of rows
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MatchTally {
    pub rows: usize,
    pub rows_with_matches: usize,
    pub matches: usize,
    pub errors: usize,
}

impl Add for MatchTally {
    type Output = MatchTally;

    fn add(self, rhs: Self) -> Self::Output {
        let mut dup = self;
        dup += rhs;
        dup
    }
}

impl AddAssign for MatchTally {
    fn add_assign(&mut self, rhs: Self) {
        self.rows += rhs.rows;
        self.rows_with_matches += rhs.rows_with_matches;
        self.matches += rhs.matches;
        self.errors += rhs.errors;
    }
}

/// Progress counters that may be read from another thread while a search runs
#[derive(Debug, Default)]
pub struct MatchProgress {
    total: AtomicUsize,
    finished: AtomicUsize,
    matches: AtomicUsize,
    errors: AtomicUsize,
}

impl MatchProgress {
    pub fn reset(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
        self.finished.store(0, Ordering::SeqCst);
        self.matches.store(0, Ordering::SeqCst);
        self.errors.store(0, Ordering::SeqCst);
    }

    pub fn finish_unit(&self) {
        self.finished.fetch_add(1, Ordering::AcqRel);
    }

    pub fn add_matches(&self, count: usize) {
        self.matches.fetch_add(count, Ordering::AcqRel);
    }

    pub fn add_error(&self) {
        self.errors.fetch_add(1, Ordering::AcqRel);
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::Acquire)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::Acquire)
    }

    pub fn matches(&self) -> usize {
        self.matches.load(Ordering::Acquire)
    }

    pub fn errors(&self) -> usize {
        self.errors.load(Ordering::Acquire)
    }

    /// The fraction of units finished, in `[0, 1]`
    pub fn fraction(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            (self.finished() as f64 / total as f64).min(1.0)
        }
    }
}

/// A shared flag that asks a running search to stop starting new work
#[derive(Debug, Default, Clone)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
