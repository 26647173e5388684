//! Precursor m/z based candidate pre-selection over a sorted library

use std::cmp::Ordering;
use std::ops::Range;
use std::sync::Arc;

use crate::library::LibrarySpectrum;
use crate::query::MsLevelFilter;
use crate::tolerance::MzTolerance;

/// Anything that may carry a precursor m/z
pub trait PrecursorMz {
    fn precursor_mz(&self) -> Option<f64>;
}

impl PrecursorMz for LibrarySpectrum {
    fn precursor_mz(&self) -> Option<f64> {
        LibrarySpectrum::precursor_mz(self)
    }
}

impl<T: PrecursorMz> PrecursorMz for Arc<T> {
    fn precursor_mz(&self) -> Option<f64> {
        (**self).precursor_mz()
    }
}

fn compare_precursors(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sort entries by ascending precursor m/z, with entries lacking one first.
///
/// The sort is stable so entries with equal precursors keep their library order.
pub fn sort_by_precursor<T: PrecursorMz>(entries: &mut [T]) {
    entries.sort_by(|a, b| compare_precursors(a.precursor_mz(), b.precursor_mz()));
}

/// The index range of `entries` whose precursor m/z falls within `tolerance` of `precursor_mz`.
///
/// `entries` must be sorted with [`sort_by_precursor`].
pub fn candidate_range<T: PrecursorMz>(
    entries: &[T],
    precursor_mz: f64,
    tolerance: &MzTolerance,
) -> Range<usize> {
    let window = tolerance.range(precursor_mz);
    let start = entries.partition_point(|e| match e.precursor_mz() {
        Some(mz) => mz < window.start,
        None => true,
    });
    let end = start
        + entries[start..].partition_point(|e| match e.precursor_mz() {
            Some(mz) => mz <= window.end,
            None => true,
        });
    start..end
}

/// Select the library entries worth scoring against a query.
///
/// MS1 searches, and queries without a known precursor, consider the whole library.
/// Otherwise only entries whose precursor is within `tolerance` are returned.
pub fn filter_candidates<'a, T: PrecursorMz>(
    entries: &'a [T],
    precursor_mz: Option<f64>,
    tolerance: &MzTolerance,
    ms_level_filter: MsLevelFilter,
) -> &'a [T] {
    if ms_level_filter.is_ms1_only() {
        return entries;
    }
    match precursor_mz {
        Some(mz) => &entries[candidate_range(entries, mz, tolerance)],
        None => entries,
    }
}
