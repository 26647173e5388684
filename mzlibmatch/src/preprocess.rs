//! Peak list preparation applied to a library spectrum and a query spectrum before scoring

use itertools::{Itertools, MinMaxResult};
use mzpeaks::CentroidPeak;

use crate::tolerance::MzTolerance;

/// The fixed window cleared around a precursor ion, independent of the spectral tolerance
pub const PRECURSOR_REMOVAL_WINDOW: MzTolerance = MzTolerance::new(4.0, 0.0);

/// Drop every peak within [`PRECURSOR_REMOVAL_WINDOW`] of `precursor_mz`
pub fn remove_precursor(peaks: &[CentroidPeak], precursor_mz: f64) -> Vec<CentroidPeak> {
    let window = PRECURSOR_REMOVAL_WINDOW.range(precursor_mz);
    peaks
        .iter()
        .filter(|p| p.mz < window.start || p.mz > window.end)
        .cloned()
        .collect()
}

/// The m/z span of a spectrum, from its lowest peak to the larger of its highest peak and
/// its precursor
fn spectrum_span(peaks: &[CentroidPeak], precursor_mz: Option<f64>) -> Option<(f64, f64)> {
    let (lo, hi) = match peaks.iter().map(|p| p.mz).minmax_by(|a, b| a.total_cmp(b)) {
        MinMaxResult::NoElements => return None,
        MinMaxResult::OneElement(x) => (x, x),
        MinMaxResult::MinMax(lo, hi) => (lo, hi),
    };
    Some((lo, precursor_mz.map(|p| p.max(hi)).unwrap_or(hi)))
}

/// Truncate both peak lists to the m/z range the two spectra have in common, widened by
/// `tolerance` on both ends.
///
/// Returns two empty lists if the spectra do not overlap at all.
pub fn crop_to_overlap(
    tolerance: &MzTolerance,
    library: &[CentroidPeak],
    query: &[CentroidPeak],
    library_precursor: Option<f64>,
    query_precursor: Option<f64>,
) -> (Vec<CentroidPeak>, Vec<CentroidPeak>) {
    let (Some((lib_lo, lib_hi)), Some((query_lo, query_hi))) = (
        spectrum_span(library, library_precursor),
        spectrum_span(query, query_precursor),
    ) else {
        return (Vec::new(), Vec::new());
    };

    let lo = lib_lo.max(query_lo);
    let hi = lib_hi.min(query_hi);
    if lo > hi {
        return (Vec::new(), Vec::new());
    }
    let lo = lo - tolerance.tolerance_for(lo);
    let hi = hi + tolerance.tolerance_for(hi);

    let crop = |peaks: &[CentroidPeak]| -> Vec<CentroidPeak> {
        peaks
            .iter()
            .filter(|p| p.mz >= lo && p.mz <= hi)
            .cloned()
            .collect()
    };
    (crop(library), crop(query))
}

/// The switches controlling how a library/query pair is prepared for scoring
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairPreprocessing {
    pub mz_tolerance: MzTolerance,
    pub crop_to_overlap: bool,
    pub remove_precursor: bool,
    pub ms1_only: bool,
}

impl PairPreprocessing {
    /// Crop then clear precursor windows on an already deisotoped pair of spectra.
    ///
    /// Neither step is applied to MS1 searches.
    pub fn prepare(
        &self,
        library: &[CentroidPeak],
        query: &[CentroidPeak],
        library_precursor: Option<f64>,
        query_precursor: Option<f64>,
    ) -> (Vec<CentroidPeak>, Vec<CentroidPeak>) {
        if self.ms1_only {
            return (library.to_vec(), query.to_vec());
        }
        let (mut library, mut query) = if self.crop_to_overlap {
            crop_to_overlap(
                &self.mz_tolerance,
                library,
                query,
                library_precursor,
                query_precursor,
            )
        } else {
            (library.to_vec(), query.to_vec())
        };
        if self.remove_precursor {
            if let Some(mz) = library_precursor {
                library = remove_precursor(&library, mz);
            }
            if let Some(mz) = query_precursor {
                query = remove_precursor(&query, mz);
            }
        }
        (library, query)
    }
}
