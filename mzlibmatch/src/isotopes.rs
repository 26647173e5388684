//! Verification that matched signals contain isotope spaced peaks

use crate::similarity::{remove_unaligned, SpectralSimilarity};
use crate::tolerance::MzTolerance;

/// Mass differences of common isotope pairs: 13C, 2H/1H, two 1H and 37Cl/35Cl
pub const DELTA_ISOTOPES: [f64; 4] = [1.0034, 1.0078, 2.0157, 1.9970];

/// Test whether the aligned library signals of `similarity` contain at least `min_matches`
/// isotope spaced peak pairs.
///
/// Every library peak may count once for each isotope delta, so a single peak can be
/// counted several times. The search stops as soon as the threshold is reached.
pub fn check_for_isotope_pattern(
    similarity: &SpectralSimilarity,
    tolerance: &MzTolerance,
    min_matches: usize,
) -> bool {
    if min_matches == 0 {
        return true;
    }
    let mzs: Vec<f64> = remove_unaligned(&similarity.aligned)
        .into_iter()
        .filter_map(|p| p.library.map(|peak| peak.mz))
        .collect();

    let mut matches = 0;
    for (i, mz_i) in mzs.iter().enumerate() {
        for delta in DELTA_ISOTOPES {
            let hit = mzs[i + 1..]
                .iter()
                .any(|mz_k| tolerance.check_within_tolerance(delta, (mz_i - mz_k).abs()));
            if hit {
                matches += 1;
                if matches >= min_matches {
                    return true;
                }
            }
        }
    }
    false
}
