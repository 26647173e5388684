//! Spectral similarity functions.
//!
//! Both peak lists are first aligned under the spectral m/z tolerance, then scored with
//! one of a closed set of cosine variants. A comparison either yields a
//! [`SpectralSimilarity`] or nothing at all when too few peaks align or the score falls
//! below the function's minimum.

use mzpeaks::CentroidPeak;
use serde::{Deserialize, Serialize};

use crate::tolerance::MzTolerance;

/// A library peak and a query peak that were assigned to each other.
///
/// Peaks without a partner appear with the other side empty.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedPair {
    pub library: Option<CentroidPeak>,
    pub query: Option<CentroidPeak>,
}

impl AlignedPair {
    pub fn is_aligned(&self) -> bool {
        self.library.is_some() && self.query.is_some()
    }

    fn mz(&self) -> f64 {
        self.library
            .as_ref()
            .or(self.query.as_ref())
            .map(|p| p.mz)
            .unwrap_or_default()
    }
}

/// Pair query peaks with library peaks, most intense query peak first.
///
/// Each query peak takes the closest library peak still unpaired within `tolerance`.
/// The output is sorted by m/z and also holds every unpaired peak from either side.
pub fn align_peaks(
    tolerance: &MzTolerance,
    library: &[CentroidPeak],
    query: &[CentroidPeak],
) -> Vec<AlignedPair> {
    let mut library_sorted: Vec<&CentroidPeak> = library.iter().collect();
    library_sorted.sort_by(|a, b| a.mz.total_cmp(&b.mz));
    let mut used = vec![false; library_sorted.len()];

    let mut query_order: Vec<&CentroidPeak> = query.iter().collect();
    query_order.sort_by(|a, b| b.intensity.total_cmp(&a.intensity));

    let mut pairs = Vec::with_capacity(library.len() + query.len());
    for q in query_order {
        let window = tolerance.range(q.mz);
        let start = library_sorted.partition_point(|p| p.mz < window.start);
        let mut best: Option<(usize, f64)> = None;
        for (i, p) in library_sorted.iter().enumerate().skip(start) {
            if p.mz > window.end {
                break;
            }
            if used[i] {
                continue;
            }
            let err = (p.mz - q.mz).abs();
            if best.map(|(_, e)| err < e).unwrap_or(true) {
                best = Some((i, err));
            }
        }
        let library_peak = best.map(|(i, _)| {
            used[i] = true;
            library_sorted[i].clone()
        });
        pairs.push(AlignedPair {
            library: library_peak,
            query: Some(q.clone()),
        });
    }
    for (peak, used) in library_sorted.into_iter().zip(used) {
        if !used {
            pairs.push(AlignedPair {
                library: Some(peak.clone()),
                query: None,
            });
        }
    }
    pairs.sort_by(|a, b| a.mz().total_cmp(&b.mz()));
    pairs
}

/// Keep only the pairs where both sides are present
pub fn remove_unaligned(pairs: &[AlignedPair]) -> Vec<AlignedPair> {
    pairs.iter().filter(|p| p.is_aligned()).cloned().collect()
}

/// The outcome of a successful spectrum comparison
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralSimilarity {
    pub function: &'static str,
    pub score: f64,
    /// The number of aligned peak pairs
    pub overlap: usize,
    pub library_signals: usize,
    pub query_signals: usize,
    pub aligned: Vec<AlignedPair>,
}

/// How a peak's m/z and intensity are combined into the value the cosine is computed over
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weights {
    /// `I^0.5`
    Sqrt,
    /// `I^0.5 * mz^2`
    #[default]
    MassBank,
    /// `I^0.53 * mz^1.3`
    Nist11,
    /// `I^0.6 * mz^3`
    NistGc,
    /// `I`
    None,
}

impl Weights {
    pub fn exponents(&self) -> (f64, f64) {
        match self {
            Weights::Sqrt => (0.5, 0.0),
            Weights::MassBank => (0.5, 2.0),
            Weights::Nist11 => (0.53, 1.3),
            Weights::NistGc => (0.6, 3.0),
            Weights::None => (1.0, 0.0),
        }
    }

    #[inline]
    pub fn weight(&self, peak: &CentroidPeak) -> f64 {
        let (intensity_power, mz_power) = self.exponents();
        let intensity = (peak.intensity as f64).max(0.0);
        let mut w = intensity.powf(intensity_power);
        if mz_power != 0.0 {
            w *= peak.mz.powf(mz_power);
        }
        w
    }

    fn weight_of(&self, peak: Option<&CentroidPeak>) -> f64 {
        peak.map(|p| self.weight(p)).unwrap_or(0.0)
    }
}

/// Which unpaired peaks contribute to the cosine, with a zero on the missing side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleUnmatchedSignals {
    #[default]
    KeepAllAndMatchToZero,
    RemoveAll,
    KeepLibrarySignals,
    KeepExperimentalSignals,
}

impl HandleUnmatchedSignals {
    fn keeps(&self, pair: &AlignedPair) -> bool {
        match self {
            Self::KeepAllAndMatchToZero => true,
            Self::RemoveAll => pair.is_aligned(),
            Self::KeepLibrarySignals => pair.library.is_some(),
            Self::KeepExperimentalSignals => pair.query.is_some(),
        }
    }
}

fn cosine(weights: &Weights, pairs: &[AlignedPair]) -> f64 {
    let mut dot = 0.0;
    let mut norm_library = 0.0;
    let mut norm_query = 0.0;
    for pair in pairs {
        let a = weights.weight_of(pair.library.as_ref());
        let b = weights.weight_of(pair.query.as_ref());
        dot += a * b;
        norm_library += a * a;
        norm_query += b * b;
    }
    let denom = norm_library.sqrt() * norm_query.sqrt();
    if denom > 0.0 {
        dot / denom
    } else {
        0.0
    }
}

/// The relative intensity ratio term of the NIST composite score.
///
/// Compares the ratio of each consecutive pair of matched peaks between both spectra,
/// folding ratios above one so every term lies in `[0, 1]`, and averages the terms.
fn ratio_agreement(weights: &Weights, matched: &[AlignedPair]) -> f64 {
    let n = matched.len();
    if n < 2 {
        return 0.0;
    }
    let mut total = 0.0;
    for window in matched.windows(2) {
        let (prev, cur) = (&window[0], &window[1]);
        let lib_prev = weights.weight_of(prev.library.as_ref());
        let lib_cur = weights.weight_of(cur.library.as_ref());
        let query_prev = weights.weight_of(prev.query.as_ref());
        let query_cur = weights.weight_of(cur.query.as_ref());
        let denom = lib_prev * query_cur;
        if denom <= 0.0 {
            continue;
        }
        let ratio = (lib_cur * query_prev) / denom;
        if ratio <= 0.0 {
            continue;
        }
        total += if ratio <= 1.0 { ratio } else { 1.0 / ratio };
    }
    total / (n - 1) as f64
}

fn default_min_cosine() -> f64 {
    0.7
}

/// The strategy used to score a library spectrum against a query spectrum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum SimilarityFunction {
    WeightedCosine {
        #[serde(default)]
        weights: Weights,
        #[serde(default = "default_min_cosine")]
        min_cosine: f64,
        #[serde(default)]
        handle_unmatched: HandleUnmatchedSignals,
    },
    /// Cosine blended with the agreement of relative intensity ratios, as used by NIST
    /// for electron ionization spectra
    CompositeCosine {
        #[serde(default)]
        weights: Weights,
        #[serde(default = "default_min_cosine")]
        min_cosine: f64,
    },
}

impl Default for SimilarityFunction {
    fn default() -> Self {
        Self::WeightedCosine {
            weights: Weights::default(),
            min_cosine: default_min_cosine(),
            handle_unmatched: HandleUnmatchedSignals::default(),
        }
    }
}

impl SimilarityFunction {
    pub fn name(&self) -> &'static str {
        match self {
            SimilarityFunction::WeightedCosine { .. } => "Weighted cosine similarity",
            SimilarityFunction::CompositeCosine { .. } => "Composite cosine identity",
        }
    }

    pub fn min_score(&self) -> f64 {
        match self {
            SimilarityFunction::WeightedCosine { min_cosine, .. }
            | SimilarityFunction::CompositeCosine { min_cosine, .. } => *min_cosine,
        }
    }

    /// Score `library` against `query`.
    ///
    /// Returns `None` if fewer than `min_matched_peaks` peaks align or the score is below
    /// [`SimilarityFunction::min_score`].
    pub fn similarity(
        &self,
        tolerance: &MzTolerance,
        min_matched_peaks: usize,
        library: &[CentroidPeak],
        query: &[CentroidPeak],
    ) -> Option<SpectralSimilarity> {
        if library.is_empty() || query.is_empty() {
            return None;
        }
        let pairs = align_peaks(tolerance, library, query);
        let overlap = pairs.iter().filter(|p| p.is_aligned()).count();
        if overlap == 0 || overlap < min_matched_peaks {
            return None;
        }

        let (score, aligned) = match self {
            SimilarityFunction::WeightedCosine {
                weights,
                handle_unmatched,
                ..
            } => {
                let kept: Vec<AlignedPair> =
                    pairs.into_iter().filter(|p| handle_unmatched.keeps(p)).collect();
                (cosine(weights, &kept), kept)
            }
            SimilarityFunction::CompositeCosine { weights, .. } => {
                let cos = cosine(weights, &pairs);
                let matched = remove_unaligned(&pairs);
                let n_query = query.len() as f64;
                let n_matched = matched.len() as f64;
                let ratio_term = ratio_agreement(weights, &matched);
                let score = (n_query * cos + n_matched * ratio_term) / (n_query + n_matched);
                (score, pairs)
            }
        };

        if score < self.min_score() {
            return None;
        }
        Some(SpectralSimilarity {
            function: self.name(),
            score,
            overlap,
            library_signals: library.len(),
            query_signals: query.len(),
            aligned,
        })
    }
}
