//! Isotope satellite removal for centroided peak lists.
//!
//! Two strategies are available: a fast mass-list based walk over 13C spacings, and
//! a full isotopic pattern fit using the averagine models from [`mzdeisotope`].

use mzdeisotope::deconvolute_peaks;
use mzdeisotope::isotopic_model::{IsotopicModels, IsotopicPatternParams, PROTON};
use mzdeisotope::scorer::{MSDeconvScorer, MaximizingFitFilter, ScoreType};
use mzpeaks::{prelude::*, CentroidPeak, MZPeakSetType, Tolerance};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::tolerance::MzTolerance;

/// The mass difference between 13C and 12C
pub const C13_DELTA: f64 = 1.003355;

/// The averagine composition used to predict isotopic patterns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AveragineModel {
    #[default]
    Peptide,
    Glycan,
    Glycopeptide,
}

impl From<AveragineModel> for IsotopicModels {
    fn from(value: AveragineModel) -> Self {
        match value {
            AveragineModel::Peptide => IsotopicModels::Peptide,
            AveragineModel::Glycan => IsotopicModels::Glycan,
            AveragineModel::Glycopeptide => IsotopicModels::Glycopeptide,
        }
    }
}

/// A deisotoping algorithm and its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum Deisotoper {
    MassList {
        #[serde(default)]
        mz_tolerance: MzTolerance,
        /// Require each successive isotope peak to be less intense than the one before it
        #[serde(default)]
        monotonic_shape: bool,
        #[serde(default = "default_maximum_charge")]
        maximum_charge: i32,
    },
    Averagine {
        #[serde(default)]
        model: AveragineModel,
        #[serde(default = "default_error_tolerance_ppm")]
        error_tolerance_ppm: f64,
        #[serde(default = "default_maximum_charge")]
        maximum_charge: i32,
        #[serde(default = "default_score_threshold")]
        score_threshold: ScoreType,
        #[serde(default = "default_max_missed_peaks")]
        max_missed_peaks: u16,
    },
}

fn default_maximum_charge() -> i32 {
    1
}

fn default_error_tolerance_ppm() -> f64 {
    20.0
}

fn default_score_threshold() -> ScoreType {
    10.0
}

fn default_max_missed_peaks() -> u16 {
    1
}

impl Default for Deisotoper {
    fn default() -> Self {
        Self::MassList {
            mz_tolerance: MzTolerance::default(),
            monotonic_shape: false,
            maximum_charge: default_maximum_charge(),
        }
    }
}

impl Deisotoper {
    /// Remove isotope satellites from `peaks`, returning the surviving peaks in ascending m/z order.
    pub fn deisotope(&self, peaks: &[CentroidPeak]) -> Vec<CentroidPeak> {
        if peaks.is_empty() {
            return Vec::new();
        }
        match self {
            Deisotoper::MassList {
                mz_tolerance,
                monotonic_shape,
                maximum_charge,
            } => filter_isotopes(peaks, mz_tolerance, *monotonic_shape, *maximum_charge),
            Deisotoper::Averagine {
                model,
                error_tolerance_ppm,
                maximum_charge,
                score_threshold,
                max_missed_peaks,
            } => fit_isotopic_patterns(
                peaks,
                *model,
                *error_tolerance_ppm,
                *maximum_charge,
                *score_threshold,
                *max_missed_peaks,
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PeakState {
    Unvisited,
    Kept,
    Claimed,
}

/// Find the unvisited peak closest to `target` within `tolerance`.
///
/// `sorted` must be in ascending m/z order.
fn closest_unvisited(
    sorted: &[CentroidPeak],
    states: &[PeakState],
    target: f64,
    tolerance: &MzTolerance,
) -> Option<usize> {
    let window = tolerance.range(target);
    let start = sorted.partition_point(|p| p.mz < window.start);
    let mut best: Option<(usize, f64)> = None;
    for (i, p) in sorted.iter().enumerate().skip(start) {
        if p.mz > window.end {
            break;
        }
        if states[i] != PeakState::Unvisited {
            continue;
        }
        let err = (p.mz - target).abs();
        if best.map(|(_, e)| err < e).unwrap_or(true) {
            best = Some((i, err));
        }
    }
    best.map(|(i, _)| i)
}

fn isotope_series(
    sorted: &[CentroidPeak],
    states: &[PeakState],
    seed: usize,
    charge: i32,
    tolerance: &MzTolerance,
    monotonic_shape: bool,
) -> Vec<usize> {
    let step = C13_DELTA / charge as f64;
    let mut series = Vec::new();
    let mut last = seed;
    loop {
        let target = sorted[seed].mz + step * (series.len() + 1) as f64;
        let Some(next) = closest_unvisited(sorted, states, target, tolerance) else {
            break;
        };
        if next == seed || series.contains(&next) {
            break;
        }
        if monotonic_shape && sorted[next].intensity >= sorted[last].intensity {
            break;
        }
        series.push(next);
        last = next;
    }
    series
}

/// Walk 13C isotope series forward from each peak, most intense first, and drop the satellites.
///
/// For each surviving peak the charge state with the longest series wins, with ties going to
/// the lower charge.
pub fn filter_isotopes(
    peaks: &[CentroidPeak],
    tolerance: &MzTolerance,
    monotonic_shape: bool,
    maximum_charge: i32,
) -> Vec<CentroidPeak> {
    let mut sorted = peaks.to_vec();
    sorted.sort_by(|a, b| a.mz.total_cmp(&b.mz));

    let mut by_intensity: Vec<usize> = (0..sorted.len()).collect();
    by_intensity.sort_by(|a, b| sorted[*b].intensity.total_cmp(&sorted[*a].intensity));

    let mut states = vec![PeakState::Unvisited; sorted.len()];
    for seed in by_intensity {
        if states[seed] != PeakState::Unvisited {
            continue;
        }
        states[seed] = PeakState::Kept;
        let mut best: Vec<usize> = Vec::new();
        for charge in 1..=maximum_charge.max(1) {
            let series = isotope_series(&sorted, &states, seed, charge, tolerance, monotonic_shape);
            if series.len() > best.len() {
                best = series;
            }
        }
        if !best.is_empty() {
            trace!(
                "Peak at {:.4} claimed {} isotope peaks",
                sorted[seed].mz,
                best.len()
            );
        }
        for i in best {
            states[i] = PeakState::Claimed;
        }
    }

    sorted
        .into_iter()
        .zip(states)
        .filter_map(|(p, s)| (s == PeakState::Kept).then_some(p))
        .collect()
}

/// Fit averagine isotopic patterns and drop the non-monoisotopic members of each fitted envelope.
///
/// Peaks that no envelope claims are kept as they are.
fn fit_isotopic_patterns(
    peaks: &[CentroidPeak],
    model: AveragineModel,
    error_tolerance_ppm: f64,
    maximum_charge: i32,
    score_threshold: ScoreType,
    max_missed_peaks: u16,
) -> Vec<CentroidPeak> {
    let mut sorted = peaks.to_vec();
    sorted.sort_by(|a, b| a.mz.total_cmp(&b.mz));

    let result = deconvolute_peaks(
        MZPeakSetType::new(sorted.clone()),
        IsotopicModels::from(model),
        Tolerance::PPM(error_tolerance_ppm),
        (1, maximum_charge.max(1)),
        MSDeconvScorer::default(),
        MaximizingFitFilter::new(score_threshold),
        max_missed_peaks,
        IsotopicPatternParams::new(0.8, 0.001, None, PROTON),
        true,
    );
    let deconvoluted = match result {
        Ok(deconvoluted) => deconvoluted,
        Err(e) => {
            warn!("Isotopic pattern fitting failed, keeping the input peaks: {e}");
            return sorted;
        }
    };

    let tolerance = MzTolerance::new(0.0, error_tolerance_ppm);
    let mut states = vec![PeakState::Unvisited; sorted.len()];
    for solution in deconvoluted.iter() {
        if let Some(mono) = solution.envelope.first() {
            if let Some(i) = closest_unvisited(&sorted, &states, mono.mz, &tolerance) {
                states[i] = PeakState::Kept;
            }
        }
    }
    for solution in deconvoluted.iter() {
        let mut claimed = 0usize;
        for point in solution.envelope.iter().skip(1) {
            if let Some(i) = closest_unvisited(&sorted, &states, point.mz, &tolerance) {
                states[i] = PeakState::Claimed;
                claimed += 1;
            }
        }
        if claimed > 0 {
            trace!(
                "Envelope at charge {} claimed {} isotope peaks",
                solution.charge,
                claimed
            );
        }
    }

    sorted
        .into_iter()
        .zip(states)
        .filter_map(|(p, s)| (s != PeakState::Claimed).then_some(p))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn peak(mz: f64, intensity: f32) -> CentroidPeak {
        CentroidPeak::new(mz, intensity, 0)
    }

    #[test]
    fn test_removes_singly_charged_series() {
        let peaks = vec![
            peak(300.0 + C13_DELTA, 40.0),
            peak(300.0, 100.0),
            peak(300.0 + 2.0 * C13_DELTA, 10.0),
            peak(250.0, 20.0),
        ];
        let tol = MzTolerance::new(0.002, 5.0);
        let kept = filter_isotopes(&peaks, &tol, true, 1);
        let mzs: Vec<f64> = kept.iter().map(|p| p.mz).collect();
        assert_eq!(mzs, vec![250.0, 300.0]);
    }

    #[test]
    fn test_monotonic_shape_stops_series() {
        let peaks = vec![
            peak(300.0, 100.0),
            peak(300.0 + C13_DELTA, 40.0),
            peak(300.0 + 2.0 * C13_DELTA, 60.0),
        ];
        let tol = MzTolerance::new(0.002, 5.0);
        let kept = filter_isotopes(&peaks, &tol, true, 1);
        assert_eq!(kept.len(), 2);
        let kept = filter_isotopes(&peaks, &tol, false, 1);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_doubly_charged_series() {
        let step = C13_DELTA / 2.0;
        let peaks = vec![
            peak(500.0, 100.0),
            peak(500.0 + step, 80.0),
            peak(500.0 + 2.0 * step, 30.0),
        ];
        let tol = MzTolerance::new(0.002, 5.0);
        assert_eq!(filter_isotopes(&peaks, &tol, true, 1).len(), 3);
        let kept = filter_isotopes(&peaks, &tol, true, 2);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].mz, 500.0);
    }

    #[test]
    fn test_deisotoper_dispatch() {
        let deisotoper = Deisotoper::default();
        assert!(deisotoper.deisotope(&[]).is_empty());
        let peaks = vec![peak(120.0, 5.0), peak(100.0, 10.0)];
        let kept = deisotoper.deisotope(&peaks);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].mz, 100.0);
    }

    fn averagine() -> Deisotoper {
        Deisotoper::Averagine {
            model: AveragineModel::Peptide,
            error_tolerance_ppm: 20.0,
            maximum_charge: 1,
            score_threshold: 10.0,
            max_missed_peaks: 1,
        }
    }

    #[test_log::test]
    fn test_averagine_keeps_isolated_fragments() {
        let peaks = vec![
            peak(60.0, 20.0),
            peak(85.0, 100.0),
            peak(110.0, 45.0),
            peak(140.0, 30.0),
            peak(171.0, 10.0),
        ];
        let kept = averagine().deisotope(&peaks);
        let mzs: Vec<f64> = kept.iter().map(|p| p.mz).collect();
        assert_eq!(mzs, vec![60.0, 85.0, 110.0, 140.0, 171.0]);
    }

    #[test_log::test]
    fn test_averagine_collapses_envelope() {
        let spacing = 1.002863;
        let peaks = vec![
            peak(1000.0 + spacing, 5500.0),
            peak(310.0, 800.0),
            peak(1000.0, 10000.0),
            peak(1000.0 + 2.0 * spacing, 1800.0),
            peak(450.0, 1200.0),
        ];
        let kept = averagine().deisotope(&peaks);
        let mzs: Vec<f64> = kept.iter().map(|p| p.mz).collect();
        assert_eq!(mzs, vec![310.0, 450.0, 1000.0]);
        assert_eq!(kept[2].intensity, 10000.0);
    }
}
