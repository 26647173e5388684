//! The immutable set of criteria a library search runs with

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::deisotope::Deisotoper;
use crate::preprocess::PairPreprocessing;
use crate::query::MsLevelFilter;
use crate::similarity::SimilarityFunction;
use crate::tolerance::{MzTolerance, PercentTolerance, RtTolerance};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CriteriaError {
    #[error("Deisotoping removes the signals an isotope pattern check looks for, only one of them may be enabled")]
    DeisotopingWithIsotopePattern,
    #[error("The minimum number of matched signals must be at least 1")]
    MinMatchTooSmall,
    #[error("The {name} tolerance must be finite and non-negative, got {value}")]
    InvalidTolerance { name: &'static str, value: f64 },
}

/// Everything that decides whether a library spectrum matches a query spectrum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCriteria {
    pub similarity: SimilarityFunction,
    /// The tolerance used to align fragment peaks
    pub mz_tolerance: MzTolerance,
    /// The tolerance used to compare precursor ions
    pub precursor_mz_tolerance: MzTolerance,
    pub min_match: usize,
    pub remove_precursor: bool,
    pub ms_level_filter: MsLevelFilter,
    pub rt_tolerance: Option<RtTolerance>,
    pub ccs_tolerance: Option<PercentTolerance>,
    pub deisotoping: Option<Deisotoper>,
    /// The minimum number of isotope spaced signal pairs in a match, if required
    pub min_isotope_signals: Option<usize>,
    pub crop_to_overlap: bool,
}

impl Default for MatchCriteria {
    fn default() -> Self {
        Self {
            similarity: SimilarityFunction::default(),
            mz_tolerance: MzTolerance::new(0.0015, 10.0),
            precursor_mz_tolerance: MzTolerance::new(0.001, 5.0),
            min_match: 4,
            remove_precursor: true,
            ms_level_filter: MsLevelFilter::default(),
            rt_tolerance: None,
            ccs_tolerance: None,
            deisotoping: None,
            min_isotope_signals: None,
            crop_to_overlap: false,
        }
    }
}

fn check_tolerance(name: &'static str, value: f64) -> Result<(), CriteriaError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(CriteriaError::InvalidTolerance { name, value })
    }
}

impl MatchCriteria {
    pub fn validate(&self) -> Result<(), CriteriaError> {
        if self.deisotoping.is_some() && self.min_isotope_signals.is_some() {
            return Err(CriteriaError::DeisotopingWithIsotopePattern);
        }
        if self.min_match < 1 {
            return Err(CriteriaError::MinMatchTooSmall);
        }
        check_tolerance("spectral m/z", self.mz_tolerance.absolute)?;
        check_tolerance("spectral ppm", self.mz_tolerance.ppm)?;
        check_tolerance("precursor m/z", self.precursor_mz_tolerance.absolute)?;
        check_tolerance("precursor ppm", self.precursor_mz_tolerance.ppm)?;
        if let Some(tol) = self.ccs_tolerance {
            check_tolerance("CCS", tol.fraction)?;
        }
        if let Some(tol) = self.rt_tolerance {
            let value = match tol {
                RtTolerance::Absolute(v) | RtTolerance::Relative(v) => v as f64,
            };
            check_tolerance("retention time", value)?;
        }
        Ok(())
    }

    /// A copy of these criteria searching at a different MS level
    pub fn with_ms_level_filter(&self, ms_level_filter: MsLevelFilter) -> Self {
        let mut this = self.clone();
        this.ms_level_filter = ms_level_filter;
        this
    }

    pub fn pair_preprocessing(&self) -> PairPreprocessing {
        PairPreprocessing {
            mz_tolerance: self.mz_tolerance,
            crop_to_overlap: self.crop_to_overlap,
            remove_precursor: self.remove_precursor,
            ms1_only: self.ms_level_filter.is_ms1_only(),
        }
    }
}
