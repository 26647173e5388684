//! Match mass spectra against spectral libraries.
//!
//! The building blocks of a library search: tolerance models, candidate selection by
//! precursor m/z, peak list preprocessing, similarity scoring, isotope pattern checks and
//! the per-entry evaluation that ties them together. Running a search over many feature
//! rows in parallel lives in the `mzlibmatcher` crate.

pub mod candidates;
pub mod deisotope;
pub mod evaluate;
pub mod isotopes;
pub mod library;
pub mod params;
pub mod preprocess;
pub mod query;
pub mod result;
pub mod row;
pub mod similarity;
pub mod tolerance;

pub use crate::candidates::{filter_candidates, sort_by_precursor, PrecursorMz};
pub use crate::deisotope::{AveragineModel, Deisotoper};
pub use crate::evaluate::{MatchEvaluator, PreparedEntry, QuerySpectrum};
pub use crate::library::{
    FieldValue, LibraryField, LibrarySelection, LibrarySelectionError, LibrarySpectrum,
    SpectralLibrary,
};
pub use crate::params::{CriteriaError, MatchCriteria};
pub use crate::query::{MissingMassListError, MsLevelFilter, QueryScan, ScanPolarity};
pub use crate::result::MatchResult;
pub use crate::row::FeatureRow;
pub use crate::similarity::{HandleUnmatchedSignals, SimilarityFunction, SpectralSimilarity, Weights};
pub use crate::tolerance::{MzTolerance, PercentTolerance, RtTolerance};
