//! Library match results and their ordering

use std::sync::Arc;

use crate::library::LibrarySpectrum;
use crate::query::QueryScan;
use crate::similarity::SpectralSimilarity;

/// A library spectrum that matched a query, with the scan that matched it best
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub entry: Arc<LibrarySpectrum>,
    pub scan: Arc<QueryScan>,
    pub similarity: SpectralSimilarity,
    /// The relative CCS error of the query against the library value, if both are known
    pub ccs_relative_error: Option<f32>,
    pub query_mz: Option<f64>,
    pub query_rt: Option<f32>,
}

impl MatchResult {
    pub fn score(&self) -> f64 {
        self.similarity.score
    }
}

/// Order matches by descending score, keeping the existing order of equal scores
pub fn sort_by_score(results: &mut [MatchResult]) {
    results.sort_by(|a, b| b.score().total_cmp(&a.score()));
}
