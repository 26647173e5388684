//! Evaluate one library entry against the query spectra of a row or a single scan.
//!
//! Each pairing passes through the same stages: metadata prefilters (polarity, retention
//! time, precursor m/z, CCS), peak list preprocessing, similarity scoring and finally the
//! optional isotope pattern check. Anything that fails a stage is not a match.

use std::sync::Arc;

use mzpeaks::CentroidPeak;
use tracing::trace;

use crate::candidates::PrecursorMz;
use crate::deisotope::Deisotoper;
use crate::isotopes::check_for_isotope_pattern;
use crate::library::LibrarySpectrum;
use crate::params::MatchCriteria;
use crate::preprocess::PairPreprocessing;
use crate::query::{weak_polarity_check, MissingMassListError, QueryScan, ScanPolarity};
use crate::result::MatchResult;
use crate::similarity::SpectralSimilarity;
use crate::tolerance::{percent_error, RtTolerance};

/// A library entry with its metadata extracted and its peaks deisotoped once for the run
#[derive(Debug, Clone)]
pub struct PreparedEntry {
    pub entry: Arc<LibrarySpectrum>,
    pub peaks: Vec<CentroidPeak>,
    pub precursor_mz: Option<f64>,
    pub retention_time: Option<f32>,
    pub ccs: Option<f32>,
}

impl PreparedEntry {
    pub fn new(entry: Arc<LibrarySpectrum>, deisotoper: Option<&Deisotoper>) -> Self {
        let peaks = match deisotoper {
            Some(d) => d.deisotope(entry.peaks()),
            None => entry.peaks().to_vec(),
        };
        Self {
            precursor_mz: entry.precursor_mz(),
            retention_time: entry.retention_time(),
            ccs: entry.ccs(),
            peaks,
            entry,
        }
    }
}

impl PrecursorMz for PreparedEntry {
    fn precursor_mz(&self) -> Option<f64> {
        self.precursor_mz
    }
}

/// A scan's peaks ready for comparison, along with the values it is compared by.
///
/// For feature rows the precursor m/z, retention time and CCS are the row's averages
/// rather than the scan's own.
#[derive(Debug, Clone)]
pub struct QuerySpectrum {
    pub scan: Arc<QueryScan>,
    pub precursor_mz: Option<f64>,
    pub retention_time: Option<f32>,
    pub ccs: Option<f32>,
    pub polarity: ScanPolarity,
    pub peaks: Vec<CentroidPeak>,
}

#[derive(Debug, Clone)]
pub struct MatchEvaluator {
    criteria: MatchCriteria,
    preprocessing: PairPreprocessing,
}

impl MatchEvaluator {
    pub fn new(criteria: MatchCriteria) -> Self {
        let preprocessing = criteria.pair_preprocessing();
        Self {
            criteria,
            preprocessing,
        }
    }

    pub fn criteria(&self) -> &MatchCriteria {
        &self.criteria
    }

    /// Read and deisotope the mass list of `scan`
    pub fn prepare_query(
        &self,
        scan: &Arc<QueryScan>,
        precursor_mz: Option<f64>,
        retention_time: Option<f32>,
        ccs: Option<f32>,
    ) -> Result<QuerySpectrum, MissingMassListError> {
        let mass_list = scan.mass_list()?;
        let peaks = match self.criteria.deisotoping.as_ref() {
            Some(d) => d.deisotope(mass_list),
            None => mass_list.to_vec(),
        };
        Ok(QuerySpectrum {
            scan: Arc::clone(scan),
            precursor_mz,
            retention_time,
            ccs,
            polarity: scan.polarity,
            peaks,
        })
    }

    pub fn check_precursor_mz(&self, entry: &PreparedEntry, query: &QuerySpectrum) -> bool {
        if self.criteria.ms_level_filter.is_ms1_only() {
            return true;
        }
        match (entry.precursor_mz, query.precursor_mz) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(reference), Some(mz)) => self
                .criteria
                .precursor_mz_tolerance
                .check_within_tolerance(reference, mz),
        }
    }

    pub fn check_ccs(&self, entry: &PreparedEntry, query: &QuerySpectrum) -> bool {
        self.criteria
            .ccs_tolerance
            .map(|tol| tol.matches(query.ccs, entry.ccs))
            .unwrap_or(true)
    }

    pub fn check_retention_time(&self, entry: &PreparedEntry, query: &QuerySpectrum) -> bool {
        RtTolerance::check(
            self.criteria.rt_tolerance.as_ref(),
            entry.retention_time,
            query.retention_time,
        )
    }

    /// Run the full pipeline for one entry and one query spectrum
    pub fn match_spectrum(
        &self,
        entry: &PreparedEntry,
        query: &QuerySpectrum,
    ) -> Option<SpectralSimilarity> {
        if !weak_polarity_check(&entry.entry, query.polarity) {
            return None;
        }
        if !(self.check_retention_time(entry, query)
            && self.check_precursor_mz(entry, query)
            && self.check_ccs(entry, query))
        {
            return None;
        }

        let (library, experimental) = self.preprocessing.prepare(
            &entry.peaks,
            &query.peaks,
            entry.precursor_mz,
            query.precursor_mz,
        );
        let similarity = self.criteria.similarity.similarity(
            &self.criteria.mz_tolerance,
            self.criteria.min_match,
            &library,
            &experimental,
        )?;

        if let Some(min_signals) = self.criteria.min_isotope_signals {
            if !check_for_isotope_pattern(&similarity, &self.criteria.mz_tolerance, min_signals) {
                trace!(
                    "{} matched scan {} but lacks an isotope pattern",
                    entry.entry.name(),
                    query.scan.id
                );
                return None;
            }
        }
        Some(similarity)
    }

    /// The best scoring match of `entry` over all `queries`.
    ///
    /// A later query only replaces the current best if it scores strictly higher.
    pub fn best_match(
        &self,
        entry: &PreparedEntry,
        queries: &[QuerySpectrum],
    ) -> Option<MatchResult> {
        let mut best: Option<(&QuerySpectrum, SpectralSimilarity)> = None;
        for query in queries {
            let Some(similarity) = self.match_spectrum(entry, query) else {
                continue;
            };
            let replace = match &best {
                Some((_, current)) => current.score < similarity.score,
                None => true,
            };
            if replace {
                best = Some((query, similarity));
            }
        }
        best.map(|(query, similarity)| MatchResult {
            entry: Arc::clone(&entry.entry),
            scan: Arc::clone(&query.scan),
            similarity,
            ccs_relative_error: percent_error(entry.ccs, query.ccs),
            query_mz: query.precursor_mz,
            query_rt: query.retention_time,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::library::LibraryField;
    use crate::query::MsLevelFilter;
    use crate::tolerance::PercentTolerance;

    fn fragments(scale: f32) -> Vec<CentroidPeak> {
        [(60.0, 20.0), (85.0, 100.0), (110.0, 45.0), (140.0, 30.0), (171.0, 10.0)]
            .iter()
            .enumerate()
            .map(|(i, (mz, int))| CentroidPeak::new(*mz, int * scale, i as u32))
            .collect()
    }

    fn entry() -> PreparedEntry {
        let spectrum = LibrarySpectrum::new(fragments(1.0))
            .with_field(LibraryField::PrecursorMz, 200.1)
            .with_field(LibraryField::RetentionTime, 5.0f32)
            .with_field(LibraryField::Ccs, 150.0f32)
            .with_field(LibraryField::Polarity, "positive");
        PreparedEntry::new(Arc::new(spectrum), None)
    }

    fn query(evaluator: &MatchEvaluator, id: &str, peaks: Vec<CentroidPeak>) -> QuerySpectrum {
        let scan = Arc::new(
            QueryScan::new(id, 2, Some(peaks)).with_polarity(ScanPolarity::Positive),
        );
        evaluator
            .prepare_query(&scan, Some(200.1005), Some(5.01), None)
            .unwrap()
    }

    fn criteria() -> MatchCriteria {
        MatchCriteria {
            rt_tolerance: Some(RtTolerance::Absolute(0.05)),
            ccs_tolerance: Some(PercentTolerance::new(0.05)),
            ..Default::default()
        }
    }

    #[test]
    fn test_match_spectrum_prefilters() {
        let evaluator = MatchEvaluator::new(criteria());
        let entry = entry();
        let q = query(&evaluator, "a", fragments(2.0));
        assert!(evaluator.match_spectrum(&entry, &q).is_some());

        let mut far = q.clone();
        far.retention_time = Some(6.0);
        assert!(evaluator.match_spectrum(&entry, &far).is_none());

        let mut neg = q.clone();
        neg.polarity = ScanPolarity::Negative;
        assert!(evaluator.match_spectrum(&entry, &neg).is_none());

        let mut wrong_precursor = q.clone();
        wrong_precursor.precursor_mz = Some(201.0);
        assert!(evaluator.match_spectrum(&entry, &wrong_precursor).is_none());

        let mut no_precursor = q.clone();
        no_precursor.precursor_mz = None;
        assert!(evaluator.match_spectrum(&entry, &no_precursor).is_some());

        let mut wrong_ccs = q.clone();
        wrong_ccs.ccs = Some(170.0);
        assert!(evaluator.match_spectrum(&entry, &wrong_ccs).is_none());

        let ms1 = MatchEvaluator::new(criteria().with_ms_level_filter(MsLevelFilter::Ms1Only));
        assert!(ms1.match_spectrum(&entry, &wrong_precursor).is_some());
    }

    #[test]
    fn test_best_match_keeps_first_on_ties() {
        let evaluator = MatchEvaluator::new(criteria());
        let entry = entry();
        let queries = vec![
            query(&evaluator, "first", fragments(1.0)),
            query(&evaluator, "second", fragments(1.0)),
        ];
        let best = evaluator.best_match(&entry, &queries).unwrap();
        assert_eq!(best.scan.id, "first");
        assert_eq!(best.query_mz, Some(200.1005));
        assert_eq!(best.ccs_relative_error, None);

        let mut distorted = fragments(1.0);
        distorted[1].intensity = 5.0;
        let queries = vec![
            query(&evaluator, "worse", distorted),
            query(&evaluator, "better", fragments(1.0)),
        ];
        let best = evaluator.best_match(&entry, &queries).unwrap();
        assert_eq!(best.scan.id, "better");
    }

    #[test]
    fn test_missing_mass_list() {
        let evaluator = MatchEvaluator::new(criteria());
        let scan = Arc::new(QueryScan::new("empty", 2, None));
        assert!(evaluator.prepare_query(&scan, None, None, None).is_err());
    }
}
