use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, debug_span, info, trace, warn, Level};

use mzlibmatch::candidates::{filter_candidates, sort_by_precursor};
use mzlibmatch::result::sort_by_score;
use mzlibmatch::{
    CriteriaError, FeatureRow, LibrarySelection, LibrarySelectionError, MatchCriteria,
    MatchEvaluator, MatchResult, MissingMassListError, MsLevelFilter, PreparedEntry, QueryScan,
    SpectralLibrary,
};

use crate::config::SearchConfig;
use crate::progress::{CancellationToken, MatchProgress, MatchTally};
use crate::selection::FragmentScanSelection;

#[derive(Debug, Error)]
pub enum LibraryMatchError {
    #[error("The match criteria are invalid: {0}")]
    InvalidCriteria(
        #[source]
        #[from]
        CriteriaError,
    ),
    #[error("Could not select spectral libraries: {0}")]
    LibrarySelection(
        #[source]
        #[from]
        LibrarySelectionError,
    ),
    #[error("Failed to build the thread pool: {0}")]
    ThreadPool(
        #[source]
        #[from]
        rayon::ThreadPoolBuildError,
    ),
}

/// The outcome of matching a batch of feature rows
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct MatchSummary {
    pub tally: MatchTally,
    /// Whether the run stopped early because it was cancelled
    pub cancelled: bool,
    pub elapsed: Duration,
}

struct RowOutcome {
    index: usize,
    matches: Vec<MatchResult>,
    tally: MatchTally,
}

fn create_threadpool(threads: i32) -> Result<rayon::ThreadPool, rayon::ThreadPoolBuildError> {
    let num_threads = if threads > 0 {
        threads as usize
    } else {
        thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    };
    debug!("Using {} cores", num_threads);
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
}

/// Filter, deisotope and sort library entries once for a run.
///
/// Entries with fewer peaks than the minimum match count can never match and are dropped, as
/// are entries without a precursor m/z unless searching MS1 spectra.
pub fn prepare_entries<'a>(
    criteria: &MatchCriteria,
    libraries: impl IntoIterator<Item = &'a SpectralLibrary>,
) -> Vec<PreparedEntry> {
    let ms1_only = criteria.ms_level_filter.is_ms1_only();
    let mut entries: Vec<PreparedEntry> = libraries
        .into_iter()
        .flat_map(|lib| lib.entries.iter())
        .filter(|entry| entry.len() >= criteria.min_match)
        .filter(|entry| ms1_only || entry.precursor_mz().is_some())
        .map(|entry| PreparedEntry::new(Arc::clone(entry), criteria.deisotoping.as_ref()))
        .collect();
    sort_by_precursor(&mut entries);
    entries
}

/// Searches feature rows or single scans against a fixed set of library entries
pub struct LibraryMatcher {
    evaluator: MatchEvaluator,
    entries: Vec<PreparedEntry>,
    thread_pool: rayon::ThreadPool,
    progress: Arc<MatchProgress>,
    cancellation: CancellationToken,
}

impl LibraryMatcher {
    pub fn new(
        criteria: MatchCriteria,
        libraries: &[SpectralLibrary],
        selection: &LibrarySelection,
        threads: i32,
    ) -> Result<Self, LibraryMatchError> {
        criteria.validate()?;
        let selected = selection.select(libraries)?;
        let names: Vec<&str> = selected.iter().map(|lib| lib.name.as_str()).collect();
        let start = Instant::now();
        let entries = prepare_entries(&criteria, selected.iter().copied());
        info!(
            "Prepared {} library entries from {} in {:0.3?}",
            entries.len(),
            names.join(", "),
            start.elapsed()
        );
        let thread_pool = create_threadpool(threads)?;
        Ok(Self {
            evaluator: MatchEvaluator::new(criteria),
            entries,
            thread_pool,
            progress: Arc::new(MatchProgress::default()),
            cancellation: CancellationToken::new(),
        })
    }

    pub fn from_config(
        config: &SearchConfig,
        libraries: &[SpectralLibrary],
    ) -> Result<Self, LibraryMatchError> {
        if tracing::enabled!(Level::DEBUG) {
            match config.to_toml_string() {
                Ok(text) => debug!("Search configuration:\n{text}"),
                Err(e) => warn!("Could not render the search configuration: {e}"),
            }
        }
        Self::new(
            config.to_criteria(),
            libraries,
            &config.libraries,
            config.threads,
        )
    }

    pub fn criteria(&self) -> &MatchCriteria {
        self.evaluator.criteria()
    }

    pub fn entries(&self) -> &[PreparedEntry] {
        &self.entries
    }

    pub fn progress(&self) -> Arc<MatchProgress> {
        Arc::clone(&self.progress)
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// The scans of `row` to compare against the library
    fn select_scans(
        &self,
        row: &FeatureRow,
        selection: &dyn FragmentScanSelection,
    ) -> Vec<Arc<QueryScan>> {
        let criteria = self.criteria();
        if criteria.ms_level_filter.is_ms1_only() {
            let pseudo: Vec<_> = selection
                .fragment_scans(row)
                .into_iter()
                .filter(|scan| scan.is_pseudo_spectrum)
                .collect();
            if !pseudo.is_empty() {
                return pseudo;
            }
            return row.representative_scan.iter().cloned().collect();
        }
        selection
            .fragment_scans(row)
            .into_iter()
            .filter(|scan| {
                criteria.ms_level_filter.accepts(scan.ms_level)
                    && scan
                        .peak_count()
                        .map(|n| n >= criteria.min_match)
                        .unwrap_or(true)
            })
            .collect()
    }

    /// All library matches for a single row, best first
    pub fn match_row(
        &self,
        row: &FeatureRow,
        selection: &dyn FragmentScanSelection,
    ) -> Result<Vec<MatchResult>, MissingMassListError> {
        let scans = self.select_scans(row, selection);
        if scans.is_empty() {
            return Ok(Vec::new());
        }
        let queries = scans
            .iter()
            .map(|scan| {
                self.evaluator
                    .prepare_query(scan, row.average_mz, row.average_rt, row.average_ccs)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let criteria = self.criteria();
        let candidates = filter_candidates(
            &self.entries,
            row.average_mz,
            &criteria.precursor_mz_tolerance,
            criteria.ms_level_filter,
        );
        trace!(
            "Row {} has {} query spectra and {} candidate entries",
            row.id,
            queries.len(),
            candidates.len()
        );

        let mut matches: Vec<MatchResult> = candidates
            .iter()
            .filter_map(|entry| self.evaluator.best_match(entry, &queries))
            .collect();
        sort_by_score(&mut matches);

        if tracing::enabled!(Level::TRACE) {
            for m in matches.iter() {
                trace!(
                    "Row {} matched {} with score {:0.4} on scan {}",
                    row.id,
                    m.entry.name(),
                    m.score(),
                    m.scan.id
                );
            }
        }
        Ok(matches)
    }

    /// Match every row with fragmentation data in parallel and attach the results to the rows.
    ///
    /// Rows whose scans lack a mass list are skipped and counted as errors. If the run is
    /// cancelled, rows not yet started are left untouched and finished rows keep their results.
    pub fn match_rows(
        &self,
        rows: &mut [FeatureRow],
        selection: &dyn FragmentScanSelection,
    ) -> MatchSummary {
        let start = Instant::now();
        let targets: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.has_fragmentation())
            .map(|(i, _)| i)
            .collect();
        self.progress.reset(targets.len());
        info!(
            "Matching {} rows against {} library entries",
            targets.len(),
            self.entries.len()
        );

        let shared_rows: &[FeatureRow] = rows;
        let outcomes: Vec<Option<RowOutcome>> = self.thread_pool.install(|| {
            targets
                .par_iter()
                .map(|&index| {
                    if self.cancellation.is_cancelled() {
                        return None;
                    }
                    let row = &shared_rows[index];
                    let span = debug_span!("match_row", row_id = row.id);
                    let _entered = span.enter();
                    let mut tally = MatchTally {
                        rows: 1,
                        ..Default::default()
                    };
                    let matches = match self.match_row(row, selection) {
                        Ok(matches) => {
                            self.progress.add_matches(matches.len());
                            tally.matches = matches.len();
                            tally.rows_with_matches = usize::from(!matches.is_empty());
                            matches
                        }
                        Err(e) => {
                            warn!("{e}, skipping row {}", row.id);
                            self.progress.add_error();
                            tally.errors = 1;
                            Vec::new()
                        }
                    };
                    self.progress.finish_unit();
                    Some(RowOutcome {
                        index,
                        matches,
                        tally,
                    })
                })
                .collect()
        });

        let mut tally = MatchTally::default();
        let mut cancelled = false;
        for outcome in outcomes {
            let Some(outcome) = outcome else {
                cancelled = true;
                continue;
            };
            tally += outcome.tally;
            if !outcome.matches.is_empty() {
                let row = &mut rows[outcome.index];
                row.add_spectral_matches(outcome.matches);
                sort_by_score(&mut row.spectral_matches);
            }
        }

        let elapsed = start.elapsed();
        if cancelled {
            info!("Library matching was cancelled after {} rows", tally.rows);
        }
        info!(
            "Library matches={} (Errors: {}); rows={}; rows with matches={}; library entries={}",
            tally.matches,
            tally.errors,
            tally.rows,
            tally.rows_with_matches,
            self.entries.len()
        );
        info!(
            "Elapsed Time: {:0.3?} ({:0.2} rows/sec)",
            elapsed,
            tally.rows as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
        );
        MatchSummary {
            tally,
            cancelled,
            elapsed,
        }
    }

    /// Match a single scan against the library.
    ///
    /// The MS level of the scan decides whether precursor dependent steps run, and
    /// `precursor_override` replaces the scan's own precursor m/z when given.
    pub fn match_scan(
        &self,
        scan: &Arc<QueryScan>,
        precursor_override: Option<f64>,
    ) -> Result<Vec<MatchResult>, MissingMassListError> {
        self.progress.reset(1);
        let criteria = self
            .criteria()
            .with_ms_level_filter(MsLevelFilter::of(scan.ms_level));
        let evaluator = MatchEvaluator::new(criteria);
        let precursor_mz = precursor_override.or(scan.precursor_mz);

        let query = match evaluator.prepare_query(scan, precursor_mz, scan.retention_time, scan.ccs) {
            Ok(query) => query,
            Err(e) => {
                warn!("{e}");
                self.progress.add_error();
                return Err(e);
            }
        };
        let criteria = evaluator.criteria();
        let candidates = filter_candidates(
            &self.entries,
            precursor_mz,
            &criteria.precursor_mz_tolerance,
            criteria.ms_level_filter,
        );

        let queries = [query];
        let mut matches = Vec::new();
        for entry in candidates {
            if self.cancellation.is_cancelled() {
                info!("Library matching of scan {} was cancelled", scan.id);
                break;
            }
            if let Some(m) = evaluator.best_match(entry, &queries) {
                matches.push(m);
            }
        }
        sort_by_score(&mut matches);
        self.progress.add_matches(matches.len());
        self.progress.finish_unit();
        info!(
            "Scan {} matched {} of {} candidate library entries",
            scan.id,
            matches.len(),
            candidates.len()
        );
        Ok(matches)
    }
}
