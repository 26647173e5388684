//! Choosing which scans of a feature row are searched

use std::sync::Arc;

use mzlibmatch::{FeatureRow, QueryScan};

/// A source of candidate fragment scans for a row, such as a scan merging or best-scan policy
pub trait FragmentScanSelection: Sync {
    fn fragment_scans(&self, row: &FeatureRow) -> Vec<Arc<QueryScan>>;
}

/// Use every fragment scan attached to the row as is
#[derive(Debug, Default, Clone, Copy)]
pub struct AllFragmentScans;

impl FragmentScanSelection for AllFragmentScans {
    fn fragment_scans(&self, row: &FeatureRow) -> Vec<Arc<QueryScan>> {
        row.fragment_scans.clone()
    }
}

/// Use only the fragment scan with the most peaks
#[derive(Debug, Default, Clone, Copy)]
pub struct MostSignalsScan;

impl FragmentScanSelection for MostSignalsScan {
    fn fragment_scans(&self, row: &FeatureRow) -> Vec<Arc<QueryScan>> {
        row.fragment_scans
            .iter()
            .max_by_key(|scan| scan.peak_count().unwrap_or_default())
            .cloned()
            .into_iter()
            .collect()
    }
}
