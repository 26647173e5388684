//! Feature list rows that carry the scans to search and the matches found for them

use std::sync::Arc;

use crate::query::QueryScan;
use crate::result::MatchResult;

/// A detected feature, aligned across samples, with its associated fragment scans.
#[derive(Debug, Clone, Default)]
pub struct FeatureRow {
    pub id: u32,
    pub average_mz: Option<f64>,
    pub average_rt: Option<f32>,
    pub average_ccs: Option<f32>,
    /// All fragmentation scans linked to this row
    pub fragment_scans: Vec<Arc<QueryScan>>,
    /// The most representative MS1 scan or pseudo spectrum, if any
    pub representative_scan: Option<Arc<QueryScan>>,
    pub spectral_matches: Vec<MatchResult>,
}

impl FeatureRow {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn with_average_mz(mut self, mz: f64) -> Self {
        self.average_mz = Some(mz);
        self
    }

    pub fn with_average_rt(mut self, rt: f32) -> Self {
        self.average_rt = Some(rt);
        self
    }

    pub fn with_average_ccs(mut self, ccs: f32) -> Self {
        self.average_ccs = Some(ccs);
        self
    }

    pub fn with_fragment_scan(mut self, scan: QueryScan) -> Self {
        self.fragment_scans.push(Arc::new(scan));
        self
    }

    pub fn with_representative_scan(mut self, scan: QueryScan) -> Self {
        self.representative_scan = Some(Arc::new(scan));
        self
    }

    /// Whether there is anything on this row that could be searched
    pub fn has_fragmentation(&self) -> bool {
        !self.fragment_scans.is_empty() || self.representative_scan.is_some()
    }

    pub fn add_spectral_matches(&mut self, matches: impl IntoIterator<Item = MatchResult>) {
        self.spectral_matches.extend(matches);
    }
}
