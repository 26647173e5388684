//! Experimental scans that are searched against a spectral library

use mzpeaks::CentroidPeak;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::library::LibrarySpectrum;

pub use mzdata::spectrum::ScanPolarity;

/// Which MS levels a search accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MsLevelFilter {
    /// Only MS1 scans and pseudo spectra derived from them
    Ms1Only,
    /// Fragmentation scans at MS2 or higher
    #[default]
    Ms2OrHigher,
}

impl MsLevelFilter {
    /// The filter that accepts scans at `ms_level`
    pub fn of(ms_level: u8) -> Self {
        if ms_level <= 1 {
            Self::Ms1Only
        } else {
            Self::Ms2OrHigher
        }
    }

    pub fn is_ms1_only(&self) -> bool {
        matches!(self, Self::Ms1Only)
    }

    pub fn accepts(&self, ms_level: u8) -> bool {
        match self {
            Self::Ms1Only => ms_level == 1,
            Self::Ms2OrHigher => ms_level >= 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Scan {scan_id} has no mass list, peaks must be detected before spectral library matching")]
pub struct MissingMassListError {
    pub scan_id: String,
}

/// A measured scan, or a pseudo spectrum built from co-eluting MS1 features.
#[derive(Debug, Clone, Default)]
pub struct QueryScan {
    pub id: String,
    pub ms_level: u8,
    pub polarity: ScanPolarity,
    pub retention_time: Option<f32>,
    pub precursor_mz: Option<f64>,
    pub ccs: Option<f32>,
    /// The centroided peak list, absent if peak detection has not been run
    pub mass_list: Option<Vec<CentroidPeak>>,
    pub is_pseudo_spectrum: bool,
}

impl QueryScan {
    pub fn new(id: impl Into<String>, ms_level: u8, mass_list: Option<Vec<CentroidPeak>>) -> Self {
        Self {
            id: id.into(),
            ms_level,
            mass_list,
            ..Default::default()
        }
    }

    pub fn with_polarity(mut self, polarity: ScanPolarity) -> Self {
        self.polarity = polarity;
        self
    }

    pub fn with_retention_time(mut self, retention_time: f32) -> Self {
        self.retention_time = Some(retention_time);
        self
    }

    pub fn with_precursor_mz(mut self, precursor_mz: f64) -> Self {
        self.precursor_mz = Some(precursor_mz);
        self
    }

    pub fn with_ccs(mut self, ccs: f32) -> Self {
        self.ccs = Some(ccs);
        self
    }

    pub fn as_pseudo_spectrum(mut self) -> Self {
        self.is_pseudo_spectrum = true;
        self
    }

    pub fn mass_list(&self) -> Result<&[CentroidPeak], MissingMassListError> {
        self.mass_list
            .as_deref()
            .ok_or_else(|| MissingMassListError {
                scan_id: self.id.clone(),
            })
    }

    /// The number of peaks in the mass list, or `None` if there isn't one
    pub fn peak_count(&self) -> Option<usize> {
        self.mass_list.as_ref().map(|m| m.len())
    }
}

/// A polarity check that only rejects a pair when both sides are known and disagree.
pub fn weak_polarity_check(entry: &LibrarySpectrum, polarity: ScanPolarity) -> bool {
    let entry_polarity = entry.polarity();
    if entry_polarity == ScanPolarity::Unknown || polarity == ScanPolarity::Unknown {
        true
    } else {
        entry_polarity == polarity
    }
}
