//! Spectral library entries and library selection

use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::Arc;

use mzdata::spectrum::ScanPolarity;
use mzpeaks::CentroidPeak;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The metadata keys a [`LibrarySpectrum`] may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LibraryField {
    EntryId,
    Name,
    PrecursorMz,
    RetentionTime,
    Ccs,
    Polarity,
    Charge,
    IonType,
    Formula,
    Smiles,
    Inchikey,
    MsLevel,
    CollisionEnergy,
    InstrumentType,
    Comment,
}

/// A loosely typed metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            FieldValue::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Int(i) => write!(f, "{i}"),
            FieldValue::Float(x) => write!(f, "{x}"),
            FieldValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<f32> for FieldValue {
    fn from(value: f32) -> Self {
        Self::Float(value as f64)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Interpret a free-text polarity annotation as found in library files.
///
/// Anything unrecognized is [`ScanPolarity::Unknown`].
pub fn parse_polarity(value: &str) -> ScanPolarity {
    match value.trim().to_ascii_lowercase().as_str() {
        "positive" | "pos" | "p" | "+" | "1" => ScanPolarity::Positive,
        "negative" | "neg" | "n" | "-" | "-1" => ScanPolarity::Negative,
        _ => ScanPolarity::Unknown,
    }
}

/// A reference spectrum from a spectral library.
///
/// Built once when the library is loaded and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct LibrarySpectrum {
    peaks: Vec<CentroidPeak>,
    fields: BTreeMap<LibraryField, FieldValue>,
}

impl LibrarySpectrum {
    pub fn new(peaks: Vec<CentroidPeak>) -> Self {
        Self {
            peaks,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field<V: Into<FieldValue>>(mut self, field: LibraryField, value: V) -> Self {
        self.fields.insert(field, value.into());
        self
    }

    pub fn peaks(&self) -> &[CentroidPeak] {
        &self.peaks
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn field(&self, field: LibraryField) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&LibraryField, &FieldValue)> {
        self.fields.iter()
    }

    pub fn precursor_mz(&self) -> Option<f64> {
        self.field(LibraryField::PrecursorMz)
            .and_then(FieldValue::as_f64)
    }

    pub fn retention_time(&self) -> Option<f32> {
        self.field(LibraryField::RetentionTime)
            .and_then(FieldValue::as_f64)
            .map(|v| v as f32)
    }

    pub fn ccs(&self) -> Option<f32> {
        self.field(LibraryField::Ccs)
            .and_then(FieldValue::as_f64)
            .map(|v| v as f32)
    }

    pub fn polarity(&self) -> ScanPolarity {
        match self.field(LibraryField::Polarity) {
            Some(FieldValue::Text(s)) => parse_polarity(s),
            Some(FieldValue::Int(1)) => ScanPolarity::Positive,
            Some(FieldValue::Int(-1)) => ScanPolarity::Negative,
            _ => ScanPolarity::Unknown,
        }
    }

    /// A human readable label for log messages
    pub fn name(&self) -> String {
        self.field(LibraryField::Name)
            .or_else(|| self.field(LibraryField::EntryId))
            .map(|v| v.to_string())
            .unwrap_or_else(|| "<unnamed>".to_string())
    }
}

/// A named collection of library spectra
#[derive(Debug, Clone, Default)]
pub struct SpectralLibrary {
    pub name: String,
    pub entries: Vec<Arc<LibrarySpectrum>>,
}

impl SpectralLibrary {
    pub fn new(name: impl Into<String>, entries: Vec<Arc<LibrarySpectrum>>) -> Self {
        Self {
            name: name.into(),
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LibrarySelectionError {
    #[error("No spectral libraries are available to search")]
    NoLibrariesAvailable,
    #[error("The spectral library {0:?} is not available")]
    LibraryUnavailable(String),
}

/// Which of the loaded libraries a search should use
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LibrarySelection {
    /// Every loaded library
    #[default]
    All,
    /// Only the libraries with these names, all of which must be loaded
    Named(Vec<String>),
}

impl LibrarySelection {
    /// Resolve the selection against the libraries currently loaded.
    ///
    /// Fails if nothing is loaded, or if a named library is missing.
    pub fn select<'a>(
        &self,
        available: &'a [SpectralLibrary],
    ) -> Result<Vec<&'a SpectralLibrary>, LibrarySelectionError> {
        if available.is_empty() {
            return Err(LibrarySelectionError::NoLibrariesAvailable);
        }
        match self {
            LibrarySelection::All => Ok(available.iter().collect()),
            LibrarySelection::Named(names) => {
                if names.is_empty() {
                    return Err(LibrarySelectionError::NoLibrariesAvailable);
                }
                names
                    .iter()
                    .map(|name| {
                        available
                            .iter()
                            .find(|lib| lib.name == *name)
                            .ok_or_else(|| LibrarySelectionError::LibraryUnavailable(name.clone()))
                    })
                    .collect()
            }
        }
    }
}
