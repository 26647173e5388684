//! Search configuration read from TOML files and the environment

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use mzlibmatch::{
    Deisotoper, LibrarySelection, MatchCriteria, MsLevelFilter, MzTolerance, PercentTolerance,
    RtTolerance, SimilarityFunction,
};

/// The file read from the working directory when present
pub const DEFAULT_CONFIG_FILE: &str = "mzlibmatch.toml";
/// The prefix of environment variables that override configuration values
pub const ENV_PREFIX: &str = "MZLIBMATCH_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read the search configuration: {0}")]
    Figment(#[from] Box<figment::Error>),
    #[error("Failed to serialize the search configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(value: figment::Error) -> Self {
        Self::Figment(Box::new(value))
    }
}

/// Optional filters and preprocessing steps
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedConfig {
    pub rt_tolerance: Option<RtTolerance>,
    /// The allowed relative CCS deviation, `0.05` for 5 %
    pub ccs_tolerance: Option<f64>,
    pub deisotoping: Option<Deisotoper>,
    /// The minimum number of isotope spaced signals a match must contain
    pub needs_isotope_pattern: Option<usize>,
    pub crop_spectra_to_overlap: bool,
}

/// The user facing settings of a spectral library search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub libraries: LibrarySelection,
    pub similarity_function: SimilarityFunction,
    pub mz_tolerance: MzTolerance,
    pub mz_tolerance_precursor: MzTolerance,
    pub min_match: usize,
    pub remove_precursor: bool,
    pub ms_level_filter: MsLevelFilter,
    pub advanced: Option<AdvancedConfig>,
    /// The number of threads to use, a value < 1 uses all available cores
    pub threads: i32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let criteria = MatchCriteria::default();
        Self {
            libraries: LibrarySelection::All,
            similarity_function: criteria.similarity,
            mz_tolerance: criteria.mz_tolerance,
            mz_tolerance_precursor: criteria.precursor_mz_tolerance,
            min_match: criteria.min_match,
            remove_precursor: criteria.remove_precursor,
            ms_level_filter: criteria.ms_level_filter,
            advanced: None,
            threads: -1,
        }
    }
}

impl SearchConfig {
    /// Layer the defaults, `mzlibmatch.toml`, an optional explicit file and `MZLIBMATCH_`
    /// environment variables, later sources taking precedence.
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(SearchConfig::default()))
            .merge(Toml::file(DEFAULT_CONFIG_FILE));
        if let Some(path) = config_file {
            figment = figment.merge(Toml::file_exact(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment(config_file))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        Ok(figment.extract()?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// The immutable criteria a search runs with
    pub fn to_criteria(&self) -> MatchCriteria {
        let advanced = self.advanced.clone().unwrap_or_default();
        MatchCriteria {
            similarity: self.similarity_function.clone(),
            mz_tolerance: self.mz_tolerance,
            precursor_mz_tolerance: self.mz_tolerance_precursor,
            min_match: self.min_match,
            remove_precursor: self.remove_precursor,
            ms_level_filter: self.ms_level_filter,
            rt_tolerance: advanced.rt_tolerance,
            ccs_tolerance: advanced.ccs_tolerance.map(PercentTolerance::new),
            deisotoping: advanced.deisotoping,
            min_isotope_signals: advanced.needs_isotope_pattern,
            crop_to_overlap: advanced.crop_spectra_to_overlap,
        }
    }
}
