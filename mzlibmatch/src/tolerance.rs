//! Tolerance models for comparing m/z, retention time and CCS values

use mzpeaks::coordinate::{SimpleInterval, Span1D};
use serde::{Deserialize, Serialize};

/// A combined absolute (Da) and relative (ppm) m/z tolerance.
///
/// The width of the window around a value `x` is `absolute + |x| * ppm * 1e-6`, both
/// components are added together rather than taking the larger of the two.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MzTolerance {
    /// The absolute component of the tolerance in Daltons
    #[serde(default)]
    pub absolute: f64,
    /// The relative component of the tolerance in parts-per-million
    #[serde(default)]
    pub ppm: f64,
}

impl Default for MzTolerance {
    fn default() -> Self {
        Self::new(0.002, 10.0)
    }
}

impl MzTolerance {
    pub const fn new(absolute: f64, ppm: f64) -> Self {
        Self { absolute, ppm }
    }

    /// The half-width of the tolerance window around `mz`
    #[inline]
    pub fn tolerance_for(&self, mz: f64) -> f64 {
        self.absolute + mz.abs() * self.ppm * 1e-6
    }

    /// The inclusive m/z interval around `center`
    pub fn range(&self, center: f64) -> SimpleInterval<f64> {
        let width = self.tolerance_for(center);
        SimpleInterval::new(center - width, center + width)
    }

    /// Test whether `b` falls within the tolerance window centered on `a`
    #[inline]
    pub fn check_within_tolerance(&self, a: f64, b: f64) -> bool {
        self.range(a).contains(&b)
    }
}

/// A relative tolerance expressed as a fraction, so `0.05` is 5 %.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentTolerance {
    pub fraction: f64,
}

impl PercentTolerance {
    pub const fn new(fraction: f64) -> Self {
        Self { fraction }
    }

    /// Compare a value `a` with `b` relative to `a`.
    ///
    /// A missing value on either side is treated as unknown and never excludes a match.
    pub fn matches(&self, a: Option<f32>, b: Option<f32>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => {
                let (a, b) = (a as f64, b as f64);
                if a == 0.0 {
                    b == 0.0
                } else {
                    ((a - b) / a).abs() <= self.fraction
                }
            }
            _ => true,
        }
    }
}

/// The signed relative error of `value` compared to `reference`
pub fn percent_error(reference: Option<f32>, value: Option<f32>) -> Option<f32> {
    match (reference, value) {
        (Some(reference), Some(value)) if reference != 0.0 => Some((value - reference) / reference),
        _ => None,
    }
}

/// A retention time tolerance, in minutes or relative to the reference time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "unit", content = "value")]
pub enum RtTolerance {
    /// A fixed window in minutes
    Absolute(f32),
    /// A window that is a fraction of the reference retention time
    Relative(f32),
}

impl RtTolerance {
    pub fn tolerance_for(&self, rt: f32) -> f32 {
        match self {
            RtTolerance::Absolute(width) => *width,
            RtTolerance::Relative(fraction) => rt.abs() * fraction,
        }
    }

    pub fn range(&self, center: f32) -> SimpleInterval<f32> {
        let width = self.tolerance_for(center);
        SimpleInterval::new(center - width, center + width)
    }

    /// Test whether `b` falls within the tolerance window centered on `a`
    pub fn check_within_tolerance(&self, a: f32, b: f32) -> bool {
        self.range(a).contains(&b)
    }

    /// Test two optional retention times under an optional tolerance.
    ///
    /// Passes whenever the tolerance is disabled or either time is unknown.
    pub fn check(tolerance: Option<&RtTolerance>, a: Option<f32>, b: Option<f32>) -> bool {
        match (tolerance, a, b) {
            (Some(tolerance), Some(a), Some(b)) => tolerance.check_within_tolerance(a, b),
            _ => true,
        }
    }
}
