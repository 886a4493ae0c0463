//! Shared domain types.
//!
//! These types are intentionally lightweight and serializable so they can be:
//!
//! - used in-memory during a polling cycle
//! - printed by the `fit` / `reference` subcommands
//! - asserted on directly in tests
//!
//! A `Spectrum` lives for exactly one fit call; a `PulseFit` is the atomic
//! output of the fit engine and is never partially populated.

use serde::{Deserialize, Serialize};

/// Conversion factor between the fitted width parameter and FWHM.
pub const FWHM_PER_STD: f64 = 2.35;

/// Solver status codes in this range indicate a successful fit.
///
/// The codes follow the MINPACK convention: 1 = cost tolerance reached,
/// 2 = step tolerance reached, 3 = both, 4 = gradient tolerance reached.
pub const IER_SUCCESS: std::ops::RangeInclusive<i32> = 1..=4;

/// Whether a solver status code counts as a successful fit.
pub fn ier_is_success(ier: i32) -> bool {
    IER_SUCCESS.contains(&ier)
}

/// An immutable intensity-vs-wavelength snapshot for one measurement.
///
/// Wavelengths are in nanometers and may be in ascending or descending
/// instrument order; intensities are in instrument units (already normalized
/// by integration time when the adapter hands the spectrum to the engine).
#[derive(Debug, Clone)]
pub struct Spectrum {
    wavelengths: Vec<f64>,
    intensities: Vec<f64>,
}

impl Spectrum {
    /// Validate and take ownership of the two axes.
    ///
    /// Rejects length mismatches, empty data, and non-positive or non-finite
    /// wavelengths (the wavenumber conversion `1e7 / nm` requires `nm > 0`).
    pub fn new(wavelengths: Vec<f64>, intensities: Vec<f64>) -> Result<Self, String> {
        if wavelengths.len() != intensities.len() {
            return Err(format!(
                "Axis length mismatch: {} wavelengths vs {} intensities.",
                wavelengths.len(),
                intensities.len()
            ));
        }
        if wavelengths.is_empty() {
            return Err("Empty spectrum.".to_string());
        }
        if wavelengths.iter().any(|&w| !w.is_finite() || w <= 0.0) {
            return Err("Wavelength axis contains non-positive or non-finite values.".to_string());
        }
        if intensities.iter().any(|&y| !y.is_finite()) {
            return Err("Intensity axis contains non-finite values.".to_string());
        }
        Ok(Self {
            wavelengths,
            intensities,
        })
    }

    pub fn len(&self) -> usize {
        self.wavelengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelengths.is_empty()
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelengths
    }

    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }
}

/// Fitted pulse parameters for one spectrum.
///
/// Either all six fields are present (this struct) or the fit engine returned
/// a typed failure; there is no partially-populated state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PulseFit {
    /// Center of the fitted line, cm⁻¹.
    pub mu: f64,
    /// Full width at half maximum, cm⁻¹ (`std * 2.35`).
    pub fwhm: f64,
    /// Peak amplitude, in the (normalized) intensity units of the input.
    pub amp: f64,
    /// Sum of intensities over the fit window.
    pub area: f64,
    /// Root-mean-square fit residual over the window.
    pub rms: f64,
    /// Solver convergence status code; see [`IER_SUCCESS`].
    pub ier: i32,
}

impl PulseFit {
    /// The float-valued fields, in publication order.
    ///
    /// `ier` is deliberately excluded: it is a status code, not a physical
    /// quantity, and never participates in relative-metric computation.
    pub fn fields(&self) -> [(&'static str, f64); 5] {
        [
            ("mu", self.mu),
            ("fwhm", self.fwhm),
            ("amp", self.amp),
            ("area", self.area),
            ("rms", self.rms),
        ]
    }

    pub fn is_success(&self) -> bool {
        ier_is_success(self.ier)
    }
}

/// Ordered property-name → value mapping handed to the publishing seam.
///
/// Insertion order is preserved so published properties always appear in a
/// stable order (fit fields first, then relative metrics).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricRecord {
    entries: Vec<(String, f64)>,
}

impl MetricRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.entries.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|&(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Ordered property-name → unit mapping (unit may be dimensionless).
pub type UnitMap = Vec<(String, Option<String>)>;

/// Which freshness signal the Millennia wait loop polls.
///
/// `MeasurementId` is the production protocol: wait until the instrument's
/// measurement counter advances, bounded by the configured timeout.
/// `BusyFlag` polls the boolean busy flag instead; it exists for older
/// daemons and is deprecated. Both variants share the same bound — the
/// historical unbounded busy-wait is not representable here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PollProtocol {
    MeasurementId,
    BusyFlag,
}

impl Default for PollProtocol {
    fn default() -> Self {
        PollProtocol::MeasurementId
    }
}
