//! Spectral parameter extraction.
//!
//! Given one [`Spectrum`], the engine:
//!
//! 1. selects the fit window on the original wavelength axis
//! 2. converts the windowed axis to wavenumbers (`1e7 / nm`, cm⁻¹) —
//!    always recomputed, never cached, because wavelength calibration may
//!    change between instrument sessions
//! 3. seeds the initial guess from the windowed data
//! 4. runs Levenberg–Marquardt with no parameter bounds
//! 5. classifies the outcome: a fully-populated [`PulseFit`] or a typed
//!    [`FitFailure`]
//!
//! A failed fit is a recoverable, expected outcome (flat windows, noise
//! bursts, mode-hopping lasers); callers log it and skip the cycle. Because
//! the solver is unbounded, a degenerate window can converge to nonphysical
//! parameters — `ier` is exposed so callers can decide what to trust.

use crate::domain::{PulseFit, Spectrum, FWHM_PER_STD};
use crate::fit::window::{select_window, WINDOW_HIGH_NM, WINDOW_LOW_NM};
use crate::math::{levenberg_marquardt, CurveModel, LmError, LmOptions};
use crate::models::Gaussian;

/// Default width seed for the initial guess, cm⁻¹.
///
/// Deployments differ on this constant (200 for the older KHz table, 350 for
/// the current one); it is configurable rather than hardcoded.
pub const DEFAULT_INITIAL_STD: f64 = 350.0;

/// Why a fit produced no result.
///
/// The variants distinguish fault kinds so callers can react differently to
/// bad input versus solver trouble, instead of testing for an empty mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum FitFailure {
    /// Both window edges resolved to the same sample, or the spectrum is too
    /// short to carry a window at all.
    DegenerateWindow,
    /// The window holds fewer samples than the model has parameters.
    TooFewPoints { samples: usize },
    /// The solver terminated without meeting a convergence tolerance;
    /// `ier` carries the status code (5 = iteration budget, 6 = stalled).
    NonConvergence { ier: i32 },
    /// The damped normal equations were singular at every damping level.
    SingularNormalEquations,
    /// The model evaluated to a non-finite value during the solve.
    NonFiniteEvaluation,
    /// Malformed call (should not happen for a validated `Spectrum`).
    InvalidInput(String),
}

impl std::fmt::Display for FitFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitFailure::DegenerateWindow => write!(f, "Degenerate fit window."),
            FitFailure::TooFewPoints { samples } => {
                write!(f, "Fit window holds only {samples} samples.")
            }
            FitFailure::NonConvergence { ier } => {
                write!(f, "Fit did not converge (ier = {ier}).")
            }
            FitFailure::SingularNormalEquations => {
                write!(f, "Singular normal equations during fit.")
            }
            FitFailure::NonFiniteEvaluation => {
                write!(f, "Non-finite model evaluation during fit.")
            }
            FitFailure::InvalidInput(msg) => write!(f, "Invalid fit input: {msg}"),
        }
    }
}

/// Windowing + guess + solve, bundled with its tuning.
#[derive(Debug, Clone)]
pub struct FitEngine {
    window_low_nm: f64,
    window_high_nm: f64,
    initial_std: f64,
    options: LmOptions,
}

impl Default for FitEngine {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_STD)
    }
}

impl FitEngine {
    pub fn new(initial_std: f64) -> Self {
        Self {
            window_low_nm: WINDOW_LOW_NM,
            window_high_nm: WINDOW_HIGH_NM,
            initial_std,
            options: LmOptions::default(),
        }
    }

    /// Fit one spectrum; intensities are expected to already be normalized by
    /// integration time when normalization is wanted.
    pub fn fit(&self, spectrum: &Spectrum) -> Result<PulseFit, FitFailure> {
        let window = select_window(spectrum.wavelengths(), self.window_low_nm, self.window_high_nm)
            .ok_or(FitFailure::DegenerateWindow)?;

        let samples = window.samples();
        if samples < Gaussian::N_PARAMS {
            return Err(FitFailure::TooFewPoints { samples });
        }

        let nm = window.slice(spectrum.wavelengths());
        let y = window.slice(spectrum.intensities());
        let x: Vec<f64> = nm.iter().map(|&w| 1e7 / w).collect();

        // Initial guess: peak position and height from the windowed data,
        // width from the configured seed.
        let peak = argmax(y);
        let p0 = [x[peak], self.initial_std, y[peak]];

        let fit = levenberg_marquardt(&Gaussian, &x, y, &p0, &self.options).map_err(
            |e| match e {
                LmError::InvalidInput(msg) => FitFailure::InvalidInput(msg),
                LmError::NonFiniteEvaluation { .. } => FitFailure::NonFiniteEvaluation,
                LmError::SingularNormalEquations { .. } => FitFailure::SingularNormalEquations,
            },
        )?;

        let ier = fit.status.ier();
        if !fit.status.is_success() {
            return Err(FitFailure::NonConvergence { ier });
        }

        let [mu, std, amp] = [fit.params[0], fit.params[1], fit.params[2]];
        let rms = (fit.cost / samples as f64).sqrt();
        let area = y.iter().sum();

        Ok(PulseFit {
            mu,
            fwhm: std * FWHM_PER_STD,
            amp,
            area,
            rms,
            ier,
        })
    }
}

fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::gauss;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| lo + (hi - lo) * i as f64 / (n as f64 - 1.0))
            .collect()
    }

    fn gaussian_spectrum(n: usize, mu: f64, std: f64, amp: f64) -> Spectrum {
        let nm = linspace(700.0, 900.0, n);
        let y: Vec<f64> = nm.iter().map(|&w| gauss(1e7 / w, mu, std, amp)).collect();
        Spectrum::new(nm, y).unwrap()
    }

    #[test]
    fn recovers_synthetic_gaussian_parameters() {
        let spectrum = gaussian_spectrum(200, 12800.0, 250.0, 1500.0);
        let fit = FitEngine::default().fit(&spectrum).unwrap();
        assert!(fit.is_success());
        assert!((fit.mu - 12800.0).abs() < 1.0, "mu = {}", fit.mu);
        assert!(
            (fit.fwhm - 250.0 * FWHM_PER_STD).abs() < 1.0,
            "fwhm = {}",
            fit.fwhm
        );
        assert!((fit.amp - 1500.0).abs() < 1.0, "amp = {}", fit.amp);
        assert!(fit.rms < 1e-3, "rms = {}", fit.rms);
    }

    #[test]
    fn recovers_parameters_under_moderate_noise() {
        let mut rng = StdRng::seed_from_u64(7);
        let noise = Normal::new(0.0, 10.0).unwrap();
        let nm = linspace(700.0, 900.0, 300);
        let y: Vec<f64> = nm
            .iter()
            .map(|&w| gauss(1e7 / w, 13000.0, 300.0, 4000.0) + noise.sample(&mut rng))
            .collect();
        let spectrum = Spectrum::new(nm, y).unwrap();

        let fit = FitEngine::default().fit(&spectrum).unwrap();
        assert!(fit.is_success());
        assert!((fit.mu - 13000.0).abs() < 5.0, "mu = {}", fit.mu);
        assert!(
            (fit.fwhm - 300.0 * FWHM_PER_STD).abs() / (300.0 * FWHM_PER_STD) < 0.05,
            "fwhm = {}",
            fit.fwhm
        );
        assert!((fit.amp - 4000.0).abs() / 4000.0 < 0.05, "amp = {}", fit.amp);
    }

    #[test]
    fn windowed_fit_is_invariant_under_axis_reversal() {
        let spectrum = gaussian_spectrum(120, 12600.0, 280.0, 900.0);
        let reversed = Spectrum::new(
            spectrum.wavelengths().iter().rev().copied().collect(),
            spectrum.intensities().iter().rev().copied().collect(),
        )
        .unwrap();

        let engine = FitEngine::default();
        let a = engine.fit(&spectrum).unwrap();
        let b = engine.fit(&reversed).unwrap();

        assert!((a.mu - b.mu).abs() < 1e-6);
        assert!((a.fwhm - b.fwhm).abs() < 1e-6);
        assert!((a.amp - b.amp).abs() < 1e-6);
        assert!((a.area - b.area).abs() < 1e-9);
    }

    #[test]
    fn pure_noise_never_reports_a_confident_fit() {
        let mut rng = StdRng::seed_from_u64(99);
        let noise = Normal::new(50.0, 20.0).unwrap();
        let nm = linspace(700.0, 900.0, 150);
        let y: Vec<f64> = nm.iter().map(|_| noise.sample(&mut rng)).collect();
        let spectrum = Spectrum::new(nm, y).unwrap();

        match FitEngine::default().fit(&spectrum) {
            Err(_) => {}
            Ok(fit) => {
                // A "success" on noise must not pretend the residual vanished.
                assert!(fit.rms > 1.0, "suspiciously confident fit: rms = {}", fit.rms);
            }
        }
    }

    #[test]
    fn short_axis_is_a_degenerate_window() {
        let spectrum = Spectrum::new(vec![800.0], vec![1.0]).unwrap();
        assert_eq!(
            FitEngine::default().fit(&spectrum),
            Err(FitFailure::DegenerateWindow)
        );
    }

    #[test]
    fn end_to_end_scenario_matches_expected_parameters() {
        // 50 points over 700–900 nm, Gaussian at 13000 cm⁻¹ with std 300 and
        // peak 4000, normalized by a 1e5 µs integration time.
        let time_us = 1e5;
        let nm = linspace(700.0, 900.0, 50);
        let y: Vec<f64> = nm
            .iter()
            .map(|&w| gauss(1e7 / w, 13000.0, 300.0, 4000.0) / time_us)
            .collect();
        let spectrum = Spectrum::new(nm, y).unwrap();

        let fit = FitEngine::default().fit(&spectrum).unwrap();
        assert!(fit.is_success(), "ier = {}", fit.ier);
        assert!((fit.mu - 13000.0).abs() < 1.0, "mu = {}", fit.mu);
        assert!((fit.fwhm - 705.0).abs() < 1.0, "fwhm = {}", fit.fwhm);
        assert!((fit.amp - 0.04).abs() < 1e-4, "amp = {}", fit.amp);
    }
}
