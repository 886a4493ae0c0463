//! Reference calibration.
//!
//! A [`Reference`] is the baseline [`PulseFit`] computed exactly once at
//! startup from a stored reference spectrum, against which live fits are
//! normalized into `relative-*` metrics.
//!
//! Failure policy: any fault here — unreadable or malformed file,
//! non-positive integration time, failed fit, zero or non-finite fitted
//! field — aborts construction loudly. A poisoned-but-usable calibrator is
//! unrepresentable: code that holds a `Reference` holds a baseline whose
//! fields are all finite and nonzero, so relative-metric division can never
//! silently produce `inf`/`NaN`.

use std::path::Path;

use crate::domain::{PulseFit, Spectrum};
use crate::error::AppError;
use crate::fit::FitEngine;
use crate::io::{load_two_column, REFERENCE_FOOTER_LINES, REFERENCE_HEADER_LINES};

/// Immutable reference baseline.
#[derive(Debug, Clone, Copy)]
pub struct Reference {
    fit: PulseFit,
}

impl Reference {
    /// Calibrate from a stored spectrum file.
    ///
    /// Intensities are normalized by `reference_time_us` (the integration
    /// time the reference was recorded with) before fitting, so the baseline
    /// lives in the same per-microsecond units as live fits.
    pub fn from_file(
        path: &Path,
        reference_time_us: f64,
        engine: &FitEngine,
    ) -> Result<Self, AppError> {
        if !(reference_time_us.is_finite() && reference_time_us > 0.0) {
            return Err(AppError::calibration(format!(
                "Reference integration time must be positive, got {reference_time_us} µs."
            )));
        }

        let (wavelengths, intensities) =
            load_two_column(path, REFERENCE_HEADER_LINES, REFERENCE_FOOTER_LINES)?;
        let normalized: Vec<f64> = intensities.iter().map(|y| y / reference_time_us).collect();

        let spectrum = Spectrum::new(wavelengths, normalized).map_err(|e| {
            AppError::calibration(format!("Reference spectrum '{}': {e}", path.display()))
        })?;

        let fit = engine.fit(&spectrum).map_err(|e| {
            AppError::calibration(format!(
                "Reference fit failed for '{}': {e}",
                path.display()
            ))
        })?;

        let reference = Self::from_fit(fit)?;
        log::info!(
            "Reference baseline: mu={:.2} cm-1, fwhm={:.2} cm-1, amp={:.4e}, area={:.4e}, rms={:.4e}, ier={}",
            fit.mu,
            fit.fwhm,
            fit.amp,
            fit.area,
            fit.rms,
            fit.ier
        );
        Ok(reference)
    }

    /// Wrap an already-computed baseline, enforcing the denominator
    /// invariant.
    pub fn from_fit(fit: PulseFit) -> Result<Self, AppError> {
        if !fit.is_success() {
            return Err(AppError::calibration(format!(
                "Reference fit did not converge (ier = {}).",
                fit.ier
            )));
        }
        for (name, value) in fit.fields() {
            if !value.is_finite() || value == 0.0 {
                return Err(AppError::calibration(format!(
                    "Reference field '{name}' is {value}; relative metrics would be undefined."
                )));
            }
        }
        Ok(Self { fit })
    }

    pub fn fit(&self) -> &PulseFit {
        &self.fit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::gauss;
    use std::io::Write;

    fn reference_file(dir: &tempfile::TempDir, mu: f64, std: f64, amp: f64) -> std::path::PathBuf {
        let mut contents = String::new();
        for i in 0..REFERENCE_HEADER_LINES {
            contents.push_str(&format!("# header {i}\n"));
        }
        for i in 0..120 {
            let w = 700.0 + 200.0 * i as f64 / 119.0;
            let y = gauss(1e7 / w, mu, std, amp);
            contents.push_str(&format!("{w:.5}\t{y:.5}\n"));
        }
        contents.push_str(">>>>>End Processed Spectral Data<<<<<\n");

        let path = dir.path().join("reference.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn calibrates_from_stored_spectrum() {
        let dir = tempfile::tempdir().unwrap();
        let path = reference_file(&dir, 12900.0, 320.0, 2000.0);
        let engine = FitEngine::default();

        let reference = Reference::from_file(&path, 1e5, &engine).unwrap();
        let fit = reference.fit();
        assert!((fit.mu - 12900.0).abs() < 2.0, "mu = {}", fit.mu);
        // Peak normalized by integration time.
        assert!((fit.amp - 0.02).abs() < 1e-3, "amp = {}", fit.amp);
    }

    #[test]
    fn calibration_is_bitwise_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = reference_file(&dir, 12900.0, 320.0, 2000.0);
        let engine = FitEngine::default();

        let a = *Reference::from_file(&path, 1e5, &engine).unwrap().fit();
        let b = *Reference::from_file(&path, 1e5, &engine).unwrap().fit();

        assert_eq!(a.mu.to_bits(), b.mu.to_bits());
        assert_eq!(a.fwhm.to_bits(), b.fwhm.to_bits());
        assert_eq!(a.amp.to_bits(), b.amp.to_bits());
        assert_eq!(a.area.to_bits(), b.area.to_bits());
        assert_eq!(a.rms.to_bits(), b.rms.to_bits());
        assert_eq!(a.ier, b.ier);
    }

    #[test]
    fn zero_integration_time_is_a_loud_fault() {
        let dir = tempfile::tempdir().unwrap();
        let path = reference_file(&dir, 12900.0, 320.0, 2000.0);
        let err = Reference::from_file(&path, 0.0, &FitEngine::default()).unwrap_err();
        assert!(err.to_string().contains("integration time"));
    }

    #[test]
    fn zero_valued_field_is_rejected() {
        let fit = PulseFit {
            mu: 13000.0,
            fwhm: 700.0,
            amp: 0.0,
            area: 1.0,
            rms: 0.1,
            ier: 1,
        };
        let err = Reference::from_fit(fit).unwrap_err();
        assert!(err.to_string().contains("amp"));
    }

    #[test]
    fn failed_reference_fit_is_rejected() {
        let fit = PulseFit {
            mu: 13000.0,
            fwhm: 700.0,
            amp: 0.01,
            area: 1.0,
            rms: 0.1,
            ier: 5,
        };
        assert!(Reference::from_fit(fit).is_err());
    }
}
