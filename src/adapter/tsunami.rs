//! Tsunami adapter: spectral-fit driven pulse metrics.
//!
//! Per cycle: read the wavelength mapping, the intensity spectrum, and the
//! detector integration time; normalize intensities by integration time
//! exactly once; fit; assemble relative metrics against the startup
//! reference baseline. A failed fit means "no new data this cycle" — the
//! cycle is skipped, nothing is published, nothing crashes.

use crate::adapter::{CycleFault, Monitor};
use crate::calib::Reference;
use crate::domain::{MetricRecord, Spectrum, UnitMap};
use crate::fit::FitEngine;
use crate::instrument::InstrumentClient;
use crate::report::assemble;

pub struct TsunamiMonitor<C: InstrumentClient> {
    name: String,
    client: C,
    units: UnitMap,
    engine: FitEngine,
    reference: Reference,
}

/// Published property units. Intensities are counts per microsecond after
/// normalization, hence the `# MHz` composites.
fn tsunami_units() -> UnitMap {
    vec![
        ("mu".to_string(), Some("cm-1".to_string())),
        ("fwhm".to_string(), Some("cm-1".to_string())),
        ("amp".to_string(), Some("# MHz".to_string())),
        ("area".to_string(), Some("# cm-1 MHz".to_string())),
        ("rms".to_string(), None),
        ("ier".to_string(), None),
        ("relative-mu".to_string(), None),
        ("relative-fwhm".to_string(), None),
        ("relative-amp".to_string(), None),
        ("relative-area".to_string(), None),
        ("relative-rms".to_string(), None),
    ]
}

impl<C: InstrumentClient> TsunamiMonitor<C> {
    /// The reference baseline is taken by value: a `TsunamiMonitor` cannot
    /// exist without a valid calibration.
    pub fn new(name: impl Into<String>, client: C, engine: FitEngine, reference: Reference) -> Self {
        Self {
            name: name.into(),
            client,
            units: tsunami_units(),
            engine,
            reference,
        }
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }
}

impl<C: InstrumentClient> Monitor for TsunamiMonitor<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_units(&self) -> &UnitMap {
        &self.units
    }

    fn get_measured(&mut self) -> Result<MetricRecord, CycleFault> {
        let mut mappings = self.client.get_mappings()?;
        let wavelengths = mappings.remove("wavelengths").ok_or_else(|| {
            CycleFault::MalformedResponse("Missing 'wavelengths' mapping.".to_string())
        })?;

        let measured = self.client.get_measured()?;
        let intensities = measured
            .get("intensities")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                CycleFault::MalformedResponse("Missing 'intensities' array.".to_string())
            })?;

        let micros = self.client.get_integration_time_micros()?;
        if micros <= 0 {
            return Err(CycleFault::InvalidIntegrationTime { micros });
        }
        let time_us = micros as f64;

        let normalized: Vec<f64> = intensities.iter().map(|y| y / time_us).collect();
        let spectrum = Spectrum::new(wavelengths, normalized)
            .map_err(CycleFault::MalformedResponse)?;

        let fit = self.engine.fit(&spectrum).map_err(CycleFault::Fit)?;

        assemble(&fit, self.reference.fit()).map_err(|e| CycleFault::Assembly(e.to_string()))
    }
}
