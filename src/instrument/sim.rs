//! Deterministic simulated instruments.
//!
//! Used by tests and by `oscmon run --simulate` so the full polling pipeline
//! can be exercised with no hardware attached. All randomness is seeded; two
//! simulators built with the same seed replay the same sequence.
//!
//! Fault injection is explicit: a simulator can be made to never finish a
//! measurement (timeout-path testing) or to spike one channel to an
//! implausible value (sanity-check testing).

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use super::{ChannelValue, ClientError, InstrumentClient, Measured};
use crate::models::gauss;

/// How many freshness polls a simulated measurement takes to complete.
const MEASUREMENT_LATENCY_POLLS: u32 = 2;

/// Simulated power/temperature monitor.
pub struct SimMillennia {
    rng: StdRng,
    noise: Normal<f64>,
    channels: Vec<(&'static str, f64, Option<&'static str>)>,
    measurement_id: i64,
    pending_polls: Option<u32>,
    /// When set, measurements never complete (drives the timeout path).
    stuck: bool,
    /// When set, overrides one channel's reading.
    spike: Option<(String, f64)>,
    shutdowns: u32,
}

impl SimMillennia {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            noise: Normal::new(0.0, 0.01).expect("finite noise parameters"),
            channels: vec![
                ("power", 4.02, Some("W")),
                ("diode_current", 24.8, Some("A")),
                ("diode_temperature", 22.4, Some("deg_C")),
                ("baseplate_temperature", 27.1, Some("deg_C")),
            ],
            measurement_id: 0,
            pending_polls: None,
            stuck: false,
            spike: None,
            shutdowns: 0,
        }
    }

    /// Make every subsequent measurement hang forever.
    pub fn set_stuck(&mut self, stuck: bool) {
        self.stuck = stuck;
    }

    /// Override one channel with a fixed (typically implausible) value.
    pub fn set_spike(&mut self, channel: impl Into<String>, value: f64) {
        self.spike = Some((channel.into(), value));
    }

    /// How many times `shutdown` has been called (timeout resets).
    pub fn shutdowns(&self) -> u32 {
        self.shutdowns
    }

    fn advance(&mut self) {
        if self.stuck {
            return;
        }
        if let Some(polls) = self.pending_polls {
            if polls <= 1 {
                self.pending_polls = None;
                self.measurement_id += 1;
            } else {
                self.pending_polls = Some(polls - 1);
            }
        }
    }
}

impl InstrumentClient for SimMillennia {
    fn measure(&mut self) -> Result<(), ClientError> {
        self.pending_polls = Some(MEASUREMENT_LATENCY_POLLS);
        Ok(())
    }

    fn busy(&mut self) -> Result<bool, ClientError> {
        self.advance();
        Ok(self.pending_polls.is_some() || self.stuck)
    }

    fn get_measurement_id(&mut self) -> Result<i64, ClientError> {
        self.advance();
        Ok(self.measurement_id)
    }

    fn get_measured(&mut self) -> Result<Measured, ClientError> {
        let mut out = Measured::new();
        for (name, nominal, _) in self.channels.clone() {
            let value = nominal * (1.0 + self.noise.sample(&mut self.rng));
            out.insert(name.to_string(), ChannelValue::Scalar(value));
        }
        if let Some((channel, value)) = &self.spike {
            out.insert(channel.clone(), ChannelValue::Scalar(*value));
        }
        Ok(out)
    }

    fn get_mappings(&mut self) -> Result<BTreeMap<String, Vec<f64>>, ClientError> {
        Err(ClientError::Protocol(
            "Monitor daemon has no axis mappings.".to_string(),
        ))
    }

    fn get_integration_time_micros(&mut self) -> Result<i64, ClientError> {
        Err(ClientError::Protocol(
            "Monitor daemon has no integration time.".to_string(),
        ))
    }

    fn get_channel_units(&mut self) -> Result<BTreeMap<String, Option<String>>, ClientError> {
        Ok(self
            .channels
            .iter()
            .map(|(name, _, unit)| (name.to_string(), unit.map(str::to_string)))
            .collect())
    }

    fn shutdown(&mut self, restart: bool) -> Result<(), ClientError> {
        self.shutdowns += 1;
        self.pending_polls = None;
        if restart {
            self.stuck = false;
        }
        Ok(())
    }
}

/// Simulated spectrometer watching a mode-locked oscillator.
pub struct SimTsunami {
    rng: StdRng,
    noise: Normal<f64>,
    wavelengths: Vec<f64>,
    /// True line parameters in wavenumber space: (mu, std, amp-counts).
    line: (f64, f64, f64),
    integration_time_us: i64,
    measurement_id: i64,
}

impl SimTsunami {
    pub fn new(seed: u64) -> Self {
        let n = 512;
        let wavelengths = (0..n)
            .map(|i| 690.0 + 220.0 * i as f64 / (n as f64 - 1.0))
            .collect();
        Self {
            rng: StdRng::seed_from_u64(seed),
            noise: Normal::new(0.0, 4.0).expect("finite noise parameters"),
            wavelengths,
            line: (12850.0, 310.0, 3600.0),
            integration_time_us: 100_000,
            measurement_id: 0,
        }
    }

    /// Reconfigure the simulated emission line.
    pub fn set_line(&mut self, mu: f64, std: f64, amp: f64) {
        self.line = (mu, std, amp);
    }

    pub fn set_integration_time_micros(&mut self, micros: i64) {
        self.integration_time_us = micros;
    }

    /// Noiseless spectrum at the current line, normalized by integration
    /// time; stands in for a stored reference when no hardware (and no
    /// reference file) exists.
    pub fn clean_spectrum(&self) -> (Vec<f64>, Vec<f64>) {
        let (mu, std, amp) = self.line;
        let time_us = self.integration_time_us as f64;
        let intensities = self
            .wavelengths
            .iter()
            .map(|&w| gauss(1e7 / w, mu, std, amp) / time_us)
            .collect();
        (self.wavelengths.clone(), intensities)
    }
}

impl InstrumentClient for SimTsunami {
    fn measure(&mut self) -> Result<(), ClientError> {
        self.measurement_id += 1;
        Ok(())
    }

    fn busy(&mut self) -> Result<bool, ClientError> {
        Ok(false)
    }

    fn get_measurement_id(&mut self) -> Result<i64, ClientError> {
        self.measurement_id += 1;
        Ok(self.measurement_id)
    }

    fn get_measured(&mut self) -> Result<Measured, ClientError> {
        let (mu, std, amp) = self.line;
        let intensities: Vec<f64> = self
            .wavelengths
            .iter()
            .map(|&w| {
                let clean = gauss(1e7 / w, mu, std, amp);
                (clean + self.noise.sample(&mut self.rng)).max(0.0)
            })
            .collect();
        let mut out = Measured::new();
        out.insert(
            "intensities".to_string(),
            ChannelValue::Array(intensities),
        );
        Ok(out)
    }

    fn get_mappings(&mut self) -> Result<BTreeMap<String, Vec<f64>>, ClientError> {
        let mut out = BTreeMap::new();
        out.insert("wavelengths".to_string(), self.wavelengths.clone());
        Ok(out)
    }

    fn get_integration_time_micros(&mut self) -> Result<i64, ClientError> {
        Ok(self.integration_time_us)
    }

    fn get_channel_units(&mut self) -> Result<BTreeMap<String, Option<String>>, ClientError> {
        Ok(BTreeMap::new())
    }

    fn shutdown(&mut self, _restart: bool) -> Result<(), ClientError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measurement_id_advances_after_measure() {
        let mut sim = SimMillennia::new(1);
        let id0 = sim.get_measurement_id().unwrap();
        sim.measure().unwrap();
        let mut id = id0;
        for _ in 0..5 {
            id = sim.get_measurement_id().unwrap();
            if id != id0 {
                break;
            }
        }
        assert_eq!(id, id0 + 1);
    }

    #[test]
    fn stuck_instrument_never_completes() {
        let mut sim = SimMillennia::new(1);
        sim.set_stuck(true);
        sim.measure().unwrap();
        let id0 = sim.get_measurement_id().unwrap();
        for _ in 0..10 {
            assert_eq!(sim.get_measurement_id().unwrap(), id0);
            assert!(sim.busy().unwrap());
        }
    }

    #[test]
    fn same_seed_replays_same_spectrum() {
        let mut a = SimTsunami::new(42);
        let mut b = SimTsunami::new(42);
        assert_eq!(a.get_measured().unwrap(), b.get_measured().unwrap());
    }

    #[test]
    fn spectrum_axes_are_consistent() {
        let mut sim = SimTsunami::new(3);
        let nm = sim.get_mappings().unwrap().remove("wavelengths").unwrap();
        let measured = sim.get_measured().unwrap();
        let y = measured.get("intensities").unwrap().as_array().unwrap();
        assert_eq!(nm.len(), y.len());
    }
}
