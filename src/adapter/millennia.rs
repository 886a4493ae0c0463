//! Millennia adapter: scalar channel reader with a bounded wait protocol.
//!
//! Protocol per cycle:
//!
//! 1. record the current measurement id
//! 2. trigger `measure()`
//! 3. poll for freshness at a fixed short interval until the id advances
//!    (or, under the deprecated busy-flag protocol, until busy clears)
//! 4. on timeout: force a connection reset via `shutdown(restart=true)` and
//!    raise a timeout fault for the cycle
//! 5. read channels, apply the sanity check, build the record
//!
//! Every wait is bounded. The historical unbounded busy-poll caused the
//! whole publisher to hang when the pump's RS-232 bridge wedged; both
//! protocol variants here share the same timeout.

use std::time::{Duration, Instant};

use crate::adapter::{CycleFault, Monitor};
use crate::config::MillenniaConfig;
use crate::domain::{MetricRecord, PollProtocol, UnitMap};
use crate::error::AppError;
use crate::instrument::InstrumentClient;
use crate::report::property_name;

pub struct MillenniaMonitor<C: InstrumentClient> {
    name: String,
    client: C,
    /// Raw channel names in publication order, paired with their units.
    channels: Vec<(String, Option<String>)>,
    units: UnitMap,
    protocol: PollProtocol,
    poll_interval: Duration,
    timeout: Duration,
    sanity_channel: Option<String>,
    sanity_limit: f64,
}

impl<C: InstrumentClient> MillenniaMonitor<C> {
    /// Connect-time construction; a failure here is startup-fatal.
    pub fn new(name: impl Into<String>, mut client: C, config: &MillenniaConfig) -> Result<Self, AppError> {
        let name = name.into();
        let unit_map = client.get_channel_units().map_err(|e| {
            AppError::runtime(format!("Initial connection to '{name}' failed: {e}"))
        })?;

        let channels: Vec<(String, Option<String>)> = unit_map.into_iter().collect();
        let units: UnitMap = channels
            .iter()
            .map(|(ch, unit)| (property_name(ch), unit.clone()))
            .collect();

        if let Some(channel) = &config.sanity_channel {
            if !channels.iter().any(|(ch, _)| ch == channel) {
                return Err(AppError::config(format!(
                    "Sanity channel '{channel}' is not reported by '{name}'."
                )));
            }
        }

        Ok(Self {
            name,
            client,
            channels,
            units,
            protocol: config.poll_protocol,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            timeout: Duration::from_millis(config.timeout_ms),
            sanity_channel: config.sanity_channel.clone(),
            sanity_limit: config.sanity_limit,
        })
    }

    #[cfg(test)]
    fn client(&self) -> &C {
        &self.client
    }

    /// Wait until the triggered measurement has completed, bounded by the
    /// configured timeout.
    fn wait_for_fresh(&mut self, baseline_id: i64) -> Result<(), CycleFault> {
        let start = Instant::now();
        loop {
            std::thread::sleep(self.poll_interval);

            let fresh = match self.protocol {
                PollProtocol::MeasurementId => {
                    self.client.get_measurement_id()? != baseline_id
                }
                PollProtocol::BusyFlag => !self.client.busy()?,
            };
            if fresh {
                return Ok(());
            }

            let waited = start.elapsed();
            if waited >= self.timeout {
                if let Err(e) = self.client.shutdown(true) {
                    log::warn!("'{}': reset after timeout also failed: {e}", self.name);
                }
                return Err(CycleFault::Timeout {
                    waited_ms: waited.as_millis() as u64,
                });
            }
        }
    }
}

impl<C: InstrumentClient> Monitor for MillenniaMonitor<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_units(&self) -> &UnitMap {
        &self.units
    }

    fn get_measured(&mut self) -> Result<MetricRecord, CycleFault> {
        let baseline_id = self.client.get_measurement_id()?;
        self.client.measure()?;
        self.wait_for_fresh(baseline_id)?;

        let measured = self.client.get_measured()?;

        let mut record = MetricRecord::new();
        for (channel, _) in &self.channels {
            let value = measured
                .get(channel)
                .and_then(|v| v.as_scalar())
                .ok_or_else(|| {
                    CycleFault::MalformedResponse(format!(
                        "Missing scalar channel '{channel}'."
                    ))
                })?;
            record.insert(property_name(channel), value);
        }

        if let Some(channel) = &self.sanity_channel {
            let value = record
                .get(&property_name(channel))
                .unwrap_or(f64::INFINITY);
            if value >= self.sanity_limit {
                return Err(CycleFault::SanityViolation {
                    channel: channel.clone(),
                    value,
                });
            }
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::SimMillennia;

    fn fast_config() -> MillenniaConfig {
        MillenniaConfig {
            endpoint: String::new(),
            poll_interval_ms: 1,
            timeout_ms: 30,
            poll_protocol: PollProtocol::MeasurementId,
            sanity_channel: Some("diode_temperature".to_string()),
            sanity_limit: 10_000.0,
        }
    }

    #[test]
    fn normal_cycle_produces_all_channels() {
        let monitor =
            &mut MillenniaMonitor::new("millennia", SimMillennia::new(5), &fast_config()).unwrap();
        let record = monitor.get_measured().unwrap();

        assert_eq!(record.len(), 4);
        assert!(record.get("power").unwrap() > 0.0);
        // Underscores are mangled to the external separator.
        assert!(record.get("diode-temperature").is_some());
        assert!(record.get("diode_temperature").is_none());
    }

    #[test]
    fn units_are_exposed_under_mangled_names() {
        let monitor =
            MillenniaMonitor::new("millennia", SimMillennia::new(5), &fast_config()).unwrap();
        let units = monitor.get_units();
        assert!(units
            .iter()
            .any(|(name, unit)| name == "diode-current" && unit.as_deref() == Some("A")));
    }

    #[test]
    fn stuck_measurement_times_out_and_resets() {
        let mut sim = SimMillennia::new(5);
        sim.set_stuck(true);
        let monitor = &mut MillenniaMonitor::new("millennia", sim, &fast_config()).unwrap();

        match monitor.get_measured() {
            Err(CycleFault::Timeout { waited_ms }) => assert!(waited_ms >= 30),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(monitor.client().shutdowns(), 1);
    }

    #[test]
    fn busy_flag_protocol_is_also_bounded() {
        let mut sim = SimMillennia::new(5);
        sim.set_stuck(true);
        let mut config = fast_config();
        config.poll_protocol = PollProtocol::BusyFlag;
        let monitor = &mut MillenniaMonitor::new("millennia", sim, &config).unwrap();

        assert!(matches!(
            monitor.get_measured(),
            Err(CycleFault::Timeout { .. })
        ));
    }

    #[test]
    fn implausible_reading_discards_the_cycle() {
        let mut sim = SimMillennia::new(5);
        sim.set_spike("diode_temperature", 10_000.0);
        let monitor = &mut MillenniaMonitor::new("millennia", sim, &fast_config()).unwrap();

        match monitor.get_measured() {
            Err(CycleFault::SanityViolation { channel, value }) => {
                assert_eq!(channel, "diode_temperature");
                assert!(value >= 10_000.0);
            }
            other => panic!("expected sanity violation, got {other:?}"),
        }
    }

    #[test]
    fn unknown_sanity_channel_is_a_config_fault() {
        let mut config = fast_config();
        config.sanity_channel = Some("no_such_channel".to_string());
        assert!(MillenniaMonitor::new("millennia", SimMillennia::new(5), &config).is_err());
    }
}
