//! TOML configuration surface.
//!
//! Everything the node needs at runtime comes from one TOML file:
//!
//! ```toml
//! [device]
//! device_id = "khz-upstream"
//! device_name = "KHz table upstream diagnostics"
//! wait = 15
//!
//! [millennia]
//! endpoint = "http://127.0.0.1:38100"
//! sanity_channel = "diode_temperature"
//!
//! [tsunami]
//! endpoint = "http://127.0.0.1:38101"
//! reference_path = "/home/khz/reference/tsunami-2026-03.txt"
//! reference_time_us = 100000
//! ```
//!
//! Either instrument table may be omitted to run a partial node. The loaded
//! config is validated once and then passed explicitly into constructors;
//! nothing here is process-global.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::domain::PollProtocol;
use crate::error::AppError;
use crate::fit::DEFAULT_INITIAL_STD;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub device: DeviceConfig,
    #[serde(default)]
    pub millennia: Option<MillenniaConfig>,
    #[serde(default)]
    pub tsunami: Option<TsunamiConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub device_id: String,
    pub device_name: String,
    /// Outer polling period, seconds.
    #[serde(default = "default_wait_s")]
    pub wait: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MillenniaConfig {
    pub endpoint: String,
    /// Freshness poll interval, milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Bound on the freshness wait, milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub poll_protocol: PollProtocol,
    /// Channel guarded against implausible readings (out-of-order serial
    /// responses read as huge raw integers).
    #[serde(default)]
    pub sanity_channel: Option<String>,
    #[serde(default = "default_sanity_limit")]
    pub sanity_limit: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TsunamiConfig {
    pub endpoint: String,
    pub reference_path: PathBuf,
    /// Integration time the reference spectrum was recorded with, µs.
    pub reference_time_us: f64,
    /// Width seed for the fit's initial guess, cm⁻¹.
    #[serde(default = "default_initial_std")]
    pub initial_std: f64,
}

fn default_wait_s() -> u64 {
    15
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_timeout_ms() -> u64 {
    3000
}

fn default_sanity_limit() -> f64 {
    10_000.0
}

fn default_initial_std() -> f64 {
    DEFAULT_INITIAL_STD
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("Failed to read config '{}': {e}", path.display()))
        })?;
        let config: Config = toml::from_str(&text).map_err(|e| {
            AppError::config(format!("Failed to parse config '{}': {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.device.device_id.is_empty() {
            return Err(AppError::config("device_id must not be empty."));
        }
        if self.device.wait == 0 {
            return Err(AppError::config("wait must be at least 1 second."));
        }
        if self.millennia.is_none() && self.tsunami.is_none() {
            return Err(AppError::config(
                "At least one of [millennia] / [tsunami] must be configured.",
            ));
        }
        if let Some(m) = &self.millennia {
            if m.poll_interval_ms == 0 {
                return Err(AppError::config("millennia.poll_interval_ms must be > 0."));
            }
            if m.timeout_ms < m.poll_interval_ms {
                return Err(AppError::config(
                    "millennia.timeout_ms must be at least one poll interval.",
                ));
            }
            if !(m.sanity_limit.is_finite() && m.sanity_limit > 0.0) {
                return Err(AppError::config("millennia.sanity_limit must be positive."));
            }
        }
        if let Some(t) = &self.tsunami {
            if !(t.reference_time_us.is_finite() && t.reference_time_us > 0.0) {
                return Err(AppError::config(
                    "tsunami.reference_time_us must be positive.",
                ));
            }
            if !(t.initial_std.is_finite() && t.initial_std > 0.0) {
                return Err(AppError::config(
                    "tsunami.initial_std must be positive (a zero width seed divides by zero).",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL: &str = r#"
        [device]
        device_id = "khz-upstream"
        device_name = "KHz table upstream diagnostics"

        [millennia]
        endpoint = "http://127.0.0.1:38100"
        sanity_channel = "diode_temperature"

        [tsunami]
        endpoint = "http://127.0.0.1:38101"
        reference_path = "/data/reference.txt"
        reference_time_us = 100000.0
    "#;

    fn load_str(contents: &str) -> Result<Config, AppError> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        Config::load(&path)
    }

    #[test]
    fn full_config_parses_with_defaults() {
        let config = load_str(FULL).unwrap();
        assert_eq!(config.device.wait, 15);

        let m = config.millennia.unwrap();
        assert_eq!(m.poll_interval_ms, 100);
        assert_eq!(m.timeout_ms, 3000);
        assert_eq!(m.poll_protocol, PollProtocol::MeasurementId);
        assert_eq!(m.sanity_limit, 10_000.0);

        let t = config.tsunami.unwrap();
        assert_eq!(t.initial_std, DEFAULT_INITIAL_STD);
    }

    #[test]
    fn deprecated_busy_flag_protocol_is_selectable() {
        let contents = FULL.replace(
            "sanity_channel = \"diode_temperature\"",
            "sanity_channel = \"diode_temperature\"\npoll_protocol = \"busy-flag\"",
        );
        let config = load_str(&contents).unwrap();
        assert_eq!(
            config.millennia.unwrap().poll_protocol,
            PollProtocol::BusyFlag
        );
    }

    #[test]
    fn zero_reference_time_is_rejected() {
        let contents = FULL.replace("reference_time_us = 100000.0", "reference_time_us = 0.0");
        assert!(load_str(&contents).is_err());
    }

    #[test]
    fn zero_initial_std_is_rejected() {
        let contents = FULL.replace(
            "reference_time_us = 100000.0",
            "reference_time_us = 100000.0\ninitial_std = 0.0",
        );
        assert!(load_str(&contents).is_err());
    }

    #[test]
    fn instrumentless_config_is_rejected() {
        let contents = r#"
            [device]
            device_id = "khz-upstream"
            device_name = "nothing to poll"
        "#;
        assert!(load_str(contents).is_err());
    }
}
