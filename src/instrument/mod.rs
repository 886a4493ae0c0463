//! Instrument client collaborator surface.
//!
//! The polling core only *consumes* these operations; transport, discovery,
//! and daemon lifecycle belong to the instrument-hub collaborator. Two
//! implementations are provided: a thin blocking HTTP/JSON client for real
//! daemons and a deterministic simulator for tests and `run --simulate`.

pub mod http;
pub mod sim;

use std::collections::BTreeMap;

use serde::Deserialize;

pub use http::HttpClient;
pub use sim::{SimMillennia, SimTsunami};

/// One channel of a measurement response.
///
/// Scalar channels come from monitors (powers, temperatures, currents);
/// array channels from spectrometers (`intensities`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ChannelValue {
    Scalar(f64),
    Array(Vec<f64>),
}

impl ChannelValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            ChannelValue::Scalar(v) => Some(*v),
            ChannelValue::Array(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&[f64]> {
        match self {
            ChannelValue::Scalar(_) => None,
            ChannelValue::Array(v) => Some(v),
        }
    }
}

/// Channel-name → value mapping returned by `get_measured`.
pub type Measured = BTreeMap<String, ChannelValue>;

/// Faults raised by a client implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The daemon could not be reached or the request failed in transit.
    Transport(String),
    /// The daemon answered, but not with what the protocol promises.
    Protocol(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Transport(msg) => write!(f, "Instrument transport fault: {msg}"),
            ClientError::Protocol(msg) => write!(f, "Instrument protocol fault: {msg}"),
        }
    }
}

/// Operations the measurement adapters consume from an instrument daemon.
pub trait InstrumentClient: Send {
    /// Trigger a new measurement (fire-and-maybe-wait).
    fn measure(&mut self) -> Result<(), ClientError>;

    /// Whether a triggered measurement is still in flight.
    fn busy(&mut self) -> Result<bool, ClientError>;

    /// Monotonically increasing counter, incremented when a measurement
    /// completes; used to detect fresh data without busy-polling.
    fn get_measurement_id(&mut self) -> Result<i64, ClientError>;

    /// Latest measured channel values.
    fn get_measured(&mut self) -> Result<Measured, ClientError>;

    /// Axis mappings, e.g. `wavelengths` for a spectrometer.
    fn get_mappings(&mut self) -> Result<BTreeMap<String, Vec<f64>>, ClientError>;

    /// Detector integration time, microseconds.
    fn get_integration_time_micros(&mut self) -> Result<i64, ClientError>;

    /// Unit string per scalar channel (`None` = dimensionless).
    fn get_channel_units(&mut self) -> Result<BTreeMap<String, Option<String>>, ClientError>;

    /// Tear down the daemon connection, optionally asking it to restart.
    fn shutdown(&mut self, restart: bool) -> Result<(), ClientError>;
}
