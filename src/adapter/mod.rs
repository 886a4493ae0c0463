//! Measurement adapters.
//!
//! One adapter per instrument kind, both behind the [`Monitor`] trait so the
//! polling pipeline treats them uniformly and each stays independently
//! testable (a tagged interface, not an inheritance hierarchy).
//!
//! Fault containment: everything that can go wrong during one polling cycle
//! is a [`CycleFault`]. The pipeline logs the fault and publishes nothing for
//! that cycle — previously published values remain in place externally, and
//! no fault here ever crosses a cycle boundary.

pub mod millennia;
pub mod tsunami;

pub use millennia::MillenniaMonitor;
pub use tsunami::TsunamiMonitor;

use crate::domain::{MetricRecord, UnitMap};
use crate::fit::FitFailure;
use crate::instrument::ClientError;

/// Per-cycle fault taxonomy; every variant is recoverable at the loop level.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleFault {
    /// The bounded freshness wait expired; the connection was reset.
    Timeout { waited_ms: u64 },
    /// A monitored channel read an implausible value; the whole cycle's
    /// readings are suspect and discarded.
    SanityViolation { channel: String, value: f64 },
    /// The instrument answered without an expected field or axis.
    MalformedResponse(String),
    /// The reported integration time cannot normalize anything.
    InvalidIntegrationTime { micros: i64 },
    /// The daemon could not be reached or violated the protocol.
    Client(ClientError),
    /// The fit engine returned a typed failure; no new data this cycle.
    Fit(FitFailure),
    /// Relative-metric assembly failed (zero reference denominator).
    Assembly(String),
}

impl std::fmt::Display for CycleFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleFault::Timeout { waited_ms } => {
                write!(f, "Measurement timed out after {waited_ms} ms; connection reset.")
            }
            CycleFault::SanityViolation { channel, value } => {
                write!(f, "Implausible reading on '{channel}': {value}.")
            }
            CycleFault::MalformedResponse(msg) => write!(f, "Malformed response: {msg}"),
            CycleFault::InvalidIntegrationTime { micros } => {
                write!(f, "Invalid integration time: {micros} µs.")
            }
            CycleFault::Client(e) => write!(f, "{e}"),
            CycleFault::Fit(e) => write!(f, "{e}"),
            CycleFault::Assembly(msg) => write!(f, "Metric assembly failed: {msg}"),
        }
    }
}

impl From<ClientError> for CycleFault {
    fn from(e: ClientError) -> Self {
        CycleFault::Client(e)
    }
}

/// Uniform polling surface over the per-instrument adapters.
pub trait Monitor: Send {
    /// Node name in the published property namespace.
    fn name(&self) -> &str;

    /// Property-name → unit mapping, fixed for the adapter's lifetime.
    fn get_units(&self) -> &UnitMap;

    /// Run one measurement cycle and produce the cycle's metric record.
    fn get_measured(&mut self) -> Result<MetricRecord, CycleFault>;
}
