//! `oscmon` library crate.
//!
//! The binary is a thin wrapper around this library so that:
//!
//! - the fit pipeline is testable without spawning processes
//! - modules are reusable (e.g., an embedded node inside a larger DAQ host)
//! - code stays easy to navigate as the project grows

pub mod adapter;
pub mod app;
pub mod calib;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod fit;
pub mod instrument;
pub mod io;
pub mod math;
pub mod models;
pub mod publish;
pub mod report;

pub use domain::Spectrum;
