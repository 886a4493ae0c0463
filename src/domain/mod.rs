//! Shared domain types for spectra, fit results, and metric records.

pub mod types;

pub use types::*;
