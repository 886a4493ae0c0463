//! File ingest for stored spectra.

pub mod spectrum;

pub use spectrum::*;
