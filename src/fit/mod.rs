//! Spectral fit engine.
//!
//! Responsibilities:
//!
//! - select the fixed-wavelength fit window, robust to axis direction
//! - convert wavelengths to wavenumbers and seed the initial guess
//! - run the Levenberg–Marquardt solver and classify the outcome

pub mod engine;
pub mod window;

pub use engine::*;
pub use window::*;
