//! Parametric lineshape models.

pub mod gaussian;

pub use gaussian::*;
