//! Numerical routines: damped least-squares curve fitting.

pub mod lm;

pub use lm::*;
