//! Gaussian lineshape.
//!
//! The fitter works against the three-parameter form
//!
//! ```text
//! gauss(x, mu, std, amp) = amp * exp(-((x - mu) / (sqrt(2) * std))²)
//! ```
//!
//! which is the standard normal shape with `std` as the true standard
//! deviation (the exponent reduces to `-(x-mu)²/(2 std²)`). FWHM follows as
//! `std * 2.35`.
//!
//! `std = 0` divides by zero; callers guarantee a nonzero width seed (config
//! validation rejects zero, and the fitter never generates one itself).

use std::f64::consts::SQRT_2;

use crate::math::CurveModel;

/// Evaluate the Gaussian lineshape at one point.
pub fn gauss(x: f64, mu: f64, std: f64, amp: f64) -> f64 {
    let z = (x - mu) / (SQRT_2 * std);
    amp * (-z * z).exp()
}

/// [`CurveModel`] implementation over parameters `[mu, std, amp]`.
#[derive(Debug, Clone, Copy)]
pub struct Gaussian;

impl CurveModel for Gaussian {
    const N_PARAMS: usize = 3;

    fn eval(&self, x: f64, params: &[f64]) -> f64 {
        gauss(x, params[0], params[1], params[2])
    }

    fn jacobian_row(&self, x: f64, params: &[f64], out: &mut [f64]) {
        let [mu, std, amp] = [params[0], params[1], params[2]];
        let z = (x - mu) / (SQRT_2 * std);
        let e = (-z * z).exp();

        // ∂f/∂mu = amp e · √2 z / std, ∂f/∂std = amp e · 2 z² / std.
        out[0] = amp * e * SQRT_2 * z / std;
        out[1] = amp * e * 2.0 * z * z / std;
        out[2] = e;
    }
}
