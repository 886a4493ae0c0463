//! Levenberg–Marquardt solver for 1-D curve models.
//!
//! We repeatedly solve small damped normal-equation systems:
//!
//! ```text
//! (JᵀJ + λ diag(JᵀJ)) δ = Jᵀr
//! ```
//!
//! where `J` is the model Jacobian and `r` the residual vector `y - f(x, p)`.
//! The parameter dimension is tiny (3 for the Gaussian lineshape), so a dense
//! Cholesky factorization per step is cheap even at spectrometer resolutions
//! of a few thousand samples.
//!
//! Numerical notes:
//! - Marquardt scaling (damping proportional to `diag(JᵀJ)`) keeps the step
//!   well-conditioned when parameter magnitudes differ by orders of magnitude
//!   (center ~1e4 cm⁻¹ vs amplitude ~1e-2 after integration-time
//!   normalization).
//! - Convergence is reported with MINPACK-style `ier` codes so callers can
//!   apply the conventional "1–4 is success" test.

use nalgebra::{Cholesky, DMatrix, DVector};

/// A scalar model `f(x, params)` with analytic partial derivatives.
pub trait CurveModel {
    /// Number of free parameters.
    const N_PARAMS: usize;

    /// Evaluate the model at one sample point.
    fn eval(&self, x: f64, params: &[f64]) -> f64;

    /// Write `∂f/∂params[j]` into `out[j]` for one sample point.
    fn jacobian_row(&self, x: f64, params: &[f64], out: &mut [f64]);
}

/// Solver tuning knobs.
#[derive(Debug, Clone)]
pub struct LmOptions {
    /// Maximum number of accepted iterations.
    pub max_iterations: usize,
    /// Relative cost-reduction tolerance.
    pub ftol: f64,
    /// Relative step-size tolerance.
    pub xtol: f64,
    /// Gradient infinity-norm tolerance.
    pub gtol: f64,
    /// Initial damping factor.
    pub lambda_init: f64,
    /// Damping growth factor on a rejected step.
    pub lambda_up: f64,
    /// Damping shrink factor on an accepted step.
    pub lambda_down: f64,
    /// Damping ceiling; exceeding it means no usable step exists.
    pub lambda_max: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ftol: 1e-9,
            xtol: 1e-9,
            gtol: 1e-12,
            lambda_init: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
            lambda_max: 1e12,
        }
    }
}

/// Termination condition of a completed solver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LmStatus {
    /// Relative cost reduction fell below `ftol`.
    FtolReached,
    /// Step size fell below `xtol` relative to the parameter norm.
    XtolReached,
    /// Both `ftol` and `xtol` conditions held on the same step.
    BothTolReached,
    /// Gradient infinity-norm fell below `gtol`.
    GtolReached,
    /// Iteration budget exhausted without meeting any tolerance.
    MaxIterations,
    /// Damping hit its ceiling with every trial step rejected.
    Stalled,
}

impl LmStatus {
    /// MINPACK-style status code; 1–4 indicate success.
    pub fn ier(self) -> i32 {
        match self {
            LmStatus::FtolReached => 1,
            LmStatus::XtolReached => 2,
            LmStatus::BothTolReached => 3,
            LmStatus::GtolReached => 4,
            LmStatus::MaxIterations => 5,
            LmStatus::Stalled => 6,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(
            self,
            LmStatus::FtolReached
                | LmStatus::XtolReached
                | LmStatus::BothTolReached
                | LmStatus::GtolReached
        )
    }
}

/// Faults that prevent the solver from producing a status at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LmError {
    /// Bad call: mismatched lengths, underdetermined system, non-finite seed.
    InvalidInput(String),
    /// The model produced a non-finite value or derivative at the current
    /// parameters.
    NonFiniteEvaluation { iteration: usize },
    /// The damped normal equations could not be factorized at any damping
    /// level up to the ceiling.
    SingularNormalEquations { iteration: usize },
}

impl std::fmt::Display for LmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LmError::InvalidInput(msg) => write!(f, "Invalid solver input: {msg}"),
            LmError::NonFiniteEvaluation { iteration } => {
                write!(f, "Non-finite model evaluation at iteration {iteration}.")
            }
            LmError::SingularNormalEquations { iteration } => {
                write!(f, "Singular normal equations at iteration {iteration}.")
            }
        }
    }
}

/// Solver output: final parameters plus diagnostics.
#[derive(Debug, Clone)]
pub struct LmFit {
    pub params: Vec<f64>,
    pub status: LmStatus,
    pub iterations: usize,
    /// Final sum of squared residuals.
    pub cost: f64,
}

/// Minimize `Σ (ys[i] - f(xs[i], p))²` starting from `p0`.
///
/// No parameter bounds are applied; callers must inspect the returned status
/// (and, ideally, the parameter values) before trusting the result.
pub fn levenberg_marquardt<M: CurveModel>(
    model: &M,
    xs: &[f64],
    ys: &[f64],
    p0: &[f64],
    opts: &LmOptions,
) -> Result<LmFit, LmError> {
    let n = xs.len();
    let p = M::N_PARAMS;

    if ys.len() != n {
        return Err(LmError::InvalidInput(format!(
            "x/y length mismatch: {n} vs {}.",
            ys.len()
        )));
    }
    if p0.len() != p {
        return Err(LmError::InvalidInput(format!(
            "Expected {p} initial parameters, got {}.",
            p0.len()
        )));
    }
    if n < p {
        return Err(LmError::InvalidInput(format!(
            "Underdetermined system: {n} points for {p} parameters."
        )));
    }
    if p0.iter().any(|v| !v.is_finite()) {
        return Err(LmError::InvalidInput(
            "Non-finite initial parameter.".to_string(),
        ));
    }

    let mut params = p0.to_vec();
    let mut residuals = compute_residuals(model, xs, ys, &params)
        .ok_or(LmError::NonFiniteEvaluation { iteration: 0 })?;
    let mut cost = residuals.norm_squared();
    let mut jacobian = compute_jacobian(model, xs, &params)
        .ok_or(LmError::NonFiniteEvaluation { iteration: 0 })?;

    let mut lambda = opts.lambda_init;

    for iteration in 0..opts.max_iterations {
        let gradient = jacobian.transpose() * &residuals;
        if gradient.amax() <= opts.gtol {
            return Ok(LmFit {
                params,
                status: LmStatus::GtolReached,
                iterations: iteration,
                cost,
            });
        }

        let jtj = jacobian.transpose() * &jacobian;

        // Inner damping loop: raise lambda until a step both solves and
        // reduces the cost.
        loop {
            if lambda > opts.lambda_max {
                return Ok(LmFit {
                    params,
                    status: LmStatus::Stalled,
                    iterations: iteration,
                    cost,
                });
            }

            let Some(step) = solve_damped(&jtj, &gradient, lambda) else {
                lambda *= opts.lambda_up;
                if lambda > opts.lambda_max {
                    return Err(LmError::SingularNormalEquations { iteration });
                }
                continue;
            };

            let trial: Vec<f64> = params
                .iter()
                .zip(step.iter())
                .map(|(v, d)| v + d)
                .collect();

            let trial_residuals = match compute_residuals(model, xs, ys, &trial) {
                Some(r) => r,
                None => {
                    // A wild step walked the model into non-finite territory;
                    // damp harder rather than abort.
                    lambda *= opts.lambda_up;
                    continue;
                }
            };
            let trial_cost = trial_residuals.norm_squared();

            if trial_cost < cost {
                let ftol_hit = cost - trial_cost <= opts.ftol * cost;
                let param_norm: f64 = params.iter().map(|v| v * v).sum::<f64>().sqrt();
                let xtol_hit = step.norm() <= opts.xtol * (param_norm + opts.xtol);

                params = trial;
                residuals = trial_residuals;
                cost = trial_cost;
                lambda = (lambda * opts.lambda_down).max(1e-12);

                let status = match (ftol_hit, xtol_hit) {
                    (true, true) => Some(LmStatus::BothTolReached),
                    (true, false) => Some(LmStatus::FtolReached),
                    (false, true) => Some(LmStatus::XtolReached),
                    (false, false) => None,
                };
                if let Some(status) = status {
                    return Ok(LmFit {
                        params,
                        status,
                        iterations: iteration + 1,
                        cost,
                    });
                }

                jacobian = compute_jacobian(model, xs, &params)
                    .ok_or(LmError::NonFiniteEvaluation { iteration })?;
                break;
            }

            lambda *= opts.lambda_up;
        }
    }

    Ok(LmFit {
        params,
        status: LmStatus::MaxIterations,
        iterations: opts.max_iterations,
        cost,
    })
}

fn compute_residuals<M: CurveModel>(
    model: &M,
    xs: &[f64],
    ys: &[f64],
    params: &[f64],
) -> Option<DVector<f64>> {
    let mut out = DVector::zeros(xs.len());
    for (i, (&x, &y)) in xs.iter().zip(ys.iter()).enumerate() {
        let f = model.eval(x, params);
        if !f.is_finite() {
            return None;
        }
        out[i] = y - f;
    }
    Some(out)
}

fn compute_jacobian<M: CurveModel>(model: &M, xs: &[f64], params: &[f64]) -> Option<DMatrix<f64>> {
    let mut jac = DMatrix::zeros(xs.len(), M::N_PARAMS);
    let mut row = vec![0.0; M::N_PARAMS];
    for (i, &x) in xs.iter().enumerate() {
        model.jacobian_row(x, params, &mut row);
        for (j, &v) in row.iter().enumerate() {
            if !v.is_finite() {
                return None;
            }
            jac[(i, j)] = v;
        }
    }
    Some(jac)
}

/// Solve `(JᵀJ + λ diag(JᵀJ)) δ = g`; `None` when the factorization fails.
fn solve_damped(jtj: &DMatrix<f64>, gradient: &DVector<f64>, lambda: f64) -> Option<DVector<f64>> {
    let p = jtj.nrows();
    let mut damped = jtj.clone();
    for j in 0..p {
        // Floor the diagonal so a dead parameter (zero column) still yields a
        // solvable, heavily-damped system instead of a zero pivot.
        let d = jtj[(j, j)].max(1e-30);
        damped[(j, j)] = d + lambda * d;
    }
    let chol = Cholesky::new(damped)?;
    let step = chol.solve(gradient);
    if step.iter().all(|v| v.is_finite()) {
        Some(step)
    } else {
        None
    }
}
