//! BFGS minimization of the negative simulated log-likelihood.
//!
//! Wraps `wolfe_bfgs`: the objective may fail, in which case the minimizer is
//! fed a steep finite barrier and the first error is returned once it stops.

use std::cell::RefCell;

use ndarray::Array1;
use wolfe_bfgs::{Bfgs, BfgsError};

use crate::errors::{MixedLogitError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct OptimOutcome {
    pub params: Array1<f64>,
    /// Objective value at `params`.
    pub value: f64,
    pub converged: bool,
    pub iterations: usize,
}

/// Minimizes `objective` from `x0` until the gradient norm drops below `gtol`
/// or `maxiter` iterations have been taken.
///
/// Hitting the iteration limit or a failed line search is not an error; the last
/// point is returned with `converged = false`. With `maxiter == 0` the starting
/// point is evaluated once and returned as is.
pub fn minimize<F>(
    mut objective: F,
    x0: Array1<f64>,
    maxiter: usize,
    gtol: f64,
) -> Result<OptimOutcome>
where
    F: FnMut(&Array1<f64>) -> Result<(f64, Array1<f64>)>,
{
    if maxiter == 0 {
        let (value, _) = objective(&x0)?;
        return Ok(OptimOutcome {
            params: x0,
            value,
            converged: false,
            iterations: 0,
        });
    }

    let objective = RefCell::new(objective);
    let failure: RefCell<Option<MixedLogitError>> = RefCell::new(None);
    let run = Bfgs::new(x0, |x: &Array1<f64>| match (objective.borrow_mut())(x) {
        Ok((value, grad)) if value.is_finite() && grad.iter().all(|g| g.is_finite()) => {
            (value, grad)
        }
        Ok(_) => barrier(x),
        Err(e) => {
            failure.borrow_mut().get_or_insert(e);
            barrier(x)
        }
    })
    .with_tolerance(gtol)
    .with_max_iterations(maxiter)
    .run();

    if let Some(e) = failure.into_inner() {
        return Err(e);
    }
    let (solution, converged) = match run {
        Ok(sol) => (sol, true),
        Err(BfgsError::MaxIterationsReached { last_solution })
        | Err(BfgsError::LineSearchFailed { last_solution, .. }) => (*last_solution, false),
        Err(e) => return Err(MixedLogitError::Optimizer(format!("{e:?}"))),
    };

    Ok(OptimOutcome {
        params: solution.final_point,
        value: solution.final_value,
        converged,
        iterations: solution.iterations,
    })
}

/// Large finite sample pushing the line search back from invalid points.
fn barrier(x: &Array1<f64>) -> (f64, Array1<f64>) {
    const COST_BARRIER: f64 = 1e50;
    let grad = x.mapv(|v| if v.is_finite() && v != 0.0 { v.signum() * 1e6 } else { 1e6 });
    (COST_BARRIER, grad)
}
