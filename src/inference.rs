//! Standard errors and Wald tests at the maximum simulated likelihood estimate.
//!
//! The BFGS solution does not carry its inverse-Hessian approximation, so the
//! covariance comes from the observed information at the converged point.
//! The observed information is the central finite-difference Jacobian of the
//! analytic negative log-likelihood gradient. It is inverted through a
//! symmetric eigendecomposition, dropping eigenvalues at or below
//! [`EIGEN_EPS`], so weakly identified directions do not blow up the solve.

use std::cell::RefCell;

use finitediff::FiniteDiff;
use nalgebra::DMatrix;
use ndarray::{Array1, Array2};
use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::errors::{MixedLogitError, Result};

/// Eigenvalues of the observed information at or below this are ignored.
pub const EIGEN_EPS: f64 = 1e-12;

/// Symmetrized observed information matrix at `theta`, from the gradient of the
/// negative log-likelihood.
///
/// # Errors
///
/// Propagates the first error raised by `neg_grad`, and returns
/// [`MixedLogitError::Hessian`] when an entry is not finite.
pub fn observed_information<F>(neg_grad: F, theta: &Array1<f64>) -> Result<Array2<f64>>
where
    F: Fn(&Array1<f64>) -> Result<Array1<f64>>,
{
    let closure_err: RefCell<Option<MixedLogitError>> = RefCell::new(None);
    let grad = |x: &Vec<f64>| -> Vec<f64> {
        match neg_grad(&Array1::from(x.clone())) {
            Ok(g) => g.to_vec(),
            Err(e) => {
                closure_err.borrow_mut().get_or_insert(e);
                vec![f64::NAN; x.len()]
            }
        }
    };
    let hess = theta.to_vec().central_hessian(&grad);
    if let Some(e) = closure_err.into_inner() {
        return Err(e);
    }

    let n = theta.len();
    let mut info = Array2::<f64>::zeros((n, n));
    for (i, row) in hess.iter().enumerate() {
        for (j, &v) in row.iter().enumerate() {
            if !v.is_finite() {
                return Err(MixedLogitError::Hessian { row: i, col: j });
            }
            info[[i, j]] = v;
        }
    }
    symmetrize(&mut info);
    Ok(info)
}

fn symmetrize(m: &mut Array2<f64>) {
    let n = m.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            let avg = 0.5 * (m[[i, j]] + m[[j, i]]);
            m[[i, j]] = avg;
            m[[j, i]] = avg;
        }
    }
}

/// Square roots of the diagonal of the pseudo-inverse of `info`.
pub fn standard_errors(info: &Array2<f64>) -> Array1<f64> {
    let n = info.nrows();
    let eigen = DMatrix::from_fn(n, n, |i, j| info[[i, j]]).symmetric_eigen();
    let q = &eigen.eigenvectors;
    Array1::from_shape_fn(n, |i| {
        eigen
            .eigenvalues
            .iter()
            .enumerate()
            .filter(|(_, lambda)| **lambda > EIGEN_EPS)
            .map(|(k, &lambda)| q[(i, k)] * q[(i, k)] / lambda)
            .sum::<f64>()
            .sqrt()
    })
}

/// Two-sided p-values of `zvalues` under a Student-t with `df` degrees of freedom.
pub fn wald_pvalues(zvalues: &Array1<f64>, df: f64) -> Result<Array1<f64>> {
    let t = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| MixedLogitError::Statistics(format!("{e:?}")))?;
    Ok(zvalues.mapv(|z| 2.0 * t.sf(z.abs())))
}

/// Akaike and Bayesian information criteria.
pub fn information_criteria(loglik: f64, n_params: usize, sample_size: usize) -> (f64, f64) {
    let k = n_params as f64;
    let aic = 2.0 * k - 2.0 * loglik;
    let bic = (sample_size as f64).ln() * k - 2.0 * loglik;
    (aic, bic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, array};

    #[test]
    fn test_information_of_quadratic() {
        let a = array![[4.0, 1.0], [1.0, 3.0]];
        let grad = |theta: &Array1<f64>| Ok(a.dot(theta));
        let info = observed_information(grad, &arr1(&[0.3, -0.2])).unwrap();
        for (got, want) in info.iter().zip(a.iter()) {
            assert_abs_diff_eq!(*got, *want, epsilon = 1e-5);
        }
        assert_eq!(info[[0, 1]], info[[1, 0]]);

        let se = standard_errors(&info);
        assert_abs_diff_eq!(se[0], (3.0_f64 / 11.0).sqrt(), epsilon = 1e-5);
        assert_abs_diff_eq!(se[1], (4.0_f64 / 11.0).sqrt(), epsilon = 1e-5);
    }

    #[test]
    fn test_singular_direction_is_dropped() {
        let info = array![[2.0, 0.0], [0.0, 0.0]];
        let se = standard_errors(&info);
        assert_abs_diff_eq!(se[0], 0.5_f64.sqrt(), epsilon = 1e-12);
        assert_eq!(se[1], 0.0);
    }

    #[test]
    fn test_non_finite_information_is_an_error() {
        let grad = |theta: &Array1<f64>| Ok(theta.mapv(|_| f64::NAN));
        let err = observed_information(grad, &arr1(&[1.0])).unwrap_err();
        assert!(matches!(err, MixedLogitError::Hessian { row: 0, col: 0 }));
    }

    #[test]
    fn test_gradient_error_is_propagated() {
        let grad = |_: &Array1<f64>| Err(MixedLogitError::Backend("oom".into()));
        let err = observed_information(grad, &arr1(&[1.0, 2.0])).unwrap_err();
        assert!(matches!(err, MixedLogitError::Backend(_)));
    }

    #[test]
    fn test_wald_pvalues() {
        let p = wald_pvalues(&arr1(&[0.0, 1.959963984540054, -50.0]), 1e6).unwrap();
        assert_abs_diff_eq!(p[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p[1], 0.05, epsilon = 1e-4);
        assert!(p[2] < 1e-12);
        assert!(wald_pvalues(&arr1(&[1.0]), 0.0).is_err());
    }

    #[test]
    fn test_information_criteria() {
        let (aic, bic) = information_criteria(-100.0, 3, 50);
        assert_abs_diff_eq!(aic, 206.0, epsilon = 1e-12);
        assert_abs_diff_eq!(bic, 50.0_f64.ln() * 3.0 + 200.0, epsilon = 1e-12);
    }
}
