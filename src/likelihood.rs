//! Simulated log-likelihood and its analytic gradient.
//!
//! For unit `n` the simulated likelihood is the draw average of the product
//! over panel periods of the chosen-alternative probability:
//!
//! ```text
//! lik[n] = 1/R Σ_r Π_p pch[n,p,r]
//! ```
//!
//! The gradient of `log lik[n]` with respect to a parameter `θ` is
//! `1/(R lik[n]) Σ_r Π_p pch[n,p,r] Σ_{p,j} (y - p)[n,p,j,r] ∂V[n,p,j,r]/∂θ`.

use burn::prelude::*;
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::Array1;

use crate::backend::{array_to_tensor, index_tensor, tensor_to_array1, tensor_to_scalar};
use crate::config::NumericGuards;
use crate::errors::{MixedLogitError, Result};
use crate::layout::CoefficientLayout;
use crate::simulator::{simulate, SimulationData};
use crate::transform::compute_derivatives;

/// Negative simulated log-likelihood and its gradient at `betas`.
///
/// Both are negated so the pair can be handed straight to a minimizer.
pub fn loglik_gradient<B: Backend>(
    betas: &Array1<f64>,
    data: &SimulationData<B>,
    layout: &CoefficientLayout,
    guards: &NumericGuards,
) -> Result<(f64, Array1<f64>)> {
    let device = data.device();
    let [n, p, j, r] = data.dims();
    let y = data.y.as_ref().ok_or(MixedLogitError::MissingChoice)?;

    let (prob, random) = simulate(array_to_tensor(betas, device), data, layout, guards);
    let y = y.clone().unsqueeze_dim::<4>(3).expand([n, p, j, r]);

    // Probability of the chosen alternative, then across periods.
    let pch = (y.clone() * prob.clone()).sum_dim(2).reshape([n, p, r]);
    let pch = prob_product_across_panels(pch, &data.panel_info, data.balanced, guards);

    let lik = pch.clone().mean_dim(1).reshape([n]);
    let mut loglik = lik.clone().log();
    if let Some(w) = &data.weights {
        loglik = loglik * w.clone();
    }
    let loglik = tensor_to_scalar(loglik.sum());

    // Per-draw scores Σ_{p,j} (y - p) x, shape [N, K, R].
    let ymp = (y - prob).reshape([n, p * j, r]);
    let score = |x: &Tensor<B, 4>| {
        let k = x.dims()[3];
        x.clone()
            .reshape([n, p * j, k])
            .swap_dims(1, 2)
            .matmul(ymp.clone())
    };
    // Weight by the panel product, average over draws, divide by lik: [N, K].
    let scale = pch.unsqueeze_dim::<3>(1);
    let lik = lik.reshape([n, 1]);
    let reduce = |g: Tensor<B, 3>| {
        let k = g.dims()[1];
        let g = (g * scale.clone().expand([n, k, r])).mean_dim(2).reshape([n, k]);
        g / lik.clone().expand([n, k])
    };

    let der = compute_derivatives(random, layout);
    let gr_random = score(&data.xr) * der;
    let gr_sd = reduce(gr_random.clone() * data.draws.clone());
    let gr_mean = reduce(gr_random);

    let mut blocks = Vec::with_capacity(2);
    if let Some(xf) = &data.xf {
        blocks.push(reduce(score(xf)));
    }
    blocks.push(gr_mean);
    let gr_means =
        Tensor::cat(blocks, 1).select(1, index_tensor(&layout.gradient_order(), device));
    let mut grad = Tensor::cat(vec![gr_means, gr_sd], 1);

    let n_coeff = layout.n_coefficients();
    if let Some(w) = &data.weights {
        grad = grad * w.clone().reshape([n, 1]).expand([n, n_coeff]);
    }
    let grad = tensor_to_array1(grad.sum_dim(0).reshape([n_coeff]))?;

    Ok((-loglik, -grad))
}

/// Multiplies `[N, P, X]` probabilities across the period axis, giving `[N, X]`.
///
/// Padded periods contribute a factor of one. Products that underflow to zero
/// are floored at `guards.min_positive`.
pub fn prob_product_across_panels<B: Backend>(
    prob: Tensor<B, 3>,
    panel_info: &Tensor<B, 2>,
    balanced: bool,
    guards: &NumericGuards,
) -> Tensor<B, 2> {
    let [n, p, x] = prob.dims();
    let prob = if balanced {
        prob
    } else {
        let padded = panel_info
            .clone()
            .equal_elem(0.0)
            .unsqueeze_dim::<3>(2)
            .expand([n, p, x]);
        prob.mask_fill(padded, 1.0)
    };
    let product = prob.prod_dim(1).reshape([n, x]);
    product.clone().mask_fill(product.equal_elem(0.0), guards.min_positive)
}

/// Objective state owned by one fit: counts evaluations and reports progress.
pub struct EstimationSession<'a, B: Backend> {
    data: &'a SimulationData<B>,
    layout: &'a CoefficientLayout,
    guards: NumericGuards,
    verbose: u8,
    n_evals: usize,
    progress: Option<ProgressBar>,
}

impl<'a, B: Backend> EstimationSession<'a, B> {
    pub fn new(
        data: &'a SimulationData<B>,
        layout: &'a CoefficientLayout,
        guards: NumericGuards,
        verbose: u8,
    ) -> Self {
        let progress = (verbose > 1).then(|| {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{prefix:8} {spinner} {msg}")
            {
                pb.set_style(style);
            }
            pb.set_prefix("MXL");
            pb
        });
        Self {
            data,
            layout,
            guards,
            verbose,
            n_evals: 0,
            progress,
        }
    }

    /// Evaluates the negative log-likelihood and gradient at `betas`.
    pub fn evaluate(&mut self, betas: &Array1<f64>) -> Result<(f64, Array1<f64>)> {
        let (neg_loglik, neg_grad) = loglik_gradient(betas, self.data, self.layout, &self.guards)?;
        self.n_evals += 1;
        if self.verbose > 1 {
            let msg = format!("Evaluation {}  Log-Lik.={:.2}", self.n_evals, -neg_loglik);
            log::debug!("{msg}");
            if let Some(pb) = &self.progress {
                pb.set_message(msg);
                pb.tick();
            }
        }
        Ok((neg_loglik, neg_grad))
    }

    pub fn n_evals(&self) -> usize {
        self.n_evals
    }

    pub fn finish(&self) {
        if let Some(pb) = &self.progress {
            pb.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{tensor_to_vec, HostBackend};
    use crate::distributions::MixingDistribution;
    use crate::panels::no_panels;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, Array2, Array3};

    type B = HostBackend;

    #[test]
    fn test_padding_is_multiplicative_identity() {
        let device = Default::default();
        let prob: Tensor<B, 3> = array_to_tensor(
            &Array3::from_shape_vec(
                (2, 3, 2),
                vec![0.5, 0.4, 0.2, 0.5, 0.0, 0.0, 0.9, 0.1, 0.0, 0.0, 0.0, 0.0],
            )
            .unwrap(),
            &device,
        );
        let mask: Tensor<B, 2> =
            array_to_tensor(&ndarray::array![[1.0, 1.0, 0.0], [1.0, 0.0, 0.0]], &device);
        let out = tensor_to_vec(prob_product_across_panels(
            prob,
            &mask,
            false,
            &NumericGuards::default(),
        ))
        .unwrap();
        assert_abs_diff_eq!(out[0], 0.1, epsilon = 1e-15);
        assert_abs_diff_eq!(out[1], 0.2, epsilon = 1e-15);
        assert_eq!(out[2], 0.9);
        assert_eq!(out[3], 0.1);
    }

    #[test]
    fn test_zero_product_is_floored() {
        let device = Default::default();
        let prob = Tensor::<B, 3>::zeros([1, 2, 1], &device);
        let mask = Tensor::<B, 2>::ones([1, 2], &device);
        let out = prob_product_across_panels(prob, &mask, true, &NumericGuards::default());
        assert_eq!(tensor_to_vec(out).unwrap(), vec![1e-300]);
    }

    #[test]
    fn test_session_counts_evaluations() {
        let device = Default::default();
        let x = Array3::from_shape_fn((3, 2, 1), |(s, j, _)| (s + j) as f64);
        let y = Array2::from_shape_fn((3, 2), |(s, j)| ((s + j) % 2) as f64);
        let panels = no_panels(&x, Some(&y), None);
        let layout = CoefficientLayout::new(
            &["x".to_string()],
            &[("x".to_string(), MixingDistribution::Normal)],
        )
        .unwrap();
        let draws = Array3::from_shape_fn((3, 1, 4), |(s, _, r)| (s as f64 - r as f64) / 4.0);
        let data = SimulationData::<B>::upload(&panels, &draws, None, &layout, &device);

        let mut session = EstimationSession::new(&data, &layout, NumericGuards::default(), 0);
        let first = session.evaluate(&arr1(&[0.1, 0.1])).unwrap();
        let second = session.evaluate(&arr1(&[0.1, 0.1])).unwrap();
        assert_eq!(session.n_evals(), 2);
        assert_eq!(first.0, second.0);
        assert!(first.0 > 0.0);
        assert_eq!(first.1.len(), 2);
    }

    #[test]
    fn test_missing_choice_is_reported() {
        let device = Default::default();
        let x = Array3::from_shape_fn((2, 2, 1), |(s, j, _)| (s + j) as f64);
        let panels = no_panels(&x, None, None);
        let layout = CoefficientLayout::new(
            &["x".to_string()],
            &[("x".to_string(), MixingDistribution::Normal)],
        )
        .unwrap();
        let draws = Array3::zeros((2, 1, 3));
        let data = SimulationData::<B>::upload(&panels, &draws, None, &layout, &device);
        let err = loglik_gradient(&arr1(&[0.1, 0.1]), &data, &layout, &NumericGuards::default())
            .unwrap_err();
        assert!(matches!(err, MixedLogitError::MissingChoice));
    }
}
