//! Mapping from the flat parameter vector to simulated coefficients.

use burn::prelude::*;

use crate::backend::index_tensor;
use crate::layout::CoefficientLayout;

/// Fixed coefficients `[Kf]` (absent when every column is random) and simulated
/// random coefficients `[N, Kr, R]`.
///
/// Random coefficient `k` for draw `r` of unit `n` is
/// `transform_k(mean_k + sd_k * draws[n, k, r])`.
pub fn transform_betas<B: Backend>(
    betas: Tensor<B, 1>,
    draws: Tensor<B, 3>,
    layout: &CoefficientLayout,
) -> (Option<Tensor<B, 1>>, Tensor<B, 3>) {
    let device = betas.device();
    let [n, kr, r] = draws.dims();

    let fixed = (layout.n_fixed() > 0)
        .then(|| betas.clone().select(0, index_tensor(&layout.fixed_columns(), &device)));

    let means = betas
        .clone()
        .select(0, index_tensor(&layout.random_columns(), &device))
        .reshape([1, kr, 1])
        .expand([n, kr, r]);
    let sds = betas
        .select(0, index_tensor(&layout.sd_indices(), &device))
        .reshape([1, kr, 1])
        .expand([n, kr, r]);
    let simulated = means + sds * draws;

    (fixed, apply_distributions(simulated, layout))
}

/// Derivative of each random coefficient's transform, `[N, Kr, R]`, expressed
/// through the simulated coefficients returned by [`transform_betas`].
pub fn compute_derivatives<B: Backend>(
    random_coeffs: Tensor<B, 3>,
    layout: &CoefficientLayout,
) -> Tensor<B, 3> {
    let dists = layout.distributions();
    if dists.iter().all(|d| d.is_linear()) {
        return random_coeffs.ones_like();
    }
    let columns: Vec<Tensor<B, 3>> = dists
        .iter()
        .enumerate()
        .map(|(k, dist)| dist.derivative(column(&random_coeffs, k)))
        .collect();
    Tensor::cat(columns, 1)
}

fn apply_distributions<B: Backend>(
    simulated: Tensor<B, 3>,
    layout: &CoefficientLayout,
) -> Tensor<B, 3> {
    let dists = layout.distributions();
    if dists.iter().all(|d| d.is_linear()) {
        return simulated;
    }
    let columns: Vec<Tensor<B, 3>> = dists
        .iter()
        .enumerate()
        .map(|(k, dist)| dist.transform(column(&simulated, k)))
        .collect();
    Tensor::cat(columns, 1)
}

/// Slice `[N, 1, R]` of random coefficient `k`.
fn column<B: Backend>(coeffs: &Tensor<B, 3>, k: usize) -> Tensor<B, 3> {
    let [n, _, r] = coeffs.dims();
    coeffs.clone().slice([0..n, k..k + 1, 0..r])
}
