/*!
Simulated logit choice probabilities.

All estimation data lives on the backend device in a [`SimulationData`] value,
uploaded once per fit or prediction. [`compute_probabilities`] evaluates, for
every (unit, period, alternative, draw), the multinomial logit probability

```text
p[n,p,j,r] = exp(V[n,p,j,r]) / Σ_j' exp(V[n,p,j',r])
V[n,p,j,r] = Σ_k Xf[n,p,j,k] Bf[k] + Σ_k Xr[n,p,j,k] Br[n,k,r]
```

with unavailable alternatives and padded panel periods set to zero.
*/

use burn::prelude::*;
use ndarray::{Array3, Axis};

use crate::backend::array_to_tensor;
use crate::config::NumericGuards;
use crate::layout::CoefficientLayout;
use crate::panels::BalancedPanels;
use crate::transform::transform_betas;

/// Estimation tensors resident on one backend device.
#[derive(Debug, Clone)]
pub struct SimulationData<B: Backend> {
    /// Columns with fixed coefficients, `[N, P, J, Kf]`.
    pub xf: Option<Tensor<B, 4>>,
    /// Columns with random coefficients, `[N, P, J, Kr]`.
    pub xr: Tensor<B, 4>,
    /// One-hot choices `[N, P, J]`; absent in prediction.
    pub y: Option<Tensor<B, 3>>,
    /// Validity mask `[N, P]`.
    pub panel_info: Tensor<B, 2>,
    /// True when `panel_info` is all ones.
    pub balanced: bool,
    /// Transformed draws `[N, Kr, R]`.
    pub draws: Tensor<B, 3>,
    /// Per-unit weights `[N]`, normalized to sum to N.
    pub weights: Option<Tensor<B, 1>>,
    /// Availability `[N, P, J]`.
    pub avail: Option<Tensor<B, 3>>,
    device: B::Device,
}

impl<B: Backend> SimulationData<B> {
    /// Splits the design tensor by coefficient role and moves everything to `device`.
    pub fn upload(
        panels: &BalancedPanels,
        draws: &Array3<f64>,
        weights: Option<&[f64]>,
        layout: &CoefficientLayout,
        device: &B::Device,
    ) -> Self {
        let fixed = layout.fixed_columns();
        let xf = (!fixed.is_empty())
            .then(|| array_to_tensor(&panels.x.select(Axis(3), &fixed), device));
        let xr = array_to_tensor(&panels.x.select(Axis(3), &layout.random_columns()), device);

        Self {
            xf,
            xr,
            y: panels.y.as_ref().map(|y| array_to_tensor(y, device)),
            panel_info: array_to_tensor(&panels.panel_info, device),
            balanced: panels.is_balanced(),
            draws: array_to_tensor(draws, device),
            weights: weights.map(|w| array_to_tensor(&ndarray::ArrayView1::from(w), device)),
            avail: panels.avail.as_ref().map(|a| array_to_tensor(a, device)),
            device: device.clone(),
        }
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// `[N, P, J, R]`
    pub fn dims(&self) -> [usize; 4] {
        let [n, p, j, _] = self.xr.dims();
        [n, p, j, self.draws.dims()[2]]
    }
}

/// Choice probabilities `[N, P, J, R]` at parameter vector `betas`.
pub fn compute_probabilities<B: Backend>(
    betas: Tensor<B, 1>,
    data: &SimulationData<B>,
    layout: &CoefficientLayout,
    guards: &NumericGuards,
) -> Tensor<B, 4> {
    simulate(betas, data, layout, guards).0
}

/// Probabilities together with the simulated random coefficients `[N, Kr, R]`
/// they were computed from.
pub(crate) fn simulate<B: Backend>(
    betas: Tensor<B, 1>,
    data: &SimulationData<B>,
    layout: &CoefficientLayout,
    guards: &NumericGuards,
) -> (Tensor<B, 4>, Tensor<B, 3>) {
    let [n, p, j, r] = data.dims();
    let kr = layout.n_random();
    let (fixed, random) = transform_betas(betas, data.draws.clone(), layout);

    let br = random.clone().unsqueeze_dim::<4>(1).expand([n, p, kr, r]);
    let mut utility = data.xr.clone().matmul(br);
    if let (Some(xf), Some(bf)) = (&data.xf, fixed) {
        let kf = bf.dims()[0];
        let bf = bf.reshape([1, 1, kf, 1]).expand([n, p, kf, 1]);
        utility = utility + xf.clone().matmul(bf).expand([n, p, j, r]);
    }

    let mut exp_utility = utility.clamp_max(guards.max_exp_utility).exp();
    if let Some(avail) = &data.avail {
        exp_utility = exp_utility * avail.clone().unsqueeze_dim::<4>(3).expand([n, p, j, r]);
    }

    let denom = exp_utility.clone().sum_dim(2);
    let denom = denom.clone().mask_fill(denom.equal_elem(0.0), guards.min_positive);
    let mut prob = exp_utility / denom.expand([n, p, j, r]);

    if !data.balanced {
        let valid = data.panel_info.clone().reshape([n, p, 1, 1]).expand([n, p, j, r]);
        prob = prob * valid;
    }
    (prob, random)
}
