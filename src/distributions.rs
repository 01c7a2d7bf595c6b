/*!
Mixing distributions for random coefficients.

A [`MixingDistribution`] bundles the three capabilities every random coefficient
needs: the inverse-CDF that maps uniform draws onto the standardized mixing
distribution, the transform applied to the simulated coefficient `mean + sd * draw`,
and the derivative of that transform used by the analytic gradient.

# Examples

```rust
use mixed_logit::distributions::MixingDistribution;

let dist: MixingDistribution = "ln".parse().unwrap();
assert_eq!(dist, MixingDistribution::LogNormal);
assert_eq!(dist.inverse_cdf(0.5), 0.0);
```
*/

use burn::prelude::*;
use num_traits::Float;
use statrs::function::erf::erfc_inv;
use std::f64::consts::SQRT_2;
use std::fmt;
use std::str::FromStr;

use crate::errors::MixedLogitError;

/// Distribution of a randomly varying coefficient across individuals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MixingDistribution {
    /// `n`
    Normal,
    /// `ln`: the coefficient is `exp(mean + sd * z)`.
    LogNormal,
    /// `u`: draws are uniform on (-1, 1).
    Uniform,
    /// `t`: draws are symmetric triangular on (-1, 1).
    Triangular,
    /// `tn`: negative realizations are censored at zero.
    TruncatedNormal,
}

impl MixingDistribution {
    /// Short code used by the reference estimation packages.
    pub fn code(&self) -> &'static str {
        match self {
            MixingDistribution::Normal => "n",
            MixingDistribution::LogNormal => "ln",
            MixingDistribution::Uniform => "u",
            MixingDistribution::Triangular => "t",
            MixingDistribution::TruncatedNormal => "tn",
        }
    }

    /// Maps a uniform draw `u` in (0, 1) onto the standardized mixing distribution.
    pub fn inverse_cdf(&self, u: f64) -> f64 {
        match self {
            MixingDistribution::Normal
            | MixingDistribution::LogNormal
            | MixingDistribution::TruncatedNormal => standard_normal_quantile(u),
            MixingDistribution::Triangular => triangular_quantile(u),
            MixingDistribution::Uniform => 2.0 * u - 1.0,
        }
    }

    /// True when the coefficient transform is the identity, so neither the
    /// transform nor its derivative needs to touch the tensor.
    pub fn is_linear(&self) -> bool {
        !matches!(
            self,
            MixingDistribution::LogNormal | MixingDistribution::TruncatedNormal
        )
    }

    /// Applies the coefficient transform to simulated values `mean + sd * draw`.
    pub fn transform<B: Backend, const D: usize>(&self, coeffs: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            MixingDistribution::LogNormal => coeffs.exp(),
            MixingDistribution::TruncatedNormal => {
                let positive = coeffs.clone().greater_elem(0.0).float();
                coeffs * positive
            }
            MixingDistribution::Normal
            | MixingDistribution::Uniform
            | MixingDistribution::Triangular => coeffs,
        }
    }

    /// Derivative of [`transform`](Self::transform) with respect to its input,
    /// expressed through the already transformed coefficients.
    pub fn derivative<B: Backend, const D: usize>(&self, transformed: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            MixingDistribution::LogNormal => transformed,
            MixingDistribution::TruncatedNormal => transformed.greater_elem(0.0).float(),
            MixingDistribution::Normal
            | MixingDistribution::Uniform
            | MixingDistribution::Triangular => transformed.ones_like(),
        }
    }
}

impl FromStr for MixingDistribution {
    type Err = MixedLogitError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        match code {
            "n" => Ok(MixingDistribution::Normal),
            "ln" => Ok(MixingDistribution::LogNormal),
            "u" => Ok(MixingDistribution::Uniform),
            "t" => Ok(MixingDistribution::Triangular),
            "tn" => Ok(MixingDistribution::TruncatedNormal),
            other => Err(MixedLogitError::UnsupportedDistribution {
                code: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for MixingDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Quantile function of the standard normal distribution.
pub fn standard_normal_quantile(u: f64) -> f64 {
    -SQRT_2 * erfc_inv(2.0 * u)
}

/// Quantile function of the symmetric triangular distribution on (-1, 1).
pub fn triangular_quantile<T: Float>(u: T) -> T {
    let half = T::from(0.5).unwrap();
    let two = T::from(2.0).unwrap();
    if u <= half {
        (two * u).sqrt() - T::one()
    } else {
        T::one() - (two * (T::one() - u)).sqrt()
    }
}
