//! Monte Carlo draws for the mixing distributions.
//!
//! Draws are produced on the host as an `ndarray::Array3` of shape
//! `(sample_size, n_randvars, n_draws)` and uploaded to the backend together with
//! the rest of the estimation data. Every (individual, random coefficient) pair
//! gets its own stretch of a quasi-random (Halton) or pseudo-random sequence, which
//! is then pushed through the coefficient's inverse-CDF.

use ndarray::{Array3, Axis};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::Open01;

use crate::config::HALTON_BURN_IN;
use crate::distributions::MixingDistribution;
use crate::errors::{MixedLogitError, Result};

/// Prime bases for the Halton sequences, one per random coefficient (cycled).
pub const HALTON_PRIMES: [usize; 45] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 71, 73, 79, 83, 89, 97,
    101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151, 157, 163, 167, 173, 179, 181, 191, 193,
    197, 199,
];

/// How the underlying uniform draws are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMethod {
    /// Low-discrepancy Halton sequences; `shuffled` randomly permutes each sequence.
    Halton { shuffled: bool },
    /// Independent uniforms on the open interval (0, 1).
    PseudoRandom,
}

impl DrawMethod {
    pub fn from_flags(halton: bool, shuffled: bool) -> Self {
        if halton {
            DrawMethod::Halton { shuffled }
        } else {
            DrawMethod::PseudoRandom
        }
    }
}

/// Generates draws of shape `(sample_size, distributions.len(), n_draws)`, already
/// transformed by each distribution's inverse-CDF.
///
/// # Errors
///
/// Returns [`MixedLogitError::InvalidDrawCount`] when `n_draws` is zero.
pub fn generate_draws<R: Rng + ?Sized>(
    sample_size: usize,
    n_draws: usize,
    distributions: &[MixingDistribution],
    method: DrawMethod,
    rng: &mut R,
) -> Result<Array3<f64>> {
    if n_draws == 0 {
        return Err(MixedLogitError::InvalidDrawCount);
    }
    let n_vars = distributions.len();
    let mut draws = match method {
        DrawMethod::Halton { shuffled } => {
            halton_draws(sample_size, n_draws, n_vars, shuffled, rng)
        }
        DrawMethod::PseudoRandom => random_draws(sample_size, n_draws, n_vars, rng),
    };

    for (k, dist) in distributions.iter().enumerate() {
        draws
            .index_axis_mut(Axis(1), k)
            .mapv_inplace(|u| dist.inverse_cdf(u));
    }
    Ok(draws)
}

/// Uniform pseudo-random draws in (0, 1).
pub fn random_draws<R: Rng + ?Sized>(
    sample_size: usize,
    n_draws: usize,
    n_vars: usize,
    rng: &mut R,
) -> Array3<f64> {
    Array3::from_shape_fn((sample_size, n_vars, n_draws), |_| rng.sample(Open01))
}

/// Uniform Halton draws in (0, 1). Variable `k` uses the prime
/// `HALTON_PRIMES[k % HALTON_PRIMES.len()]`; its sequence of length
/// `sample_size * n_draws` is laid out row-major over `(sample_size, n_draws)`.
pub fn halton_draws<R: Rng + ?Sized>(
    sample_size: usize,
    n_draws: usize,
    n_vars: usize,
    shuffled: bool,
    rng: &mut R,
) -> Array3<f64> {
    let sequences: Vec<Vec<f64>> = (0..n_vars)
        .map(|k| {
            let prime = HALTON_PRIMES[k % HALTON_PRIMES.len()];
            let mut seq = halton_sequence(sample_size * n_draws, prime, HALTON_BURN_IN);
            if shuffled {
                seq.shuffle(rng);
            }
            seq
        })
        .collect();

    Array3::from_shape_fn((sample_size, n_vars, n_draws), |(n, k, r)| {
        sequences[k][n * n_draws + r]
    })
}

/// Halton sequence in base `prime`, skipping the first `drop` values.
///
/// The sequence is grown digit by digit: after `t` rounds it holds the first
/// `prime^t` radical inverses, and each round appends `prime - 1` shifted
/// copies of the current values.
pub fn halton_sequence(length: usize, prime: usize, drop: usize) -> Vec<f64> {
    let mut seq = vec![0.0_f64];
    let base = prime as f64;
    let mut scale = 1.0_f64;
    while seq.len() < length + drop {
        scale /= base;
        let current = seq.len();
        seq.reserve(current * (prime - 1));
        for digit in 1..prime {
            let shift = digit as f64 * scale;
            for i in 0..current {
                let value = seq[i] + shift;
                seq.push(value);
            }
        }
    }
    seq[drop..drop + length].to_vec()
}
