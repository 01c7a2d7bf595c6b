//! Distributional checks of the generated draws with a two-sample KS test.

use kolmogorov_smirnov::test_f64;
use mixed_logit::distributions::MixingDistribution;
use mixed_logit::draws::{generate_draws, DrawMethod};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

fn reference_normal(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = SmallRng::seed_from_u64(seed);
    (0..n).map(|_| rng.sample::<f64, _>(StandardNormal)).collect()
}

fn draws_of(dist: MixingDistribution, method: DrawMethod, seed: u64) -> Vec<f64> {
    let mut rng = SmallRng::seed_from_u64(seed);
    generate_draws(40, 50, &[dist], method, &mut rng)
        .unwrap()
        .iter()
        .copied()
        .collect()
}

#[test]
fn test_halton_normal_draws_match_standard_normal() {
    let draws = draws_of(
        MixingDistribution::Normal,
        DrawMethod::Halton { shuffled: false },
        0,
    );
    let res = test_f64(&draws, &reference_normal(2000, 42), 0.999);
    assert!(!res.is_rejected, "KS statistic {}", res.statistic);
}

#[test]
fn test_pseudo_random_normal_draws_match_standard_normal() {
    let draws = draws_of(MixingDistribution::Normal, DrawMethod::PseudoRandom, 3);
    let res = test_f64(&draws, &reference_normal(2000, 43), 0.999);
    assert!(!res.is_rejected, "KS statistic {}", res.statistic);
}

#[test]
fn test_triangular_draws_are_not_normal() {
    let draws = draws_of(
        MixingDistribution::Triangular,
        DrawMethod::Halton { shuffled: true },
        5,
    );
    assert!(draws.iter().all(|&v| v > -1.0 && v < 1.0));
    let res = test_f64(&draws, &reference_normal(2000, 44), 0.999);
    assert!(res.is_rejected);
}
