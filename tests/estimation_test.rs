//! End-to-end estimation on simulated panel data.
//!
//! Choices are generated from a mixed logit with a fixed price coefficient and a
//! normally distributed quality coefficient, then the model is re-estimated.

use mixed_logit::config::{FitOptions, PredictOptions};
use mixed_logit::data::{ChoiceData, ModelSpec};
use mixed_logit::distributions::MixingDistribution;
use mixed_logit::mixed_logit::MixedLogit;
use ndarray::Array2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

const N_INDIVIDUALS: usize = 150;
const N_PERIODS: usize = 4;
const ALTS: [&str; 3] = ["air", "bus", "rail"];
const PRICE: f64 = -1.0;
const QUALITY_MEAN: f64 = 1.0;
const QUALITY_SD: f64 = 0.5;

fn simulate(seed: u64) -> ChoiceData {
    let mut rng = SmallRng::seed_from_u64(seed);
    let rows = N_INDIVIDUALS * N_PERIODS * ALTS.len();
    let mut x = Array2::zeros((rows, 3));
    let mut alts = Vec::with_capacity(rows);
    let mut ids = Vec::with_capacity(rows);
    let mut panels = Vec::with_capacity(rows);
    let mut choice = vec![0.0; rows];

    let mut row = 0;
    for person in 0..N_INDIVIDUALS {
        let quality = QUALITY_MEAN + QUALITY_SD * rng.sample::<f64, _>(StandardNormal);
        for period in 0..N_PERIODS {
            let first = row;
            let mut utilities = Vec::with_capacity(ALTS.len());
            for alt in ALTS {
                let price: f64 = rng.gen_range(0.5..3.0);
                let q: f64 = rng.sample(StandardNormal);
                let income: f64 = 1.0 + person as f64 / N_INDIVIDUALS as f64;
                x[[row, 0]] = price;
                x[[row, 1]] = q;
                x[[row, 2]] = income;
                let gumbel = -(-rng.gen::<f64>().max(1e-12).ln()).ln();
                utilities.push(PRICE * price + quality * q + gumbel);
                alts.push(alt);
                ids.push((person * N_PERIODS + period) as u64);
                panels.push(person as u64);
                row += 1;
            }
            let best = utilities
                .iter()
                .enumerate()
                .fold(0, |best, (j, &u)| if u > utilities[best] { j } else { best });
            choice[first + best] = 1.0;
        }
    }

    ChoiceData::new(x, &["price", "quality", "income"], &alts, ids)
        .with_choice(choice)
        .with_panels(panels)
}

#[test]
fn test_recovers_simulated_coefficients() {
    let mut data = simulate(2024);
    // Drop income; it did not enter the utilities.
    data.x = data.x.slice(ndarray::s![.., 0..2]).to_owned();
    data.varnames.truncate(2);

    let spec = ModelSpec::new().random("quality", MixingDistribution::Normal);
    let model = MixedLogit::new();
    let options = FitOptions::default()
        .set_n_draws(100)
        .set_seed(7)
        .set_maxiter(200)
        .set_verbose(0);
    let start = model
        .fit(&data, &spec, &options.clone().set_maxiter(0))
        .unwrap();
    let fitted = model.fit(&data, &spec, &options).unwrap();

    assert_eq!(fitted.coeff_names, vec!["price", "quality", "sd.quality"]);
    assert_eq!(fitted.sample_size, N_INDIVIDUALS);
    assert_eq!(fitted.alternatives, vec!["air", "bus", "rail"]);
    assert!(fitted.loglikelihood > start.loglikelihood);
    assert!(fitted.total_iter > 0);
    assert!(fitted.total_fun_eval >= fitted.total_iter);

    assert!((fitted.coeff[0] - PRICE).abs() < 0.35, "price {}", fitted.coeff[0]);
    assert!(
        (fitted.coeff[1] - QUALITY_MEAN).abs() < 0.4,
        "quality {}",
        fitted.coeff[1]
    );
    for i in 0..2 {
        assert!(fitted.stderr[i].is_finite() && fitted.stderr[i] > 0.0);
        assert!(fitted.pvalues[i] < 0.01);
    }

    let pred = model
        .predict(
            &fitted,
            &data,
            &PredictOptions::default().set_seed(3).set_verbose(0),
        )
        .unwrap();
    assert_eq!(pred.choices.len(), N_INDIVIDUALS);
    assert_eq!(pred.proba.dim(), (N_INDIVIDUALS, ALTS.len()));
    let total: f64 = pred.freq.values().sum();
    assert!((total - 1.0).abs() < 0.01);
}

#[test]
fn test_intercepts_and_individual_specific_variables() {
    let data = simulate(9);
    let spec = ModelSpec::new()
        .random("price", MixingDistribution::LogNormal)
        .individual_specific("income")
        .set_fit_intercept(true)
        .set_base_alt("bus");
    let options = FitOptions::default()
        .set_n_draws(30)
        .set_seed(1)
        .set_maxiter(0)
        .set_halton(false)
        .set_verbose(0);
    let fitted = MixedLogit::new().fit(&data, &spec, &options).unwrap();

    assert_eq!(
        fitted.coeff_names,
        vec![
            "_intercept.air",
            "_intercept.rail",
            "income.air",
            "income.rail",
            "price",
            "quality",
            "sd.price"
        ]
    );
    assert_eq!(fitted.total_iter, 0);
    assert!(fitted.loglikelihood.is_finite());
}

#[test]
fn test_weights_are_normalized_per_unit() {
    let data = simulate(11);
    let spec = ModelSpec::new().random("quality", MixingDistribution::Normal);
    let options = FitOptions::default()
        .set_n_draws(20)
        .set_seed(4)
        .set_maxiter(0)
        .set_verbose(0);
    let model = MixedLogit::new();

    let unweighted = model.fit(&data, &spec, &options).unwrap();
    // A constant weight normalizes back to one.
    let rows = data.n_rows();
    let weighted = model
        .fit(&data.clone().with_weights(vec![3.5; rows]), &spec, &options)
        .unwrap();
    assert!((weighted.loglikelihood - unweighted.loglikelihood).abs() < 1e-9);
}
