/*!
Mixed logit estimation and prediction.

[`MixedLogit`] holds the backend device. [`MixedLogit::fit`] arranges the data,
balances panels, generates draws, uploads everything once, and then minimizes
the negative simulated log-likelihood with BFGS. Standard errors come from the
observed information at the optimum.

# Examples

```rust
use mixed_logit::config::FitOptions;
use mixed_logit::data::{ChoiceData, ModelSpec};
use mixed_logit::distributions::MixingDistribution;
use mixed_logit::mixed_logit::MixedLogit;
use ndarray::array;

let data = ChoiceData::new(
    array![[2.0, 1.0], [1.0, 3.0], [3.0, 1.0], [2.0, 4.0]],
    &["a", "b"],
    &[1, 2, 1, 2],
    vec![1, 1, 2, 2],
)
.with_choice(vec![0.0, 1.0, 0.0, 1.0]);
let spec = ModelSpec::new().random("a", MixingDistribution::Normal);

let model = MixedLogit::new();
let fitted = model
    .fit(&data, &spec, &FitOptions::default().set_maxiter(0).set_n_draws(50).set_verbose(0))
    .unwrap();
assert_eq!(fitted.coeff_names, vec!["a", "b", "sd.a"]);
```
*/

use std::collections::BTreeMap;
use std::time::Instant;

use burn::prelude::*;
use ndarray::{Array1, Array2};
use ndarray_stats::QuantileExt;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::backend::{array_to_tensor, tensor_to_vec, HostBackend};
use crate::config::{FitOptions, NumericGuards, PredictOptions};
use crate::data::{ChoiceData, ModelSpec};
use crate::draws::{generate_draws, DrawMethod};
use crate::errors::{MixedLogitError, Result};
use crate::inference::{information_criteria, observed_information, standard_errors, wald_pvalues};
use crate::layout::CoefficientLayout;
use crate::likelihood::{loglik_gradient, prob_product_across_panels, EstimationSession};
use crate::optimizer::minimize;
use crate::panels::{balance_panels, no_panels};
use crate::simulator::{compute_probabilities, SimulationData};

/// Starting value of every coefficient when none are supplied.
const DEFAULT_INIT_COEFF: f64 = 0.1;

/// Mixed logit estimator bound to one backend device.
#[derive(Debug, Clone)]
pub struct MixedLogit<B: Backend = HostBackend> {
    device: B::Device,
}

impl MixedLogit<HostBackend> {
    pub fn new() -> Self {
        Self {
            device: Default::default(),
        }
    }
}

impl Default for MixedLogit<HostBackend> {
    fn default() -> Self {
        Self::new()
    }
}

/// Estimation results.
#[derive(Debug, Clone)]
pub struct FittedModel {
    pub coeff: Array1<f64>,
    /// Design-matrix column names followed by `sd.`-prefixed random ones.
    pub coeff_names: Vec<String>,
    pub stderr: Array1<f64>,
    pub zvalues: Array1<f64>,
    pub pvalues: Array1<f64>,
    pub loglikelihood: f64,
    pub convergence: bool,
    pub total_iter: usize,
    pub total_fun_eval: usize,
    pub estim_time_sec: f64,
    /// Number of units (panels, or situations without panels).
    pub sample_size: usize,
    pub aic: f64,
    pub bic: f64,
    pub alternatives: Vec<String>,
    pub spec: ModelSpec,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Most probable alternative of every unit.
    pub choices: Vec<String>,
    /// `(N, J)` simulated probabilities, columns ordered as `alternatives`.
    pub proba: Array2<f64>,
    /// Share of units predicted to choose each alternative, rounded to 3 decimals.
    pub freq: BTreeMap<String, f64>,
    pub alternatives: Vec<String>,
}

struct Prepared<B: Backend> {
    data: SimulationData<B>,
    layout: CoefficientLayout,
    alternatives: Vec<String>,
    sample_size: usize,
}

impl<B: Backend> MixedLogit<B> {
    pub fn with_device(device: B::Device) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Estimates the model by maximum simulated likelihood.
    ///
    /// Configuration and data-shape problems fail before any numerical work.
    /// Non-convergence is reported through [`FittedModel::convergence`].
    pub fn fit(
        &self,
        data: &ChoiceData,
        spec: &ModelSpec,
        options: &FitOptions,
    ) -> Result<FittedModel> {
        let start = Instant::now();
        let method = DrawMethod::from_flags(options.halton, options.shuffle_halton);
        let prepared = self.prepare(data, spec, true, options.n_draws, method, options.seed)?;
        let Prepared {
            data: sim,
            layout,
            alternatives,
            sample_size,
        } = prepared;

        let n_coeff = layout.n_coefficients();
        let x0 = match &options.init_coeff {
            Some(init) if init.len() != n_coeff => {
                return Err(MixedLogitError::InitCoeffLength {
                    expected: n_coeff,
                    actual: init.len(),
                })
            }
            Some(init) => Array1::from(init.clone()),
            None => Array1::from_elem(n_coeff, DEFAULT_INIT_COEFF),
        };

        if options.verbose > 0 {
            log::info!(
                "Estimating mixed logit: {} units, {} alternatives, {} coefficients, {} draws",
                sample_size,
                alternatives.len(),
                n_coeff,
                options.n_draws
            );
        }

        let mut session = EstimationSession::new(&sim, &layout, options.guards, options.verbose);
        let outcome = minimize(
            |betas| session.evaluate(betas),
            x0,
            options.maxiter,
            options.gtol,
        );
        session.finish();
        let outcome = outcome?;

        if !outcome.converged && options.verbose > 0 {
            log::warn!(
                "Maximum number of iterations reached without convergence ({} iterations)",
                outcome.iterations
            );
        }

        let guards = options.guards;
        let info = observed_information(
            |betas| loglik_gradient(betas, &sim, &layout, &guards).map(|(_, grad)| grad),
            &outcome.params,
        )?;
        let stderr = standard_errors(&info);
        let zvalues = &outcome.params / &stderr;
        let pvalues = wald_pvalues(&zvalues, sample_size as f64)?;

        let loglikelihood = -outcome.value;
        let (aic, bic) = information_criteria(loglikelihood, n_coeff, sample_size);
        let estim_time_sec = start.elapsed().as_secs_f64();
        if options.verbose > 0 {
            log::info!(
                "Estimation time= {:.1} seconds, Log-Likelihood= {:.3}",
                estim_time_sec,
                loglikelihood
            );
        }

        Ok(FittedModel {
            coeff: outcome.params,
            coeff_names: layout.coefficient_names(),
            stderr,
            zvalues,
            pvalues,
            loglikelihood,
            convergence: outcome.converged,
            total_iter: outcome.iterations,
            total_fun_eval: session.n_evals(),
            estim_time_sec,
            sample_size,
            aic,
            bic,
            alternatives,
            spec: spec.clone(),
        })
    }

    /// Simulated choice probabilities and predicted choices with fitted coefficients.
    ///
    /// # Errors
    ///
    /// [`MixedLogitError::InconsistentCoefficients`] when `data` does not yield
    /// the coefficient names the model was fitted with.
    pub fn predict(
        &self,
        fitted: &FittedModel,
        data: &ChoiceData,
        options: &PredictOptions,
    ) -> Result<Prediction> {
        let method = DrawMethod::from_flags(options.halton, false);
        let Prepared {
            data: sim,
            layout,
            alternatives,
            sample_size,
        } = self.prepare(data, &fitted.spec, false, options.n_draws, method, options.seed)?;

        let names = layout.coefficient_names();
        if names != fitted.coeff_names {
            return Err(MixedLogitError::InconsistentCoefficients {
                expected: fitted.coeff_names.clone(),
                found: names,
            });
        }

        let proba = simulated_probabilities(&fitted.coeff, &sim, &layout, &options.guards)?;
        let mut choices = Vec::with_capacity(sample_size);
        for row in proba.outer_iter() {
            let best = row
                .argmax()
                .map_err(|e| MixedLogitError::Statistics(format!("{e:?}")))?;
            choices.push(alternatives[best].clone());
        }

        let mut freq = BTreeMap::new();
        for choice in &choices {
            *freq.entry(choice.clone()).or_insert(0.0) += 1.0;
        }
        for share in freq.values_mut() {
            *share = (*share / sample_size as f64 * 1000.0).round() / 1000.0;
        }
        if options.verbose > 0 {
            log::info!("Predicted choices for {} units: {:?}", sample_size, freq);
        }

        Ok(Prediction {
            choices,
            proba,
            freq,
            alternatives,
        })
    }

    /// Runs a tiny estimation on this device; fails if the backend cannot execute it.
    pub fn check_device(&self) -> Result<()> {
        let data = ChoiceData::new(
            ndarray::array![[2.0, 1.0], [1.0, 3.0], [3.0, 1.0], [2.0, 4.0]],
            &["a", "b"],
            &[1, 2, 1, 2],
            vec![1, 1, 2, 2],
        )
        .with_choice(vec![0.0, 1.0, 0.0, 1.0]);
        let spec = ModelSpec::new()
            .random("a", crate::distributions::MixingDistribution::Normal)
            .random("b", crate::distributions::MixingDistribution::Normal);
        let options = FitOptions::default().set_maxiter(0).set_verbose(0);
        self.fit(&data, &spec, &options).map(|_| ())
    }

    fn prepare(
        &self,
        data: &ChoiceData,
        spec: &ModelSpec,
        require_choice: bool,
        n_draws: usize,
        method: DrawMethod,
        seed: Option<u64>,
    ) -> Result<Prepared<B>> {
        let arranged = data.arrange(spec, require_choice)?;
        let layout = CoefficientLayout::new(&arranged.names, &spec.randvars)?;

        let panels = match &arranged.panels {
            Some(ids) => balance_panels(
                &arranged.x,
                arranged.y.as_ref(),
                arranged.avail.as_ref(),
                ids,
            )?,
            None => no_panels(&arranged.x, arranged.y.as_ref(), arranged.avail.as_ref()),
        };
        let sample_size = panels.n_units();

        let mut rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        let draws = generate_draws(
            sample_size,
            n_draws,
            &layout.distributions(),
            method,
            &mut rng,
        )?;

        // Weights are per unit and normalized to sum to the number of units.
        let weights = arranged.weights.as_ref().map(|w| {
            let unit = panels.first_of_unit(w);
            let total: f64 = unit.iter().sum();
            unit.iter()
                .map(|v| v * sample_size as f64 / total)
                .collect::<Vec<f64>>()
        });

        let data = SimulationData::upload(&panels, &draws, weights.as_deref(), &layout, &self.device);
        Ok(Prepared {
            data,
            layout,
            alternatives: arranged.alternatives,
            sample_size,
        })
    }
}

/// Draw-averaged probabilities `(N, J)`, multiplied across panel periods.
fn simulated_probabilities<B: Backend>(
    coeff: &Array1<f64>,
    sim: &SimulationData<B>,
    layout: &CoefficientLayout,
    guards: &NumericGuards,
) -> Result<Array2<f64>> {
    let [n, p, j, r] = sim.dims();
    let prob = compute_probabilities(array_to_tensor(coeff, sim.device()), sim, layout, guards);
    let prob = prob_product_across_panels(
        prob.reshape([n, p, j * r]),
        &sim.panel_info,
        sim.balanced,
        guards,
    );
    let proba = prob.reshape([n, j, r]).mean_dim(2).reshape([n, j]);
    Array2::from_shape_vec((n, j), tensor_to_vec(proba)?)
        .map_err(|e| MixedLogitError::Backend(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::MixingDistribution;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn tiny() -> ChoiceData {
        ChoiceData::new(
            array![[2.0, 1.0], [1.0, 3.0], [3.0, 1.0], [2.0, 4.0]],
            &["a", "b"],
            &[1, 2, 1, 2],
            vec![1, 1, 2, 2],
        )
        .with_choice(vec![0.0, 1.0, 0.0, 1.0])
    }

    fn quiet() -> FitOptions {
        FitOptions::default().set_seed(0).set_n_draws(100).set_verbose(0)
    }

    #[test]
    fn test_zero_iterations_fit() {
        let spec = ModelSpec::new().random("a", MixingDistribution::Normal);
        let fitted = MixedLogit::new()
            .fit(&tiny(), &spec, &quiet().set_maxiter(0))
            .unwrap();
        assert_eq!(fitted.total_iter, 0);
        assert_eq!(fitted.coeff.len(), 3);
        assert_eq!(fitted.coeff, Array1::from_elem(3, 0.1));
        assert_eq!(fitted.coeff_names, vec!["a", "b", "sd.a"]);
        assert_eq!(fitted.total_fun_eval, 1);
        assert_eq!(fitted.sample_size, 2);
        assert!(!fitted.convergence);
        assert!(fitted.loglikelihood < 0.0);
        assert_abs_diff_eq!(
            fitted.aic,
            6.0 - 2.0 * fitted.loglikelihood,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_init_coeff_length_is_checked() {
        let spec = ModelSpec::new().random("a", MixingDistribution::Normal);
        let err = MixedLogit::new()
            .fit(&tiny(), &spec, &quiet().set_init_coeff(vec![0.0; 2]))
            .unwrap_err();
        assert!(matches!(
            err,
            MixedLogitError::InitCoeffLength { expected: 3, actual: 2 }
        ));
    }

    #[test]
    fn test_missing_random_variables() {
        let err = MixedLogit::new()
            .fit(&tiny(), &ModelSpec::new(), &quiet())
            .unwrap_err();
        assert!(matches!(err, MixedLogitError::MissingRandomVariables));
    }

    #[test]
    fn test_check_device_on_host() {
        assert!(MixedLogit::new().check_device().is_ok());
    }

    #[test]
    fn test_predict_with_fitted_coefficients() {
        let spec = ModelSpec::new().random("b", MixingDistribution::Normal);
        let model = MixedLogit::new();
        let fitted = model
            .fit(&tiny(), &spec, &quiet().set_init_coeff(vec![0.0, 2.0, 0.5]).set_maxiter(0))
            .unwrap();

        let pred = model
            .predict(&fitted, &tiny(), &PredictOptions::default().set_seed(1).set_verbose(0))
            .unwrap();
        assert_eq!(pred.proba.dim(), (2, 2));
        for row in pred.proba.outer_iter() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-12);
        }
        // Alternative 2 has the larger b in both situations.
        assert_eq!(pred.choices, vec!["2", "2"]);
        assert_eq!(pred.freq.get("2"), Some(&1.0));
    }

    #[test]
    fn test_predict_rejects_other_variables() {
        let spec = ModelSpec::new().random("a", MixingDistribution::Normal);
        let model = MixedLogit::new();
        let fitted = model.fit(&tiny(), &spec, &quiet().set_maxiter(0)).unwrap();

        let mut other = tiny();
        other.varnames = vec!["a".into(), "c".into()];
        let err = model
            .predict(&fitted, &other, &PredictOptions::default().set_verbose(0))
            .unwrap_err();
        assert!(matches!(err, MixedLogitError::InconsistentCoefficients { .. }));
    }
}
