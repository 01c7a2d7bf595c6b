//! # Mixed Logit
//!
//! Estimation of mixed (random-parameters) logit discrete-choice models by
//! maximum simulated likelihood, on CPU or GPU through `burn` backends.
//!
//! ## Overview
//! - **Draws**: Halton or pseudo-random uniforms pushed through the inverse-CDF
//!   of each random coefficient's mixing distribution (normal, log-normal,
//!   uniform, triangular, truncated normal).
//! - **Panels**: repeated choices of the same individual are balanced into a
//!   rectangular layout with a validity mask.
//! - **Likelihood**: vectorized logit probabilities over draws, with an analytic
//!   gradient fed to a BFGS minimizer.
//! - **Inference**: standard errors from the observed information, Wald tests,
//!   AIC and BIC.
//!
//! ## Example
//! ```rust
//! use mixed_logit::config::{FitOptions, PredictOptions};
//! use mixed_logit::data::{ChoiceData, ModelSpec};
//! use mixed_logit::distributions::MixingDistribution;
//! use mixed_logit::mixed_logit::MixedLogit;
//! use ndarray::array;
//!
//! // Two choice situations with alternatives "bus" and "car".
//! let data = ChoiceData::new(
//!     array![[1.0, 0.5], [2.0, 0.2], [1.5, 0.8], [1.0, 0.1]],
//!     &["cost", "time"],
//!     &["bus", "car", "bus", "car"],
//!     vec![1, 1, 2, 2],
//! )
//! .with_choice(vec![1.0, 0.0, 0.0, 1.0]);
//! let spec = ModelSpec::new().random("time", MixingDistribution::Normal);
//!
//! let model = MixedLogit::new();
//! let options = FitOptions::default().set_n_draws(100).set_seed(42).set_maxiter(3).set_verbose(0);
//! let fitted = model.fit(&data, &spec, &options).unwrap();
//! let pred = model
//!     .predict(&fitted, &data, &PredictOptions::default().set_seed(7).set_verbose(0))
//!     .unwrap();
//! assert_eq!(pred.proba.dim(), (2, 2));
//! ```

pub mod backend;
pub mod config;
pub mod data;
pub mod distributions;
pub mod draws;
pub mod errors;
pub mod inference;
pub mod layout;
pub mod likelihood;
pub mod mixed_logit;
pub mod optimizer;
pub mod panels;
pub mod simulator;
pub mod transform;
