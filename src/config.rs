//! Estimation options and numeric guard constants.
//!
//! Options follow a consuming builder style: every `set_*` method takes `self`
//! and returns the updated value, so options can be assembled in one expression.
//!
//! ```rust
//! use mixed_logit::config::FitOptions;
//!
//! let opts = FitOptions::default().set_n_draws(200).set_seed(42).set_verbose(0);
//! assert_eq!(opts.n_draws, 200);
//! ```

/// Utilities above this value are clamped before exponentiation (`ln(f64::MAX) ≈ 709`).
pub const MAX_EXP_UTILITY: f64 = 700.0;

/// Replacement for denominators and panel products that are exactly zero.
pub const MIN_POSITIVE: f64 = 1e-300;

/// Default number of Halton values discarded at the start of every sequence.
pub const HALTON_BURN_IN: usize = 100;

/// Overflow/underflow guards used by the probability simulator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericGuards {
    pub max_exp_utility: f64,
    pub min_positive: f64,
}

impl Default for NumericGuards {
    fn default() -> Self {
        Self {
            max_exp_utility: MAX_EXP_UTILITY,
            min_positive: MIN_POSITIVE,
        }
    }
}

impl NumericGuards {
    /// Guards sized for `f32` backends such as `wgpu`.
    pub fn single_precision() -> Self {
        Self {
            max_exp_utility: 80.0,
            min_positive: 1e-30,
        }
    }
}

/// Options controlling [`MixedLogit::fit`](crate::mixed_logit::MixedLogit::fit).
#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    /// Starting coefficients (length K + Kr). Defaults to 0.1 everywhere.
    pub init_coeff: Option<Vec<f64>>,
    /// Maximum optimizer iterations. Zero evaluates the starting point only.
    pub maxiter: usize,
    /// Gradient-norm tolerance of the minimizer.
    pub gtol: f64,
    pub seed: Option<u64>,
    pub n_draws: usize,
    /// Halton draws when true, pseudo-random uniforms otherwise.
    pub halton: bool,
    /// Scramble each Halton sequence with a random permutation.
    pub shuffle_halton: bool,
    /// 0: silent, 1: milestones, 2: every likelihood evaluation.
    pub verbose: u8,
    pub guards: NumericGuards,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            init_coeff: None,
            maxiter: 2000,
            gtol: 1e-4,
            seed: None,
            n_draws: 500,
            halton: true,
            shuffle_halton: false,
            verbose: 1,
            guards: NumericGuards::default(),
        }
    }
}

impl FitOptions {
    pub fn set_init_coeff(mut self, init_coeff: Vec<f64>) -> Self {
        self.init_coeff = Some(init_coeff);
        self
    }

    pub fn set_maxiter(mut self, maxiter: usize) -> Self {
        self.maxiter = maxiter;
        self
    }

    pub fn set_gtol(mut self, gtol: f64) -> Self {
        self.gtol = gtol;
        self
    }

    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn set_n_draws(mut self, n_draws: usize) -> Self {
        self.n_draws = n_draws;
        self
    }

    pub fn set_halton(mut self, halton: bool) -> Self {
        self.halton = halton;
        self
    }

    pub fn set_shuffle_halton(mut self, shuffle: bool) -> Self {
        self.shuffle_halton = shuffle;
        self
    }

    pub fn set_verbose(mut self, verbose: u8) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn set_guards(mut self, guards: NumericGuards) -> Self {
        self.guards = guards;
        self
    }
}

/// Options controlling [`MixedLogit::predict`](crate::mixed_logit::MixedLogit::predict).
#[derive(Debug, Clone, PartialEq)]
pub struct PredictOptions {
    pub seed: Option<u64>,
    pub n_draws: usize,
    pub halton: bool,
    pub verbose: u8,
    pub guards: NumericGuards,
}

impl Default for PredictOptions {
    fn default() -> Self {
        Self {
            seed: None,
            n_draws: 200,
            halton: true,
            verbose: 1,
            guards: NumericGuards::default(),
        }
    }
}

impl PredictOptions {
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn set_n_draws(mut self, n_draws: usize) -> Self {
        self.n_draws = n_draws;
        self
    }

    pub fn set_halton(mut self, halton: bool) -> Self {
        self.halton = halton;
        self
    }

    pub fn set_verbose(mut self, verbose: u8) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn set_guards(mut self, guards: NumericGuards) -> Self {
        self.guards = guards;
        self
    }
}
