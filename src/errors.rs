//! Error type shared by every stage of the estimation pipeline.
//!
//! Configuration and input-shape problems are raised before any numerical work
//! starts. Numerical edge cases (zero denominators, overflowing utilities) are
//! never errors; they are floored or clamped inside the evaluator.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MixedLogitError>;

#[derive(Debug, Error)]
pub enum MixedLogitError {
    #[error("at least one random variable is required for mixed logit estimation")]
    MissingRandomVariables,

    #[error("random variable '{name}' was not found in the list of variable names")]
    UnknownVariable { name: String },

    #[error("random variable '{name}' was declared more than once")]
    DuplicateRandomVariable { name: String },

    #[error("unsupported mixing distribution '{code}'; accepted codes are n, ln, t, tn, u")]
    UnsupportedDistribution { code: String },

    #[error("individual-specific variable '{name}' was not found in the list of variable names")]
    UnknownIndividualVariable { name: String },

    #[error("base alternative '{alt}' is not one of the observed alternatives")]
    UnknownBaseAlternative { alt: String },

    #[error("the initial coefficient vector must have length {expected}, got {actual}")]
    InitCoeffLength { expected: usize, actual: usize },

    #[error("the provided variables yield coefficient names {found:?} that are inconsistent with the fitted names {expected:?}")]
    InconsistentCoefficients {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("the number of draws must be positive")]
    InvalidDrawCount,

    #[error("the input data contains no rows")]
    EmptyData,

    #[error("estimation requires the choice indicator, but none was provided")]
    MissingChoice,

    #[error("'{what}' has length {actual}, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("X has {actual} columns but {expected} variable names were given")]
    ColumnMismatch { expected: usize, actual: usize },

    #[error("choice situation {id} has {actual} rows, expected one per alternative ({expected})")]
    MissingAlternatives {
        id: u64,
        expected: usize,
        actual: usize,
    },

    #[error("choice situation {id} must have exactly one chosen alternative, found {chosen}")]
    InvalidChoice { id: u64, chosen: usize },

    #[error("panel {panel} has {rows} rows, which is not a multiple of the {n_alts} alternatives")]
    RaggedPanel {
        panel: u64,
        rows: usize,
        n_alts: usize,
    },

    #[error("optimizer failed: {0}")]
    Optimizer(String),

    #[error("tensor backend error: {0}")]
    Backend(String),

    #[error("statistics error: {0}")]
    Statistics(String),

    #[error("the observed information matrix is not finite at entry ({row}, {col})")]
    Hessian { row: usize, col: usize },
}
