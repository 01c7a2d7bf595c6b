//! Long-format choice data, model specification and design-matrix construction.
//!
//! Input arrives as one row per (choice situation, alternative). Before any
//! numerical work the rows are validated, sorted by panel, situation and
//! alternative, and expanded into the `(S, J, K)` design tensor:
//! alternative-specific intercepts and individual-specific interactions first,
//! then the alternative-specific variables in the order they were given.

use std::cmp::Ordering;
use std::collections::HashMap;

use ndarray::{Array2, Array3};

use crate::distributions::MixingDistribution;
use crate::errors::{MixedLogitError, Result};

/// Long-format input arrays, all row-aligned.
#[derive(Debug, Clone)]
pub struct ChoiceData {
    pub x: Array2<f64>,
    pub varnames: Vec<String>,
    pub alts: Vec<String>,
    pub ids: Vec<u64>,
    /// One-hot choice indicator. Required for fitting, ignored by prediction.
    pub choice: Option<Vec<f64>>,
    pub panels: Option<Vec<u64>>,
    /// One value per row; the first row of each situation is used.
    pub weights: Option<Vec<f64>>,
    pub avail: Option<Vec<f64>>,
}

impl ChoiceData {
    pub fn new<S: ToString, A: ToString>(
        x: Array2<f64>,
        varnames: &[S],
        alts: &[A],
        ids: Vec<u64>,
    ) -> Self {
        Self {
            x,
            varnames: varnames.iter().map(|v| v.to_string()).collect(),
            alts: alts.iter().map(|a| a.to_string()).collect(),
            ids,
            choice: None,
            panels: None,
            weights: None,
            avail: None,
        }
    }

    pub fn with_choice(mut self, choice: Vec<f64>) -> Self {
        self.choice = Some(choice);
        self
    }

    pub fn with_panels(mut self, panels: Vec<u64>) -> Self {
        self.panels = Some(panels);
        self
    }

    pub fn with_weights(mut self, weights: Vec<f64>) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn with_availability(mut self, avail: Vec<f64>) -> Self {
        self.avail = Some(avail);
        self
    }

    pub fn n_rows(&self) -> usize {
        self.x.nrows()
    }

    fn validate(&self, require_choice: bool) -> Result<()> {
        let n = self.n_rows();
        if n == 0 {
            return Err(MixedLogitError::EmptyData);
        }
        if self.varnames.len() != self.x.ncols() {
            return Err(MixedLogitError::ColumnMismatch {
                expected: self.varnames.len(),
                actual: self.x.ncols(),
            });
        }
        check_len("alts", n, Some(self.alts.len()))?;
        check_len("ids", n, Some(self.ids.len()))?;
        check_len("panels", n, self.panels.as_ref().map(Vec::len))?;
        check_len("weights", n, self.weights.as_ref().map(Vec::len))?;
        check_len("avail", n, self.avail.as_ref().map(Vec::len))?;
        if require_choice {
            let choice = self.choice.as_ref().ok_or(MixedLogitError::MissingChoice)?;
            check_len("choice", n, Some(choice.len()))?;
        }
        Ok(())
    }

    /// Validates and arranges the rows into rectangular arrays.
    ///
    /// With `require_choice` the one-hot choice indicator is validated and
    /// arranged as well; prediction passes `false`.
    pub fn arrange(&self, spec: &ModelSpec, require_choice: bool) -> Result<ArrangedData> {
        self.validate(require_choice)?;

        let alternatives = sorted_alternatives(&self.alts);
        let n_alts = alternatives.len();
        let alt_index: HashMap<&str, usize> = alternatives
            .iter()
            .enumerate()
            .map(|(i, a)| (a.as_str(), i))
            .collect();

        let base = match &spec.base_alt {
            Some(alt) => *alt_index
                .get(alt.as_str())
                .ok_or_else(|| MixedLogitError::UnknownBaseAlternative { alt: alt.clone() })?,
            None => 0,
        };

        let mut isvar_cols = Vec::with_capacity(spec.isvars.len());
        for name in &spec.isvars {
            let col = self
                .varnames
                .iter()
                .position(|v| v == name)
                .ok_or_else(|| MixedLogitError::UnknownIndividualVariable { name: name.clone() })?;
            isvar_cols.push(col);
        }

        // Sort rows by (panel, situation, alternative).
        let row_alt: Vec<usize> = self.alts.iter().map(|a| alt_index[a.as_str()]).collect();
        let panel_of = |row: usize| self.panels.as_ref().map_or(0, |p| p[row]);
        let mut order: Vec<usize> = (0..self.n_rows()).collect();
        order.sort_by_key(|&row| (panel_of(row), self.ids[row], row_alt[row]));

        // Every situation must list each alternative exactly once.
        let mut situations = Vec::new();
        for group in order.chunk_by(|&a, &b| {
            panel_of(a) == panel_of(b) && self.ids[a] == self.ids[b]
        }) {
            let complete = group.len() == n_alts
                && group.iter().enumerate().all(|(j, &row)| row_alt[row] == j);
            if !complete {
                let mut present: Vec<usize> = group.iter().map(|&row| row_alt[row]).collect();
                present.dedup();
                return Err(MixedLogitError::MissingAlternatives {
                    id: self.ids[group[0]],
                    expected: n_alts,
                    actual: present.len(),
                });
            }
            situations.push(group);
        }

        let (x, names) = self.design_matrix(
            &situations,
            &alternatives,
            base,
            &isvar_cols,
            spec.fit_intercept,
        );

        let per_row = |values: &[f64]| {
            Array2::from_shape_fn((situations.len(), n_alts), |(s, j)| values[situations[s][j]])
        };

        let y = if require_choice {
            let choice = self.choice.as_deref().unwrap_or_default();
            let y = per_row(choice);
            for (s, row) in y.outer_iter().enumerate() {
                let chosen = row.iter().filter(|&&v| v != 0.0).count();
                if chosen != 1 || row.iter().any(|&v| v != 0.0 && v != 1.0) {
                    return Err(MixedLogitError::InvalidChoice {
                        id: self.ids[situations[s][0]],
                        chosen,
                    });
                }
            }
            Some(y)
        } else {
            None
        };

        Ok(ArrangedData {
            x,
            names,
            y,
            avail: self.avail.as_deref().map(per_row),
            panels: self
                .panels
                .as_ref()
                .map(|p| situations.iter().flat_map(|g| g.iter().map(|&r| p[r])).collect()),
            weights: self
                .weights
                .as_ref()
                .map(|w| situations.iter().map(|g| w[g[0]]).collect()),
            ids: situations.iter().map(|g| self.ids[g[0]]).collect(),
            alternatives,
        })
    }

    fn design_matrix(
        &self,
        situations: &[&[usize]],
        alternatives: &[String],
        base: usize,
        isvar_cols: &[usize],
        fit_intercept: bool,
    ) -> (Array3<f64>, Vec<String>) {
        enum Column {
            Intercept { alt: usize },
            Interaction { var: usize, alt: usize },
            Plain { var: usize },
        }

        let others: Vec<usize> = (0..alternatives.len()).filter(|&j| j != base).collect();
        let mut columns = Vec::new();
        let mut names = Vec::new();
        if fit_intercept {
            for &alt in &others {
                columns.push(Column::Intercept { alt });
                names.push(format!("_intercept.{}", alternatives[alt]));
            }
        }
        for &var in isvar_cols {
            for &alt in &others {
                columns.push(Column::Interaction { var, alt });
                names.push(format!("{}.{}", self.varnames[var], alternatives[alt]));
            }
        }
        for var in 0..self.varnames.len() {
            if !isvar_cols.contains(&var) {
                columns.push(Column::Plain { var });
                names.push(self.varnames[var].clone());
            }
        }

        let x = Array3::from_shape_fn(
            (situations.len(), alternatives.len(), columns.len()),
            |(s, j, k)| {
                let row = situations[s][j];
                match columns[k] {
                    Column::Intercept { alt } => (j == alt) as u8 as f64,
                    Column::Interaction { var, alt } => {
                        if j == alt {
                            self.x[[row, var]]
                        } else {
                            0.0
                        }
                    }
                    Column::Plain { var } => self.x[[row, var]],
                }
            },
        );
        (x, names)
    }
}

fn check_len(what: &'static str, expected: usize, actual: Option<usize>) -> Result<()> {
    match actual {
        Some(actual) if actual != expected => Err(MixedLogitError::LengthMismatch {
            what,
            expected,
            actual,
        }),
        _ => Ok(()),
    }
}

/// Unique alternative labels, numerically sorted when every label is a number.
fn sorted_alternatives(alts: &[String]) -> Vec<String> {
    let mut unique: Vec<String> = alts.to_vec();
    unique.sort();
    unique.dedup();
    let numeric: Option<Vec<f64>> = unique.iter().map(|a| a.parse::<f64>().ok()).collect();
    if let Some(values) = numeric {
        let mut paired: Vec<(f64, String)> = values.into_iter().zip(unique).collect();
        paired.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        return paired.into_iter().map(|(_, a)| a).collect();
    }
    unique
}

/// Which variables get random coefficients, plus design-matrix options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelSpec {
    pub randvars: Vec<(String, MixingDistribution)>,
    /// Individual-specific variables, interacted with every non-base alternative.
    pub isvars: Vec<String>,
    pub fit_intercept: bool,
    /// Defaults to the first alternative in sorted order.
    pub base_alt: Option<String>,
}

impl ModelSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn random(mut self, name: impl Into<String>, distribution: MixingDistribution) -> Self {
        self.randvars.push((name.into(), distribution));
        self
    }

    pub fn individual_specific(mut self, name: impl Into<String>) -> Self {
        self.isvars.push(name.into());
        self
    }

    pub fn set_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    pub fn set_base_alt(mut self, alt: impl ToString) -> Self {
        self.base_alt = Some(alt.to_string());
        self
    }
}

/// Validated arrays sorted by (panel, situation, alternative).
#[derive(Debug, Clone)]
pub struct ArrangedData {
    /// Design tensor `(S, J, K)`.
    pub x: Array3<f64>,
    /// Design-matrix column names, length K.
    pub names: Vec<String>,
    /// `(S, J)` one-hot choices.
    pub y: Option<Array2<f64>>,
    /// `(S, J)` availability.
    pub avail: Option<Array2<f64>>,
    /// Panel id of every arranged row (`S * J`).
    pub panels: Option<Vec<u64>>,
    /// One weight per situation.
    pub weights: Option<Vec<f64>>,
    /// Situation ids, length S.
    pub ids: Vec<u64>,
    pub alternatives: Vec<String>,
}

impl ArrangedData {
    pub fn n_situations(&self) -> usize {
        self.x.shape()[0]
    }

    pub fn n_alternatives(&self) -> usize {
        self.alternatives.len()
    }
}
