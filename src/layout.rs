/*!
Coefficient layout: which design-matrix column is fixed or random, and where
its parameters live in the flat parameter vector.

The parameter vector has `K + Kr` entries. The first `K` are means in column
order (fixed and random interleaved as the columns are); the last `Kr` are the
standard deviations of the random coefficients, in the column order of the
random variables. The sd block therefore shares the random-block positions. Everything that slices,
reorders or names parameters goes through this table.
*/

use std::collections::HashSet;

use crate::distributions::MixingDistribution;
use crate::errors::{MixedLogitError, Result};

/// Role of a design-matrix column in the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoefficientRole {
    /// `position` indexes the block of fixed columns.
    Fixed { position: usize },
    /// `position` indexes both the block of random columns and the sd block.
    Random {
        distribution: MixingDistribution,
        position: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableEntry {
    pub name: String,
    pub column: usize,
    pub role: CoefficientRole,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientLayout {
    entries: Vec<VariableEntry>,
    n_fixed: usize,
    n_random: usize,
}

impl CoefficientLayout {
    /// Builds the layout for design-matrix columns `names` with the random
    /// coefficients `randvars`. Standard deviations follow the column order of
    /// the random variables.
    ///
    /// # Errors
    ///
    /// Fails when `randvars` is empty, names a column that does not exist, or
    /// names the same column twice.
    pub fn new(names: &[String], randvars: &[(String, MixingDistribution)]) -> Result<Self> {
        if randvars.is_empty() {
            return Err(MixedLogitError::MissingRandomVariables);
        }
        let mut seen = HashSet::new();
        for (name, _) in randvars {
            if !names.contains(name) {
                return Err(MixedLogitError::UnknownVariable { name: name.clone() });
            }
            if !seen.insert(name.as_str()) {
                return Err(MixedLogitError::DuplicateRandomVariable { name: name.clone() });
            }
        }

        let mut entries = Vec::with_capacity(names.len());
        let (mut n_fixed, mut n_random) = (0, 0);
        for (column, name) in names.iter().enumerate() {
            let role = match randvars.iter().find(|(rv, _)| rv == name) {
                Some((_, distribution)) => {
                    let role = CoefficientRole::Random {
                        distribution: *distribution,
                        position: n_random,
                    };
                    n_random += 1;
                    role
                }
                None => {
                    let role = CoefficientRole::Fixed { position: n_fixed };
                    n_fixed += 1;
                    role
                }
            };
            entries.push(VariableEntry {
                name: name.clone(),
                column,
                role,
            });
        }

        Ok(Self {
            entries,
            n_fixed,
            n_random,
        })
    }

    pub fn entries(&self) -> &[VariableEntry] {
        &self.entries
    }

    /// Number of design-matrix columns (K).
    pub fn n_variables(&self) -> usize {
        self.entries.len()
    }

    pub fn n_fixed(&self) -> usize {
        self.n_fixed
    }

    pub fn n_random(&self) -> usize {
        self.n_random
    }

    /// Length of the parameter vector (K + Kr).
    pub fn n_coefficients(&self) -> usize {
        self.n_variables() + self.n_random
    }

    pub fn fixed_columns(&self) -> Vec<usize> {
        self.entries
            .iter()
            .filter(|e| matches!(e.role, CoefficientRole::Fixed { .. }))
            .map(|e| e.column)
            .collect()
    }

    pub fn random_columns(&self) -> Vec<usize> {
        self.random_entries().map(|(e, _)| e.column).collect()
    }

    /// Mixing distributions of the random coefficients, in random-block order.
    pub fn distributions(&self) -> Vec<MixingDistribution> {
        self.random_entries().map(|(_, d)| d).collect()
    }

    /// For each random coefficient (random-block order), the index of its
    /// standard deviation in the full parameter vector.
    pub fn sd_indices(&self) -> Vec<usize> {
        let k = self.n_variables();
        (k..k + self.n_random).collect()
    }

    /// Gathers a `[fixed block, random block]` mean gradient into column order:
    /// entry `c` is the index in the concatenated block of column `c`.
    pub fn gradient_order(&self) -> Vec<usize> {
        self.entries
            .iter()
            .map(|e| match e.role {
                CoefficientRole::Fixed { position } => position,
                CoefficientRole::Random { position, .. } => self.n_fixed + position,
            })
            .collect()
    }

    /// Names of all `K + Kr` coefficients; standard deviations carry an `sd.` prefix.
    pub fn coefficient_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.name.clone()).collect();
        names.extend(self.random_entries().map(|(e, _)| format!("sd.{}", e.name)));
        names
    }

    /// Random entries in random-block order with their distribution.
    fn random_entries(&self) -> impl Iterator<Item = (&VariableEntry, MixingDistribution)> {
        self.entries.iter().filter_map(|e| match e.role {
            CoefficientRole::Random { distribution, .. } => Some((e, distribution)),
            CoefficientRole::Fixed { .. } => None,
        })
    }
}
