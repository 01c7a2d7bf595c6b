//! Panel balancing.
//!
//! A panel is the sequence of choice situations of one decision maker. The
//! simulator needs a rectangular `(N, P, J, ...)` layout, so shorter panels are
//! zero-padded up to the longest one and a `(N, P)` validity mask records which
//! periods are real.

use ndarray::{Array2, Array3, Array4};

use crate::errors::{MixedLogitError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct BalancedPanels {
    /// `(N, P, J, K)`
    pub x: Array4<f64>,
    /// `(N, P, J)`, zero on padded periods.
    pub y: Option<Array3<f64>>,
    /// `(N, P, J)`, zero on padded periods.
    pub avail: Option<Array3<f64>>,
    /// `(N, P)` validity mask: 1 for real periods, 0 for padding.
    pub panel_info: Array2<f64>,
    /// Number of real periods of every unit.
    pub periods: Vec<usize>,
}

impl BalancedPanels {
    pub fn n_units(&self) -> usize {
        self.periods.len()
    }

    pub fn n_periods(&self) -> usize {
        self.panel_info.ncols()
    }

    /// True when no padding was introduced.
    pub fn is_balanced(&self) -> bool {
        self.periods.iter().all(|&p| p == self.n_periods())
    }

    /// Picks the value of the first situation of every unit from a per-situation slice.
    pub fn first_of_unit(&self, per_situation: &[f64]) -> Vec<f64> {
        let mut start = 0;
        self.periods
            .iter()
            .map(|&p| {
                let value = per_situation[start];
                start += p;
                value
            })
            .collect()
    }
}

/// Balances situations `x: (S, J, K)` into panels.
///
/// `panels` holds the panel id of every long-format row (`S * J` values) and
/// must be panel-contiguous, as produced by
/// [`ChoiceData::arrange`](crate::data::ChoiceData::arrange).
///
/// # Errors
///
/// [`MixedLogitError::RaggedPanel`] when a panel's row count is not a multiple
/// of the number of alternatives.
pub fn balance_panels(
    x: &Array3<f64>,
    y: Option<&Array2<f64>>,
    avail: Option<&Array2<f64>>,
    panels: &[u64],
) -> Result<BalancedPanels> {
    let (s, j) = (x.shape()[0], x.shape()[1]);
    if panels.len() != s * j {
        return Err(MixedLogitError::LengthMismatch {
            what: "panels",
            expected: s * j,
            actual: panels.len(),
        });
    }

    let mut periods = Vec::new();
    for run in panels.chunk_by(|a, b| a == b) {
        if run.len() % j != 0 {
            return Err(MixedLogitError::RaggedPanel {
                panel: run[0],
                rows: run.len(),
                n_alts: j,
            });
        }
        periods.push(run.len() / j);
    }
    Ok(pad(x, y, avail, periods))
}

/// Layout without panels: every situation is its own unit with one period.
pub fn no_panels(
    x: &Array3<f64>,
    y: Option<&Array2<f64>>,
    avail: Option<&Array2<f64>>,
) -> BalancedPanels {
    pad(x, y, avail, vec![1; x.shape()[0]])
}

fn pad(
    x: &Array3<f64>,
    y: Option<&Array2<f64>>,
    avail: Option<&Array2<f64>>,
    periods: Vec<usize>,
) -> BalancedPanels {
    let (j, k) = (x.shape()[1], x.shape()[2]);
    let n = periods.len();
    let p_max = periods.iter().copied().max().unwrap_or(0);

    let mut starts = Vec::with_capacity(n);
    let mut cum = 0;
    for &p in &periods {
        starts.push(cum);
        cum += p;
    }
    // Situation index of (unit, period), if the period is real.
    let source = |u: usize, p: usize| (p < periods[u]).then(|| starts[u] + p);

    let x_bal = Array4::from_shape_fn((n, p_max, j, k), |(u, p, a, v)| {
        source(u, p).map_or(0.0, |s| x[[s, a, v]])
    });
    let spread = |values: &Array2<f64>| {
        Array3::from_shape_fn((n, p_max, j), |(u, p, a)| {
            source(u, p).map_or(0.0, |s| values[[s, a]])
        })
    };
    let panel_info =
        Array2::from_shape_fn((n, p_max), |(u, p)| if p < periods[u] { 1.0 } else { 0.0 });

    BalancedPanels {
        x: x_bal,
        y: y.map(spread),
        avail: avail.map(spread),
        panel_info,
        periods,
    }
}
