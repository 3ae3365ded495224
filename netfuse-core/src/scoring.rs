//! Turning a discriminant into a ranked, thresholded gene list.

use std::cmp::Ordering;

use rayon::prelude::*;

use crate::matrix::SymMatrix;
use crate::methods::{ResultPolicy, ScoringMethod};

/// Min-max rescale to `[0, 1]`.
///
/// A constant or empty vector maps to zeros. Rescaling an already rescaled
/// vector returns it unchanged up to rounding.
///
/// # Examples
///
/// ```rust
/// use netfuse_core::scoring::rescale;
///
/// assert_eq!(rescale(&[2.0, 4.0, 3.0]), vec![0.0, 1.0, 0.5]);
/// assert_eq!(rescale(&[7.0, 7.0]), vec![0.0, 0.0]);
/// ```
#[must_use]
pub fn rescale(values: &[f64]) -> Vec<f64> {
    let (min, max) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;
    if !(range > 0.0) {
        return vec![0.0; values.len()];
    }
    values.iter().map(|&v| (v - min) / range).collect()
}

/// Standard scores `(v - mean) / std` using the population deviation.
///
/// A vector with zero deviation maps to zeros.
#[must_use]
pub fn z_scores(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    let std = variance.sqrt();
    if !(std > 0.0) {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - mean) / std).collect()
}

/// Summed relatedness of every gene to the query genes under `kernel`,
/// `c_i = sum_{j in positives, j != i} -K_ij`.
#[must_use]
pub fn context_scores(kernel: &SymMatrix, positives: &[usize]) -> Vec<f64> {
    let mut context = vec![0.0; kernel.dim()];
    for &j in positives {
        for (i, value) in kernel.row(j) {
            if i != j {
                context[i] -= value;
            }
        }
    }
    context
}

/// Indices ordered by descending score, ties by ascending index.
///
/// `excluded` indices are skipped. Only scores strictly above `threshold`
/// survive, except that a threshold of negative infinity keeps everything,
/// NaN included (sorted last). At most `limit` indices are returned.
///
/// # Examples
///
/// ```rust
/// use netfuse_core::scoring::top_scores;
///
/// let scores = [0.1, 0.9, 0.5, 0.9];
/// assert_eq!(top_scores(&scores, &[], 4, f64::NEG_INFINITY), vec![1, 3, 2, 0]);
/// assert_eq!(top_scores(&scores, &[1], 2, 0.2), vec![3, 2]);
/// ```
#[must_use]
pub fn top_scores(scores: &[f64], excluded: &[usize], limit: usize, threshold: f64) -> Vec<usize> {
    let keep_all = threshold == f64::NEG_INFINITY;
    let mut skip = vec![false; scores.len()];
    for &index in excluded {
        if let Some(flag) = skip.get_mut(index) {
            *flag = true;
        }
    }

    let mut candidates: Vec<usize> = (0..scores.len())
        .filter(|&i| !skip[i] && (keep_all || scores[i] > threshold))
        .collect();
    candidates.par_sort_by(|&a, &b| descending(scores[a], scores[b]).then(a.cmp(&b)));
    candidates.truncate(limit);
    candidates
}

/// Descending order with NaN after every number
fn descending(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(&a),
    }
}

/// Ranked genes as `(row, reported score)` pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    pub rows: Vec<usize>,
    pub scores: Vec<f64>,
}

/// Applies a scoring method and result policy to a discriminant.
#[derive(Debug, Clone, Copy)]
pub struct Scorer {
    method: ScoringMethod,
    policy: ResultPolicy,
}

impl Scorer {
    #[must_use]
    pub const fn new(method: ScoringMethod, policy: ResultPolicy) -> Self {
        Self { method, policy }
    }

    /// Rank genes for a query.
    ///
    /// `Discriminant` and `ZScore` rank and report the same vector.
    /// `Context` ranks by the raw discriminant but reports rescaled
    /// relatedness to the query genes, so reported values need not be
    /// monotone in rank order.
    #[must_use]
    pub fn rank(&self, discriminant: &[f64], kernel: &SymMatrix, positives: &[usize], result_limit: usize) -> Ranking {
        let (order_by, reported) = match self.method {
            ScoringMethod::Discriminant => {
                let rescaled = rescale(discriminant);
                (rescaled.clone(), rescaled)
            }
            ScoringMethod::ZScore => {
                let z = z_scores(discriminant);
                (z.clone(), z)
            }
            ScoringMethod::Context => (discriminant.to_vec(), rescale(&context_scores(kernel, positives))),
        };

        let (limit, threshold) = match self.policy {
            ResultPolicy::TopScores => (result_limit, self.method.default_threshold()),
            ResultPolicy::AllScores => (discriminant.len(), f64::NEG_INFINITY),
        };

        // thresholds apply to reported values, which differ from the ranking
        // vector under `Context`
        let rows: Vec<usize> = top_scores(&order_by, positives, discriminant.len(), f64::NEG_INFINITY)
            .into_iter()
            .filter(|&row| threshold == f64::NEG_INFINITY || reported[row] > threshold)
            .take(limit)
            .collect();
        let scores = rows.iter().map(|&row| reported[row]).collect();
        Ranking { rows, scores }
    }
}
