use crate::node_index::NodeIndex;
use crate::types::NodeId;

/// Adjustment applied to the unlabeled entries of a label vector before the
/// discriminant solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BiasingMethod {
    /// Use labels exactly as built
    None,
    /// Replace unlabeled entries with the mean label, counting unlabeled
    /// genes as negatives when the query names no negatives
    #[default]
    Average,
}

/// Dense label vector for one query, indexed like its [`NodeIndex`].
///
/// # Examples
///
/// ```rust
/// use netfuse_core::labels::LabelVector;
/// use netfuse_core::node_index::NodeIndex;
///
/// let index = NodeIndex::from_ids(vec![1, 2, 3, 4])?;
/// let labels = LabelVector::build(&index, &[2], &[4], 1.0, -1.0, 0.0);
/// assert_eq!(labels.values(), &[0.0, 1.0, 0.0, -1.0]);
/// # Ok::<(), netfuse_core::types::FusionError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LabelVector {
    values: Vec<f64>,
    positives: Vec<usize>,
    negatives: Vec<usize>,
    positive_value: f64,
    negative_value: f64,
    unlabeled_value: f64,
}

impl LabelVector {
    /// Build labels for `positives` and `negatives`.
    ///
    /// Unknown ids are dropped. An id in both sets is labeled positive.
    #[must_use]
    pub fn build(
        index: &NodeIndex,
        positives: &[NodeId],
        negatives: &[NodeId],
        positive_value: f64,
        negative_value: f64,
        unlabeled_value: f64,
    ) -> Self {
        let positive_rows = index.indices_for_ids(positives);
        let negative_rows: Vec<usize> = index
            .indices_for_ids(negatives)
            .into_iter()
            .filter(|row| positive_rows.binary_search(row).is_err())
            .collect();

        let mut values = vec![unlabeled_value; index.len()];
        for &row in &negative_rows {
            values[row] = negative_value;
        }
        for &row in &positive_rows {
            values[row] = positive_value;
        }

        Self {
            values,
            positives: positive_rows,
            negatives: negative_rows,
            positive_value,
            negative_value,
            unlabeled_value,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value given to genes in neither set
    #[must_use]
    pub const fn unlabeled_value(&self) -> f64 {
        self.unlabeled_value
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Rows of the query genes, ascending
    #[must_use]
    pub fn positives(&self) -> &[usize] {
        &self.positives
    }

    /// Rows of explicit negatives, ascending
    #[must_use]
    pub fn negatives(&self) -> &[usize] {
        &self.negatives
    }

    /// Number of rows counted as negatives: explicit negatives, or every
    /// non-positive row when none were given
    #[must_use]
    pub fn effective_negative_count(&self) -> usize {
        if self.negatives.is_empty() {
            self.len() - self.positives.len()
        } else {
            self.negatives.len()
        }
    }

    /// Centered target used to score features.
    ///
    /// Positives get `n_neg / n`, negatives `-n_pos / n`, everything else
    /// zero, with `n = n_pos + n_neg`.
    #[must_use]
    pub fn weight_target(&self) -> Vec<f64> {
        let n_pos = self.positives.len();
        let n_neg = self.effective_negative_count();
        let n = (n_pos + n_neg) as f64;
        if n_pos == 0 || n_neg == 0 {
            return vec![0.0; self.len()];
        }
        let positive = n_neg as f64 / n;
        let negative = -(n_pos as f64) / n;

        let mut target = if self.negatives.is_empty() {
            vec![negative; self.len()]
        } else {
            vec![0.0; self.len()]
        };
        for &row in &self.negatives {
            target[row] = negative;
        }
        for &row in &self.positives {
            target[row] = positive;
        }
        target
    }

    /// Right-hand side for the discriminant solve.
    #[must_use]
    pub fn biased(&self, method: BiasingMethod) -> Vec<f64> {
        match method {
            BiasingMethod::None => self.values.clone(),
            BiasingMethod::Average => {
                let n_pos = self.positives.len();
                let n_neg = self.effective_negative_count();
                if n_pos + n_neg == 0 {
                    return self.values.clone();
                }
                let mean = (n_pos as f64 * self.positive_value + n_neg as f64 * self.negative_value)
                    / (n_pos + n_neg) as f64;

                let mut values = vec![mean; self.len()];
                for &row in &self.negatives {
                    values[row] = self.negative_value;
                }
                for &row in &self.positives {
                    values[row] = self.positive_value;
                }
                values
            }
        }
    }
}
