use std::fmt;

use crate::matrix::{norm, Affinity};

/// Inputs a relevance statistic sees for one feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureEvidence {
    /// `sum_{i != j} r_ij t_i t_j` over the feature's relatedness `r`
    pub agreement: f64,
    /// Frobenius norm of the feature's off-diagonal relatedness
    pub feature_norm: f64,
    /// Euclidean norm of the target vector
    pub target_norm: f64,
}

impl FeatureEvidence {
    /// Measure `feature` against `target`, reusing a known feature norm
    #[must_use]
    pub fn with_norm(feature: &dyn Affinity, feature_norm: f64, target: &[f64]) -> Self {
        Self {
            agreement: feature.relatedness_form(target),
            feature_norm,
            target_norm: norm(target),
        }
    }

    #[must_use]
    pub fn measure(feature: &dyn Affinity, target: &[f64]) -> Self {
        Self::with_norm(feature, feature.relatedness_norm(), target)
    }
}

/// Scores how well a feature separates the query from the rest.
///
/// Higher scores mean higher weight. Implementations must return finite,
/// non-negative values.
pub trait RelevanceStatistic: fmt::Debug + Send + Sync {
    fn score(&self, evidence: &FeatureEvidence) -> f64;
}

/// Kernel-target alignment `<R, t t^T>_F / (|R|_F |t t^T|_F)`, clamped at
/// zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelTargetAlignment;

impl RelevanceStatistic for KernelTargetAlignment {
    fn score(&self, evidence: &FeatureEvidence) -> f64 {
        let denominator = evidence.feature_norm * evidence.target_norm * evidence.target_norm;
        if denominator <= 0.0 || !denominator.is_finite() {
            return 0.0;
        }
        let alignment = evidence.agreement / denominator;
        if alignment.is_finite() {
            alignment.max(0.0)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::SymMatrix;

    #[test]
    fn test_alignment_is_clamped_and_bounded() {
        // genes 0 and 1 related, 2 isolated
        let kernel = SymMatrix::from_triplets(3, [(0, 0, 1.0), (1, 1, 1.0), (0, 1, -1.0)]).unwrap();

        let together = FeatureEvidence::measure(&kernel, &[1.0, 1.0, -2.0]);
        let score = KernelTargetAlignment.score(&together);
        assert!(score > 0.0 && score <= 1.0);

        let apart = FeatureEvidence::measure(&kernel, &[1.0, -1.0, 0.0]);
        assert_eq!(KernelTargetAlignment.score(&apart), 0.0);
    }

    #[test]
    fn test_degenerate_inputs_score_zero() {
        let empty = SymMatrix::zeros(3);
        let evidence = FeatureEvidence::measure(&empty, &[1.0, 0.0, -1.0]);
        assert_eq!(KernelTargetAlignment.score(&evidence), 0.0);

        let kernel = SymMatrix::from_triplets(2, [(0, 1, -1.0)]).unwrap();
        let evidence = FeatureEvidence::measure(&kernel, &[0.0, 0.0]);
        assert_eq!(KernelTargetAlignment.score(&evidence), 0.0);
    }
}
