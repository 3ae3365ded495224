//! Regularized label propagation solve.
//!
//! The discriminant `x` solves
//!
//! ```text
//! (K + b 1 1^T + lambda I) x = y'
//! ```
//!
//! where `K` is the combined kernel, `b` the bias weight, `lambda` the
//! regularization and `y'` the biased label vector. The operator is
//! symmetric positive definite for any positive semi-definite `K`, so
//! Jacobi-preconditioned conjugate gradients is used. The rank-one bias term
//! is applied implicitly and never materialized.

use std::time::Instant;

use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::labels::{BiasingMethod, LabelVector};
use crate::matrix::{dot, norm, SymMatrix};
use crate::progress::{ProgressReporter, Stage};
use crate::types::{FusionError, FusionResult};

/// Lifecycle of one discriminant solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolveState {
    #[default]
    NotStarted,
    Solving,
    Completed,
    Cancelled,
    Failed,
}

impl SolveState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

/// Convergence details of the last completed solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveReport {
    pub iterations: usize,
    /// Final residual norm relative to the right-hand side
    pub relative_residual: f64,
    pub converged: bool,
}

/// Conjugate gradient solver for the discriminant system.
#[derive(Debug, Clone)]
pub struct DiscriminantSolver {
    regularization: f64,
    tolerance: f64,
    max_iterations: usize,
    state: SolveState,
    report: Option<SolveReport>,
}

impl DiscriminantSolver {
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            regularization: config.regularization,
            tolerance: config.solver_tolerance,
            max_iterations: config.max_solver_iterations,
            state: SolveState::NotStarted,
            report: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> SolveState {
        self.state
    }

    #[must_use]
    pub const fn report(&self) -> Option<SolveReport> {
        self.report
    }

    /// Solve for the discriminant of `labels` under `kernel`.
    ///
    /// Returns `Ok(None)` when `progress` reports cancellation on entry.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::DimensionMismatch`] if the kernel and label
    /// sizes differ; the solver then ends in [`SolveState::Failed`].
    pub fn compute_discriminant(
        &mut self,
        kernel: &SymMatrix,
        labels: &LabelVector,
        biasing: BiasingMethod,
        bias_weight: f64,
        progress: &dyn ProgressReporter,
    ) -> FusionResult<Option<Vec<f64>>> {
        if progress.is_cancelled() {
            self.state = SolveState::Cancelled;
            return Ok(None);
        }
        progress.on_stage(Stage::Solving);
        self.state = SolveState::Solving;

        match self.solve(kernel, &labels.biased(biasing), bias_weight) {
            Ok(discriminant) => {
                self.state = SolveState::Completed;
                Ok(Some(discriminant))
            }
            Err(e) => {
                self.state = SolveState::Failed;
                Err(e)
            }
        }
    }

    fn apply(&self, kernel: &SymMatrix, bias_weight: f64, x: &[f64]) -> FusionResult<Vec<f64>> {
        let mut product = kernel.mul_vec(x)?;
        let offset = if bias_weight > 0.0 {
            bias_weight * x.iter().sum::<f64>()
        } else {
            0.0
        };
        for (out, &xi) in product.iter_mut().zip(x) {
            *out += offset + self.regularization * xi;
        }
        Ok(product)
    }

    fn solve(&mut self, kernel: &SymMatrix, rhs: &[f64], bias_weight: f64) -> FusionResult<Vec<f64>> {
        let n = kernel.dim();
        if rhs.len() != n {
            return Err(FusionError::DimensionMismatch {
                expected: n,
                found: rhs.len(),
            });
        }

        let start = Instant::now();
        let rhs_norm = norm(rhs);
        let mut x = vec![0.0; n];
        if rhs_norm == 0.0 {
            self.report = Some(SolveReport {
                iterations: 0,
                relative_residual: 0.0,
                converged: true,
            });
            return Ok(x);
        }

        let inverse_diagonal: Vec<f64> = kernel
            .diagonal()
            .iter()
            .map(|&d| {
                let m = d + bias_weight.max(0.0) + self.regularization;
                if m > 0.0 {
                    1.0 / m
                } else {
                    1.0
                }
            })
            .collect();
        let precondition = |r: &[f64]| -> Vec<f64> { r.iter().zip(&inverse_diagonal).map(|(ri, mi)| ri * mi).collect() };

        let mut residual = rhs.to_vec();
        let mut z = precondition(&residual);
        let mut direction = z.clone();
        let mut rz = dot(&residual, &z);
        let threshold = self.tolerance * rhs_norm;

        let mut iterations = 0;
        let mut residual_norm = rhs_norm;
        while iterations < self.max_iterations && residual_norm > threshold {
            let a_direction = self.apply(kernel, bias_weight, &direction)?;
            let curvature = dot(&direction, &a_direction);
            if curvature <= 0.0 || !curvature.is_finite() {
                break;
            }
            let alpha = rz / curvature;
            for i in 0..n {
                x[i] += alpha * direction[i];
                residual[i] -= alpha * a_direction[i];
            }
            iterations += 1;
            residual_norm = norm(&residual);
            if residual_norm <= threshold {
                break;
            }

            z = precondition(&residual);
            let rz_next = dot(&residual, &z);
            let beta = rz_next / rz;
            rz = rz_next;
            for (d, zi) in direction.iter_mut().zip(&z) {
                *d = zi + beta * *d;
            }
        }

        let converged = residual_norm <= threshold;
        let relative_residual = residual_norm / rhs_norm;
        if !converged {
            warn!(
                iterations,
                relative_residual, "conjugate gradients stopped before reaching tolerance"
            );
        }
        debug!(
            iterations,
            relative_residual,
            elapsed = ?start.elapsed(),
            "solved discriminant"
        );
        self.report = Some(SolveReport {
            iterations,
            relative_residual,
            converged,
        });
        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_index::NodeIndex;
    use crate::progress::{CancellationToken, NullProgress};

    fn labels(positives: &[i64]) -> LabelVector {
        let index = NodeIndex::from_ids(vec![1, 2, 3, 4, 5]).unwrap();
        LabelVector::build(&index, positives, &[], 1.0, -1.0, 0.0)
    }

    fn path_laplacian() -> SymMatrix {
        let edges = [(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0), (3, 4, 1.0)];
        crate::matrix::network_kernel(5, edges).unwrap()
    }

    #[test]
    fn test_diagonal_kernel_has_closed_form() {
        let mut solver = DiscriminantSolver::new(&EngineConfig::default());
        let kernel = SymMatrix::scaled_identity(5, 2.0);
        let x = solver
            .compute_discriminant(&kernel, &labels(&[2, 4]), BiasingMethod::Average, 0.0, &NullProgress)
            .unwrap()
            .unwrap();
        assert!((x[1] - 1.0 / 3.0).abs() < 1e-9);
        assert!((x[0] + 0.2 / 3.0).abs() < 1e-9);
        assert_eq!(solver.state(), SolveState::Completed);
        assert!(solver.report().unwrap().converged);
    }

    #[test]
    fn test_propagation_decays_with_distance() {
        let mut solver = DiscriminantSolver::new(&EngineConfig::default());
        let x = solver
            .compute_discriminant(&path_laplacian(), &labels(&[1]), BiasingMethod::None, 0.0, &NullProgress)
            .unwrap()
            .unwrap();
        assert!(x[0] > x[1] && x[1] > x[2] && x[2] > x[3] && x[3] > x[4]);
    }

    #[test]
    fn test_solution_satisfies_system_with_bias() {
        let config = EngineConfig::default();
        let mut solver = DiscriminantSolver::new(&config);
        let kernel = path_laplacian();
        let labels = labels(&[1, 3]);
        let x = solver
            .compute_discriminant(&kernel, &labels, BiasingMethod::Average, 0.5, &NullProgress)
            .unwrap()
            .unwrap();
        let applied = solver.apply(&kernel, 0.5, &x).unwrap();
        let rhs = labels.biased(BiasingMethod::Average);
        for (a, b) in applied.iter().zip(&rhs) {
            assert!((a - b).abs() < 1e-8);
        }
    }

    #[test]
    fn test_deterministic() {
        let kernel = path_laplacian();
        let run = || {
            DiscriminantSolver::new(&EngineConfig::default())
                .compute_discriminant(&kernel, &labels(&[2]), BiasingMethod::Average, 0.0, &NullProgress)
                .unwrap()
                .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_cancelled_before_solve() {
        let token = CancellationToken::new();
        token.cancel();
        let mut solver = DiscriminantSolver::new(&EngineConfig::default());
        let result = solver
            .compute_discriminant(&path_laplacian(), &labels(&[1]), BiasingMethod::None, 0.0, &token)
            .unwrap();
        assert!(result.is_none());
        assert_eq!(solver.state(), SolveState::Cancelled);
    }

    #[test]
    fn test_dimension_mismatch_fails() {
        let mut solver = DiscriminantSolver::new(&EngineConfig::default());
        let result = solver.compute_discriminant(
            &SymMatrix::identity(3),
            &labels(&[1]),
            BiasingMethod::None,
            0.0,
            &NullProgress,
        );
        assert!(matches!(result, Err(FusionError::DimensionMismatch { expected: 3, found: 5 })));
        assert_eq!(solver.state(), SolveState::Failed);
    }

    #[test]
    fn test_iteration_cap_returns_last_iterate() {
        let config = EngineConfig {
            max_solver_iterations: 1,
            solver_tolerance: 1e-15,
            ..Default::default()
        };
        let mut solver = DiscriminantSolver::new(&config);
        let x = solver
            .compute_discriminant(&path_laplacian(), &labels(&[1]), BiasingMethod::None, 0.0, &NullProgress)
            .unwrap();
        assert!(x.is_some());
        assert!(!solver.report().unwrap().converged);
        assert_eq!(solver.state(), SolveState::Completed);
    }
}
