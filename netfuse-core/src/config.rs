use crate::constants::{
    DEFAULT_BIAS_WEIGHT, DEFAULT_MAX_SOLVER_ITERATIONS, DEFAULT_NEGATIVE_LABEL,
    DEFAULT_POSITIVE_LABEL, DEFAULT_REGULARIZATION, DEFAULT_SOLVER_TOLERANCE,
    DEFAULT_UNLABELED_LABEL, MIN_QUERY_SIZE_FOR_AUTOMATIC,
};
use crate::labels::BiasingMethod;
use crate::types::{FusionError, FusionResult};

/// Configuration settings for the fusion engine.
///
/// Every field has a sensible default; override only what a deployment needs.
///
/// # Examples
///
/// ## Default configuration
///
/// ```rust
/// use netfuse_core::config::EngineConfig;
///
/// let config = EngineConfig::default();
/// assert_eq!(config.regularization, 1.0);
/// ```
///
/// ## Plain labels without biasing
///
/// ```rust
/// use netfuse_core::config::EngineConfig;
/// use netfuse_core::labels::BiasingMethod;
///
/// let config = EngineConfig {
///     biasing: BiasingMethod::None,
///     unlabeled_label: -1.0,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Label value for query genes.
    ///
    /// **Default**: `1.0`
    pub positive_label: f64,

    /// Label value for explicit negative genes.
    ///
    /// **Default**: `-1.0`
    pub negative_label: f64,

    /// Label value for genes in neither set, before biasing.
    ///
    /// **Default**: `0.0`
    pub unlabeled_label: f64,

    /// How unlabeled entries are adjusted before the solve.
    ///
    /// **Default**: [`BiasingMethod::Average`]
    pub biasing: BiasingMethod,

    /// Diagonal term added to the combined kernel.
    ///
    /// Must be strictly positive so the system stays well posed when the
    /// combined kernel is singular.
    ///
    /// **Default**: `1.0`
    pub regularization: f64,

    /// Weight of the constant bias feature.
    ///
    /// **Default**: `0.0`
    pub bias_weight: f64,

    /// Smallest positive query size that `AutomaticSelect` resolves to
    /// `Automatic`.
    ///
    /// **Default**: `6`
    pub min_query_size_for_automatic: usize,

    /// Relative residual tolerance for the conjugate gradient solver.
    ///
    /// **Default**: `1e-10`
    pub solver_tolerance: f64,

    /// Iteration cap for the conjugate gradient solver.
    ///
    /// **Default**: `1000`
    pub max_solver_iterations: usize,

    /// Memoize combined kernels keyed by their active features and weights.
    ///
    /// Speeds up repeated scoring against different label sets with the same
    /// weights, at the cost of holding one `N x N` sparse matrix per distinct
    /// combination for the process lifetime.
    ///
    /// **Default**: `true`
    pub cache_combined_kernels: bool,

    /// Size of the rayon global pool used for matrix products.
    ///
    /// **Default**: `None` (use all available cores)
    pub num_threads: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            positive_label: DEFAULT_POSITIVE_LABEL,
            negative_label: DEFAULT_NEGATIVE_LABEL,
            unlabeled_label: DEFAULT_UNLABELED_LABEL,
            biasing: BiasingMethod::Average,
            regularization: DEFAULT_REGULARIZATION,
            bias_weight: DEFAULT_BIAS_WEIGHT,
            min_query_size_for_automatic: MIN_QUERY_SIZE_FOR_AUTOMATIC,
            solver_tolerance: DEFAULT_SOLVER_TOLERANCE,
            max_solver_iterations: DEFAULT_MAX_SOLVER_ITERATIONS,
            cache_combined_kernels: true,
            num_threads: None,
        }
    }
}

impl EngineConfig {
    /// Check the numeric settings for values the solver cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::Config`] for a non-positive regularization,
    /// a negative bias weight, a non-positive tolerance or a zero iteration
    /// cap.
    pub fn validate(&self) -> FusionResult<()> {
        if !(self.regularization > 0.0 && self.regularization.is_finite()) {
            return Err(FusionError::Config(format!(
                "regularization must be positive, got {}",
                self.regularization
            )));
        }
        if !(self.bias_weight >= 0.0 && self.bias_weight.is_finite()) {
            return Err(FusionError::Config(format!(
                "bias weight must be non-negative, got {}",
                self.bias_weight
            )));
        }
        if !(self.solver_tolerance > 0.0) {
            return Err(FusionError::Config(
                "solver tolerance must be positive".to_string(),
            ));
        }
        if self.max_solver_iterations == 0 {
            return Err(FusionError::Config(
                "solver needs at least one iteration".to_string(),
            ));
        }
        if self.num_threads == Some(0) {
            return Err(FusionError::Config(
                "thread count must be at least one".to_string(),
            ));
        }
        Ok(())
    }
}
