// =============================================================================
// =============================================================================

/// Version string for netfuse
pub const VERSION: &str = "0.1.0";

/// Namespace holding curated organism data
pub const CORE_NAMESPACE: &str = "CORE";

// =============================================================================
// =============================================================================

/// Label assigned to query (positive) genes
pub const DEFAULT_POSITIVE_LABEL: f64 = 1.0;

/// Label assigned to explicit negative genes
pub const DEFAULT_NEGATIVE_LABEL: f64 = -1.0;

/// Label assigned to genes in neither set before biasing
pub const DEFAULT_UNLABELED_LABEL: f64 = 0.0;

// =============================================================================
// =============================================================================

/// Positive query sizes below this resolve `AutomaticSelect` to `Average`
pub const MIN_QUERY_SIZE_FOR_AUTOMATIC: usize = 6;

/// Number of attributes kept active when a request does not say otherwise
pub const DEFAULT_ATTRIBUTE_LIMIT: usize = 10;

/// Number of related genes returned when a request does not say otherwise
pub const DEFAULT_RESULT_LIMIT: usize = 20;

/// Fixed weight of the bias feature
pub const DEFAULT_BIAS_WEIGHT: f64 = 0.0;

// =============================================================================
// =============================================================================

/// Diagonal regularization added to the combined kernel before solving.
///
/// With Laplacian-form kernels a value of one gives `(I + L) f = y`.
pub const DEFAULT_REGULARIZATION: f64 = 1.0;

/// Relative residual at which conjugate gradients stops
pub const DEFAULT_SOLVER_TOLERANCE: f64 = 1e-10;

/// Iteration cap for conjugate gradients
pub const DEFAULT_MAX_SOLVER_ITERATIONS: usize = 1000;

// =============================================================================
// =============================================================================

/// Minimum rescaled discriminant for a gene to be reported
pub const DISCRIMINANT_THRESHOLD: f64 = 0.0;

/// Minimum z-score for a gene to be reported
pub const ZSCORE_THRESHOLD: f64 = 0.0;

/// Minimum rescaled context score for a gene to be reported
pub const CONTEXT_THRESHOLD: f64 = 0.0;

/// Tolerance used when comparing floating point weights in tests
#[cfg(test)]
pub const TEST_EPSILON: f64 = 1e-9;
