use std::collections::BTreeMap;

use super::{SymAccumulator, SymMatrix};
use crate::types::{FusionError, FusionResult};

/// Build the Laplacian-form kernel of an interaction network.
///
/// The affinity `W` is assembled from undirected `(row, column, weight)`
/// edges. Repeated edges, in either direction, have their weights summed.
/// Self-loops and non-positive weights are ignored. The result is
/// `L = I - D^-1/2 W D^-1/2`, restricted to nodes with at least one edge;
/// isolated rows stay empty. Degrees are summed in row order, so the kernel
/// is bit-for-bit reproducible for a given edge list.
///
/// # Errors
///
/// Returns [`FusionError::DimensionMismatch`] if an edge endpoint is outside
/// `0..dim`, or [`FusionError::Parse`] for a non-finite weight.
///
/// # Examples
///
/// ```rust
/// use netfuse_core::matrix::network_kernel;
///
/// let kernel = network_kernel(3, [(0, 1, 2.0)])?;
/// assert_eq!(kernel.get(0, 0), 1.0);
/// assert_eq!(kernel.get(0, 1), -1.0);
/// assert_eq!(kernel.get(2, 2), 0.0);
/// # Ok::<(), netfuse_core::types::FusionError>(())
/// ```
pub fn network_kernel<I>(dim: usize, edges: I) -> FusionResult<SymMatrix>
where
    I: IntoIterator<Item = (usize, usize, f64)>,
{
    let mut affinity: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    for (row, column, weight) in edges {
        if row >= dim || column >= dim {
            return Err(FusionError::DimensionMismatch {
                expected: dim,
                found: row.max(column) + 1,
            });
        }
        if !weight.is_finite() {
            return Err(FusionError::Parse(format!(
                "non-finite interaction weight between rows {row} and {column}"
            )));
        }
        if row == column || weight <= 0.0 {
            continue;
        }
        *affinity.entry((row.min(column), row.max(column))).or_insert(0.0) += weight;
    }

    let mut degree = vec![0.0f64; dim];
    for (&(row, column), &weight) in &affinity {
        degree[row] += weight;
        degree[column] += weight;
    }

    let mut accumulator = SymAccumulator::new(dim);
    for (row, &d) in degree.iter().enumerate() {
        if d > 0.0 {
            accumulator.add_pair(row, row, 1.0)?;
        }
    }
    for ((row, column), weight) in affinity {
        let scale = (degree[row] * degree[column]).sqrt();
        accumulator.add_pair(row, column, -weight / scale)?;
    }
    Ok(accumulator.finish())
}
