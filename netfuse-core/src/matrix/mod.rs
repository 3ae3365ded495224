//! Sparse symmetric matrices and the vector arithmetic the solver needs.
//!
//! Kernels are stored in compressed sparse row form with both triangles
//! present, so a row scan sees every neighbour of a node. Off-diagonal
//! entries of a Laplacian-form kernel are non-positive; the relatedness of
//! two genes is the negated off-diagonal entry.

use rayon::prelude::*;

use crate::types::{FusionError, FusionResult};

pub mod attributes;
pub mod laplacian;

pub use attributes::{AttributeColumn, AttributeMatrix};
pub use laplacian::network_kernel;

/// Row count above which matrix-vector products are split across rayon
const PARALLEL_ROW_THRESHOLD: usize = 2048;

/// Off-diagonal relatedness statistics of a symmetric feature.
///
/// Implemented by network kernels and by single attribute columns so the
/// weight learner can score both kinds of evidence the same way.
pub trait Affinity {
    /// `sum_{i != j} r_ij t_i t_j` where `r_ij` is the relatedness of `i` and `j`
    fn relatedness_form(&self, target: &[f64]) -> f64;

    /// Frobenius norm of the off-diagonal relatedness
    fn relatedness_norm(&self) -> f64;
}

/// Symmetric `N x N` sparse matrix.
///
/// # Examples
///
/// ```rust
/// use netfuse_core::matrix::SymMatrix;
///
/// let k = SymMatrix::from_triplets(3, [(0, 1, 0.5), (2, 2, 1.0)])?;
/// assert_eq!(k.get(1, 0), 0.5);
/// assert_eq!(k.mul_vec(&[1.0, 1.0, 1.0])?, vec![0.5, 0.5, 1.0]);
/// # Ok::<(), netfuse_core::types::FusionError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SymMatrix {
    dim: usize,
    row_offsets: Vec<usize>,
    columns: Vec<u32>,
    values: Vec<f64>,
}

impl SymMatrix {
    /// All-zero matrix
    #[must_use]
    pub fn zeros(dim: usize) -> Self {
        Self {
            dim,
            row_offsets: vec![0; dim + 1],
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Identity scaled by `scale`
    #[must_use]
    pub fn scaled_identity(dim: usize, scale: f64) -> Self {
        if scale == 0.0 {
            return Self::zeros(dim);
        }
        Self {
            dim,
            row_offsets: (0..=dim).collect(),
            columns: (0..dim as u32).collect(),
            values: vec![scale; dim],
        }
    }

    #[must_use]
    pub fn identity(dim: usize) -> Self {
        Self::scaled_identity(dim, 1.0)
    }

    /// Build from `(row, column, value)` triplets of either triangle.
    ///
    /// Each off-diagonal triplet is mirrored; duplicate positions are summed
    /// and exact zeros dropped.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::DimensionMismatch`] when an index is outside
    /// `0..dim`.
    pub fn from_triplets<I>(dim: usize, triplets: I) -> FusionResult<Self>
    where
        I: IntoIterator<Item = (usize, usize, f64)>,
    {
        let mut accumulator = SymAccumulator::new(dim);
        for (row, column, value) in triplets {
            accumulator.add_pair(row, column, value)?;
        }
        Ok(accumulator.finish())
    }

    /// Assemble from full (both-triangle) entries.
    ///
    /// Runs inside cache loaders, so it stays off the rayon pool.
    fn from_entries(dim: usize, mut entries: Vec<(u32, u32, f64)>) -> Self {
        entries.sort_unstable_by_key(|&(row, column, _)| (row, column));

        let mut row_offsets = vec![0usize; dim + 1];
        let mut columns = Vec::with_capacity(entries.len());
        let mut values: Vec<f64> = Vec::with_capacity(entries.len());
        let mut last: Option<(u32, u32)> = None;

        for (row, column, value) in entries {
            if last == Some((row, column)) {
                if let Some(previous) = values.last_mut() {
                    *previous += value;
                }
                continue;
            }
            if let (Some((last_row, _)), Some(&previous)) = (last, values.last()) {
                if previous == 0.0 {
                    values.pop();
                    columns.pop();
                    row_offsets[last_row as usize + 1] -= 1;
                }
            }
            columns.push(column);
            values.push(value);
            row_offsets[row as usize + 1] += 1;
            last = Some((row, column));
        }
        if let (Some((last_row, _)), Some(&previous)) = (last, values.last()) {
            if previous == 0.0 {
                values.pop();
                columns.pop();
                row_offsets[last_row as usize + 1] -= 1;
            }
        }

        for row in 0..dim {
            row_offsets[row + 1] += row_offsets[row];
        }

        Self {
            dim,
            row_offsets,
            columns,
            values,
        }
    }

    /// Number of rows (and columns)
    #[must_use]
    pub const fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored entries, counting both triangles
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Iterate the stored entries of one row as `(column, value)`
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = if row < self.dim {
            self.row_offsets[row]..self.row_offsets[row + 1]
        } else {
            0..0
        };
        self.columns[range.clone()]
            .iter()
            .zip(&self.values[range])
            .map(|(&column, &value)| (column as usize, value))
    }

    /// Iterate every stored entry as `(row, column, value)`
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.dim).flat_map(move |row| self.row(row).map(move |(column, value)| (row, column, value)))
    }

    /// Value at `(row, column)`, zero when not stored
    #[must_use]
    pub fn get(&self, row: usize, column: usize) -> f64 {
        if row >= self.dim {
            return 0.0;
        }
        let range = self.row_offsets[row]..self.row_offsets[row + 1];
        match self.columns[range.clone()].binary_search(&(column as u32)) {
            Ok(position) => self.values[range.start + position],
            Err(_) => 0.0,
        }
    }

    #[must_use]
    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.dim).map(|i| self.get(i, i)).collect()
    }

    /// Compute `K x`.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::DimensionMismatch`] if `x` is not of length `dim`.
    pub fn mul_vec(&self, x: &[f64]) -> FusionResult<Vec<f64>> {
        if x.len() != self.dim {
            return Err(FusionError::DimensionMismatch {
                expected: self.dim,
                found: x.len(),
            });
        }
        let row_product = |row: usize| -> f64 { self.row(row).map(|(column, value)| value * x[column]).sum() };
        let result = if self.dim >= PARALLEL_ROW_THRESHOLD {
            (0..self.dim).into_par_iter().map(row_product).collect()
        } else {
            (0..self.dim).map(row_product).collect()
        };
        Ok(result)
    }

    #[must_use]
    pub fn frobenius_norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Copy with every entry multiplied by `factor`
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        if factor == 0.0 {
            return Self::zeros(self.dim);
        }
        Self {
            dim: self.dim,
            row_offsets: self.row_offsets.clone(),
            columns: self.columns.clone(),
            values: self.values.iter().map(|v| v * factor).collect(),
        }
    }

    /// Whether `K == K^T` within `tolerance`
    #[must_use]
    pub fn is_symmetric(&self, tolerance: f64) -> bool {
        self.entries()
            .all(|(row, column, value)| (self.get(column, row) - value).abs() <= tolerance)
    }
}

impl Affinity for SymMatrix {
    fn relatedness_form(&self, target: &[f64]) -> f64 {
        self.entries()
            .filter(|&(row, column, _)| row != column)
            .map(|(row, column, value)| {
                let ti = target.get(row).copied().unwrap_or(0.0);
                let tj = target.get(column).copied().unwrap_or(0.0);
                -value * ti * tj
            })
            .sum()
    }

    fn relatedness_norm(&self) -> f64 {
        self.entries()
            .filter(|&(row, column, _)| row != column)
            .map(|(_, _, value)| value * value)
            .sum::<f64>()
            .sqrt()
    }
}

/// Collects weighted entries from several kernels before assembling one
/// [`SymMatrix`].
#[derive(Debug)]
pub struct SymAccumulator {
    dim: usize,
    entries: Vec<(u32, u32, f64)>,
}

impl SymAccumulator {
    #[must_use]
    pub const fn new(dim: usize) -> Self {
        Self {
            dim,
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub const fn dim(&self) -> usize {
        self.dim
    }

    fn check_index(&self, index: usize) -> FusionResult<()> {
        if index >= self.dim {
            return Err(FusionError::DimensionMismatch {
                expected: self.dim,
                found: index + 1,
            });
        }
        Ok(())
    }

    /// Add `value` at `(row, column)` and its mirror
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::DimensionMismatch`] for an out-of-range index.
    pub fn add_pair(&mut self, row: usize, column: usize, value: f64) -> FusionResult<()> {
        self.check_index(row)?;
        self.check_index(column)?;
        self.entries.push((row as u32, column as u32, value));
        if row != column {
            self.entries.push((column as u32, row as u32, value));
        }
        Ok(())
    }

    /// Add `weight * kernel`
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::DimensionMismatch`] if the kernel size differs.
    pub fn add_scaled(&mut self, kernel: &SymMatrix, weight: f64) -> FusionResult<()> {
        if kernel.dim() != self.dim {
            return Err(FusionError::DimensionMismatch {
                expected: self.dim,
                found: kernel.dim(),
            });
        }
        self.entries.reserve(kernel.nnz());
        self.entries.extend(
            kernel
                .entries()
                .map(|(row, column, value)| (row as u32, column as u32, weight * value)),
        );
        Ok(())
    }

    #[must_use]
    pub fn finish(self) -> SymMatrix {
        SymMatrix::from_entries(self.dim, self.entries)
    }
}

/// Dot product of two equally sized vectors
#[must_use]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Euclidean norm
#[must_use]
pub fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}
