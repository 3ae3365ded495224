use std::collections::BTreeMap;

use super::{Affinity, SymAccumulator};
use crate::types::{AttributeId, FusionError, FusionResult};

/// Sparse `N x A` matrix of gene attributes for one attribute group.
///
/// Rows follow the organism's node index; columns are the group's attributes
/// in the order the group lists them.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeMatrix {
    rows: usize,
    attribute_ids: Vec<AttributeId>,
    columns: Vec<Vec<(u32, f64)>>,
}

impl AttributeMatrix {
    /// Build from `(row, attribute_id, value)` assignments.
    ///
    /// Attribute columns are created in order of first appearance of each
    /// attribute id. Repeated assignments to the same cell are summed.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::DimensionMismatch`] for a row outside `0..rows`,
    /// or [`FusionError::Parse`] for a non-finite value.
    pub fn from_assignments<I>(rows: usize, assignments: I) -> FusionResult<Self>
    where
        I: IntoIterator<Item = (usize, AttributeId, f64)>,
    {
        let mut attribute_ids = Vec::new();
        let mut positions: BTreeMap<AttributeId, usize> = BTreeMap::new();
        let mut cells: Vec<BTreeMap<u32, f64>> = Vec::new();

        for (row, attribute_id, value) in assignments {
            if row >= rows {
                return Err(FusionError::DimensionMismatch {
                    expected: rows,
                    found: row + 1,
                });
            }
            if !value.is_finite() {
                return Err(FusionError::Parse(format!(
                    "non-finite value for attribute {attribute_id}"
                )));
            }
            let column = *positions.entry(attribute_id).or_insert_with(|| {
                attribute_ids.push(attribute_id);
                cells.push(BTreeMap::new());
                cells.len() - 1
            });
            *cells[column].entry(row as u32).or_insert(0.0) += value;
        }

        let columns = cells
            .into_iter()
            .map(|column| column.into_iter().filter(|&(_, v)| v != 0.0).collect())
            .collect();

        Ok(Self {
            rows,
            attribute_ids,
            columns,
        })
    }

    /// Number of gene rows
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of attribute columns
    #[must_use]
    pub fn attribute_count(&self) -> usize {
        self.attribute_ids.len()
    }

    #[must_use]
    pub fn attribute_ids(&self) -> &[AttributeId] {
        &self.attribute_ids
    }

    /// Column position of an attribute id
    #[must_use]
    pub fn column_of(&self, attribute_id: AttributeId) -> Option<usize> {
        self.attribute_ids.iter().position(|&id| id == attribute_id)
    }

    /// View of one column, `None` when out of range
    #[must_use]
    pub fn column(&self, column: usize) -> Option<AttributeColumn<'_>> {
        self.columns.get(column).map(|entries| AttributeColumn {
            attribute_id: self.attribute_ids[column],
            entries,
        })
    }

    /// Iterate all column views in group order
    pub fn iter_columns(&self) -> impl Iterator<Item = AttributeColumn<'_>> + '_ {
        (0..self.columns.len()).filter_map(move |column| self.column(column))
    }
}

/// One attribute column, treated as the clique of genes carrying it.
#[derive(Debug, Clone, Copy)]
pub struct AttributeColumn<'a> {
    pub attribute_id: AttributeId,
    entries: &'a [(u32, f64)],
}

impl AttributeColumn<'_> {
    /// Number of genes carrying the attribute
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Normalized member weights `u_i = a_i / sqrt(d_i)` with
    /// `d_i = a_i (S - a_i)`, `S = sum a`. Members with no partner are dropped.
    fn normalized_members(&self) -> Vec<(usize, f64)> {
        let total: f64 = self.entries.iter().map(|&(_, value)| value).sum();
        self.entries
            .iter()
            .filter_map(|&(row, value)| {
                let degree = value * (total - value);
                (degree > 0.0).then(|| (row as usize, value / degree.sqrt()))
            })
            .collect()
    }

    /// Add `weight` times the Laplacian-form kernel of this column.
    ///
    /// The kernel is the normalized Laplacian of the clique `a a^T` with
    /// self-pairs removed: unit diagonal on members and `-u_i u_j` between
    /// members.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::DimensionMismatch`] if the accumulator is
    /// smaller than the rows referenced.
    pub fn add_kernel_to(&self, accumulator: &mut SymAccumulator, weight: f64) -> FusionResult<()> {
        let members = self.normalized_members();
        for (position, &(row, ui)) in members.iter().enumerate() {
            accumulator.add_pair(row, row, weight)?;
            for &(column, uj) in &members[position + 1..] {
                accumulator.add_pair(row, column, -weight * ui * uj)?;
            }
        }
        Ok(())
    }
}

impl Affinity for AttributeColumn<'_> {
    fn relatedness_form(&self, target: &[f64]) -> f64 {
        let members = self.normalized_members();
        let mut projection = 0.0;
        let mut self_terms = 0.0;
        for (row, u) in members {
            let t = target.get(row).copied().unwrap_or(0.0);
            projection += u * t;
            self_terms += u * u * t * t;
        }
        projection * projection - self_terms
    }

    fn relatedness_norm(&self) -> f64 {
        let members = self.normalized_members();
        let squares: f64 = members.iter().map(|(_, u)| u * u).sum();
        let fourth: f64 = members.iter().map(|(_, u)| u.powi(4)).sum();
        (squares * squares - fourth).max(0.0).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::SymMatrix;

    fn sample() -> AttributeMatrix {
        AttributeMatrix::from_assignments(
            5,
            [(0, 10, 1.0), (1, 10, 1.0), (2, 10, 1.0), (3, 20, 1.0), (4, 20, 1.0)],
        )
        .unwrap()
    }

    #[test]
    fn test_columns_follow_first_appearance() {
        let matrix = sample();
        assert_eq!(matrix.attribute_ids(), &[10, 20]);
        assert_eq!(matrix.column_of(20), Some(1));
        assert_eq!(matrix.column(0).unwrap().len(), 3);
        assert!(matrix.column(2).is_none());
    }

    #[test]
    fn test_rejects_out_of_range_rows() {
        let result = AttributeMatrix::from_assignments(2, [(2, 1, 1.0)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_clique_kernel_matches_normalized_laplacian() {
        let matrix = sample();
        let mut accumulator = SymAccumulator::new(5);
        matrix.column(0).unwrap().add_kernel_to(&mut accumulator, 1.0).unwrap();
        let kernel = accumulator.finish();
        assert_eq!(kernel.get(0, 0), 1.0);
        assert!((kernel.get(0, 1) + 0.5).abs() < 1e-12);
        assert_eq!(kernel.get(3, 3), 0.0);
        assert!(kernel.is_symmetric(1e-15));
    }

    #[test]
    fn test_closed_form_affinity_matches_materialized_kernel() {
        let matrix = sample();
        let column = matrix.column(0).unwrap();
        let mut accumulator = SymAccumulator::new(5);
        column.add_kernel_to(&mut accumulator, 1.0).unwrap();
        let kernel: SymMatrix = accumulator.finish();

        let target = [0.6, 0.6, -0.4, -0.4, -0.4];
        assert!((column.relatedness_form(&target) - kernel.relatedness_form(&target)).abs() < 1e-12);
        assert!((column.relatedness_norm() - kernel.relatedness_norm()).abs() < 1e-12);
    }

    #[test]
    fn test_singleton_column_has_no_kernel() {
        let matrix = AttributeMatrix::from_assignments(3, [(1, 5, 1.0)]).unwrap();
        let column = matrix.column(0).unwrap();
        assert_eq!(column.relatedness_norm(), 0.0);
        let mut accumulator = SymAccumulator::new(3);
        column.add_kernel_to(&mut accumulator, 1.0).unwrap();
        assert_eq!(accumulator.finish().nnz(), 0);
    }
}
