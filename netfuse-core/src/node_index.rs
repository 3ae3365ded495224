use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::data::Dataset;
use crate::types::{FusionError, FusionResult, NodeId, OrganismRef};

/// Bijection between gene node ids and dense matrix rows for one organism.
///
/// Immutable once built. A changed dataset produces a new index rather than
/// a mutated one.
///
/// # Examples
///
/// ```rust
/// use netfuse_core::node_index::NodeIndex;
///
/// let index = NodeIndex::from_ids(vec![30, 10, 20])?;
/// assert_eq!(index.index_of(10)?, 1);
/// assert_eq!(index.id_for_index(2)?, 20);
/// assert_eq!(index.indices_for_ids(&[20, 30, 99]), vec![0, 2]);
/// # Ok::<(), netfuse_core::types::FusionError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NodeIndex {
    ids: Vec<NodeId>,
    positions: HashMap<NodeId, usize>,
}

impl NodeIndex {
    /// Load the node listing of an organism.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::DataStore`] when the dataset does not know the
    /// organism or lists a node twice.
    pub fn build(dataset: &dyn Dataset, organism: &OrganismRef) -> FusionResult<Self> {
        let ids = dataset.node_ids(organism)?;
        debug!(organism = %organism, nodes = ids.len(), "building node index");
        Self::from_ids(ids)
    }

    /// Build directly from ids in row order.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::DataStore`] if an id repeats.
    pub fn from_ids(ids: Vec<NodeId>) -> FusionResult<Self> {
        let mut positions = HashMap::with_capacity(ids.len());
        for (row, &id) in ids.iter().enumerate() {
            if positions.insert(id, row).is_some() {
                return Err(FusionError::DataStore(format!("duplicate node id {id}")));
            }
        }
        Ok(Self { ids, positions })
    }

    /// Number of nodes (rows)
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Row of a node id.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::NotFound`] if the organism has no such node.
    pub fn index_of(&self, id: NodeId) -> FusionResult<usize> {
        self.positions
            .get(&id)
            .copied()
            .ok_or_else(|| FusionError::NotFound(format!("node {id}")))
    }

    /// Node id stored at a row.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::NotFound`] for a row outside the index.
    pub fn id_for_index(&self, row: usize) -> FusionResult<NodeId> {
        self.ids
            .get(row)
            .copied()
            .ok_or_else(|| FusionError::NotFound(format!("row {row} of {}", self.ids.len())))
    }

    /// Rows of the known ids among `ids`, ascending, without duplicates.
    ///
    /// Unknown ids are dropped silently.
    #[must_use]
    pub fn indices_for_ids<'a, I>(&self, ids: I) -> Vec<usize>
    where
        I: IntoIterator<Item = &'a NodeId>,
    {
        ids.into_iter()
            .filter_map(|id| self.positions.get(id).copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// All node ids in row order
    #[must_use]
    pub fn ids(&self) -> &[NodeId] {
        &self.ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::InMemoryDataset;

    #[test]
    fn test_round_trip_both_directions() {
        let index = NodeIndex::from_ids(vec![101, 55, 7, -3, 1000]).unwrap();
        for row in 0..index.len() {
            let id = index.id_for_index(row).unwrap();
            assert_eq!(index.index_of(id).unwrap(), row);
        }
        for &id in index.ids() {
            let row = index.index_of(id).unwrap();
            assert_eq!(index.id_for_index(row).unwrap(), id);
        }
    }

    #[test]
    fn test_indices_follow_row_order_not_input_order() {
        let index = NodeIndex::from_ids(vec![5, 4, 3, 2, 1]).unwrap();
        assert_eq!(index.indices_for_ids(&[1, 5, 3, 3, 42]), vec![0, 2, 4]);
    }

    #[test]
    fn test_missing_lookups_are_not_found() {
        let index = NodeIndex::from_ids(vec![1, 2]).unwrap();
        assert!(matches!(index.index_of(9), Err(FusionError::NotFound(_))));
        assert!(matches!(index.id_for_index(2), Err(FusionError::NotFound(_))));
    }

    #[test]
    fn test_duplicate_ids_break_bijection() {
        assert!(matches!(
            NodeIndex::from_ids(vec![1, 2, 1]),
            Err(FusionError::DataStore(_))
        ));
    }

    #[test]
    fn test_build_from_dataset() {
        let organism = OrganismRef::core(1);
        let dataset = InMemoryDataset::new().with_nodes(&organism, vec![10, 20, 30]);
        let index = NodeIndex::build(&dataset, &organism).unwrap();
        assert_eq!(index.len(), 3);

        let unknown = NodeIndex::build(&dataset, &OrganismRef::core(2));
        assert!(matches!(unknown, Err(FusionError::DataStore(_))));
    }
}
