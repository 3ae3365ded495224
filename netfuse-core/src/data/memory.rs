use std::collections::{BTreeMap, HashMap};

use super::Dataset;
use crate::matrix::{network_kernel, AttributeMatrix, SymMatrix};
use crate::node_index::NodeIndex;
use crate::types::{
    AttributeGroupId, AttributeGroupInfo, AttributeId, FusionError, FusionResult, NetworkId,
    NetworkInfo, NodeId, OrganismId, OrganismInfo, OrganismRef,
};

#[derive(Debug, Clone)]
enum NetworkData {
    /// Raw interactions, normalized into a Laplacian kernel on load
    Edges(Vec<(NodeId, NodeId, f64)>),
    /// Kernel supplied as is
    Kernel(SymMatrix),
}

#[derive(Debug, Clone, Default)]
struct Partition {
    nodes: Option<Vec<NodeId>>,
    networks: Vec<(NetworkInfo, NetworkData)>,
    attribute_groups: Vec<(AttributeGroupInfo, Vec<(NodeId, AttributeId, f64)>)>,
}

/// Dataset held entirely in memory, assembled with a builder.
///
/// # Examples
///
/// ```rust
/// use netfuse_core::data::{Dataset, InMemoryDataset};
/// use netfuse_core::types::{NetworkInfo, OrganismRef};
///
/// let human = OrganismRef::core(4);
/// let dataset = InMemoryDataset::new()
///     .with_organism(4, "H. sapiens")
///     .with_nodes(&human, vec![1, 2, 3])
///     .with_network(&human, NetworkInfo::new(10, 1, "coexp").with_default(), vec![(1, 2, 0.8)]);
///
/// assert_eq!(dataset.default_networks(&human)?.len(), 1);
/// # Ok::<(), netfuse_core::types::FusionError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataset {
    organisms: BTreeMap<OrganismId, OrganismInfo>,
    partitions: HashMap<(String, OrganismId), Partition>,
}

impl InMemoryDataset {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn partition_mut(&mut self, organism: &OrganismRef) -> &mut Partition {
        self.partitions
            .entry((organism.namespace.clone(), organism.organism_id))
            .or_default()
    }

    fn partition(&self, organism: &OrganismRef) -> FusionResult<&Partition> {
        self.partitions
            .get(&(organism.namespace.clone(), organism.organism_id))
            .ok_or_else(|| FusionError::DataStore(format!("unknown organism {organism}")))
    }

    /// Register organism metadata
    #[must_use]
    pub fn with_organism(mut self, id: OrganismId, name: impl Into<String>) -> Self {
        self.organisms.insert(
            id,
            OrganismInfo {
                id,
                name: name.into(),
            },
        );
        self
    }

    /// Set the node listing of an organism partition
    #[must_use]
    pub fn with_nodes(mut self, organism: &OrganismRef, nodes: Vec<NodeId>) -> Self {
        self.partition_mut(organism).nodes = Some(nodes);
        self
    }

    /// Add a network given as weighted interactions between node ids
    #[must_use]
    pub fn with_network(
        mut self,
        organism: &OrganismRef,
        info: NetworkInfo,
        interactions: Vec<(NodeId, NodeId, f64)>,
    ) -> Self {
        self.partition_mut(organism)
            .networks
            .push((info, NetworkData::Edges(interactions)));
        self
    }

    /// Add a network whose kernel is already computed
    #[must_use]
    pub fn with_kernel(mut self, organism: &OrganismRef, info: NetworkInfo, kernel: SymMatrix) -> Self {
        self.partition_mut(organism)
            .networks
            .push((info, NetworkData::Kernel(kernel)));
        self
    }

    /// Add an attribute group given as `(node, attribute, value)` assignments
    #[must_use]
    pub fn with_attribute_group(
        mut self,
        organism: &OrganismRef,
        info: AttributeGroupInfo,
        assignments: Vec<(NodeId, AttributeId, f64)>,
    ) -> Self {
        self.partition_mut(organism)
            .attribute_groups
            .push((info, assignments));
        self
    }
}

impl Dataset for InMemoryDataset {
    fn organism(&self, organism_id: OrganismId) -> FusionResult<OrganismInfo> {
        self.organisms
            .get(&organism_id)
            .cloned()
            .ok_or_else(|| FusionError::DataStore(format!("unknown organism {organism_id}")))
    }

    fn node_ids(&self, organism: &OrganismRef) -> FusionResult<Vec<NodeId>> {
        self.partition(organism)?
            .nodes
            .clone()
            .ok_or_else(|| FusionError::DataStore(format!("no nodes stored for {organism}")))
    }

    fn networks(&self, organism: &OrganismRef) -> FusionResult<Vec<NetworkInfo>> {
        Ok(self
            .partition(organism)?
            .networks
            .iter()
            .map(|(info, _)| info.clone())
            .collect())
    }

    fn attribute_groups(&self, organism: &OrganismRef) -> FusionResult<Vec<AttributeGroupInfo>> {
        Ok(self
            .partition(organism)?
            .attribute_groups
            .iter()
            .map(|(info, _)| info.clone())
            .collect())
    }

    fn kernel(
        &self,
        organism: &OrganismRef,
        network_id: NetworkId,
        nodes: &NodeIndex,
    ) -> FusionResult<SymMatrix> {
        let (_, data) = self
            .partition(organism)?
            .networks
            .iter()
            .find(|(info, _)| info.id == network_id)
            .ok_or_else(|| {
                FusionError::DataStore(format!("network {network_id} not stored for {organism}"))
            })?;

        match data {
            NetworkData::Kernel(kernel) if kernel.dim() == nodes.len() => Ok(kernel.clone()),
            NetworkData::Kernel(kernel) => Err(FusionError::DataStore(format!(
                "kernel of network {network_id} has {} rows, organism has {} nodes",
                kernel.dim(),
                nodes.len()
            ))),
            NetworkData::Edges(interactions) => network_kernel(
                nodes.len(),
                interactions.iter().filter_map(|&(a, b, weight)| {
                    Some((nodes.index_of(a).ok()?, nodes.index_of(b).ok()?, weight))
                }),
            ),
        }
    }

    fn attributes(
        &self,
        organism: &OrganismRef,
        group_id: AttributeGroupId,
        nodes: &NodeIndex,
    ) -> FusionResult<AttributeMatrix> {
        let (_, assignments) = self
            .partition(organism)?
            .attribute_groups
            .iter()
            .find(|(info, _)| info.id == group_id)
            .ok_or_else(|| {
                FusionError::DataStore(format!(
                    "attribute group {group_id} not stored for {organism}"
                ))
            })?;

        AttributeMatrix::from_assignments(
            nodes.len(),
            assignments
                .iter()
                .filter_map(|&(node, attribute, value)| Some((nodes.index_of(node).ok()?, attribute, value))),
        )
    }
}
