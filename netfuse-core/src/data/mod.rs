//! Read-only access to per-organism evidence.
//!
//! A [`Dataset`] is the persistent layer underneath the artifact cache. The
//! engine only ever reads from it.

use crate::matrix::{AttributeMatrix, SymMatrix};
use crate::node_index::NodeIndex;
use crate::types::{
    AttributeGroupId, AttributeGroupInfo, FusionResult, NetworkId, NetworkInfo, NodeId,
    OrganismId, OrganismInfo, OrganismRef,
};

pub mod files;
pub mod memory;

pub use files::FileDataset;
pub use memory::InMemoryDataset;

/// Persistent, read-only source of organism data.
///
/// Implementations return [`FusionError::DataStore`](crate::types::FusionError::DataStore)
/// for unknown organisms, namespaces or artifacts.
pub trait Dataset: Send + Sync {
    /// Metadata for display by callers
    fn organism(&self, organism_id: OrganismId) -> FusionResult<OrganismInfo>;

    /// Gene node ids of an organism in row order
    fn node_ids(&self, organism: &OrganismRef) -> FusionResult<Vec<NodeId>>;

    /// Interaction networks stored in exactly this namespace
    fn networks(&self, organism: &OrganismRef) -> FusionResult<Vec<NetworkInfo>>;

    /// Attribute groups stored in exactly this namespace
    fn attribute_groups(&self, organism: &OrganismRef) -> FusionResult<Vec<AttributeGroupInfo>>;

    /// Kernel of one network, indexed by `nodes`
    fn kernel(
        &self,
        organism: &OrganismRef,
        network_id: NetworkId,
        nodes: &NodeIndex,
    ) -> FusionResult<SymMatrix>;

    /// Attribute matrix of one group, indexed by `nodes`
    fn attributes(
        &self,
        organism: &OrganismRef,
        group_id: AttributeGroupId,
        nodes: &NodeIndex,
    ) -> FusionResult<AttributeMatrix>;

    /// Networks used when a request selects none
    fn default_networks(&self, organism: &OrganismRef) -> FusionResult<Vec<NetworkInfo>> {
        Ok(self
            .networks(organism)?
            .into_iter()
            .filter(|network| network.is_default)
            .collect())
    }
}
