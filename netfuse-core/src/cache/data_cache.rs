use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use super::{Artifact, ArtifactCache, ArtifactKind, CacheKey, CacheStats};
use crate::data::Dataset;
use crate::matrix::{Affinity, AttributeMatrix, SymMatrix};
use crate::node_index::NodeIndex;
use crate::types::{
    AttributeGroupId, AttributeGroupInfo, FusionError, FusionResult, NetworkId, NetworkInfo,
    OrganismRef,
};

/// Per-kernel statistics reused across queries by the weight learner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelSummary {
    pub dim: usize,
    pub nnz: usize,
    /// Frobenius norm of the off-diagonal relatedness
    pub relatedness_norm: f64,
}

impl KernelSummary {
    #[must_use]
    pub fn of(kernel: &SymMatrix) -> Self {
        Self {
            dim: kernel.dim(),
            nnz: kernel.nnz(),
            relatedness_norm: kernel.relatedness_norm(),
        }
    }
}

/// Typed view of the artifact cache over one dataset.
///
/// Node indices of public organisms are always read from `CORE`. Kernels and
/// attribute matrices are looked up in the requested namespace first and
/// then in `CORE`.
pub struct DataCache {
    dataset: Arc<dyn Dataset>,
    artifacts: ArtifactCache,
}

/// Unexpected artifact variant under a key
fn wrong_kind(key: &CacheKey, found: &Artifact) -> FusionError {
    FusionError::DataStore(format!("cache entry {key} holds a {}", found.kind()))
}

impl DataCache {
    pub fn new(dataset: Arc<dyn Dataset>) -> Self {
        Self {
            dataset,
            artifacts: ArtifactCache::new(),
        }
    }

    #[must_use]
    pub fn dataset(&self) -> &dyn Dataset {
        self.dataset.as_ref()
    }

    #[must_use]
    pub fn artifacts(&self) -> &ArtifactCache {
        &self.artifacts
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.artifacts.stats()
    }

    /// Namespaces searched for an organism's evidence, most specific first
    fn lookup_chain(organism: &OrganismRef) -> Vec<OrganismRef> {
        std::iter::once(organism.clone())
            .chain(organism.core_fallback())
            .collect()
    }

    /// Node index shared by every namespace of the organism.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::DataStore`] when the organism is unknown.
    pub fn node_index(&self, organism: &OrganismRef) -> FusionResult<Arc<NodeIndex>> {
        let owner = OrganismRef::new(organism.node_namespace(), organism.organism_id);
        let key = CacheKey::new(&owner, ArtifactKind::NodeIndex, "nodes");
        match self.artifacts.acquire(&key, || {
            NodeIndex::build(self.dataset(), &owner).map(|index| Artifact::NodeIndex(Arc::new(index)))
        })? {
            Artifact::NodeIndex(index) => Ok(index),
            other => Err(wrong_kind(&key, &other)),
        }
    }

    /// Networks visible to the organism: its own plus `CORE` networks it
    /// does not override.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::DataStore`] if no namespace in the chain lists
    /// the organism.
    pub fn networks(&self, organism: &OrganismRef) -> FusionResult<Vec<NetworkInfo>> {
        self.merged_listing(organism, |org| self.dataset.networks(org), |network: &NetworkInfo| network.id)
    }

    /// Attribute groups visible to the organism, merged like [`Self::networks`].
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::DataStore`] if no namespace in the chain lists
    /// the organism.
    pub fn attribute_groups(&self, organism: &OrganismRef) -> FusionResult<Vec<AttributeGroupInfo>> {
        self.merged_listing(organism, |org| self.dataset.attribute_groups(org), |group: &AttributeGroupInfo| group.id)
    }

    fn merged_listing<T, L, I>(&self, organism: &OrganismRef, list: L, id_of: I) -> FusionResult<Vec<T>>
    where
        L: Fn(&OrganismRef) -> FusionResult<Vec<T>>,
        I: Fn(&T) -> i64,
    {
        let mut seen = BTreeSet::new();
        let mut merged = Vec::new();
        let mut last_error = None;
        let mut found_any = false;

        for candidate in Self::lookup_chain(organism) {
            match list(&candidate) {
                Ok(items) => {
                    found_any = true;
                    merged.extend(items.into_iter().filter(|item| seen.insert(id_of(item))));
                }
                Err(e @ FusionError::DataStore(_)) => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }

        match (found_any, last_error) {
            (false, Some(e)) => Err(e),
            _ => Ok(merged),
        }
    }

    /// Namespace in the lookup chain that stores `id`.
    ///
    /// A namespace the dataset does not hold is skipped; any other listing
    /// error is returned.
    fn owner_of<L>(&self, organism: &OrganismRef, what: &str, id: i64, lists: L) -> FusionResult<OrganismRef>
    where
        L: Fn(&OrganismRef) -> FusionResult<bool>,
    {
        for candidate in Self::lookup_chain(organism) {
            match lists(&candidate) {
                Ok(true) => return Ok(candidate),
                Ok(false) | Err(FusionError::DataStore(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Err(FusionError::DataStore(format!("{what} {id} not stored for {organism}")))
    }

    /// Kernel of one network.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::DataStore`] if no namespace in the chain stores
    /// the network, or the dataset load fails.
    pub fn kernel(&self, organism: &OrganismRef, network_id: NetworkId) -> FusionResult<Arc<SymMatrix>> {
        for candidate in Self::lookup_chain(organism) {
            let key = CacheKey::new(&candidate, ArtifactKind::Kernel, network_id.to_string());
            if let Some(artifact) = self.artifacts.get(&key) {
                return match artifact {
                    Artifact::Kernel(kernel) => Ok(kernel),
                    other => Err(wrong_kind(&key, &other)),
                };
            }
        }

        let owner = self.owner_of(organism, "network", network_id, |org| {
            Ok(self.dataset.networks(org)?.iter().any(|n| n.id == network_id))
        })?;
        let nodes = self.node_index(organism)?;
        let key = CacheKey::new(&owner, ArtifactKind::Kernel, network_id.to_string());
        match self.artifacts.acquire(&key, || {
            debug!(organism = %owner, network = network_id, "loading kernel");
            let kernel = self.dataset.kernel(&owner, network_id, &nodes)?;
            Ok(Artifact::Kernel(Arc::new(kernel)))
        })? {
            Artifact::Kernel(kernel) => Ok(kernel),
            other => Err(wrong_kind(&key, &other)),
        }
    }

    /// Summary statistics of one network kernel.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`Self::kernel`].
    pub fn kernel_summary(&self, organism: &OrganismRef, network_id: NetworkId) -> FusionResult<Arc<KernelSummary>> {
        let key = CacheKey::new(organism, ArtifactKind::KernelSummary, network_id.to_string());
        if let Some(artifact) = self.artifacts.get(&key) {
            return match artifact {
                Artifact::Summary(summary) => Ok(summary),
                other => Err(wrong_kind(&key, &other)),
            };
        }
        // loaded before taking the summary flight so no flight nests another
        let kernel = self.kernel(organism, network_id)?;
        match self
            .artifacts
            .acquire(&key, || Ok(Artifact::Summary(Arc::new(KernelSummary::of(&kernel)))))?
        {
            Artifact::Summary(summary) => Ok(summary),
            other => Err(wrong_kind(&key, &other)),
        }
    }

    /// Attribute matrix of one group.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::DataStore`] if no namespace in the chain stores
    /// the group, or the dataset load fails.
    pub fn attributes(&self, organism: &OrganismRef, group_id: AttributeGroupId) -> FusionResult<Arc<AttributeMatrix>> {
        let owner = self.owner_of(organism, "attribute group", group_id, |org| {
            Ok(self.dataset.attribute_groups(org)?.iter().any(|g| g.id == group_id))
        })?;
        let nodes = self.node_index(organism)?;
        let key = CacheKey::new(&owner, ArtifactKind::Attributes, group_id.to_string());
        match self.artifacts.acquire(&key, || {
            debug!(organism = %owner, group = group_id, "loading attributes");
            let attributes = self.dataset.attributes(&owner, group_id, &nodes)?;
            Ok(Artifact::Attributes(Arc::new(attributes)))
        })? {
            Artifact::Attributes(attributes) => Ok(attributes),
            other => Err(wrong_kind(&key, &other)),
        }
    }

    /// Combined kernel memoized under `signature`, built by `build` on a miss.
    ///
    /// # Errors
    ///
    /// Propagates errors from `build`.
    pub fn combined_kernel<F>(&self, organism: &OrganismRef, signature: &str, build: F) -> FusionResult<Arc<SymMatrix>>
    where
        F: FnOnce() -> FusionResult<SymMatrix>,
    {
        let key = CacheKey::new(organism, ArtifactKind::CombinedKernel, signature);
        match self
            .artifacts
            .acquire(&key, || build().map(|kernel| Artifact::Combined(Arc::new(kernel))))?
        {
            Artifact::Combined(kernel) => Ok(kernel),
            other => Err(wrong_kind(&key, &other)),
        }
    }
}

impl std::fmt::Debug for DataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataCache")
            .field("entries", &self.artifacts.len())
            .field("stats", &self.artifacts.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::InMemoryDataset;
    use crate::types::{NodeId, OrganismId, OrganismInfo};

    fn cache() -> DataCache {
        let core = OrganismRef::core(1);
        let user = OrganismRef::new("alice", 1);
        let private = OrganismRef::new("alice", -1);
        let dataset = InMemoryDataset::new()
            .with_organism(1, "shared")
            .with_nodes(&core, vec![1, 2, 3])
            .with_network(&core, NetworkInfo::new(10, 1, "core net"), vec![(1, 2, 1.0)])
            .with_kernel(&user, NetworkInfo::new(20, 1, "user net"), SymMatrix::scaled_identity(3, 2.0))
            .with_nodes(&private, vec![7, 8]);
        DataCache::new(Arc::new(dataset))
    }

    #[test]
    fn test_node_index_is_shared_with_core() {
        let cache = cache();
        let core = cache.node_index(&OrganismRef::core(1)).unwrap();
        let user = cache.node_index(&OrganismRef::new("alice", 1)).unwrap();
        assert!(Arc::ptr_eq(&core, &user));
        assert_eq!(cache.node_index(&OrganismRef::new("alice", -1)).unwrap().len(), 2);
        assert_eq!(cache.stats().loads, 2);
    }

    #[test]
    fn test_user_namespace_falls_back_to_core() {
        let cache = cache();
        let user = OrganismRef::new("alice", 1);
        assert_eq!(cache.kernel(&user, 20).unwrap().get(0, 0), 2.0);
        let fallback = cache.kernel(&user, 10).unwrap();
        let direct = cache.kernel(&OrganismRef::core(1), 10).unwrap();
        assert!(Arc::ptr_eq(&fallback, &direct));
        assert!(cache.kernel(&OrganismRef::core(1), 20).is_err());

        let ids: Vec<_> = cache.networks(&user).unwrap().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![20, 10]);
    }

    #[test]
    fn test_summary_and_combined_are_memoized() {
        let cache = cache();
        let core = OrganismRef::core(1);
        let summary = cache.kernel_summary(&core, 10).unwrap();
        assert_eq!(summary.dim, 3);
        assert!((summary.relatedness_norm - 2f64.sqrt()).abs() < 1e-12);

        let first = cache.combined_kernel(&core, "abc", || Ok(SymMatrix::identity(3))).unwrap();
        let second = cache
            .combined_kernel(&core, "abc", || Err(FusionError::Config("rebuilt".into())))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    /// Dataset whose user-namespace network listing cannot be read
    struct UnreadableUserListing(InMemoryDataset);

    impl Dataset for UnreadableUserListing {
        fn organism(&self, organism_id: OrganismId) -> FusionResult<OrganismInfo> {
            self.0.organism(organism_id)
        }

        fn node_ids(&self, organism: &OrganismRef) -> FusionResult<Vec<NodeId>> {
            self.0.node_ids(organism)
        }

        fn networks(&self, organism: &OrganismRef) -> FusionResult<Vec<NetworkInfo>> {
            if organism.is_core() {
                self.0.networks(organism)
            } else {
                Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "networks.tsv").into())
            }
        }

        fn attribute_groups(&self, organism: &OrganismRef) -> FusionResult<Vec<AttributeGroupInfo>> {
            self.0.attribute_groups(organism)
        }

        fn kernel(&self, organism: &OrganismRef, network_id: NetworkId, nodes: &NodeIndex) -> FusionResult<SymMatrix> {
            self.0.kernel(organism, network_id, nodes)
        }

        fn attributes(
            &self,
            organism: &OrganismRef,
            group_id: AttributeGroupId,
            nodes: &NodeIndex,
        ) -> FusionResult<AttributeMatrix> {
            self.0.attributes(organism, group_id, nodes)
        }
    }

    #[test]
    fn test_listing_io_errors_are_not_treated_as_absence() {
        let core = OrganismRef::core(1);
        let dataset = InMemoryDataset::new()
            .with_nodes(&core, vec![1, 2, 3])
            .with_network(&core, NetworkInfo::new(10, 1, "core net"), vec![(1, 2, 1.0)]);
        let cache = DataCache::new(Arc::new(UnreadableUserListing(dataset)));
        let user = OrganismRef::new("alice", 1);

        assert!(matches!(cache.kernel(&user, 10), Err(FusionError::Io(_))));
        assert!(matches!(cache.networks(&user), Err(FusionError::Io(_))));
        assert!(cache.kernel(&core, 10).is_ok());
    }

    #[test]
    fn test_missing_user_namespace_falls_back_to_core() {
        let core = OrganismRef::core(1);
        let dataset = InMemoryDataset::new()
            .with_nodes(&core, vec![1, 2, 3])
            .with_network(&core, NetworkInfo::new(10, 1, "core net"), vec![(1, 2, 1.0)]);
        let cache = DataCache::new(Arc::new(dataset));
        let stranger = OrganismRef::new("bob", 1);

        assert!(cache.kernel(&stranger, 10).is_ok());
        assert_eq!(cache.networks(&stranger).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_network_is_data_store_error() {
        let cache = cache();
        assert!(matches!(
            cache.kernel(&OrganismRef::core(1), 99),
            Err(FusionError::DataStore(_))
        ));
    }
}
