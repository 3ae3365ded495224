//! Process-wide memo of per-organism artifacts.
//!
//! Three layers sit on top of each other:
//!
//! - the [`Dataset`](crate::data::Dataset), persistent and read-only
//! - [`MemoryLayer`], the in-process map of published artifacts
//! - [`ArtifactCache`], which adds per-key single-flight loading
//!
//! [`DataCache`] is the typed facade the engine talks to.

use std::fmt;
use std::sync::Arc;

use crate::matrix::{AttributeMatrix, SymMatrix};
use crate::node_index::NodeIndex;
use crate::types::{OrganismId, OrganismRef};

pub mod data_cache;
pub mod memory;
pub mod sync;

pub use data_cache::{DataCache, KernelSummary};
pub use memory::MemoryLayer;
pub use sync::{ArtifactCache, CacheStats};

/// Kind of artifact a cache entry holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    NodeIndex,
    Kernel,
    KernelSummary,
    Attributes,
    CombinedKernel,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NodeIndex => "node_index",
            Self::Kernel => "kernel",
            Self::KernelSummary => "kernel_summary",
            Self::Attributes => "attributes",
            Self::CombinedKernel => "combined_kernel",
        };
        f.write_str(name)
    }
}

/// `(namespace, organism, kind, artifact id)` identifying one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub namespace: String,
    pub organism_id: OrganismId,
    pub kind: ArtifactKind,
    pub artifact_id: String,
}

impl CacheKey {
    pub fn new(organism: &OrganismRef, kind: ArtifactKind, artifact_id: impl Into<String>) -> Self {
        Self {
            namespace: organism.namespace.clone(),
            organism_id: organism.organism_id,
            kind,
            artifact_id: artifact_id.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.namespace, self.organism_id, self.kind, self.artifact_id
        )
    }
}

/// Immutable value published into the cache.
#[derive(Debug, Clone)]
pub enum Artifact {
    NodeIndex(Arc<NodeIndex>),
    Kernel(Arc<SymMatrix>),
    Summary(Arc<KernelSummary>),
    Attributes(Arc<AttributeMatrix>),
    Combined(Arc<SymMatrix>),
}

impl Artifact {
    #[must_use]
    pub const fn kind(&self) -> ArtifactKind {
        match self {
            Self::NodeIndex(_) => ArtifactKind::NodeIndex,
            Self::Kernel(_) => ArtifactKind::Kernel,
            Self::Summary(_) => ArtifactKind::KernelSummary,
            Self::Attributes(_) => ArtifactKind::Attributes,
            Self::Combined(_) => ArtifactKind::CombinedKernel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_distinguish_namespaces() {
        let core = CacheKey::new(&OrganismRef::core(1), ArtifactKind::Kernel, "7");
        let user = CacheKey::new(&OrganismRef::new("alice", 1), ArtifactKind::Kernel, "7");
        assert_ne!(core, user);
        assert_eq!(core.to_string(), "CORE/1/kernel/7");
    }

    #[test]
    fn test_artifact_kind() {
        let artifact = Artifact::Combined(Arc::new(SymMatrix::identity(2)));
        assert_eq!(artifact.kind(), ArtifactKind::CombinedKernel);
    }
}
