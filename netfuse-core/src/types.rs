use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::constants::CORE_NAMESPACE;

/// External identifier of a gene node.
pub type NodeId = i64;

/// External identifier of an interaction network.
pub type NetworkId = i64;

/// External identifier of a network group (category).
pub type GroupId = i64;

/// External identifier of an attribute group.
pub type AttributeGroupId = i64;

/// External identifier of a single attribute inside a group.
pub type AttributeId = i64;

/// Organism identifier. Negative ids denote user-private organisms.
pub type OrganismId = i64;

/// Opaque handle naming one organism's data partition.
///
/// The namespace is `"CORE"` for curated data or a user namespace for
/// private uploads. User-private organisms (negative ids) never read from
/// `CORE`.
///
/// # Examples
///
/// ```rust
/// use netfuse_core::types::OrganismRef;
///
/// let core = OrganismRef::core(4);
/// assert_eq!(core.namespace, "CORE");
/// assert!(!core.is_user_private());
///
/// let private = OrganismRef::new("alice", -2);
/// assert!(private.is_user_private());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct OrganismRef {
    /// Data partition name
    pub namespace: String,
    /// Organism identifier
    pub organism_id: OrganismId,
}

impl OrganismRef {
    /// Handle for an organism in an arbitrary namespace
    pub fn new(namespace: impl Into<String>, organism_id: OrganismId) -> Self {
        Self {
            namespace: namespace.into(),
            organism_id,
        }
    }

    /// Handle for curated data of an organism
    pub fn core(organism_id: OrganismId) -> Self {
        Self::new(CORE_NAMESPACE, organism_id)
    }

    /// Whether this organism exists only in a user namespace
    #[must_use]
    pub const fn is_user_private(&self) -> bool {
        self.organism_id < 0
    }

    /// Whether the handle points at curated data
    #[must_use]
    pub fn is_core(&self) -> bool {
        self.namespace == CORE_NAMESPACE
    }

    /// Namespace that owns the node index for this organism.
    ///
    /// User namespaces share node indexing with `CORE` unless the organism
    /// itself is user-private.
    #[must_use]
    pub fn node_namespace(&self) -> &str {
        if self.is_user_private() {
            &self.namespace
        } else {
            CORE_NAMESPACE
        }
    }

    /// Handle to the `CORE` copy of this organism, if one can exist
    #[must_use]
    pub fn core_fallback(&self) -> Option<Self> {
        if self.is_core() || self.is_user_private() {
            None
        } else {
            Some(Self::core(self.organism_id))
        }
    }
}

impl fmt::Display for OrganismRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.organism_id)
    }
}

/// Gene Ontology branch a network can be tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum OntologyBranch {
    /// Biological process
    BiologicalProcess,
    /// Molecular function
    MolecularFunction,
    /// Cellular component
    CellularComponent,
}

impl OntologyBranch {
    /// Parse the short tag used in dataset listings (`BP`, `MF`, `CC`)
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_uppercase().as_str() {
            "BP" => Some(Self::BiologicalProcess),
            "MF" => Some(Self::MolecularFunction),
            "CC" => Some(Self::CellularComponent),
            _ => None,
        }
    }
}

impl fmt::Display for OntologyBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BiologicalProcess => write!(f, "BP"),
            Self::MolecularFunction => write!(f, "MF"),
            Self::CellularComponent => write!(f, "CC"),
        }
    }
}

/// One unit of fusible evidence.
///
/// The derived ordering places every network before every attribute and
/// `Bias` last, which keeps [`FeatureWeightMap`](crate::weights::FeatureWeightMap)
/// iteration stable.
///
/// # Examples
///
/// ```rust
/// use netfuse_core::types::Feature;
///
/// let net = Feature::NetworkKernel { network_id: 7, group_id: 1 };
/// assert!(net.is_network());
/// assert!(net < Feature::Bias);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Feature {
    /// Kernel derived from one interaction network
    NetworkKernel {
        network_id: NetworkId,
        group_id: GroupId,
    },
    /// Kernel derived from a single attribute column
    AttributeVector {
        attribute_id: AttributeId,
        group_id: AttributeGroupId,
    },
    /// Constant offset term, never part of the matrix sum
    Bias,
}

impl Feature {
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::NetworkKernel { .. })
    }

    #[must_use]
    pub const fn is_attribute(&self) -> bool {
        matches!(self, Self::AttributeVector { .. })
    }

    #[must_use]
    pub const fn is_bias(&self) -> bool {
        matches!(self, Self::Bias)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NetworkKernel {
                network_id,
                group_id,
            } => write!(f, "network:{network_id}@{group_id}"),
            Self::AttributeVector {
                attribute_id,
                group_id,
            } => write!(f, "attribute:{attribute_id}@{group_id}"),
            Self::Bias => write!(f, "bias"),
        }
    }
}

/// Description of one interaction network as listed by a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkInfo {
    pub id: NetworkId,
    /// Category the network belongs to
    pub group_id: GroupId,
    pub name: String,
    /// Part of the organism's default selection
    pub is_default: bool,
    /// Ontology branches this network is considered informative for
    pub tags: Vec<OntologyBranch>,
}

impl NetworkInfo {
    /// Untagged, non-default network description
    pub fn new(id: NetworkId, group_id: GroupId, name: impl Into<String>) -> Self {
        Self {
            id,
            group_id,
            name: name.into(),
            is_default: false,
            tags: Vec::new(),
        }
    }

    /// Mark the network as part of the default selection
    #[must_use]
    pub fn with_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Add ontology branch tags
    #[must_use]
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = OntologyBranch>) -> Self {
        self.tags.extend(tags);
        self
    }

    /// Whether the network is tagged with the given ontology branch
    #[must_use]
    pub fn has_tag(&self, branch: OntologyBranch) -> bool {
        self.tags.contains(&branch)
    }
}

/// Description of one attribute group as listed by a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeGroupInfo {
    pub id: AttributeGroupId,
    pub name: String,
}

impl AttributeGroupInfo {
    pub fn new(id: AttributeGroupId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Organism metadata exposed by a dataset for display purposes.
#[derive(Debug, Clone, PartialEq)]
pub struct OrganismInfo {
    pub id: OrganismId,
    pub name: String,
}

/// Error types raised by the fusion engine
#[derive(Error, Debug)]
pub enum FusionError {
    /// Organism, namespace or artifact missing or unreadable in the dataset
    #[error("Data store error: {0}")]
    DataStore(String),
    /// Identifier lookup failed
    #[error("Not found: {0}")]
    NotFound(String),
    /// Request references unknown methods or features outside the organism
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// Malformed dataset or query file content
    #[error("Parse error: {0}")]
    Parse(String),
    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Engine configuration rejected
    #[error("Configuration error: {0}")]
    Config(String),
    /// Vector or matrix sizes disagree
    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
}

/// Result alias used across the crate
pub type FusionResult<T> = Result<T, FusionError>;
