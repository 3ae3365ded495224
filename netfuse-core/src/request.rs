use serde::Serialize;

use crate::constants::{DEFAULT_ATTRIBUTE_LIMIT, DEFAULT_RESULT_LIMIT};
use crate::methods::{CombiningMethod, ResultPolicy, ScoringMethod};
use crate::types::{AttributeGroupId, NetworkId, NodeId, OrganismRef};
use crate::weights::FeatureWeightMap;

/// What a request asks the engine to produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryTask {
    /// Rank the organism's genes against the query genes
    #[default]
    RankGenes,
    /// Stop after fusion and return the weighted network as an edge list
    CombineNetworks,
}

/// One gene ranking query.
///
/// # Examples
///
/// ```rust
/// use netfuse_core::methods::CombiningMethod;
/// use netfuse_core::request::Request;
/// use netfuse_core::types::OrganismRef;
///
/// let request = Request::new(OrganismRef::core(4), vec![11, 12, 13])
///     .with_combining_method(CombiningMethod::Average)
///     .with_networks(vec![vec![1, 2], vec![7]])
///     .with_result_limit(50);
/// assert_eq!(request.network_groups.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub organism: OrganismRef,
    /// Query genes
    pub positive_nodes: Vec<NodeId>,
    /// Genes known not to belong with the query
    pub negative_nodes: Vec<NodeId>,
    pub combining_method: CombiningMethod,
    pub scoring_method: ScoringMethod,
    /// Selected networks, one inner list per category. Empty selects the
    /// organism's defaults.
    pub network_groups: Vec<Vec<NetworkId>>,
    pub attribute_group_ids: Vec<AttributeGroupId>,
    pub result_limit: usize,
    /// Number of attributes kept active across all selected groups
    pub attribute_limit: usize,
    pub result_policy: ResultPolicy,
    pub task: QueryTask,
}

impl Request {
    /// Query with default networks, `AutomaticSelect` weighting and
    /// discriminant scoring
    pub fn new(organism: OrganismRef, positive_nodes: Vec<NodeId>) -> Self {
        Self {
            organism,
            positive_nodes,
            negative_nodes: Vec::new(),
            combining_method: CombiningMethod::AutomaticSelect,
            scoring_method: ScoringMethod::Discriminant,
            network_groups: Vec::new(),
            attribute_group_ids: Vec::new(),
            result_limit: DEFAULT_RESULT_LIMIT,
            attribute_limit: DEFAULT_ATTRIBUTE_LIMIT,
            result_policy: ResultPolicy::TopScores,
            task: QueryTask::RankGenes,
        }
    }

    #[must_use]
    pub fn with_negatives(mut self, negative_nodes: Vec<NodeId>) -> Self {
        self.negative_nodes = negative_nodes;
        self
    }

    #[must_use]
    pub fn with_combining_method(mut self, method: CombiningMethod) -> Self {
        self.combining_method = method;
        self
    }

    #[must_use]
    pub fn with_scoring_method(mut self, method: ScoringMethod) -> Self {
        self.scoring_method = method;
        self
    }

    #[must_use]
    pub fn with_networks(mut self, network_groups: Vec<Vec<NetworkId>>) -> Self {
        self.network_groups = network_groups;
        self
    }

    #[must_use]
    pub fn with_attribute_groups(mut self, attribute_group_ids: Vec<AttributeGroupId>, attribute_limit: usize) -> Self {
        self.attribute_group_ids = attribute_group_ids;
        self.attribute_limit = attribute_limit;
        self
    }

    #[must_use]
    pub fn with_result_limit(mut self, result_limit: usize) -> Self {
        self.result_limit = result_limit;
        self
    }

    #[must_use]
    pub fn with_result_policy(mut self, policy: ResultPolicy) -> Self {
        self.result_policy = policy;
        self
    }

    #[must_use]
    pub fn with_task(mut self, task: QueryTask) -> Self {
        self.task = task;
        self
    }
}

/// A gene in the ranked output
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RankedNode {
    pub node_id: NodeId,
    pub score: f64,
}

/// Result of a completed query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub ranked_nodes: Vec<RankedNode>,
    /// Concrete method the weights were computed with
    pub resolved_combining_method: CombiningMethod,
    pub scoring_method: ScoringMethod,
    pub feature_weights: FeatureWeightMap,
    /// Raw discriminant in node index order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discriminant: Option<Vec<f64>>,
}

/// One undirected edge of a combined network
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Interaction {
    pub node_a: NodeId,
    pub node_b: NodeId,
    /// Fused relatedness of the two genes
    pub weight: f64,
}

/// The request's evidence fused into a single weighted network.
///
/// Each gene pair with nonzero relatedness appears once, `node_a` before
/// `node_b` in node index order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinedNetwork {
    pub resolved_combining_method: CombiningMethod,
    pub feature_weights: FeatureWeightMap,
    pub interactions: Vec<Interaction>,
}

/// What a query run produced.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Completed(Response),
    /// Output of a [`QueryTask::CombineNetworks`] request
    Combined(CombinedNetwork),
    /// Stopped at a stage boundary; no result
    Cancelled,
}

impl QueryOutcome {
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The response, if the query ran to completion
    #[must_use]
    pub fn into_response(self) -> Option<Response> {
        match self {
            Self::Completed(response) => Some(response),
            Self::Combined(_) | Self::Cancelled => None,
        }
    }

    #[must_use]
    pub fn into_combined_network(self) -> Option<CombinedNetwork> {
        match self {
            Self::Combined(network) => Some(network),
            Self::Completed(_) | Self::Cancelled => None,
        }
    }
}
