use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::cache::DataCache;
use crate::combine::KernelCombiner;
use crate::config::EngineConfig;
use crate::data::Dataset;
use crate::labels::LabelVector;
use crate::progress::{ProgressReporter, Stage};
use crate::matrix::SymMatrix;
use crate::methods::CombiningMethod;
use crate::node_index::NodeIndex;
use crate::request::{CombinedNetwork, Interaction, QueryOutcome, QueryTask, RankedNode, Request, Response};
use crate::scoring::Scorer;
use crate::solver::DiscriminantSolver;
use crate::types::{FusionError, FusionResult, NetworkInfo};
use crate::weights::{
    FeatureSelection, FeatureWeightLearner, FeatureWeightMap, KernelTargetAlignment, RelevanceStatistic,
};

/// Labels, weights and fused kernel of one request
struct Fusion {
    nodes: Arc<NodeIndex>,
    labels: LabelVector,
    method: CombiningMethod,
    weights: FeatureWeightMap,
    combined: Arc<SymMatrix>,
}

/// Gene ranking engine over one dataset.
///
/// The engine owns the artifact cache; every query run through it, from any
/// thread, shares the cached node indices, kernels and attribute matrices.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use netfuse_core::data::InMemoryDataset;
/// use netfuse_core::engine::FusionEngine;
/// use netfuse_core::methods::CombiningMethod;
/// use netfuse_core::progress::NullProgress;
/// use netfuse_core::request::Request;
/// use netfuse_core::types::{NetworkInfo, OrganismRef};
///
/// let org = OrganismRef::core(1);
/// let dataset = InMemoryDataset::new()
///     .with_organism(1, "example")
///     .with_nodes(&org, vec![1, 2, 3, 4])
///     .with_network(&org, NetworkInfo::new(1, 1, "chain").with_default(),
///                   vec![(1, 2, 1.0), (2, 3, 1.0), (3, 4, 1.0)]);
///
/// let engine = FusionEngine::new(Arc::new(dataset));
/// let request = Request::new(org, vec![1]).with_combining_method(CombiningMethod::Average);
/// let response = engine.find_related(&request, &NullProgress)?.into_response().unwrap();
/// assert_eq!(response.ranked_nodes[0].node_id, 2);
/// # Ok::<(), netfuse_core::types::FusionError>(())
/// ```
pub struct FusionEngine {
    config: EngineConfig,
    cache: Arc<DataCache>,
    statistic: Arc<dyn RelevanceStatistic>,
}

impl FusionEngine {
    /// Engine with the default configuration
    pub fn new(dataset: Arc<dyn Dataset>) -> Self {
        Self {
            config: EngineConfig::default(),
            cache: Arc::new(DataCache::new(dataset)),
            statistic: Arc::new(KernelTargetAlignment),
        }
    }

    /// Engine with a custom configuration.
    ///
    /// When `num_threads` is set the rayon global pool is sized accordingly.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::Config`] if the configuration is invalid or
    /// the thread pool cannot be configured.
    pub fn with_config(dataset: Arc<dyn Dataset>, config: EngineConfig) -> FusionResult<Self> {
        Self::with_cache(Arc::new(DataCache::new(dataset)), config)
    }

    /// Engine sharing an existing cache.
    ///
    /// # Errors
    ///
    /// Same as [`Self::with_config`].
    pub fn with_cache(cache: Arc<DataCache>, config: EngineConfig) -> FusionResult<Self> {
        config.validate()?;

        if let Some(num_threads) = config.num_threads {
            rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build_global()
                .map_err(|e| FusionError::Config(format!("Failed to configure thread pool: {e}")))?;
        }

        Ok(Self {
            config,
            cache,
            statistic: Arc::new(KernelTargetAlignment),
        })
    }

    /// Replace the relevance statistic used by learned combining methods
    #[must_use]
    pub fn with_statistic(mut self, statistic: Arc<dyn RelevanceStatistic>) -> Self {
        self.statistic = statistic;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<DataCache> {
        &self.cache
    }

    /// Check for cancellation and announce the next stage
    fn enter(progress: &dyn ProgressReporter, stage: Stage) -> bool {
        if progress.is_cancelled() {
            debug!(stage = %stage, "query cancelled");
            return false;
        }
        progress.on_stage(stage);
        true
    }

    /// Run the request's [`QueryTask`].
    ///
    /// # Errors
    ///
    /// See [`Self::find_related`] and [`Self::combine_networks`].
    pub fn execute(&self, request: &Request, progress: &dyn ProgressReporter) -> FusionResult<QueryOutcome> {
        match request.task {
            QueryTask::RankGenes => self.find_related(request, progress),
            QueryTask::CombineNetworks => self.combine_networks(request, progress),
        }
    }

    /// Rank the genes of the request's organism by relevance to its query
    /// genes.
    ///
    /// Cancellation is checked before every stage; a cancelled query returns
    /// [`QueryOutcome::Cancelled`] and leaves the cache consistent.
    ///
    /// # Errors
    ///
    /// - [`FusionError::InvalidRequest`] for ids outside the organism or a
    ///   query with no gene in the organism
    /// - [`FusionError::DataStore`] when the dataset cannot supply an artifact
    pub fn find_related(&self, request: &Request, progress: &dyn ProgressReporter) -> FusionResult<QueryOutcome> {
        let start = Instant::now();
        let organism = &request.organism;
        info!(
            organism = %organism,
            method = %request.combining_method,
            scoring = %request.scoring_method,
            positives = request.positive_nodes.len(),
            "query started"
        );

        let Some(fusion) = self.fuse(request, progress)? else {
            return Ok(QueryOutcome::Cancelled);
        };
        let Fusion {
            nodes,
            labels,
            method,
            weights,
            combined,
        } = fusion;

        let mut solver = DiscriminantSolver::new(&self.config);
        let Some(discriminant) =
            solver.compute_discriminant(&combined, &labels, self.config.biasing, weights.bias_weight(), progress)?
        else {
            debug!(stage = %Stage::Solving, "query cancelled");
            return Ok(QueryOutcome::Cancelled);
        };

        if !Self::enter(progress, Stage::Scoring) {
            return Ok(QueryOutcome::Cancelled);
        }
        let ranking = Scorer::new(request.scoring_method, request.result_policy).rank(
            &discriminant,
            &combined,
            labels.positives(),
            request.result_limit,
        );
        let ranked_nodes = ranking
            .rows
            .iter()
            .zip(&ranking.scores)
            .map(|(&row, &score)| {
                Ok(RankedNode {
                    node_id: nodes.id_for_index(row)?,
                    score,
                })
            })
            .collect::<FusionResult<Vec<_>>>()?;

        info!(
            organism = %organism,
            method = %method,
            ranked = ranked_nodes.len(),
            elapsed = ?start.elapsed(),
            "query finished"
        );

        Ok(QueryOutcome::Completed(Response {
            ranked_nodes,
            resolved_combining_method: method,
            scoring_method: request.scoring_method,
            feature_weights: weights,
            discriminant: Some(discriminant),
        }))
    }

    /// Learn the request's feature weights and return the fused network as
    /// an edge list, skipping the solve.
    ///
    /// # Errors
    ///
    /// As [`Self::find_related`].
    pub fn combine_networks(&self, request: &Request, progress: &dyn ProgressReporter) -> FusionResult<QueryOutcome> {
        let start = Instant::now();
        let Some(fusion) = self.fuse(request, progress)? else {
            return Ok(QueryOutcome::Cancelled);
        };

        let combined = &fusion.combined;
        let mut interactions = Vec::new();
        for row in 0..combined.dim() {
            for (column, value) in combined.row(row) {
                // relatedness is the negated off-diagonal; each pair once
                if column > row && value != 0.0 {
                    interactions.push(Interaction {
                        node_a: fusion.nodes.id_for_index(row)?,
                        node_b: fusion.nodes.id_for_index(column)?,
                        weight: -value,
                    });
                }
            }
        }

        info!(
            organism = %request.organism,
            method = %fusion.method,
            interactions = interactions.len(),
            elapsed = ?start.elapsed(),
            "networks combined"
        );

        Ok(QueryOutcome::Combined(CombinedNetwork {
            resolved_combining_method: fusion.method,
            feature_weights: fusion.weights,
            interactions,
        }))
    }

    /// Stages shared by every task: load features, learn weights, combine
    /// kernels. `None` when cancelled.
    fn fuse(&self, request: &Request, progress: &dyn ProgressReporter) -> FusionResult<Option<Fusion>> {
        let organism = &request.organism;

        if !Self::enter(progress, Stage::LoadingFeatures) {
            return Ok(None);
        }
        let stage_start = Instant::now();
        let nodes = self.cache.node_index(organism)?;
        let selection = FeatureSelection::resolve(
            &self.cache,
            organism,
            &request.network_groups,
            &request.attribute_group_ids,
        )?;
        let labels = LabelVector::build(
            &nodes,
            &request.positive_nodes,
            &request.negative_nodes,
            self.config.positive_label,
            self.config.negative_label,
            self.config.unlabeled_label,
        );
        if labels.positives().is_empty() {
            return Err(FusionError::InvalidRequest(format!(
                "none of the {} query genes belong to organism {organism}",
                request.positive_nodes.len()
            )));
        }
        let method = request
            .combining_method
            .resolve(labels.positives().len(), self.config.min_query_size_for_automatic);
        self.prefetch(&selection, request)?;
        debug!(
            networks = selection.network_count(),
            attribute_groups = selection.attribute_groups().len(),
            elapsed = ?stage_start.elapsed(),
            "features loaded"
        );

        if !Self::enter(progress, Stage::LearningWeights) {
            return Ok(None);
        }
        let stage_start = Instant::now();
        let learner = FeatureWeightLearner::new(&self.cache, &self.config, self.statistic.as_ref());
        let weights = learner.weights_for_selection(organism, &labels, method, &selection, request.attribute_limit)?;
        debug!(method = %method, elapsed = ?stage_start.elapsed(), "weights learned");

        if !Self::enter(progress, Stage::CombiningKernels) {
            return Ok(None);
        }
        let combined = KernelCombiner::new(&self.cache, self.config.cache_combined_kernels).combine(organism, &weights)?;

        Ok(Some(Fusion {
            nodes,
            labels,
            method,
            weights,
            combined,
        }))
    }

    /// Load every kernel and attribute matrix the selection needs
    fn prefetch(&self, selection: &FeatureSelection, request: &Request) -> FusionResult<()> {
        let networks: Vec<&NetworkInfo> = selection.networks().collect();
        networks
            .par_iter()
            .try_for_each(|network| self.cache.kernel(&request.organism, network.id).map(drop))?;
        for &group_id in selection.attribute_groups() {
            self.cache.attributes(&request.organism, group_id)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for FusionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FusionEngine")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("statistic", &self.statistic)
            .finish()
    }
}
