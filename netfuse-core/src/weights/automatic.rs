use rayon::prelude::*;

use super::statistic::{FeatureEvidence, RelevanceStatistic};
use crate::cache::DataCache;
use crate::types::{Feature, FusionResult, NetworkInfo, OrganismRef};

/// Score each network kernel against `target`, in input order.
///
/// Kernels are loaded through the cache; their norms come from the cached
/// kernel summaries.
///
/// # Errors
///
/// Propagates kernel load failures.
pub fn score_networks(
    cache: &DataCache,
    organism: &OrganismRef,
    networks: &[&NetworkInfo],
    target: &[f64],
    statistic: &dyn RelevanceStatistic,
) -> FusionResult<Vec<(Feature, f64)>> {
    networks
        .par_iter()
        .map(|network| {
            let kernel = cache.kernel(organism, network.id)?;
            let summary = cache.kernel_summary(organism, network.id)?;
            let evidence = FeatureEvidence::with_norm(kernel.as_ref(), summary.relatedness_norm, target);
            let feature = Feature::NetworkKernel {
                network_id: network.id,
                group_id: network.group_id,
            };
            Ok((feature, statistic.score(&evidence)))
        })
        .collect()
}

/// Normalize relevance scores to weights summing to one.
///
/// Returns `None` when no score is positive.
#[must_use]
pub fn relevance_weights(scored: &[(Feature, f64)]) -> Option<Vec<(Feature, f64)>> {
    let total: f64 = scored.iter().map(|&(_, score)| score.max(0.0)).sum();
    if !(total > 0.0 && total.is_finite()) {
        return None;
    }
    Some(
        scored
            .iter()
            .map(|&(feature, score)| (feature, score.max(0.0) / total))
            .collect(),
    )
}
