use std::cmp::Ordering;

use super::statistic::{FeatureEvidence, RelevanceStatistic};
use crate::cache::DataCache;
use crate::types::{AttributeGroupId, Feature, FusionResult, OrganismRef};

/// One attribute column scored against the query target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredAttribute {
    pub feature: Feature,
    pub group_id: AttributeGroupId,
    pub score: f64,
    /// Within the top `attribute_limit`
    pub active: bool,
}

/// Score every attribute of the selected groups and mark the best
/// `limit` as active.
///
/// Candidates are ranked by descending score; ties go to the earlier group
/// in the selection, then the earlier column within the group. The returned
/// list keeps selection order.
///
/// # Errors
///
/// Propagates attribute matrix load failures.
pub fn score_attributes(
    cache: &DataCache,
    organism: &OrganismRef,
    groups: &[AttributeGroupId],
    target: &[f64],
    statistic: &dyn RelevanceStatistic,
    limit: usize,
) -> FusionResult<Vec<ScoredAttribute>> {
    let mut scored = Vec::new();
    for &group_id in groups {
        let matrix = cache.attributes(organism, group_id)?;
        for column in matrix.iter_columns() {
            let evidence = FeatureEvidence::measure(&column, target);
            scored.push(ScoredAttribute {
                feature: Feature::AttributeVector {
                    attribute_id: column.attribute_id,
                    group_id,
                },
                group_id,
                score: statistic.score(&evidence),
                active: false,
            });
        }
    }

    let mut ranking: Vec<usize> = (0..scored.len()).collect();
    ranking.sort_by(|&a, &b| {
        scored[b]
            .score
            .partial_cmp(&scored[a].score)
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });
    for &position in ranking.iter().take(limit) {
        scored[position].active = true;
    }

    Ok(scored)
}
