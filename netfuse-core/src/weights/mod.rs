//! Per-feature weight learning.
//!
//! Every combining method ends in a [`FeatureWeightMap`]: networks and
//! attributes of the selection with their non-negative weights, plus the
//! `Bias` term.

use std::collections::BTreeMap;

use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::DataCache;
use crate::config::EngineConfig;
use crate::labels::LabelVector;
use crate::methods::CombiningMethod;
use crate::types::{AttributeGroupId, Feature, FusionResult, NetworkId, NetworkInfo, OrganismRef};

pub mod attributes;
pub mod automatic;
pub mod average;
pub mod selection;
pub mod statistic;

pub use attributes::{score_attributes, ScoredAttribute};
pub use selection::FeatureSelection;
pub use statistic::{FeatureEvidence, KernelTargetAlignment, RelevanceStatistic};

/// Ordered feature to weight map.
///
/// Weights are clamped at zero on insert. Zero-weight entries stay in the
/// map for reporting and are skipped by [`Self::active`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureWeightMap {
    weights: BTreeMap<Feature, f64>,
}

impl FeatureWeightMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, feature: Feature, weight: f64) {
        let weight = if weight.is_finite() { weight.max(0.0) } else { 0.0 };
        self.weights.insert(feature, weight);
    }

    #[must_use]
    pub fn get(&self, feature: &Feature) -> Option<f64> {
        self.weights.get(feature).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Feature, f64)> + '_ {
        self.weights.iter().map(|(feature, &weight)| (feature, weight))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Non-bias features with positive weight, in feature order
    pub fn active(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        self.weights
            .iter()
            .filter(|(feature, &weight)| !feature.is_bias() && weight > 0.0)
            .map(|(&feature, &weight)| (feature, weight))
    }

    /// Weight of the constant bias term
    #[must_use]
    pub fn bias_weight(&self) -> f64 {
        self.get(&Feature::Bias).unwrap_or(0.0)
    }

    /// Sum of all non-bias weights
    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.active().map(|(_, weight)| weight).sum()
    }
}

#[derive(Serialize)]
struct WeightEntry<'a> {
    feature: &'a Feature,
    weight: f64,
}

impl Serialize for FeatureWeightMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.weights.len()))?;
        for (feature, &weight) in &self.weights {
            seq.serialize_element(&WeightEntry { feature, weight })?;
        }
        seq.end()
    }
}

/// Assigns feature weights for one query.
pub struct FeatureWeightLearner<'a> {
    cache: &'a DataCache,
    config: &'a EngineConfig,
    statistic: &'a dyn RelevanceStatistic,
}

impl<'a> FeatureWeightLearner<'a> {
    pub fn new(cache: &'a DataCache, config: &'a EngineConfig, statistic: &'a dyn RelevanceStatistic) -> Self {
        Self {
            cache,
            config,
            statistic,
        }
    }

    /// Weights for the networks in `network_groups` and the attributes of
    /// `attribute_group_ids` under `method`.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::InvalidRequest`](crate::types::FusionError::InvalidRequest)
    /// for ids outside the organism, and propagates load failures.
    pub fn compute_weights(
        &self,
        organism: &OrganismRef,
        labels: &LabelVector,
        method: CombiningMethod,
        network_groups: &[Vec<NetworkId>],
        attribute_group_ids: &[AttributeGroupId],
        attribute_limit: usize,
    ) -> FusionResult<FeatureWeightMap> {
        let selection = FeatureSelection::resolve(self.cache, organism, network_groups, attribute_group_ids)?;
        self.weights_for_selection(organism, labels, method, &selection, attribute_limit)
    }

    /// Weights for every feature of an already validated selection.
    ///
    /// An unresolved `AutomaticSelect` is resolved here against the
    /// configured minimum query size.
    ///
    /// # Errors
    ///
    /// Propagates kernel and attribute load failures.
    pub fn weights_for_selection(
        &self,
        organism: &OrganismRef,
        labels: &LabelVector,
        method: CombiningMethod,
        selection: &FeatureSelection,
        attribute_limit: usize,
    ) -> FusionResult<FeatureWeightMap> {
        let method = method.resolve(labels.positives().len(), self.config.min_query_size_for_automatic);
        let target = labels.weight_target();

        let attributes = score_attributes(
            self.cache,
            organism,
            selection.attribute_groups(),
            &target,
            self.statistic,
            attribute_limit,
        )?;
        let active_attributes: Vec<&ScoredAttribute> = attributes.iter().filter(|a| a.active).collect();

        let mut weights = FeatureWeightMap::new();
        for network in selection.networks() {
            weights.insert(FeatureSelection::network_feature(network), 0.0);
        }
        for attribute in &attributes {
            weights.insert(attribute.feature, 0.0);
        }
        weights.insert(Feature::Bias, self.config.bias_weight);

        let assigned = match method {
            CombiningMethod::Average | CombiningMethod::AutomaticSelect => {
                let features = Self::features(selection.networks(), &active_attributes);
                average::average_weights(&features)
            }
            CombiningMethod::AverageCategory => {
                let mut categories: Vec<Vec<Feature>> = selection
                    .categories()
                    .iter()
                    .map(|category| category.iter().map(FeatureSelection::network_feature).collect())
                    .collect();
                for &group_id in selection.attribute_groups() {
                    categories.push(
                        active_attributes
                            .iter()
                            .filter(|a| a.group_id == group_id)
                            .map(|a| a.feature)
                            .collect(),
                    );
                }
                average::average_category_weights(&categories)
            }
            CombiningMethod::Automatic
            | CombiningMethod::Bp
            | CombiningMethod::Mf
            | CombiningMethod::Cc => {
                let candidates = self.candidate_networks(selection, method);
                let mut scored =
                    automatic::score_networks(self.cache, organism, &candidates, &target, self.statistic)?;
                scored.extend(active_attributes.iter().map(|a| (a.feature, a.score)));

                match automatic::relevance_weights(&scored) {
                    Some(learned) => learned,
                    None => {
                        warn!(
                            organism = %organism,
                            method = %method,
                            "no feature is relevant to the query, using average weights"
                        );
                        let features: Vec<Feature> = scored.iter().map(|&(feature, _)| feature).collect();
                        average::average_weights(&features)
                    }
                }
            }
        };

        for (feature, weight) in assigned {
            weights.insert(feature, weight);
        }
        debug!(
            method = %method,
            features = weights.len(),
            active = weights.active().count(),
            "computed feature weights"
        );
        Ok(weights)
    }

    fn features<'n>(
        networks: impl Iterator<Item = &'n NetworkInfo>,
        attributes: &[&ScoredAttribute],
    ) -> Vec<Feature> {
        networks
            .map(FeatureSelection::network_feature)
            .chain(attributes.iter().map(|a| a.feature))
            .collect()
    }

    /// Selected networks a learned method scores
    fn candidate_networks<'s>(&self, selection: &'s FeatureSelection, method: CombiningMethod) -> Vec<&'s NetworkInfo> {
        let all: Vec<&NetworkInfo> = selection.networks().collect();
        let Some(branch) = method.ontology_branch() else {
            return all;
        };
        let tagged: Vec<&NetworkInfo> = all.iter().copied().filter(|n| n.has_tag(branch)).collect();
        if tagged.is_empty() && !all.is_empty() {
            warn!(branch = %branch, "no selected network is tagged, scoring the full selection");
            all
        } else {
            tagged
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::TEST_EPSILON;
    use crate::data::InMemoryDataset;
    use crate::node_index::NodeIndex;
    use crate::types::{AttributeGroupInfo, OntologyBranch};
    use std::sync::Arc;

    struct Fixture {
        org: OrganismRef,
        cache: DataCache,
        config: EngineConfig,
        index: NodeIndex,
    }

    fn fixture() -> Fixture {
        let org = OrganismRef::core(1);
        let nodes: Vec<i64> = (1..=8).collect();
        let dataset = InMemoryDataset::new()
            .with_nodes(&org, nodes.clone())
            // connects the query genes 1..4
            .with_network(
                &org,
                NetworkInfo::new(1, 10, "query clique").with_tags([OntologyBranch::BiologicalProcess]),
                vec![(1, 2, 1.0), (2, 3, 1.0), (3, 4, 1.0), (5, 6, 1.0)],
            )
            // only crosses between query and background
            .with_network(
                &org,
                NetworkInfo::new(2, 10, "cross links").with_tags([OntologyBranch::MolecularFunction]),
                vec![(1, 5, 1.0), (2, 6, 1.0), (3, 7, 1.0), (4, 8, 1.0)],
            )
            .with_network(&org, NetworkInfo::new(3, 20, "background"), vec![(5, 6, 1.0), (7, 8, 1.0)])
            .with_attribute_group(
                &org,
                AttributeGroupInfo::new(5, "domains"),
                vec![(1, 100, 1.0), (2, 100, 1.0), (5, 101, 1.0), (6, 101, 1.0)],
            );
        Fixture {
            org,
            cache: DataCache::new(Arc::new(dataset)),
            config: EngineConfig::default(),
            index: NodeIndex::from_ids(nodes).unwrap(),
        }
    }

    fn learn(f: &Fixture, method: CombiningMethod, groups: &[Vec<i64>], attrs: &[i64]) -> FeatureWeightMap {
        let labels = LabelVector::build(&f.index, &[1, 2, 3, 4], &[], 1.0, -1.0, 0.0);
        FeatureWeightLearner::new(&f.cache, &f.config, &KernelTargetAlignment)
            .compute_weights(&f.org, &labels, method, groups, attrs, 10)
            .unwrap()
    }

    fn net(id: i64, group_id: i64) -> Feature {
        Feature::NetworkKernel { network_id: id, group_id }
    }

    #[test]
    fn test_automatic_prefers_informative_network() {
        let f = fixture();
        let weights = learn(&f, CombiningMethod::Automatic, &[vec![1, 2]], &[]);
        assert!(weights.get(&net(1, 10)).unwrap() > 0.0);
        assert_eq!(weights.get(&net(2, 10)), Some(0.0));
        assert!((weights.total_weight() - 1.0).abs() < TEST_EPSILON);
        assert_eq!(weights.get(&Feature::Bias), Some(0.0));
    }

    #[test]
    fn test_branch_methods_restrict_to_tagged_networks() {
        let f = fixture();
        let weights = learn(&f, CombiningMethod::Mf, &[vec![1, 2]], &[]);
        // only the cross links carry MF and they are irrelevant, so average
        // over the tagged subset
        assert_eq!(weights.get(&net(2, 10)), Some(1.0));
        assert_eq!(weights.get(&net(1, 10)), Some(0.0));

        let untagged = learn(&f, CombiningMethod::Cc, &[vec![1, 3]], &[]);
        assert!(untagged.get(&net(1, 10)).unwrap() > 0.0);
    }

    #[test]
    fn test_average_category_with_attributes() {
        let f = fixture();
        let weights = learn(&f, CombiningMethod::AverageCategory, &[vec![1, 2], vec![3]], &[5]);
        assert!((weights.get(&net(1, 10)).unwrap() - 1.0 / 6.0).abs() < TEST_EPSILON);
        assert!((weights.get(&net(3, 20)).unwrap() - 1.0 / 3.0).abs() < TEST_EPSILON);
        let attribute = Feature::AttributeVector { attribute_id: 100, group_id: 5 };
        assert!((weights.get(&attribute).unwrap() - 1.0 / 6.0).abs() < TEST_EPSILON);
        assert!((weights.total_weight() - 1.0).abs() < TEST_EPSILON);
    }

    #[test]
    fn test_small_query_automatic_select_is_average() {
        let f = fixture();
        let weights = learn(&f, CombiningMethod::AutomaticSelect, &[vec![1, 2, 3]], &[]);
        for id in 1..=3 {
            let group = if id == 3 { 20 } else { 10 };
            assert!((weights.get(&net(id, group)).unwrap() - 1.0 / 3.0).abs() < TEST_EPSILON);
        }
    }

    #[test]
    fn test_serializes_as_list() {
        let mut weights = FeatureWeightMap::new();
        weights.insert(net(1, 2), 0.5);
        weights.insert(Feature::Bias, -3.0);
        let json = serde_json::to_value(&weights).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 2);
        assert_eq!(json[1]["weight"], 0.0);
        assert_eq!(json[0]["weight"], 0.5);
    }
}
