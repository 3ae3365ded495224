use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::cache::DataCache;
use crate::types::{
    AttributeGroupId, Feature, FusionError, FusionResult, NetworkId, NetworkInfo, OrganismRef,
};

/// Validated evidence selection of one request.
///
/// Networks are grouped into categories; every id in the selection is known
/// to the organism.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSelection {
    categories: Vec<Vec<NetworkInfo>>,
    attribute_groups: Vec<AttributeGroupId>,
}

impl FeatureSelection {
    /// Check a request's network and attribute group ids against what the
    /// organism stores.
    ///
    /// An empty network selection becomes the organism's default networks,
    /// one category per network group. Within an explicit selection each
    /// inner list is one category; repeated ids keep their first position.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::InvalidRequest`] for an id the organism does
    /// not have, or [`FusionError::DataStore`] if its listings cannot be read.
    pub fn resolve(
        cache: &DataCache,
        organism: &OrganismRef,
        network_groups: &[Vec<NetworkId>],
        attribute_group_ids: &[AttributeGroupId],
    ) -> FusionResult<Self> {
        let available = cache.networks(organism)?;

        let categories = if network_groups.iter().all(Vec::is_empty) {
            Self::default_categories(&available)
        } else {
            let by_id: HashMap<NetworkId, &NetworkInfo> =
                available.iter().map(|network| (network.id, network)).collect();
            let mut seen = BTreeSet::new();
            let mut categories = Vec::new();
            for group in network_groups {
                let mut category = Vec::new();
                for id in group {
                    let network = by_id.get(id).ok_or_else(|| {
                        FusionError::InvalidRequest(format!("network {id} is not part of organism {organism}"))
                    })?;
                    if seen.insert(*id) {
                        category.push((*network).clone());
                    }
                }
                if !category.is_empty() {
                    categories.push(category);
                }
            }
            categories
        };

        let mut attribute_groups = Vec::new();
        if !attribute_group_ids.is_empty() {
            let known: BTreeSet<AttributeGroupId> = cache
                .attribute_groups(organism)?
                .iter()
                .map(|group| group.id)
                .collect();
            for &id in attribute_group_ids {
                if !known.contains(&id) {
                    return Err(FusionError::InvalidRequest(format!(
                        "attribute group {id} is not part of organism {organism}"
                    )));
                }
                if !attribute_groups.contains(&id) {
                    attribute_groups.push(id);
                }
            }
        }

        Ok(Self {
            categories,
            attribute_groups,
        })
    }

    fn default_categories(available: &[NetworkInfo]) -> Vec<Vec<NetworkInfo>> {
        let mut by_group: BTreeMap<i64, Vec<NetworkInfo>> = BTreeMap::new();
        for network in available.iter().filter(|network| network.is_default) {
            by_group.entry(network.group_id).or_default().push(network.clone());
        }
        by_group.into_values().collect()
    }

    /// Selection built from already validated parts
    #[must_use]
    pub fn from_parts(categories: Vec<Vec<NetworkInfo>>, attribute_groups: Vec<AttributeGroupId>) -> Self {
        Self {
            categories,
            attribute_groups,
        }
    }

    /// Network categories in request order
    #[must_use]
    pub fn categories(&self) -> &[Vec<NetworkInfo>] {
        &self.categories
    }

    /// Every selected network, category by category
    pub fn networks(&self) -> impl Iterator<Item = &NetworkInfo> + '_ {
        self.categories.iter().flatten()
    }

    #[must_use]
    pub fn network_count(&self) -> usize {
        self.categories.iter().map(Vec::len).sum()
    }

    #[must_use]
    pub fn attribute_groups(&self) -> &[AttributeGroupId] {
        &self.attribute_groups
    }

    /// Feature key of a selected network
    #[must_use]
    pub const fn network_feature(network: &NetworkInfo) -> Feature {
        Feature::NetworkKernel {
            network_id: network.id,
            group_id: network.group_id,
        }
    }
}
