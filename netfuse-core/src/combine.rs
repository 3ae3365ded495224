use std::sync::Arc;
use std::time::Instant;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::cache::DataCache;
use crate::matrix::{SymAccumulator, SymMatrix};
use crate::types::{Feature, FusionError, FusionResult, OrganismRef};
use crate::weights::FeatureWeightMap;

/// Sums weighted feature kernels into one combined kernel.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use netfuse_core::cache::DataCache;
/// use netfuse_core::combine::KernelCombiner;
/// use netfuse_core::data::InMemoryDataset;
/// use netfuse_core::types::{Feature, NetworkInfo, OrganismRef};
/// use netfuse_core::weights::FeatureWeightMap;
///
/// let org = OrganismRef::core(1);
/// let dataset = InMemoryDataset::new()
///     .with_nodes(&org, vec![1, 2])
///     .with_network(&org, NetworkInfo::new(5, 1, "pair"), vec![(1, 2, 1.0)]);
/// let cache = DataCache::new(Arc::new(dataset));
///
/// let mut weights = FeatureWeightMap::new();
/// weights.insert(Feature::NetworkKernel { network_id: 5, group_id: 1 }, 0.5);
///
/// let combined = KernelCombiner::new(&cache, true).combine(&org, &weights)?;
/// assert_eq!(combined.get(0, 1), -0.5);
/// # Ok::<(), netfuse_core::types::FusionError>(())
/// ```
pub struct KernelCombiner<'a> {
    cache: &'a DataCache,
    memoize: bool,
}

impl<'a> KernelCombiner<'a> {
    pub fn new(cache: &'a DataCache, memoize: bool) -> Self {
        Self { cache, memoize }
    }

    /// `sum weight(f) * kernel(f)` over the active non-bias features.
    ///
    /// # Errors
    ///
    /// Returns [`FusionError::NotFound`] for an attribute missing from its
    /// group and propagates kernel load failures.
    pub fn combine(&self, organism: &OrganismRef, weights: &FeatureWeightMap) -> FusionResult<Arc<SymMatrix>> {
        if !self.memoize {
            return self.build(organism, weights).map(Arc::new);
        }
        let signature = Self::signature(weights);
        self.cache
            .combined_kernel(organism, &signature, || self.build(organism, weights))
    }

    /// SHA-256 over the active features and the exact bits of their weights
    #[must_use]
    pub fn signature(weights: &FeatureWeightMap) -> String {
        let mut hasher = Sha256::new();
        for (feature, weight) in weights.active() {
            let (tag, id, group): (u8, i64, i64) = match feature {
                Feature::NetworkKernel { network_id, group_id } => (0, network_id, group_id),
                Feature::AttributeVector { attribute_id, group_id } => (1, attribute_id, group_id),
                Feature::Bias => continue,
            };
            hasher.update([tag]);
            hasher.update(id.to_le_bytes());
            hasher.update(group.to_le_bytes());
            hasher.update(weight.to_bits().to_le_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    fn build(&self, organism: &OrganismRef, weights: &FeatureWeightMap) -> FusionResult<SymMatrix> {
        let start = Instant::now();
        let dim = self.cache.node_index(organism)?.len();
        let mut accumulator = SymAccumulator::new(dim);

        for (feature, weight) in weights.active() {
            match feature {
                Feature::NetworkKernel { network_id, .. } => {
                    let kernel = self.cache.kernel(organism, network_id)?;
                    accumulator.add_scaled(&kernel, weight)?;
                }
                Feature::AttributeVector { attribute_id, group_id } => {
                    let matrix = self.cache.attributes(organism, group_id)?;
                    let column = matrix
                        .column_of(attribute_id)
                        .and_then(|position| matrix.column(position))
                        .ok_or_else(|| {
                            FusionError::NotFound(format!("attribute {attribute_id} in group {group_id}"))
                        })?;
                    column.add_kernel_to(&mut accumulator, weight)?;
                }
                Feature::Bias => {}
            }
        }

        let combined = accumulator.finish();
        debug!(
            organism = %organism,
            nnz = combined.nnz(),
            elapsed = ?start.elapsed(),
            "combined kernel"
        );
        Ok(combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::InMemoryDataset;
    use crate::types::{AttributeGroupInfo, NetworkInfo};

    fn cache() -> (OrganismRef, DataCache) {
        let org = OrganismRef::core(1);
        let dataset = InMemoryDataset::new()
            .with_nodes(&org, vec![1, 2, 3])
            .with_network(&org, NetworkInfo::new(1, 1, "a"), vec![(1, 2, 1.0)])
            .with_kernel(&org, NetworkInfo::new(2, 1, "b"), SymMatrix::scaled_identity(3, 2.0))
            .with_attribute_group(&org, AttributeGroupInfo::new(9, "g"), vec![(2, 40, 1.0), (3, 40, 1.0)]);
        (org, DataCache::new(Arc::new(dataset)))
    }

    fn weights(a: f64, b: f64) -> FeatureWeightMap {
        let mut weights = FeatureWeightMap::new();
        weights.insert(Feature::NetworkKernel { network_id: 1, group_id: 1 }, a);
        weights.insert(Feature::NetworkKernel { network_id: 2, group_id: 1 }, b);
        weights.insert(Feature::Bias, 5.0);
        weights
    }

    #[test]
    fn test_weighted_sum_skips_bias_and_zero_weights() {
        let (org, cache) = cache();
        let combined = KernelCombiner::new(&cache, false).combine(&org, &weights(0.5, 0.0)).unwrap();
        assert_eq!(combined.get(0, 0), 0.5);
        assert_eq!(combined.get(0, 1), -0.5);
        assert_eq!(combined.get(2, 2), 0.0);
        assert!(combined.is_symmetric(0.0));
    }

    #[test]
    fn test_includes_attribute_columns() {
        let (org, cache) = cache();
        let mut weights = weights(0.0, 0.5);
        weights.insert(Feature::AttributeVector { attribute_id: 40, group_id: 9 }, 1.0);
        let combined = KernelCombiner::new(&cache, false).combine(&org, &weights).unwrap();
        assert_eq!(combined.get(1, 1), 2.0);
        assert_eq!(combined.get(1, 2), -1.0);

        weights.insert(Feature::AttributeVector { attribute_id: 41, group_id: 9 }, 1.0);
        assert!(matches!(
            KernelCombiner::new(&cache, false).combine(&org, &weights),
            Err(FusionError::NotFound(_))
        ));
    }

    #[test]
    fn test_memoized_by_exact_weights() {
        let (org, cache) = cache();
        let combiner = KernelCombiner::new(&cache, true);
        let first = combiner.combine(&org, &weights(0.5, 0.5)).unwrap();
        let second = combiner.combine(&org, &weights(0.5, 0.5)).unwrap();
        let other = combiner.combine(&org, &weights(0.5, 0.25)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[test]
    fn test_signature_ignores_inactive_features() {
        let mut with_zero = weights(0.5, 0.0);
        with_zero.insert(Feature::AttributeVector { attribute_id: 1, group_id: 1 }, 0.0);
        let mut without = FeatureWeightMap::new();
        without.insert(Feature::NetworkKernel { network_id: 1, group_id: 1 }, 0.5);
        assert_eq!(KernelCombiner::signature(&with_zero), KernelCombiner::signature(&without));
        assert_ne!(KernelCombiner::signature(&with_zero), KernelCombiner::signature(&weights(0.5, 0.1)));
    }
}
