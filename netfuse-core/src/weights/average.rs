use crate::types::Feature;

/// `1 / n` for each of `n` features.
#[must_use]
pub fn average_weights(features: &[Feature]) -> Vec<(Feature, f64)> {
    if features.is_empty() {
        return Vec::new();
    }
    let weight = 1.0 / features.len() as f64;
    features.iter().map(|&feature| (feature, weight)).collect()
}

/// `1 / n_categories` per non-empty category, split evenly among its
/// members.
#[must_use]
pub fn average_category_weights(categories: &[Vec<Feature>]) -> Vec<(Feature, f64)> {
    let populated: Vec<&Vec<Feature>> = categories.iter().filter(|c| !c.is_empty()).collect();
    if populated.is_empty() {
        return Vec::new();
    }
    let share = 1.0 / populated.len() as f64;
    populated
        .into_iter()
        .flat_map(|members| {
            let weight = share / members.len() as f64;
            members.iter().map(move |&feature| (feature, weight))
        })
        .collect()
}
