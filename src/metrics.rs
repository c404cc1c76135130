use std::hash::Hash;

use indexmap::IndexMap;
use serde::Serialize;

/// Count and share of one label within a tally.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LabelShare<K> {
    pub label: K,
    pub count: usize,
    pub share: f64,
}

/// Value counts over a label column, most frequent first.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LabelTally<K> {
    pub total: usize,
    pub per_label: Vec<LabelShare<K>>,
}

impl<K: PartialEq> LabelTally<K> {
    /// Count recorded for `label` (0 when absent).
    pub fn count(&self, label: &K) -> usize {
        self.per_label
            .iter()
            .find(|entry| &entry.label == label)
            .map(|entry| entry.count)
            .unwrap_or(0)
    }

    /// Share recorded for `label` (0.0 when absent).
    pub fn share(&self, label: &K) -> f64 {
        self.per_label
            .iter()
            .find(|entry| &entry.label == label)
            .map(|entry| entry.share)
            .unwrap_or(0.0)
    }
}

/// Count occurrences, ordered by count descending then label ascending.
pub fn value_counts<K, I>(values: I) -> IndexMap<K, usize>
where
    K: Hash + Eq + Ord,
    I: IntoIterator<Item = K>,
{
    let mut counts: IndexMap<K, usize> = IndexMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }
    counts.sort_by(|ka, a, kb, b| b.cmp(a).then_with(|| ka.cmp(kb)));
    counts
}

/// Turn value counts into a tally with per-label shares.
pub fn tally<K, I>(values: I) -> LabelTally<K>
where
    K: Hash + Eq + Ord + Clone,
    I: IntoIterator<Item = K>,
{
    let counts = value_counts(values);
    let total: usize = counts.values().sum();
    let per_label = counts
        .into_iter()
        .map(|(label, count)| LabelShare {
            label,
            count,
            share: if total == 0 {
                0.0
            } else {
                count as f64 / total as f64
            },
        })
        .collect();
    LabelTally { total, per_label }
}

/// Normalize counts over a fixed, sorted support; missing labels get 0.
///
/// Returns all zeros when nothing inside the support was counted.
pub fn normalized_over<K>(counts: &IndexMap<K, usize>, support: &[K]) -> IndexMap<K, f64>
where
    K: Hash + Eq + Clone,
{
    let total: usize = support
        .iter()
        .map(|label| counts.get(label).copied().unwrap_or(0))
        .sum();
    support
        .iter()
        .map(|label| {
            let count = counts.get(label).copied().unwrap_or(0);
            let share = if total == 0 {
                0.0
            } else {
                count as f64 / total as f64
            };
            (label.clone(), share)
        })
        .collect()
}

/// Total-variation distance between two distributions on the same support.
pub fn total_variation<K>(left: &IndexMap<K, f64>, right: &IndexMap<K, f64>) -> f64
where
    K: Hash + Eq,
{
    let mut distance = 0.0;
    for (label, p) in left {
        distance += (p - right.get(label).copied().unwrap_or(0.0)).abs();
    }
    for (label, q) in right {
        if !left.contains_key(label) {
            distance += q.abs();
        }
    }
    distance / 2.0
}
