//! Ground-truth vs. predicted phrase distributions per annotation source.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::warn;

use crate::data::{AgreementState, ConsensusRecord, Phrase, SourceTag};
use crate::metrics::{normalized_over, total_variation, value_counts};
use crate::types::RunId;

/// Paired distributions over a shared, sorted phrase support.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PairedDistribution {
    pub tag: SourceTag,
    pub run: RunId,
    pub support: Vec<Phrase>,
    pub ground_truth: IndexMap<Phrase, f64>,
    pub predicted: IndexMap<Phrase, f64>,
    /// Predictions that fell inside the support and were kept.
    pub predicted_kept: usize,
    /// Predictions dropped for lying outside the support.
    pub predicted_dropped: usize,
    /// `None` when either side has no mass.
    pub total_variation: Option<f64>,
}

/// Compare one source's phrase distribution against one run's picks.
///
/// Predictions outside the ground-truth support are filtered out, the rest
/// renormalized to sum to 1.
pub fn compare_to_source(
    records: &[ConsensusRecord],
    tag: SourceTag,
    run_index: usize,
    run: &RunId,
) -> PairedDistribution {
    let truth_counts = value_counts(
        records
            .iter()
            .map(|record| record.candidates.phrase(tag).to_string()),
    );
    let mut support: Vec<Phrase> = truth_counts.keys().cloned().collect();
    support.sort();

    let predictions: Vec<Phrase> = records
        .iter()
        .filter_map(|record| record.phrase(run_index).map(str::to_string))
        .collect();
    let total_predictions = predictions.len();
    let kept: Vec<Phrase> = predictions
        .into_iter()
        .filter(|phrase| truth_counts.contains_key(phrase))
        .collect();
    let predicted_kept = kept.len();
    let predicted_counts = value_counts(kept);

    paired(
        tag,
        run.clone(),
        support,
        &truth_counts,
        &predicted_counts,
        predicted_kept,
        total_predictions - predicted_kept,
    )
}

/// Every (run, tag) comparison over `records`, run-major.
pub fn compare_all(records: &[ConsensusRecord], run_ids: &[RunId]) -> Vec<PairedDistribution> {
    if records.is_empty() {
        warn!("[consensus:distribution] no records to compare; distributions are undefined");
    }
    run_ids
        .iter()
        .enumerate()
        .flat_map(|(run_index, run)| {
            SourceTag::ALL
                .into_iter()
                .map(move |tag| compare_to_source(records, tag, run_index, run))
        })
        .collect()
}

/// Ground truth of `tag` over the whole join vs. the first run's picks on
/// items where every run agreed on `tag`, over the union support.
pub fn compare_unanimous(joined: &[ConsensusRecord], tag: SourceTag, run: &RunId) -> PairedDistribution {
    let truth_counts = value_counts(
        joined
            .iter()
            .map(|record| record.candidates.phrase(tag).to_string()),
    );
    let agreed: Vec<Phrase> = joined
        .iter()
        .filter(|record| {
            record.agreement == AgreementState::AllAgree && record.labels.first() == Some(&tag)
        })
        .filter_map(|record| record.phrase(0).map(str::to_string))
        .collect();
    let predicted_kept = agreed.len();
    let predicted_counts = value_counts(agreed);

    let mut support: Vec<Phrase> = truth_counts
        .keys()
        .chain(predicted_counts.keys())
        .cloned()
        .collect();
    support.sort();
    support.dedup();

    paired(
        tag,
        run.clone(),
        support,
        &truth_counts,
        &predicted_counts,
        predicted_kept,
        0,
    )
}

fn paired(
    tag: SourceTag,
    run: RunId,
    support: Vec<Phrase>,
    truth_counts: &IndexMap<Phrase, usize>,
    predicted_counts: &IndexMap<Phrase, usize>,
    predicted_kept: usize,
    predicted_dropped: usize,
) -> PairedDistribution {
    let ground_truth = normalized_over(truth_counts, &support);
    let predicted = normalized_over(predicted_counts, &support);
    let has_mass = |dist: &IndexMap<Phrase, f64>| dist.values().any(|share| *share > 0.0);
    let total_variation = (has_mass(&ground_truth) && has_mass(&predicted))
        .then(|| total_variation(&ground_truth, &predicted));
    PairedDistribution {
        tag,
        run,
        support,
        ground_truth,
        predicted,
        predicted_kept,
        predicted_dropped,
        total_variation,
    }
}
