//! Cross-run join and agreement classification.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{info, warn};

use crate::data::{AgreementState, CandidateSet, ConsensusRecord, RunRecords, SourceTag};
use crate::errors::ConsensusError;
use crate::metrics::{LabelTally, tally};
use crate::types::{ItemId, RunId};

/// Classify agreement from the labels of every run for one item.
///
/// One distinct label means all agree; as many distinct labels as runs
/// (with at least two runs) means all differ; anything else is partial.
pub fn classify(labels: &[SourceTag]) -> AgreementState {
    let distinct: HashSet<&SourceTag> = labels.iter().collect();
    match distinct.len() {
        0 | 1 => AgreementState::AllAgree,
        n if n == labels.len() => AgreementState::AllDifferent,
        _ => AgreementState::PartialAgree,
    }
}

/// Inner join of all runs on `(id, candidates)`.
///
/// Output follows the record order of the first run. Items missing from any
/// run are dropped; they lower coverage but are never counted as disagreement.
pub fn merge(runs: &[RunRecords]) -> Result<Vec<ConsensusRecord>, ConsensusError> {
    let Some((first, rest)) = runs.split_first() else {
        return Err(ConsensusError::Configuration(
            "consensus merge requires at least one run".to_string(),
        ));
    };

    let indexes: Vec<HashMap<(&str, &CandidateSet), SourceTag>> = rest
        .iter()
        .map(|run| {
            let mut index = HashMap::with_capacity(run.records.len());
            for record in &run.records {
                index
                    .entry((record.id.as_str(), &record.candidates))
                    .or_insert(record.label);
            }
            index
        })
        .collect();

    let mut joined = Vec::new();
    for record in &first.records {
        let key = (record.id.as_str(), &record.candidates);
        let mut labels = Vec::with_capacity(runs.len());
        labels.push(record.label);
        for index in &indexes {
            match index.get(&key) {
                Some(label) => labels.push(*label),
                None => break,
            }
        }
        if labels.len() != runs.len() {
            continue;
        }
        joined.push(ConsensusRecord {
            id: record.id.clone(),
            candidates: record.candidates.clone(),
            agreement: classify(&labels),
            labels,
        });
    }

    if joined.is_empty() {
        warn!(
            "[consensus:join] no item is present in all {} runs; downstream statistics are degenerate",
            runs.len()
        );
    } else {
        info!(
            "[consensus:join] {} items present in all {} runs",
            joined.len(),
            runs.len()
        );
    }
    Ok(joined)
}

/// Records in a given agreement state, in join order.
pub fn subset(records: &[ConsensusRecord], state: AgreementState) -> Vec<ConsensusRecord> {
    records
        .iter()
        .filter(|record| record.agreement == state)
        .cloned()
        .collect()
}

/// Number of joined items in each agreement state.
pub fn agreement_counts(records: &[ConsensusRecord]) -> IndexMap<AgreementState, usize> {
    let mut counts: IndexMap<AgreementState, usize> =
        AgreementState::ALL.into_iter().map(|state| (state, 0)).collect();
    for record in records {
        *counts.entry(record.agreement).or_insert(0) += 1;
    }
    counts
}

/// Per-run label tally over the records accepted by `filter`.
#[derive(Clone, Debug, Serialize)]
pub struct RunLabelTally {
    pub run: RunId,
    pub tally: LabelTally<SourceTag>,
}

/// Label counts and shares per run, restricted to records accepted by `filter`.
pub fn label_tallies<F>(
    records: &[ConsensusRecord],
    run_ids: &[RunId],
    filter: F,
) -> Vec<RunLabelTally>
where
    F: Fn(&ConsensusRecord) -> bool,
{
    let selected: Vec<&ConsensusRecord> = records.iter().filter(|record| filter(record)).collect();
    run_ids
        .iter()
        .enumerate()
        .map(|(run_index, run)| RunLabelTally {
            run: run.clone(),
            tally: tally(
                selected
                    .iter()
                    .filter_map(|record| record.labels.get(run_index).copied()),
            ),
        })
        .collect()
}

/// Item ids in the given agreement state, in join order.
pub fn ids_in_state(records: &[ConsensusRecord], state: AgreementState) -> Vec<ItemId> {
    records
        .iter()
        .filter(|record| record.agreement == state)
        .map(|record| record.id.clone())
        .collect()
}
