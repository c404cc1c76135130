//! Full prediction report over all runs.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::consensus::{RunLabelTally, agreement_counts, label_tallies, merge, subset};
use crate::data::{AgreementState, ConsensusRecord, PresentationRecord, RunRecords, SourceTag};
use crate::distribution::{PairedDistribution, compare_all, compare_unanimous};
use crate::errors::ConsensusError;
use crate::rates::{HallucinationReport, coverage, hallucination_rates};
use crate::types::RunId;
use crate::winner::{WinnerReport, analyze_winners};

/// Record accounting for one run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunSummary {
    pub run: RunId,
    pub total_rows: usize,
    pub records: usize,
    pub unmatched: usize,
    pub duplicates: usize,
    pub ambiguous: usize,
}

impl From<&RunRecords> for RunSummary {
    fn from(run: &RunRecords) -> Self {
        Self {
            run: run.run.clone(),
            total_rows: run.total_rows,
            records: run.len(),
            unmatched: run.unmatched,
            duplicates: run.duplicates,
            ambiguous: run.ambiguous,
        }
    }
}

/// Aggregate statistics produced from the runs of one experiment.
#[derive(Clone, Debug, Serialize)]
pub struct PredictionReport {
    pub generated_at: DateTime<Utc>,
    pub total_items: usize,
    pub runs: Vec<RunSummary>,
    pub hallucination: HallucinationReport,
    /// Items present in every run.
    pub joined: usize,
    /// `joined / total_items * 100`.
    pub coverage: f64,
    pub agreement_counts: IndexMap<AgreementState, usize>,
    /// Per-run label tallies where all runs agree.
    pub agreement: Vec<RunLabelTally>,
    /// Per-run label tallies where at least one run differs.
    pub disagreement: Vec<RunLabelTally>,
    pub winners: WinnerReport,
    /// Source vs. run distributions over the whole join.
    pub distributions: Vec<PairedDistribution>,
    /// Source vs. run distributions over fully-disagreeing items.
    pub all_different_distributions: Vec<PairedDistribution>,
    /// Per-source ground truth vs. unanimous picks of the first run.
    pub unanimous: Vec<PairedDistribution>,
}

/// Consensus join plus the report computed from it.
#[derive(Clone, Debug)]
pub struct Analysis {
    pub joined: Vec<ConsensusRecord>,
    pub report: PredictionReport,
}

impl Analysis {
    /// Joined items on which every run picked a different option.
    pub fn all_different(&self) -> Vec<ConsensusRecord> {
        subset(&self.joined, AgreementState::AllDifferent)
    }
}

/// Join the runs and compute every statistic.
pub fn analyze(
    runs: &[RunRecords],
    total_items: usize,
    presentations: &[PresentationRecord],
) -> Result<Analysis, ConsensusError> {
    let run_ids: Vec<RunId> = runs.iter().map(|run| run.run.clone()).collect();
    let hallucination = hallucination_rates(runs, total_items)?;
    let joined = merge(runs)?;
    let coverage = coverage(joined.len(), total_items)?;

    let agreement = label_tallies(&joined, &run_ids, |record| {
        record.agreement == AgreementState::AllAgree
    });
    let disagreement = label_tallies(&joined, &run_ids, |record| {
        record.agreement != AgreementState::AllAgree
    });
    let all_different = subset(&joined, AgreementState::AllDifferent);
    let winners = analyze_winners(&joined, runs, presentations);
    let distributions = compare_all(&joined, &run_ids);
    let all_different_distributions = compare_all(&all_different, &run_ids);
    let unanimous = run_ids
        .first()
        .map(|first| {
            SourceTag::ALL
                .into_iter()
                .map(|tag| compare_unanimous(&joined, tag, first))
                .collect()
        })
        .unwrap_or_default();

    let report = PredictionReport {
        generated_at: Utc::now(),
        total_items,
        runs: runs.iter().map(RunSummary::from).collect(),
        hallucination,
        joined: joined.len(),
        coverage,
        agreement_counts: agreement_counts(&joined),
        agreement,
        disagreement,
        winners,
        distributions,
        all_different_distributions,
        unanimous,
    };
    Ok(Analysis { joined, report })
}

/// Write the report as pretty JSON, creating parent directories.
pub fn write_report(path: &Path, report: &PredictionReport) -> Result<(), ConsensusError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let raw = serde_json::to_vec_pretty(report)?;
    fs::write(path, raw)?;
    Ok(())
}
