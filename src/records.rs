//! Turns the raw outputs of a run into matched, deduplicated records.

use std::collections::HashSet;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::data::{ParsedLabel, RunOutput, RunRecord, RunRecords};
use crate::errors::ConsensusError;
use crate::extract::OptionExtractor;
use crate::types::RunId;

/// Extract, filter, and deduplicate every output of one run.
///
/// Unmatched rows are counted and dropped. Deduplication by
/// `(id, candidates)` applies to matched rows only, first occurrence wins.
/// A phrase with no exact tag correspondence aborts the run.
pub fn build_run_records(
    run: impl Into<RunId>,
    outputs: &[RunOutput],
    extractor: &OptionExtractor,
) -> Result<RunRecords, ConsensusError> {
    let run = run.into();
    let mut seen = HashSet::new();
    let mut records = Vec::new();
    let mut unmatched = 0usize;
    let mut duplicates = 0usize;
    let mut ambiguous = 0usize;

    for output in outputs {
        let label = match extractor.extract(&output.raw_text, &output.candidates) {
            ParsedLabel::Matched(tag) => tag,
            ParsedLabel::Unmatched => {
                unmatched += 1;
                continue;
            }
            ParsedLabel::ClassificationFault { phrase } => {
                return Err(ConsensusError::ClassificationFault {
                    run,
                    id: output.id.clone(),
                    phrase,
                });
            }
        };
        if !seen.insert((output.id.as_str(), &output.candidates)) {
            duplicates += 1;
            continue;
        }
        if output.candidates.has_duplicate_phrases() {
            ambiguous += 1;
            warn!(
                "[consensus:records] run '{}' item '{}' has duplicate candidate phrases; '{}' attributed to {}",
                run,
                output.id,
                output.candidates.phrase(label),
                label
            );
        }
        records.push(RunRecord {
            id: output.id.clone(),
            candidates: output.candidates.clone(),
            label,
        });
    }

    info!(
        "[consensus:records] run '{}': rows={}, matched={}, unmatched={}, duplicates={}",
        run,
        outputs.len(),
        records.len(),
        unmatched,
        duplicates
    );

    Ok(RunRecords {
        run,
        total_rows: outputs.len(),
        records,
        unmatched,
        duplicates,
        ambiguous,
    })
}

/// Build every run in parallel; results keep the input run order.
pub fn build_all_runs(
    runs: &[(RunId, Vec<RunOutput>)],
    extractor: &OptionExtractor,
) -> Result<Vec<RunRecords>, ConsensusError> {
    runs.par_iter()
        .map(|(run, outputs)| build_run_records(run.clone(), outputs, extractor))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CandidateSet, SourceTag};

    fn output(id: &str, candidates: &CandidateSet, raw: &str) -> RunOutput {
        RunOutput {
            id: id.to_string(),
            candidates: candidates.clone(),
            raw_text: raw.to_string(),
        }
    }

    fn candidates() -> CandidateSet {
        CandidateSet::new("Sono una minaccia", "Sono subdoli", "Sono pericolosi")
    }

    #[test]
    fn drops_unmatched_and_counts_them() {
        let set = candidates();
        let outputs = vec![
            output("1", &set, "Output: ['Sono subdoli']"),
            output("2", &set, "Output: ['Nessuna delle opzioni']"),
        ];
        let built = build_run_records("run_1", &outputs, &OptionExtractor::default()).unwrap();
        assert_eq!(built.len(), 1);
        assert_eq!(built.unmatched, 1);
        assert_eq!(built.total_rows, 2);
        assert_eq!(built.records[0].label, SourceTag::B);
        assert_eq!(built.records[0].matched_phrase(), "Sono subdoli");
    }

    #[test]
    fn dedup_keeps_first_and_preserves_distinct_candidate_sets() {
        let set = candidates();
        let other = CandidateSet::new("Sono tutelati", "Sono immorali", "Portano degrado");
        let outputs = vec![
            output("7", &set, "Output: ['Sono subdoli']"),
            output("7", &set, "Output: ['Sono pericolosi']"),
            output("7", &other, "Output: ['Portano degrado']"),
        ];
        let built = build_run_records("run_1", &outputs, &OptionExtractor::default()).unwrap();
        assert_eq!(built.len(), 2);
        assert_eq!(built.duplicates, 1);
        assert_eq!(built.records[0].label, SourceTag::B);
        assert_eq!(built.records[1].candidates, other);
    }

    #[test]
    fn unmatched_first_occurrence_does_not_shadow_later_match() {
        let set = candidates();
        let outputs = vec![
            output("3", &set, "Output: []"),
            output("3", &set, "Output: ['Sono una minaccia']"),
        ];
        let built = build_run_records("run_1", &outputs, &OptionExtractor::default()).unwrap();
        assert_eq!(built.len(), 1);
        assert_eq!(built.unmatched, 1);
        assert_eq!(built.duplicates, 0);
        assert_eq!(built.records[0].label, SourceTag::A);
    }

    #[test]
    fn duplicate_phrases_are_counted_as_ambiguous() {
        let set = CandidateSet::new("Sono pericolosi", "Sono subdoli", "Sono pericolosi");
        let outputs = vec![output("9", &set, "Output: Sono pericolosi")];
        let built = build_run_records("run_1", &outputs, &OptionExtractor::default()).unwrap();
        assert_eq!(built.ambiguous, 1);
        assert_eq!(built.records[0].label, SourceTag::A);
    }

    #[test]
    fn build_all_runs_preserves_run_order() {
        let set = candidates();
        let runs = vec![
            ("run_1".to_string(), vec![output("1", &set, "Output: Sono subdoli")]),
            ("run_2".to_string(), vec![output("1", &set, "Output: Sono pericolosi")]),
            ("run_3".to_string(), vec![output("1", &set, "Output: boh")]),
        ];
        let built = build_all_runs(&runs, &OptionExtractor::default()).unwrap();
        let ids: Vec<_> = built.iter().map(|run| run.run.as_str()).collect();
        assert_eq!(ids, vec!["run_1", "run_2", "run_3"]);
        assert_eq!(built[1].records[0].label, SourceTag::C);
        assert!(built[2].is_empty());
    }
}
