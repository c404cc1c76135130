//! Presentation-position analysis for items on which every run disagrees.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{info, warn};

use crate::data::{
    AgreementState, CandidateSet, ConsensusRecord, PresentationRecord, RunOutput, RunRecords,
    WinnerPosition, WinnerRecord,
};
use crate::extract::OptionExtractor;
use crate::types::{ItemId, RunId};

/// Position counts for one run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WinnerTally {
    pub first: usize,
    pub second: usize,
    pub third: usize,
    pub no_match: usize,
}

impl WinnerTally {
    fn record(&mut self, position: WinnerPosition) {
        match position {
            WinnerPosition::First => self.first += 1,
            WinnerPosition::Second => self.second += 1,
            WinnerPosition::Third => self.third += 1,
            WinnerPosition::NoMatch => self.no_match += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.first + self.second + self.third + self.no_match
    }
}

/// Winner tally of one run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunWinners {
    pub run: RunId,
    pub tally: WinnerTally,
}

/// Winner positions for every fully-disagreeing item and run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct WinnerReport {
    pub per_run: Vec<RunWinners>,
    pub records: Vec<WinnerRecord>,
}

/// Recover which presentation slot each run picked on `AllDifferent` items.
///
/// For each run the run's records are deduplicated on `(id, phrase)` and
/// matched against that run's presentation records. Records in any other
/// agreement state are ignored. A phrase with no presentation record, or
/// one not among its shown options, is reported as `NoMatch`.
pub fn analyze_winners(
    joined: &[ConsensusRecord],
    runs: &[RunRecords],
    presentations: &[PresentationRecord],
) -> WinnerReport {
    let mut shown: HashMap<(&str, &str), Vec<&PresentationRecord>> = HashMap::new();
    for presented in presentations {
        shown
            .entry((presented.id.as_str(), presented.run.as_str()))
            .or_default()
            .push(presented);
    }

    let mut report = WinnerReport::default();
    for (run_index, run) in runs.iter().enumerate() {
        let mut positions: HashMap<(&str, &str), WinnerPosition> = HashMap::new();
        for record in &run.records {
            let phrase = record.matched_phrase();
            positions
                .entry((record.id.as_str(), phrase))
                .or_insert_with(|| {
                    shown
                        .get(&(record.id.as_str(), run.run.as_str()))
                        .and_then(|shown_lists| {
                            shown_lists
                                .iter()
                                .find(|presented| presented.shows(&record.candidates))
                                .map(|presented| presented.position_of(phrase))
                                .filter(|position| *position != WinnerPosition::NoMatch)
                                .or_else(|| {
                                    shown_lists
                                        .iter()
                                        .map(|presented| presented.position_of(phrase))
                                        .find(|position| *position != WinnerPosition::NoMatch)
                                })
                        })
                        .unwrap_or(WinnerPosition::NoMatch)
                });
        }

        let mut tally = WinnerTally::default();
        for record in joined
            .iter()
            .filter(|record| record.agreement == AgreementState::AllDifferent)
        {
            let Some(phrase) = record.phrase(run_index) else {
                continue;
            };
            let position = positions
                .get(&(record.id.as_str(), phrase))
                .copied()
                .unwrap_or(WinnerPosition::NoMatch);
            if position == WinnerPosition::NoMatch {
                warn!(
                    "[consensus:winner] run '{}' item '{}': picked phrase '{}' matches no presented option",
                    run.run, record.id, phrase
                );
            }
            tally.record(position);
            report.records.push(WinnerRecord {
                id: record.id.clone(),
                run: run.run.clone(),
                phrase: phrase.to_string(),
                position,
            });
        }
        info!(
            "[consensus:winner] run '{}': first={}, second={}, third={}, no_match={}",
            run.run, tally.first, tally.second, tally.third, tally.no_match
        );
        report.per_run.push(RunWinners {
            run: run.run.clone(),
            tally,
        });
    }
    report
}

/// Presentation records recovered from the prompt echoed in each raw output.
///
/// The first recoverable echo per `(id, candidates)` wins, so candidate sets
/// sharing an id keep their own order. Outputs without a parsable options
/// list are skipped.
pub fn presentations_from_outputs(
    run: &RunId,
    outputs: &[RunOutput],
    extractor: &OptionExtractor,
) -> Vec<PresentationRecord> {
    let mut seen: HashSet<(&ItemId, &CandidateSet)> = HashSet::new();
    let mut recovered = Vec::new();
    let mut missing = 0usize;
    for output in outputs {
        let Some(options) = extractor.presented_options(&output.raw_text) else {
            missing += 1;
            continue;
        };
        if !seen.insert((&output.id, &output.candidates)) {
            continue;
        }
        recovered.push(PresentationRecord {
            id: output.id.clone(),
            run: run.clone(),
            options,
        });
    }
    if missing > 0 {
        warn!(
            "[consensus:winner] run '{}': {} outputs carry no recoverable options list",
            run, missing
        );
    }
    recovered
}
