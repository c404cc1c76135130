use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::columns::{TAG_A, TAG_B, TAG_C};

pub use crate::types::{ItemId, Phrase, RunId};

/// Human annotation source that contributed one candidate phrase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceTag {
    A,
    B,
    C,
}

impl SourceTag {
    /// All tags in listing order. Ties between candidates resolve in this order.
    pub const ALL: [SourceTag; 3] = [SourceTag::A, SourceTag::B, SourceTag::C];

    /// CSV column carrying this source's phrase (e.g. `05`).
    pub const fn column(self) -> &'static str {
        match self {
            SourceTag::A => TAG_A,
            SourceTag::B => TAG_B,
            SourceTag::C => TAG_C,
        }
    }

    /// Label written to parsed run files (e.g. `ann05`).
    pub const fn label(self) -> &'static str {
        match self {
            SourceTag::A => "ann05",
            SourceTag::B => "ann01",
            SourceTag::C => "ann02",
        }
    }

    /// Parse a persisted label back into a tag.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| tag.label() == label)
    }

    const fn index(self) -> usize {
        match self {
            SourceTag::A => 0,
            SourceTag::B => 1,
            SourceTag::C => 2,
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The three tagged phrases offered for one item.
///
/// Used as part of the join key across runs, so two sets compare equal only
/// when every tag carries the same text.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateSet {
    phrases: [Phrase; 3],
}

impl CandidateSet {
    /// Build a set from the phrases of sources A, B and C.
    pub fn new(a: impl Into<Phrase>, b: impl Into<Phrase>, c: impl Into<Phrase>) -> Self {
        Self {
            phrases: [a.into(), b.into(), c.into()],
        }
    }

    /// Phrase contributed by `tag`.
    pub fn phrase(&self, tag: SourceTag) -> &str {
        &self.phrases[tag.index()]
    }

    /// Iterate `(tag, phrase)` pairs in listing order.
    pub fn iter(&self) -> impl Iterator<Item = (SourceTag, &str)> {
        SourceTag::ALL
            .into_iter()
            .map(move |tag| (tag, self.phrase(tag)))
    }

    /// Map a phrase back to its owning tag by exact equality.
    ///
    /// When two sources share the same text the first listed tag wins; use
    /// [`CandidateSet::has_duplicate_phrases`] to surface that case.
    pub fn resolve_tag(&self, phrase: &str) -> Option<SourceTag> {
        self.iter()
            .find(|(_, candidate)| *candidate == phrase)
            .map(|(tag, _)| tag)
    }

    /// True when at least two sources offered identical text.
    pub fn has_duplicate_phrases(&self) -> bool {
        let [a, b, c] = &self.phrases;
        a == b || a == c || b == c
    }
}

/// Raw generator output for one (item, run) pair.
#[derive(Clone, Debug)]
pub struct RunOutput {
    pub id: ItemId,
    pub candidates: CandidateSet,
    pub raw_text: String,
}

/// Outcome of extracting a candidate phrase from raw generated text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum ParsedLabel {
    /// The earliest candidate found in the answer region.
    Matched(SourceTag),
    /// None of the candidates occurs in the answer region.
    Unmatched,
    /// A phrase was found but it has no exact tag correspondence.
    ClassificationFault { phrase: Phrase },
}

/// One matched, deduplicated record of a single run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunRecord {
    pub id: ItemId,
    pub candidates: CandidateSet,
    pub label: SourceTag,
}

impl RunRecord {
    /// Candidate text the run picked.
    pub fn matched_phrase(&self) -> &str {
        self.candidates.phrase(self.label)
    }
}

/// All records produced for one run plus the accounting needed by rate reports.
#[derive(Clone, Debug)]
pub struct RunRecords {
    /// Run identifier (used in logs and report keys).
    pub run: RunId,
    /// Rows read for this run before extraction.
    pub total_rows: usize,
    /// Matched records, deduplicated by `(id, candidates)`.
    pub records: Vec<RunRecord>,
    /// Rows with no extractable candidate.
    pub unmatched: usize,
    /// Matched rows discarded as repeats of an earlier `(id, candidates)`.
    pub duplicates: usize,
    /// Kept records whose candidate set has duplicate phrase texts.
    pub ambiguous: usize,
}

impl RunRecords {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Agreement between runs on one item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgreementState {
    AllAgree,
    PartialAgree,
    AllDifferent,
}

impl AgreementState {
    pub const ALL: [AgreementState; 3] = [
        AgreementState::AllAgree,
        AgreementState::PartialAgree,
        AgreementState::AllDifferent,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            AgreementState::AllAgree => "ALL_AGREE",
            AgreementState::PartialAgree => "PARTIAL_AGREE",
            AgreementState::AllDifferent => "ALL_DIFFERENT",
        }
    }
}

impl fmt::Display for AgreementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An item present in every run, with each run's label in run order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsensusRecord {
    pub id: ItemId,
    pub candidates: CandidateSet,
    pub labels: Vec<SourceTag>,
    pub agreement: AgreementState,
}

impl ConsensusRecord {
    /// Phrase picked by the run at `run_index`.
    pub fn phrase(&self, run_index: usize) -> Option<&str> {
        self.labels
            .get(run_index)
            .map(|tag| self.candidates.phrase(*tag))
    }
}

/// Order in which the options were shown to the generator for one (item, run).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresentationRecord {
    pub id: ItemId,
    pub run: RunId,
    pub options: [Phrase; 3],
}

impl PresentationRecord {
    /// Presentation position of `phrase`, or `NoMatch` when it was not shown.
    pub fn position_of(&self, phrase: &str) -> WinnerPosition {
        match self.options.iter().position(|option| option == phrase) {
            Some(0) => WinnerPosition::First,
            Some(1) => WinnerPosition::Second,
            Some(2) => WinnerPosition::Third,
            _ => WinnerPosition::NoMatch,
        }
    }

    /// True when the shown options are exactly the phrases of `candidates`, in any order.
    pub fn shows(&self, candidates: &CandidateSet) -> bool {
        let mut shown: Vec<&str> = self.options.iter().map(String::as_str).collect();
        let mut offered: Vec<&str> = candidates.iter().map(|(_, phrase)| phrase).collect();
        shown.sort_unstable();
        offered.sort_unstable();
        shown == offered
    }
}

/// Presentation slot of the option a run picked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinnerPosition {
    First,
    Second,
    Third,
    /// The picked phrase matched no stored presentation option.
    NoMatch,
}

/// Winner position for one disagreeing item in one run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WinnerRecord {
    pub id: ItemId,
    pub run: RunId,
    pub phrase: Phrase,
    pub position: WinnerPosition,
}
