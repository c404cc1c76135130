#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Command-line runners shared by the crate binaries.
pub mod apps;
/// Analysis configuration types.
pub mod config;
/// Cross-run join and agreement classification.
pub mod consensus;
/// Centralized constants (markers, column names, report files).
pub mod constants;
/// Item, run, and consensus record types.
pub mod data;
/// Source vs. prediction distribution comparison.
pub mod distribution;
/// Candidate extraction from generated text.
pub mod extract;
/// Value-count and share helpers.
pub mod metrics;
/// Hallucination rate and coverage.
pub mod rates;
/// Per-run record building.
pub mod records;
/// Full prediction report assembly.
pub mod report;
/// File transports (CSV today).
pub mod transport;
/// Shared type aliases.
pub mod types;
/// Presentation-position analysis.
pub mod winner;

mod errors;

pub use config::{AnalysisConfig, AnalysisPaths, ExtractorConfig};
pub use data::{
    AgreementState, CandidateSet, ConsensusRecord, ParsedLabel, PresentationRecord, RunOutput,
    RunRecord, RunRecords, SourceTag, WinnerPosition, WinnerRecord,
};
pub use errors::ConsensusError;
pub use extract::OptionExtractor;
pub use report::{Analysis, PredictionReport};
pub use types::{ColumnName, ItemId, Phrase, RunId};
