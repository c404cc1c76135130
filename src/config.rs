use std::path::PathBuf;

use crate::constants::columns::CORPUS_TEXT;
use crate::constants::extract::{OPTIONS_MARKER, OUTPUT_MARKER};
use crate::errors::ConsensusError;
use crate::types::{ColumnName, RunId};

/// Controls how the answer region and presented options are located in raw text.
#[derive(Clone, Debug)]
pub struct ExtractorConfig {
    /// Marker delimiting the answer; text before its last occurrence is ignored.
    pub output_marker: String,
    /// Marker preceding the options list echoed in the prompt.
    pub options_marker: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            output_marker: OUTPUT_MARKER.to_string(),
            options_marker: OPTIONS_MARKER.to_string(),
        }
    }
}

/// Input and output locations for a prediction analysis.
#[derive(Clone, Debug)]
pub struct AnalysisPaths {
    /// CSV whose row count is the total number of input items.
    pub input_items: PathBuf,
    /// Parsed run files, one per run, in run order.
    pub parsed_runs: Vec<PathBuf>,
    /// Raw run output files, one per run, used to recover presentation order.
    pub classifications: Vec<PathBuf>,
    /// Optional side-channel presentation file; preferred over `classifications`.
    pub presentations: Option<PathBuf>,
    /// Optional corpus joined onto the disagreement export.
    pub corpus: Option<PathBuf>,
    /// Directory receiving exports and the JSON report.
    pub output_dir: PathBuf,
}

impl Default for AnalysisPaths {
    fn default() -> Self {
        Self {
            input_items: PathBuf::from("O-Ster dataset/preprocessed/data_on5.csv"),
            parsed_runs: (1..=3)
                .map(|n| PathBuf::from(format!("parsed_output/parsed_output_{n}.csv")))
                .collect(),
            classifications: (1..=3)
                .map(|n| PathBuf::from(format!("predictions/classifications_{n}.csv")))
                .collect(),
            presentations: None,
            corpus: Some(PathBuf::from(
                "O-Ster dataset/original_dataset/open_stereotypes_corpus.csv",
            )),
            output_dir: PathBuf::from("analysis_output"),
        }
    }
}

/// Top-level analysis configuration.
#[derive(Clone, Debug, Default)]
pub struct AnalysisConfig {
    /// Extraction markers.
    pub extractor: ExtractorConfig,
    /// File locations.
    pub paths: AnalysisPaths,
    /// Corpus column joined onto disagreement exports (`tweet` when unset).
    pub corpus_text_column: Option<ColumnName>,
}

impl AnalysisConfig {
    /// Run identifiers in run order (`run_1`, `run_2`, ...).
    pub fn run_ids(&self) -> Vec<RunId> {
        run_ids(self.paths.parsed_runs.len())
    }

    /// Corpus text column, falling back to the default.
    pub fn corpus_text_column(&self) -> &str {
        self.corpus_text_column.as_deref().unwrap_or(CORPUS_TEXT)
    }

    /// Reject path lists that cannot be paired run by run.
    pub fn validate(&self) -> Result<(), ConsensusError> {
        let runs = self.paths.parsed_runs.len();
        let classifications = self.paths.classifications.len();
        if classifications != 0 && classifications != runs {
            return Err(ConsensusError::Configuration(format!(
                "{classifications} classification files given for {runs} runs; counts must match"
            )));
        }
        Ok(())
    }
}

/// Canonical run identifiers for `count` runs.
pub fn run_ids(count: usize) -> Vec<RunId> {
    (1..=count).map(|n| format!("run_{n}")).collect()
}
