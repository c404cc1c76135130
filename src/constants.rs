/// Constants used by option extraction.
pub mod extract {
    /// Marker the generator emits right before its answer.
    pub const OUTPUT_MARKER: &str = "Output";
    /// Marker preceding the options list echoed in the generated prompt.
    pub const OPTIONS_MARKER: &str = "Opzioni:";
    /// Number of options offered per item.
    pub const OPTION_COUNT: usize = 3;
}

/// CSV column names shared by run, parsed, and presentation files.
pub mod columns {
    /// Item identifier column.
    pub const ID: &str = "id";
    /// Raw generated text column in run output files.
    pub const OUTPUT: &str = "output";
    /// Candidate phrase column for source tag A.
    pub const TAG_A: &str = "05";
    /// Candidate phrase column for source tag B.
    pub const TAG_B: &str = "01";
    /// Candidate phrase column for source tag C.
    pub const TAG_C: &str = "02";
    /// Matched phrase column in parsed run files.
    pub const PARSED_OUTPUT: &str = "parsed_output";
    /// Source label column in parsed run files.
    pub const LABEL: &str = "label";
    /// Run identifier column in presentation files.
    pub const RUN: &str = "run";
    /// Presentation-order columns, first to third.
    pub const PRESENTED: [&str; 3] = ["first_option", "second_option", "third_option"];
    /// Agreement state column in consensus exports.
    pub const AGREEMENT: &str = "agreement";
    /// Default corpus text column joined onto disagreement exports.
    pub const CORPUS_TEXT: &str = "tweet";
}

/// Output file names written by the analysis app.
pub mod reports {
    /// Full consensus join export.
    pub const CONSENSUS_FILE: &str = "consensus.csv";
    /// Export of items on which every run picked a different option.
    pub const ALL_DIFFERENT_FILE: &str = "all_different_labels.csv";
    /// JSON statistics report.
    pub const REPORT_FILE: &str = "report.json";
    /// Fractional digits kept before scaling the mean hallucination rate to a percentage.
    pub const HALLUCINATION_ROUND_DIGITS: usize = 4;
}
