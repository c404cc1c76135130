use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, error::ErrorKind};
use tracing::warn;

use crate::config::{AnalysisConfig, AnalysisPaths, ExtractorConfig};
use crate::constants::reports::{ALL_DIFFERENT_FILE, CONSENSUS_FILE, REPORT_FILE};
use crate::data::{PresentationRecord, RunOutput, RunRecords};
use crate::extract::OptionExtractor;
use crate::metrics::LabelTally;
use crate::records::{build_all_runs, build_run_records};
use crate::report::{Analysis, analyze, write_report};
use crate::transport::csv::{
    count_rows, read_corpus_texts, read_parsed_run, read_presentations, read_run_outputs,
    write_consensus, write_parsed_run,
};
use crate::types::RunId;
use crate::winner::presentations_from_outputs;
use crate::{AgreementState, SourceTag};

#[derive(Debug, Parser)]
#[command(
    name = "parse_run",
    disable_help_subcommand = true,
    about = "Extract chosen options from one run's raw outputs",
    long_about = "Read a run output file, extract the chosen candidate from each generated text, drop unmatched rows and duplicates, and write the parsed run file."
)]
struct ParseRunCli {
    #[arg(long, value_name = "PATH", help = "Run output CSV (id, output, 05, 01, 02)")]
    input: PathBuf,
    #[arg(long, value_name = "PATH", help = "Parsed run CSV to write")]
    output: PathBuf,
    #[arg(long, default_value = "run_1", help = "Run identifier used in logs")]
    run: RunId,
    #[arg(
        long = "output-marker",
        help = "Marker delimiting the answer (defaults to 'Output')"
    )]
    output_marker: Option<String>,
}

#[derive(Debug, Parser)]
#[command(
    name = "analyze_runs",
    disable_help_subcommand = true,
    about = "Reconcile parsed runs and report reliability statistics",
    long_about = "Join the parsed runs on item identity, classify agreement, and report hallucination rate, coverage, agreement tallies, winner positions, and source distributions.",
    after_help = "Paths default to the experiment directory layout when no --run flags are given."
)]
/// CLI for `analyze_runs`.
///
/// Common usage:
/// - Default layout: `analyze_runs`
/// - Explicit runs: `--run a.csv --run b.csv --run c.csv --input-items items.csv`
/// - Extract straight from raw outputs: `--raw-runs --run classifications_1.csv ...`
struct AnalyzeRunsCli {
    #[arg(long = "input-items", value_name = "PATH", help = "CSV whose row count is the number of input items")]
    input_items: Option<PathBuf>,
    #[arg(long = "run", value_name = "PATH", help = "Run file, repeat in run order")]
    runs: Vec<PathBuf>,
    #[arg(
        long = "raw-runs",
        help = "Treat --run files as raw run outputs and extract them here"
    )]
    raw_runs: bool,
    #[arg(
        long = "classification",
        value_name = "PATH",
        help = "Raw run output used to recover presentation order, repeat in run order"
    )]
    classifications: Vec<PathBuf>,
    #[arg(
        long,
        value_name = "PATH",
        help = "Presentation-order CSV (id, run, first_option, second_option, third_option)"
    )]
    presentations: Option<PathBuf>,
    #[arg(long, value_name = "PATH", help = "Corpus CSV joined onto the disagreement export")]
    corpus: Option<PathBuf>,
    #[arg(long = "corpus-text-column", help = "Corpus column holding item text")]
    corpus_text_column: Option<String>,
    #[arg(long = "output-dir", value_name = "DIR", help = "Directory for exports and report.json")]
    output_dir: Option<PathBuf>,
    #[arg(long = "output-marker", help = "Marker delimiting the answer in raw outputs")]
    output_marker: Option<String>,
}

impl AnalyzeRunsCli {
    fn into_config(self) -> (AnalysisConfig, bool) {
        let defaults = AnalysisPaths::default();
        let explicit_runs = !self.runs.is_empty();
        let paths = AnalysisPaths {
            input_items: self.input_items.unwrap_or(defaults.input_items),
            parsed_runs: if explicit_runs {
                self.runs
            } else {
                defaults.parsed_runs
            },
            classifications: if !self.classifications.is_empty() {
                self.classifications
            } else if explicit_runs {
                Vec::new()
            } else {
                defaults.classifications
            },
            presentations: self.presentations,
            corpus: self
                .corpus
                .or_else(|| defaults.corpus.filter(|path| path.exists())),
            output_dir: self.output_dir.unwrap_or(defaults.output_dir),
        };
        let mut extractor = ExtractorConfig::default();
        if let Some(marker) = self.output_marker {
            extractor.output_marker = marker;
        }
        let config = AnalysisConfig {
            extractor,
            paths,
            corpus_text_column: self.corpus_text_column,
        };
        (config, self.raw_runs)
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Parse one raw run file and persist its matched records.
pub fn run_parse_run<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    init_tracing();

    let Some(cli) =
        parse_cli::<ParseRunCli, _>(std::iter::once("parse_run".to_string()).chain(args_iter))?
    else {
        return Ok(());
    };

    let mut config = ExtractorConfig::default();
    if let Some(marker) = cli.output_marker {
        config.output_marker = marker;
    }
    let extractor = OptionExtractor::new(config);
    let outputs = read_run_outputs(&cli.input, &cli.run)?;
    let built = build_run_records(cli.run.clone(), &outputs, &extractor)?;
    write_parsed_run(&cli.output, &built)?;

    println!("=== parsed run '{}' ===", built.run);
    println!("rows read:        {}", built.total_rows);
    println!("matched records:  {}", built.len());
    println!("unmatched rows:   {}", built.unmatched);
    println!("duplicate rows:   {}", built.duplicates);
    if built.ambiguous > 0 {
        println!("ambiguous sets:   {}", built.ambiguous);
    }
    println!("written to {}", cli.output.display());
    Ok(())
}

/// Join runs, compute every statistic, and write exports plus the JSON report.
pub fn run_analyze_runs<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    init_tracing();

    let Some(cli) = parse_cli::<AnalyzeRunsCli, _>(
        std::iter::once("analyze_runs".to_string()).chain(args_iter),
    )?
    else {
        return Ok(());
    };
    let (config, raw_runs) = cli.into_config();
    config.validate()?;
    let extractor = OptionExtractor::new(config.extractor.clone());
    let ids = config.run_ids();

    let total_items = count_rows(&config.paths.input_items)?;

    let mut raw_outputs: Vec<(RunId, Vec<RunOutput>)> = Vec::new();
    let runs: Vec<RunRecords> = if raw_runs {
        for (run, path) in ids.iter().zip(&config.paths.parsed_runs) {
            raw_outputs.push((run.clone(), read_run_outputs(path, run)?));
        }
        build_all_runs(&raw_outputs, &extractor)?
    } else {
        ids.iter()
            .zip(&config.paths.parsed_runs)
            .map(|(run, path)| read_parsed_run(path, run))
            .collect::<Result<_, _>>()?
    };

    let presentations = load_presentations(&config, &ids, &raw_outputs, &extractor)?;
    let analysis = analyze(&runs, total_items, &presentations)?;

    let output_dir = &config.paths.output_dir;
    write_consensus(&output_dir.join(CONSENSUS_FILE), &analysis.joined, &ids, None)?;
    let texts = match &config.paths.corpus {
        Some(path) => Some(read_corpus_texts(path, config.corpus_text_column())?),
        None => None,
    };
    write_consensus(
        &output_dir.join(ALL_DIFFERENT_FILE),
        &analysis.all_different(),
        &ids,
        texts
            .as_ref()
            .map(|texts| (config.corpus_text_column(), texts)),
    )?;
    write_report(&output_dir.join(REPORT_FILE), &analysis.report)?;

    print_summary(&analysis);
    println!();
    println!("Results saved to: {}", output_dir.display());
    Ok(())
}

fn load_presentations(
    config: &AnalysisConfig,
    ids: &[RunId],
    raw_outputs: &[(RunId, Vec<RunOutput>)],
    extractor: &OptionExtractor,
) -> Result<Vec<PresentationRecord>, Box<dyn Error>> {
    if let Some(path) = &config.paths.presentations {
        return Ok(read_presentations(path)?);
    }
    let mut presentations = Vec::new();
    if !config.paths.classifications.is_empty() {
        for (run, path) in ids.iter().zip(&config.paths.classifications) {
            let outputs = read_run_outputs(path, run)?;
            presentations.extend(presentations_from_outputs(run, &outputs, extractor));
        }
    } else if !raw_outputs.is_empty() {
        for (run, outputs) in raw_outputs {
            presentations.extend(presentations_from_outputs(run, outputs, extractor));
        }
    } else {
        warn!(
            "[consensus:app] no presentation source configured; every winner lookup will report no_match"
        );
    }
    Ok(presentations)
}

fn print_summary(analysis: &Analysis) {
    let report = &analysis.report;

    println!("=== hallucination ===");
    for entry in &report.hallucination.per_run {
        println!("  {} => {:.4}", entry.run, entry.rate);
    }
    println!("  average hallucination rate: {}", report.hallucination.display);
    println!("  coverage for analysis: {:.2}%", report.coverage);
    println!();

    println!("=== agreement ===");
    for state in AgreementState::ALL {
        println!(
            "  {}: {}",
            state,
            report.agreement_counts.get(&state).copied().unwrap_or(0)
        );
    }
    println!();
    println!("[ALL AGREE]");
    for entry in &report.agreement {
        print_tally(&entry.run, &entry.tally);
    }
    println!("[DISAGREE]");
    for entry in &report.disagreement {
        print_tally(&entry.run, &entry.tally);
    }
    println!();

    println!("=== winner positions (all different) ===");
    for entry in &report.winners.per_run {
        println!(
            "  {} => first={}, second={}, third={}, no_match={}",
            entry.run,
            entry.tally.first,
            entry.tally.second,
            entry.tally.third,
            entry.tally.no_match
        );
    }
    println!();

    println!("=== source vs. run distributions (total variation) ===");
    for paired in &report.distributions {
        let distance = paired
            .total_variation
            .map(|value| format!("{value:.4}"))
            .unwrap_or_else(|| "undefined".to_string());
        println!(
            "  {} / {} => {} (kept={}, dropped={})",
            paired.run, paired.tag, distance, paired.predicted_kept, paired.predicted_dropped
        );
    }
}

fn print_tally(run: &str, tally: &LabelTally<SourceTag>) {
    let parts: Vec<String> = tally
        .per_label
        .iter()
        .map(|entry| format!("{}={} ({:.2}%)", entry.label, entry.count, entry.share * 100.0))
        .collect();
    println!("  {} => {}", run, parts.join(", "));
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::run_ids;

    #[test]
    fn analyze_cli_defaults_to_experiment_layout() {
        let cli = AnalyzeRunsCli::try_parse_from(["analyze_runs"]).unwrap();
        let (config, raw) = cli.into_config();
        assert!(!raw);
        assert_eq!(config.paths.parsed_runs.len(), 3);
        assert_eq!(config.paths.classifications.len(), 3);
        assert_eq!(config.run_ids(), run_ids(3));
    }

    #[test]
    fn explicit_runs_drop_default_classifications() {
        let cli = AnalyzeRunsCli::try_parse_from([
            "analyze_runs",
            "--run",
            "a.csv",
            "--run",
            "b.csv",
            "--output-marker",
            "Risposta:",
        ])
        .unwrap();
        let (config, _) = cli.into_config();
        assert_eq!(
            config.paths.parsed_runs,
            vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")]
        );
        assert!(config.paths.classifications.is_empty());
        assert_eq!(config.extractor.output_marker, "Risposta:");
        assert_eq!(config.run_ids(), vec!["run_1", "run_2"]);
    }

    #[test]
    fn help_is_not_an_error() {
        let parsed = parse_cli::<ParseRunCli, _>(["parse_run", "--help"]).unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn missing_required_flags_are_errors() {
        assert!(parse_cli::<ParseRunCli, _>(["parse_run"]).is_err());
        assert!(parse_cli::<ParseRunCli, _>(["parse_run", "--input", "a.csv"]).is_err());
    }
}
