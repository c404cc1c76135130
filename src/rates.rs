//! Extraction-failure and coverage rates.

use serde::Serialize;
use tracing::{info, warn};

use crate::constants::reports::HALLUCINATION_ROUND_DIGITS;
use crate::data::RunRecords;
use crate::errors::ConsensusError;
use crate::types::RunId;

/// Hallucination rate of one run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunRate {
    pub run: RunId,
    pub records: usize,
    pub rate: f64,
}

/// Hallucination rates across runs.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HallucinationReport {
    pub total_items: usize,
    pub per_run: Vec<RunRate>,
    /// Unrounded mean of the per-run rates.
    pub mean: f64,
    /// `round(mean, 4) * 100` followed by `%`.
    pub display: String,
}

/// `1 - records / total_items`, clamped to `[0, 1]`.
pub fn hallucination_rate(records: usize, total_items: usize) -> Result<f64, ConsensusError> {
    if total_items == 0 {
        return Err(ConsensusError::Configuration(
            "total input items must be greater than zero".to_string(),
        ));
    }
    let rate = 1.0 - records as f64 / total_items as f64;
    Ok(rate.clamp(0.0, 1.0))
}

/// Per-run hallucination rates and their mean.
pub fn hallucination_rates(
    runs: &[RunRecords],
    total_items: usize,
) -> Result<HallucinationReport, ConsensusError> {
    if runs.is_empty() {
        return Err(ConsensusError::Configuration(
            "hallucination rate requires at least one run".to_string(),
        ));
    }
    let mut per_run = Vec::with_capacity(runs.len());
    for run in runs {
        if run.len() > total_items {
            warn!(
                "[consensus:rates] run '{}' has {} records for {} input items; rate clamped to 0",
                run.run,
                run.len(),
                total_items
            );
        }
        let rate = hallucination_rate(run.len(), total_items)?;
        info!("[consensus:rates] run '{}' hallucination rate {:.4}", run.run, rate);
        per_run.push(RunRate {
            run: run.run.clone(),
            records: run.len(),
            rate,
        });
    }
    let mean = per_run.iter().map(|entry| entry.rate).sum::<f64>() / per_run.len() as f64;
    Ok(HallucinationReport {
        total_items,
        per_run,
        mean,
        display: format_percentage(mean),
    })
}

/// Share of input items present in every run, as a percentage.
pub fn coverage(joined: usize, total_items: usize) -> Result<f64, ConsensusError> {
    if total_items == 0 {
        return Err(ConsensusError::Configuration(
            "total input items must be greater than zero".to_string(),
        ));
    }
    if joined == 0 {
        warn!("[consensus:rates] consensus join is empty; coverage is 0%");
        return Ok(0.0);
    }
    Ok((joined as f64 / total_items as f64 * 100.0).min(100.0))
}

/// Round to four fractional digits, scale to a percentage, append `%`.
///
/// Rounding goes through decimal formatting so it applies to the exact
/// binary value (`0.33335` is stored just below the midpoint).
pub fn format_percentage(fraction: f64) -> String {
    let rounded = format!("{fraction:.HALLUCINATION_ROUND_DIGITS$}")
        .parse::<f64>()
        .unwrap_or(fraction);
    format!("{:?}%", rounded * 100.0)
}
