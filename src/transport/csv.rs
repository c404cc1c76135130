use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::{Deserialize, Serialize};

use crate::constants::columns::{
    AGREEMENT, ID, LABEL, OUTPUT, PARSED_OUTPUT, PRESENTED, RUN, TAG_A, TAG_B, TAG_C,
};
use crate::data::{
    CandidateSet, ConsensusRecord, PresentationRecord, RunOutput, RunRecord, RunRecords, SourceTag,
};
use crate::errors::ConsensusError;
use crate::types::{ItemId, RunId};

#[derive(Debug, Deserialize)]
struct RunOutputRow {
    id: String,
    output: String,
    #[serde(rename = "05")]
    tag_a: String,
    #[serde(rename = "01")]
    tag_b: String,
    #[serde(rename = "02")]
    tag_c: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ParsedRunRow {
    id: String,
    #[serde(rename = "05")]
    tag_a: String,
    #[serde(rename = "01")]
    tag_b: String,
    #[serde(rename = "02")]
    tag_c: String,
    #[serde(default)]
    parsed_output: String,
    #[serde(default)]
    label: String,
}

#[derive(Debug, Deserialize)]
struct PresentationRow {
    id: String,
    run: String,
    first_option: String,
    second_option: String,
    third_option: String,
}

fn open_run_reader(path: &Path, run: &RunId) -> Result<csv::Reader<File>, ConsensusError> {
    let file = File::open(path).map_err(|err| ConsensusError::RunUnavailable {
        run: run.clone(),
        reason: format!("failed opening {}: {err}", path.display()),
    })?;
    Ok(ReaderBuilder::new().flexible(true).from_reader(file))
}

fn open_reader(path: &Path) -> Result<csv::Reader<File>, ConsensusError> {
    let file = File::open(path).map_err(|err| {
        io::Error::new(
            err.kind(),
            format!("failed opening {}: {err}", path.display()),
        )
    })?;
    Ok(ReaderBuilder::new().flexible(true).from_reader(file))
}

fn require_columns(
    headers: &StringRecord,
    path: &Path,
    required: &[&str],
) -> Result<(), ConsensusError> {
    for column in required {
        if !headers.iter().any(|header| header == *column) {
            return Err(ConsensusError::MissingColumn {
                path: path.to_path_buf(),
                column: (*column).to_string(),
            });
        }
    }
    Ok(())
}

fn malformed(path: &Path, err: csv::Error) -> ConsensusError {
    let line = err.position().map(|pos| pos.line()).unwrap_or(0);
    ConsensusError::MalformedRow {
        path: path.to_path_buf(),
        line,
        details: err.to_string(),
    }
}

/// Read the raw outputs of one run (`id`, `output`, `05`, `01`, `02`; extra columns ignored).
pub fn read_run_outputs(path: &Path, run: &RunId) -> Result<Vec<RunOutput>, ConsensusError> {
    let mut reader = open_run_reader(path, run)?;
    let headers = reader.headers()?.clone();
    require_columns(&headers, path, &[ID, OUTPUT, TAG_A, TAG_B, TAG_C])?;

    let mut outputs = Vec::new();
    for row in reader.deserialize::<RunOutputRow>() {
        let row = row.map_err(|err| malformed(path, err))?;
        outputs.push(RunOutput {
            id: row.id,
            candidates: CandidateSet::new(row.tag_a, row.tag_b, row.tag_c),
            raw_text: row.output,
        });
    }
    Ok(outputs)
}

/// Persist matched records of one run (`id`, `05`, `01`, `02`, `parsed_output`, `label`).
pub fn write_parsed_run(path: &Path, run: &RunRecords) -> Result<(), ConsensusError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let mut writer = WriterBuilder::new().from_path(path)?;
    for record in &run.records {
        writer.serialize(ParsedRunRow {
            id: record.id.clone(),
            tag_a: record.candidates.phrase(SourceTag::A).to_string(),
            tag_b: record.candidates.phrase(SourceTag::B).to_string(),
            tag_c: record.candidates.phrase(SourceTag::C).to_string(),
            parsed_output: record.matched_phrase().to_string(),
            label: record.label.label().to_string(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Load a persisted parsed run back into records.
///
/// Each row's `label` must name the source whose phrase equals
/// `parsed_output`; anything else is a classification fault. Rows with an
/// empty `parsed_output` are counted as unmatched.
pub fn read_parsed_run(path: &Path, run: &RunId) -> Result<RunRecords, ConsensusError> {
    let mut reader = open_run_reader(path, run)?;
    let headers = reader.headers()?.clone();
    require_columns(&headers, path, &[ID, TAG_A, TAG_B, TAG_C, PARSED_OUTPUT, LABEL])?;

    let mut seen: HashSet<(ItemId, CandidateSet)> = HashSet::new();
    let mut records = Vec::new();
    let mut total_rows = 0usize;
    let mut unmatched = 0usize;
    let mut duplicates = 0usize;
    let mut ambiguous = 0usize;
    for row in reader.deserialize::<ParsedRunRow>() {
        let row = row.map_err(|err| malformed(path, err))?;
        total_rows += 1;
        if row.parsed_output.is_empty() {
            unmatched += 1;
            continue;
        }
        let candidates = CandidateSet::new(row.tag_a, row.tag_b, row.tag_c);
        let label = SourceTag::from_label(&row.label)
            .filter(|tag| candidates.phrase(*tag) == row.parsed_output)
            .ok_or_else(|| ConsensusError::ClassificationFault {
                run: run.clone(),
                id: row.id.clone(),
                phrase: row.parsed_output.clone(),
            })?;
        if !seen.insert((row.id.clone(), candidates.clone())) {
            duplicates += 1;
            continue;
        }
        if candidates.has_duplicate_phrases() {
            ambiguous += 1;
        }
        records.push(RunRecord {
            id: row.id,
            candidates,
            label,
        });
    }
    Ok(RunRecords {
        run: run.clone(),
        total_rows,
        records,
        unmatched,
        duplicates,
        ambiguous,
    })
}

/// Number of data rows in a CSV file (the header row is not counted).
pub fn count_rows(path: &Path) -> Result<usize, ConsensusError> {
    let mut reader = open_reader(path)?;
    let mut count = 0usize;
    for record in reader.records() {
        record.map_err(|err| malformed(path, err))?;
        count += 1;
    }
    Ok(count)
}

/// Read side-channel presentation records
/// (`id`, `run`, `first_option`, `second_option`, `third_option`).
pub fn read_presentations(path: &Path) -> Result<Vec<PresentationRecord>, ConsensusError> {
    let mut reader = open_reader(path)?;
    let headers = reader.headers()?.clone();
    let mut required = vec![ID, RUN];
    required.extend(PRESENTED);
    require_columns(&headers, path, &required)?;

    let mut presentations = Vec::new();
    for row in reader.deserialize::<PresentationRow>() {
        let row = row.map_err(|err| malformed(path, err))?;
        presentations.push(PresentationRecord {
            id: row.id,
            run: row.run,
            options: [row.first_option, row.second_option, row.third_option],
        });
    }
    Ok(presentations)
}

/// Map item id to corpus text, first occurrence wins.
pub fn read_corpus_texts(
    path: &Path,
    text_column: &str,
) -> Result<HashMap<ItemId, String>, ConsensusError> {
    let mut reader = open_reader(path)?;
    let headers = reader.headers()?.clone();
    require_columns(&headers, path, &[ID, text_column])?;
    let id_idx = headers.iter().position(|header| header == ID).unwrap_or(0);
    let text_idx = headers
        .iter()
        .position(|header| header == text_column)
        .unwrap_or(0);

    let mut texts = HashMap::new();
    for record in reader.records() {
        let record = record.map_err(|err| malformed(path, err))?;
        let (Some(id), Some(text)) = (record.get(id_idx), record.get(text_idx)) else {
            continue;
        };
        texts
            .entry(id.to_string())
            .or_insert_with(|| text.to_string());
    }
    Ok(texts)
}

/// Write the consensus join: candidates, per-run phrase and label, agreement,
/// plus the corpus text column when `texts` is given.
pub fn write_consensus(
    path: &Path,
    records: &[ConsensusRecord],
    run_ids: &[RunId],
    texts: Option<(&str, &HashMap<ItemId, String>)>,
) -> Result<(), ConsensusError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let mut writer = WriterBuilder::new().from_path(path)?;

    let mut header: Vec<String> = vec![ID.into(), TAG_A.into(), TAG_B.into(), TAG_C.into()];
    for (idx, _) in run_ids.iter().enumerate() {
        header.push(format!("parsed_run_{}", idx + 1));
    }
    for (idx, _) in run_ids.iter().enumerate() {
        header.push(format!("label_run_{}", idx + 1));
    }
    header.push(AGREEMENT.into());
    if let Some((column, _)) = texts {
        header.push(column.to_string());
    }
    writer.write_record(&header)?;

    for record in records {
        let mut row: Vec<String> = vec![record.id.clone()];
        row.extend(record.candidates.iter().map(|(_, phrase)| phrase.to_string()));
        for idx in 0..run_ids.len() {
            row.push(record.phrase(idx).unwrap_or_default().to_string());
        }
        for idx in 0..run_ids.len() {
            row.push(
                record
                    .labels
                    .get(idx)
                    .map(|tag| tag.label().to_string())
                    .unwrap_or_default(),
            );
        }
        row.push(record.agreement.as_str().to_string());
        if let Some((_, texts)) = texts {
            row.push(texts.get(&record.id).cloned().unwrap_or_default());
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::AgreementState;
    use tempfile::tempdir;

    #[test]
    fn reads_run_outputs_and_ignores_extra_columns() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("classifications_1.csv");
        fs::write(
            &path,
            "id,span,output,05,01,02\n7,chunk,\"Output: ['Sono subdoli']\",Sono una minaccia,Sono subdoli,Sono pericolosi\n",
        )
        .unwrap();
        let outputs = read_run_outputs(&path, &"run_1".to_string()).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].id, "7");
        assert_eq!(outputs[0].candidates.phrase(SourceTag::B), "Sono subdoli");
        assert_eq!(outputs[0].raw_text, "Output: ['Sono subdoli']");
    }

    #[test]
    fn missing_column_is_fatal() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("broken.csv");
        fs::write(&path, "id,output,05,01\n1,x,a,b\n").unwrap();
        let err = read_run_outputs(&path, &"run_1".to_string()).unwrap_err();
        assert!(matches!(err, ConsensusError::MissingColumn { ref column, .. } if column == "02"));
    }

    #[test]
    fn missing_file_reports_unavailable_run() {
        let temp = tempdir().unwrap();
        let err = read_run_outputs(&temp.path().join("absent.csv"), &"run_2".to_string())
            .unwrap_err();
        assert!(matches!(err, ConsensusError::RunUnavailable { ref run, .. } if run == "run_2"));
    }

    #[test]
    fn parsed_run_survives_write_and_read() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("parsed").join("parsed_output_1.csv");
        let candidates = CandidateSet::new("Sono una minaccia", "Sono subdoli", "Rovinano l'Italia, ormai");
        let run = RunRecords {
            run: "run_1".into(),
            total_rows: 2,
            records: vec![
                RunRecord {
                    id: "1".into(),
                    candidates: candidates.clone(),
                    label: SourceTag::C,
                },
                RunRecord {
                    id: "2".into(),
                    candidates,
                    label: SourceTag::A,
                },
            ],
            unmatched: 0,
            duplicates: 0,
            ambiguous: 0,
        };
        write_parsed_run(&path, &run).unwrap();
        let loaded = read_parsed_run(&path, &"run_1".to_string()).unwrap();
        assert_eq!(loaded.records, run.records);
        assert_eq!(loaded.total_rows, 2);
    }

    #[test]
    fn mislabeled_parsed_row_is_a_classification_fault() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("parsed_output_1.csv");
        fs::write(
            &path,
            "id,05,01,02,parsed_output,label\n4,Sono una minaccia,Sono subdoli,Sono pericolosi,Sono subdoli,ann02\n",
        )
        .unwrap();
        let err = read_parsed_run(&path, &"run_1".to_string()).unwrap_err();
        assert!(matches!(
            err,
            ConsensusError::ClassificationFault { ref id, ref phrase, .. } if id == "4" && phrase == "Sono subdoli"
        ));
    }

    #[test]
    fn counts_rows_and_reads_presentations() {
        let temp = tempdir().unwrap();
        let items = temp.path().join("items.csv");
        fs::write(&items, "id,tweet\n1,a\n2,b\n3,c\n").unwrap();
        assert_eq!(count_rows(&items).unwrap(), 3);

        let presented = temp.path().join("presented.csv");
        fs::write(
            &presented,
            "id,run,first_option,second_option,third_option\n1,run_1,x,y,z\n",
        )
        .unwrap();
        let records = read_presentations(&presented).unwrap();
        assert_eq!(records[0].options[1], "y");
        assert_eq!(records[0].run, "run_1");

        let texts = read_corpus_texts(&items, "tweet").unwrap();
        assert_eq!(texts["2"], "b");
    }

    #[test]
    fn writes_consensus_with_corpus_text() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("out").join("all_different_labels.csv");
        let record = ConsensusRecord {
            id: "7".into(),
            candidates: CandidateSet::new("a", "b", "c"),
            labels: vec![SourceTag::B, SourceTag::C, SourceTag::A],
            agreement: AgreementState::AllDifferent,
        };
        let runs: Vec<RunId> = vec!["run_1".into(), "run_2".into(), "run_3".into()];
        let texts: HashMap<ItemId, String> = [("7".to_string(), "testo".to_string())].into();
        write_consensus(&path, &[record], &runs, Some(("tweet", &texts))).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        let mut lines = written.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,05,01,02,parsed_run_1,parsed_run_2,parsed_run_3,label_run_1,label_run_2,label_run_3,agreement,tweet"
        );
        assert_eq!(
            lines.next().unwrap(),
            "7,a,b,c,b,c,a,ann01,ann02,ann05,ALL_DIFFERENT,testo"
        );
    }
}
