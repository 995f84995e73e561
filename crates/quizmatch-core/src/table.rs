//! Delimited tabular artifacts: question bank, wide table, mapping, graded table.
//!
//! Headers are written in a fixed order so downstream tools can rely on them.

use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::PipelineError;
use crate::model::{GradedAnswer, MappingRow, OptionLabel, QuestionResponse, WideQuestion};
use crate::pivot::OptionSchema;

/// Serialize rows as CSV with a header derived from `T`'s field order.
pub fn write_rows<T: Serialize, W: Write>(writer: W, rows: &[T]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row).context("failed to serialize row")?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Deserialize CSV rows into `T`.
pub fn read_rows<T: DeserializeOwned, R: Read>(reader: R) -> Result<Vec<T>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    csv_reader
        .deserialize()
        .enumerate()
        .map(|(i, row)| row.with_context(|| format!("invalid row {}", i + 2)))
        .collect()
}

fn create(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::File::create(path).with_context(|| format!("failed to create {}", path.display()))
}

fn open(path: &Path) -> Result<std::fs::File> {
    std::fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))
}

pub fn write_question_bank(path: &Path, rows: &[QuestionResponse]) -> Result<()> {
    write_rows(create(path)?, rows)
        .with_context(|| format!("failed to write question bank to {}", path.display()))
}

pub fn read_question_bank(path: &Path) -> Result<Vec<QuestionResponse>> {
    read_rows(open(path)?)
        .with_context(|| format!("failed to read question bank from {}", path.display()))
}

pub fn write_mapping(path: &Path, rows: &[MappingRow]) -> Result<()> {
    write_rows(create(path)?, rows)
        .with_context(|| format!("failed to write mapping to {}", path.display()))
}

pub fn write_graded(path: &Path, rows: &[GradedAnswer]) -> Result<()> {
    write_rows(create(path)?, rows)
        .with_context(|| format!("failed to write graded table to {}", path.display()))
}

pub fn read_graded(path: &Path) -> Result<Vec<GradedAnswer>> {
    read_rows(open(path)?)
        .with_context(|| format!("failed to read graded table from {}", path.display()))
}

/// Header of the wide table for a schema:
/// `question_id,question_text,option_A..option_N,correct_label`.
pub fn wide_header(schema: &OptionSchema) -> Vec<String> {
    let mut header = vec!["question_id".to_string(), "question_text".to_string()];
    header.extend(schema.labels().map(|l| format!("option_{l}")));
    header.push("correct_label".to_string());
    header
}

pub fn write_wide_table<W: Write>(
    writer: W,
    questions: &[WideQuestion],
    schema: &OptionSchema,
) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(wide_header(schema))?;
    for q in questions {
        let mut record = vec![q.question_id.clone(), q.question_text.clone()];
        record.extend(
            (0..schema.option_count).map(|i| q.options.get(i).cloned().unwrap_or_default()),
        );
        record.push(q.correct_label.to_string());
        csv_writer.write_record(&record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Read a wide table. Option columns are discovered from the header, so a
/// table written with any schema reads back with its own option count.
pub fn read_wide_table<R: Read>(reader: R) -> Result<Vec<WideQuestion>> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let column = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| {
                PipelineError::MissingColumn {
                    artifact: "wide table".into(),
                    column: name.into(),
                }
                .into()
            })
    };
    let id_col = column("question_id")?;
    let text_col = column("question_text")?;
    let label_col = column("correct_label")?;

    let mut option_cols: Vec<(OptionLabel, usize)> = headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| {
            let label = h.trim().strip_prefix("option_")?.parse().ok()?;
            Some((label, i))
        })
        .collect();
    option_cols.sort();
    let option_count = option_cols.last().map_or(0, |(label, _)| label.index() + 1);

    let mut questions = Vec::new();
    for (i, record) in csv_reader.records().enumerate() {
        let record = record.with_context(|| format!("invalid wide table row {}", i + 2))?;
        let cell = |c: usize| record.get(c).unwrap_or("").trim().to_string();
        let correct_label: OptionLabel = cell(label_col)
            .parse()
            .map_err(|e: String| anyhow::anyhow!("row {}: {e}", i + 2))?;
        // Options sit at their letter's position; missing letters stay empty.
        let mut options = vec![String::new(); option_count];
        for (label, c) in &option_cols {
            options[label.index()] = cell(*c);
        }
        questions.push(WideQuestion {
            question_id: cell(id_col),
            question_text: cell(text_col),
            options,
            correct_label,
        });
    }
    Ok(questions)
}

pub fn write_wide_questions(
    path: &Path,
    questions: &[WideQuestion],
    schema: &OptionSchema,
) -> Result<()> {
    write_wide_table(create(path)?, questions, schema)
        .with_context(|| format!("failed to write wide table to {}", path.display()))
}

pub fn read_wide_questions(path: &Path) -> Result<Vec<WideQuestion>> {
    read_wide_table(open(path)?)
        .with_context(|| format!("failed to read wide table from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GradeStatus;

    fn sample_question() -> WideQuestion {
        WideQuestion {
            question_id: "q1".into(),
            question_text: "Pick, \"carefully\"".into(),
            options: vec!["a".into(), "b".into(), "c".into(), String::new()],
            correct_label: "C".parse().unwrap(),
        }
    }

    #[test]
    fn question_bank_header_and_flags() {
        let rows = vec![
            QuestionResponse::stem("q1", "Stem"),
            QuestionResponse::response("q1", "r1", "yes", true),
            QuestionResponse::response("q1", "r2", "no", false),
        ];
        let mut buf = Vec::new();
        write_rows(&mut buf, &rows).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("question_id,response_id,text,is_correct"));
        assert_eq!(lines.next(), Some("q1,,Stem,0"));
        assert_eq!(lines.next(), Some("q1,r1,yes,1"));

        let back: Vec<QuestionResponse> = read_rows(buf.as_slice()).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn wide_table_header_is_stable() {
        let mut buf = Vec::new();
        write_wide_table(&mut buf, &[sample_question()], &OptionSchema::default()).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with(
            "question_id,question_text,option_A,option_B,option_C,option_D,correct_label\n"
        ));

        let back = read_wide_table(buf.as_slice()).unwrap();
        assert_eq!(back, vec![sample_question()]);
    }

    #[test]
    fn wide_table_options_follow_header_letters() {
        let text = "question_id,question_text,option_A,option_C,correct_label\nq1,Pick,yes,maybe,C\n";
        let back = read_wide_table(text.as_bytes()).unwrap();
        assert_eq!(back[0].options, vec!["yes", "", "maybe"]);
        assert_eq!(back[0].correct_text(), Some("maybe"));
    }

    #[test]
    fn wide_table_requires_columns() {
        let err = read_wide_table("question_id,option_A\nq1,a\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("question_text"));
    }

    #[test]
    fn graded_table_columns() {
        let rows = vec![GradedAnswer {
            student_id: "s1".into(),
            question_id: None,
            selected_label: None,
            is_correct: None,
            status: GradeStatus::NoMatch,
            match_score: 0.42,
            reference: "Q?".into(),
            student_name: "Ann".into(),
            section: Some("Period 2".into()),
            reported_score: None,
        }];
        let mut buf = Vec::new();
        write_rows(&mut buf, &rows).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("student_id,question_id,selected_label,is_correct,status,match_score,reference,student_name,section,reported_score")
        );
        assert_eq!(lines.next(), Some("s1,,,,ungraded: no match,0.42,Q?,Ann,Period 2,"));

        let back: Vec<GradedAnswer> = read_rows(buf.as_slice()).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn files_are_written_under_missing_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/questions_wide.csv");
        write_wide_questions(&path, &[sample_question()], &OptionSchema::default()).unwrap();
        let back = read_wide_questions(&path).unwrap();
        assert_eq!(back[0].correct_label.to_string(), "C");
    }
}
