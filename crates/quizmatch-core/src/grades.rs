//! Grade source loading.
//!
//! Reads the per-student grade CSV into [`GradeRecord`]s. Two layouts are
//! understood:
//!
//! - **flags**: one column per option, headed `<reference> [<LETTER>]`.
//!   Columns sharing a reference form one question group.
//! - **answers**: the LMS quiz export, where each question column holds the
//!   answer text the student submitted and is followed by a score column.
//!
//! Identity columns (`front_columns`) and trailing summary columns are
//! recognised by name and never treated as questions.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Anomaly, PipelineError, StageOutcome};
use crate::model::{GradeRecord, OptionLabel, QuestionAnswer, Selection};
use crate::pivot::OptionSchema;

static FLAG_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?s)(?P<reference>.*?)\s*\[(?P<label>[A-Za-z])\]\s*$").unwrap());

/// How question columns are laid out in the grade source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeLayout {
    /// Flags if any question header carries a `[X]` suffix, answers otherwise.
    #[default]
    Auto,
    Flags,
    Answers,
}

impl std::str::FromStr for GradeLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(GradeLayout::Auto),
            "flags" => Ok(GradeLayout::Flags),
            "answers" | "text" => Ok(GradeLayout::Answers),
            other => Err(format!("unknown grade layout: {other}")),
        }
    }
}

/// Column conventions of the grade source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeSourceConfig {
    #[serde(default)]
    pub layout: GradeLayout,
    #[serde(default = "default_student_id_column")]
    pub student_id_column: String,
    #[serde(default = "default_student_name_column")]
    pub student_name_column: String,
    #[serde(default = "default_section_column")]
    pub section_column: String,
    #[serde(default = "default_score_column")]
    pub score_column: String,
    #[serde(default = "default_front_columns")]
    pub front_columns: Vec<String>,
    #[serde(default = "default_summary_columns")]
    pub summary_columns: Vec<String>,
}

fn default_student_id_column() -> String {
    "id".to_string()
}
fn default_student_name_column() -> String {
    "name".to_string()
}
fn default_section_column() -> String {
    "section".to_string()
}
fn default_score_column() -> String {
    "score".to_string()
}
fn default_front_columns() -> Vec<String> {
    [
        "name",
        "id",
        "sis_id",
        "section",
        "section_id",
        "section_sis_id",
        "submitted",
        "attempt",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_summary_columns() -> Vec<String> {
    ["n correct", "n incorrect", "score"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for GradeSourceConfig {
    fn default() -> Self {
        Self {
            layout: GradeLayout::Auto,
            student_id_column: default_student_id_column(),
            student_name_column: default_student_name_column(),
            section_column: default_section_column(),
            score_column: default_score_column(),
            front_columns: default_front_columns(),
            summary_columns: default_summary_columns(),
        }
    }
}

/// Whether a flag cell marks the option as selected.
///
/// Empty, `0`, `0.0`, `false`, `no`, and `n` are unselected; anything else is
/// selected.
pub fn is_truthy(cell: &str) -> bool {
    let cell = cell.trim().to_ascii_lowercase();
    if cell.is_empty() {
        return false;
    }
    if let Ok(n) = cell.parse::<f64>() {
        return n != 0.0;
    }
    !matches!(cell.as_str(), "false" | "no" | "n")
}

/// Split a flag header into its question reference and option label.
pub fn parse_flag_header(header: &str) -> Option<(String, OptionLabel)> {
    let caps = FLAG_HEADER.captures(header.trim())?;
    let label = caps["label"].parse().ok()?;
    let reference = caps["reference"].trim().to_string();
    (!reference.is_empty()).then_some((reference, label))
}

#[derive(Debug)]
enum QuestionColumns {
    Flags {
        reference: String,
        columns: Vec<(OptionLabel, usize)>,
    },
    Answer {
        reference: String,
        column: usize,
    },
}

/// Parse grade records from CSV text.
pub fn parse_grade_records<R: Read>(
    reader: R,
    config: &GradeSourceConfig,
    schema: &OptionSchema,
) -> Result<StageOutcome<Vec<GradeRecord>>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .context("failed to read grade source header")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name.trim()))
    };
    let id_col = find(&config.student_id_column).ok_or_else(|| PipelineError::MissingColumn {
        artifact: "grade source".into(),
        column: config.student_id_column.clone(),
    })?;
    let name_col = find(&config.student_name_column);
    let section_col = find(&config.section_column);
    let score_col = find(&config.score_column);

    let is_reserved = |h: &str| {
        let h = h.trim();
        config
            .front_columns
            .iter()
            .chain(config.summary_columns.iter())
            .any(|c| c.trim().eq_ignore_ascii_case(h))
    };
    let middle: Vec<usize> = (0..headers.len())
        .filter(|&i| i != id_col && !is_reserved(&headers[i]))
        .collect();

    let layout = match config.layout {
        GradeLayout::Auto => {
            if middle.iter().any(|&i| parse_flag_header(&headers[i]).is_some()) {
                GradeLayout::Flags
            } else {
                GradeLayout::Answers
            }
        }
        explicit => explicit,
    };

    let mut anomalies = Vec::new();
    let plan = match layout {
        GradeLayout::Flags => plan_flag_columns(&headers, &middle, schema, &mut anomalies),
        _ => plan_answer_columns(&headers, &middle),
    };
    if plan.is_empty() {
        return Err(PipelineError::UnusableGradeSource("no question columns found".into()).into());
    }

    let mut records = Vec::new();
    for (row_index, result) in csv_reader.records().enumerate() {
        let entry = format!("grade row {}", row_index + 2);
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("skipping {entry}: {e}");
                anomalies.push(Anomaly::SkippedEntry {
                    entry,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        let cell = |i: usize| record.get(i).unwrap_or("").trim();

        let student_id = cell(id_col);
        if student_id.is_empty() {
            tracing::warn!("skipping {entry}: missing student id");
            anomalies.push(Anomaly::SkippedEntry {
                entry,
                reason: "missing student id".into(),
            });
            continue;
        }

        let answers = plan
            .iter()
            .map(|q| match q {
                QuestionColumns::Flags { reference, columns } => QuestionAnswer {
                    reference: reference.clone(),
                    selection: Selection::Flags(
                        columns
                            .iter()
                            .filter(|(_, col)| is_truthy(cell(*col)))
                            .map(|(label, _)| *label)
                            .collect(),
                    ),
                },
                QuestionColumns::Answer { reference, column } => QuestionAnswer {
                    reference: reference.clone(),
                    selection: Selection::Text(cell(*column).to_string()),
                },
            })
            .collect();

        let optional = |col: Option<usize>| {
            col.map(cell)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        records.push(GradeRecord {
            student_id: student_id.to_string(),
            student_name: optional(name_col).unwrap_or_default(),
            section: optional(section_col),
            reported_score: optional(score_col),
            answers,
        });
    }

    if records.is_empty() {
        return Err(PipelineError::UnusableGradeSource("no student rows".into()).into());
    }

    tracing::info!(
        students = records.len(),
        questions = plan.len(),
        layout = ?layout,
        "loaded grade source"
    );

    Ok(StageOutcome::new(records, anomalies))
}

/// Read grade records from a CSV file.
pub fn load_grade_records(
    path: &Path,
    config: &GradeSourceConfig,
    schema: &OptionSchema,
) -> Result<StageOutcome<Vec<GradeRecord>>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open grade source: {}", path.display()))?;
    parse_grade_records(file, config, schema)
        .with_context(|| format!("failed to load grade source: {}", path.display()))
}

fn plan_flag_columns(
    headers: &[String],
    middle: &[usize],
    schema: &OptionSchema,
    anomalies: &mut Vec<Anomaly>,
) -> Vec<QuestionColumns> {
    let mut plan: Vec<QuestionColumns> = Vec::new();
    let mut by_reference: HashMap<String, usize> = HashMap::new();

    for &col in middle {
        let header = &headers[col];
        let Some((reference, label)) = parse_flag_header(header) else {
            skip_column(anomalies, header, "not a flag column");
            continue;
        };
        if !schema.contains(label) {
            skip_column(
                anomalies,
                header,
                &format!(
                    "option {label} is outside the {}-option schema",
                    schema.option_count
                ),
            );
            continue;
        }

        let slot = *by_reference.entry(reference.clone()).or_insert_with(|| {
            plan.push(QuestionColumns::Flags {
                reference: reference.clone(),
                columns: Vec::new(),
            });
            plan.len() - 1
        });
        if let QuestionColumns::Flags { columns, .. } = &mut plan[slot] {
            if columns.iter().any(|(l, _)| *l == label) {
                skip_column(anomalies, header, "duplicate option column");
            } else {
                columns.push((label, col));
            }
        }
    }

    plan
}

fn plan_answer_columns(headers: &[String], middle: &[usize]) -> Vec<QuestionColumns> {
    // Question columns alternate with their score columns.
    middle
        .iter()
        .step_by(2)
        .map(|&col| QuestionColumns::Answer {
            reference: headers[col].trim().to_string(),
            column: col,
        })
        .collect()
}

fn skip_column(anomalies: &mut Vec<Anomaly>, column: &str, reason: &str) {
    tracing::warn!("ignoring grade column '{column}': {reason}");
    anomalies.push(Anomaly::SkippedColumn {
        column: column.to_string(),
        reason: reason.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(csv: &str) -> StageOutcome<Vec<GradeRecord>> {
        parse_grade_records(
            csv.as_bytes(),
            &GradeSourceConfig::default(),
            &OptionSchema::default(),
        )
        .unwrap()
    }

    fn label(s: &str) -> OptionLabel {
        s.parse().unwrap()
    }

    #[test]
    fn truthiness() {
        for t in ["1", "x", "TRUE", "yes", "1.0", " Y "] {
            assert!(is_truthy(t), "{t:?} should be truthy");
        }
        for f in ["", "0", "0.0", "false", "No", "n", "  "] {
            assert!(!is_truthy(f), "{f:?} should be falsy");
        }
    }

    #[test]
    fn flag_header_parsing() {
        let (reference, l) = parse_flag_header("101: What is 2+2? [B]").unwrap();
        assert_eq!(reference, "101: What is 2+2?");
        assert_eq!(l, label("B"));
        assert!(parse_flag_header("What is 2+2?").is_none());
        assert!(parse_flag_header("[A]").is_none());
    }

    #[test]
    fn flags_layout_groups_columns() {
        let csv = "\
name,id,Q1 text [A],Q1 text [B],Q1 text [C],Q1 text [D],Q2 text [A],Q2 text [B],score
Ann,s1,0,1,0,0,1,0,50
Bob,s2,1,0,1,0,,,0
";
        let outcome = parse(csv);
        assert!(outcome.is_clean());
        let records = outcome.value;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].student_name, "Ann");
        assert_eq!(records[0].reported_score.as_deref(), Some("50"));
        assert_eq!(records[0].answers.len(), 2);
        assert_eq!(records[0].answers[0].reference, "Q1 text");
        assert_eq!(
            records[0].answers[0].selection,
            Selection::Flags(vec![label("B")])
        );
        assert_eq!(
            records[1].answers[0].selection,
            Selection::Flags(vec![label("A"), label("C")])
        );
        assert_eq!(records[1].answers[1].selection, Selection::Flags(vec![]));
    }

    #[test]
    fn out_of_schema_flag_is_skipped() {
        let csv = "id,Q [A],Q [E]\ns1,1,0\n";
        let outcome = parse(csv);
        assert_eq!(outcome.anomalies.len(), 1);
        assert!(matches!(outcome.anomalies[0], Anomaly::SkippedColumn { .. }));
        assert_eq!(outcome.value[0].answers.len(), 1);
    }

    #[test]
    fn answers_layout_reads_text_columns() {
        let csv = "\
name,id,sis_id,section,section_id,section_sis_id,submitted,attempt,101: Capital of France?,1.0,102: 2+2?,1.0,n correct,n incorrect,score
Ann,s1,,Period 1,,,2024-01-01,1,Paris,1,5,0,2,0,100
";
        let outcome = parse(csv);
        let record = &outcome.value[0];
        assert_eq!(record.section.as_deref(), Some("Period 1"));
        assert_eq!(record.answers.len(), 2);
        assert_eq!(record.answers[0].reference, "101: Capital of France?");
        assert_eq!(
            record.answers[0].selection,
            Selection::Text("Paris".into())
        );
        assert_eq!(record.answers[1].selection, Selection::Text("5".into()));
    }

    #[test]
    fn explicit_layout_overrides_detection() {
        let config = GradeSourceConfig {
            layout: GradeLayout::Answers,
            ..GradeSourceConfig::default()
        };
        let csv = "id,Q [A],points\ns1,hello,1\n";
        let outcome =
            parse_grade_records(csv.as_bytes(), &config, &OptionSchema::default()).unwrap();
        assert_eq!(
            outcome.value[0].answers[0].selection,
            Selection::Text("hello".into())
        );
    }

    #[test]
    fn rows_without_student_id_are_skipped() {
        let csv = "id,Q [A]\n,1\ns2,0\n";
        let outcome = parse(csv);
        assert_eq!(outcome.value.len(), 1);
        assert_eq!(outcome.anomalies.len(), 1);
    }

    #[test]
    fn missing_id_column_is_fatal() {
        let err = parse_grade_records(
            "student,Q [A]\ns1,1\n".as_bytes(),
            &GradeSourceConfig::default(),
            &OptionSchema::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("missing column 'id'"));
    }

    #[test]
    fn no_question_columns_is_fatal() {
        let err = parse_grade_records(
            "name,id,score\nAnn,s1,0\n".as_bytes(),
            &GradeSourceConfig::default(),
            &OptionSchema::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("no question columns"));
    }

    #[test]
    fn layout_from_str() {
        assert_eq!("FLAGS".parse::<GradeLayout>().unwrap(), GradeLayout::Flags);
        assert_eq!("text".parse::<GradeLayout>().unwrap(), GradeLayout::Answers);
        assert!("wide".parse::<GradeLayout>().is_err());
    }
}
