//! Per-student report generation for quizmatch.
//!
//! A [`StudentReport`] is assembled from the graded table and the answer key,
//! then rendered by the [`markdown`] or [`html`] backends.

pub mod html;
pub mod markdown;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use quizmatch_core::config::{ReportConfig, ReportFormat};
use quizmatch_core::model::{GradeStatus, GradedAnswer, OptionLabel, WideQuestion};
use quizmatch_core::summary::{student_scores, StudentScore};

static UNSAFE_FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\-]").expect("valid filename regex"));

/// File stem for a student's report: `{id}_{name}` with every character that
/// is not a word character or hyphen replaced by `_`.
pub fn report_file_stem(student_id: &str, student_name: &str) -> String {
    UNSAFE_FILENAME
        .replace_all(&format!("{student_id}_{student_name}"), "_")
        .into_owned()
}

/// Escape a string for safe HTML insertion.
pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// One listed question in a student's report.
#[derive(Debug, Clone)]
pub struct ReportEntry {
    /// 1-based position among the student's graded rows.
    pub number: usize,
    pub reference: String,
    /// The matched answer-key question, if the reference resolved.
    pub question: Option<WideQuestion>,
    pub selected_label: Option<OptionLabel>,
    pub is_correct: Option<bool>,
    pub status: GradeStatus,
}

impl ReportEntry {
    /// Heading text: the answer-key wording when matched, else the reference.
    pub fn title(&self) -> &str {
        self.question
            .as_ref()
            .map(|q| q.question_text.as_str())
            .unwrap_or(&self.reference)
    }

    /// Sentence explaining why the row was not scored.
    pub fn ungraded_reason(&self) -> Option<&'static str> {
        match self.status {
            GradeStatus::Graded => None,
            GradeStatus::AmbiguousSelection => {
                Some("Not graded: the selection could not be determined.")
            }
            GradeStatus::NoMatch => {
                Some("Not graded: this question could not be matched to the answer key.")
            }
        }
    }
}

/// Everything needed to render one student's document.
#[derive(Debug, Clone)]
pub struct StudentReport {
    pub score: StudentScore,
    pub section: Option<String>,
    /// Score as the grade source reported it.
    pub reported_score: Option<String>,
    pub only_incorrect: bool,
    pub entries: Vec<ReportEntry>,
}

impl StudentReport {
    pub fn file_stem(&self) -> String {
        report_file_stem(&self.score.student_id, &self.score.student_name)
    }
}

/// Group graded rows by student (first-seen order) and attach answer-key
/// questions. With `only_incorrect`, correctly answered rows are omitted.
pub fn build_reports(
    graded: &[GradedAnswer],
    questions: &[WideQuestion],
    config: &ReportConfig,
) -> Vec<StudentReport> {
    let by_id: HashMap<&str, &WideQuestion> = questions
        .iter()
        .map(|q| (q.question_id.as_str(), q))
        .collect();

    student_scores(graded)
        .into_iter()
        .map(|score| {
            let rows: Vec<&GradedAnswer> = graded
                .iter()
                .filter(|row| row.student_id == score.student_id)
                .collect();
            let section = rows.iter().find_map(|row| row.section.clone());
            let reported_score = rows.iter().find_map(|row| row.reported_score.clone());
            let entries = rows
                .into_iter()
                .enumerate()
                .filter(|(_, row)| !config.only_incorrect || row.is_correct != Some(true))
                .map(|(i, row)| ReportEntry {
                    number: i + 1,
                    reference: row.reference.clone(),
                    question: row
                        .question_id
                        .as_deref()
                        .and_then(|id| by_id.get(id))
                        .map(|q| (*q).clone()),
                    selected_label: row.selected_label,
                    is_correct: row.is_correct,
                    status: row.status,
                })
                .collect();
            StudentReport {
                score,
                section,
                reported_score,
                only_incorrect: config.only_incorrect,
                entries,
            }
        })
        .collect()
}

/// Render every student's report into `dir` in each configured format.
/// Returns the written paths.
pub fn write_student_reports(
    dir: &Path,
    graded: &[GradedAnswer],
    questions: &[WideQuestion],
    config: &ReportConfig,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create report directory {}", dir.display()))?;

    let mut written = Vec::new();
    for report in build_reports(graded, questions, config) {
        let stem = report.file_stem();
        for format in &config.formats {
            let path = match format {
                ReportFormat::Markdown => {
                    let path = dir.join(format!("{stem}.md"));
                    markdown::write_markdown_report(&report, &path)?;
                    path
                }
                ReportFormat::Html => {
                    let path = dir.join(format!("{stem}.html"));
                    html::write_html_report(&report, &path)?;
                    path
                }
            };
            tracing::debug!("wrote {}", path.display());
            written.push(path);
        }
    }

    tracing::info!(files = written.len(), "wrote student reports to {}", dir.display());
    Ok(written)
}
