//! End-of-run summary with JSON persistence.
//!
//! Aggregates stage counts, per-student scores, and every anomaly collected
//! along the way, so an operator can see which questions and students need
//! manual attention.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Anomaly;
use crate::model::{GradeStatus, GradedAnswer};

/// A complete run summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run identifier.
    pub id: Uuid,
    /// When the run finished.
    pub created_at: DateTime<Utc>,
    /// Per-stage row counts.
    pub stages: StageCounts,
    /// Per-student tallies.
    pub students: Vec<StudentScore>,
    /// Anomaly counts keyed by kind.
    pub anomaly_counts: BTreeMap<String, usize>,
    /// Every anomaly, in the order it was recorded.
    pub anomalies: Vec<Anomaly>,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// How many rows each stage produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
    pub bank_rows: usize,
    pub questions: usize,
    pub references: usize,
    pub matched_references: usize,
    pub graded_rows: usize,
    pub reports_written: usize,
}

/// One student's tallies over the graded table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentScore {
    pub student_id: String,
    pub student_name: String,
    pub correct: usize,
    pub incorrect: usize,
    pub ungraded: usize,
}

impl StudentScore {
    /// Percentage correct over graded rows, or `None` if nothing was graded.
    pub fn percent(&self) -> Option<f64> {
        let graded = self.correct + self.incorrect;
        (graded > 0).then(|| self.correct as f64 * 100.0 / graded as f64)
    }
}

/// Tally the graded table per student, in first-seen order.
pub fn student_scores(graded: &[GradedAnswer]) -> Vec<StudentScore> {
    let mut scores: Vec<StudentScore> = Vec::new();
    let mut index: BTreeMap<&str, usize> = BTreeMap::new();

    for row in graded {
        let slot = *index.entry(row.student_id.as_str()).or_insert_with(|| {
            scores.push(StudentScore {
                student_id: row.student_id.clone(),
                student_name: row.student_name.clone(),
                correct: 0,
                incorrect: 0,
                ungraded: 0,
            });
            scores.len() - 1
        });
        let score = &mut scores[slot];
        match (row.status, row.is_correct) {
            (GradeStatus::Graded, Some(true)) => score.correct += 1,
            (GradeStatus::Graded, _) => score.incorrect += 1,
            _ => score.ungraded += 1,
        }
    }

    scores
}

impl RunSummary {
    pub fn new(
        stages: StageCounts,
        graded: &[GradedAnswer],
        anomalies: Vec<Anomaly>,
        duration_ms: u64,
    ) -> Self {
        let mut anomaly_counts = BTreeMap::new();
        for a in &anomalies {
            *anomaly_counts.entry(a.kind().to_string()).or_insert(0) += 1;
        }
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            stages,
            students: student_scores(graded),
            anomaly_counts,
            anomalies,
            duration_ms,
        }
    }

    pub fn has_anomalies(&self) -> bool {
        !self.anomalies.is_empty()
    }

    /// Save the summary as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize summary")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write summary to {}", path.display()))?;
        Ok(())
    }

    /// Load a summary from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read summary from {}", path.display()))?;
        let summary: RunSummary =
            serde_json::from_str(&content).context("failed to parse summary JSON")?;
        Ok(summary)
    }

    /// Format the anomaly section as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "**Summary:** {} questions, {} of {} references matched, {} graded rows, {} anomalies\n\n",
            self.stages.questions,
            self.stages.matched_references,
            self.stages.references,
            self.stages.graded_rows,
            self.anomalies.len()
        ));

        if self.anomalies.is_empty() {
            md.push_str("No anomalies recorded.\n");
            return md;
        }

        md.push_str("### Needs attention\n\n");
        md.push_str("| Kind | Detail |\n");
        md.push_str("|------|--------|\n");
        for a in &self.anomalies {
            md.push_str(&format!(
                "| {} | {} |\n",
                a.kind(),
                a.to_string().replace('|', "\\|")
            ));
        }

        md
    }
}
