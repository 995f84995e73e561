//! Error and anomaly types.
//!
//! `PipelineError` is fatal to a stage: the input could not be read at all.
//! `Anomaly` is everything else. Anomalies are collected into a
//! [`StageOutcome`] and surfaced in the end-of-run summary instead of
//! aborting the batch.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal errors that stop a stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The quiz export is not well-formed XML.
    #[error("malformed quiz export at byte {position}: {message}")]
    MalformedXml { position: u64, message: String },

    /// The quiz export parsed but contains no question elements.
    #[error("quiz export contains no <item> elements")]
    NoQuestions,

    /// Every question in the export was skipped.
    #[error("no usable questions in quiz export ({skipped} skipped)")]
    NothingExtracted { skipped: usize },

    /// The grade source has no question columns or no student rows.
    #[error("grade source is unusable: {0}")]
    UnusableGradeSource(String),

    /// A required column is missing from a tabular artifact.
    #[error("missing column '{column}' in {artifact}")]
    MissingColumn { artifact: String, column: String },
}

/// What went wrong with a single integrity-checked question group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "problem", rename_all = "snake_case")]
pub enum IntegrityProblem {
    NoCorrectOption,
    MultipleCorrectOptions { count: usize },
    TooManyOptions { count: usize, max: usize },
    MissingStem,
    NoResponses,
}

impl std::fmt::Display for IntegrityProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityProblem::NoCorrectOption => write!(f, "no option is marked correct"),
            IntegrityProblem::MultipleCorrectOptions { count } => {
                write!(f, "{count} options are marked correct")
            }
            IntegrityProblem::TooManyOptions { count, max } => {
                write!(f, "{count} options exceed the {max}-option schema")
            }
            IntegrityProblem::MissingStem => write!(f, "no question text row"),
            IntegrityProblem::NoResponses => write!(f, "no response rows"),
        }
    }
}

/// A non-fatal, per-record problem recorded during a stage.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// A malformed entry in the quiz export was skipped.
    #[error("skipped {entry}: {reason}")]
    SkippedEntry { entry: String, reason: String },

    /// A question group violates the answer-key invariants.
    #[error("question {question_id}: {problem}")]
    Integrity {
        question_id: String,
        problem: IntegrityProblem,
    },

    /// No question scored at or above the match threshold.
    #[error("no match for '{reference}' (best {best_score:.3}, threshold {threshold:.3})")]
    MatchFailure {
        reference: String,
        best_score: f64,
        threshold: f64,
    },

    /// A student's selection for a question could not be determined.
    #[error("student {student_id}: ambiguous selection for '{reference}' ({detail})")]
    AmbiguousSelection {
        student_id: String,
        reference: String,
        detail: String,
    },

    /// A grade-source column could not be interpreted and was ignored.
    #[error("ignored column '{column}': {reason}")]
    SkippedColumn { column: String, reason: String },
}

impl Anomaly {
    /// Short classification used for summary counts.
    pub fn kind(&self) -> &'static str {
        match self {
            Anomaly::SkippedEntry { .. } => "parse",
            Anomaly::Integrity { .. } => "integrity",
            Anomaly::MatchFailure { .. } => "match_failure",
            Anomaly::AmbiguousSelection { .. } => "ambiguous_selection",
            Anomaly::SkippedColumn { .. } => "grade_source",
        }
    }
}

/// A stage's output together with the anomalies it collected.
#[derive(Debug, Clone)]
pub struct StageOutcome<T> {
    pub value: T,
    pub anomalies: Vec<Anomaly>,
}

impl<T> StageOutcome<T> {
    pub fn new(value: T, anomalies: Vec<Anomaly>) -> Self {
        Self { value, anomalies }
    }

    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }

    /// Transform the value, keeping the anomalies.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StageOutcome<U> {
        StageOutcome {
            value: f(self.value),
            anomalies: self.anomalies,
        }
    }

    /// Move this stage's anomalies into `sink` and return the bare value.
    pub fn drain_into(self, sink: &mut Vec<Anomaly>) -> T {
        sink.extend(self.anomalies);
        self.value
    }
}
