//! Core data model types for quizmatch.
//!
//! These are the rows that flow between pipeline stages: the long-format
//! question bank, the wide answer key, grade records, and graded answers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Largest option schema supported (one letter per option, A-Z).
pub const MAX_OPTIONS: usize = 26;

/// One row of the long-format question bank.
///
/// A row with no `response_id` is the question's stem row and carries the
/// question text; every other row is one possible answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionResponse {
    pub question_id: String,
    #[serde(default, with = "empty_as_none")]
    pub response_id: Option<String>,
    pub text: String,
    #[serde(with = "flag01")]
    pub is_correct: bool,
}

impl QuestionResponse {
    /// Build the stem row for a question.
    pub fn stem(question_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            question_id: question_id.into(),
            response_id: None,
            text: text.into(),
            is_correct: false,
        }
    }

    /// Build an answer row for a question.
    pub fn response(
        question_id: impl Into<String>,
        response_id: impl Into<String>,
        text: impl Into<String>,
        is_correct: bool,
    ) -> Self {
        Self {
            question_id: question_id.into(),
            response_id: Some(response_id.into()),
            text: text.into(),
            is_correct,
        }
    }

    pub fn is_stem(&self) -> bool {
        self.response_id.is_none()
    }
}

/// An option letter, stored as its zero-based position (A = 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OptionLabel(u8);

impl OptionLabel {
    /// The label for the option at `index`, if it fits the alphabet.
    pub fn from_index(index: usize) -> Option<Self> {
        if index < MAX_OPTIONS {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn as_char(self) -> char {
        (b'A' + self.0) as char
    }
}

impl fmt::Display for OptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for OptionLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => {
                let upper = c.to_ascii_uppercase();
                Ok(Self(upper as u8 - b'A'))
            }
            _ => Err(format!("invalid option label: {s:?}")),
        }
    }
}

impl Serialize for OptionLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OptionLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One row of the wide answer key: a question with its options in source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WideQuestion {
    pub question_id: String,
    pub question_text: String,
    /// Option texts, padded with empty strings up to the schema's option count.
    pub options: Vec<String>,
    pub correct_label: OptionLabel,
}

impl WideQuestion {
    /// Text of the option with the given label, or `None` if empty/out of range.
    pub fn option(&self, label: OptionLabel) -> Option<&str> {
        self.options
            .get(label.index())
            .map(String::as_str)
            .filter(|t| !t.is_empty())
    }

    /// Labelled, non-empty options in column order.
    pub fn labelled_options(&self) -> impl Iterator<Item = (OptionLabel, &str)> {
        self.options.iter().enumerate().filter_map(|(i, text)| {
            let label = OptionLabel::from_index(i)?;
            (!text.is_empty()).then_some((label, text.as_str()))
        })
    }

    pub fn correct_text(&self) -> Option<&str> {
        self.option(self.correct_label)
    }
}

/// What a student chose for one question, as the grade source recorded it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Selection {
    /// Labels whose flag column was truthy.
    Flags(Vec<OptionLabel>),
    /// The answer text the student submitted.
    Text(String),
}

/// One question's worth of a student's grade record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionAnswer {
    /// The grade source's free-text reference to the question (a column header).
    pub reference: String,
    pub selection: Selection,
}

/// A student's row from the grade source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeRecord {
    pub student_id: String,
    #[serde(default)]
    pub student_name: String,
    #[serde(default)]
    pub section: Option<String>,
    /// The score the grade source reported, verbatim.
    #[serde(default)]
    pub reported_score: Option<String>,
    pub answers: Vec<QuestionAnswer>,
}

/// Why a graded row could or could not be scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GradeStatus {
    #[serde(rename = "graded")]
    Graded,
    #[serde(rename = "ungraded: ambiguous selection")]
    AmbiguousSelection,
    #[serde(rename = "ungraded: no match")]
    NoMatch,
}

impl GradeStatus {
    pub fn is_graded(self) -> bool {
        self == GradeStatus::Graded
    }
}

impl fmt::Display for GradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradeStatus::Graded => write!(f, "graded"),
            GradeStatus::AmbiguousSelection => write!(f, "ungraded: ambiguous selection"),
            GradeStatus::NoMatch => write!(f, "ungraded: no match"),
        }
    }
}

/// One row of the graded table: a (student, question) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradedAnswer {
    pub student_id: String,
    pub question_id: Option<String>,
    pub selected_label: Option<OptionLabel>,
    pub is_correct: Option<bool>,
    pub status: GradeStatus,
    pub match_score: f64,
    pub reference: String,
    #[serde(default)]
    pub student_name: String,
    #[serde(default)]
    pub section: Option<String>,
    /// The grade source's own score for the student, verbatim.
    #[serde(default)]
    pub reported_score: Option<String>,
}

/// The outcome of resolving one free-text question reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub query_text: String,
    /// Set only when `matched` is true.
    pub matched_question_id: Option<String>,
    /// Highest-scoring candidate regardless of the threshold.
    pub best_candidate: Option<String>,
    pub score: f64,
    pub matched: bool,
}

impl MatchResult {
    pub fn unmatched(query_text: impl Into<String>) -> Self {
        Self {
            query_text: query_text.into(),
            matched_question_id: None,
            best_candidate: None,
            score: 0.0,
            matched: false,
        }
    }
}

/// One row of `question_mapping.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingRow {
    pub reference: String,
    pub query_text: String,
    pub matched_question_id: Option<String>,
    pub best_candidate: Option<String>,
    pub score: f64,
    pub matched: bool,
}

impl MappingRow {
    pub fn new(reference: impl Into<String>, result: MatchResult) -> Self {
        Self {
            reference: reference.into(),
            query_text: result.query_text,
            matched_question_id: result.matched_question_id,
            best_candidate: result.best_candidate,
            score: (result.score * 1000.0).round() / 1000.0,
            matched: result.matched,
        }
    }
}

/// `1`/`0` booleans, as the question bank stores them.
mod flag01 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "1" } else { "0" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" => Ok(true),
            "0" | "false" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "invalid is_correct value: {other:?}"
            ))),
        }
    }
}

/// Empty cells read back as `None`.
mod empty_as_none {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<String>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.as_deref().unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        let s = Option::<String>::deserialize(deserializer)?;
        Ok(s.filter(|v| !v.trim().is_empty()))
    }
}
