//! Long-to-wide reshaping of the question bank.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Anomaly, IntegrityProblem, StageOutcome};
use crate::model::{OptionLabel, QuestionResponse, WideQuestion, MAX_OPTIONS};
use crate::text::strip_markup;

/// Default number of options per question (A-D).
pub const DEFAULT_OPTION_COUNT: usize = 4;

/// The fixed option schema shared by the pivoter, grade loader, and writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSchema {
    #[serde(default = "default_option_count")]
    pub option_count: usize,
}

fn default_option_count() -> usize {
    DEFAULT_OPTION_COUNT
}

impl Default for OptionSchema {
    fn default() -> Self {
        Self {
            option_count: DEFAULT_OPTION_COUNT,
        }
    }
}

impl OptionSchema {
    pub fn new(option_count: usize) -> Self {
        Self {
            option_count: option_count.clamp(1, MAX_OPTIONS),
        }
    }

    /// All labels in the schema, in column order.
    pub fn labels(&self) -> impl Iterator<Item = OptionLabel> {
        (0..self.option_count).filter_map(OptionLabel::from_index)
    }

    pub fn contains(&self, label: OptionLabel) -> bool {
        label.index() < self.option_count
    }
}

/// Group bank rows by question and lay each group out as one wide row.
///
/// Groups keep first-seen order. Groups that violate the answer-key
/// invariants are left out of the table and reported as integrity anomalies.
pub fn pivot_questions(
    rows: &[QuestionResponse],
    schema: &OptionSchema,
) -> StageOutcome<Vec<WideQuestion>> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&QuestionResponse>> = HashMap::new();
    for row in rows {
        groups
            .entry(row.question_id.as_str())
            .or_insert_with(|| {
                order.push(row.question_id.as_str());
                Vec::new()
            })
            .push(row);
    }

    let mut questions = Vec::with_capacity(order.len());
    let mut anomalies = Vec::new();

    for question_id in order {
        let group = &groups[question_id];
        match pivot_group(question_id, group, schema) {
            Ok(question) => questions.push(question),
            Err(problem) => {
                tracing::warn!("question {question_id}: {problem}");
                anomalies.push(Anomaly::Integrity {
                    question_id: question_id.to_string(),
                    problem,
                });
            }
        }
    }

    tracing::info!(
        questions = questions.len(),
        rejected = anomalies.len(),
        "pivoted question bank"
    );

    StageOutcome::new(questions, anomalies)
}

fn pivot_group(
    question_id: &str,
    group: &[&QuestionResponse],
    schema: &OptionSchema,
) -> Result<WideQuestion, IntegrityProblem> {
    let stem = group
        .iter()
        .find(|r| r.is_stem())
        .ok_or(IntegrityProblem::MissingStem)?;
    let responses: Vec<&QuestionResponse> =
        group.iter().copied().filter(|r| !r.is_stem()).collect();

    if responses.is_empty() {
        return Err(IntegrityProblem::NoResponses);
    }
    if responses.len() > schema.option_count {
        return Err(IntegrityProblem::TooManyOptions {
            count: responses.len(),
            max: schema.option_count,
        });
    }

    let correct: Vec<usize> = responses
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_correct)
        .map(|(i, _)| i)
        .collect();
    let correct_index = match correct.as_slice() {
        [only] => *only,
        [] => return Err(IntegrityProblem::NoCorrectOption),
        many => {
            return Err(IntegrityProblem::MultipleCorrectOptions { count: many.len() });
        }
    };
    // Bounded by option_count, which never exceeds MAX_OPTIONS.
    let correct_label =
        OptionLabel::from_index(correct_index).ok_or(IntegrityProblem::TooManyOptions {
            count: responses.len(),
            max: MAX_OPTIONS,
        })?;

    let mut options: Vec<String> = responses.iter().map(|r| r.text.trim().to_string()).collect();
    options.resize(schema.option_count, String::new());

    Ok(WideQuestion {
        question_id: question_id.to_string(),
        question_text: strip_markup(&stem.text),
        options,
        correct_label,
    })
}
