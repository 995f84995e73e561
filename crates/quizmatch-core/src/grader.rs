//! Joins grade records to the answer key.
//!
//! Every (student, question reference) pair yields exactly one
//! [`GradedAnswer`]. References are resolved through the [`Matcher`] once per
//! distinct reference; rows that cannot be scored are kept and labelled with
//! the reason instead of being dropped.

use std::collections::HashMap;

use crate::error::{Anomaly, StageOutcome};
use crate::matcher::{MatchConfig, Matcher};
use crate::model::{
    GradeRecord, GradeStatus, GradedAnswer, MappingRow, MatchResult, OptionLabel, Selection,
    WideQuestion,
};
use crate::text::{normalize, similarity, strip_reference_prefix};

/// Resolve every distinct question reference in `records`, in first-seen order.
pub fn map_references(
    records: &[GradeRecord],
    questions: &[WideQuestion],
    config: &MatchConfig,
) -> Vec<MappingRow> {
    let matcher = Matcher::new(questions, *config);
    let mut seen = std::collections::HashSet::new();
    records
        .iter()
        .flat_map(|r| r.answers.iter())
        .filter(|a| seen.insert(a.reference.as_str()))
        .map(|a| MappingRow::new(&a.reference, resolve_reference(&matcher, &a.reference)))
        .collect()
}

fn resolve_reference(matcher: &Matcher, reference: &str) -> MatchResult {
    matcher.best_match(strip_reference_prefix(reference))
}

/// Grade every student's answers against the answer key.
pub fn grade_records(
    records: &[GradeRecord],
    questions: &[WideQuestion],
    config: &MatchConfig,
) -> StageOutcome<Vec<GradedAnswer>> {
    let matcher = Matcher::new(questions, *config);
    let by_id: HashMap<&str, &WideQuestion> = questions
        .iter()
        .map(|q| (q.question_id.as_str(), q))
        .collect();

    let mut matches: HashMap<&str, MatchResult> = HashMap::new();
    let mut anomalies = Vec::new();
    let mut graded = Vec::new();

    for record in records {
        for answer in &record.answers {
            let reference = answer.reference.as_str();
            let result = matches.entry(reference).or_insert_with(|| {
                let result = resolve_reference(&matcher, reference);
                if !result.matched {
                    tracing::warn!(
                        "no match for '{reference}' (best {:.3})",
                        result.score
                    );
                    anomalies.push(Anomaly::MatchFailure {
                        reference: reference.to_string(),
                        best_score: result.score,
                        threshold: config.threshold,
                    });
                }
                result
            });

            let question = result
                .matched_question_id
                .as_deref()
                .and_then(|id| by_id.get(id).copied());

            let mut row = GradedAnswer {
                student_id: record.student_id.clone(),
                question_id: result.matched_question_id.clone(),
                selected_label: None,
                is_correct: None,
                status: GradeStatus::NoMatch,
                match_score: (result.score * 1000.0).round() / 1000.0,
                reference: reference.to_string(),
                student_name: record.student_name.clone(),
                section: record.section.clone(),
                reported_score: record.reported_score.clone(),
            };

            if let Some(question) = question {
                match resolve_selection(&answer.selection, question, config) {
                    Ok(label) => {
                        row.selected_label = Some(label);
                        row.is_correct = Some(label == question.correct_label);
                        row.status = GradeStatus::Graded;
                    }
                    Err(detail) => {
                        tracing::warn!(
                            "student {}: ambiguous selection for '{reference}' ({detail})",
                            record.student_id
                        );
                        anomalies.push(Anomaly::AmbiguousSelection {
                            student_id: record.student_id.clone(),
                            reference: reference.to_string(),
                            detail,
                        });
                        row.status = GradeStatus::AmbiguousSelection;
                    }
                }
            }

            graded.push(row);
        }
    }

    let graded_count = graded.iter().filter(|g| g.status.is_graded()).count();
    tracing::info!(
        rows = graded.len(),
        graded = graded_count,
        ungraded = graded.len() - graded_count,
        "graded answers"
    );

    StageOutcome::new(graded, anomalies)
}

/// Determine the single option a student selected, or explain why not.
fn resolve_selection(
    selection: &Selection,
    question: &WideQuestion,
    config: &MatchConfig,
) -> Result<OptionLabel, String> {
    match selection {
        Selection::Flags(labels) => match labels.as_slice() {
            [only] if question.option(*only).is_none() => {
                Err(format!("option {only} does not exist for this question"))
            }
            [only] => Ok(*only),
            [] => Err("no option flagged".into()),
            many => Err(format!(
                "{} options flagged: {}",
                many.len(),
                many.iter()
                    .map(|l| l.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        },
        Selection::Text(text) => match_answer_text(text, question, config.option_threshold),
    }
}

/// Map a submitted answer text to an option: exact normalized match first,
/// then the best fuzzy match at or above `threshold`, ties to the lower label.
pub fn match_answer_text(
    text: &str,
    question: &WideQuestion,
    threshold: f64,
) -> Result<OptionLabel, String> {
    let answer = normalize(text);
    if answer.is_empty() {
        return Err("no answer submitted".into());
    }

    let options: Vec<(OptionLabel, String)> = question
        .labelled_options()
        .map(|(label, text)| (label, normalize(text)))
        .collect();

    if let Some((label, _)) = options.iter().find(|(_, opt)| *opt == answer) {
        return Ok(*label);
    }

    let best = options
        .iter()
        .map(|(label, opt)| (*label, similarity(&answer, opt)))
        .fold(None::<(OptionLabel, f64)>, |best, (label, score)| match best {
            Some((_, top)) if top >= score => best,
            _ => Some((label, score)),
        });

    match best {
        Some((label, score)) if score >= threshold => Ok(label),
        Some((_, score)) => Err(format!(
            "answer matches no option (best {score:.3})"
        )),
        None => Err("question has no options".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuestionAnswer;

    fn label(s: &str) -> OptionLabel {
        s.parse().unwrap()
    }

    fn key() -> Vec<WideQuestion> {
        vec![
            WideQuestion {
                question_id: "101".into(),
                question_text: "What is the capital of France?".into(),
                options: vec!["Berlin".into(), "Paris".into(), "Rome".into(), "Madrid".into()],
                correct_label: label("B"),
            },
            WideQuestion {
                question_id: "102".into(),
                question_text: "Which planet is known as the red planet?".into(),
                options: vec!["Venus".into(), "Mars".into(), "Jupiter".into(), String::new()],
                correct_label: label("B"),
            },
        ]
    }

    fn student(id: &str, answers: Vec<(&str, Selection)>) -> GradeRecord {
        GradeRecord {
            student_id: id.into(),
            student_name: format!("Student {id}"),
            section: None,
            reported_score: None,
            answers: answers
                .into_iter()
                .map(|(reference, selection)| QuestionAnswer {
                    reference: reference.into(),
                    selection,
                })
                .collect(),
        }
    }

    fn flags(labels: &[&str]) -> Selection {
        Selection::Flags(labels.iter().map(|l| label(l)).collect())
    }

    #[test]
    fn correct_and_incorrect_flags() {
        let records = vec![
            student("s1", vec![("101: What is the capital of France?", flags(&["B"]))]),
            student("s2", vec![("101: What is the capital of France?", flags(&["A"]))]),
        ];
        let outcome = grade_records(&records, &key(), &MatchConfig::default());
        assert!(outcome.is_clean());
        let rows = outcome.value;
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].status, GradeStatus::Graded);
        assert_eq!(rows[0].question_id.as_deref(), Some("101"));
        assert_eq!(rows[0].selected_label, Some(label("B")));
        assert_eq!(rows[0].is_correct, Some(true));

        assert_eq!(rows[1].selected_label, Some(label("A")));
        assert_eq!(rows[1].is_correct, Some(false));
    }

    #[test]
    fn multiple_flags_are_ambiguous() {
        let records = vec![student(
            "s1",
            vec![("What is the capital of France?", flags(&["A", "C"]))],
        )];
        let outcome = grade_records(&records, &key(), &MatchConfig::default());
        let row = &outcome.value[0];
        assert_eq!(row.status, GradeStatus::AmbiguousSelection);
        assert_eq!(row.status.to_string(), "ungraded: ambiguous selection");
        assert!(row.selected_label.is_none());
        assert!(row.is_correct.is_none());
        assert!(matches!(
            outcome.anomalies[0],
            Anomaly::AmbiguousSelection { .. }
        ));
    }

    #[test]
    fn no_flags_are_ambiguous() {
        let records = vec![student(
            "s1",
            vec![("What is the capital of France?", flags(&[]))],
        )];
        let outcome = grade_records(&records, &key(), &MatchConfig::default());
        assert_eq!(outcome.value[0].status, GradeStatus::AmbiguousSelection);
    }

    #[test]
    fn flag_on_missing_option_is_ambiguous() {
        // Question 102 has no option D.
        let records = vec![student(
            "s1",
            vec![("Which planet is known as the red planet?", flags(&["D"]))],
        )];
        let outcome = grade_records(&records, &key(), &MatchConfig::default());
        let row = &outcome.value[0];
        assert_eq!(row.status, GradeStatus::AmbiguousSelection);
        assert!(row.selected_label.is_none());
        match &outcome.anomalies[0] {
            Anomaly::AmbiguousSelection { detail, .. } => {
                assert!(detail.contains("option D does not exist"))
            }
            other => panic!("unexpected anomaly: {other:?}"),
        }
    }

    #[test]
    fn section_and_reported_score_are_carried() {
        let mut record = student("s1", vec![("What is the capital of France?", flags(&["B"]))]);
        record.section = Some("Period 3".into());
        record.reported_score = Some("87.5".into());
        let outcome = grade_records(&[record], &key(), &MatchConfig::default());
        let row = &outcome.value[0];
        assert_eq!(row.section.as_deref(), Some("Period 3"));
        assert_eq!(row.reported_score.as_deref(), Some("87.5"));
    }

    #[test]
    fn unmatched_reference_is_kept_as_no_match() {
        let records = vec![
            student("s1", vec![("Explain entropy", flags(&["A"]))]),
            student("s2", vec![("Explain entropy", flags(&["A", "B"]))]),
        ];
        let outcome = grade_records(&records, &key(), &MatchConfig::default());
        assert_eq!(outcome.value.len(), 2);
        for row in &outcome.value {
            assert_eq!(row.status, GradeStatus::NoMatch);
            assert_eq!(row.status.to_string(), "ungraded: no match");
            assert!(row.question_id.is_none());
        }
        // One failure per distinct reference, not per student.
        assert_eq!(outcome.anomalies.len(), 1);
        assert!(matches!(outcome.anomalies[0], Anomaly::MatchFailure { .. }));
    }

    #[test]
    fn one_row_per_student_question_pair() {
        let records = vec![
            student(
                "s1",
                vec![
                    ("What is the capital of France?", flags(&["B"])),
                    ("Which planet is the red planet?", flags(&["B"])),
                    ("Unrelated question text entirely", flags(&["B"])),
                ],
            ),
            student(
                "s2",
                vec![
                    ("What is the capital of France?", flags(&["C"])),
                    ("Which planet is the red planet?", flags(&[])),
                    ("Unrelated question text entirely", flags(&["B"])),
                ],
            ),
        ];
        let outcome = grade_records(&records, &key(), &MatchConfig::default());
        assert_eq!(outcome.value.len(), 6);
        let statuses: Vec<GradeStatus> = outcome.value.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                GradeStatus::Graded,
                GradeStatus::Graded,
                GradeStatus::NoMatch,
                GradeStatus::Graded,
                GradeStatus::AmbiguousSelection,
                GradeStatus::NoMatch,
            ]
        );
    }

    #[test]
    fn answer_text_is_resolved_to_option() {
        let records = vec![
            student("s1", vec![("101: What is the capital of France?", Selection::Text("paris".into()))]),
            student("s2", vec![("101: What is the capital of France?", Selection::Text("Romee".into()))]),
            student("s3", vec![("101: What is the capital of France?", Selection::Text(String::new()))]),
        ];
        let outcome = grade_records(&records, &key(), &MatchConfig::default());
        let rows = outcome.value;
        assert_eq!(rows[0].selected_label, Some(label("B")));
        assert_eq!(rows[0].is_correct, Some(true));
        assert_eq!(rows[1].selected_label, Some(label("C")));
        assert_eq!(rows[1].is_correct, Some(false));
        assert_eq!(rows[2].status, GradeStatus::AmbiguousSelection);
    }

    #[test]
    fn unrelated_answer_text_is_ambiguous() {
        let q = &key()[0];
        assert!(match_answer_text("Quantum chromodynamics", q, 0.75).is_err());
        assert_eq!(match_answer_text("  MADRID ", q, 0.75), Ok(label("D")));
    }

    #[test]
    fn mapping_lists_each_reference_once() {
        let records = vec![
            student("s1", vec![("101: What is the capital of France?", flags(&["B"]))]),
            student(
                "s2",
                vec![
                    ("101: What is the capital of France?", flags(&["A"])),
                    ("Explain entropy", flags(&["A"])),
                ],
            ),
        ];
        let mapping = map_references(&records, &key(), &MatchConfig::default());
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping[0].matched_question_id.as_deref(), Some("101"));
        assert_eq!(mapping[0].score, 1.0);
        assert!(!mapping[1].matched);
    }
}
