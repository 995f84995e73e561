//! Markdown report generator.
//!
//! Option highlighting uses inline HTML spans so the document renders the same
//! way after conversion to HTML.

use std::path::Path;

use anyhow::{Context, Result};

use crate::{html_escape, ReportEntry, StudentReport};

const CORRECT_STYLE: &str = "color:green;border: 1px solid green;border-radius: 10px;";
const WRONG_STYLE: &str = "color:red";

/// Render one student's report as Markdown.
pub fn generate_markdown(report: &StudentReport) -> String {
    let score = &report.score;
    let mut lines = vec![format!("# {} - {}", score.student_id, score.student_name)];
    if let Some(section) = &report.section {
        lines.push(format!("### {section}"));
    }

    match score.percent() {
        Some(pct) => lines.push(format!(
            "### Score: {}/{} correct ({pct:.1}%)",
            score.correct,
            score.correct + score.incorrect
        )),
        None => lines.push("### Score: not graded".to_string()),
    }
    if let Some(reported) = &report.reported_score {
        lines.push(format!("### Reported score: {reported}"));
    }
    if score.ungraded > 0 {
        lines.push(format!("### Ungraded questions: {}", score.ungraded));
    }
    lines.push(if report.only_incorrect {
        "### Questions answered incorrectly:".to_string()
    } else {
        "### Questions:".to_string()
    });
    lines.push(String::new());

    if report.entries.is_empty() {
        lines.push(if report.only_incorrect {
            "_No incorrect answers!_".to_string()
        } else {
            "_No questions to show._".to_string()
        });
    }

    for entry in &report.entries {
        push_entry(&mut lines, entry);
    }

    let mut md = lines.join("\n");
    md.push('\n');
    md
}

fn push_entry(lines: &mut Vec<String>, entry: &ReportEntry) {
    lines.push(format!(
        "**Question {}:** {}",
        entry.number,
        html_escape(entry.title())
    ));

    if let Some(reason) = entry.ungraded_reason() {
        lines.push(format!("_{reason}_"));
    }

    if let Some(question) = &entry.question {
        for (label, text) in question.labelled_options() {
            let mut display = format!("{label}. {}", html_escape(text));
            if label == question.correct_label {
                display = format!("<span style=\"{CORRECT_STYLE}\">{display}</span>");
            }
            if Some(label) == entry.selected_label {
                display = if entry.is_correct == Some(true) {
                    format!("{display} (your answer)")
                } else {
                    format!("<span style=\"{WRONG_STYLE}\">{display}</span> (your answer)")
                };
            }
            lines.push(format!("- {display}"));
        }
    }

    lines.push(String::new());
}

/// Write a Markdown report to a file.
pub fn write_markdown_report(report: &StudentReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, generate_markdown(report))
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_reports;
    use crate::fixtures::*;
    use quizmatch_core::config::ReportConfig;
    use quizmatch_core::model::GradeStatus;

    fn render(only_incorrect: bool) -> String {
        let config = ReportConfig {
            only_incorrect,
            ..ReportConfig::default()
        };
        let reports = build_reports(&graded(), &questions(), &config);
        generate_markdown(&reports[0])
    }

    #[test]
    fn marks_correct_option_and_selection() {
        let md = render(false);
        assert!(md.starts_with("# s1 - Ann Lee\n### Period 2\n"));
        assert!(md.contains("### Score: 1/2 correct (50.0%)\n### Reported score: 50\n"));
        assert!(md.contains("**Question 1:** What is the capital of France?"));
        assert!(md.contains(
            "- <span style=\"color:green;border: 1px solid green;border-radius: 10px;\">B. Paris</span> (your answer)"
        ));
        assert!(md.contains("- <span style=\"color:red\">C. Jupiter &lt;3&gt;</span> (your answer)"));
        assert!(md.contains("- A. Berlin"));
    }

    #[test]
    fn ungraded_rows_state_their_reason() {
        let md = render(false);
        assert!(md.contains("**Question 3:** ref for unknown"));
        assert!(md.contains("could not be matched to the answer key"));
    }

    #[test]
    fn only_incorrect_omits_correct_answers() {
        let md = render(true);
        assert!(md.contains("### Questions answered incorrectly:"));
        assert!(!md.contains("capital of France"));
        assert!(md.contains("**Question 2:**"));
    }

    #[test]
    fn no_incorrect_answers_note() {
        let graded = vec![graded_row("s9", Some("101"), Some("B"), GradeStatus::Graded)];
        let config = ReportConfig {
            only_incorrect: true,
            ..ReportConfig::default()
        };
        let reports = build_reports(&graded, &questions(), &config);
        let md = generate_markdown(&reports[0]);
        assert!(md.contains("_No incorrect answers!_"));
        assert!(md.contains("### Score: 1/1 correct (100.0%)"));
    }

    #[test]
    fn header_omits_missing_section_and_reported_score() {
        let mut row = graded_row("s9", Some("101"), Some("B"), GradeStatus::Graded);
        row.section = None;
        row.reported_score = None;
        let reports = build_reports(&[row], &questions(), &ReportConfig::default());
        let md = generate_markdown(&reports[0]);
        assert!(md.starts_with("# s9 - Ann Lee\n### Score:"));
        assert!(!md.contains("Reported score"));
    }
}
