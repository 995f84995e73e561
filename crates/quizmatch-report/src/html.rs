//! HTML report generator.
//!
//! Produces a self-contained HTML file with all CSS inlined.

use anyhow::{Context, Result};
use std::path::Path;

use crate::{html_escape, ReportEntry, StudentReport};

/// Generate an HTML document for one student.
pub fn generate_html(report: &StudentReport) -> String {
    let score = &report.score;
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>{} - {}</title>\n",
        html_escape(&score.student_id),
        html_escape(&score.student_name)
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n<main class=\"container\">\n");

    // Header
    html.push_str("<header>\n");
    html.push_str(&format!(
        "<h1>{} - {}</h1>\n",
        html_escape(&score.student_id),
        html_escape(&score.student_name)
    ));
    if let Some(section) = &report.section {
        html.push_str(&format!(
            "<p class=\"meta\">Section: {}</p>\n",
            html_escape(section)
        ));
    }
    let score_text = match score.percent() {
        Some(pct) => format!(
            "{}/{} correct ({pct:.1}%)",
            score.correct,
            score.correct + score.incorrect
        ),
        None => "not graded".to_string(),
    };
    html.push_str(&format!(
        "<p class=\"meta\">Score: <strong>{score_text}</strong>"
    ));
    if let Some(reported) = &report.reported_score {
        html.push_str(&format!(" | Reported: {}", html_escape(reported)));
    }
    if score.ungraded > 0 {
        html.push_str(&format!(" | {} ungraded", score.ungraded));
    }
    html.push_str("</p>\n");
    html.push_str("</header>\n");

    html.push_str("<section class=\"questions\">\n");
    html.push_str(if report.only_incorrect {
        "<h2>Questions answered incorrectly</h2>\n"
    } else {
        "<h2>Questions</h2>\n"
    });

    if report.entries.is_empty() {
        html.push_str(if report.only_incorrect {
            "<p class=\"empty\">No incorrect answers!</p>\n"
        } else {
            "<p class=\"empty\">No questions to show.</p>\n"
        });
    }

    for entry in &report.entries {
        html.push_str(&render_entry(entry));
    }

    html.push_str("</section>\n");
    html.push_str("</main>\n</body>\n</html>");
    html
}

fn render_entry(entry: &ReportEntry) -> String {
    let mut out = String::from("<article class=\"question\">\n");
    out.push_str(&format!(
        "<h3>Question {}</h3>\n<p class=\"stem\">{}</p>\n",
        entry.number,
        html_escape(entry.title())
    ));

    if let Some(reason) = entry.ungraded_reason() {
        out.push_str(&format!("<p class=\"ungraded\">{reason}</p>\n"));
    }

    if let Some(question) = &entry.question {
        out.push_str("<ul class=\"options\">\n");
        for (label, text) in question.labelled_options() {
            let mut classes = Vec::new();
            if label == question.correct_label {
                classes.push("correct");
            }
            let picked = Some(label) == entry.selected_label;
            if picked {
                classes.push(if entry.is_correct == Some(true) {
                    "picked"
                } else {
                    "wrong"
                });
            }
            out.push_str(&format!(
                "<li class=\"{}\">{label}. {}{}</li>\n",
                classes.join(" "),
                html_escape(text),
                if picked { " <em>(your answer)</em>" } else { "" }
            ));
        }
        out.push_str("</ul>\n");
    }

    out.push_str("</article>\n");
    out
}

/// Write an HTML report to a file.
pub fn write_html_report(report: &StudentReport, path: &Path) -> Result<()> {
    let html = generate_html(report);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

const CSS: &str = r#"
:root { --accent: #2C68AA; --bg: #f8f9fa; --fg: #333; --correct: #16a34a; --wrong: #dc2626; }
* { box-sizing: border-box; }
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; margin: 0; padding: 20px; background: var(--bg); color: var(--fg); }
.container { max-width: 800px; margin: 0 auto; background: #fff; padding: 40px; border-radius: 10px; box-shadow: 0 2px 10px rgba(0, 0, 0, 0.1); }
h1, h2, h3 { color: var(--accent); font-weight: 600; }
h1 { border-bottom: 3px solid var(--accent); padding-bottom: 0.3em; }
.meta { color: #6b7280; }
.question { border-top: 1px solid #e5e7eb; padding: 0.5rem 0; }
.options { list-style: none; padding-left: 1rem; }
.options li { padding: 0.2rem 0.6rem; margin: 0.2rem 0; }
.correct { color: var(--correct); border: 1px solid var(--correct); border-radius: 10px; }
.wrong { color: var(--wrong); }
.ungraded { font-style: italic; color: #b45309; }
.empty { font-style: italic; }
"#;
