//! The `quizmatch run` command.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;

use quizmatch_core::extract::extract_questions_file;
use quizmatch_core::grader::{grade_records, map_references};
use quizmatch_core::grades::load_grade_records;
use quizmatch_core::pivot::pivot_questions;
use quizmatch_core::summary::{RunSummary, StageCounts};
use quizmatch_core::table::{write_graded, write_mapping, write_question_bank, write_wide_questions};
use quizmatch_report::write_student_reports;

use super::{load_config, print_anomalies, Overrides};

#[allow(clippy::too_many_arguments)]
pub fn execute(
    quiz: PathBuf,
    grades: PathBuf,
    output: PathBuf,
    threshold: Option<f64>,
    layout: Option<String>,
    fail_on_anomaly: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(
        config_path.as_deref(),
        Overrides {
            threshold,
            layout,
            ..Overrides::default()
        },
    )?;
    let start = Instant::now();
    let mut anomalies = Vec::new();

    eprintln!(
        "quizmatch v{} - {} + {}",
        env!("CARGO_PKG_VERSION"),
        quiz.display(),
        grades.display()
    );

    // Extract
    let bank = extract_questions_file(&quiz)?.drain_into(&mut anomalies);
    write_question_bank(&output.join("question_bank.csv"), &bank)?;

    // Pivot
    let questions = pivot_questions(&bank, &config.schema).drain_into(&mut anomalies);
    anyhow::ensure!(
        !questions.is_empty(),
        "no question in {} passed integrity checks",
        quiz.display()
    );
    write_wide_questions(&output.join("questions_wide.csv"), &questions, &config.schema)?;

    // Match + grade
    let records = load_grade_records(&grades, &config.grades, &config.schema)?
        .drain_into(&mut anomalies);
    let mapping = map_references(&records, &questions, &config.matching);
    write_mapping(&output.join("question_mapping.csv"), &mapping)?;

    let graded = grade_records(&records, &questions, &config.matching).drain_into(&mut anomalies);
    write_graded(&output.join("graded.csv"), &graded)?;

    // Report
    let written =
        write_student_reports(&output.join("reports"), &graded, &questions, &config.report)?;

    let stages = StageCounts {
        bank_rows: bank.len(),
        questions: questions.len(),
        references: mapping.len(),
        matched_references: mapping.iter().filter(|m| m.matched).count(),
        graded_rows: graded.len(),
        reports_written: written.len(),
    };
    let summary = RunSummary::new(
        stages,
        &graded,
        anomalies,
        start.elapsed().as_millis() as u64,
    );

    print_summary(&summary);
    print_anomalies(&summary.anomalies);

    let summary_path = output.join("summary.json");
    summary.save_json(&summary_path)?;
    tracing::info!(run = %summary.id, "wrote {}", summary_path.display());
    eprintln!(
        "Run finished {} in {}ms. Results saved to: {}",
        summary.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        summary.duration_ms,
        output.display()
    );

    if fail_on_anomaly && summary.has_anomalies() {
        std::process::exit(1);
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    use comfy_table::{Cell, Table};

    let mut stages = Table::new();
    stages.set_header(vec![
        "Bank rows",
        "Questions",
        "References matched",
        "Graded rows",
        "Reports",
        "Anomalies",
    ]);
    let s = &summary.stages;
    stages.add_row(vec![
        Cell::new(s.bank_rows),
        Cell::new(s.questions),
        Cell::new(format!("{}/{}", s.matched_references, s.references)),
        Cell::new(s.graded_rows),
        Cell::new(s.reports_written),
        Cell::new(summary.anomalies.len()),
    ]);
    eprintln!("\n{stages}");

    let mut students = Table::new();
    students.set_header(vec!["Student", "Name", "Correct", "Incorrect", "Ungraded", "Score"]);
    for score in &summary.students {
        students.add_row(vec![
            Cell::new(&score.student_id),
            Cell::new(&score.student_name),
            Cell::new(score.correct),
            Cell::new(score.incorrect),
            Cell::new(score.ungraded),
            Cell::new(match score.percent() {
                Some(pct) => format!("{pct:.1}%"),
                None => "-".to_string(),
            }),
        ]);
    }
    eprintln!("{students}");
}
