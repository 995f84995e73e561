//! The `quizmatch grade` command.

use std::path::PathBuf;

use anyhow::Result;

use quizmatch_core::grader::grade_records;
use quizmatch_core::grades::load_grade_records;
use quizmatch_core::table::{read_wide_questions, write_graded};

use super::{load_config, print_anomalies, Overrides};

pub fn execute(
    grades: PathBuf,
    questions: PathBuf,
    output: PathBuf,
    threshold: Option<f64>,
    layout: Option<String>,
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

    let key = read_wide_questions(&questions)?;
    let mut anomalies = Vec::new();
    let records = load_grade_records(&grades, &config.grades, &config.schema)?
        .drain_into(&mut anomalies);
    let graded = grade_records(&records, &key, &config.matching).drain_into(&mut anomalies);
    print_anomalies(&anomalies);

    write_graded(&output, &graded)?;
    let scored = graded.iter().filter(|g| g.status.is_graded()).count();
    println!(
        "Graded {scored} of {} answers to {}",
        graded.len(),
        output.display()
    );
    Ok(())
}
