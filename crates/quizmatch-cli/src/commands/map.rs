//! The `quizmatch map` command.

use std::path::PathBuf;

use anyhow::Result;

use quizmatch_core::grader::map_references;
use quizmatch_core::grades::load_grade_records;
use quizmatch_core::table::{read_wide_questions, write_mapping};

use super::{load_config, print_anomalies, Overrides};

pub fn execute(
    grades: PathBuf,
    questions: PathBuf,
    output: PathBuf,
    threshold: Option<f64>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(
        config_path.as_deref(),
        Overrides {
            threshold,
            ..Overrides::default()
        },
    )?;

    let key = read_wide_questions(&questions)?;
    let records = load_grade_records(&grades, &config.grades, &config.schema)?;
    print_anomalies(&records.anomalies);

    let mapping = map_references(&records.value, &key, &config.matching);
    write_mapping(&output, &mapping)?;

    let matched = mapping.iter().filter(|m| m.matched).count();
    println!(
        "Matched {matched} of {} references (threshold {:.2}) to {}",
        mapping.len(),
        config.matching.threshold,
        output.display()
    );
    for row in mapping.iter().filter(|m| !m.matched) {
        eprintln!("  no match: {:?} (best {:.3})", row.reference, row.score);
    }
    Ok(())
}
