//! The `quizmatch extract` command.

use std::path::PathBuf;

use anyhow::Result;

use quizmatch_core::extract::extract_questions_file;
use quizmatch_core::table::write_question_bank;

use super::print_anomalies;

pub fn execute(input: PathBuf, output: PathBuf) -> Result<()> {
    let outcome = extract_questions_file(&input)?;
    print_anomalies(&outcome.anomalies);

    write_question_bank(&output, &outcome.value)?;
    let questions = outcome.value.iter().filter(|r| r.is_stem()).count();
    println!(
        "Extracted {} rows ({questions} questions) to {}",
        outcome.value.len(),
        output.display()
    );
    Ok(())
}
