//! The `quizmatch pivot` command.

use std::path::PathBuf;

use anyhow::Result;

use quizmatch_core::pivot::pivot_questions;
use quizmatch_core::table::{read_question_bank, write_wide_questions};

use super::{load_config, print_anomalies, Overrides};

pub fn execute(
    bank: PathBuf,
    output: PathBuf,
    options: Option<usize>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(
        config_path.as_deref(),
        Overrides {
            option_count: options,
            ..Overrides::default()
        },
    )?;

    let rows = read_question_bank(&bank)?;
    anyhow::ensure!(!rows.is_empty(), "question bank {} is empty", bank.display());

    let outcome = pivot_questions(&rows, &config.schema);
    print_anomalies(&outcome.anomalies);

    write_wide_questions(&output, &outcome.value, &config.schema)?;
    println!(
        "Pivoted {} questions to {}",
        outcome.value.len(),
        output.display()
    );
    Ok(())
}
