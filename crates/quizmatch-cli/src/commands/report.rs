//! The `quizmatch report` command.

use std::path::PathBuf;

use anyhow::Result;

use quizmatch_core::config::{QuizmatchConfig, ReportFormat};
use quizmatch_core::table::{read_graded, read_wide_questions};
use quizmatch_report::write_student_reports;

use super::{load_config, Overrides};

pub fn execute(
    graded: PathBuf,
    questions: PathBuf,
    output: PathBuf,
    format: Option<String>,
    only_incorrect: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(config_path.as_deref(), Overrides::default())?;
    apply_report_flags(&mut config, format.as_deref(), only_incorrect)?;

    let key = read_wide_questions(&questions)?;
    let rows = read_graded(&graded)?;
    let written = write_student_reports(&output, &rows, &key, &config.report)?;

    println!("Wrote {} report file(s) to {}", written.len(), output.display());
    Ok(())
}

/// Fold `--format` and `--only-incorrect` into the report config.
pub fn apply_report_flags(
    config: &mut QuizmatchConfig,
    format: Option<&str>,
    only_incorrect: bool,
) -> Result<()> {
    if let Some(format) = format {
        config.report.formats = if format == "all" {
            vec![ReportFormat::Markdown, ReportFormat::Html]
        } else {
            format
                .split(',')
                .map(|f| f.parse::<ReportFormat>().map_err(anyhow::Error::msg))
                .collect::<Result<Vec<_>>>()?
        };
    }
    anyhow::ensure!(
        !config.report.formats.is_empty(),
        "at least one report format is required"
    );
    config.report.only_incorrect |= only_incorrect;
    Ok(())
}
