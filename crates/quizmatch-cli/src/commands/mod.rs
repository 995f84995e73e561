pub mod extract;
pub mod grade;
pub mod init;
pub mod map;
pub mod pivot;
pub mod report;
pub mod run;

use std::path::Path;

use anyhow::Result;

use quizmatch_core::config::{load_config_from, QuizmatchConfig};
use quizmatch_core::error::Anomaly;

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub threshold: Option<f64>,
    pub option_count: Option<usize>,
    pub layout: Option<String>,
}

/// Load configuration, apply command-line overrides, and re-validate.
pub fn load_config(path: Option<&Path>, overrides: Overrides) -> Result<QuizmatchConfig> {
    let mut config = load_config_from(path)?;
    if let Some(threshold) = overrides.threshold {
        config.matching.threshold = threshold;
    }
    if let Some(count) = overrides.option_count {
        config.schema.option_count = count;
    }
    if let Some(layout) = overrides.layout {
        config.grades.layout = layout.parse().map_err(anyhow::Error::msg)?;
    }
    config.validate()?;
    Ok(config)
}

/// Print collected anomalies to stderr.
pub fn print_anomalies(anomalies: &[Anomaly]) {
    if anomalies.is_empty() {
        return;
    }
    eprintln!("{} anomaly(ies) need attention:", anomalies.len());
    for a in anomalies {
        eprintln!("  [{}] {a}", a.kind());
    }
}
