//! Pipeline configuration.
//!
//! Every field has a default, so an empty or missing `quizmatch.toml` yields a
//! working configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::grades::GradeSourceConfig;
use crate::matcher::MatchConfig;
use crate::pivot::OptionSchema;

/// Output document formats for student reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Markdown,
    Html,
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            "html" => Ok(ReportFormat::Html),
            other => Err(format!("unknown report format: {other}")),
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportFormat::Markdown => write!(f, "markdown"),
            ReportFormat::Html => write!(f, "html"),
        }
    }
}

/// Report rendering options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// List only questions the student did not answer correctly.
    #[serde(default)]
    pub only_incorrect: bool,
    #[serde(default = "default_formats")]
    pub formats: Vec<ReportFormat>,
}

fn default_formats() -> Vec<ReportFormat> {
    vec![ReportFormat::Markdown, ReportFormat::Html]
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            only_incorrect: false,
            formats: default_formats(),
        }
    }
}

/// Top-level quizmatch configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuizmatchConfig {
    #[serde(default)]
    pub matching: MatchConfig,
    #[serde(default)]
    pub schema: OptionSchema,
    #[serde(default)]
    pub grades: GradeSourceConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

impl QuizmatchConfig {
    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("matching.threshold", self.matching.threshold),
            ("matching.option_threshold", self.matching.option_threshold),
        ] {
            anyhow::ensure!(
                (0.0..=1.0).contains(&value),
                "{name} must be between 0.0 and 1.0, got {value}"
            );
        }
        anyhow::ensure!(
            (1..=crate::model::MAX_OPTIONS).contains(&self.schema.option_count),
            "schema.option_count must be between 1 and {}, got {}",
            crate::model::MAX_OPTIONS,
            self.schema.option_count
        );
        anyhow::ensure!(
            !self.grades.student_id_column.trim().is_empty(),
            "grades.student_id_column must not be empty"
        );
        Ok(())
    }
}

/// Load config from an explicit path, or search the default locations.
///
/// Search order without a path:
/// 1. `quizmatch.toml` in the current directory
/// 2. `~/.config/quizmatch/config.toml`
///
/// Environment variable override: `QUIZMATCH_THRESHOLD`.
pub fn load_config_from(path: Option<&Path>) -> Result<QuizmatchConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("quizmatch.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match &config_path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            parse_config(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => QuizmatchConfig::default(),
    };

    if let Ok(raw) = std::env::var("QUIZMATCH_THRESHOLD") {
        config.matching.threshold = raw
            .trim()
            .parse()
            .with_context(|| format!("invalid QUIZMATCH_THRESHOLD: {raw:?}"))?;
    }

    config.validate()?;

    match &config_path {
        Some(path) => tracing::debug!("loaded config from {}", path.display()),
        None => tracing::debug!("using default config"),
    }

    Ok(config)
}

/// Parse configuration from TOML text.
pub fn parse_config(content: &str) -> Result<QuizmatchConfig> {
    Ok(toml::from_str::<QuizmatchConfig>(content)?)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("quizmatch"))
}

/// Sample configuration written by `quizmatch init`.
pub const SAMPLE_CONFIG: &str = r#"# quizmatch configuration

[matching]
# Minimum similarity (0.0-1.0) for a grade-source question to match a quiz question.
threshold = 0.75
# Minimum similarity for a submitted answer text to match an option.
option_threshold = 0.75

[schema]
# Options per question (A, B, C, D).
option_count = 4

[grades]
# auto | flags | answers
layout = "auto"
student_id_column = "id"
student_name_column = "name"
section_column = "section"
score_column = "score"
front_columns = ["name", "id", "sis_id", "section", "section_id", "section_sis_id", "submitted", "attempt"]
summary_columns = ["n correct", "n incorrect", "score"]

[report]
only_incorrect = false
formats = ["markdown", "html"]
"#;
