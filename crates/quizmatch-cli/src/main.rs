//! quizmatch CLI, the command-line front end to the grading pipeline.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "quizmatch",
    version,
    about = "Reconcile quiz exports with grade sheets and report per student"
)]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the question bank from a QTI quiz export
    Extract {
        /// QTI XML file
        #[arg(long)]
        input: PathBuf,

        /// Output question bank CSV
        #[arg(long, default_value = "question_bank.csv")]
        output: PathBuf,
    },

    /// Pivot the question bank into the wide answer key
    Pivot {
        /// Question bank CSV
        #[arg(long)]
        bank: PathBuf,

        /// Output wide table CSV
        #[arg(long, default_value = "questions_wide.csv")]
        output: PathBuf,

        /// Options per question (overrides config)
        #[arg(long)]
        options: Option<usize>,
    },

    /// Match grade-source question references to the answer key
    Map {
        /// Grade source CSV
        #[arg(long)]
        grades: PathBuf,

        /// Wide answer key CSV
        #[arg(long)]
        questions: PathBuf,

        /// Output mapping CSV
        #[arg(long, default_value = "question_mapping.csv")]
        output: PathBuf,

        /// Match threshold (overrides config)
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Grade every student answer against the answer key
    Grade {
        /// Grade source CSV
        #[arg(long)]
        grades: PathBuf,

        /// Wide answer key CSV
        #[arg(long)]
        questions: PathBuf,

        /// Output graded table CSV
        #[arg(long, default_value = "graded.csv")]
        output: PathBuf,

        /// Match threshold (overrides config)
        #[arg(long)]
        threshold: Option<f64>,

        /// Grade source layout: auto, flags, answers (overrides config)
        #[arg(long)]
        layout: Option<String>,
    },

    /// Render per-student reports from a graded table
    Report {
        /// Graded table CSV
        #[arg(long)]
        graded: PathBuf,

        /// Wide answer key CSV
        #[arg(long)]
        questions: PathBuf,

        /// Output directory
        #[arg(long, default_value = "reports")]
        output: PathBuf,

        /// Output format: markdown, html, all (overrides config)
        #[arg(long)]
        format: Option<String>,

        /// List only questions not answered correctly
        #[arg(long)]
        only_incorrect: bool,
    },

    /// Run the whole pipeline
    Run {
        /// QTI XML file
        #[arg(long)]
        quiz: PathBuf,

        /// Grade source CSV
        #[arg(long)]
        grades: PathBuf,

        /// Output directory
        #[arg(long, default_value = "./quizmatch-out")]
        output: PathBuf,

        /// Match threshold (overrides config)
        #[arg(long)]
        threshold: Option<f64>,

        /// Grade source layout: auto, flags, answers (overrides config)
        #[arg(long)]
        layout: Option<String>,

        /// Exit code 1 if any anomaly was recorded
        #[arg(long)]
        fail_on_anomaly: bool,
    },

    /// Create a starter quizmatch.toml
    Init,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("quizmatch=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Commands::Extract { input, output } => commands::extract::execute(input, output),
        Commands::Pivot {
            bank,
            output,
            options,
        } => commands::pivot::execute(bank, output, options, config),
        Commands::Map {
            grades,
            questions,
            output,
            threshold,
        } => commands::map::execute(grades, questions, output, threshold, config),
        Commands::Grade {
            grades,
            questions,
            output,
            threshold,
            layout,
        } => commands::grade::execute(grades, questions, output, threshold, layout, config),
        Commands::Report {
            graded,
            questions,
            output,
            format,
            only_incorrect,
        } => commands::report::execute(graded, questions, output, format, only_incorrect, config),
        Commands::Run {
            quiz,
            grades,
            output,
            threshold,
            layout,
            fail_on_anomaly,
        } => commands::run::execute(quiz, grades, output, threshold, layout, fail_on_anomaly, config),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
