//! The `quizmatch init` command.

use anyhow::Result;

use quizmatch_core::config::SAMPLE_CONFIG;

pub fn execute() -> Result<()> {
    if std::path::Path::new("quizmatch.toml").exists() {
        println!("quizmatch.toml already exists, skipping.");
    } else {
        std::fs::write("quizmatch.toml", SAMPLE_CONFIG)?;
        println!("Created quizmatch.toml");
    }

    println!("\nNext steps:");
    println!("  1. Adjust the [grades] columns to match your grade sheet");
    println!("  2. Run: quizmatch run --quiz quiz.xml --grades grades.csv");

    Ok(())
}
