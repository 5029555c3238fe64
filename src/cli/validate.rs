use std::path::Path;

use colored::Colorize;

use crate::error::Result;
use crate::schema::{ValidationMode, TRANSACTION_SCHEMA};
use crate::settings::Settings;
use crate::validator::validate_bytes;

pub fn run(settings: &Settings, file: &Path, strict: bool, json: bool) -> Result<()> {
    let mode = if strict {
        ValidationMode::Strict
    } else {
        settings.validation
    };
    let data = std::fs::read(file)?;
    let (table, errors) = validate_bytes(&data, TRANSACTION_SCHEMA, mode);

    if json {
        println!("{}", serde_json::to_string_pretty(&errors)?);
        return Ok(());
    }

    let rows = table.as_ref().map_or(0, |t| t.len());
    if table.as_ref().is_some_and(|t| t.is_empty()) {
        println!("{}", "Header only: the file has no data rows.".yellow());
    }
    if errors.is_empty() {
        println!("{} {rows} rows, no errors", "Valid:".green().bold());
    } else {
        for error in &errors {
            println!("{error}");
        }
        println!();
        println!(
            "{} {} error(s) in {rows} rows; this file would be routed to error/",
            "Invalid:".red().bold(),
            errors.len()
        );
    }
    Ok(())
}
