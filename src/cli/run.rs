use colored::Colorize;
use comfy_table::{Cell, Color, Table};

use crate::error::Result;
use crate::models::{FileReport, Folder, LoadOutcome, RouteOutcome, RunReport};
use crate::pipeline::{self, Phase, PipelineConfig};
use crate::settings::Settings;
use crate::warehouse::LoadJobConfig;

/// Validation errors printed per file before the rest are summarised.
const MAX_ERRORS_SHOWN: usize = 10;

pub fn run(settings: &Settings, phase: Phase, json: bool) -> Result<()> {
    let (store, conn) = super::open(settings)?;
    let config = PipelineConfig {
        table: settings.qualified_table()?,
        validation: settings.validation,
        load: LoadJobConfig::transactions(settings.write_disposition),
    };

    let report = pipeline::run(&store, &conn, &config, phase)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn route_cell(file: &FileReport) -> Cell {
    match &file.route {
        Some(RouteOutcome::Clean { .. }) => Cell::new("clean").fg(Color::Green),
        Some(RouteOutcome::Error { .. }) => Cell::new("error").fg(Color::Red),
        None => Cell::new("-"),
    }
}

fn load_cell(file: &FileReport) -> Cell {
    match &file.load {
        Some(LoadOutcome::Loaded { rows, .. }) => Cell::new(format!("{rows} rows")).fg(Color::Green),
        Some(LoadOutcome::AlreadyLoaded { .. }) => Cell::new("already loaded").fg(Color::Yellow),
        Some(LoadOutcome::Failed { .. }) => Cell::new("failed").fg(Color::Red),
        None => Cell::new("-"),
    }
}

fn print_report(report: &RunReport) {
    if report.recovered > 0 {
        println!("Recovered {} unfinished move(s).", report.recovered);
    }
    if report.files.is_empty() {
        println!("No CSV files to process.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["File", "Errors", "Route", "Load", "Now at"]);
    for file in &report.files {
        table.add_row(vec![
            Cell::new(&file.name),
            Cell::new(file.errors.len()),
            route_cell(file),
            load_cell(file),
            Cell::new(file.location()),
        ]);
    }
    println!("{table}");

    for file in &report.files {
        if !file.errors.is_empty() {
            println!();
            println!("{}", file.name.bold());
            for error in file.errors.iter().take(MAX_ERRORS_SHOWN) {
                println!("  {error}");
            }
            if file.errors.len() > MAX_ERRORS_SHOWN {
                println!("  ... and {} more", file.errors.len() - MAX_ERRORS_SHOWN);
            }
        }
        if let Some(LoadOutcome::Failed { message }) = &file.load {
            println!();
            println!("{} {}", file.name.bold(), "load failed:".red());
            println!("  {message}");
        }
    }

    println!();
    println!(
        "{} clean, {} error, {} loaded, {} failed",
        report.routed_to(Folder::Clean),
        report.routed_to(Folder::Error),
        report.loaded(),
        report.failed_loads()
    );
}
