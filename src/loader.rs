use rusqlite::Connection;

use crate::error::{FlowError, Result};
use crate::models::{Folder, LoadOutcome};
use crate::router::move_object;
use crate::schema::TRANSACTION_SCHEMA;
use crate::store::{checksum, ObjectStore};
use crate::table::CsvTable;
use crate::warehouse::{LoadJobConfig, Warehouse};

/// A clean file already downloaded and parsed during intake.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub checksum: String,
    pub table: CsvTable,
}

/// Load one `clean/` object and move it to `done/`.
///
/// Store failures while downloading propagate. Everything after that, the
/// load job and the final move, is contained: a failure is logged and
/// returned as [`LoadOutcome::Failed`], leaving the object in `clean/`.
pub fn load_file(
    store: &dyn ObjectStore,
    conn: &Connection,
    warehouse: &Warehouse<'_>,
    config: &LoadJobConfig,
    name: &str,
    parsed: Option<ParsedFile>,
) -> Result<LoadOutcome> {
    let destination = Folder::Clean
        .relocate(name, Folder::Done)
        .ok_or_else(|| FlowError::InvalidObjectName(name.to_string()))?;

    let parsed = match parsed {
        Some(parsed) => Ok(parsed),
        None => {
            let data = store.read(name)?;
            CsvTable::parse(&data).map(|table| ParsedFile {
                checksum: checksum(&data),
                table,
            })
        }
    };

    let outcome = parsed.and_then(|parsed| {
        submit(store, conn, warehouse, config, name, &destination, &parsed)
    });
    match outcome {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            tracing::warn!(file = name, error = %e, "load failed; file left in clean/");
            Ok(LoadOutcome::Failed {
                message: e.to_string(),
            })
        }
    }
}

fn submit(
    store: &dyn ObjectStore,
    conn: &Connection,
    warehouse: &Warehouse<'_>,
    config: &LoadJobConfig,
    name: &str,
    destination: &str,
    parsed: &ParsedFile,
) -> Result<LoadOutcome> {
    if let Some(job) = warehouse.find_job(name, &parsed.checksum)? {
        tracing::info!(file = name, job, "already loaded; skipping load");
        move_object(store, conn, name, destination, &parsed.checksum)?;
        return Ok(LoadOutcome::AlreadyLoaded {
            destination: destination.to_string(),
        });
    }

    let csv_text = parsed.table.to_load_csv(TRANSACTION_SCHEMA)?;
    let job = warehouse.load_csv(name, &parsed.checksum, &csv_text, config)?;
    tracing::info!(file = name, table = %job.table, rows = job.rows, job = job.id, "loaded");

    move_object(store, conn, name, destination, &parsed.checksum)?;
    Ok(LoadOutcome::Loaded {
        rows: job.rows,
        destination: destination.to_string(),
    })
}
