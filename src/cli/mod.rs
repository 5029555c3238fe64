pub mod init;
pub mod put;
pub mod recover;
pub mod rows;
pub mod run;
pub mod status;
pub mod validate;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::pipeline::Phase;
use crate::settings::{default_settings_path, Settings};
use crate::store::LocalStore;

#[derive(Parser)]
#[command(
    name = "txnflow",
    about = "Validate CSV transaction files in a bucket, route them and load clean ones into the warehouse."
)]
pub struct Cli {
    /// Settings file (default: ~/.config/txnflow/settings.json)
    #[arg(long, global = true, env = "TXNFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level when RUST_LOG is not set: error, warn, info, debug, trace
    #[arg(long = "log-level", global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn settings_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(default_settings_path)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save settings and create the bucket folders, control tables and destination table.
    Init {
        /// Directory holding buckets
        #[arg(long = "storage-root")]
        storage_root: Option<String>,
        /// Bucket name
        #[arg(long)]
        bucket: Option<String>,
        /// Project used to qualify `dataset.table` names
        #[arg(long)]
        project: Option<String>,
        /// Destination table: dataset.table or project.dataset.table
        #[arg(long)]
        table: Option<String>,
        /// Warehouse database file
        #[arg(long)]
        warehouse: Option<String>,
        /// Validation mode: observed or strict
        #[arg(long)]
        validation: Option<String>,
        /// Load write disposition: append, truncate or empty
        #[arg(long = "write-disposition")]
        write_disposition: Option<String>,
    },
    /// Upload local CSV files into input/.
    Put {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Recover unfinished moves, validate and route input/, load clean/.
    Run {
        /// Which phases to run: all, intake, load
        #[arg(long, default_value = "all")]
        phase: Phase,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate a local CSV file without touching the bucket.
    Validate {
        /// File to check
        file: PathBuf,
        /// Enforce the full declared schema regardless of settings
        #[arg(long)]
        strict: bool,
        /// Print errors as JSON
        #[arg(long)]
        json: bool,
    },
    /// Finish moves a previous run left half done.
    Recover,
    /// Show settings, bucket contents and warehouse state.
    Status,
    /// Show the most recently loaded warehouse rows.
    Rows {
        /// Number of rows
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

/// Bucket and warehouse connection for resolved settings. Control tables are
/// created if missing.
pub(crate) fn open(settings: &Settings) -> Result<(LocalStore, Connection)> {
    let store = LocalStore::open(&settings.storage_root(), &settings.bucket)?;
    let conn = get_connection(&settings.warehouse_path())?;
    init_db(&conn)?;
    Ok((store, conn))
}
