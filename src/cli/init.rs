use std::path::Path;

use crate::error::{FlowError, Result};
use crate::models::Folder;
use crate::settings::{load_settings, save_settings};
use crate::warehouse::{LoadJobConfig, Warehouse};

pub struct InitArgs {
    pub storage_root: Option<String>,
    pub bucket: Option<String>,
    pub project: Option<String>,
    pub table: Option<String>,
    pub warehouse: Option<String>,
    pub validation: Option<String>,
    pub write_disposition: Option<String>,
}

pub fn run(settings_path: &Path, args: InitArgs) -> Result<()> {
    // Start from the file only: values coming from the environment are not
    // persisted.
    let mut settings = load_settings(settings_path)?;
    if let Some(v) = args.storage_root {
        settings.storage_root = v;
    }
    if let Some(v) = args.bucket {
        settings.bucket = v;
    }
    if let Some(v) = args.project {
        settings.project = v;
    }
    if let Some(v) = args.table {
        settings.table = v;
    }
    if let Some(v) = args.warehouse {
        settings.warehouse_path = v;
    }
    if let Some(v) = args.validation {
        settings.validation = v.parse().map_err(FlowError::Settings)?;
    }
    if let Some(v) = args.write_disposition {
        settings.write_disposition = v.parse().map_err(FlowError::Settings)?;
    }
    let table = settings.qualified_table()?;

    save_settings(settings_path, &settings)?;

    let (store, conn) = super::open(&settings)?;
    for folder in Folder::ALL {
        std::fs::create_dir_all(store.root().join(folder.prefix()))?;
    }

    let warehouse = Warehouse::new(&conn, &table)?;
    let existed = warehouse.table_exists()?;
    warehouse.create_table(&LoadJobConfig::transactions(settings.write_disposition).schema)?;

    println!("Settings:   {}", settings_path.display());
    println!("Bucket:     {}", store.root().display());
    println!("Warehouse:  {}", settings.warehouse_path().display());
    if existed {
        println!("Table:      {table} (already exists)");
    } else {
        println!("Table:      {table} (created)");
    }
    Ok(())
}
