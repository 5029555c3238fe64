use std::path::PathBuf;

use colored::Colorize;

use crate::error::{FlowError, Result};
use crate::models::Folder;
use crate::scanner::is_csv;
use crate::settings::Settings;
use crate::store::ObjectStore;

pub fn run(settings: &Settings, files: &[PathBuf]) -> Result<()> {
    let (store, _conn) = super::open(settings)?;
    for file in files {
        let file_name = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| FlowError::Other(format!("not a file: {}", file.display())))?;
        let name = format!("{}{file_name}", Folder::Input.prefix());
        let data = std::fs::read(file)?;
        store.write(&name, &data)?;
        if is_csv(&name) {
            println!("Uploaded {} \u{2192} {name}", file.display());
        } else {
            println!(
                "Uploaded {} \u{2192} {name} {}",
                file.display(),
                "(not a .csv file; it will be ignored)".yellow()
            );
        }
    }
    Ok(())
}
