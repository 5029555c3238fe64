use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};
use crate::schema::ValidationMode;
use crate::warehouse::{qualify_table, WriteDisposition};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_project")]
    pub project: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_storage_root")]
    pub storage_root: String,
    /// `dataset.table` or `project.dataset.table`.
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_warehouse_path")]
    pub warehouse_path: String,
    #[serde(default)]
    pub validation: ValidationMode,
    #[serde(default)]
    pub write_disposition: WriteDisposition,
}

fn default_project() -> String {
    "local".to_string()
}

fn default_bucket() -> String {
    "transactions".to_string()
}

fn default_table() -> String {
    "sales.transactions".to_string()
}

fn default_storage_root() -> String {
    data_dir().join("buckets").to_string_lossy().to_string()
}

fn default_warehouse_path() -> String {
    data_dir().join("warehouse.db").to_string_lossy().to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project: default_project(),
            bucket: default_bucket(),
            storage_root: default_storage_root(),
            table: default_table(),
            warehouse_path: default_warehouse_path(),
            validation: ValidationMode::default(),
            write_disposition: WriteDisposition::default(),
        }
    }
}

impl Settings {
    /// Fully-qualified destination table.
    pub fn qualified_table(&self) -> Result<String> {
        qualify_table(&self.project, &self.table)
    }

    pub fn storage_root(&self) -> PathBuf {
        PathBuf::from(shellexpand_path(&self.storage_root))
    }

    pub fn warehouse_path(&self) -> PathBuf {
        PathBuf::from(shellexpand_path(&self.warehouse_path))
    }

    /// Apply `TXNFLOW_*` variables from `lookup` on top of the file values.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("TXNFLOW_PROJECT") {
            self.project = v;
        }
        if let Some(v) = lookup("TXNFLOW_BUCKET") {
            self.bucket = v;
        }
        if let Some(v) = lookup("TXNFLOW_STORAGE_ROOT") {
            self.storage_root = v;
        }
        if let Some(v) = lookup("TXNFLOW_TABLE") {
            self.table = v;
        }
        if let Some(v) = lookup("TXNFLOW_WAREHOUSE") {
            self.warehouse_path = v;
        }
        if let Some(v) = lookup("TXNFLOW_VALIDATION") {
            self.validation = v.parse().map_err(FlowError::Settings)?;
        }
        if let Some(v) = lookup("TXNFLOW_WRITE_DISPOSITION") {
            self.write_disposition = v.parse().map_err(FlowError::Settings)?;
        }
        Ok(())
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("txnflow")
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("txnflow")
}

pub fn default_settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

/// Read settings from `path`; a missing file yields defaults. Unknown or
/// missing keys fall back to defaults, a malformed file is an error.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| FlowError::Settings(format!("{}: {e}", path.display())))
}

/// Settings file values overlaid with the process environment.
pub fn resolve_settings(path: &Path) -> Result<Settings> {
    let mut settings = load_settings(path)?;
    settings.apply_env(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))?;
    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            project: "acme".to_string(),
            bucket: "uploads".to_string(),
            storage_root: "/tmp/buckets".to_string(),
            table: "acme.sales.tx".to_string(),
            warehouse_path: "/tmp/wh.db".to_string(),
            validation: ValidationMode::Strict,
            write_disposition: WriteDisposition::Append,
        };
        save_settings(&path, &settings).unwrap();
        assert_eq!(load_settings(&path).unwrap(), settings);
    }

    #[test]
    fn test_load_returns_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let s = load_settings(&dir.path().join("nope.json")).unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.validation, ValidationMode::Observed);
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"project": "acme", "validation": "strict"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.project, "acme");
        assert_eq!(s.bucket, "transactions");
        assert_eq!(s.validation, ValidationMode::Strict);
        assert_eq!(s.qualified_table().unwrap(), "acme.sales.transactions");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_settings(&path), Err(FlowError::Settings(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("TXNFLOW_BUCKET", "from-env"),
            ("TXNFLOW_VALIDATION", "strict"),
            ("TXNFLOW_WRITE_DISPOSITION", "truncate"),
        ]
        .into_iter()
        .collect();
        let mut s = Settings::default();
        s.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(s.bucket, "from-env");
        assert_eq!(s.validation, ValidationMode::Strict);
        assert_eq!(s.write_disposition, WriteDisposition::Truncate);

        let mut s = Settings::default();
        let err = s.apply_env(|k| (k == "TXNFLOW_WRITE_DISPOSITION").then(|| "merge".to_string()));
        assert!(matches!(err, Err(FlowError::Settings(_))));

        let mut s = Settings::default();
        let err = s.apply_env(|k| (k == "TXNFLOW_VALIDATION").then(|| "loose".to_string()));
        assert!(err.is_err());
    }
}
