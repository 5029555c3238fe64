//! The destination table and its batch load jobs.
//!
//! A load job takes CSV text, skips the configured header rows, coerces every
//! field by position against the job schema and appends the rows in one
//! SQLite transaction. Any bad line fails the whole job and nothing is
//! written. The job is recorded in `load_jobs` inside the same transaction,
//! keyed by the source object's name and checksum.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};
use crate::models::Record;
use crate::schema::{ColumnSpec, ColumnType, TRANSACTION_SCHEMA};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMode {
    Required,
    Nullable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    pub name: String,
    pub field_type: ColumnType,
    pub mode: FieldMode,
}

impl From<&ColumnSpec> for SchemaField {
    fn from(spec: &ColumnSpec) -> Self {
        Self {
            name: spec.name.to_string(),
            field_type: spec.column_type,
            mode: if spec.nullable {
                FieldMode::Nullable
            } else {
                FieldMode::Required
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteDisposition {
    /// Add rows to whatever the table holds.
    #[default]
    Append,
    /// Replace the table contents.
    Truncate,
    /// Only load into an empty table.
    Empty,
}

impl std::str::FromStr for WriteDisposition {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "append" => Ok(Self::Append),
            "truncate" => Ok(Self::Truncate),
            "empty" => Ok(Self::Empty),
            other => Err(format!(
                "unknown write disposition: {other} (expected append, truncate or empty)"
            )),
        }
    }
}

impl WriteDisposition {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Append => "append",
            Self::Truncate => "truncate",
            Self::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadJobConfig {
    pub schema: Vec<SchemaField>,
    pub write_disposition: WriteDisposition,
    pub skip_leading_rows: usize,
    pub source_format: SourceFormat,
}

impl LoadJobConfig {
    /// The fixed eight-column transaction load.
    pub fn transactions(write_disposition: WriteDisposition) -> Self {
        Self {
            schema: TRANSACTION_SCHEMA.iter().map(SchemaField::from).collect(),
            write_disposition,
            skip_leading_rows: 1,
            source_format: SourceFormat::Csv,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadJob {
    pub id: i64,
    pub table: String,
    pub rows: usize,
}

fn table_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*\.[A-Za-z_][A-Za-z0-9_]*\.[A-Za-z_][A-Za-z0-9_]*$")
            .expect("table name pattern is valid")
    })
}

/// Qualify `dataset.table` with `project`; pass `project.dataset.table`
/// through. The result must be a valid three-part name.
pub fn qualify_table(project: &str, table: &str) -> Result<String> {
    let qualified = match table.split('.').count() {
        2 => format!("{project}.{table}"),
        _ => table.to_string(),
    };
    if !table_name_re().is_match(&qualified) {
        return Err(FlowError::InvalidTableName(qualified));
    }
    Ok(qualified)
}

fn sql_type(field: &SchemaField) -> &'static str {
    match field.field_type {
        ColumnType::Integer => "INTEGER",
        ColumnType::Float => "REAL",
        ColumnType::String | ColumnType::Date => "TEXT",
    }
}

fn coerce(field: &SchemaField, raw: &str) -> std::result::Result<Value, String> {
    if raw.is_empty() {
        return match field.mode {
            FieldMode::Required => Err(format!("required field {} is null", field.name)),
            FieldMode::Nullable => Ok(Value::Null),
        };
    }
    let invalid = || {
        format!(
            "invalid {} value {raw:?} for field {}",
            field.field_type.sql_name(),
            field.name
        )
    };
    match field.field_type {
        ColumnType::Integer => raw.trim().parse::<i64>().map(Value::Integer).map_err(|_| invalid()),
        ColumnType::Float => raw.trim().parse::<f64>().map(Value::Real).map_err(|_| invalid()),
        ColumnType::String => Ok(Value::Text(raw.to_string())),
        ColumnType::Date => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map(|d| Value::Text(d.format("%Y-%m-%d").to_string()))
            .map_err(|_| invalid()),
    }
}

pub struct Warehouse<'a> {
    conn: &'a Connection,
    table: String,
}

impl<'a> Warehouse<'a> {
    pub fn new(conn: &'a Connection, table: &str) -> Result<Self> {
        if !table_name_re().is_match(table) {
            return Err(FlowError::InvalidTableName(table.to_string()));
        }
        Ok(Self {
            conn,
            table: table.to_string(),
        })
    }

    fn quoted(&self) -> String {
        format!("\"{}\"", self.table)
    }

    pub fn table_exists(&self) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
        Ok(stmt.exists([&self.table])?)
    }

    pub fn create_table(&self, schema: &[SchemaField]) -> Result<()> {
        let columns: Vec<String> = schema
            .iter()
            .map(|f| {
                let not_null = if f.mode == FieldMode::Required { " NOT NULL" } else { "" };
                format!("    {} {}{}", f.name, sql_type(f), not_null)
            })
            .collect();
        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n);",
            self.quoted(),
            columns.join(",\n")
        ))?;
        Ok(())
    }

    pub fn row_count(&self) -> Result<i64> {
        if !self.table_exists()? {
            return Err(FlowError::TableNotFound(self.table.clone()));
        }
        let count = self
            .conn
            .query_row(&format!("SELECT count(*) FROM {}", self.quoted()), [], |r| r.get(0))?;
        Ok(count)
    }

    /// A completed load job for this object name and content, if any.
    /// Another object with the same bytes is a separate file and does not match.
    pub fn find_job(&self, source: &str, checksum: &str) -> Result<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM load_jobs \
                 WHERE source = ?1 AND checksum = ?2 AND table_name = ?3 ORDER BY id LIMIT 1",
                params![source, checksum, self.table],
                |r| r.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Run a load job and block until it has committed or failed.
    pub fn load_csv(
        &self,
        source: &str,
        checksum: &str,
        csv_text: &str,
        config: &LoadJobConfig,
    ) -> Result<LoadJob> {
        if !self.table_exists()? {
            return Err(FlowError::TableNotFound(self.table.clone()));
        }
        let tx = self.conn.unchecked_transaction()?;
        match config.write_disposition {
            WriteDisposition::Append => {}
            WriteDisposition::Truncate => {
                tx.execute(&format!("DELETE FROM {}", self.quoted()), [])?;
            }
            WriteDisposition::Empty => {
                let existing: i64 =
                    tx.query_row(&format!("SELECT count(*) FROM {}", self.quoted()), [], |r| r.get(0))?;
                if existing > 0 {
                    return Err(FlowError::Load {
                        line: 0,
                        message: format!("table {} is not empty", self.table),
                    });
                }
            }
        }

        let columns: Vec<&str> = config.schema.iter().map(|f| f.name.as_str()).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.quoted(),
            columns.join(", "),
            placeholders.join(", ")
        );

        let mut rdr = match config.source_format {
            SourceFormat::Csv => csv::ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_reader(csv_text.as_bytes()),
        };

        let mut rows = 0usize;
        {
            let mut stmt = tx.prepare(&sql)?;
            for (idx, result) in rdr.records().enumerate() {
                let record = result?;
                if idx < config.skip_leading_rows {
                    continue;
                }
                let line = record.position().map_or(idx as u64 + 1, |p| p.line()) as usize;
                if record.len() != config.schema.len() {
                    return Err(FlowError::Load {
                        line,
                        message: format!(
                            "expected {} fields, found {}",
                            config.schema.len(),
                            record.len()
                        ),
                    });
                }
                let values = config
                    .schema
                    .iter()
                    .zip(record.iter())
                    .map(|(field, raw)| coerce(field, raw))
                    .collect::<std::result::Result<Vec<Value>, String>>()
                    .map_err(|message| FlowError::Load { line, message })?;
                stmt.execute(rusqlite::params_from_iter(values))?;
                rows += 1;
            }
        }

        tx.execute(
            "INSERT INTO load_jobs (source, checksum, table_name, row_count, write_disposition) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![source, checksum, self.table, rows as i64, config.write_disposition.key()],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(LoadJob {
            id,
            table: self.table.clone(),
            rows,
        })
    }

    /// Most recent rows first.
    pub fn fetch(&self, limit: usize) -> Result<Vec<Record>> {
        if !self.table_exists()? {
            return Err(FlowError::TableNotFound(self.table.clone()));
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT transaction_id, product_name, category, price, quantity, date, \
             customer_name, customer_email FROM {} ORDER BY rowid DESC LIMIT ?1",
            self.quoted()
        ))?;
        let records = stmt
            .query_map([limit as i64], |row| {
                Ok(Record {
                    transaction_id: row.get(0)?,
                    product_name: row.get(1)?,
                    category: row.get(2)?,
                    price: row.get(3)?,
                    quantity: row.get(4)?,
                    date: row.get(5)?,
                    customer_name: row.get(6)?,
                    customer_email: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }
}
