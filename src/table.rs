use chrono::NaiveDate;

use crate::error::{FlowError, Result};
use crate::schema::ColumnSpec;

/// Cell values read as missing.
const NULL_TOKENS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

pub const DATE_COLUMN: &str = "date";

pub fn parse_date_mdy(raw: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = raw.trim().split('/').collect();
    if parts.len() != 3 || parts[2].len() != 4 {
        return None;
    }
    if parts
        .iter()
        .any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }
    let m: u32 = parts[0].parse().ok()?;
    let d: u32 = parts[1].parse().ok()?;
    let y: i32 = parts[2].parse().ok()?;
    NaiveDate::from_ymd_opt(y, m, d)
}

fn normalize(cell: &str) -> Option<String> {
    if NULL_TOKENS.contains(&cell.trim()) {
        None
    } else {
        Some(cell.to_string())
    }
}

/// A CSV file parsed once: raw cells by header, plus the `date` column
/// reparsed from `MM/DD/YYYY`.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvTable {
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
    /// `Some` when the file has a `date` column; unparsable dates are `None`.
    dates: Option<Vec<Option<NaiveDate>>>,
}

impl CsvTable {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(data);

        let headers: Vec<String> = rdr
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let h = if i == 0 { h.trim_start_matches('\u{feff}') } else { h };
                h.trim().to_string()
            })
            .collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(FlowError::Other("missing header row".to_string()));
        }

        let mut rows = Vec::new();
        for (idx, result) in rdr.records().enumerate() {
            let record = result?;
            if record.len() > headers.len() {
                return Err(FlowError::Other(format!(
                    "row {} has {} fields, header has {}",
                    idx + 1,
                    record.len(),
                    headers.len()
                )));
            }
            let mut row: Vec<Option<String>> = record.iter().map(normalize).collect();
            row.resize(headers.len(), None);
            rows.push(row);
        }

        let dates = headers.iter().position(|h| h == DATE_COLUMN).map(|col| {
            rows.iter()
                .map(|row| row[col].as_deref().and_then(parse_date_mdy))
                .collect()
        });

        Ok(Self {
            headers,
            rows,
            dates,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Raw cell at a 0-based row; `None` for nulls and absent columns.
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column)?.as_deref()
    }

    /// Parsed `date` at a 0-based row.
    pub fn date(&self, row: usize) -> Option<NaiveDate> {
        self.dates.as_ref()?.get(row).copied().flatten()
    }

    /// Serialise back to CSV for a warehouse load: header plus rows, columns
    /// in `schema` order, dates as `YYYY-MM-DD`, nulls as empty fields.
    /// Columns outside the schema are dropped.
    pub fn to_load_csv(&self, schema: &[ColumnSpec]) -> Result<String> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(schema.iter().map(|c| c.name))?;

        let positions: Vec<Option<usize>> =
            schema.iter().map(|c| self.column_index(c.name)).collect();
        for row in 0..self.rows.len() {
            let fields: Vec<String> = schema
                .iter()
                .zip(&positions)
                .map(|(spec, pos)| {
                    if spec.name == DATE_COLUMN {
                        return self
                            .date(row)
                            .map(|d| d.format("%Y-%m-%d").to_string())
                            .unwrap_or_default();
                    }
                    pos.and_then(|p| self.cell(row, p))
                        .unwrap_or_default()
                        .to_string()
                })
                .collect();
            wtr.write_record(&fields)?;
        }

        let bytes = wtr
            .into_inner()
            .map_err(|e| FlowError::Other(format!("failed to flush CSV: {e}")))?;
        String::from_utf8(bytes).map_err(|e| FlowError::Other(e.to_string()))
    }
}
