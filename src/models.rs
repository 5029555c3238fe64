use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

/// Logical folders inside the bucket. The prefix of an object's name is the
/// only state the pipeline keeps about where a file is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Folder {
    Input,
    Error,
    Clean,
    Done,
}

impl Folder {
    pub const ALL: [Folder; 4] = [Folder::Input, Folder::Error, Folder::Clean, Folder::Done];

    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Input => "input/",
            Self::Error => "error/",
            Self::Clean => "clean/",
            Self::Done => "done/",
        }
    }

    /// Rename `name` from this folder into `to`. Only the leading prefix is
    /// replaced, so `input/input/a.csv` becomes `clean/input/a.csv`.
    pub fn relocate(&self, name: &str, to: Folder) -> Option<String> {
        name.strip_prefix(self.prefix())
            .filter(|rest| !rest.is_empty())
            .map(|rest| format!("{}{rest}", to.prefix()))
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix().trim_end_matches('/'))
    }
}

/// One transaction row as stored in the warehouse table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub transaction_id: i64,
    pub product_name: String,
    pub category: String,
    pub price: f64,
    pub quantity: i64,
    pub date: NaiveDate,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectMeta {
    pub name: String,
    pub size: u64,
}

/// A single validation failure. `row` is the 1-based data row; `None` means
/// the problem is with the file or its header rather than a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub row: Option<usize>,
    pub column: String,
    pub reason: String,
}

impl ValidationError {
    pub fn at_row(row: usize, column: &str, reason: impl Into<String>) -> Self {
        Self {
            row: Some(row),
            column: column.to_string(),
            reason: reason.into(),
        }
    }

    pub fn in_header(column: &str, reason: impl Into<String>) -> Self {
        Self {
            row: None,
            column: column.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row {
            Some(row) => write!(f, "{} for {} at row {}", self.reason, self.column, row),
            None => write!(f, "{} for {} in header", self.reason, self.column),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RouteOutcome {
    Clean { destination: String },
    Error { destination: String },
}

impl RouteOutcome {
    pub fn destination(&self) -> &str {
        match self {
            Self::Clean { destination } | Self::Error { destination } => destination.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadOutcome {
    Loaded { rows: usize, destination: String },
    AlreadyLoaded { destination: String },
    Failed { message: String },
}

/// Everything the pipeline did with one object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    pub name: String,
    pub errors: Vec<ValidationError>,
    pub route: Option<RouteOutcome>,
    pub load: Option<LoadOutcome>,
}

impl FileReport {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            errors: Vec::new(),
            route: None,
            load: None,
        }
    }

    /// Where the object lives after the run.
    pub fn location(&self) -> &str {
        match (&self.load, &self.route) {
            (Some(LoadOutcome::Loaded { destination, .. }), _)
            | (Some(LoadOutcome::AlreadyLoaded { destination }), _) => destination.as_str(),
            (_, Some(route)) => route.destination(),
            _ => self.name.as_str(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub recovered: usize,
    pub files: Vec<FileReport>,
}

impl RunReport {
    pub fn routed_to(&self, folder: Folder) -> usize {
        self.files
            .iter()
            .filter(|f| match (&f.route, folder) {
                (Some(RouteOutcome::Clean { .. }), Folder::Clean) => true,
                (Some(RouteOutcome::Error { .. }), Folder::Error) => true,
                _ => false,
            })
            .count()
    }

    pub fn loaded(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.load, Some(LoadOutcome::Loaded { .. })))
            .count()
    }

    pub fn failed_loads(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.load, Some(LoadOutcome::Failed { .. })))
            .count()
    }
}
