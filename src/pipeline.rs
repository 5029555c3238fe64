use std::collections::HashMap;
use std::str::FromStr;

use rusqlite::Connection;

use crate::error::Result;
use crate::loader::{load_file, ParsedFile};
use crate::models::{FileReport, Folder, RouteOutcome, RunReport};
use crate::router::{recover, route};
use crate::scanner::scan;
use crate::schema::{ValidationMode, TRANSACTION_SCHEMA};
use crate::store::{checksum, ObjectStore};
use crate::validator::validate_bytes;
use crate::warehouse::{LoadJobConfig, Warehouse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    All,
    Intake,
    Load,
}

impl Phase {
    fn intake(&self) -> bool {
        matches!(self, Self::All | Self::Intake)
    }

    fn load(&self) -> bool {
        matches!(self, Self::All | Self::Load)
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "intake" => Ok(Self::Intake),
            "load" => Ok(Self::Load),
            other => Err(format!("unknown phase: {other} (expected all, intake or load)")),
        }
    }
}

/// Resolved inputs for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Fully-qualified destination table.
    pub table: String,
    pub validation: ValidationMode,
    pub load: LoadJobConfig,
}

/// Validate one `input/` object and route it. Returns the parsed table when
/// the file went to `clean/`, so the load phase does not download it again.
pub fn intake_file(
    store: &dyn ObjectStore,
    conn: &Connection,
    validation: ValidationMode,
    name: &str,
) -> Result<(FileReport, Option<ParsedFile>)> {
    let data = store.read(name)?;
    let sum = checksum(&data);
    let (table, errors) = validate_bytes(&data, TRANSACTION_SCHEMA, validation);
    for error in &errors {
        tracing::debug!(file = name, "{error}");
    }
    if !errors.is_empty() {
        tracing::info!(file = name, errors = errors.len(), "validation failed");
    }

    let outcome = route(store, conn, name, &sum, !errors.is_empty())?;
    let parsed = match (&outcome, table) {
        (RouteOutcome::Clean { .. }, Some(table)) => Some(ParsedFile {
            checksum: sum,
            table,
        }),
        _ => None,
    };

    let mut report = FileReport::new(name);
    report.errors = errors;
    report.route = Some(outcome);
    Ok((report, parsed))
}

/// Recover unfinished moves, then run the requested phases in order.
///
/// Store and journal failures abort the run; everything done so far is
/// recorded in the journal, so the next run picks up from there.
pub fn run(
    store: &dyn ObjectStore,
    conn: &Connection,
    config: &PipelineConfig,
    phase: Phase,
) -> Result<RunReport> {
    let mut report = RunReport {
        recovered: recover(store, conn)?,
        files: Vec::new(),
    };
    let mut parsed: HashMap<String, ParsedFile> = HashMap::new();

    if phase.intake() {
        for object in scan(store, Folder::Input)? {
            let (file, table) = intake_file(store, conn, config.validation, &object.name)?;
            if let (Some(route), Some(table)) = (&file.route, table) {
                parsed.insert(route.destination().to_string(), table);
            }
            report.files.push(file);
        }
    }

    if phase.load() {
        let warehouse = Warehouse::new(conn, &config.table)?;
        for object in scan(store, Folder::Clean)? {
            let cached = parsed.remove(&object.name);
            let outcome = load_file(store, conn, &warehouse, &config.load, &object.name, cached)?;
            let existing = report.files.iter_mut().find(|f| {
                f.route.as_ref().map(RouteOutcome::destination) == Some(object.name.as_str())
            });
            match existing {
                Some(file) => file.load = Some(outcome),
                None => {
                    let mut file = FileReport::new(&object.name);
                    file.load = Some(outcome);
                    report.files.push(file);
                }
            }
        }
    }

    tracing::info!(
        recovered = report.recovered,
        clean = report.routed_to(Folder::Clean),
        error = report.routed_to(Folder::Error),
        loaded = report.loaded(),
        failed = report.failed_loads(),
        "run complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use crate::models::LoadOutcome;
    use crate::store::LocalStore;
    use crate::warehouse::WriteDisposition;

    const TABLE: &str = "proj.sales.transactions";
    const HEADER: &str =
        "transaction_id,product_name,category,price,quantity,date,customer_name,customer_email";

    fn setup() -> (tempfile::TempDir, tempfile::TempDir, LocalStore, Connection, PipelineConfig) {
        let bucket_dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(bucket_dir.path(), "b").unwrap();
        let (db_dir, conn) = test_db();
        let config = PipelineConfig {
            table: TABLE.to_string(),
            validation: ValidationMode::Observed,
            load: LoadJobConfig::transactions(WriteDisposition::Append),
        };
        Warehouse::new(&conn, TABLE)
            .unwrap()
            .create_table(&config.load.schema)
            .unwrap();
        (bucket_dir, db_dir, store, conn, config)
    }

    fn put(store: &LocalStore, name: &str, body: &str) {
        store.write(name, format!("{HEADER}\n{body}").as_bytes()).unwrap();
    }

    fn row_count(conn: &Connection) -> i64 {
        Warehouse::new(conn, TABLE).unwrap().row_count().unwrap()
    }

    #[test]
    fn test_negative_price_routes_to_error() {
        let (_b, _d, store, conn, config) = setup();
        put(
            &store,
            "input/orders1.csv",
            "1,Pen,Office,10.0,2,01/15/2024,,\n2,Ink,Office,-5.0,3,01/16/2024,,\n",
        );

        let report = run(&store, &conn, &config, Phase::All).unwrap();
        assert_eq!(report.files.len(), 1);
        let file = &report.files[0];
        assert_eq!(file.errors.len(), 1);
        assert_eq!(file.errors[0].column, "price");
        assert_eq!(file.errors[0].row, Some(2));
        assert_eq!(
            file.route,
            Some(RouteOutcome::Error {
                destination: "error/orders1.csv".into()
            })
        );
        assert_eq!(file.load, None);
        assert!(!store.exists("input/orders1.csv").unwrap());
        assert!(store.exists("error/orders1.csv").unwrap());
        assert_eq!(row_count(&conn), 0);
    }

    #[test]
    fn test_clean_file_is_loaded_and_done() {
        let (_b, _d, store, conn, config) = setup();
        put(&store, "input/orders2.csv", "1,Pen,Office,10.0,2,01/15/2024,Ann,ann@example.com\n");

        let report = run(&store, &conn, &config, Phase::All).unwrap();
        assert_eq!(report.files.len(), 1);
        let file = &report.files[0];
        assert!(file.errors.is_empty());
        assert_eq!(
            file.load,
            Some(LoadOutcome::Loaded {
                rows: 1,
                destination: "done/orders2.csv".into()
            })
        );
        assert_eq!(file.location(), "done/orders2.csv");
        assert!(store.list("input/").unwrap().is_empty());
        assert!(store.list("clean/").unwrap().is_empty());
        assert_eq!(row_count(&conn), 1);

        let rows = Warehouse::new(&conn, TABLE).unwrap().fetch(1).unwrap();
        assert_eq!(rows[0].date.to_string(), "2024-01-15");
    }

    #[test]
    fn test_invalid_date_passes_validation_but_fails_load() {
        let (_b, _d, store, conn, config) = setup();
        put(&store, "input/a.csv", "1,Pen,Office,10.0,2,13/40/2024,,\n");

        let report = run(&store, &conn, &config, Phase::All).unwrap();
        let file = &report.files[0];
        assert!(file.errors.is_empty());
        assert!(matches!(file.route, Some(RouteOutcome::Clean { .. })));
        assert!(matches!(file.load, Some(LoadOutcome::Failed { .. })));
        assert!(store.exists("clean/a.csv").unwrap());
        assert_eq!(report.failed_loads(), 1);
    }

    #[test]
    fn test_strict_mode_routes_invalid_date_to_error() {
        let (_b, _d, store, conn, mut config) = setup();
        config.validation = ValidationMode::Strict;
        put(&store, "input/a.csv", "1,Pen,Office,10.0,2,13/40/2024,,\n");

        let report = run(&store, &conn, &config, Phase::All).unwrap();
        assert!(matches!(report.files[0].route, Some(RouteOutcome::Error { .. })));
        assert!(store.exists("error/a.csv").unwrap());
    }

    #[test]
    fn test_non_csv_objects_are_ignored() {
        let (_b, _d, store, conn, config) = setup();
        store.write("input/notes.txt", b"hello").unwrap();
        let report = run(&store, &conn, &config, Phase::All).unwrap();
        assert!(report.files.is_empty());
        assert!(store.exists("input/notes.txt").unwrap());
    }

    #[test]
    fn test_malformed_csv_routes_to_error() {
        let (_b, _d, store, conn, config) = setup();
        store
            .write("input/bad.csv", format!("{HEADER}\n1,2,3,4,5,6,7,8,9,10\n").as_bytes())
            .unwrap();
        let report = run(&store, &conn, &config, Phase::All).unwrap();
        assert!(report.files[0].errors[0].reason.starts_with("Malformed CSV"));
        assert!(store.exists("error/bad.csv").unwrap());
    }

    #[test]
    fn test_intake_phase_only_leaves_files_in_clean() {
        let (_b, _d, store, conn, config) = setup();
        put(&store, "input/a.csv", "1,Pen,Office,10.0,2,01/15/2024,,\n");
        let report = run(&store, &conn, &config, Phase::Intake).unwrap();
        assert_eq!(report.files[0].load, None);
        assert!(store.exists("clean/a.csv").unwrap());

        // A later load-only run picks it up from the bucket.
        let report = run(&store, &conn, &config, Phase::Load).unwrap();
        assert_eq!(report.loaded(), 1);
        assert!(store.exists("done/a.csv").unwrap());
    }

    #[test]
    fn test_rerun_does_not_duplicate_rows() {
        let (_b, _d, store, conn, config) = setup();
        put(&store, "input/a.csv", "1,Pen,Office,10.0,2,01/15/2024,,\n");
        run(&store, &conn, &config, Phase::All).unwrap();
        let report = run(&store, &conn, &config, Phase::All).unwrap();
        assert!(report.files.is_empty());
        assert_eq!(row_count(&conn), 1);
    }

    #[test]
    fn test_identical_files_under_different_names_are_both_loaded() {
        let (_b, _d, store, conn, config) = setup();
        let body = "1,Pen,Office,10.0,2,01/15/2024,,\n";
        put(&store, "input/store_a.csv", body);
        put(&store, "input/store_b.csv", body);

        let report = run(&store, &conn, &config, Phase::All).unwrap();
        assert_eq!(report.loaded(), 2);
        assert!(report
            .files
            .iter()
            .all(|f| matches!(f.load, Some(LoadOutcome::Loaded { rows: 1, .. }))));
        assert_eq!(row_count(&conn), 2);
        assert!(store.exists("done/store_a.csv").unwrap());
        assert!(store.exists("done/store_b.csv").unwrap());
    }

    #[test]
    fn test_missing_table_fails_loads_without_aborting() {
        let (_b, _d, store, conn, mut config) = setup();
        config.table = "proj.sales.missing".to_string();
        put(&store, "input/a.csv", "1,Pen,Office,10.0,2,01/15/2024,,\n");
        put(&store, "input/b.csv", "2,Ink,Office,3.0,1,01/16/2024,,\n");
        let report = run(&store, &conn, &config, Phase::All).unwrap();
        assert_eq!(report.failed_loads(), 2);
        assert_eq!(store.list("clean/").unwrap().len(), 2);
    }

    #[test]
    fn test_phase_from_str() {
        assert_eq!("load".parse::<Phase>(), Ok(Phase::Load));
        assert!("everything".parse::<Phase>().is_err());
    }
}
