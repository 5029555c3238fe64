use std::collections::HashMap;

use crate::models::ValidationError;
use crate::schema::{compile, ColumnSpec, CompiledColumn, Rule, ValidationMode};
use crate::table::CsvTable;

/// Validate every row of `table` against `schema`.
///
/// Errors come out in row order, then schema column order. Each cell yields
/// at most one error: the first rule it fails.
pub fn validate(table: &CsvTable, schema: &[ColumnSpec], mode: ValidationMode) -> Vec<ValidationError> {
    let compiled = compile(schema, mode);
    let mut errors = Vec::new();

    // (column, header position, values seen so far for Unique)
    let mut columns: Vec<(&CompiledColumn, usize, HashMap<String, usize>)> = Vec::new();
    for column in &compiled {
        match table.column_index(column.spec.name) {
            Some(idx) => columns.push((column, idx, HashMap::new())),
            None if column.rules.contains(&Rule::Present) => {
                errors.push(ValidationError::in_header(column.spec.name, "Missing column"));
            }
            None => {}
        }
    }

    for row in 0..table.len() {
        let row_number = row + 1;
        for (column, idx, seen) in columns.iter_mut() {
            let value = table.cell(row, *idx);
            if let Some(reason) = check_cell(table, row, value, column, seen, row_number) {
                errors.push(ValidationError::at_row(row_number, column.spec.name, reason));
            }
        }
    }

    errors
}

/// Parse a file and validate it. A file that is not valid CSV produces a
/// single file-level error instead of a table.
pub fn validate_bytes(
    data: &[u8],
    schema: &[ColumnSpec],
    mode: ValidationMode,
) -> (Option<CsvTable>, Vec<ValidationError>) {
    match CsvTable::parse(data) {
        Ok(table) => {
            let errors = validate(&table, schema, mode);
            (Some(table), errors)
        }
        Err(e) => (
            None,
            vec![ValidationError::in_header("file", format!("Malformed CSV ({e})"))],
        ),
    }
}

fn check_cell(
    table: &CsvTable,
    row: usize,
    value: Option<&str>,
    column: &CompiledColumn,
    seen: &mut HashMap<String, usize>,
    row_number: usize,
) -> Option<String> {
    for rule in &column.rules {
        let Some(raw) = value else {
            if *rule == Rule::NotNull {
                return Some("Missing required value".to_string());
            }
            continue;
        };
        let raw = raw.trim();
        match rule {
            Rule::Present | Rule::NotNull => {}
            Rule::Numeric => {
                if raw.parse::<f64>().is_err() {
                    return Some("Non-numeric value".to_string());
                }
            }
            Rule::Integer => {
                if raw.parse::<i64>().is_err() {
                    return Some(if raw.parse::<f64>().is_ok() {
                        "Non-integer value".to_string()
                    } else {
                        "Non-numeric value".to_string()
                    });
                }
            }
            Rule::NonNegative => match raw.parse::<f64>() {
                Ok(v) if v < 0.0 => return Some("Negative value not allowed".to_string()),
                Ok(_) => {}
                Err(_) => return Some("Non-numeric value".to_string()),
            },
            Rule::ValidDate => {
                if table.date(row).is_none() {
                    return Some("Unparsable date (expected MM/DD/YYYY)".to_string());
                }
            }
            Rule::Unique => {
                let key = raw
                    .parse::<i64>()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|_| raw.to_string());
                if let Some(first) = seen.get(&key) {
                    return Some(format!("Duplicate value (first seen at row {first})"));
                }
                seen.insert(key, row_number);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TRANSACTION_SCHEMA;

    const HEADER: &str =
        "transaction_id,product_name,category,price,quantity,date,customer_name,customer_email";

    fn run(body: &str, mode: ValidationMode) -> Vec<String> {
        let table = CsvTable::parse(format!("{HEADER}\n{body}").as_bytes()).unwrap();
        validate(&table, TRANSACTION_SCHEMA, mode)
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    fn observed(body: &str) -> Vec<String> {
        run(body, ValidationMode::Observed)
    }

    fn strict(body: &str) -> Vec<String> {
        run(body, ValidationMode::Strict)
    }

    #[test]
    fn test_clean_file_has_no_errors() {
        let body = "1,Pen,Office,10.0,2,01/15/2024,Ann,ann@example.com\n\
                    2,Ink,Office,3.5,1,01/16/2024,,\n";
        assert!(observed(body).is_empty());
        assert!(strict(body).is_empty());
    }

    #[test]
    fn test_negative_price_on_second_row() {
        let body = "1,Pen,Office,10.0,2,01/15/2024,,\n\
                    2,Ink,Office,-5.0,3,01/16/2024,,\n";
        assert_eq!(observed(body), vec!["Negative value not allowed for price at row 2"]);
    }

    #[test]
    fn test_one_error_per_negative_column() {
        let errors = observed("-1,Pen,Office,-2,-3,01/15/2024,,\n");
        assert_eq!(
            errors,
            vec![
                "Negative value not allowed for transaction_id at row 1",
                "Negative value not allowed for price at row 1",
                "Negative value not allowed for quantity at row 1",
            ]
        );
    }

    #[test]
    fn test_non_numeric_is_a_single_coercion_error() {
        let errors = observed("abc,Pen,Office,ten,2x,01/15/2024,,\n");
        assert_eq!(
            errors,
            vec![
                "Non-numeric value for transaction_id at row 1",
                "Non-numeric value for price at row 1",
                "Non-numeric value for quantity at row 1",
            ]
        );
    }

    #[test]
    fn test_observed_skips_nulls_and_other_columns() {
        assert!(observed(",,,,,,,\n").is_empty());
        assert!(observed("1,,,NaN, 2 ,,,\n").is_empty());
    }

    #[test]
    fn test_observed_ignores_unparsable_date() {
        assert!(observed("1,Pen,Office,1.0,1,13/40/2024,,\n").is_empty());
    }

    #[test]
    fn test_observed_ignores_missing_columns() {
        let table = CsvTable::parse(b"product_name,price\nPen,-1\n").unwrap();
        let errors = validate(&table, TRANSACTION_SCHEMA, ValidationMode::Observed);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].column, "price");
    }

    #[test]
    fn test_strict_flags_unparsable_date() {
        assert_eq!(
            strict("1,Pen,Office,1.0,1,13/40/2024,,\n"),
            vec!["Unparsable date (expected MM/DD/YYYY) for date at row 1"]
        );
    }

    #[test]
    fn test_strict_flags_missing_required_values() {
        assert_eq!(
            strict("1,,Office,1.0,1,,,\n"),
            vec![
                "Missing required value for product_name at row 1",
                "Missing required value for date at row 1",
            ]
        );
    }

    #[test]
    fn test_strict_flags_duplicate_ids() {
        let body = "7,Pen,Office,1.0,1,01/01/2024,,\n\
                    8,Ink,Office,1.0,1,01/01/2024,,\n\
                    07,Pad,Office,1.0,1,01/01/2024,,\n";
        assert_eq!(
            strict(body),
            vec!["Duplicate value (first seen at row 1) for transaction_id at row 3"]
        );
        assert!(observed(body).is_empty());
    }

    #[test]
    fn test_strict_integer_columns() {
        assert_eq!(
            strict("1,Pen,Office,1.0,1.5,01/01/2024,,\n"),
            vec!["Non-integer value for quantity at row 1"]
        );
    }

    #[test]
    fn test_strict_reports_missing_columns_in_header() {
        let table = CsvTable::parse(b"transaction_id,product_name\n1,Pen\n").unwrap();
        let errors: Vec<String> = validate(&table, TRANSACTION_SCHEMA, ValidationMode::Strict)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(errors.len(), 6);
        assert_eq!(errors[0], "Missing column for category in header");
    }

    #[test]
    fn test_malformed_file() {
        let (table, errors) = validate_bytes(b"", TRANSACTION_SCHEMA, ValidationMode::Observed);
        assert!(table.is_none());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].reason.starts_with("Malformed CSV"));
    }
}
