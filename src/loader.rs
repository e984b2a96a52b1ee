//! CSV Loader
//!
//! Seeds the SQLite store from CSV files. Each load replaces the table.

use crate::error::{Result, ScoutError};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use tracing::info;

/// Storage class inferred for a CSV column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    fn sql(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }

    /// Widen to fit `cell`; Integer -> Real -> Text
    fn widen(self, cell: &str) -> Self {
        match self {
            ColumnType::Integer if cell.parse::<i64>().is_ok() => ColumnType::Integer,
            ColumnType::Integer | ColumnType::Real if cell.parse::<f64>().is_ok() => ColumnType::Real,
            _ => ColumnType::Text,
        }
    }

    fn value(&self, cell: &str) -> Value {
        if cell.is_empty() {
            return Value::Null;
        }
        match self {
            ColumnType::Integer => cell.parse().map(Value::Integer).unwrap_or(Value::Null),
            ColumnType::Real => cell.parse().map(Value::Real).unwrap_or(Value::Null),
            ColumnType::Text => Value::Text(cell.to_string()),
        }
    }
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Infer one type per column; empty cells don't vote and an all-empty column is TEXT
pub fn infer_column_types(column_count: usize, records: &[csv::StringRecord]) -> Vec<ColumnType> {
    (0..column_count)
        .map(|idx| {
            let mut seen = false;
            let inferred = records
                .iter()
                .filter_map(|r| r.get(idx).map(str::trim).filter(|c| !c.is_empty()))
                .fold(ColumnType::Integer, |ty, cell| {
                    seen = true;
                    ty.widen(cell)
                });
            if seen {
                inferred
            } else {
                ColumnType::Text
            }
        })
        .collect()
}

/// Replace `table` in the database at `db_path` with the contents of `csv_path`
pub fn load_csv(db_path: impl AsRef<Path>, table: &str, csv_path: impl AsRef<Path>) -> Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path.as_ref())?;
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(ScoutError::Execution(format!(
            "{} has no header row",
            csv_path.as_ref().display()
        )));
    }
    let records = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
    let types = infer_column_types(headers.len(), &records);

    let columns_ddl = headers
        .iter()
        .zip(&types)
        .map(|(name, ty)| format!("{} {}", quote_ident(name), ty.sql()))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; headers.len()].join(", ");
    let table_ident = quote_ident(table);

    let mut conn = Connection::open(db_path.as_ref())?;
    let tx = conn.transaction()?;
    tx.execute(&format!("DROP TABLE IF EXISTS {}", table_ident), [])?;
    tx.execute(&format!("CREATE TABLE {} ({})", table_ident, columns_ddl), [])?;
    {
        let mut insert = tx.prepare(&format!("INSERT INTO {} VALUES ({})", table_ident, placeholders))?;
        for record in &records {
            let values = types
                .iter()
                .enumerate()
                .map(|(idx, ty)| ty.value(record.get(idx).map(str::trim).unwrap_or_default()));
            insert.execute(params_from_iter(values))?;
        }
    }
    tx.commit()?;

    info!(
        table,
        rows = records.len(),
        db = %db_path.as_ref().display(),
        "Loaded CSV into SQLite"
    );
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(ext: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("scout-loader-{}.{}", uuid::Uuid::new_v4(), ext))
    }

    fn record(cells: &[&str]) -> csv::StringRecord {
        csv::StringRecord::from(cells.to_vec())
    }

    #[test]
    fn test_type_inference() {
        let records = vec![record(&["15", "1.5", "GP", ""]), record(&["", "2", "MS", ""]), record(&["17", "3", "GP", ""])];
        assert_eq!(
            infer_column_types(4, &records),
            vec![ColumnType::Integer, ColumnType::Real, ColumnType::Text, ColumnType::Text]
        );
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("student_demographic"), "\"student_demographic\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_load_and_replace() {
        let db = temp_path("db");
        let csv_path = temp_path("csv");
        std::fs::write(&csv_path, "school,age,G3\nGP,18,6\nMS,17,\nGP,15,10\n").unwrap();

        assert_eq!(load_csv(&db, "student_demographic", &csv_path).unwrap(), 3);

        let conn = Connection::open(&db).unwrap();
        let (count, nulls): (i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), SUM(G3 IS NULL) FROM student_demographic",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!((count, nulls), (3, 1));
        let age_type: String = conn
            .query_row("SELECT typeof(age) FROM student_demographic LIMIT 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(age_type, "integer");
        drop(conn);

        std::fs::write(&csv_path, "school,age,G3\nGP,16,12\n").unwrap();
        assert_eq!(load_csv(&db, "student_demographic", &csv_path).unwrap(), 1);
        let conn = Connection::open(&db).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM student_demographic", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);

        std::fs::remove_file(&db).unwrap();
        std::fs::remove_file(&csv_path).unwrap();
    }

    #[test]
    fn test_missing_csv() {
        let err = load_csv(temp_path("db"), "t", temp_path("csv")).unwrap_err();
        assert!(matches!(err, ScoutError::Csv(_)));
    }
}
