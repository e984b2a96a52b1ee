//! Query Result - Rows as ordered column -> value mappings

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// One result row; keys keep the column order of the statement
pub type Row = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub row_count: usize,
    pub execution_time_ms: u64,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Row>, execution_time_ms: u64) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
            execution_time_ms,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// GitHub-flavoured markdown table, the form the summarizer reads
    pub fn to_markdown_table(&self) -> String {
        if self.columns.is_empty() {
            return "(no rows)".to_string();
        }

        let header: Vec<String> = self.columns.iter().map(|c| escape_cell(c)).collect();
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| escape_cell(&format_value(row.get(c).unwrap_or(&Value::Null))))
                    .collect()
            })
            .collect();

        let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count().max(3)).collect();
        for row in &cells {
            for (idx, cell) in row.iter().enumerate() {
                widths[idx] = widths[idx].max(cell.chars().count());
            }
        }

        let format_line = |values: &[String]| -> String {
            let padded: Vec<String> = values
                .iter()
                .zip(&widths)
                .map(|(v, w)| format!("{:<width$}", v, width = *w))
                .collect();
            format!("| {} |", padded.join(" | "))
        };

        let mut lines = Vec::with_capacity(cells.len() + 2);
        lines.push(format_line(&header));
        let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        lines.push(format!("|-{}-|", separator.join("-|-")));
        for row in &cells {
            lines.push(format_line(row));
        }
        if cells.is_empty() {
            lines.push("(no rows)".to_string());
        }
        lines.join("\n")
    }
}

/// Suffix repeated names (`age`, `age_2`) so no row key overwrites another
pub fn unique_column_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for name in names {
        let name = name.into();
        let mut candidate = name.clone();
        let mut n = 2;
        while seen.contains(&candidate) {
            candidate = format!("{}_{}", name, n);
            n += 1;
        }
        seen.insert(candidate.clone());
        columns.push(candidate);
    }
    columns
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\n', '\r'], " ")
}
