//! Read-Only Guard
//!
//! Optional parse-level check that a generated statement is a single read
//! query. Off by default; the prompts alone ask the model not to mutate.

use crate::execution::store::SqlDialect;
use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::{BigQueryDialect, SQLiteDialect};
use sqlparser::parser::Parser;

#[derive(Debug, Clone, Copy)]
pub struct ReadOnlyGuard {
    dialect: SqlDialect,
}

impl ReadOnlyGuard {
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    /// Ok when `sql` is exactly one SELECT / WITH ... SELECT statement
    pub fn check(&self, sql: &str) -> Result<(), String> {
        let parsed = match self.dialect {
            SqlDialect::Sqlite => Parser::parse_sql(&SQLiteDialect {}, sql),
            SqlDialect::BigQuery => Parser::parse_sql(&BigQueryDialect {}, sql),
        };
        let statements = parsed.map_err(|e| format!("statement could not be parsed: {}", e))?;

        match statements.as_slice() {
            [] => Err("no statement found".to_string()),
            [Statement::Query(query)] => check_query(query),
            [other] => Err(format!("only read queries are allowed, got: {}", statement_kind(other))),
            _ => Err(format!("expected one statement, got {}", statements.len())),
        }
    }
}

/// CTE bodies and every branch of a set operation must be reads too
fn check_query(query: &Query) -> Result<(), String> {
    if let Some(ref with) = query.with {
        for cte in &with.cte_tables {
            check_query(&cte.query)?;
        }
    }
    check_set_expr(&query.body)
}

fn check_set_expr(expr: &SetExpr) -> Result<(), String> {
    match expr {
        SetExpr::Select(select) if select.into.is_some() => Err("SELECT INTO is not allowed".to_string()),
        SetExpr::Select(_) | SetExpr::Values(_) | SetExpr::Table(_) => Ok(()),
        SetExpr::Query(query) => check_query(query),
        SetExpr::SetOperation { left, right, .. } => {
            check_set_expr(left)?;
            check_set_expr(right)
        }
        SetExpr::Insert(statement) | SetExpr::Update(statement) => Err(format!(
            "only read queries are allowed, got: {}",
            statement_kind(statement)
        )),
    }
}

fn statement_kind(statement: &Statement) -> String {
    statement
        .to_string()
        .split_whitespace()
        .next()
        .unwrap_or("statement")
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_select_and_cte() {
        let guard = ReadOnlyGuard::new(SqlDialect::Sqlite);
        assert!(guard.check("SELECT age, AVG(G3) FROM student_demographic GROUP BY age;").is_ok());
        assert!(guard
            .check("WITH t AS (SELECT age FROM student_demographic) SELECT COUNT(*) FROM t")
            .is_ok());
    }

    #[test]
    fn test_refuses_mutations() {
        let guard = ReadOnlyGuard::new(SqlDialect::Sqlite);
        let err = guard.check("DELETE FROM student_demographic").unwrap_err();
        assert!(err.contains("DELETE"));
        assert!(guard.check("DROP TABLE student_demographic").is_err());
        assert!(guard.check("UPDATE student_demographic SET G3 = 20").is_err());
    }

    #[test]
    fn test_refuses_piggybacked_statements() {
        let guard = ReadOnlyGuard::new(SqlDialect::Sqlite);
        let err = guard
            .check("SELECT 1; DELETE FROM student_demographic")
            .unwrap_err();
        assert!(err.contains("expected one statement"));
    }

    #[test]
    fn test_refuses_writes_behind_a_cte() {
        let guard = ReadOnlyGuard::new(SqlDialect::Sqlite);
        let err = guard
            .check("WITH t AS (SELECT 1) INSERT INTO student_demographic SELECT * FROM t")
            .unwrap_err();
        assert!(err.contains("INSERT"));
        let err = guard
            .check("WITH t AS (SELECT 1) UPDATE student_demographic SET G3 = 0")
            .unwrap_err();
        assert!(err.contains("UPDATE"));
    }

    #[test]
    fn test_refuses_select_into_inside_set_operations() {
        let guard = ReadOnlyGuard::new(SqlDialect::Sqlite);
        assert!(guard.check("SELECT 1 UNION SELECT * INTO x FROM y").is_err());
        assert!(guard.check("SELECT * INTO x FROM y UNION ALL SELECT 2").is_err());
        assert!(guard
            .check("SELECT age FROM student_demographic UNION SELECT age FROM student_demographic")
            .is_ok());
    }

    #[test]
    fn test_checks_nested_queries() {
        let guard = ReadOnlyGuard::new(SqlDialect::Sqlite);
        assert!(guard.check("(SELECT * INTO x FROM y)").is_err());
        assert!(guard
            .check("WITH a AS (WITH b AS (SELECT 1 AS n) SELECT n FROM b) SELECT n FROM a")
            .is_ok());
    }

    #[test]
    fn test_unparseable_text_is_refused() {
        let guard = ReadOnlyGuard::new(SqlDialect::BigQuery);
        assert!(guard.check("I could not write a query for that.").is_err());
    }
}
