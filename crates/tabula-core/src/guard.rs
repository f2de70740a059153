//! Read-only SQL guard
//!
//! Every statement that reaches the engine, whether typed by a user or
//! produced by an LLM, goes through [`ensure_read_only`] first.

use datafusion::sql::sqlparser::ast::Statement;
use datafusion::sql::sqlparser::dialect::GenericDialect;
use datafusion::sql::sqlparser::parser::Parser;

use crate::error::CoreError;

/// Accept exactly one query statement (`SELECT`, `WITH ...`, `VALUES`).
pub fn ensure_read_only(sql: &str) -> Result<(), CoreError> {
    let statements = Parser::parse_sql(&GenericDialect {}, sql)
        .map_err(|e| CoreError::InvalidSql(e.to_string()))?;

    match statements.as_slice() {
        [] => Err(CoreError::InvalidSql("empty statement".to_string())),
        [Statement::Query(_)] => Ok(()),
        [_] => Err(CoreError::ForbiddenStatement(format!(
            "only SELECT queries are allowed, got '{}'",
            leading_keyword(sql)
        ))),
        _ => Err(CoreError::ForbiddenStatement(format!(
            "expected a single statement, got {}",
            statements.len()
        ))),
    }
}

fn leading_keyword(sql: &str) -> String {
    sql.split_whitespace()
        .next()
        .unwrap_or_default()
        .to_uppercase()
}
