//! Prompt building and response post-processing

use crate::SchemaDescription;

/// System prompt for question suggestions
pub const QUESTION_SYSTEM_PROMPT: &str =
    "You are a helpful assistant that generates natural language queries for databases.";

/// System prompt for SQL translation
pub const SQL_SYSTEM_PROMPT: &str =
    "You are a SQL expert. Convert natural language questions into SQL queries.";

/// Render the schema as a prompt fragment, one block per table
pub fn format_schema(schema: &SchemaDescription) -> String {
    schema
        .tables
        .iter()
        .map(|(name, table)| {
            let columns = table
                .columns
                .iter()
                .map(|c| format!("  - {} ({})", c.name, c.data_type))
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "Table: {}\nColumns:\n{}\nRow count: {}",
                name, columns, table.row_count
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Prompt asking for one question a user might ask about the data
pub fn build_question_prompt(schema: &SchemaDescription) -> String {
    format!(
        r#"Given this database schema:

{schema}

Generate ONE interesting natural language question that a user might ask about this data.

Requirements:
- Keep it simple and conversational
- Maximum two sentences
- Focus on common business questions
- Only reference tables and columns that exist in the schema
- Return ONLY the question text, no explanations or quotes"#,
        schema = format_schema(schema)
    )
}

/// Prompt asking for the SQL that answers `question`
pub fn build_sql_prompt(question: &str, schema: &SchemaDescription) -> String {
    format!(
        r#"Given the following database schema:

{schema}

Convert this natural language question to SQL: "{question}"

Rules:
- Write a single read-only SELECT statement
- Use standard SQL that Apache DataFusion understands
- Quote identifiers with double quotes when they contain spaces or capitals
- Use proper joins when multiple tables are involved
- Be careful with column names and table names
- Return ONLY the SQL query, no explanations

SQL Query:"#,
        schema = format_schema(schema),
        question = question.trim()
    )
}

/// Strip one matching pair of wrapping quotes from a generated question.
///
/// Double quotes are checked before single quotes and only one pair is
/// removed. Input that is not wrapped is returned trimmed.
pub fn sanitize_generated_query(response: &str) -> String {
    let trimmed = response.trim();
    for quote in ['"', '\''] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return trimmed[1..trimmed.len() - 1].to_string();
        }
    }
    trimmed.to_string()
}

/// Remove markdown code fences around generated SQL
pub fn clean_sql_response(response: &str) -> String {
    let mut sql = response.trim();
    if let Some(rest) = sql.strip_prefix("```sql") {
        sql = rest;
    } else if let Some(rest) = sql.strip_prefix("```SQL") {
        sql = rest;
    } else if let Some(rest) = sql.strip_prefix("```") {
        sql = rest;
    }
    if let Some(rest) = sql.trim_end().strip_suffix("```") {
        sql = rest;
    }
    sql.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ColumnMeta, TableSchema};

    fn users_schema() -> SchemaDescription {
        SchemaDescription::new().with_table(
            "users",
            TableSchema {
                columns: vec![
                    ColumnMeta::new("id", "INTEGER"),
                    ColumnMeta::new("name", "TEXT"),
                    ColumnMeta::new("age", "INTEGER"),
                ],
                row_count: 100,
            },
        )
    }

    #[test]
    fn test_format_schema() {
        let text = format_schema(&users_schema());
        assert_eq!(
            text,
            "Table: users\nColumns:\n  - id (INTEGER)\n  - name (TEXT)\n  - age (INTEGER)\nRow count: 100"
        );
    }

    #[test]
    fn test_format_schema_multiple_tables() {
        let schema = users_schema().with_table(
            "orders",
            TableSchema {
                columns: vec![ColumnMeta::new("total", "REAL")],
                row_count: 500,
            },
        );
        let text = format_schema(&schema);
        assert!(text.starts_with("Table: orders"));
        assert!(text.contains("\n\nTable: users"));
        assert!(text.contains("Row count: 500"));
    }

    #[test]
    fn test_question_prompt_mentions_schema() {
        let prompt = build_question_prompt(&users_schema());
        assert!(prompt.contains("Table: users"));
        assert!(prompt.contains("age (INTEGER)"));
        assert!(prompt.contains("Generate ONE"));
    }

    #[test]
    fn test_sql_prompt_embeds_question() {
        let prompt = build_sql_prompt("  How many users are older than 30?  ", &users_schema());
        assert!(prompt.contains("\"How many users are older than 30?\""));
        assert!(prompt.contains("Table: users"));
        assert!(prompt.ends_with("SQL Query:"));
    }

    #[test]
    fn test_sanitize_double_quotes() {
        assert_eq!(sanitize_generated_query("\"Show me X.\""), "Show me X.");
    }

    #[test]
    fn test_sanitize_single_quotes() {
        assert_eq!(sanitize_generated_query("'How many Y?'"), "How many Y?");
    }

    #[test]
    fn test_sanitize_plain_text() {
        assert_eq!(sanitize_generated_query("Plain text"), "Plain text");
    }

    #[test]
    fn test_sanitize_strips_only_one_pair() {
        assert_eq!(sanitize_generated_query("\"\"nested\"\""), "\"nested\"");
        assert_eq!(sanitize_generated_query("\"'mixed'\""), "'mixed'");
    }

    #[test]
    fn test_sanitize_mismatched_quotes() {
        assert_eq!(sanitize_generated_query("\"Show me X.'"), "\"Show me X.'");
        assert_eq!(sanitize_generated_query("'Show me X."), "'Show me X.");
    }

    #[test]
    fn test_sanitize_edge_cases() {
        assert_eq!(sanitize_generated_query(""), "");
        assert_eq!(sanitize_generated_query("   "), "");
        assert_eq!(sanitize_generated_query("\""), "\"");
        assert_eq!(sanitize_generated_query("\"\""), "");
        assert_eq!(sanitize_generated_query("  \"Padded?\"\n"), "Padded?");
    }

    #[test]
    fn test_clean_sql_response() {
        assert_eq!(
            clean_sql_response("```sql\nSELECT * FROM users;\n```"),
            "SELECT * FROM users;"
        );
        assert_eq!(clean_sql_response("```\nSELECT 1\n```\n"), "SELECT 1");
        assert_eq!(
            clean_sql_response("  SELECT name FROM users  "),
            "SELECT name FROM users"
        );
        assert_eq!(clean_sql_response("```sql\n```"), "");
    }
}
