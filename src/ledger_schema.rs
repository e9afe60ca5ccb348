//! ledger_schema.rs — Live schema introspection and text-to-SQL prompting.
//!
//! The schema description handed to the LLM is read fresh from the store on
//! every synthesis call — no cache, so schema drift is always reflected at
//! the cost of one extra round trip per request. Domain semantics the model
//! cannot infer from DDL (income/expenditure category types, soft deletes)
//! ride along as fixed hints.

use std::path::Path;

use rusqlite::{Connection, OpenFlags};

use crate::error::ChatbotError;
use crate::logging::backend_info;

/// Generation is truncated at this marker so the model cannot append a
/// fabricated result block after the query.
pub const SQL_RESULT_STOP: &str = "\nSQLResult:";

/// Ledger semantics the DDL does not express.
pub const DOMAIN_HINTS: &str = r#"DOMAIN NOTES:
- category.category_type distinguishes income (1) from expenditure (2)
- totals like "current assets" require joining record to category and summing signed amounts: income counts positive, expenditure negative
- rows with del_yn = 1 are soft-deleted and must be excluded from every aggregate (always filter del_yn = 0)
- reg_date is 'YYYY-MM-DD HH:MM:SS'; month filters use strftime('%m', reg_date)
- questions may be in Korean: '수입' = income, '지출' = expenditure, '얼마 썼어' asks for total expenditure"#;

/// Read the live schema as DDL text on a transient read-only connection.
pub fn describe_schema(db_path: &str) -> Result<String, ChatbotError> {
    if !Path::new(db_path).exists() {
        return Err(ChatbotError::Connection(format!(
            "Database not found: {}",
            db_path
        )));
    }

    let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(|e| ChatbotError::Connection(format!("Cannot open DB {}: {}", db_path, e)))?;

    let mut stmt = conn
        .prepare(
            "SELECT sql FROM sqlite_master \
             WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' AND sql IS NOT NULL \
             ORDER BY name",
        )
        .map_err(|e| ChatbotError::SchemaUnavailable(e.to_string()))?;

    let ddl: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| ChatbotError::SchemaUnavailable(e.to_string()))?
        .filter_map(|r| r.ok())
        .collect();

    if ddl.is_empty() {
        return Err(ChatbotError::SchemaUnavailable(format!(
            "No table definitions readable in {}",
            db_path
        )));
    }

    backend_info(format!(
        "Schema introspected: {} object(s) from {}",
        ddl.len(),
        db_path
    ));

    Ok(ddl.join("\n\n"))
}

lazy_static::lazy_static! {
    static ref CREATE_RE: regex::Regex = regex::Regex::new(
        r#"(?i)CREATE\s+(?:TABLE|VIEW)\s+(?:IF\s+NOT\s+EXISTS\s+)?["'`\[]?(\w+)"#,
    )
    .unwrap();
}

/// Table and view names present in a schema description. Used to scope
/// synthesized queries to objects that actually exist.
pub fn known_tables(schema: &str) -> Vec<String> {
    CREATE_RE
        .captures_iter(schema)
        .map(|c| c[1].to_lowercase())
        .collect()
}

/// Prompt for the SQL-generation pass: schema verbatim, domain hints, the
/// user's question verbatim.
pub fn build_sql_prompt(schema: &str, question: &str) -> String {
    format!(
        r#"Based on the table schema below, write a SQLite query that would answer the user's question:
{schema}

{hints}

RULES:
- Output ONLY the SQL query, nothing else
- No markdown, no explanation, no backticks
- Use only tables and columns from the schema

Question: {question}
SQL Query:"#,
        schema = schema,
        hints = DOMAIN_HINTS,
        question = question
    )
}
