//! query_synthesis.rs — Natural-language question → SQL statement.
//!
//! The oracle sees the live schema, the ledger domain notes and the verbatim
//! question, with generation stopped at the result marker. What comes back is
//! trusted only after a validation pass: single statement, no DDL or
//! database-level commands, and only tables the introspected schema actually
//! contains. Writes (INSERT/UPDATE/DELETE) are allowed — recording an expense
//! through chat is part of the contract — so this is a hardening filter, not
//! an injection-proof guarantee.

use lazy_static::lazy_static;

use crate::error::ChatbotError;
use crate::ledger_schema::{build_sql_prompt, known_tables, SQL_RESULT_STOP};
use crate::llm::LlmClient;
use crate::logging::backend_info;

/// Leading keywords a synthesized statement may start with.
const ALLOWED_STATEMENTS: &[&str] = &["SELECT", "WITH", "INSERT", "UPDATE", "DELETE", "REPLACE"];

lazy_static! {
    /// Keywords that must not appear anywhere in a synthesized statement.
    static ref FORBIDDEN_RE: regex::Regex =
        regex::Regex::new(r"\b(CREATE|DROP|ALTER|ATTACH|DETACH|PRAGMA|VACUUM|REINDEX)\b").unwrap();
    /// CTE names count as known tables within their own statement.
    static ref CTE_RE: regex::Regex = regex::Regex::new(r"(?i)\b(\w+)\s+AS\s*\(").unwrap();
    /// Table references after FROM/JOIN/INTO/UPDATE.
    static ref TABLE_RE: regex::Regex =
        regex::Regex::new(r#"(?i)\b(?:FROM|JOIN|INTO|UPDATE)\s+["'`\[]?(\w+)"#).unwrap();
}

/// Generate a SQL statement answering `question` against `schema`.
pub async fn synthesize(
    client: &LlmClient,
    schema: &str,
    question: &str,
) -> Result<String, ChatbotError> {
    let prompt = build_sql_prompt(schema, question);

    let raw = client
        .generate(&prompt, &[SQL_RESULT_STOP])
        .await
        .map_err(ChatbotError::into_synthesis)?;

    let sql = clean_sql_text(&raw);
    if sql.is_empty() {
        return Err(ChatbotError::Synthesis("LLM returned empty SQL".into()));
    }

    validate_query(&sql, &known_tables(schema)).map_err(ChatbotError::Synthesis)?;

    backend_info(format!("Synthesized SQL: {}", sql));
    Ok(sql)
}

/// Strip whitespace and markdown fencing the model sometimes wraps around
/// the statement.
pub fn clean_sql_text(raw: &str) -> String {
    raw.trim()
        .trim_start_matches("```sql")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
        .to_string()
}

/// Reject statements the executor should never see. `tables` comes from the
/// same schema description the model was prompted with.
pub fn validate_query(sql: &str, tables: &[String]) -> Result<(), String> {
    let upper = sql.to_uppercase();
    let trimmed = upper.trim_start();

    if !ALLOWED_STATEMENTS.iter().any(|kw| trimmed.starts_with(kw)) {
        return Err(format!(
            "Statement type not allowed: {}",
            &sql[..sql.len().min(50)]
        ));
    }

    if let Some(found) = FORBIDDEN_RE.find(&upper) {
        return Err(format!("Keyword '{}' not allowed", found.as_str()));
    }

    // Chained statements hide behind semicolons.
    let parts: Vec<&str> = sql.split(';').filter(|s| !s.trim().is_empty()).collect();
    if parts.len() > 1 {
        return Err("Multiple statements not allowed".into());
    }

    // Every referenced table must exist in the schema the model saw.
    let mut known: Vec<String> = tables.to_vec();
    known.extend(CTE_RE.captures_iter(sql).map(|c| c[1].to_lowercase()));

    for capture in TABLE_RE.captures_iter(sql) {
        let name = capture[1].to_lowercase();
        if !known.contains(&name) {
            return Err(format!("Query references unknown table '{}'", name));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_tables() -> Vec<String> {
        vec!["record".into(), "category".into(), "member".into()]
    }

    #[test]
    fn test_clean_sql_text_strips_fences() {
        assert_eq!(
            clean_sql_text("```sql\nSELECT * FROM record\n```"),
            "SELECT * FROM record"
        );
        assert_eq!(clean_sql_text("  SELECT 1  "), "SELECT 1");
    }

    #[test]
    fn test_expenditure_aggregate_passes() {
        let sql = "SELECT SUM(r.amount) FROM record r \
                   JOIN category c ON r.category_id = c.category_id \
                   WHERE c.category_type = 2 AND strftime('%m', r.reg_date) = '07' AND r.del_yn = 0";
        assert!(validate_query(sql, &ledger_tables()).is_ok());
    }

    #[test]
    fn test_write_on_known_table_passes() {
        let sql = "INSERT INTO record (category_id, amount, reg_date) VALUES (5, 12000, '2026-07-03 12:00:00')";
        assert!(validate_query(sql, &ledger_tables()).is_ok());
    }

    #[test]
    fn test_multiple_statements_rejected() {
        let sql = "SELECT 1 FROM record; DELETE FROM record";
        assert!(validate_query(sql, &ledger_tables())
            .unwrap_err()
            .contains("Multiple statements"));
    }

    #[test]
    fn test_ddl_and_db_commands_rejected() {
        for sql in [
            "DROP TABLE record",
            "CREATE TABLE x (id INTEGER)",
            "ATTACH DATABASE '/etc/other.db' AS other",
            "PRAGMA writable_schema = 1",
        ] {
            assert!(validate_query(sql, &ledger_tables()).is_err(), "allowed: {}", sql);
        }
    }

    #[test]
    fn test_unknown_table_rejected() {
        let err = validate_query("SELECT * FROM accounts", &ledger_tables()).unwrap_err();
        assert!(err.contains("accounts"));
    }

    #[test]
    fn test_cte_names_count_as_known() {
        let sql = "WITH monthly AS (SELECT amount FROM record WHERE del_yn = 0) \
                   SELECT SUM(amount) FROM monthly";
        assert!(validate_query(sql, &ledger_tables()).is_ok());
    }
}
