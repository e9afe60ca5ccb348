//! sql_executor.rs — Executes a synthesized statement against the ledger.
//!
//! One short-lived connection per call, acquired and released inside the
//! function regardless of outcome. Row-returning statements are fetched in
//! full in store order; anything else runs inside a transaction that commits
//! on success and rolls back on drop. Failures carry the store's own message
//! — the caller decides how much of it to expose.

use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use serde::Serialize;

use crate::error::ChatbotError;
use crate::logging::backend_info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteAck {
    pub rows_affected: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExecutionOutcome {
    Rows(RowSet),
    Write(WriteAck),
}

/// Run one statement. Never retries, never panics past this boundary.
pub fn execute_query(db_path: &str, sql: &str) -> Result<ExecutionOutcome, ChatbotError> {
    let mut conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_WRITE,
    )
    .map_err(|e| ChatbotError::QueryExecution(format!("Cannot open DB {}: {}", db_path, e)))?;

    conn.busy_timeout(Duration::from_secs(5))
        .map_err(|e| ChatbotError::QueryExecution(e.to_string()))?;

    let tx = conn
        .transaction()
        .map_err(|e| ChatbotError::QueryExecution(e.to_string()))?;

    let outcome = {
        let mut stmt = tx
            .prepare(sql)
            .map_err(|e| ChatbotError::QueryExecution(format!("SQL error: {} — query: {}", e, sql)))?;

        if stmt.column_count() > 0 {
            let columns: Vec<String> = stmt
                .column_names()
                .iter()
                .map(|s| s.to_string())
                .collect();

            let rows: Vec<Vec<String>> = stmt
                .query_map([], |row| {
                    let mut vals = Vec::new();
                    for i in 0..columns.len() {
                        let val: String = row
                            .get::<_, rusqlite::types::Value>(i)
                            .map(|v| match v {
                                rusqlite::types::Value::Null => "NULL".to_string(),
                                rusqlite::types::Value::Integer(n) => n.to_string(),
                                rusqlite::types::Value::Real(f) => format!("{:.2}", f),
                                rusqlite::types::Value::Text(s) => s,
                                rusqlite::types::Value::Blob(_) => "[BLOB]".to_string(),
                            })
                            .unwrap_or_else(|_| "?".to_string());
                        vals.push(val);
                    }
                    Ok(vals)
                })
                .map_err(|e| ChatbotError::QueryExecution(format!("Query execution error: {}", e)))?
                .filter_map(|r| r.ok())
                .collect();

            ExecutionOutcome::Rows(RowSet { columns, rows })
        } else {
            let rows_affected = stmt
                .execute([])
                .map_err(|e| ChatbotError::QueryExecution(format!("Query execution error: {}", e)))?;
            ExecutionOutcome::Write(WriteAck { rows_affected })
        }
    };

    // Reads drop the transaction untouched; writes are durable only after
    // an explicit commit.
    if let ExecutionOutcome::Write(ref ack) = outcome {
        tx.commit()
            .map_err(|e| ChatbotError::QueryExecution(format!("Commit failed: {}", e)))?;
        backend_info(format!("Write committed ({} row(s) affected)", ack.rows_affected));
    }

    Ok(outcome)
}
