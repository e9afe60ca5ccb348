//! narrate.rs — Natural-language rendering of a query outcome.
//!
//! A presentation transform, not a computation: rows and the original query
//! are stringified into a second oracle prompt and the model does the
//! phrasing. Sign conventions (expenditure negative, income positive) live in
//! the prompt — there is no local arithmetic to cross-check them. If the
//! oracle fails here the request still succeeds with the raw outcome text.

use crate::error::ChatbotError;
use crate::llm::LlmClient;
use crate::logging::backend_warn;
use crate::sql_executor::ExecutionOutcome;

/// Stringify an outcome the way it is shown to the model (and to the user
/// when narration degrades): one tuple per line, or the write acknowledgment.
pub fn render_outcome(outcome: &ExecutionOutcome) -> String {
    match outcome {
        ExecutionOutcome::Rows(rowset) => {
            if rowset.rows.is_empty() {
                return "(no rows)".to_string();
            }
            rowset
                .rows
                .iter()
                .map(|row| format!("({})", row.join(", ")))
                .collect::<Vec<_>>()
                .join("\n")
        }
        ExecutionOutcome::Write(ack) => {
            format!("OK, {} row(s) affected", ack.rows_affected)
        }
    }
}

/// Prompt for the narration pass.
pub fn build_narration_prompt(sql: &str, outcome_text: &str) -> String {
    format!(
        r#"You are the voice of a personal finance ledger chatbot.

The following SQL query was executed against the user's household ledger:
{sql}

SQL Result:
{result}

RULES:
- Prefix expenditure amounts with '-' and income amounts with '+'
- Answer in casual, friendly Korean (캐주얼한 존댓말), exactly one sentence
- Then append exactly one sentence of simple money advice
- Mention concrete amounts from the result, with thousands separators"#,
        sql = sql,
        result = outcome_text
    )
}

/// Narrate an outcome. Never fails the request: on oracle failure the raw
/// rendered outcome is returned instead.
pub async fn narrate(client: &LlmClient, sql: &str, outcome: &ExecutionOutcome) -> String {
    let rendered = render_outcome(outcome);
    let prompt = build_narration_prompt(sql, &rendered);

    match client.generate(&prompt, &[]).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => {
            backend_warn(format!(
                "{}",
                ChatbotError::Narration("LLM returned empty narration".into())
            ));
            rendered
        }
        Err(err) => {
            backend_warn(format!(
                "{}",
                ChatbotError::Narration(err.to_string())
            ));
            rendered
        }
    }
}

/// Prompt for the streaming variant; `chatbot.rs` hands this to the bridge.
pub fn narration_prompt_for(sql: &str, outcome: &ExecutionOutcome) -> String {
    build_narration_prompt(sql, &render_outcome(outcome))
}
