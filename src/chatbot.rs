//! chatbot.rs — The question-to-answer pipeline.
//!
//! Introspect the live schema, synthesize SQL, execute it once, narrate the
//! outcome. The oracle client is passed in by the caller; the pipeline holds
//! no state of its own between requests.

use serde::Serialize;

use crate::error::ChatbotError;
use crate::ledger_schema::describe_schema;
use crate::llm::LlmClient;
use crate::llm_stream::{spawn_token_stream, TokenStream};
use crate::logging::backend_info;
use crate::narrate::{narrate, narration_prompt_for};
use crate::query_synthesis::synthesize;
use crate::sql_executor::execute_query;

/// Result of the non-streaming chat path.
#[derive(Debug, Clone, Serialize)]
pub struct ChatAnswer {
    pub question: String,
    pub query: String,
    pub response: String,
}

/// Result of the streaming chat path: the synthesized query up front, the
/// narration as a token stream.
#[derive(Debug)]
pub struct StreamedAnswer {
    pub query: String,
    pub stream: TokenStream,
}

/// Answer a ledger question in one shot.
pub async fn answer_question(
    client: &LlmClient,
    db_path: &str,
    question: &str,
) -> Result<ChatAnswer, ChatbotError> {
    let schema = describe_schema(db_path)?;
    let sql = synthesize(client, &schema, question).await?;

    // Exactly one execution per synthesized query — a failed narration must
    // not re-run a write.
    let outcome = execute_query(db_path, &sql)?;
    let response = narrate(client, &sql, &outcome).await;

    backend_info(format!(
        "Answered question ({} chars in, {} chars out)",
        question.len(),
        response.len()
    ));

    Ok(ChatAnswer {
        question: question.to_string(),
        query: sql,
        response,
    })
}

/// Answer a ledger question with token-incremental narration. The pipeline
/// prefix (schema, synthesis, execution) runs to completion first; only the
/// narration pass is streamed.
pub async fn answer_question_streaming(
    client: &LlmClient,
    db_path: &str,
    question: &str,
) -> Result<StreamedAnswer, ChatbotError> {
    let schema = describe_schema(db_path)?;
    let sql = synthesize(client, &schema, question).await?;
    let outcome = execute_query(db_path, &sql)?;

    let prompt = narration_prompt_for(&sql, &outcome);
    let stream = spawn_token_stream(client.clone(), prompt);

    Ok(StreamedAnswer { query: sql, stream })
}
