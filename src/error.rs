//! error.rs — Per-request error taxonomy for the chatbot pipeline.
//!
//! Every variant is fatal for the request that raised it except `Narration`,
//! which the narrator downgrades to the raw query outcome. Nothing here is
//! retried; the HTTP boundary converts whatever bubbles up into an error
//! response.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatbotError {
    /// The ledger store could not be reached (missing file, failed open).
    #[error("database connection failed: {0}")]
    Connection(String),

    /// The store was reachable but schema metadata could not be read.
    #[error("schema introspection failed: {0}")]
    SchemaUnavailable(String),

    /// The oracle call for SQL generation failed or returned empty text.
    #[error("query synthesis failed: {0}")]
    Synthesis(String),

    /// The store rejected the synthesized statement. Carries the store's
    /// message verbatim; the caller decides whether to expose it.
    #[error("query execution failed: {0}")]
    QueryExecution(String),

    /// The second oracle pass failed. Callers degrade instead of failing.
    #[error("narration failed: {0}")]
    Narration(String),

    /// A bounded oracle call exceeded its deadline.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Oracle transport failure outside a named pipeline stage.
    #[error("llm request failed: {0}")]
    Llm(String),
}

impl ChatbotError {
    /// Re-tag a transport-level oracle failure as a synthesis failure,
    /// leaving deadline expiry distinct.
    pub fn into_synthesis(self) -> ChatbotError {
        match self {
            ChatbotError::Llm(msg) => ChatbotError::Synthesis(msg),
            other => other,
        }
    }
}
