//! Ledgerchat — a natural-language chatbot over a personal finance ledger.
//!
//! A question comes in, the live SQLite schema goes into a prompt, the LLM
//! writes the SQL, the executor runs it, and a second LLM pass narrates the
//! result — optionally streamed token by token over a chunked HTTP response.

pub mod chatbot;
pub mod error;
pub mod intent;
pub mod ledger_schema;
pub mod llm;
pub mod llm_stream;
pub mod logging;
pub mod narrate;
pub mod news;
pub mod ocr;
pub mod query_synthesis;
pub mod receipt;
pub mod server;
pub mod settings;
pub mod sql_executor;
