//! llm_stream.rs — Hand-off between the streaming oracle and HTTP consumers.
//!
//! The OpenRouter stream is push-driven (each SSE delta invokes a callback on
//! the worker task), while a chunked HTTP response is pull-driven. This module
//! couples the two with a single-producer/single-consumer channel: one
//! background worker per request pushes tokens in, the request handler drains
//! them as a lazy sequence. The producer side guarantees exactly one terminal
//! event — `Done` or `Error` — even if the worker aborts, so the consumer can
//! never block forever on a dead stream.

use tokio::sync::mpsc;

use crate::error::ChatbotError;
use crate::llm::LlmClient;
use crate::logging::{backend_info, backend_warn};

/// One item on the hand-off channel. `Done` and `Error` are terminal; a
/// well-behaved producer emits exactly one of them, last.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenEvent {
    Token(String),
    Done,
    Error(String),
}

/// Producer half. Wraps the channel sender so that dropping it without an
/// explicit `finish`/`fail` still delivers an error sentinel.
pub struct TokenSender {
    tx: Option<mpsc::UnboundedSender<TokenEvent>>,
}

/// Consumer half. Tokens arrive in emission order; after the terminal event
/// every further `next_event` returns `None`.
#[derive(Debug)]
pub struct TokenStream {
    rx: mpsc::UnboundedReceiver<TokenEvent>,
    finished: bool,
}

/// Create a connected producer/consumer pair. The channel is unbounded: the
/// producer is throttled by the oracle's own token cadence, and a request's
/// full narration is small.
pub fn token_channel() -> (TokenSender, TokenStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        TokenSender { tx: Some(tx) },
        TokenStream { rx, finished: false },
    )
}

impl TokenSender {
    /// Enqueue one token. Returns `false` once the consumer has dropped its
    /// half — the worker should stop generating at that point.
    pub fn send(&self, token: String) -> bool {
        match &self.tx {
            Some(tx) => tx.send(TokenEvent::Token(token)).is_ok(),
            None => false,
        }
    }

    /// Terminate the stream successfully.
    pub fn finish(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(TokenEvent::Done);
        }
    }

    /// Terminate the stream with an error.
    pub fn fail(mut self, message: String) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(TokenEvent::Error(message));
        }
    }
}

impl Drop for TokenSender {
    fn drop(&mut self) {
        // Worker went away without completing; the consumer still gets its
        // terminal event.
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(TokenEvent::Error("stream worker aborted".into()));
        }
    }
}

impl TokenStream {
    /// Receive the next event, blocking until the worker produces one.
    /// Returns `None` once the terminal event has been consumed.
    pub async fn next_event(&mut self) -> Option<TokenEvent> {
        if self.finished {
            return None;
        }
        match self.rx.recv().await {
            Some(event @ (TokenEvent::Done | TokenEvent::Error(_))) => {
                self.finished = true;
                Some(event)
            }
            Some(token) => Some(token),
            None => {
                // Channel closed without a sentinel. The sender guard makes
                // this unreachable in practice; surface it rather than hang.
                self.finished = true;
                Some(TokenEvent::Error("stream closed without completion".into()))
            }
        }
    }

    /// Drain the stream into the single string its fragments concatenate to.
    pub async fn collect_text(mut self) -> Result<String, ChatbotError> {
        let mut text = String::new();
        while let Some(event) = self.next_event().await {
            match event {
                TokenEvent::Token(fragment) => text.push_str(&fragment),
                TokenEvent::Done => return Ok(text),
                TokenEvent::Error(message) => return Err(ChatbotError::Llm(message)),
            }
        }
        Ok(text)
    }
}

/// Spawn the per-request worker: drives one streaming oracle call and feeds
/// the returned `TokenStream`. The worker stops early when the consumer drops
/// the stream (its next send fails), abandoning the rest of the generation.
pub fn spawn_token_stream(client: LlmClient, prompt: String) -> TokenStream {
    let (sender, stream) = token_channel();

    tokio::spawn(async move {
        let result = client
            .generate_streaming(&prompt, |token| sender.send(token))
            .await;

        match result {
            Ok(()) => {
                backend_info("Streaming generation finished");
                sender.finish();
            }
            Err(err) => {
                backend_warn(format!("Streaming generation failed: {}", err));
                sender.fail(err.to_string());
            }
        }
    });

    stream
}
