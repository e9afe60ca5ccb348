//! llm.rs — OpenRouter API client for the chatbot pipeline.
//!
//! One explicitly constructed client handle is threaded through the whole
//! pipeline (no module-scope singletons). Exposes a one-shot `generate` call
//! with stop sequences and a token-streaming variant that pushes deltas into
//! a caller-supplied callback; `llm_stream.rs` turns that push interface into
//! a pull-based stream.

use std::time::Duration;

use crate::error::ChatbotError;
use crate::logging::{backend_error, backend_info};
use crate::settings::Settings;

#[derive(Debug, Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
}

/// One parsed server-sent event from a streaming completion.
#[derive(Debug, PartialEq)]
pub enum SseData {
    /// A content delta (may be empty for keep-alive/role chunks).
    Delta(String),
    /// The `[DONE]` end-of-stream marker.
    Done,
}

impl LlmClient {
    pub fn new(settings: &Settings) -> Result<Self, ChatbotError> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| ChatbotError::Llm(format!("HTTP client build failed: {}", e)))?;

        Ok(LlmClient {
            http,
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            base_url: settings.base_url.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        })
    }

    /// Client for tests and tools that talk to a non-default endpoint.
    pub fn with_endpoint(base_url: &str, api_key: &str, model: &str) -> Self {
        LlmClient {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url.to_string(),
            max_tokens: 1024,
            temperature: 0.0,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn payload(&self, prompt: &str, stop: &[&str], stream: bool) -> serde_json::Value {
        let mut payload = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });
        if !stop.is_empty() {
            payload["stop"] = serde_json::json!(stop);
        }
        if stream {
            payload["stream"] = serde_json::json!(true);
        }
        payload
    }

    async fn post(&self, payload: &serde_json::Value) -> Result<reqwest::Response, ChatbotError> {
        let resp = self
            .http
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", "https://ledgerchat.local")
            .header("X-Title", "ledgerchat")
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                backend_error(format!("LLM HTTP request failed: {}", e));
                if e.is_timeout() {
                    ChatbotError::Timeout(format!("LLM request: {}", e))
                } else {
                    ChatbotError::Llm(format!("Request failed: {}", e))
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            let truncated = &body[..body.len().min(300)];
            backend_error(format!("LLM HTTP error {}: {}", status, truncated));
            return Err(ChatbotError::Llm(format!("HTTP {}: {}", status, truncated)));
        }

        Ok(resp)
    }

    /// One-shot completion. `stop` truncates generation at the first
    /// occurrence of any listed sequence; pass `&[]` for none.
    pub async fn generate(&self, prompt: &str, stop: &[&str]) -> Result<String, ChatbotError> {
        let resp = self.post(&self.payload(prompt, stop, false)).await?;

        let data: serde_json::Value = resp.json().await.map_err(|e| {
            backend_error(format!("Failed to parse LLM JSON response: {}", e));
            ChatbotError::Llm(format!("JSON parse error: {}", e))
        })?;

        let text = data["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();

        backend_info(format!(
            "LLM response received (model='{}', text_len={})",
            data["model"].as_str().unwrap_or(&self.model),
            text.len()
        ));

        Ok(text)
    }

    /// Streaming completion. Each content delta is handed to `on_token`;
    /// returning `false` from the callback stops the read loop early
    /// (consumer gone), abandoning the rest of the generation.
    pub async fn generate_streaming(
        &self,
        prompt: &str,
        mut on_token: impl FnMut(String) -> bool,
    ) -> Result<(), ChatbotError> {
        let mut resp = self.post(&self.payload(prompt, &[], true)).await?;

        // Byte buffer: a network chunk may split a multi-byte character, so
        // decoding happens per complete line only.
        let mut buffer: Vec<u8> = Vec::new();
        loop {
            let chunk = resp.chunk().await.map_err(|e| {
                if e.is_timeout() {
                    ChatbotError::Timeout(format!("LLM stream: {}", e))
                } else {
                    ChatbotError::Llm(format!("Stream read failed: {}", e))
                }
            })?;

            let Some(chunk) = chunk else {
                // Connection closed without [DONE]; treat as clean end.
                return Ok(());
            };

            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let line_bytes: Vec<u8> = buffer.drain(..=pos).collect();
                let decoded = String::from_utf8_lossy(&line_bytes);
                let line = decoded.trim_end_matches(['\n', '\r']);

                match parse_sse_line(line) {
                    Some(SseData::Done) => return Ok(()),
                    Some(SseData::Delta(delta)) => {
                        if !delta.is_empty() && !on_token(delta) {
                            backend_info("LLM stream consumer gone, stopping read early");
                            return Ok(());
                        }
                    }
                    None => {}
                }
            }
        }
    }
}

/// Parse one SSE line from a streaming chat completion. Non-data lines
/// (comments, empty keep-alives) yield `None`.
pub fn parse_sse_line(line: &str) -> Option<SseData> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(SseData::Done);
    }
    let value: serde_json::Value = serde_json::from_str(data).ok()?;
    let delta = value["choices"][0]["delta"]["content"]
        .as_str()
        .unwrap_or("")
        .to_string();
    Some(SseData::Delta(delta))
}
