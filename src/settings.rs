//! settings.rs — Environment-driven configuration.
//!
//! Everything is read once at startup from the process environment (a local
//! `.env` is loaded by `main` via dotenvy before this runs). Only the
//! OpenRouter key is required; the rest falls back to sensible defaults.

use std::env;
use std::time::Duration;

use serde::Serialize;

const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-exp:free";
const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const DEFAULT_DB_PATH: &str = "ledger.db";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    /// OpenRouter API key. The only hard requirement.
    #[serde(skip_serializing)]
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Path to the SQLite ledger database.
    pub db_path: String,
    pub bind_addr: String,
    /// Clova OCR credentials; receipt parsing is disabled without them.
    #[serde(skip_serializing)]
    pub clova_api_key: String,
    pub clova_endpoint: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_tokens: 1024,
            temperature: 0.0,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            db_path: DEFAULT_DB_PATH.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            clova_api_key: String::new(),
            clova_endpoint: String::new(),
        }
    }
}

impl Settings {
    /// Build settings from environment variables, failing only on the
    /// missing API key. Unparseable numeric overrides keep their defaults.
    pub fn from_env() -> Result<Self, String> {
        let mut settings = Settings::default();

        settings.api_key = env::var("OPENROUTER_API_KEY").unwrap_or_default();
        if settings.api_key.trim().is_empty() {
            return Err("Environment variable OPENROUTER_API_KEY is missing".into());
        }

        if let Ok(model) = env::var("LLM_MODEL") {
            settings.model = model;
        }
        if let Ok(url) = env::var("LLM_BASE_URL") {
            settings.base_url = url;
        }
        if let Ok(tokens) = env::var("LLM_MAX_TOKENS") {
            if let Ok(tokens) = tokens.parse() {
                settings.max_tokens = tokens;
            }
        }
        if let Ok(temp) = env::var("LLM_TEMPERATURE") {
            if let Ok(temp) = temp.parse() {
                settings.temperature = temp;
            }
        }
        if let Ok(secs) = env::var("LLM_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse() {
                settings.timeout_secs = secs;
            }
        }
        if let Ok(path) = env::var("LEDGER_DB") {
            settings.db_path = path;
        }
        if let Ok(addr) = env::var("BIND_ADDR") {
            settings.bind_addr = addr;
        }
        settings.clova_api_key = env::var("CLOVA_API_KEY").unwrap_or_default();
        settings.clova_endpoint = env::var("CLOVA_ENDPOINT").unwrap_or_default();

        Ok(settings)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn ocr_configured(&self) -> bool {
        !self.clova_api_key.trim().is_empty() && !self.clova_endpoint.trim().is_empty()
    }
}
