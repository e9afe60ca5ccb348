//! ocr.rs — Clova OCR client for receipt images.
//!
//! Posts the image as multipart together with the JSON `message` part the
//! Clova general-OCR endpoint expects, then joins every recognized field
//! into one text blob for downstream parsing.

use crate::error::ChatbotError;
use crate::logging::{backend_error, backend_info};

/// Extract text from a receipt image. `format` is the image extension
/// ("png", "jpg", ...), taken from the uploaded filename.
pub async fn ocr_with_clova(
    endpoint: &str,
    secret_key: &str,
    image: Vec<u8>,
    filename: &str,
    format: &str,
) -> Result<String, ChatbotError> {
    let request_json = serde_json::json!({
        "images": [{ "format": format, "name": "receipt" }],
        "requestId": uuid::Uuid::new_v4().to_string(),
        "version": "V2",
        "timestamp": chrono::Utc::now().timestamp_millis(),
    });

    let form = reqwest::multipart::Form::new()
        .text("message", request_json.to_string())
        .part(
            "file",
            reqwest::multipart::Part::bytes(image).file_name(filename.to_string()),
        );

    let client = reqwest::Client::new();
    let resp = client
        .post(endpoint)
        .header("X-OCR-SECRET", secret_key)
        .multipart(form)
        .send()
        .await
        .map_err(|e| {
            backend_error(format!("Clova OCR request failed: {}", e));
            ChatbotError::Llm(format!("OCR request failed: {}", e))
        })?;

    if !resp.status().is_success() {
        let status = resp.status();
        backend_error(format!("Clova OCR HTTP error: {}", status));
        return Err(ChatbotError::Llm(format!("OCR HTTP {}", status)));
    }

    let data: serde_json::Value = resp
        .json()
        .await
        .map_err(|e| ChatbotError::Llm(format!("OCR JSON parse error: {}", e)))?;

    let text = extract_infer_text(&data);
    if text.is_empty() {
        return Err(ChatbotError::Llm("OCR returned no text fields".into()));
    }

    backend_info(format!("OCR extracted {} chars from {}", text.len(), filename));
    Ok(text)
}

/// Join every `inferText` field of a Clova response, space-separated, in
/// reading order.
pub fn extract_infer_text(data: &serde_json::Value) -> String {
    let mut all_texts: Vec<String> = Vec::new();

    if let Some(images) = data["images"].as_array() {
        for image_result in images {
            if let Some(fields) = image_result["fields"].as_array() {
                for field in fields {
                    if let Some(text) = field["inferText"].as_str() {
                        all_texts.push(text.to_string());
                    }
                }
            }
        }
    }

    all_texts.join(" ")
}
