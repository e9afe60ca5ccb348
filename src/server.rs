//! server.rs — HTTP boundary.
//!
//! Thin routing layer over the pipeline: JSON in, either a single JSON
//! object or a chunked text stream out. Missing input is a 400, every
//! internal failure a 500 with an opaque error string — the pipeline's
//! errors never crash the process.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Multipart, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::chatbot::{answer_question, answer_question_streaming};
use crate::intent::{detect_intent, Intent};
use crate::llm::LlmClient;
use crate::llm_stream::TokenEvent;
use crate::logging::{backend_error, backend_info};
use crate::news::summarize_news;
use crate::ocr::ocr_with_clova;
use crate::receipt::parse_receipt;
use crate::settings::Settings;

/// Shared per-process state: configuration plus the one oracle client
/// handle threaded through every request.
pub struct AppState {
    pub settings: Settings,
    pub llm: LlmClient,
}

#[derive(Deserialize)]
struct ChatRequest {
    question: Option<String>,
}

#[derive(Deserialize)]
struct NewsParams {
    n: Option<usize>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chatbot", post(chatbot))
        .route("/chatbot/stream", post(chatbot_stream))
        .route("/parse-receipt", post(parse_receipt_upload))
        .route("/summarize-news", get(summarize_news_endpoint))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    let llm = LlmClient::new(&settings).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let bind_addr = settings.bind_addr.clone();
    let state = Arc::new(AppState { settings, llm });

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    backend_info(format!("ledgerchat listening on http://{}", bind_addr));
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

fn missing_question() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": "질문이 제공되지 않았습니다." })),
    )
        .into_response()
}

fn internal_error(message: impl std::fmt::Display) -> Response {
    backend_error(format!("Request failed: {}", message));
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": format!("서버 오류 발생: {}", message) })),
    )
        .into_response()
}

fn chat_prompt(question: &str) -> String {
    format!(
        "You are a friendly personal-finance chatbot. Answer casually in the \
         language of the question, in one or two sentences.\n\nQuestion: {}",
        question
    )
}

/// Non-streaming chat: intent-routed. Ledger questions run the full
/// text-to-SQL pipeline and return the synthesized query alongside the
/// narrated answer.
async fn chatbot(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Response {
    let Some(question) = req.question.map(|q| q.trim().to_string()).filter(|q| !q.is_empty())
    else {
        return missing_question();
    };

    match detect_intent(&question) {
        Intent::LedgerQuery => {
            match answer_question(&state.llm, &state.settings.db_path, &question).await {
                Ok(answer) => Json(json!({
                    "query": answer.query,
                    "response": answer.response,
                }))
                .into_response(),
                Err(err) => internal_error(err),
            }
        }
        Intent::NewsBriefing => match summarize_news(&state.llm, None).await {
            Ok(summary) => Json(json!({
                "query": serde_json::Value::Null,
                "response": summary.response,
                "url": summary.url,
            }))
            .into_response(),
            Err(err) => internal_error(err),
        },
        Intent::SmallTalk => match state.llm.generate(&chat_prompt(&question), &[]).await {
            Ok(text) => Json(json!({
                "query": serde_json::Value::Null,
                "response": text.trim(),
            }))
            .into_response(),
            Err(err) => internal_error(err),
        },
    }
}

/// Streaming chat: the ledger pipeline runs to the narration pass, whose
/// tokens are forwarded as they arrive. The synthesized query travels in a
/// response header since the body is the raw narration text.
async fn chatbot_stream(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Response {
    let Some(question) = req.question.map(|q| q.trim().to_string()).filter(|q| !q.is_empty())
    else {
        return missing_question();
    };

    match answer_question_streaming(&state.llm, &state.settings.db_path, &question).await {
        Ok(answer) => {
            let body_stream = futures::stream::unfold(answer.stream, |mut stream| async move {
                match stream.next_event().await {
                    Some(TokenEvent::Token(token)) => {
                        Some((Ok::<String, Infallible>(token), stream))
                    }
                    Some(TokenEvent::Error(message)) => {
                        Some((Ok(format!("\n[stream error] {}", message)), stream))
                    }
                    Some(TokenEvent::Done) | None => None,
                }
            });

            let mut builder = Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; charset=utf-8");
            // SQL with non-ASCII literals cannot travel in a header value
            let query_header = answer.query.replace(['\r', '\n'], " ");
            if query_header.is_ascii() {
                builder = builder.header("x-ledgerchat-query", query_header);
            }
            match builder.body(Body::from_stream(body_stream)) {
                Ok(resp) => resp,
                Err(err) => internal_error(err),
            }
        }
        Err(err) => internal_error(err),
    }
}

/// Receipt upload: multipart `file` part → Clova OCR → structured entry.
async fn parse_receipt_upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Response {
    if !state.settings.ocr_configured() {
        return internal_error("Clova OCR credentials are not configured");
    }

    let mut upload: Option<(Vec<u8>, String)> = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or_default().to_string();
            match field.bytes().await {
                Ok(bytes) => upload = Some((bytes.to_vec(), filename)),
                Err(err) => return internal_error(err),
            }
            break;
        }
    }

    let Some((image, filename)) = upload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "파일이 업로드되지 않았습니다." })),
        )
            .into_response();
    };
    if filename.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "파일 이름이 없습니다." })),
        )
            .into_response();
    }

    let format = filename.rsplit('.').next().unwrap_or("png").to_lowercase();
    let ocr_text = match ocr_with_clova(
        &state.settings.clova_endpoint,
        &state.settings.clova_api_key,
        image,
        &filename,
        &format,
    )
    .await
    {
        Ok(text) => text,
        Err(err) => return internal_error(err),
    };

    match parse_receipt(&state.llm, &ocr_text).await {
        Ok(entry) => Json(entry).into_response(),
        Err(err) => internal_error(err),
    }
}

async fn summarize_news_endpoint(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NewsParams>,
) -> Response {
    match summarize_news(&state.llm, params.n).await {
        Ok(summary) => Json(json!({ "url": summary.url, "response": summary.response }))
            .into_response(),
        Err(err) => internal_error(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::Request;
    use tower::util::ServiceExt;

    fn test_state() -> Arc<AppState> {
        let settings = Settings {
            api_key: "test-key".into(),
            base_url: "http://127.0.0.1:9/v1/chat/completions".into(),
            db_path: "/nonexistent/ledger.db".into(),
            ..Settings::default()
        };
        let llm = LlmClient::new(&settings).unwrap();
        Arc::new(AppState { settings, llm })
    }

    #[tokio::test]
    async fn test_health_ok() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_question_is_400() {
        for payload in [r#"{}"#, r#"{"question": "   "}"#] {
            let app = build_router(test_state());
            let resp = app
                .oneshot(
                    Request::post("/chatbot")
                        .header("content-type", "application/json")
                        .body(Body::from(payload))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

            let body = to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
            let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert!(value["error"].as_str().unwrap().contains("질문"));
        }
    }

    #[tokio::test]
    async fn test_pipeline_failure_is_500_not_crash() {
        // Ledger question against a missing store: the Connection error must
        // surface as a 500 with an error body.
        let app = build_router(test_state());
        let resp = app
            .oneshot(
                Request::post("/chatbot")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"question": "7월에 얼마 썼어"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(resp.into_body(), 64 * 1024).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(value["error"].as_str().unwrap().contains("서버 오류 발생"));
    }

    #[tokio::test]
    async fn test_stream_missing_question_is_400() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(
                Request::post("/chatbot/stream")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
