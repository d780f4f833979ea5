//! Stateless generation endpoint used by the public landing page.
//!
//! Keeps the front end's original contract: `{content}` on success and a
//! flat `{error}` body otherwise, 500 for every failure except a timeout
//! (504 with `timeout: true`). A missing backend key is reported with its
//! own message; other failures get the generic one.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use crate::db::models::{Language, Platform};
use crate::error::AppError;
use crate::routes::request_lang;
use crate::services::prompt::{GenerationRequest, PromptBuilder};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", post(generate))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub sensitive_filter: bool,
}

fn legacy_error(status: StatusCode, message: String, timeout: bool) -> Response {
    let body = if timeout {
        serde_json::json!({ "error": message, "timeout": true })
    } else {
        serde_json::json!({ "error": message })
    };
    (status, Json(body)).into_response()
}

async fn generate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<GenerateRequest>,
) -> Response {
    let language = body
        .language
        .as_deref()
        .map(Language::from_tag)
        .unwrap_or_default();
    let ui_lang = request_lang(&headers).unwrap_or_else(|| language.as_str().to_string());
    let ui_lang = Some(ui_lang.as_str());

    let request = GenerationRequest {
        raw_subject_text: body.prompt,
        keywords: body.keywords,
        language,
        target_platform: body.platform.as_deref().and_then(Platform::from_str),
        purpose: body.purpose.filter(|p| !p.trim().is_empty()),
        attached_images: body.images,
        sensitive_filter: body.sensitive_filter,
    };
    if request.validate().is_err() {
        let message = state
            .i18n
            .tr(ui_lang, "validation.product_info_required", None);
        return legacy_error(StatusCode::INTERNAL_SERVER_ERROR, message, false);
    }

    // A platform plus a chosen title asks for that platform's caption;
    // anything else asks for the title list.
    let title = body.title.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let prompt = match (request.target_platform, title) {
        (Some(platform), Some(title)) => PromptBuilder::platform_caption(&request, platform, title),
        _ => PromptBuilder::titles(&request),
    };

    let model_key = body.model.as_deref().unwrap_or("auto");
    match state.generator.generate(&prompt, model_key).await {
        Ok(content) => Json(serde_json::json!({ "content": content })).into_response(),
        Err(e) if e.is_timeout() => {
            tracing::warn!("Generation timed out: {}", e);
            let message = state.i18n.tr(ui_lang, "generate.timeout", None);
            legacy_error(StatusCode::GATEWAY_TIMEOUT, message, true)
        }
        Err(AppError::Config(msg)) => {
            tracing::error!("Generation misconfigured: {}", msg);
            legacy_error(StatusCode::INTERNAL_SERVER_ERROR, msg, false)
        }
        Err(e) => {
            tracing::error!("Error generating content: {}", e);
            let message = state.i18n.tr(ui_lang, "generate.failed", None);
            legacy_error(StatusCode::INTERNAL_SERVER_ERROR, message, false)
        }
    }
}
