use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::models::{Language, Platform};
use crate::error::AppResult;
use crate::routes::{parse_platform, request_lang};
use crate::services::content::{SelectOutcome, SessionSnapshot};
use crate::services::prompt::GenerationRequest;
use crate::services::session::AuthUser;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/generate", post(generate_titles))
        .route("/select", post(select_title))
        .route("/platform", post(platform_content))
        .route("/session", get(get_session).delete(clear_session))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGenerationRequest {
    #[serde(default)]
    pub prompt: String,
    pub model: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub language: Option<String>,
    pub purpose: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub sensitive_filter: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectTitleRequest {
    pub title_key: String,
    pub platform: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformContentRequest {
    pub platform: Option<String>,
    pub title_key: String,
    #[serde(default)]
    pub force_refresh: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformContentResponse {
    pub platform: Platform,
    pub title_key: String,
    pub content: String,
}

// ============================================================================
// Handlers
// ============================================================================

async fn generate_titles(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(body): Json<StartGenerationRequest>,
) -> AppResult<Json<SessionSnapshot>> {
    let request = GenerationRequest {
        raw_subject_text: body.prompt,
        keywords: body.keywords,
        language: body
            .language
            .as_deref()
            .map(Language::from_tag)
            .unwrap_or_default(),
        target_platform: None,
        purpose: body.purpose.filter(|p| !p.trim().is_empty()),
        attached_images: body.images,
        sensitive_filter: body.sensitive_filter,
    };
    let model = body.model.unwrap_or_else(|| "auto".to_string());

    let snapshot = state
        .content
        .start_generation(&user.user_id, request, &model)
        .await?;
    Ok(Json(snapshot))
}

async fn select_title(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Json(body): Json<SelectTitleRequest>,
) -> AppResult<Json<SelectOutcome>> {
    let platform = match body.platform.as_deref() {
        Some(raw) => Some(parse_platform(
            &state.i18n,
            request_lang(&headers).as_deref(),
            Some(raw),
        )?),
        None => None,
    };

    let outcome = state
        .content
        .select_title(&user.user_id, &body.title_key, platform)
        .await?;
    Ok(Json(outcome))
}

/// Switch the previewed platform and return its caption for the title,
/// generating it on a cache miss or when a refresh is requested.
async fn platform_content(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Json(body): Json<PlatformContentRequest>,
) -> AppResult<Json<PlatformContentResponse>> {
    let platform = parse_platform(
        &state.i18n,
        request_lang(&headers).as_deref(),
        body.platform.as_deref(),
    )?;

    let content = state
        .content
        .get_or_generate(&user.user_id, platform, &body.title_key, body.force_refresh)
        .await?;
    state.content.select_platform(&user.user_id, platform).await;

    Ok(Json(PlatformContentResponse {
        platform,
        title_key: body.title_key,
        content,
    }))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Json<SessionSnapshot> {
    Json(state.content.snapshot(&user.user_id).await)
}

async fn clear_session(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Json<serde_json::Value> {
    state.content.clear(&user.user_id).await;
    Json(serde_json::json!({ "cleared": true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_util::{body_json, get, json_request, send};
    use crate::test_support::{bearer, state_with, StaticGenerator};
    use axum::{body::Body, http::Request, http::StatusCode};

    const TITLES: &str = "1. Purr-fect Play\n2. Chase Mode On\n3. Nap Then Pounce";

    #[tokio::test]
    async fn requires_a_session() {
        let state = state_with(Arc::new(StaticGenerator::Text(TITLES.to_string()))).await;
        let resp = send(router().with_state(state), get("/session", None)).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn generate_select_and_switch_platform() {
        let state = state_with(Arc::new(StaticGenerator::Text(TITLES.to_string()))).await;
        let auth = bearer(&state, "u1");
        let app = router().with_state(state);

        let resp = send(
            app.clone(),
            json_request(
                "POST",
                "/generate",
                Some(&auth),
                serde_json::json!({ "prompt": "Feather wand", "model": "gpt4", "keywords": ["cats"] }),
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let snap = body_json(resp).await;
        assert_eq!(snap["titles"].as_array().unwrap().len(), 3);
        assert_eq!(snap["titles"][1]["label"], "Chase Mode On");
        assert_eq!(snap["model"], "gpt4");

        let resp = send(
            app.clone(),
            json_request(
                "POST",
                "/select",
                Some(&auth),
                serde_json::json!({ "titleKey": "2. Chase Mode On" }),
            ),
        )
        .await;
        let outcome = body_json(resp).await;
        assert_eq!(outcome["changed"], true);

        let resp = send(
            app.clone(),
            json_request(
                "POST",
                "/platform",
                Some(&auth),
                serde_json::json!({ "platform": "facebook", "titleKey": "2. Chase Mode On" }),
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["platform"], "facebook");
        assert_eq!(body["titleKey"], "2. Chase Mode On");

        let snap = body_json(send(app.clone(), get("/session", Some(&auth))).await).await;
        assert_eq!(snap["selectedPlatform"], "facebook");
        assert_eq!(snap["selectedTitle"], "2. Chase Mode On");

        let resp = send(
            app.clone(),
            Request::builder()
                .method("DELETE")
                .uri("/session")
                .header("authorization", &auth)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(body_json(resp).await["cleared"], true);
        let snap = body_json(send(app, get("/session", Some(&auth))).await).await;
        assert!(snap["titles"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_unknown_platform_and_title() {
        let state = state_with(Arc::new(StaticGenerator::Text(TITLES.to_string()))).await;
        let auth = bearer(&state, "u1");
        let app = router().with_state(state);

        send(
            app.clone(),
            json_request("POST", "/generate", Some(&auth), serde_json::json!({ "prompt": "Feather wand" })),
        )
        .await;

        let resp = send(
            app.clone(),
            json_request(
                "POST",
                "/platform",
                Some(&auth),
                serde_json::json!({ "platform": "myspace", "titleKey": "1. Purr-fect Play" }),
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = send(
            app.clone(),
            json_request("POST", "/select", Some(&auth), serde_json::json!({ "titleKey": "7. Nope" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = send(
            app.clone(),
            json_request(
                "POST",
                "/platform",
                Some(&auth),
                serde_json::json!({ "platform": "x", "titleKey": "free text is not a title" }),
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let snap = body_json(send(app, get("/session", Some(&auth))).await).await;
        assert_eq!(snap["selectedPlatform"], "instagram");
        assert!(snap["platformContent"].as_object().unwrap().is_empty());
    }
}
