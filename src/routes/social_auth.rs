use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::db::models::Platform;
use crate::error::AppResult;
use crate::routes::{parse_platform, request_lang};
use crate::services::session::{AuthUser, MaybeAuthUser};
use crate::services::social_auth::{AuthorizationStatus, SocialAuthService};
use crate::AppState;

/// The callback page runs one inline script and nothing else.
const CALLBACK_CSP: &str =
    "default-src 'none'; script-src 'unsafe-inline'; style-src 'unsafe-inline'; base-uri 'none'";

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(status))
        .route("/authorize", get(authorize))
        .route("/callback/:platform", get(callback))
        .route("/revoke", post(revoke))
}

#[derive(Debug, Deserialize)]
pub struct PlatformQuery {
    pub platform: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

async fn status(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(user): MaybeAuthUser,
    headers: HeaderMap,
    Query(query): Query<PlatformQuery>,
) -> AppResult<Json<AuthorizationStatus>> {
    let platform = parse_platform(
        &state.i18n,
        request_lang(&headers).as_deref(),
        query.platform.as_deref(),
    )?;

    let user_id = user.as_ref().map(|u| u.user_id.as_str());
    match SocialAuthService::get_status(&state.db, user_id, platform).await {
        Ok(status) => Ok(Json(status)),
        Err(e) => {
            tracing::error!("Error checking {} authorization status: {}", platform, e);
            Ok(Json(AuthorizationStatus::from_row(None, Utc::now().naive_utc())))
        }
    }
}

async fn authorize(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Query(query): Query<PlatformQuery>,
) -> AppResult<Redirect> {
    let platform = parse_platform(
        &state.i18n,
        request_lang(&headers).as_deref(),
        query.platform.as_deref(),
    )?;

    let url = SocialAuthService::authorize_url(&state.config, &user.user_id, platform)?;
    tracing::info!("Redirecting user {} to {} authorization", user.user_id, platform);
    Ok(Redirect::to(&url))
}

/// OAuth redirect target. Always answers with a small page that notifies the
/// opener window and closes itself.
async fn callback(
    State(state): State<Arc<AppState>>,
    Path(platform): Path<String>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let lang = request_lang(&headers);
    let lang = lang.as_deref();
    let i18n = &state.i18n;
    let origin = state.config.server.frontend_url.trim_end_matches('/');

    let Some(platform) = Platform::from_str(&platform) else {
        let message = i18n.tr(lang, "validation.invalid_platform", Some(&[("platform", platform.as_str())]));
        return callback_page(&CallbackPage::failure(origin, None, message));
    };

    let (Some(code), None) = (query.code.as_deref().filter(|c| !c.is_empty()), query.error) else {
        let message = i18n.tr(lang, "auth.callback.failed", None);
        return callback_page(&CallbackPage::failure(origin, Some(platform), message));
    };
    let Some(oauth_state) = query.state.as_deref() else {
        let message = i18n.tr(lang, "auth.callback.login_required", None);
        return callback_page(&CallbackPage::failure(origin, Some(platform), message));
    };

    match SocialAuthService::complete_callback(&state.db, &state.config, platform, code, oauth_state)
        .await
    {
        Ok(_) => callback_page(&CallbackPage {
            origin,
            platform: Some(platform),
            success: true,
            title: i18n.tr(lang, "auth.callback.success_title", None),
            lines: vec![
                i18n.tr(
                    lang,
                    "auth.callback.success_body",
                    Some(&[("platform", platform.display_name())]),
                ),
                i18n.tr(lang, "auth.callback.closing", None),
            ],
        }),
        Err(crate::error::AppError::Unauthorized) => {
            let message = i18n.tr(lang, "auth.callback.login_required", None);
            callback_page(&CallbackPage::failure(origin, Some(platform), message))
        }
        Err(e) => {
            tracing::error!("Error in {} OAuth callback: {}", platform, e);
            let message = i18n.tr(lang, "auth.callback.error", None);
            callback_page(&CallbackPage::failure(origin, Some(platform), message))
        }
    }
}

async fn revoke(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Query(query): Query<PlatformQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let platform = parse_platform(
        &state.i18n,
        request_lang(&headers).as_deref(),
        query.platform.as_deref(),
    )?;

    SocialAuthService::revoke(&state.db, &user.user_id, platform).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

// ============================================================================
// Callback page
// ============================================================================

struct CallbackPage<'a> {
    origin: &'a str,
    platform: Option<Platform>,
    success: bool,
    title: String,
    lines: Vec<String>,
}

impl<'a> CallbackPage<'a> {
    fn failure(origin: &'a str, platform: Option<Platform>, message: String) -> Self {
        Self {
            origin,
            platform,
            success: false,
            title: message.clone(),
            lines: vec![message],
        }
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn callback_page(page: &CallbackPage<'_>) -> Response {
    let message = serde_json::json!({
        "type": "social-auth",
        "platform": page.platform.map(Platform::as_str),
        "success": page.success,
    });
    // `</` cannot appear inside the inline script
    let script_json = |v: &serde_json::Value| v.to_string().replace("</", "<\\/");

    let paragraphs: String = page
        .lines
        .iter()
        .map(|l| format!("<p>{}</p>", escape_html(l)))
        .collect();
    let mark = if page.success { "&#10003;" } else { "&#10007;" };

    let html = format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <title>{title}</title>
    <style>
      body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; display: flex; align-items: center; justify-content: center; height: 100vh; margin: 0; background: #f5f5f5; }}
      .card {{ text-align: center; background: white; padding: 40px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }}
      .mark {{ width: 60px; height: 60px; border-radius: 50%; background: {color}; color: white; display: flex; align-items: center; justify-content: center; margin: 0 auto 20px; font-size: 30px; }}
      h1 {{ color: #333; margin: 0 0 10px; }}
      p {{ color: #666; }}
    </style>
  </head>
  <body>
    <div class="card">
      <div class="mark">{mark}</div>
      <h1>{title}</h1>
      {paragraphs}
    </div>
    <script>
      if (window.opener) {{
        window.opener.postMessage({message}, {origin});
      }}
      setTimeout(function () {{ window.close(); }}, {delay});
    </script>
  </body>
</html>"#,
        title = escape_html(&page.title),
        color = if page.success { "#4CAF50" } else { "#E53935" },
        mark = mark,
        paragraphs = paragraphs,
        message = script_json(&message),
        origin = script_json(&serde_json::Value::String(page.origin.to_string())),
        delay = if page.success { 2000 } else { 3000 },
    );

    let mut resp = Html(html).into_response();
    resp.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(CALLBACK_CSP),
    );
    resp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_util::{body_json, body_text, get, send};
    use crate::services::social_auth::DEMO_CODE;
    use crate::test_support::{bearer, state_with, StaticGenerator};
    use axum::{body::Body, http::Request, http::StatusCode};

    async fn setup() -> (Arc<AppState>, Router) {
        let state = state_with(Arc::new(StaticGenerator::Fail)).await;
        let app = router().with_state(state.clone());
        (state, app)
    }

    #[tokio::test]
    async fn status_without_session_is_unauthorized_not_an_error() {
        let (_, app) = setup().await;
        let resp = send(app, get("/status?platform=instagram", None)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, serde_json::json!({ "isAuthorized": false }));
    }

    #[tokio::test]
    async fn status_requires_platform() {
        let (_, app) = setup().await;
        let resp = send(app, get("/status", None)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn demo_round_trip_then_revoke() {
        let (state, app) = setup().await;
        let auth = bearer(&state, "u1");

        let resp = send(app.clone(), get("/authorize?platform=facebook", Some(&auth))).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        let location = resp.headers()[header::LOCATION].to_str().unwrap().to_string();
        assert!(location.starts_with("http://api.test/api/social-auth/callback/facebook?code=demo_code&state="));

        let path = location.trim_start_matches("http://api.test/api/social-auth");
        let resp = send(app.clone(), get(path, None)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_SECURITY_POLICY], CALLBACK_CSP);
        let html = body_text(resp).await;
        assert!(html.contains("Authorization Successful"));
        assert!(html.contains("\"success\":true"));
        assert!(html.contains("\"http://app.test\""));

        let status = body_json(send(app.clone(), get("/status?platform=facebook", Some(&auth))).await).await;
        assert_eq!(status["isAuthorized"], true);
        assert_eq!(status["accountName"], "Demo Facebook Account");

        let resp = send(
            app.clone(),
            Request::builder()
                .method("POST")
                .uri("/revoke?platform=facebook")
                .header("authorization", &auth)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(body_json(resp).await["success"], true);

        let status = body_json(send(app, get("/status?platform=facebook", Some(&auth))).await).await;
        assert_eq!(status["isAuthorized"], false);
    }

    #[tokio::test]
    async fn callback_failures_render_localized_page() {
        let (_, app) = setup().await;

        let resp = send(
            app.clone(),
            Request::builder()
                .uri("/callback/x?error=access_denied")
                .header("accept-language", "de-DE")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        let html = body_text(resp).await;
        assert!(html.contains("\"success\":false"));
        assert!(!html.contains("Authorization Successful"));

        let forged = format!("/callback/x?code={}&state=not-a-jwt", DEMO_CODE);
        let html = body_text(send(app, get(&forged, None)).await).await;
        assert!(html.contains("Please log in first"));
    }

    #[tokio::test]
    async fn page_text_is_escaped() {
        let resp = callback_page(&CallbackPage::failure(
            "http://app.test",
            None,
            "<script>alert(1)</script>".to_string(),
        ));
        let html = body_text(resp).await;
        assert!(!html.contains("<script>alert(1)"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    }
}
