pub mod billing;
pub mod calendar;
pub mod content;
pub mod generate;
pub mod health;
pub mod publish;
pub mod social_auth;

use axum::http::HeaderMap;

use crate::db::models::Platform;
use crate::error::{AppError, AppResult};
use crate::i18n::{normalize_language, I18n};

/// Preferred language from `Accept-Language`, reduced to its primary subtag.
pub fn request_lang(headers: &HeaderMap) -> Option<String> {
    headers
        .get(http::header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|tag| tag.split(';').next().unwrap_or(tag).trim())
        .filter(|tag| !tag.is_empty() && *tag != "*")
        .map(normalize_language)
}

/// Parse a client-supplied platform name, with a localized message for
/// missing or unknown values.
pub fn parse_platform(i18n: &I18n, lang: Option<&str>, raw: Option<&str>) -> AppResult<Platform> {
    let raw = raw.map(str::trim).filter(|p| !p.is_empty()).ok_or_else(|| {
        AppError::Validation(i18n.tr(lang, "validation.platform_required", None))
    })?;
    Platform::from_str(raw).ok_or_else(|| {
        AppError::Validation(i18n.tr(
            lang,
            "validation.invalid_platform",
            Some(&[("platform", raw)]),
        ))
    })
}

#[cfg(test)]
pub mod test_util {
    use axum::{body::Body, http::Request, response::Response, Router};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    pub async fn send(app: Router, request: Request<Body>) -> Response {
        app.oneshot(request).await.unwrap()
    }

    pub async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    pub async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    pub fn json_request(
        method: &str,
        uri: &str,
        auth: Option<&str>,
        body: serde_json::Value,
    ) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(auth) = auth {
            builder = builder.header("authorization", auth);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    pub fn get(uri: &str, auth: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(auth) = auth {
            builder = builder.header("authorization", auth);
        }
        builder.body(Body::empty()).unwrap()
    }
}
