use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::db::models::PublishRecord;
use crate::db::PublishHistoryRepository;
use crate::error::AppResult;
use crate::routes::{parse_platform, request_lang};
use crate::services::publish::{PublishOutcome, Publisher};
use crate::services::session::AuthUser;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(publish))
        .route("/history", get(history))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub platform: Option<String>,
    #[serde(default)]
    pub content: String,
    pub account_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub platform: Option<String>,
    pub limit: Option<i64>,
}

async fn publish(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Json(body): Json<PublishRequest>,
) -> AppResult<Json<PublishOutcome>> {
    let lang = request_lang(&headers);
    let platform = parse_platform(&state.i18n, lang.as_deref(), body.platform.as_deref())?;

    let publisher = Publisher::new(&state.db, &state.http, &state.i18n, lang.as_deref());
    let outcome = publisher
        .publish(
            &user.user_id,
            platform,
            &body.content,
            body.account_id.as_deref().filter(|a| !a.is_empty()),
        )
        .await?;
    Ok(Json(outcome))
}

async fn history(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Vec<PublishRecord>>> {
    let platform = match query.platform.as_deref() {
        Some(raw) => Some(parse_platform(
            &state.i18n,
            request_lang(&headers).as_deref(),
            Some(raw),
        )?),
        None => None,
    };
    let limit = query.limit.map(|l| l.clamp(1, 500));

    let records = PublishHistoryRepository::find_by_user_id(
        &state.db,
        &user.user_id,
        platform.map(|p| p.as_str()),
        limit,
    )
    .await?;
    Ok(Json(records))
}
