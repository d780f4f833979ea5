use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::db::models::{SaveScheduledEvent, ScheduledEvent};
use crate::error::{AppError, AppResult};
use crate::routes::{parse_platform, request_lang};
use crate::services::schedule::{group_by_date, offset_from_minutes, DateBucket};
use crate::services::session::AuthUser;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events", get(list_events).post(save_event))
        .route("/schedule", post(schedule_generated))
        .route("/grouped", get(grouped_events))
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// "Publish later" for generated content. `tzOffsetMinutes` is the client's
/// offset east of UTC.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub platform: Option<String>,
    #[serde(default)]
    pub content: String,
    pub publish_date: NaiveDate,
    #[serde(default)]
    pub tz_offset_minutes: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedQuery {
    #[serde(default)]
    pub tz_offset_minutes: i32,
}

async fn list_events(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(range): Query<RangeQuery>,
) -> AppResult<Json<Vec<ScheduledEvent>>> {
    let events = state
        .schedule
        .list_events(&user.user_id, range.start, range.end)
        .await?;
    Ok(Json(events))
}

async fn save_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<SaveScheduledEvent>,
) -> AppResult<Json<ScheduledEvent>> {
    let saved = state.schedule.save(&user.user_id, payload).await?;
    Ok(Json(saved))
}

async fn schedule_generated(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Json(body): Json<ScheduleRequest>,
) -> AppResult<Json<ScheduledEvent>> {
    let lang = request_lang(&headers);
    let platform = parse_platform(&state.i18n, lang.as_deref(), body.platform.as_deref())?;
    if body.content.trim().is_empty() {
        return Err(AppError::Validation(state.i18n.tr(
            lang.as_deref(),
            "validation.content_required",
            None,
        )));
    }

    let event = ScheduledEvent::from_generated(
        platform,
        &body.content,
        body.publish_date,
        offset_from_minutes(body.tz_offset_minutes),
    )?;
    let saved = state.schedule.add_event(&user.user_id, event).await?;
    Ok(Json(saved))
}

async fn grouped_events(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<GroupedQuery>,
) -> AppResult<Json<Vec<DateBucket>>> {
    let events = state.schedule.list_events(&user.user_id, None, None).await?;
    Ok(Json(group_by_date(
        &events,
        offset_from_minutes(query.tz_offset_minutes),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_util::{body_json, get, json_request, send};
    use crate::test_support::{bearer, state_with, StaticGenerator};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn schedule_then_group_by_local_day() {
        let state = state_with(Arc::new(StaticGenerator::Fail)).await;
        let auth = bearer(&state, "u1");
        let app = router().with_state(state);

        let resp = send(
            app.clone(),
            json_request(
                "POST",
                "/schedule",
                Some(&auth),
                serde_json::json!({
                    "platform": "x",
                    "content": "1. Nap Then Pounce\nThe toy your cat deserves 🐱",
                    "publishDate": "2025-03-10",
                    "tzOffsetMinutes": 60
                }),
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let event = body_json(resp).await;
        assert_eq!(event["title"], "Nap Then Pounce");
        assert_eq!(event["promotionalContent"], "The toy your cat deserves 🐱");
        assert_eq!(event["start"], "2025-03-10T08:00:00Z");
        assert_eq!(event["allDay"], false);

        let resp = send(
            app.clone(),
            json_request(
                "POST",
                "/events",
                Some(&auth),
                serde_json::json!({ "title": "Launch", "start": "2025-03-12T10:00:00Z" }),
            ),
        )
        .await;
        let manual = body_json(resp).await;
        assert_eq!(manual["platform"], "instagram");
        assert_eq!(manual["end"], manual["start"]);

        let all = body_json(send(app.clone(), get("/events", Some(&auth))).await).await;
        assert_eq!(all.as_array().unwrap().len(), 2);
        assert_eq!(all[0]["title"], "Launch");

        let ranged = body_json(
            send(
                app.clone(),
                get("/events?start=2025-03-11T00:00:00Z&end=2025-03-13T00:00:00Z", Some(&auth)),
            )
            .await,
        )
        .await;
        assert_eq!(ranged.as_array().unwrap().len(), 1);

        let grouped =
            body_json(send(app, get("/grouped?tzOffsetMinutes=60", Some(&auth))).await).await;
        let days: Vec<&str> = grouped
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["date"].as_str().unwrap())
            .collect();
        assert_eq!(days, vec!["2025-03-12", "2025-03-10"]);
    }

    #[tokio::test]
    async fn schedule_requires_content() {
        let state = state_with(Arc::new(StaticGenerator::Fail)).await;
        let auth = bearer(&state, "u1");
        let resp = send(
            router().with_state(state),
            json_request(
                "POST",
                "/schedule",
                Some(&auth),
                serde_json::json!({ "platform": "x", "content": " ", "publishDate": "2025-03-10" }),
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
