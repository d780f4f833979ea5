use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::SubscriptionRepository;
use crate::error::{AppError, AppResult};
use crate::routes::request_lang;
use crate::services::billing::{
    BillingService, CheckoutSession, Plan, StripeEvent, STRIPE_SIGNATURE_HEADER,
};
use crate::services::session::AuthUser;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/checkout", post(create_checkout))
        .route("/webhook", post(webhook))
        .route("/subscription", get(subscription))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub plan_id: String,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub plan: String,
    pub status: String,
}

async fn create_checkout(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    headers: HeaderMap,
    Json(body): Json<CheckoutRequest>,
) -> AppResult<Json<CheckoutSession>> {
    if Plan::from_id(&body.plan_id).is_none() {
        return Err(AppError::BadRequest(state.i18n.tr(
            request_lang(&headers).as_deref(),
            "validation.invalid_plan",
            None,
        )));
    }

    let email = body.email.as_deref().or(user.email.as_deref());
    if let Some(email) = email.filter(|e| !e.trim().is_empty()) {
        if let Err(e) =
            SubscriptionRepository::add_associated_email(&state.db, &user.user_id, email.trim()).await
        {
            tracing::warn!("Failed to record email for user {}: {}", user.user_id, e);
        }
    }

    let session = BillingService::create_checkout(
        &state.config,
        &state.http,
        &user.user_id,
        &body.plan_id,
        email,
    )
    .await?;
    Ok(Json(session))
}

async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<serde_json::Value>> {
    let secret = state.config.stripe.webhook_secret.as_deref().ok_or_else(|| {
        AppError::ServiceUnavailable("Stripe webhook secret is not configured".to_string())
    })?;
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing Stripe-Signature header".to_string()))?;

    BillingService::verify_signature(secret, signature, &body, Utc::now().timestamp())
        .map_err(|e| {
            tracing::warn!("Rejected Stripe webhook: {}", e);
            e
        })?;

    let event: StripeEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid event payload: {}", e)))?;
    tracing::info!("Received Stripe event: {}", event.event_type);

    BillingService::handle_event(&state.db, &event).await?;
    Ok(Json(serde_json::json!({ "received": true })))
}

async fn subscription(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<Json<SubscriptionResponse>> {
    let sub = SubscriptionRepository::find_by_user_id(&state.db, &user.user_id).await?;
    Ok(Json(match sub {
        Some(sub) => SubscriptionResponse {
            plan: sub.plan,
            status: sub.status,
        },
        None => SubscriptionResponse {
            plan: "free".to_string(),
            status: "active".to_string(),
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_util::{body_json, get, json_request, send};
    use crate::test_support::{bearer, state_with, StaticGenerator};
    use axum::{body::Body, http::Request, http::StatusCode};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    fn signed_request(secret: &str, body: &str) -> Request<Body> {
        let t = Utc::now().timestamp();
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.{}", t, body).as_bytes());
        let sig = hex::encode(mac.finalize().into_bytes());
        Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("stripe-signature", format!("t={},v1={}", t, sig))
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn subscription_defaults_to_free() {
        let state = state_with(Arc::new(StaticGenerator::Fail)).await;
        let auth = bearer(&state, "u1");
        let resp = send(router().with_state(state), get("/subscription", Some(&auth))).await;
        assert_eq!(
            body_json(resp).await,
            serde_json::json!({ "plan": "free", "status": "active" })
        );
    }

    #[tokio::test]
    async fn unknown_plan_is_bad_request() {
        let state = state_with(Arc::new(StaticGenerator::Fail)).await;
        let auth = bearer(&state, "u1");
        let resp = send(
            router().with_state(state),
            json_request("POST", "/checkout", Some(&auth), serde_json::json!({ "planId": "gold" })),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"]["message"], "Invalid plan");
    }

    #[tokio::test]
    async fn webhook_without_secret_is_unavailable() {
        let state = state_with(Arc::new(StaticGenerator::Fail)).await;
        let resp = send(router().with_state(state), signed_request("whsec", "{}")).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn signed_checkout_event_activates_plan() {
        let state = state_with(Arc::new(StaticGenerator::Fail)).await;
        let mut config = state.config.clone();
        config.stripe.webhook_secret = Some("whsec_test".to_string());
        let state = Arc::new(
            AppState::new(
                state.db.clone(),
                config,
                reqwest::Client::new(),
                state.generator.clone(),
            )
            .unwrap(),
        );
        let auth = bearer(&state, "u1");
        let app = router().with_state(state);

        let payload = serde_json::json!({
            "type": "checkout.session.completed",
            "data": { "object": {
                "customer": "cus_9",
                "subscription": "sub_9",
                "metadata": { "userId": "u1", "planId": "plus" }
            }}
        })
        .to_string();

        let resp = send(app.clone(), signed_request("wrong", &payload)).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = send(app.clone(), signed_request("whsec_test", &payload)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["received"], true);

        let sub = body_json(send(app, get("/subscription", Some(&auth))).await).await;
        assert_eq!(sub, serde_json::json!({ "plan": "plus", "status": "active" }));
    }
}
