//! Paid plans through Stripe Checkout, and the webhook that keeps
//! `user_subscriptions` in sync with Stripe.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db::SubscriptionRepository;
use crate::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

/// Maximum age of a signed webhook payload.
const SIGNATURE_TOLERANCE_SECONDS: i64 = 300;

const EVENT_CHECKOUT_COMPLETED: &str = "checkout.session.completed";
const EVENT_SUBSCRIPTION_UPDATED: &str = "customer.subscription.updated";
const EVENT_SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    Plus,
    Pro,
}

impl Plan {
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "plus" => Some(Plan::Plus),
            "pro" => Some(Plan::Pro),
            _ => None,
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            Plan::Plus => "plus",
            Plan::Pro => "pro",
        }
    }

    /// Monthly price in US cents.
    pub fn unit_amount(self) -> u32 {
        match self {
            Plan::Plus => 990,
            Plan::Pro => 1990,
        }
    }

    fn product_name(self) -> &'static str {
        match self {
            Plan::Plus => "HypeCat AI - Plus Plan",
            Plan::Pro => "HypeCat AI - Pro Plan",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Plan::Plus => "Up to 100 contents / month with scheduling & publishing",
            Plan::Pro => "1,000+ contents / month with advanced analytics",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub session_id: String,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeCheckoutResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

pub struct BillingService;

impl BillingService {
    /// Create a monthly subscription checkout for `plan_id`.
    pub async fn create_checkout(
        config: &Config,
        http: &reqwest::Client,
        user_id: &str,
        plan_id: &str,
        email: Option<&str>,
    ) -> AppResult<CheckoutSession> {
        let plan = Plan::from_id(plan_id)
            .ok_or_else(|| AppError::BadRequest("Invalid plan".to_string()))?;
        let secret_key = config
            .stripe
            .secret_key
            .as_deref()
            .ok_or_else(|| AppError::Config("Stripe secret key is not configured".to_string()))?;

        let frontend = config.server.frontend_url.trim_end_matches('/');
        let mut form: Vec<(&str, String)> = vec![
            ("mode", "subscription".to_string()),
            ("payment_method_types[0]", "card".to_string()),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", "usd".to_string()),
            ("line_items[0][price_data][unit_amount]", plan.unit_amount().to_string()),
            ("line_items[0][price_data][recurring][interval]", "month".to_string()),
            ("line_items[0][price_data][product_data][name]", plan.product_name().to_string()),
            (
                "line_items[0][price_data][product_data][description]",
                plan.description().to_string(),
            ),
            (
                "success_url",
                format!("{}/membership?success=true&session_id={{CHECKOUT_SESSION_ID}}", frontend),
            ),
            ("cancel_url", format!("{}/membership?canceled=true", frontend)),
            ("client_reference_id", user_id.to_string()),
            ("metadata[userId]", user_id.to_string()),
            ("metadata[planId]", plan.id().to_string()),
        ];
        if let Some(email) = email.filter(|e| !e.trim().is_empty()) {
            form.push(("customer_email", email.trim().to_string()));
        }

        let url = format!(
            "{}/checkout/sessions",
            config.stripe.api_base_url.trim_end_matches('/')
        );
        let response = http
            .post(url)
            .bearer_auth(secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::from_transport("Stripe", e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::from_transport("Stripe", e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<StripeErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or_default();
            return Err(AppError::upstream("Stripe", message));
        }

        let session: StripeCheckoutResponse = serde_json::from_str(&body)
            .map_err(|e| AppError::upstream("Stripe", format!("Unexpected response body: {}", e)))?;
        tracing::info!("Created checkout session {} for user {}", session.id, user_id);

        Ok(CheckoutSession {
            session_id: session.id,
            url: session.url,
        })
    }

    /// Verify a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`)
    /// against the raw body.
    pub fn verify_signature(
        secret: &str,
        header: &str,
        body: &[u8],
        now_unix: i64,
    ) -> AppResult<()> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", v)) => timestamp = v.parse::<i64>().ok(),
                Some(("v1", v)) => signatures.push(v),
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| AppError::BadRequest("Invalid signature format".to_string()))?;
        if signatures.is_empty() {
            return Err(AppError::BadRequest("Invalid signature format".to_string()));
        }

        let mut signed = Vec::with_capacity(body.len() + 16);
        signed.extend_from_slice(timestamp.to_string().as_bytes());
        signed.push(b'.');
        signed.extend_from_slice(body);

        let matched = signatures.iter().any(|sig| {
            let Ok(expected) = hex::decode(sig) else {
                return false;
            };
            let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
                return false;
            };
            mac.update(&signed);
            mac.verify_slice(&expected).is_ok()
        });
        if !matched {
            return Err(AppError::Unauthorized);
        }

        if (now_unix - timestamp).abs() > SIGNATURE_TOLERANCE_SECONDS {
            return Err(AppError::BadRequest("Message too old".to_string()));
        }

        Ok(())
    }

    /// Apply a verified event to stored subscriptions. Unknown event types
    /// are acknowledged and ignored.
    pub async fn handle_event(pool: &SqlitePool, event: &StripeEvent) -> AppResult<()> {
        let object = &event.data.object;
        let text = |v: &serde_json::Value| v.as_str().map(str::to_string);

        match event.event_type.as_str() {
            EVENT_CHECKOUT_COMPLETED => {
                let user_id = text(&object["metadata"]["userId"]);
                let plan_id = text(&object["metadata"]["planId"]);
                match (user_id, plan_id) {
                    (Some(user_id), Some(plan_id)) => {
                        SubscriptionRepository::activate(
                            pool,
                            &user_id,
                            &plan_id,
                            object["customer"].as_str(),
                            object["subscription"].as_str(),
                        )
                        .await?;
                        tracing::info!("Subscription activated for user {}: {}", user_id, plan_id);
                    }
                    _ => tracing::warn!("Checkout session without user or plan metadata"),
                }
            }
            EVENT_SUBSCRIPTION_UPDATED | EVENT_SUBSCRIPTION_DELETED => {
                let Some(customer) = object["customer"].as_str() else {
                    tracing::warn!("{} without customer id", event.event_type);
                    return Ok(());
                };
                let (status, plan) = if event.event_type == EVENT_SUBSCRIPTION_DELETED {
                    ("canceled", Some("free"))
                } else {
                    (object["status"].as_str().unwrap_or("active"), None)
                };
                let found =
                    SubscriptionRepository::update_by_customer(pool, customer, status, plan).await?;
                if !found {
                    tracing::warn!("No subscription linked to customer {}", customer);
                }
            }
            other => tracing::info!("Unhandled Stripe event type: {}", other),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use axum::{routing::post, Form, Json, Router};
    use std::collections::HashMap;

    fn sign(secret: &str, t: i64, body: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.{}", t, body).as_bytes());
        format!("t={},v1={}", t, hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn accepts_valid_signature() {
        let body = r#"{"type":"ping"}"#;
        let header = sign("whsec", 1_700_000_000, body);
        assert!(BillingService::verify_signature("whsec", &header, body.as_bytes(), 1_700_000_010).is_ok());
    }

    #[test]
    fn rejects_wrong_secret_old_timestamp_and_garbage() {
        let body = r#"{"type":"ping"}"#;
        let header = sign("whsec", 1_700_000_000, body);

        assert!(matches!(
            BillingService::verify_signature("other", &header, body.as_bytes(), 1_700_000_000),
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(
            BillingService::verify_signature("whsec", &header, body.as_bytes(), 1_700_001_000),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            BillingService::verify_signature("whsec", "v1=abc", body.as_bytes(), 0),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            BillingService::verify_signature("whsec", &header, b"tampered", 1_700_000_000),
            Err(AppError::Unauthorized)
        ));
    }

    fn event(json: serde_json::Value) -> StripeEvent {
        serde_json::from_value(json).unwrap()
    }

    #[tokio::test]
    async fn subscription_lifecycle_from_events() {
        let pool = test_pool().await;

        BillingService::handle_event(
            &pool,
            &event(serde_json::json!({
                "type": "checkout.session.completed",
                "data": { "object": {
                    "customer": "cus_1",
                    "subscription": "sub_1",
                    "metadata": { "userId": "u1", "planId": "pro" }
                }}
            })),
        )
        .await
        .unwrap();
        let sub = SubscriptionRepository::find_by_user_id(&pool, "u1").await.unwrap().unwrap();
        assert_eq!((sub.plan.as_str(), sub.status.as_str()), ("pro", "active"));

        BillingService::handle_event(
            &pool,
            &event(serde_json::json!({
                "type": "customer.subscription.updated",
                "data": { "object": { "customer": "cus_1", "status": "past_due" } }
            })),
        )
        .await
        .unwrap();
        let sub = SubscriptionRepository::find_by_user_id(&pool, "u1").await.unwrap().unwrap();
        assert_eq!((sub.plan.as_str(), sub.status.as_str()), ("pro", "past_due"));

        BillingService::handle_event(
            &pool,
            &event(serde_json::json!({
                "type": "customer.subscription.deleted",
                "data": { "object": { "customer": "cus_1" } }
            })),
        )
        .await
        .unwrap();
        let sub = SubscriptionRepository::find_by_user_id(&pool, "u1").await.unwrap().unwrap();
        assert_eq!((sub.plan.as_str(), sub.status.as_str()), ("free", "canceled"));

        BillingService::handle_event(
            &pool,
            &event(serde_json::json!({ "type": "invoice.paid", "data": { "object": {} } })),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn unknown_plan_and_missing_key_fail_before_any_call() {
        let http = reqwest::Client::new();
        let mut config = Config::default();
        config.stripe.secret_key = Some("sk_test".to_string());

        assert!(matches!(
            BillingService::create_checkout(&config, &http, "u1", "gold", None).await,
            Err(AppError::BadRequest(_))
        ));

        config.stripe.secret_key = None;
        assert!(matches!(
            BillingService::create_checkout(&config, &http, "u1", "plus", None).await,
            Err(AppError::Config(_))
        ));
    }

    #[tokio::test]
    async fn checkout_posts_plan_price_and_returns_session() {
        let router = Router::new().route(
            "/checkout/sessions",
            post(|Form(form): Form<HashMap<String, String>>| async move {
                assert_eq!(form["line_items[0][price_data][unit_amount]"], "990");
                assert_eq!(form["mode"], "subscription");
                assert_eq!(form["metadata[userId]"], "u1");
                assert_eq!(form["customer_email"], "a@example.com");
                Json(serde_json::json!({ "id": "cs_test_1", "url": "https://checkout.stripe.com/c/cs_test_1" }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let mut config = Config::default();
        config.stripe.secret_key = Some("sk_test".to_string());
        config.stripe.api_base_url = format!("http://{}", addr);

        let session = BillingService::create_checkout(
            &config,
            &reqwest::Client::new(),
            "u1",
            "plus",
            Some("a@example.com"),
        )
        .await
        .unwrap();
        assert_eq!(session.session_id, "cs_test_1");
        assert_eq!(session.url.as_deref(), Some("https://checkout.stripe.com/c/cs_test_1"));
    }
}
