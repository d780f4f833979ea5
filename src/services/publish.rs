use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::db::models::{CreatePublishRecord, Platform, PublishStatus, SocialAuthorization};
use crate::db::{PublishHistoryRepository, SocialAuthorizationRepository};
use crate::error::{AppError, AppResult};
use crate::i18n::I18n;
use crate::services::social_auth::DEMO_ACCESS_TOKEN;

/// Result of a successful publish attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub success: bool,
    pub post_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct GraphPostResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TweetResponse {
    data: TweetData,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PlatformErrorResponse {
    error: PlatformErrorBody,
}

#[derive(Debug, Deserialize)]
struct PlatformErrorBody {
    #[serde(default)]
    message: String,
}

/// Posts content to a connected platform account and keeps the audit log.
pub struct Publisher<'a> {
    pool: &'a SqlitePool,
    http: &'a reqwest::Client,
    i18n: &'a I18n,
    lang: Option<&'a str>,
    api_base_override: Option<String>,
}

impl<'a> Publisher<'a> {
    pub fn new(
        pool: &'a SqlitePool,
        http: &'a reqwest::Client,
        i18n: &'a I18n,
        lang: Option<&'a str>,
    ) -> Self {
        Self {
            pool,
            http,
            i18n,
            lang,
            api_base_override: None,
        }
    }

    /// Send every platform call to `base` instead of the real API.
    #[cfg(test)]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base_override = Some(base.into());
        self
    }

    fn api_base(&self, platform: Platform) -> &str {
        self.api_base_override
            .as_deref()
            .unwrap_or(platform.profile().api_base)
    }

    fn tr(&self, key: &str, platform: Platform) -> String {
        self.i18n.tr(
            self.lang,
            key,
            Some(&[("platform", platform.display_name())]),
        )
    }

    /// Resolve the user's usable authorization, distinguishing a missing one
    /// from an expired one.
    async fn authorization(&self, user_id: &str, platform: Platform) -> AppResult<SocialAuthorization> {
        let row = SocialAuthorizationRepository::find_latest(self.pool, user_id, platform.as_str())
            .await?
            .ok_or_else(|| AppError::PlatformNotAuthorized(self.tr("publish.not_authorized", platform)))?;
        if row.is_expired() {
            return Err(AppError::PlatformNotAuthorized(
                self.tr("publish.expired", platform),
            ));
        }
        Ok(row)
    }

    pub async fn publish(
        &self,
        user_id: &str,
        platform: Platform,
        content: &str,
        account_id: Option<&str>,
    ) -> AppResult<PublishOutcome> {
        if content.trim().is_empty() {
            return Err(AppError::Validation(
                self.i18n.tr(self.lang, "validation.content_required", None),
            ));
        }

        let auth = self.authorization(user_id, platform).await?;

        if auth.access_token == DEMO_ACCESS_TOKEN {
            let millis = Utc::now().timestamp_millis();
            let post_id = format!("demo_post_{}", millis);
            let url = format!("https://{}.com/post/demo_{}", platform, millis);
            self.record_success(user_id, platform, content, &post_id, Some(&url))
                .await;
            tracing::info!("Demo publish to {} for user {}", platform, user_id);
            return Ok(PublishOutcome {
                success: true,
                post_id,
                url: Some(url),
                message: self.i18n.tr(self.lang, "publish.demo_success", None),
            });
        }

        let account_id = account_id.unwrap_or(&auth.account_id);
        match self.post(platform, &auth.access_token, content, account_id).await {
            Ok(post_id) => {
                self.record_success(user_id, platform, content, &post_id, None)
                    .await;
                tracing::info!("Published to {} for user {}: {}", platform, user_id, post_id);
                Ok(PublishOutcome {
                    success: true,
                    post_id,
                    url: None,
                    message: self.tr("publish.success", platform),
                })
            }
            Err(e) => {
                self.record_failure(user_id, platform, content, &e.to_string())
                    .await;
                Err(e)
            }
        }
    }

    /// One platform API call; returns the new post id.
    async fn post(
        &self,
        platform: Platform,
        access_token: &str,
        content: &str,
        account_id: &str,
    ) -> AppResult<String> {
        let base = self.api_base(platform).trim_end_matches('/');
        let service = platform.display_name();

        let request = match platform {
            Platform::Instagram => self
                .http
                .post(format!("{}/{}/media", base, account_id))
                .json(&serde_json::json!({ "caption": content, "access_token": access_token })),
            Platform::Facebook => {
                let target = if account_id.is_empty() { "me" } else { account_id };
                self.http
                    .post(format!("{}/{}/feed", base, target))
                    .json(&serde_json::json!({ "message": content, "access_token": access_token }))
            }
            Platform::X => self
                .http
                .post(format!("{}/tweets", base))
                .bearer_auth(access_token)
                .json(&serde_json::json!({ "text": content })),
        };

        let response = request
            .send()
            .await
            .map_err(|e| AppError::from_transport(service, e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::from_transport(service, e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<PlatformErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or_default();
            return Err(AppError::upstream(service, message));
        }

        let post_id = match platform {
            Platform::X => serde_json::from_str::<TweetResponse>(&body).map(|r| r.data.id),
            _ => serde_json::from_str::<GraphPostResponse>(&body).map(|r| r.id),
        };
        post_id.map_err(|e| AppError::upstream(service, format!("Unexpected response body: {}", e)))
    }

    /// The post is already live at this point, so a failed audit write is
    /// logged and the outcome still returned.
    async fn record_success(
        &self,
        user_id: &str,
        platform: Platform,
        content: &str,
        post_id: &str,
        post_url: Option<&str>,
    ) {
        let record = CreatePublishRecord {
            user_id: user_id.to_string(),
            platform: platform.as_str().to_string(),
            content: content.to_string(),
            post_id: Some(post_id.to_string()),
            post_url: post_url.map(str::to_string),
            status: PublishStatus::Success,
            error_message: None,
        };
        if let Err(e) = PublishHistoryRepository::create(self.pool, record).await {
            tracing::warn!(
                "Published {} to {} for user {} but failed to record it: {:?}",
                post_id,
                platform,
                user_id,
                e
            );
        }
    }

    /// Best-effort: a failed audit write is logged and otherwise ignored.
    async fn record_failure(&self, user_id: &str, platform: Platform, content: &str, error: &str) {
        let record = CreatePublishRecord {
            user_id: user_id.to_string(),
            platform: platform.as_str().to_string(),
            content: content.to_string(),
            post_id: None,
            post_url: None,
            status: PublishStatus::Failed,
            error_message: Some(error.to_string()),
        };
        if let Err(e) = PublishHistoryRepository::create(self.pool, record).await {
            tracing::warn!("Failed to record failed publish for user {}: {:?}", user_id, e);
        }
    }
}
