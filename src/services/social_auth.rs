//! Social platform connection state.
//!
//! Per user and platform: `Unauthorized -> Pending (redirect issued) ->
//! Authorized (row written) -> Expired | Revoked -> Unauthorized`. Expiry is
//! computed when a row is read; nothing rewrites rows in the background.

use chrono::{Duration, NaiveDateTime, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db::models::{Platform, SocialAuthorization, UpsertSocialAuthorization};
use crate::db::SocialAuthorizationRepository;
use crate::error::{AppError, AppResult};

/// Authorization code the demo redirect hands to the callback.
pub const DEMO_CODE: &str = "demo_code";
/// Token stored for demo connections. The publisher never calls out with it.
pub const DEMO_ACCESS_TOKEN: &str = "demo_access_token";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationStatus {
    pub is_authorized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired: Option<bool>,
}

impl AuthorizationStatus {
    fn unauthorized() -> Self {
        Self {
            is_authorized: false,
            account_name: None,
            account_id: None,
            expired: None,
        }
    }

    /// Status of a stored row at `now`.
    pub fn from_row(row: Option<&SocialAuthorization>, now: NaiveDateTime) -> Self {
        match row {
            None => Self::unauthorized(),
            Some(row) if row.is_expired_at(now) => Self {
                expired: Some(true),
                ..Self::unauthorized()
            },
            Some(row) => Self {
                is_authorized: true,
                account_name: Some(row.account_name.clone()),
                account_id: Some(row.account_id.clone()),
                expired: None,
            },
        }
    }
}

/// Signed `state` parameter of the OAuth round trip. Identifies the user on
/// the callback, which arrives without the session header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthState {
    pub sub: String,
    pub platform: String,
    pub csrf_token: String,
    pub iat: usize,
    pub exp: usize,
}

pub struct SocialAuthService;

impl SocialAuthService {
    pub fn redirect_uri(config: &Config, platform: Platform) -> String {
        format!(
            "{}/api/social-auth/callback/{}",
            config.server.public_url.trim_end_matches('/'),
            platform
        )
    }

    pub fn sign_state(config: &Config, user_id: &str, platform: Platform) -> AppResult<String> {
        let now = Utc::now();
        let claims = OAuthState {
            sub: user_id.to_string(),
            platform: platform.as_str().to_string(),
            csrf_token: generate_random_string(32),
            iat: now.timestamp() as usize,
            exp: (now + Duration::minutes(config.auth.oauth_state_ttl_minutes)).timestamp()
                as usize,
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.auth.jwt_secret.as_bytes()),
        )?)
    }

    pub fn decode_state(config: &Config, state: &str) -> AppResult<OAuthState> {
        let data = decode::<OAuthState>(
            state,
            &DecodingKey::from_secret(config.auth.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| {
            tracing::warn!("Failed to decode OAuth state: {:?}", e);
            e
        })?;
        Ok(data.claims)
    }

    /// Where to send the user to connect `platform`. Without a configured
    /// client id the user goes straight to the local callback in demo mode.
    pub fn authorize_url(config: &Config, user_id: &str, platform: Platform) -> AppResult<String> {
        let state = Self::sign_state(config, user_id, platform)?;
        let redirect_uri = Self::redirect_uri(config, platform);

        let Some(client_id) = config.social.client(platform).client_id.as_deref() else {
            tracing::info!("No OAuth client for {}; using demo authorization", platform);
            return Ok(format!(
                "{}?code={}&state={}",
                redirect_uri,
                DEMO_CODE,
                urlencoding::encode(&state)
            ));
        };

        let profile = platform.profile();
        let url = url::Url::parse_with_params(
            profile.oauth_authorize_url,
            &[
                ("client_id", client_id),
                ("redirect_uri", redirect_uri.as_str()),
                ("scope", profile.oauth_scope),
                ("response_type", "code"),
                ("state", state.as_str()),
            ],
        )
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid authorize URL: {}", e)))?;

        Ok(url.to_string())
    }

    /// Finish the OAuth round trip for `platform`: check the state, then write
    /// the authorization row in one statement.
    ///
    /// Token exchange with the platform is not performed; the received code is
    /// stored as the access token.
    pub async fn complete_callback(
        pool: &SqlitePool,
        config: &Config,
        platform: Platform,
        code: &str,
        state: &str,
    ) -> AppResult<SocialAuthorization> {
        let claims = Self::decode_state(config, state).map_err(|_| AppError::Unauthorized)?;
        if claims.platform != platform.as_str() {
            tracing::warn!(
                "OAuth state issued for {} used on {} callback",
                claims.platform,
                platform
            );
            return Err(AppError::BadRequest("OAuth state mismatch".to_string()));
        }

        let now = Utc::now();
        let access_token = if code == DEMO_CODE {
            DEMO_ACCESS_TOKEN.to_string()
        } else {
            code.to_string()
        };
        let auth = UpsertSocialAuthorization {
            platform: platform.as_str().to_string(),
            account_id: format!("{}_{}", platform, now.timestamp_millis()),
            account_name: format!("Demo {} Account", platform.display_name()),
            access_token,
            token_expires_at: Some(
                (now + Duration::minutes(config.social.token_ttl_minutes)).naive_utc(),
            ),
        };

        let row = SocialAuthorizationRepository::upsert(pool, &claims.sub, auth).await?;
        tracing::info!("Stored {} authorization for user {}", platform, claims.sub);
        Ok(row)
    }

    pub async fn get_status(
        pool: &SqlitePool,
        user_id: Option<&str>,
        platform: Platform,
    ) -> AppResult<AuthorizationStatus> {
        let Some(user_id) = user_id else {
            return Ok(AuthorizationStatus::unauthorized());
        };
        let row = SocialAuthorizationRepository::find_latest(pool, user_id, platform.as_str()).await?;
        Ok(AuthorizationStatus::from_row(
            row.as_ref(),
            Utc::now().naive_utc(),
        ))
    }

    /// Latest row that can still be used to publish.
    pub async fn usable_authorization(
        pool: &SqlitePool,
        user_id: &str,
        platform: Platform,
    ) -> AppResult<Option<SocialAuthorization>> {
        let row = SocialAuthorizationRepository::find_latest(pool, user_id, platform.as_str()).await?;
        Ok(row.filter(|r| !r.is_expired()))
    }

    pub async fn revoke(pool: &SqlitePool, user_id: &str, platform: Platform) -> AppResult<u64> {
        let removed =
            SocialAuthorizationRepository::delete_for_platform(pool, user_id, platform.as_str())
                .await?;
        tracing::info!(
            "Revoked {} {} authorization(s) for user {}",
            removed,
            platform,
            user_id
        );
        Ok(removed)
    }
}

pub fn generate_random_string(length: usize) -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}
