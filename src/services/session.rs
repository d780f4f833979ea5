//! Verification of sessions issued by the external identity provider, and
//! the request extractors built on it.
//!
//! `SessionService` is created once at startup from `AuthConfig` and lives in
//! `AppState`. Tokens are HS256 JWTs read from `Authorization: Bearer ...` or,
//! for popup windows that cannot set headers, from the session cookie.

use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: usize,
}

pub struct SessionService {
    decoding_key: DecodingKey,
    cookie_name: String,
    #[cfg(test)]
    secret: String,
}

impl SessionService {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            cookie_name: config.cookie_name.clone(),
            #[cfg(test)]
            secret: config.jwt_secret.clone(),
        }
    }

    /// Decode and validate a session token, returning its claims.
    pub fn verify(&self, token: &str) -> AppResult<SessionClaims> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &Validation::default())?;
        if data.claims.sub.trim().is_empty() {
            return Err(AppError::Unauthorized);
        }
        Ok(data.claims)
    }

    /// Raw token carried by a request, if any.
    pub fn token_from_parts(&self, parts: &Parts) -> Option<String> {
        let bearer = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| {
                if v.len() > 7 && v[..7].eq_ignore_ascii_case("bearer ") {
                    Some(v[7..].trim().to_string())
                } else {
                    None
                }
            })
            .filter(|t| !t.is_empty());

        bearer.or_else(|| {
            CookieJar::from_headers(&parts.headers)
                .get(&self.cookie_name)
                .map(|c| c.value().to_string())
                .filter(|t| !t.is_empty())
        })
    }

    /// Sign a session token the way the identity provider would.
    #[cfg(test)]
    pub fn issue(&self, user_id: &str, email: Option<&str>) -> String {
        let claims = SessionClaims {
            sub: user_id.to_string(),
            email: email.map(str::to_string),
            exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
        };
        jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .expect("sign test session")
    }
}

/// Extractor for an authenticated user.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: Option<String>,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = state.sessions.token_from_parts(parts).ok_or_else(|| {
            tracing::debug!("Missing session token");
            AppError::Unauthorized
        })?;

        let claims = state.sessions.verify(&token).map_err(|e| {
            tracing::debug!("Rejected session token: {:?}", e);
            AppError::Unauthorized
        })?;

        Ok(AuthUser {
            user_id: claims.sub,
            email: claims.email,
        })
    }
}

/// Like `AuthUser`, but a missing or invalid session yields `None`.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(
            AuthUser::from_request_parts(parts, state).await.ok(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(secret: &str) -> SessionService {
        SessionService::new(&AuthConfig {
            jwt_secret: secret.to_string(),
            cookie_name: "access_token".to_string(),
            oauth_state_ttl_minutes: 10,
        })
    }

    fn parts(header: Option<(&str, &str)>) -> Parts {
        let mut builder = http::Request::builder().uri("/");
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn verifies_tokens_signed_with_shared_secret() {
        let svc = service("secret");
        let token = svc.issue("user-1", Some("a@example.com"));
        let claims = svc.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email.as_deref(), Some("a@example.com"));

        let other = service("other-secret");
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn reads_bearer_header_then_cookie() {
        let svc = service("secret");
        assert_eq!(
            svc.token_from_parts(&parts(Some(("authorization", "Bearer abc")))),
            Some("abc".to_string())
        );
        assert_eq!(
            svc.token_from_parts(&parts(Some(("cookie", "theme=dark; access_token=xyz")))),
            Some("xyz".to_string())
        );
        assert_eq!(
            svc.token_from_parts(&parts(Some(("authorization", "Basic abc")))),
            None
        );
        assert_eq!(svc.token_from_parts(&parts(None)), None);
    }
}
