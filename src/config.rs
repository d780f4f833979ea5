use std::env;

use serde::Deserialize;

use crate::db::models::Platform;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub openai: OpenAiConfig,
    pub deepseek: DeepSeekConfig,
    pub http: HttpConfig,
    pub social: SocialConfig,
    pub stripe: StripeConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origin of the web front end, used for CORS and checkout return URLs.
    pub frontend_url: String,
    /// Public base URL of this service. OAuth redirect URIs are built from it.
    pub public_url: String,
    /// Idle time after which an in-memory content session is dropped.
    pub content_session_idle_minutes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Shared HS256 secret of the external identity provider. Also signs OAuth state.
    pub jwt_secret: String,
    /// Cookie consulted when no `Authorization` header is present (popup windows).
    pub cookie_name: String,
    pub oauth_state_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeepSeekConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Client-side bound for a single generation call.
    pub generation_timeout_seconds: u64,
    /// Bound applied to every other outbound call (publish, checkout, token exchange).
    pub outbound_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthClientConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SocialConfig {
    pub instagram: OAuthClientConfig,
    pub facebook: OAuthClientConfig,
    pub x: OAuthClientConfig,
    /// Lifetime given to tokens stored by the OAuth callback.
    pub token_ttl_minutes: i64,
}

impl SocialConfig {
    pub fn client(&self, platform: Platform) -> &OAuthClientConfig {
        match platform {
            Platform::Instagram => &self.instagram,
            Platform::Facebook => &self.facebook,
            Platform::X => &self.x,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub api_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Allowed requests per second (per IP) for `/api/generate`
    pub generate_per_second: u32,
    /// Burst size for `/api/generate`
    pub generate_burst: u32,
    /// Allowed requests per second (per IP) for `/api/social-auth/*`
    pub auth_per_second: u32,
    /// Burst size for `/api/social-auth/*`
    pub auth_burst: u32,
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(default),
    }
}

fn oauth_client(prefix: &str) -> OAuthClientConfig {
    OAuthClientConfig {
        client_id: optional_env(&format!("{}_CLIENT_ID", prefix)),
        client_secret: optional_env(&format!("{}_CLIENT_SECRET", prefix)),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parsed_env("PORT", 8080)?,
                frontend_url: env::var("FRONTEND_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
                public_url: env::var("PUBLIC_URL")
                    .unwrap_or_else(|_| "http://localhost:8080".to_string()),
                content_session_idle_minutes: parsed_env("CONTENT_SESSION_IDLE_MINUTES", 120)?,
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/hypecat.db".to_string()),
                max_connections: parsed_env("DATABASE_MAX_CONNECTIONS", 5)?,
            },
            auth: AuthConfig {
                jwt_secret: env::var("AUTH_JWT_SECRET")
                    .map_err(|_| ConfigError::MissingEnv("AUTH_JWT_SECRET".to_string()))?,
                cookie_name: env::var("AUTH_COOKIE_NAME")
                    .unwrap_or_else(|_| "access_token".to_string()),
                oauth_state_ttl_minutes: parsed_env("OAUTH_STATE_TTL_MINUTES", 10)?,
            },
            openai: OpenAiConfig {
                api_key: optional_env("OPENAI_API_KEY"),
                base_url: env::var("OPENAI_API_BASE_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            },
            deepseek: DeepSeekConfig {
                api_key: optional_env("DEEPSEEK_API_KEY"),
                base_url: env::var("DEEPSEEK_API_BASE_URL")
                    .unwrap_or_else(|_| "https://api.deepseek.com/v1".to_string()),
                model: env::var("DEEPSEEK_MODEL").unwrap_or_else(|_| "deepseek-chat".to_string()),
            },
            http: HttpConfig {
                generation_timeout_seconds: parsed_env("GENERATION_TIMEOUT_SECONDS", 15)?,
                outbound_timeout_seconds: parsed_env("OUTBOUND_TIMEOUT_SECONDS", 15)?,
            },
            social: SocialConfig {
                instagram: oauth_client("INSTAGRAM"),
                facebook: oauth_client("FACEBOOK_APP"),
                x: oauth_client("TWITTER"),
                token_ttl_minutes: parsed_env("SOCIAL_TOKEN_TTL_MINUTES", 60)?,
            },
            stripe: StripeConfig {
                secret_key: optional_env("STRIPE_SECRET_KEY"),
                webhook_secret: optional_env("STRIPE_WEBHOOK_SECRET"),
                api_base_url: env::var("STRIPE_API_BASE_URL")
                    .unwrap_or_else(|_| "https://api.stripe.com/v1".to_string()),
            },
            rate_limit: RateLimitConfig {
                generate_per_second: parsed_env("RATE_LIMIT_GENERATE_PER_SECOND", 2)?,
                generate_burst: parsed_env("RATE_LIMIT_GENERATE_BURST", 10)?,
                auth_per_second: parsed_env("RATE_LIMIT_AUTH_PER_SECOND", 3)?,
                auth_burst: parsed_env("RATE_LIMIT_AUTH_BURST", 10)?,
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        let no_client = OAuthClientConfig {
            client_id: None,
            client_secret: None,
        };
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                frontend_url: "http://localhost:3000".to_string(),
                public_url: "http://localhost:8080".to_string(),
                content_session_idle_minutes: 120,
            },
            database: DatabaseConfig {
                url: "sqlite://data/hypecat.db".to_string(),
                max_connections: 5,
            },
            auth: AuthConfig {
                jwt_secret: String::new(),
                cookie_name: "access_token".to_string(),
                oauth_state_ttl_minutes: 10,
            },
            openai: OpenAiConfig {
                api_key: None,
                base_url: "https://api.openai.com/v1".to_string(),
            },
            deepseek: DeepSeekConfig {
                api_key: None,
                base_url: "https://api.deepseek.com/v1".to_string(),
                model: "deepseek-chat".to_string(),
            },
            http: HttpConfig {
                generation_timeout_seconds: 15,
                outbound_timeout_seconds: 15,
            },
            social: SocialConfig {
                instagram: no_client.clone(),
                facebook: no_client.clone(),
                x: no_client,
                token_ttl_minutes: 60,
            },
            stripe: StripeConfig {
                secret_key: None,
                webhook_secret: None,
                api_base_url: "https://api.stripe.com/v1".to_string(),
            },
            rate_limit: RateLimitConfig {
                generate_per_second: 2,
                generate_burst: 10,
                auth_per_second: 3,
                auth_burst: 10,
            },
        }
    }
}
