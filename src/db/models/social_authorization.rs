use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A stored credential linking a user to one social-platform account.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SocialAuthorization {
    pub id: String,
    pub user_id: String,
    pub platform: String,
    pub account_id: String,
    pub account_name: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    pub token_expires_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl SocialAuthorization {
    /// Expiry is derived at read time; rows are never transitioned in storage.
    pub fn is_expired_at(&self, now: NaiveDateTime) -> bool {
        matches!(self.token_expires_at, Some(exp) if exp < now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().naive_utc())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertSocialAuthorization {
    pub platform: String,
    pub account_id: String,
    pub account_name: String,
    pub access_token: String,
    pub token_expires_at: Option<NaiveDateTime>,
}
