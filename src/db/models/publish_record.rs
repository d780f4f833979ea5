use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    Success,
    Failed,
}

impl PublishStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PublishStatus::Success => "success",
            PublishStatus::Failed => "failed",
        }
    }
}

/// One row per publish attempt (append-only audit log).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRecord {
    pub id: String,
    pub user_id: String,
    pub platform: String,
    pub content: String,
    pub post_id: Option<String>,
    pub post_url: Option<String>,
    pub status: String,
    pub error_message: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePublishRecord {
    pub user_id: String,
    pub platform: String,
    pub content: String,
    pub post_id: Option<String>,
    pub post_url: Option<String>,
    pub status: PublishStatus,
    pub error_message: Option<String>,
}
