use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::*;
use crate::error::{AppError, AppResult};

// ============================================================================
// Publishing History Repository
// ============================================================================

pub struct PublishHistoryRepository;

impl PublishHistoryRepository {
    pub async fn create(pool: &SqlitePool, record: CreatePublishRecord) -> AppResult<PublishRecord> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query_as::<_, PublishRecord>(
            r#"
            INSERT INTO publishing_history (
                id, user_id, platform, content, post_id,
                post_url, status, error_message, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING
                id, user_id, platform, content, post_id,
                post_url, status, error_message, created_at
            "#,
        )
        .bind(id)
        .bind(record.user_id)
        .bind(record.platform)
        .bind(record.content)
        .bind(record.post_id)
        .bind(record.post_url)
        .bind(record.status.as_str())
        .bind(record.error_message)
        .bind(now)
        .fetch_one(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Publish attempts of a user, newest first, optionally filtered by platform.
    pub async fn find_by_user_id(
        pool: &SqlitePool,
        user_id: &str,
        platform: Option<&str>,
        limit: Option<i64>,
    ) -> AppResult<Vec<PublishRecord>> {
        let limit_val = limit.unwrap_or(100);

        sqlx::query_as::<_, PublishRecord>(
            r#"
            SELECT
                id, user_id, platform, content, post_id,
                post_url, status, error_message, created_at
            FROM publishing_history
            WHERE user_id = ?
            AND (? IS NULL OR platform = ?)
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(platform)
        .bind(platform)
        .bind(limit_val)
        .fetch_all(pool)
        .await
        .map_err(AppError::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn record(platform: &str, status: PublishStatus) -> CreatePublishRecord {
        CreatePublishRecord {
            user_id: "u1".to_string(),
            platform: platform.to_string(),
            content: "hello".to_string(),
            post_id: None,
            post_url: None,
            status,
            error_message: match status {
                PublishStatus::Failed => Some("boom".to_string()),
                PublishStatus::Success => None,
            },
        }
    }

    #[tokio::test]
    async fn records_both_outcomes_and_filters_by_platform() {
        let pool = test_pool().await;
        PublishHistoryRepository::create(&pool, record("x", PublishStatus::Success))
            .await
            .unwrap();
        let failed = PublishHistoryRepository::create(&pool, record("facebook", PublishStatus::Failed))
            .await
            .unwrap();
        assert_eq!(failed.status, "failed");
        assert_eq!(failed.error_message.as_deref(), Some("boom"));

        let all = PublishHistoryRepository::find_by_user_id(&pool, "u1", None, None)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let only_x = PublishHistoryRepository::find_by_user_id(&pool, "u1", Some("x"), None)
            .await
            .unwrap();
        assert_eq!(only_x.len(), 1);
        assert_eq!(only_x[0].status, "success");
    }
}
