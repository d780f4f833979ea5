use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::{AppError, AppResult};

/// Raw access to the `kv_store` table. Documents are opaque strings scoped by owner.
pub struct KeyValueRepository;

impl KeyValueRepository {
    pub async fn get(pool: &SqlitePool, scope: &str, key: &str) -> AppResult<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT value FROM kv_store WHERE scope = ? AND key = ?")
            .bind(scope)
            .bind(key)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    pub async fn put(pool: &SqlitePool, scope: &str, key: &str, value: &str) -> AppResult<()> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO kv_store (scope, key, value, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(scope, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(scope)
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }
}
