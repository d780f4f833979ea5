use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::models::{SocialAuthorization, UpsertSocialAuthorization};
use crate::error::{AppError, AppResult};

const COLUMNS: &str = "id, user_id, platform, account_id, account_name, access_token, \
                       token_expires_at, created_at, updated_at";

/// Repository for the `social_authorizations` table.
pub struct SocialAuthorizationRepository;

impl SocialAuthorizationRepository {
    /// Create or update the row identified by (user_id, platform, account_id).
    ///
    /// A single statement, so the row is either fully written or not at all.
    pub async fn upsert(
        pool: &SqlitePool,
        user_id: &str,
        auth: UpsertSocialAuthorization,
    ) -> AppResult<SocialAuthorization> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        let sql = format!(
            r#"
            INSERT INTO social_authorizations (
                id, user_id, platform, account_id, account_name,
                access_token, token_expires_at, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, platform, account_id) DO UPDATE SET
                account_name = excluded.account_name,
                access_token = excluded.access_token,
                token_expires_at = excluded.token_expires_at,
                updated_at = excluded.updated_at
            RETURNING {}
            "#,
            COLUMNS
        );

        sqlx::query_as::<_, SocialAuthorization>(&sql)
            .bind(id)
            .bind(user_id)
            .bind(auth.platform)
            .bind(auth.account_id)
            .bind(auth.account_name)
            .bind(auth.access_token)
            .bind(auth.token_expires_at)
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Most recently written authorization for a user on a platform.
    pub async fn find_latest(
        pool: &SqlitePool,
        user_id: &str,
        platform: &str,
    ) -> AppResult<Option<SocialAuthorization>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM social_authorizations
            WHERE user_id = ? AND platform = ?
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
            COLUMNS
        );

        sqlx::query_as::<_, SocialAuthorization>(&sql)
            .bind(user_id)
            .bind(platform)
            .fetch_optional(pool)
            .await
            .map_err(AppError::Database)
    }

    /// Delete every authorization of a user on a platform. Returns the number of rows removed.
    pub async fn delete_for_platform(
        pool: &SqlitePool,
        user_id: &str,
        platform: &str,
    ) -> AppResult<u64> {
        let result =
            sqlx::query("DELETE FROM social_authorizations WHERE user_id = ? AND platform = ?")
                .bind(user_id)
                .bind(platform)
                .execute(pool)
                .await
                .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use chrono::Duration;

    fn auth(account_id: &str, name: &str) -> UpsertSocialAuthorization {
        UpsertSocialAuthorization {
            platform: "instagram".to_string(),
            account_id: account_id.to_string(),
            account_name: name.to_string(),
            access_token: "tok".to_string(),
            token_expires_at: Some((Utc::now() + Duration::hours(1)).naive_utc()),
        }
    }

    #[tokio::test]
    async fn upsert_updates_existing_account_row() {
        let pool = test_pool().await;

        let first = SocialAuthorizationRepository::upsert(&pool, "u1", auth("acc", "Old"))
            .await
            .unwrap();
        let second = SocialAuthorizationRepository::upsert(&pool, "u1", auth("acc", "New"))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.account_name, "New");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM social_authorizations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn delete_removes_all_accounts_for_platform() {
        let pool = test_pool().await;
        SocialAuthorizationRepository::upsert(&pool, "u1", auth("a", "A"))
            .await
            .unwrap();
        SocialAuthorizationRepository::upsert(&pool, "u1", auth("b", "B"))
            .await
            .unwrap();
        SocialAuthorizationRepository::upsert(&pool, "u2", auth("c", "C"))
            .await
            .unwrap();

        let removed = SocialAuthorizationRepository::delete_for_platform(&pool, "u1", "instagram")
            .await
            .unwrap();
        assert_eq!(removed, 2);

        assert!(SocialAuthorizationRepository::find_latest(&pool, "u1", "instagram")
            .await
            .unwrap()
            .is_none());
        assert!(SocialAuthorizationRepository::find_latest(&pool, "u2", "instagram")
            .await
            .unwrap()
            .is_some());
    }
}
