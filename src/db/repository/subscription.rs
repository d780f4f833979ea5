use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::models::UserSubscription;
use crate::error::{AppError, AppResult};

pub struct SubscriptionRepository;

impl SubscriptionRepository {
    pub async fn find_by_user_id(
        pool: &SqlitePool,
        user_id: &str,
    ) -> AppResult<Option<UserSubscription>> {
        sqlx::query_as::<_, UserSubscription>(
            r#"
            SELECT user_id, plan, status, stripe_customer_id, stripe_subscription_id, updated_at
            FROM user_subscriptions
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(AppError::Database)
    }

    /// Activate a plan after a completed checkout.
    pub async fn activate(
        pool: &SqlitePool,
        user_id: &str,
        plan: &str,
        customer_id: Option<&str>,
        subscription_id: Option<&str>,
    ) -> AppResult<()> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO user_subscriptions (
                user_id, plan, status, stripe_customer_id, stripe_subscription_id, updated_at
            )
            VALUES (?, ?, 'active', ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                plan = excluded.plan,
                status = excluded.status,
                stripe_customer_id = excluded.stripe_customer_id,
                stripe_subscription_id = excluded.stripe_subscription_id,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(plan)
        .bind(customer_id)
        .bind(subscription_id)
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }

    /// Update status (and optionally plan) of the subscription owned by a billing customer.
    /// Returns false when no user is linked to the customer.
    pub async fn update_by_customer(
        pool: &SqlitePool,
        customer_id: &str,
        status: &str,
        plan: Option<&str>,
    ) -> AppResult<bool> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE user_subscriptions
            SET status = ?, plan = COALESCE(?, plan), updated_at = ?
            WHERE stripe_customer_id = ?
            "#,
        )
        .bind(status)
        .bind(plan)
        .bind(now)
        .bind(customer_id)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn add_associated_email(pool: &SqlitePool, user_id: &str, email: &str) -> AppResult<()> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO associated_emails (user_id, email, created_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id, email) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(email)
        .bind(now)
        .execute(pool)
        .await
        .map_err(AppError::Database)?;

        Ok(())
    }
}
