use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{AccountStore, RecordOutcome, SubscriptionUpdate};
use crate::errors::AppError;
use crate::models::user::{Tier, UpsertUser, User};

#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn upsert_user(&self, user: UpsertUser) -> Result<User, AppError> {
        Ok(sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, external_id, email, first_name, last_name, profile_image_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (external_id)
            DO UPDATE SET
                email = EXCLUDED.email,
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                profile_image_url = EXCLUDED.profile_image_url,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.external_id)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.profile_image_url)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn increment_usage(&self, user_id: Uuid) -> Result<Option<i32>, AppError> {
        Ok(sqlx::query_scalar(
            r#"
            UPDATE users
            SET monthly_posts_used = monthly_posts_used + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING monthly_posts_used
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn reset_usage(&self, user_id: Uuid) -> Result<Option<i32>, AppError> {
        Ok(sqlx::query_scalar(
            r#"
            UPDATE users
            SET monthly_posts_used = 0, updated_at = NOW()
            WHERE id = $1
            RETURNING monthly_posts_used
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn release_usage(&self, user_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE users
            SET monthly_posts_used = GREATEST(monthly_posts_used - 1, 0), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_post_if_below(
        &self,
        user_id: Uuid,
        expected_tier: Tier,
        limit: Option<i32>,
    ) -> Result<RecordOutcome, AppError> {
        // Check and increment in one statement: concurrent callers serialize on the row lock.
        let recorded: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET monthly_posts_used = monthly_posts_used + 1, updated_at = NOW()
            WHERE id = $1
              AND tier = $2
              AND ($3::INT4 IS NULL OR monthly_posts_used < $3)
            RETURNING monthly_posts_used
            "#,
        )
        .bind(user_id)
        .bind(expected_tier.as_str())
        .bind(limit)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(used) = recorded {
            return Ok(RecordOutcome::Recorded(used));
        }

        let current: Option<(String, i32)> =
            sqlx::query_as("SELECT tier, monthly_posts_used FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(match current {
            None => RecordOutcome::UserMissing,
            Some((tier, _)) if tier != expected_tier.as_str() => RecordOutcome::TierChanged,
            Some((_, used)) => RecordOutcome::LimitReached(used),
        })
    }

    async fn apply_subscription(
        &self,
        user_id: Uuid,
        expected_version: i32,
        update: &SubscriptionUpdate,
    ) -> Result<Option<User>, AppError> {
        Ok(sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET tier = $3,
                subscription_status = $4,
                billing_customer_id = $5,
                billing_subscription_id = $6,
                subscription_version = subscription_version + 1,
                updated_at = NOW()
            WHERE id = $1 AND subscription_version = $2
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(expected_version)
        .bind(update.tier.as_str())
        .bind(update.status.as_str())
        .bind(&update.billing_customer_id)
        .bind(&update.billing_subscription_id)
        .fetch_optional(&self.pool)
        .await?)
    }
}
