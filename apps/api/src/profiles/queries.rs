use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::business_profile::BusinessProfile;
use crate::social::ConnectedAccount;

#[derive(Debug, Clone, Default)]
pub struct ProfileFields {
    pub business_name: Option<String>,
    pub industry: Option<String>,
    pub description: Option<String>,
    pub target_audience: Option<String>,
}

pub async fn get_profile(pool: &PgPool, user_id: Uuid) -> Result<Option<BusinessProfile>> {
    Ok(
        sqlx::query_as::<_, BusinessProfile>("SELECT * FROM business_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?,
    )
}

/// Creates the profile on first save; later saves overwrite the descriptive fields
/// and leave the Instagram link untouched.
pub async fn upsert_profile(
    pool: &PgPool,
    user_id: Uuid,
    fields: &ProfileFields,
) -> Result<BusinessProfile> {
    Ok(sqlx::query_as::<_, BusinessProfile>(
        r#"
        INSERT INTO business_profiles
            (id, user_id, business_name, industry, description, target_audience)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (user_id)
        DO UPDATE SET
            business_name = EXCLUDED.business_name,
            industry = EXCLUDED.industry,
            description = EXCLUDED.description,
            target_audience = EXCLUDED.target_audience,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(&fields.business_name)
    .bind(&fields.industry)
    .bind(&fields.description)
    .bind(&fields.target_audience)
    .fetch_one(pool)
    .await?)
}

/// `None` when the user has no profile to attach the account to.
pub async fn link_instagram(
    pool: &PgPool,
    user_id: Uuid,
    account: &ConnectedAccount,
) -> Result<Option<BusinessProfile>> {
    Ok(sqlx::query_as::<_, BusinessProfile>(
        r#"
        UPDATE business_profiles
        SET instagram_username = $2,
            instagram_access_token = $3,
            instagram_user_id = $4,
            instagram_connected = TRUE,
            updated_at = NOW()
        WHERE user_id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(&account.username)
    .bind(&account.access_token)
    .bind(&account.platform_user_id)
    .fetch_optional(pool)
    .await?)
}
