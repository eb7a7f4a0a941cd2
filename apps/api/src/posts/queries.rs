use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::post::{Post, PostStatus};
use crate::social::PublishReceipt;

/// Validated fields for a new post.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub caption: String,
    pub image_url: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub status: PostStatus,
}

/// Partial update; `None` leaves a column unchanged.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub caption: Option<String>,
    pub image_url: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub status: Option<PostStatus>,
}

/// Returns the user's most recent posts, newest first.
pub async fn list_posts(pool: &PgPool, user_id: Uuid, limit: i64) -> Result<Vec<Post>> {
    Ok(sqlx::query_as::<_, Post>(
        "SELECT * FROM posts WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

pub async fn recent_published(pool: &PgPool, user_id: Uuid, limit: i64) -> Result<Vec<Post>> {
    Ok(sqlx::query_as::<_, Post>(
        r#"
        SELECT * FROM posts
        WHERE user_id = $1 AND status = 'published'
        ORDER BY published_at DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

/// Scheduled posts, soonest first.
pub async fn scheduled_posts(pool: &PgPool, user_id: Uuid) -> Result<Vec<Post>> {
    Ok(sqlx::query_as::<_, Post>(
        r#"
        SELECT * FROM posts
        WHERE user_id = $1 AND status = 'scheduled'
        ORDER BY scheduled_for ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

pub async fn get_post(pool: &PgPool, post_id: Uuid, user_id: Uuid) -> Result<Option<Post>> {
    Ok(
        sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn insert_post(pool: &PgPool, user_id: Uuid, post: &NewPost) -> Result<Post> {
    Ok(sqlx::query_as::<_, Post>(
        r#"
        INSERT INTO posts (id, user_id, caption, image_url, scheduled_for, status)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(&post.caption)
    .bind(&post.image_url)
    .bind(post.scheduled_for)
    .bind(post.status.as_str())
    .fetch_one(pool)
    .await?)
}

pub async fn update_post(
    pool: &PgPool,
    post_id: Uuid,
    user_id: Uuid,
    changes: &PostChanges,
) -> Result<Option<Post>> {
    Ok(sqlx::query_as::<_, Post>(
        r#"
        UPDATE posts
        SET caption = COALESCE($3, caption),
            image_url = COALESCE($4, image_url),
            scheduled_for = COALESCE($5, scheduled_for),
            status = COALESCE($6, status),
            updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(post_id)
    .bind(user_id)
    .bind(&changes.caption)
    .bind(&changes.image_url)
    .bind(changes.scheduled_for)
    .bind(changes.status.map(|s| s.as_str()))
    .fetch_optional(pool)
    .await?)
}

/// Returns `true` if a post was deleted.
pub async fn delete_post(pool: &PgPool, post_id: Uuid, user_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM posts WHERE id = $1 AND user_id = $2")
        .bind(post_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn mark_published(pool: &PgPool, post_id: Uuid, receipt: &PublishReceipt) -> Result<Post> {
    Ok(sqlx::query_as::<_, Post>(
        r#"
        UPDATE posts
        SET status = 'published',
            published_at = NOW(),
            instagram_post_id = $2,
            likes = $3,
            comments = $4,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(post_id)
    .bind(&receipt.platform_post_id)
    .bind(receipt.likes)
    .bind(receipt.comments)
    .fetch_one(pool)
    .await?)
}

pub async fn mark_failed(pool: &PgPool, post_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE posts SET status = 'failed', updated_at = NOW() WHERE id = $1")
        .bind(post_id)
        .execute(pool)
        .await?;
    Ok(())
}
